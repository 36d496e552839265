pub mod api;
pub mod config;
pub mod input;
pub mod memory_store;
pub mod simulator;
pub mod state;
pub mod store;
