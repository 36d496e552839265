use std::sync::Arc;

use sea_orm_migration::MigratorTrait;

use crate::config::{Config, MEMORY_DATABASE_URL};
use crate::memory_store::MemoryStore;
use crate::simulator::StageSimulator;
use crate::store::{DbStore, GenerationStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn GenerationStore>,
    pub simulator: StageSimulator,
}

impl AppState {
    pub fn new(store: Arc<dyn GenerationStore>) -> Self {
        let simulator = StageSimulator::new(store.clone());
        Self { store, simulator }
    }
}

pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn GenerationStore>> {
    if config.database_url == MEMORY_DATABASE_URL {
        tracing::warn!("using in-memory store; generations will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = vidgen_db::connect(&config.database_url).await?;

    // Apply migrations on boot (idempotent).
    vidgen_migration::Migrator::up(&db, None).await?;

    Ok(Arc::new(DbStore::new(Arc::new(db))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidgen_core::{GenerationStatus, NewGeneration};

    fn config(database_url: &str) -> Config {
        Config {
            database_url: database_url.to_string(),
            bind_addr: ([127, 0, 0, 1], 0).into(),
            resume_on_start: false,
        }
    }

    fn input() -> NewGeneration {
        NewGeneration {
            prompt: "paper boats".to_string(),
            style: None,
            aspect_ratio: "1:1".to_string(),
        }
    }

    #[tokio::test]
    async fn memory_url_opens_a_working_store() {
        let store = open_store(&config(MEMORY_DATABASE_URL)).await.unwrap();
        let g = store.create(input()).await.unwrap();
        assert_eq!(g.status, GenerationStatus::Pending);
        assert_eq!(store.list().await.unwrap(), vec![g]);
    }

    #[tokio::test]
    async fn sqlite_url_is_migrated_on_open() {
        let store = open_store(&config("sqlite::memory:")).await.unwrap();
        let g = store.create(input()).await.unwrap();
        assert_eq!(store.get(g.id).await.unwrap(), Some(g));
    }
}
