use std::net::SocketAddr;

use anyhow::Context;

pub const MEMORY_DATABASE_URL: &str = "memory";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub resume_on_start: bool,
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required"))?;

        let bind_addr = match lookup("VIDGEN_BIND_ADDR") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid VIDGEN_BIND_ADDR {raw:?}"))?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let resume_on_start = lookup("VIDGEN_RESUME_ON_START").is_none_or(|v| parse_bool(&v));

        Ok(Self {
            database_url,
            bind_addr,
            resume_on_start,
        })
    }
}
