//! Server configuration layered from environment variables over the
//! library defaults.

use scholaris_db::DbConfig;
use scholaris_engine::EngineConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub engine: EngineConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("SCHOLARIS_DB_URL") {
            config.db.url = url;
        }
        if let Some(ns) = lookup("SCHOLARIS_DB_NS") {
            config.db.namespace = ns;
        }
        if let Some(name) = lookup("SCHOLARIS_DB_NAME") {
            config.db.database = name;
        }
        if let Some(user) = lookup("SCHOLARIS_DB_USER") {
            config.db.username = user;
        }
        if let Some(pass) = lookup("SCHOLARIS_DB_PASS") {
            config.db.password = pass;
        }
        if let Some(raw) = lookup("SCHOLARIS_PAGE_SIZE") {
            let size = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    key: "SCHOLARIS_PAGE_SIZE",
                    value: raw.clone(),
                })?;
            config.engine.default_page_size = size.min(config.engine.max_page_size);
        }

        Ok(config)
    }
}
