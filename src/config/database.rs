//! PostgreSQL pool settings for the booking store.

use std::time::Duration;

use serde::Deserialize;

use super::error::ValidationError;

const MAX_POOL_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// Apply `migrations/` before serving.
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            run_migrations: false,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.url.split_once("://") {
            None if self.url.is_empty() => {
                return Err(ValidationError::MissingRequired("DATABASE_URL"))
            }
            Some(("postgres" | "postgresql", _)) => {}
            _ => return Err(ValidationError::InvalidDatabaseUrl),
        }
        if !(1..=MAX_POOL_SIZE).contains(&self.max_connections) {
            return Err(ValidationError::InvalidPoolSize);
        }
        if self.acquire_timeout_secs == 0 {
            return Err(ValidationError::InvalidInterval("database.acquire_timeout_secs"));
        }
        Ok(())
    }
}
