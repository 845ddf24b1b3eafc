use std::env;
use std::path::PathBuf;

use crate::constants::{DEFAULT_SYNC_ATTEMPTS, DEFAULT_SYNC_RETRY_MS, GLOBAL_LEADERBOARD_LIMIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("Unknown STORE_BACKEND: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Store
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub database_max_connections: u32,

    // Leaderboard
    pub leaderboard_limit: i64,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let store_backend =
            StoreBackend::parse(&env::var("STORE_BACKEND").unwrap_or_else(|_| "postgres".to_string()))?;
        let database_url = match store_backend {
            StoreBackend::Postgres => env::var("DATABASE_URL")?,
            StoreBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            store_backend,
            database_url,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            leaderboard_limit: env::var("LEADERBOARD_LIMIT")
                .unwrap_or_else(|_| GLOBAL_LEADERBOARD_LIMIT.to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store_backend == StoreBackend::Postgres && self.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.database_max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be > 0");
        }
        if self.leaderboard_limit <= 0 {
            anyhow::bail!("LEADERBOARD_LIMIT must be > 0");
        }

        if self.leaderboard_limit > GLOBAL_LEADERBOARD_LIMIT {
            tracing::warn!(
                "LEADERBOARD_LIMIT {} exceeds {}; responses will be capped",
                self.leaderboard_limit,
                GLOBAL_LEADERBOARD_LIMIT
            );
        }
        if self.store_backend == StoreBackend::Memory && !self.is_development() {
            tracing::warn!("In-memory store selected outside development; scores are not durable");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    /// Effective page size for `GET /score`.
    pub fn effective_leaderboard_limit(&self) -> i64 {
        self.leaderboard_limit.clamp(1, GLOBAL_LEADERBOARD_LIMIT)
    }
}

/// Settings for the headless game client.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub api_url: String,
    pub fid: Option<i64>,
    pub data_dir: PathBuf,
    pub sync_attempts: u32,
    pub sync_retry_ms: u64,
}

impl GameConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(GameConfig {
            api_url: env::var("GAME_API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            fid: env::var("GAME_FID").ok().map(|s| s.parse()).transpose()?,
            data_dir: env::var("GAME_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".emoji-reaction")),
            sync_attempts: env::var("GAME_SYNC_ATTEMPTS")
                .unwrap_or_else(|_| DEFAULT_SYNC_ATTEMPTS.to_string())
                .parse()?,
            sync_retry_ms: env::var("GAME_SYNC_RETRY_MS")
                .unwrap_or_else(|_| DEFAULT_SYNC_RETRY_MS.to_string())
                .parse()?,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_url.trim().is_empty() {
            anyhow::bail!("GAME_API_URL is empty");
        }
        if self.sync_attempts == 0 {
            anyhow::bail!("GAME_SYNC_ATTEMPTS must be > 0");
        }
        if matches!(self.fid, Some(fid) if fid <= 0) {
            anyhow::bail!("GAME_FID must be a positive integer");
        }
        if self.fid.is_none() {
            tracing::warn!("GAME_FID not set; scores stay local only");
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "test".to_string(),
        store_backend: StoreBackend::Memory,
        database_url: String::new(),
        database_max_connections: 1,
        leaderboard_limit: GLOBAL_LEADERBOARD_LIMIT,
        cors_allowed_origins: "*".to_string(),
    }
}
