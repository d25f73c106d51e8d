use anyhow::{bail, Result};
use std::{env, str::FromStr};

pub const DEFAULT_REMOVE_BG_URL: &str = "https://api.remove.bg/v1.0/removebg";
const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "fs" | "filesystem" => Ok(StorageBackend::Local),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("Unsupported storage backend: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Memory,
    Postgres,
}

impl FromStr for DatabaseBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(DatabaseBackend::Memory),
            "postgres" | "postgresql" => Ok(DatabaseBackend::Postgres),
            other => bail!("Unsupported database backend: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub upload_dir: String,
    pub database_backend: DatabaseBackend,
    pub database_url: String,
    pub max_file_size: usize,
    pub allowed_mime_types: Vec<String>,
    pub remove_bg_api_key: Option<String>,
    pub remove_bg_api_url: String,
    pub remove_bg_timeout_secs: u64,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub anonymous_limit: u32,
    pub anonymous_window_secs: u64,
    /// Peers whose forwarding headers are believed. Empty trusts none, `*` trusts all.
    pub trusted_proxies: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        let remove_bg_api_key = env::var("REMOVE_BG_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        if remove_bg_api_key.is_none() {
            tracing::warn!("REMOVE_BG_API_KEY not set, background removal will use the local fallback mask");
        }

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "local".to_string())
                .parse()?,
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "./uploads".to_string()),
            database_backend: env::var("DATABASE_BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/bg_removal".to_string()),
            max_file_size: env::var("MAX_FILE_SIZE")
                .unwrap_or_else(|_| "5242880".to_string()) // 5MB
                .parse()?,
            allowed_mime_types: env::var("ALLOWED_MIME_TYPES")
                .unwrap_or_else(|_| "image/jpeg,image/png,image/webp".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            remove_bg_api_key,
            remove_bg_api_url: env::var("REMOVE_BG_API_URL")
                .unwrap_or_else(|_| DEFAULT_REMOVE_BG_URL.to_string()),
            remove_bg_timeout_secs: env::var("REMOVE_BG_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            jwt_secret,
            bcrypt_cost: env::var("BCRYPT_COST")
                .unwrap_or_else(|_| bcrypt::DEFAULT_COST.to_string())
                .parse()?,
            anonymous_limit: env::var("ANONYMOUS_LIMIT")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            anonymous_window_secs: env::var("ANONYMOUS_WINDOW_SECS")
                .unwrap_or_else(|_| "86400".to_string()) // 24 hours
                .parse()?,
            trusted_proxies: env::var("TRUSTED_PROXIES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    /// In-memory everything, no external API. Used by tests and local demos.
    pub fn in_memory() -> Self {
        Config {
            port: 3000,
            storage_backend: StorageBackend::Memory,
            upload_dir: "./uploads".to_string(),
            database_backend: DatabaseBackend::Memory,
            database_url: String::new(),
            max_file_size: 5 * 1024 * 1024,
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
            remove_bg_api_key: None,
            remove_bg_api_url: DEFAULT_REMOVE_BG_URL.to_string(),
            remove_bg_timeout_secs: 30,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            bcrypt_cost: 4,
            anonymous_limit: 2,
            anonymous_window_secs: 86400,
            trusted_proxies: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!("Local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert!("s3".parse::<StorageBackend>().is_err());

        assert_eq!("postgres".parse::<DatabaseBackend>().unwrap(), DatabaseBackend::Postgres);
        assert_eq!(" MEMORY ".parse::<DatabaseBackend>().unwrap(), DatabaseBackend::Memory);
        assert!("mysql".parse::<DatabaseBackend>().is_err());
    }

    #[test]
    fn test_in_memory_defaults() {
        let config = Config::in_memory();
        assert_eq!(config.max_file_size, 5_242_880);
        assert!(config.remove_bg_api_key.is_none());
        assert_eq!(config.allowed_mime_types.len(), 3);
        assert!(config.trusted_proxies.is_empty());
    }
}
