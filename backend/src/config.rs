//! Configuration management for the warehouse backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with WMS_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::{ContainerType, IssuancePolicy};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    pub logging: LoggingConfig,

    /// Stock-in defaults
    pub stock_in: StockInConfig,

    /// Sticker issuance rules
    pub stickers: StickerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,

    /// Requests running longer than this are aborted and their transaction rolled back
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify bearer tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StockInConfig {
    /// Type given to containers auto-created by raw-material stock-in
    pub raw_material_container_type: ContainerType,

    /// Type given to containers auto-created by finished-goods stock-in
    pub finished_goods_container_type: ContainerType,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StickerConfig {
    /// Reject sticker over-issuance unless the request explicitly allows it
    pub strict_issuance: bool,
}

impl StickerConfig {
    pub fn policy(&self) -> IssuancePolicy {
        IssuancePolicy {
            strict: self.strict_issuance,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("WMS_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("logging.json", false)?
            .set_default("stock_in.raw_material_container_type", "PALLET")?
            .set_default("stock_in.finished_goods_container_type", "BIN")?
            .set_default("stickers.strict_issuance", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (WMS_ prefix)
            .add_source(
                Environment::with_prefix("WMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_types_deserialize_from_defaults() {
        let value: ContainerType = serde_json::from_str("\"PALLET\"").unwrap();
        assert_eq!(value, ContainerType::Pallet);
        let value: ContainerType = serde_json::from_str("\"BIN\"").unwrap();
        assert_eq!(value, ContainerType::Bin);
    }

    #[test]
    fn test_sticker_policy() {
        let lenient = StickerConfig { strict_issuance: false };
        assert!(!lenient.policy().strict);
        let strict = StickerConfig { strict_issuance: true };
        assert!(strict.policy().strict);
    }
}
