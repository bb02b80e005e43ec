/// Configuration management for Live Stream Service
///
/// Loads configuration from environment variables (a `.env` file is honoured in
/// development through `dotenv`).
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    /// Shared rate-limit counters; in-process counters when absent
    pub redis: Option<RedisConfig>,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
    pub kyc: KycConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    pub host: String,
    pub http_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => bail!("unknown STORAGE_BACKEND: {}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// Upper bound on a rate-limit round trip before failing open
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity service
    #[serde(skip_serializing)]
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub chat_per_window: u32,
    pub reactions_per_window: u32,
    pub window_ms: u64,
    pub max_featured_products: usize,
    /// How often closed rate-limit windows are swept from memory
    pub purge_interval_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            chat_per_window: 5,
            reactions_per_window: 10,
            window_ms: 1000,
            max_featured_products: 10,
            purge_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycConfig {
    pub verification_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Commerce catalog base URL; every product is accepted when unset
    pub url: Option<String>,
    pub timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    20
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env_or("PORT", 8088),
        };

        let database = std::env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
            url,
            max_connections: env_or("DB_MAX_CONNECTIONS", default_max_connections()),
        });

        let backend = match std::env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse().context("invalid STORAGE_BACKEND")?,
            Err(_) if database.is_some() => StorageBackend::Postgres,
            Err(_) => StorageBackend::Memory,
        };

        let redis = std::env::var("REDIS_URL").ok().map(|url| RedisConfig {
            url,
            timeout_ms: env_or("RATE_LIMIT_REDIS_TIMEOUT_MS", 100),
        });

        let auth = AuthConfig {
            jwt_secret: std::env::var("JWT_SECRET")
                .context("JWT_SECRET environment variable not set")?,
        };

        let defaults = LimitsConfig::default();
        let limits = LimitsConfig {
            chat_per_window: env_or("CHAT_RATE_LIMIT", defaults.chat_per_window),
            reactions_per_window: env_or("REACTION_RATE_LIMIT", defaults.reactions_per_window),
            window_ms: env_or("RATE_LIMIT_WINDOW_MS", defaults.window_ms),
            max_featured_products: env_or(
                "MAX_FEATURED_PRODUCTS",
                defaults.max_featured_products,
            ),
            purge_interval_secs: env_or(
                "RATE_LIMIT_PURGE_INTERVAL_SECS",
                defaults.purge_interval_secs,
            ),
        };

        let kyc = KycConfig {
            verification_url: std::env::var("KYC_VERIFICATION_URL")
                .unwrap_or_else(|_| "https://nova.app/settings/verification".to_string()),
        };

        let catalog = CatalogConfig {
            url: std::env::var("PRODUCT_CATALOG_URL").ok(),
            timeout_ms: env_or("PRODUCT_CATALOG_TIMEOUT_MS", 2000),
        };

        let config = Config {
            app,
            storage: StorageConfig { backend, database },
            redis,
            auth,
            limits,
            kyc,
            catalog,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        if self.storage.backend == StorageBackend::Postgres && self.storage.database.is_none() {
            bail!("STORAGE_BACKEND=postgres requires DATABASE_URL");
        }
        if self.limits.chat_per_window == 0 || self.limits.reactions_per_window == 0 {
            bail!("rate limits must be positive");
        }
        if self.limits.window_ms == 0 {
            bail!("RATE_LIMIT_WINDOW_MS must be positive");
        }
        if self.limits.max_featured_products == 0 {
            bail!("MAX_FEATURED_PRODUCTS must be positive");
        }
        Ok(())
    }
}
