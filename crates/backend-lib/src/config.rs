// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "authgate.toml";

/// Prefix of environment overrides, e.g. `AUTHGATE_RATE_LIMIT__CAPACITY=20`
pub const ENV_PREFIX: &str = "AUTHGATE_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Longest accepted token lifetime, ten years
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Rejected configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Load(#[from] Box<figment::Error>),
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Directory of the flat-file identity store
    pub data_dir: PathBuf,
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    pub store: StoreSettings,
    pub rate_limit: RateLimitSettings,
    pub backoff: BackoffSettings,
    pub tokens: TokenSettings,
    pub password: PasswordSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process map, single node only
    Memory,
    /// Shared Redis instance
    Redis,
}

/// Shared state store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub redis_url: String,
    /// Upper bound of every store call
    pub timeout_ms: u64,
}

/// Token bucket settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Bucket size, also the burst a fresh client may spend
    pub capacity: u32,
    /// Seconds needed to earn back one token
    pub refill_period_secs: u64,
}

/// Failed-login backoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    /// Window after the first failure; doubles on each further failure
    pub base_delay_secs: u64,
    /// Lifetime of a backoff record in the store
    pub ttl_secs: u64,
    /// Optional ceiling on a single window. Unset means unbounded growth.
    pub max_delay_secs: Option<u64>,
}

/// Token signing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// PEM encoded RSA private key
    pub private_key_path: PathBuf,
    /// PEM encoded RSA public key
    pub public_key_path: PathBuf,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

/// Password policy and hashing cost
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    /// Minimum password length
    pub min_length: usize,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            store: StoreSettings::default(),
            rate_limit: RateLimitSettings::default(),
            backoff: BackoffSettings::default(),
            tokens: TokenSettings::default(),
            password: PasswordSettings::default(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            timeout_ms: 2_000,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_period_secs: 6,
        }
    }
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_delay_secs: 1,
            ttl_secs: 15 * 60,
            max_delay_secs: None,
        }
    }
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            private_key_path: PathBuf::from("keys/private.pem"),
            public_key_path: PathBuf::from("keys/public.pem"),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            min_length: 6,
            argon2_memory_kib: 64 * 1024,
            argon2_iterations: 1,
            argon2_parallelism: 4,
        }
    }
}

impl StoreSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Settings {
    /// Load `authgate.toml` (if present) and `AUTHGATE_*` overrides on top of defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Same as [`Settings::load`] with an explicit file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(msg: &str) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg.to_string()))
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return invalid("log_level must be one of trace, debug, info, warn, error");
        }
        if self.store.timeout_ms == 0 {
            return invalid("store.timeout_ms must be positive");
        }
        if self.store.backend == StoreBackend::Redis && self.store.redis_url.is_empty() {
            return invalid("store.redis_url is required for the redis backend");
        }
        if self.rate_limit.capacity == 0 {
            return invalid("rate_limit.capacity must be at least 1");
        }
        if self.rate_limit.refill_period_secs == 0 {
            return invalid("rate_limit.refill_period_secs must be positive");
        }
        if self.backoff.base_delay_secs == 0 {
            return invalid("backoff.base_delay_secs must be positive");
        }
        if self.backoff.ttl_secs == 0 {
            return invalid("backoff.ttl_secs must be positive");
        }
        if self
            .backoff
            .max_delay_secs
            .is_some_and(|max| max < self.backoff.base_delay_secs)
        {
            return invalid("backoff.max_delay_secs must not be below base_delay_secs");
        }
        if self.tokens.access_ttl_secs == 0 {
            return invalid("tokens.access_ttl_secs must be positive");
        }
        if self.tokens.refresh_ttl_secs <= self.tokens.access_ttl_secs {
            return invalid("tokens.refresh_ttl_secs must exceed access_ttl_secs");
        }
        if self.tokens.refresh_ttl_secs > MAX_TOKEN_TTL_SECS {
            return invalid("tokens.refresh_ttl_secs must not exceed ten years");
        }
        if self.password.min_length == 0 {
            return invalid("password.min_length must be at least 1");
        }
        if self.password.argon2_iterations == 0 || self.password.argon2_parallelism == 0 {
            return invalid("argon2 iterations and parallelism must be positive");
        }
        Ok(())
    }
}
