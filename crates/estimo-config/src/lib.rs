//! # estimo-config
//!
//! Layered configuration loading for Estimo using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`ESTIMO_*` prefix, `__` as separator)
//! 2. Project-level `.estimo/config.toml`
//! 3. User-level `~/.config/estimo/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `ESTIMO_SESSION__TTL_SECS` -> `session.ttl_secs`,
//! `ESTIMO_ACCESS__ADMINS` -> `access.admins`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use estimo_config::EstimoConfig;
//!
//! let config = EstimoConfig::load_with_dotenv().expect("config");
//! println!("store: {}", config.database.path);
//! ```

mod access;
mod database;
mod error;
mod session;
mod transport;

pub use access::{AccessConfig, AccessPolicy, normalize_handle};
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use session::SessionConfig;
pub use transport::{MIN_TOKEN_LEN, TransportConfig};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EstimoConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

impl EstimoConfig {
    /// Load and validate configuration from all sources.
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be parsed or a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration after reading `.env` from the current directory.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests and the binary can merge additional providers on top.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        // Layer 2: Project-local config
        let local_path = PathBuf::from(".estimo/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Environment variables (highest priority)
        figment.merge(Env::prefixed("ESTIMO_").split("__"))
    }

    /// Reject values the rest of the system cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.ttl_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.transport.max_token_len < MIN_TOKEN_LEN {
            return Err(ConfigError::InvalidValue {
                field: "transport.max_token_len".into(),
                reason: format!("must be at least {MIN_TOKEN_LEN} bytes"),
            });
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.path".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Immutable admin policy derived from `access`.
    #[must_use]
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::from(&self.access)
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("estimo").join("config.toml"))
    }
}
