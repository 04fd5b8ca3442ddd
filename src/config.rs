//! Service settings.
//!
//! Settings are layered, later sources overriding earlier ones:
//!
//! 1. built in defaults
//! 2. the settings file (`scribo.toml` unless another is named)
//! 3. `SCRIBO_<SECTION>__<KEY>` environment variables, e.g. `SCRIBO_AUTH__SECRET`
//! 4. the legacy `PORT`, `DATABASE_URL` and `SCRIBO_SECRET` variables

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_NAME: &str = "scribo";
pub const DEFAULT_PORT: u16 = 5356;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_BODY_LIMIT: usize = 1_048_576;
pub const DEFAULT_SKEW_SECONDS: u64 = 60;

/// Legacy environment variables and the keys they override.
const LEGACY_VARS: [(&str, &str); 3] = [
    ("PORT", "server.port"),
    ("DATABASE_URL", "database.url"),
    ("SCRIBO_SECRET", "auth.secret"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub api: ApiSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Deserialize)]
pub struct AuthSettings {
    /// Process secret mixed into every issued node key.
    pub secret: String,
    /// Allowed distance between a request timestamp and the server clock.
    pub skew_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub page_size: u32,
    pub body_limit: usize,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret", &"<redacted>")
            .field("skew_seconds", &self.skew_seconds)
            .finish()
    }
}

impl Settings {
    /// Load the settings from the defaults, the named settings file (if it
    /// exists) and the environment.
    pub fn load(config_name: Option<&str>) -> Result<Settings, ConfigError> {
        let mut settings = Settings::defaults()?;

        let name = config_name.unwrap_or(DEFAULT_CONFIG_NAME);
        settings.merge(File::with_name(name).required(config_name.is_some()))?;
        settings.merge(Environment::with_prefix("SCRIBO").separator("__"))?;

        for (var, key) in LEGACY_VARS.iter() {
            if let Ok(value) = env::var(var) {
                if !value.is_empty() {
                    settings.set(key, value)?;
                }
            }
        }

        Settings::from_config(settings)
    }

    /// A `Config` holding only the built in defaults.
    pub fn defaults() -> Result<Config, ConfigError> {
        let mut settings = Config::default();
        settings
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", DEFAULT_PORT as i64)?
            .set_default("database.url", "sqlite://scribo.db?mode=rwc")?
            .set_default("database.max_connections", 5)?
            .set_default("auth.secret", "")?
            .set_default("auth.skew_seconds", DEFAULT_SKEW_SECONDS as i64)?
            .set_default("api.page_size", DEFAULT_PAGE_SIZE as i64)?
            .set_default("api.body_limit", DEFAULT_BODY_LIMIT as i64)?;
        Ok(settings)
    }

    pub fn from_config(settings: Config) -> Result<Settings, ConfigError> {
        let settings: Settings = settings.try_into()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.parse::<IpAddr>().is_err() {
            return Err(ConfigError::Invalid {
                key: "server.host",
                message: format!("{} is not an IP address", self.server.host),
            });
        }
        if self.api.page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "api.page_size",
                message: String::from("must be at least 1"),
            });
        }
        if self.api.body_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "api.body_limit",
                message: String::from("must be at least 1"),
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        // validate() has already checked the host
        let host = self
            .server
            .host
            .parse::<IpAddr>()
            .unwrap_or_else(|_| IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(host, self.server.port)
    }

    pub fn skew(&self) -> Duration {
        Duration::from_secs(self.auth.skew_seconds)
    }
}
