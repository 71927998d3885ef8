use std::env;
use std::str::FromStr;

use compass_core::GAME_DURATION_SECONDS;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{0} must be set unless AUTH_DEV_MODE=true or BACKEND_URL is set")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: Option<String>,
    pub jwt_audience: String,
    pub auth_dev_mode: bool,
    pub backend_url: Option<String>,
    pub backend_anon_key: Option<String>,
    pub game_duration_seconds: u32,
    pub click_rate_limit: u32,
    pub connection_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: compass_persistence::connection::DEFAULT_DATABASE_URL.to_string(),
            jwt_secret: None,
            jwt_audience: "authenticated".to_string(),
            auth_dev_mode: false,
            backend_url: None,
            backend_anon_key: None,
            game_duration_seconds: GAME_DURATION_SECONDS,
            click_rate_limit: 30,
            connection_timeout_seconds: 300,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; unset names keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT", defaults.port)?,
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            jwt_secret: lookup("JWT_SECRET").filter(|s| !s.is_empty()),
            jwt_audience: lookup("JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            auth_dev_mode: parse_var(&lookup, "AUTH_DEV_MODE", defaults.auth_dev_mode)?,
            backend_url: lookup("BACKEND_URL").filter(|s| !s.is_empty()),
            backend_anon_key: lookup("BACKEND_ANON_KEY").filter(|s| !s.is_empty()),
            game_duration_seconds: parse_var(
                &lookup,
                "GAME_DURATION_SECONDS",
                defaults.game_duration_seconds,
            )?,
            click_rate_limit: parse_var(&lookup, "CLICK_RATE_LIMIT", defaults.click_rate_limit)?,
            connection_timeout_seconds: parse_var(
                &lookup,
                "CONNECTION_TIMEOUT_SECONDS",
                defaults.connection_timeout_seconds,
            )?,
        };

        if config.game_duration_seconds == 0 {
            return Err(ConfigError::Invalid {
                name: "GAME_DURATION_SECONDS",
                value: "0".to_string(),
            });
        }
        if config.jwt_secret.is_none() && !config.auth_dev_mode && config.backend_url.is_none() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }

        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
