// crates/session-client/src/config.rs

//! Client configuration.
//!
//! Sources, later overriding earlier:
//!
//! 1. built-in defaults
//! 2. optional TOML file (`--config`)
//! 3. environment:
//!    - `GAME_WEBSOCKET_URL`          (default: "ws://localhost:3001/ws")
//!    - `GAME_API_URL`                (default: "http://localhost:8080")
//!    - `GAME_RECONNECT_DELAY_MS`     (default: "3000")
//!    - `GAME_MAX_RECONNECT_ATTEMPTS` (default: "5", "0" retries forever)
//! 4. command-line flags (applied by the binary)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use session_core::{ConnectionOptions, DEFAULT_ENDPOINT};
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

pub const ENV_WEBSOCKET_URL: &str = "GAME_WEBSOCKET_URL";
pub const ENV_API_URL: &str = "GAME_API_URL";
pub const ENV_RECONNECT_DELAY_MS: &str = "GAME_RECONNECT_DELAY_MS";
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "GAME_MAX_RECONNECT_ATTEMPTS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub websocket_url: String,
    pub api_url: String,
    pub reconnect_delay_ms: u64,
    pub heartbeat_incoming_ms: u64,
    pub heartbeat_outgoing_ms: u64,
    pub max_reconnect_attempts: u32,
    pub auto_connect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            websocket_url: DEFAULT_ENDPOINT.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            reconnect_delay_ms: 3000,
            heartbeat_incoming_ms: 10_000,
            heartbeat_outgoing_ms: 10_000,
            max_reconnect_attempts: 5,
            auto_connect: true,
        }
    }
}

impl ClientConfig {
    /// Defaults, then `path` (if any), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override fields from variables found by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_WEBSOCKET_URL) {
            self.websocket_url = v;
        }
        if let Some(v) = lookup(ENV_API_URL) {
            self.api_url = v;
        }
        if let Some(v) = lookup(ENV_RECONNECT_DELAY_MS) {
            self.reconnect_delay_ms = parse_env(ENV_RECONNECT_DELAY_MS, v)?;
        }
        if let Some(v) = lookup(ENV_MAX_RECONNECT_ATTEMPTS) {
            self.max_reconnect_attempts = parse_env(ENV_MAX_RECONNECT_ATTEMPTS, v)?;
        }
        Ok(())
    }

    /// Both endpoints must be absolute URLs with a scheme we can speak.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("websocket_url", &self.websocket_url, &["ws", "wss"])?;
        check_url("api_url", &self.api_url, &["http", "https"])?;
        Ok(())
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        let mut options = ConnectionOptions::new(self.websocket_url.clone());
        options.reconnect_delay = Duration::from_millis(self.reconnect_delay_ms);
        options.heartbeat_incoming = Duration::from_millis(self.heartbeat_incoming_ms);
        options.heartbeat_outgoing = Duration::from_millis(self.heartbeat_outgoing_ms);
        options.max_reconnect_attempts = self.max_reconnect_attempts;
        options
    }
}

fn parse_env<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

fn check_url(field: &'static str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(format!("scheme must be one of {}", schemes.join(", "))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_the_reference_client() {
        let c = ClientConfig::default();
        assert_eq!(c.websocket_url, "ws://localhost:3001/ws");
        assert_eq!(c.api_url, "http://localhost:8080");
        assert_eq!(c.reconnect_delay_ms, 3000);
        assert_eq!(c.max_reconnect_attempts, 5);
        assert!(c.validate().is_ok());

        let opts = c.connection_options();
        assert_eq!(opts.heartbeat_incoming, Duration::from_secs(10));
        assert_eq!(opts.heartbeat_outgoing, Duration::from_secs(10));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ClientConfig::from_toml("websocket_url = \"wss://game.example/ws\"\nauto_connect = false\n").unwrap();
        assert_eq!(c.websocket_url, "wss://game.example/ws");
        assert!(!c.auto_connect);
        assert_eq!(c.reconnect_delay_ms, 3000);
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "https://api.example"),
            (ENV_MAX_RECONNECT_ATTEMPTS, "0"),
        ]
        .into_iter()
        .collect();

        let mut c = ClientConfig::from_toml("api_url = \"http://file\"").unwrap();
        c.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(c.api_url, "https://api.example");
        assert_eq!(c.max_reconnect_attempts, 0);
    }

    #[test]
    fn bad_environment_value_is_reported() {
        let mut c = ClientConfig::default();
        let err = c
            .apply_env(|k| (k == ENV_RECONNECT_DELAY_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: ENV_RECONNECT_DELAY_MS, .. }));
    }

    #[test]
    fn wrong_scheme_fails_validation() {
        let c = ClientConfig {
            websocket_url: "http://localhost:3001/ws".into(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            c.validate(),
            Err(ConfigError::InvalidUrl { field: "websocket_url", .. })
        ));
    }
}
