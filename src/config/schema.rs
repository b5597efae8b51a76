//! Configuration schema definitions.
//!
//! This module defines the complete settings structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port used when neither `PORT` nor `server.port` provides one.
pub const FALLBACK_PORT: u16 = 3000;

/// Root settings for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Server identity, listener and session settings.
    pub server: ServerSettings,

    /// Persistent store connection parameters.
    pub database: DatabaseSettings,

    /// Observability settings.
    pub observability: ObservabilitySettings,
}

/// Server identity and listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Server name. Derives the session cookie name and signing secret.
    pub name: String,

    /// Listening port. `0` defers to the fallback port.
    pub port: u16,

    /// Interface to bind.
    pub host: String,

    /// Session lifetime in seconds.
    pub session_duration_seconds: u64,

    /// Largest request body the decoder will buffer.
    pub body_limit_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: "Session Gateway".to_string(),
            port: FALLBACK_PORT,
            host: "0.0.0.0".to_string(),
            session_duration_seconds: 60 * 60 * 24,
            body_limit_bytes: 100 * 1024,
        }
    }
}

impl ServerSettings {
    /// Name of the session cookie issued to clients.
    pub fn cookie_name(&self) -> String {
        format!("{} Cookie", self.name)
    }

    /// Process-wide secret used to sign cookies.
    pub fn session_secret(&self) -> String {
        format!("{} SessionSecret", self.name)
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_seconds)
    }
}

/// Which store implementation backs the connection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Redis server reached over the network.
    Redis,
    /// Process-local map. Sessions do not survive restarts.
    Memory,
}

/// Persistent store connection parameters.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    pub backend: StoreKind,

    /// Store host name.
    pub url: String,

    pub port: u16,

    /// Namespace prefixed to every key written by the gateway.
    pub collection: String,

    pub user: String,

    pub password: String,

    /// Base delay for reconnect backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for reconnect backoff in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: StoreKind::Redis,
            url: "localhost".to_string(),
            port: 6379,
            collection: "gateway".to_string(),
            user: String::new(),
            password: String::new(),
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Operating environment, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Read `APP_ENV`, falling back to `NODE_ENV`.
    pub fn from_env() -> Self {
        let value = std::env::var("APP_ENV")
            .or_else(|_| std::env::var("NODE_ENV"))
            .ok();
        Self::parse(value.as_deref())
    }

    /// Anything other than `production`/`prod` is development.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "production" || v == "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    /// Whether error responses carry message and detail.
    pub fn expose_error_detail(self) -> bool {
        self == Environment::Development
    }

    /// Whether per-request access logging is enabled.
    pub fn access_log(self) -> bool {
        self == Environment::Development
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Resolve the listening port: `PORT`, then `server.port`, then the fallback.
pub fn effective_port(env_port: Option<&str>, settings: &ServerSettings) -> u16 {
    env_port
        .and_then(|p| p.trim().parse::<u16>().ok())
        .filter(|p| *p != 0)
        .or(Some(settings.port).filter(|p| *p != 0))
        .unwrap_or(FALLBACK_PORT)
}
