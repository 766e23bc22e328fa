//! Configuration
//!
//! `SyncConfig` is assembled from built-in defaults, an optional TOML file, and
//! `TREESYNC__`-prefixed environment variables, in increasing precedence.

mod facade;
mod merge;
pub mod paths;
mod sources;

pub use facade::ConfigLoader;

use crate::logging::LoggingConfig;
use crate::reconcile::ReconcileOptions;
use crate::watch::WatchConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Tree to index, watch, serve, and sync into.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Listen address for `serve`.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Default peer: an `http(s)://` base URL, a `file://` URL, or a directory path.
    #[serde(default)]
    pub peer: Option<String>,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub reconcile: ReconcileOptions,

    #[serde(default)]
    pub watch: WatchSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

pub(crate) fn default_root() -> PathBuf {
    PathBuf::from(".")
}

pub(crate) fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            listen: default_listen(),
            peer: None,
            transport: TransportConfig::default(),
            reconcile: ReconcileOptions::default(),
            watch: WatchSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Check values the type system cannot.
    pub fn validate(&self) -> Result<(), String> {
        if self.transport.timeout_secs == 0 {
            return Err("transport.timeout_secs must be greater than zero".to_string());
        }
        if self.watch.poll_interval_ms == 0 {
            return Err("watch.poll_interval_ms must be greater than zero".to_string());
        }
        if self.listen.trim().is_empty() {
            return Err("listen address must not be empty".to_string());
        }
        if self.root.as_os_str().is_empty() {
            return Err("root must not be empty".to_string());
        }
        Ok(())
    }

    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            root: self.root.clone(),
            poll_interval: self.watch.poll_interval(),
        }
    }
}

/// Peer transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub(crate) fn default_timeout_secs() -> u64 {
    10
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Watch loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSettings {
    /// How often the event loop checks for a stop request.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    200
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatchSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
