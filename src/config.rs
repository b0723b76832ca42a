//! Service configuration loaded from the environment.
//!
//! Values come from process environment variables, falling back to a `.env`
//! file (via `dotenvy`) and then to built-in defaults. Unparseable values are
//! reported and replaced by their default.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::handler::FailurePolicy;
use crate::transport::{ServerConfig, default_socket_path};

/// Collection holding the inventory projection.
pub const DEFAULT_COLLECTION: &str = "agg_inventory";

/// Store call timeout when `REPORT_STORE_TIMEOUT_MS` is unset.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("REPORT_COLLECTION must not be empty")]
    EmptyCollection,

    #[error("REPORT_MAX_CONNECTIONS must be at least 1")]
    NoConnections,
}

/// Runtime configuration for the report service.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// SQLite store file.
    pub db_path: PathBuf,
    /// Document collection searched by the service.
    pub collection: String,
    /// Bound on each store call (0 = unbounded).
    pub store_timeout: Duration,
    /// Path to the event socket.
    pub socket_path: PathBuf,
    /// Maximum concurrent transport connections.
    pub max_connections: usize,
    /// What to emit when a request fails.
    pub failure_policy: FailurePolicy,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            db_path: default_data_dir().join("report.db"),
            collection: DEFAULT_COLLECTION.to_string(),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            socket_path: default_socket_path(),
            max_connections: 16,
            failure_policy: FailurePolicy::Silent,
        }
    }
}

impl ReportConfig {
    /// Load config from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(path) = dotenvy::var("REPORT_DB_PATH") {
            cfg.db_path = PathBuf::from(path);
        }

        if let Ok(name) = dotenvy::var("REPORT_COLLECTION") {
            cfg.collection = name;
        }

        if let Ok(val) = dotenvy::var("REPORT_STORE_TIMEOUT_MS") {
            match val.trim().parse::<u64>() {
                Ok(ms) => cfg.store_timeout = Duration::from_millis(ms),
                Err(e) => warn!(
                    value = %val,
                    error = %e,
                    default_ms = DEFAULT_STORE_TIMEOUT_MS,
                    "Invalid REPORT_STORE_TIMEOUT_MS, using default"
                ),
            }
        }

        if let Ok(path) = dotenvy::var("REPORT_SOCKET") {
            cfg.socket_path = PathBuf::from(path);
        }

        if let Ok(val) = dotenvy::var("REPORT_MAX_CONNECTIONS") {
            match val.trim().parse::<usize>() {
                Ok(n) => cfg.max_connections = n,
                Err(e) => warn!(
                    value = %val,
                    error = %e,
                    default = cfg.max_connections,
                    "Invalid REPORT_MAX_CONNECTIONS, using default"
                ),
            }
        }

        if let Ok(val) = dotenvy::var("REPORT_FAILURE_POLICY") {
            match val.parse::<FailurePolicy>() {
                Ok(policy) => cfg.failure_policy = policy,
                Err(e) => warn!(error = %e, "Invalid REPORT_FAILURE_POLICY, using silent"),
            }
        }

        cfg
    }

    /// Reject settings no service can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.trim().is_empty() {
            return Err(ConfigError::EmptyCollection);
        }
        if self.max_connections == 0 {
            return Err(ConfigError::NoConnections);
        }
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            socket_path: self.socket_path.clone(),
            max_connections: self.max_connections,
        }
    }
}

/// Per-user data directory, or the working directory when the platform
/// reports none.
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "inventory-report", "inventory-report")
        .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf())
}
