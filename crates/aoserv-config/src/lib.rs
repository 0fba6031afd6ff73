//! Layered configuration for the AOServ master.
//!
//! Values resolve from built-in defaults, then a TOML file, then `AOSERV_*`
//! environment variables, then command-line flags, through `ortho_config`.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CACHE_LISTEN_TIMEOUT_SECS, DEFAULT_LISTEN_HOST, DEFAULT_LOG_FILTER,
    DEFAULT_SERVICE_RETRY_SECS, DEFAULT_SYNC_ACK_TIMEOUT_SECS, DEFAULT_TCP_PORT,
    default_log_filter, default_log_format, default_socket_endpoint, seconds,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Master configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "AOSERV")]
pub struct Config {
    /// Endpoint that accepts client connections.
    #[serde(default = "default_socket_endpoint")]
    pub listen_socket: SocketEndpoint,
    /// `tracing` filter directive.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Seconds a cache listener blocks before a heartbeat is sent.
    #[serde(default = "defaults::default_cache_listen_timeout_secs")]
    pub cache_listen_timeout_secs: u64,
    /// Seconds between retries of services that failed to start.
    #[serde(default = "defaults::default_service_retry_secs")]
    pub service_retry_secs: u64,
    /// Seconds a synchronised invalidation waits for its acknowledgement.
    #[serde(default = "defaults::default_sync_ack_timeout_secs")]
    pub sync_ack_timeout_secs: u64,
    /// Log failures of connectivity probes at `warn` instead of `debug`.
    #[serde(default)]
    pub log_probe_failures: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: default_socket_endpoint(),
            log_filter: defaults::default_log_filter_string(),
            log_format: default_log_format(),
            cache_listen_timeout_secs: DEFAULT_CACHE_LISTEN_TIMEOUT_SECS,
            service_retry_secs: DEFAULT_SERVICE_RETRY_SECS,
            sync_ack_timeout_secs: DEFAULT_SYNC_ACK_TIMEOUT_SECS,
            log_probe_failures: false,
        }
    }
}

impl Config {
    /// Endpoint that accepts client connections.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// `tracing` filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// How long a cache listener waits before sending a heartbeat.
    #[must_use]
    pub fn cache_listen_timeout(&self) -> Duration {
        seconds(self.cache_listen_timeout_secs)
    }

    /// Interval between service start retries.
    #[must_use]
    pub fn service_retry_interval(&self) -> Duration {
        seconds(self.service_retry_secs)
    }

    /// How long a synchronised invalidation waits for its acknowledgement.
    #[must_use]
    pub fn sync_ack_timeout(&self) -> Duration {
        seconds(self.sync_ack_timeout_secs)
    }

    /// Whether connectivity probe failures are logged at `warn`.
    #[must_use]
    pub const fn log_probe_failures(&self) -> bool {
        self.log_probe_failures
    }
}
