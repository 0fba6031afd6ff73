use std::time::Duration;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// TCP port the master listens on unless configured otherwise.
pub const DEFAULT_TCP_PORT: u16 = 4582;

/// Interface the master binds unless configured otherwise.
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Seconds a cache listener waits for a notice before sending a heartbeat.
pub const DEFAULT_CACHE_LISTEN_TIMEOUT_SECS: u64 = 60;

/// Seconds between attempts to start services that failed to start.
pub const DEFAULT_SERVICE_RETRY_SECS: u64 = 60;

/// Seconds a synchronised invalidation waits for its acknowledgement.
pub const DEFAULT_SYNC_ACK_TIMEOUT_SECS: u64 = 60;

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value for serde defaults.
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default log output format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Endpoint the master binds by default.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_LISTEN_HOST, DEFAULT_TCP_PORT)
}

pub(crate) const fn default_cache_listen_timeout_secs() -> u64 {
    DEFAULT_CACHE_LISTEN_TIMEOUT_SECS
}

pub(crate) const fn default_service_retry_secs() -> u64 {
    DEFAULT_SERVICE_RETRY_SECS
}

pub(crate) const fn default_sync_ack_timeout_secs() -> u64 {
    DEFAULT_SYNC_ACK_TIMEOUT_SECS
}

/// Converts a seconds setting into a duration. Zero is clamped to one second.
#[must_use]
pub fn seconds(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}
