//! Structured health reporting for master lifecycle events.

use aoserv_config::{Config, SocketEndpoint};

use crate::bootstrap::BootstrapError;
use crate::services::ServiceStartError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer for lifecycle events, so tests can assert on them and production
/// can route them to telemetry.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before a service's start attempt.
    fn service_starting(&self, name: &str);

    /// Invoked after a service starts.
    fn service_ready(&self, name: &str);

    /// Invoked when a start attempt fails; the retry loop will try again.
    fn service_failed(&self, error: &ServiceStartError);

    /// Invoked once the client listener is accepting connections.
    fn listener_active(&self, endpoint: &SocketEndpoint);
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// A reporter writing to the `tracing` subscriber.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting master bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.listen_socket(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            cache_listen_timeout = ?config.cache_listen_timeout(),
            "master bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            %error,
            "master bootstrap failed"
        );
    }

    fn service_starting(&self, name: &str) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "service_starting",
            service = name,
            "starting service"
        );
    }

    fn service_ready(&self, name: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "service_ready",
            service = name,
            "service ready"
        );
    }

    fn service_failed(&self, error: &ServiceStartError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "service_failed",
            service = error.service(),
            message = %error.message(),
            error = ?error,
            "service failed to start; will retry"
        );
    }

    fn listener_active(&self, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_active",
            %endpoint,
            "accepting clients"
        );
    }
}
