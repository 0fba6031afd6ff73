//! Test double for [`HealthReporter`] that records lifecycle events.

use std::sync::Mutex;

use aoserv_config::{Config, SocketEndpoint};

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::services::ServiceStartError;

/// Health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ServiceStarting(String),
    ServiceReady(String),
    ServiceFailed { service: String, message: String },
    ListenerActive(String),
}

#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Names of services reported ready, in order.
    #[must_use]
    pub fn ready_services(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HealthEvent::ServiceReady(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn service_starting(&self, name: &str) {
        self.record(HealthEvent::ServiceStarting(name.to_owned()));
    }

    fn service_ready(&self, name: &str) {
        self.record(HealthEvent::ServiceReady(name.to_owned()));
    }

    fn service_failed(&self, error: &ServiceStartError) {
        self.record(HealthEvent::ServiceFailed {
            service: error.service().to_owned(),
            message: error.message().to_owned(),
        });
    }

    fn listener_active(&self, endpoint: &SocketEndpoint) {
        self.record(HealthEvent::ListenerActive(endpoint.to_string()));
    }
}
