//! Registry of business services, looked up by capability at command time.
//!
//! A service registers once and advertises the capability traits it
//! implements. Dispatch asks for a capability, not a concrete type, so a
//! command fails with "not started" while its service is still coming up and
//! with "not registered" when no service offers it at all.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::health::HealthReporter;

const SERVICES_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::services");

/// Error reported when a service fails to start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("service {service} failed to start: {message}")]
pub struct ServiceStartError {
    service: String,
    message: String,
}

impl ServiceStartError {
    /// A start failure of `service`.
    #[must_use]
    pub fn new(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Name of the service that failed.
    #[must_use]
    pub fn service(&self) -> &str {
        self.service.as_str()
    }

    /// The failure text.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// A capability lookup that found nothing usable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceLookupError {
    /// No registered service offers the capability.
    #[error("no service provides {capability}")]
    NotRegistered {
        /// Type name of the capability.
        capability: &'static str,
    },
    /// A service offering the capability is still waiting to start.
    #[error("service {service} providing {capability} has not started")]
    NotStarted {
        /// Type name of the capability.
        capability: &'static str,
        /// Name of the service that has not started.
        service: String,
    },
}

/// Lifecycle half of a business service.
pub trait Service: Send + Sync {
    /// Name used in logs and lookup errors.
    fn name(&self) -> &str;

    /// Brings the service up. Called again after a failure until it succeeds.
    fn start(&self) -> Result<(), ServiceStartError>;
}

/// A service together with the capabilities it provides.
pub struct ServiceRegistration {
    service: Arc<dyn Service>,
    capabilities: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    started: AtomicBool,
}

impl ServiceRegistration {
    /// A registration for a service that has not started yet.
    #[must_use]
    pub fn new(service: Arc<dyn Service>) -> Self {
        Self {
            service,
            capabilities: HashMap::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Advertises `capability`, usually the same object as the service
    /// viewed through a capability trait such as `Arc<dyn DnsService>`.
    #[must_use]
    pub fn provides<C>(mut self, capability: Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.capabilities
            .insert(TypeId::of::<C>(), Box::new(capability));
        self
    }

    fn capability<C: ?Sized + 'static>(&self) -> Option<Arc<C>> {
        self.capabilities
            .get(&TypeId::of::<C>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<C>>())
            .cloned()
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn name(&self) -> &str {
        self.service.name()
    }
}

/// Every registered service. The set is fixed at construction; only the
/// started flags change afterwards.
#[derive(Default)]
pub struct ServiceRegistry {
    registrations: Vec<ServiceRegistration>,
}

impl ServiceRegistry {
    /// A registry over `registrations`, in start order.
    #[must_use]
    pub fn new(registrations: Vec<ServiceRegistration>) -> Self {
        Self { registrations }
    }

    /// First started service providing `C`.
    pub fn get_service<C: ?Sized + 'static>(&self) -> Result<Arc<C>, ServiceLookupError> {
        let mut waiting_on = None;
        for registration in &self.registrations {
            let Some(capability) = registration.capability::<C>() else {
                continue;
            };
            if registration.is_started() {
                return Ok(capability);
            }
            waiting_on.get_or_insert_with(|| registration.name().to_owned());
        }
        Err(match waiting_on {
            Some(service) => ServiceLookupError::NotStarted {
                capability: type_name::<C>(),
                service,
            },
            None => ServiceLookupError::NotRegistered {
                capability: type_name::<C>(),
            },
        })
    }

    /// Every service providing `C`, in registration order. Fails unless all
    /// of them have started.
    pub fn get_services<C: ?Sized + 'static>(&self) -> Result<Vec<Arc<C>>, ServiceLookupError> {
        let mut found = Vec::new();
        for registration in &self.registrations {
            let Some(capability) = registration.capability::<C>() else {
                continue;
            };
            if !registration.is_started() {
                return Err(ServiceLookupError::NotStarted {
                    capability: type_name::<C>(),
                    service: registration.name().to_owned(),
                });
            }
            found.push(capability);
        }
        if found.is_empty() {
            return Err(ServiceLookupError::NotRegistered {
                capability: type_name::<C>(),
            });
        }
        Ok(found)
    }

    /// Attempts to start every service not yet running, once each. Returns
    /// the failures.
    pub fn start_all(&self, reporter: &dyn HealthReporter) -> Vec<ServiceStartError> {
        let mut failures = Vec::new();
        for registration in self.registrations.iter().filter(|entry| !entry.is_started()) {
            reporter.service_starting(registration.name());
            match registration.service.start() {
                Ok(()) => {
                    registration.started.store(true, Ordering::Release);
                    reporter.service_ready(registration.name());
                }
                Err(error) => {
                    reporter.service_failed(&error);
                    failures.push(error);
                }
            }
        }
        failures
    }

    /// Names of services that have not started yet.
    #[must_use]
    pub fn pending(&self) -> Vec<String> {
        self.registrations
            .iter()
            .filter(|registration| !registration.is_started())
            .map(|registration| registration.name().to_owned())
            .collect()
    }

    /// Retries failed services every `interval` on a background thread until
    /// all have started or the handle is stopped.
    pub fn spawn_retry(
        self: &Arc<Self>,
        interval: Duration,
        reporter: Arc<dyn HealthReporter>,
    ) -> std::io::Result<RetryHandle> {
        let (stop, stopped) = mpsc::channel::<()>();
        let registry = Arc::clone(self);
        let thread = thread::Builder::new()
            .name("aoserv-service-retry".to_owned())
            .spawn(move || {
                loop {
                    if registry.pending().is_empty() {
                        info!(target: SERVICES_TARGET, "all services started");
                        return;
                    }
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let failures = registry.start_all(reporter.as_ref());
                            debug!(
                                target: SERVICES_TARGET,
                                failures = failures.len(),
                                "service retry pass finished"
                            );
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
            })?;
        Ok(RetryHandle {
            stop: Some(stop),
            thread: Some(thread),
        })
    }
}

/// Stops the retry thread when dropped.
pub struct RetryHandle {
    stop: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RetryHandle {
    /// Stops retrying and waits for the thread to exit.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(stop) = self.stop.take()
            && stop.send(()).is_err()
        {
            debug!(target: SERVICES_TARGET, "service retry thread had already finished");
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!(target: SERVICES_TARGET, "service retry thread panicked");
        }
    }
}

impl Drop for RetryHandle {
    fn drop(&mut self) {
        self.halt();
    }
}
