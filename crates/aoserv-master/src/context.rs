//! Shared state every connection works against.

use std::sync::Arc;
use std::time::Duration;

use aoserv_config::Config;
use aoserv_protocol::Identifier;

use crate::access::{AccessCache, AccessDirectory};
use crate::database::Database;
use crate::fanout::{Invalidator, SyncOutcome};
use crate::handshake::Authenticator;
use crate::invalidate::InvalidateList;
use crate::listeners::CacheListenerRegistry;
use crate::metrics::RequestMetrics;
use crate::services::{ServiceLookupError, ServiceRegistration, ServiceRegistry};
use crate::sync::SyncWaiters;

/// Runtime knobs taken from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterSettings {
    /// How long `LISTEN_CACHES` waits before a heartbeat.
    pub cache_listen_timeout: Duration,
    /// How long a synchronised invalidation waits for its acknowledgement.
    pub sync_ack_timeout: Duration,
    /// Log failed `TEST_CONNECTION` checks at warn rather than debug.
    pub log_probe_failures: bool,
}

impl From<&Config> for MasterSettings {
    fn from(config: &Config) -> Self {
        Self {
            cache_listen_timeout: config.cache_listen_timeout(),
            sync_ack_timeout: config.sync_ack_timeout(),
            log_probe_failures: config.log_probe_failures(),
        }
    }
}

impl Default for MasterSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// External systems the master is wired to.
pub struct Collaborators {
    /// Transaction source.
    pub database: Arc<dyn Database>,
    /// Credential check.
    pub authenticator: Arc<dyn Authenticator>,
    /// Authorization lookups.
    pub directory: Arc<dyn AccessDirectory>,
    /// Business services, in start order.
    pub services: Vec<ServiceRegistration>,
}

/// Everything a session needs, shared across connection threads.
pub struct MasterContext {
    database: Arc<dyn Database>,
    authenticator: Arc<dyn Authenticator>,
    access: Arc<AccessCache>,
    listeners: Arc<CacheListenerRegistry>,
    waiters: Arc<SyncWaiters>,
    invalidator: Invalidator,
    services: Arc<ServiceRegistry>,
    metrics: RequestMetrics,
    settings: MasterSettings,
}

impl MasterContext {
    /// Wires the collaborators together.
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: MasterSettings) -> Self {
        let Collaborators {
            database,
            authenticator,
            directory,
            services,
        } = collaborators;
        let access = Arc::new(AccessCache::new(directory));
        let listeners = Arc::new(CacheListenerRegistry::new());
        let waiters = Arc::new(SyncWaiters::new());
        let invalidator = Invalidator::new(
            Arc::clone(&listeners),
            Arc::clone(&access),
            Arc::clone(&waiters),
        );
        Self {
            database,
            authenticator,
            access,
            listeners,
            waiters,
            invalidator,
            services: Arc::new(ServiceRegistry::new(services)),
            metrics: RequestMetrics::new(),
            settings,
        }
    }

    /// First started service offering capability `C`.
    pub fn service<C: ?Sized + 'static>(&self) -> Result<Arc<C>, ServiceLookupError> {
        self.services.get_service::<C>()
    }

    /// Every service offering capability `C`, provided all of them have
    /// started.
    pub fn services<C: ?Sized + 'static>(&self) -> Result<Vec<Arc<C>>, ServiceLookupError> {
        self.services.get_services::<C>()
    }

    /// Pushes `list` to `connector` and waits for its acknowledgement,
    /// notifying every other listener as usual.
    pub fn sync_invalidate(&self, list: &InvalidateList, connector: Identifier) -> SyncOutcome {
        self.invalidator
            .sync_tables(list, connector, self.settings.sync_ack_timeout)
    }

    /// Transaction source.
    #[must_use]
    pub fn database(&self) -> &dyn Database {
        self.database.as_ref()
    }

    /// Credential check.
    #[must_use]
    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    /// Memoised authorization lookups.
    #[must_use]
    pub fn access(&self) -> &AccessCache {
        &self.access
    }

    /// Connected cache listeners.
    #[must_use]
    pub const fn listeners(&self) -> &Arc<CacheListenerRegistry> {
        &self.listeners
    }

    /// Pending synchronised invalidations.
    #[must_use]
    pub fn waiters(&self) -> &SyncWaiters {
        &self.waiters
    }

    /// Fan-out of committed invalidations.
    #[must_use]
    pub const fn invalidator(&self) -> &Invalidator {
        &self.invalidator
    }

    /// Registered business services.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Request counters.
    #[must_use]
    pub const fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    /// Runtime knobs.
    #[must_use]
    pub const fn settings(&self) -> &MasterSettings {
        &self.settings
    }
}
