//! Master bootstrap: configuration, telemetry, shared context and services.

use std::net::SocketAddr;
use std::sync::Arc;

use aoserv_config::{Config, SocketPreparationError};
use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use crate::context::{Collaborators, MasterContext, MasterSettings};
use crate::dispatch::MasterConnectionHandler;
use crate::health::HealthReporter;
use crate::process::PROCESS_TARGET;
use crate::services::RetryHandle;
use crate::telemetry::{self, TelemetryError};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

/// Source of the master configuration.
pub trait ConfigLoader: Send + Sync {
    /// Resolves the configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loads from CLI flags, `AOSERV_*` variables and the config file.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Failure bringing the master up.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration could not be loaded.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Loader failure.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Logging could not be installed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Telemetry failure.
        #[source]
        source: TelemetryError,
    },
    /// The Unix socket directory could not be prepared.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        /// Preparation failure.
        #[source]
        source: SocketPreparationError,
    },
    /// The listener could not bind or start.
    #[error("failed to open listener: {source}")]
    Listener {
        /// Listener failure.
        #[source]
        source: ListenerError,
    },
    /// The service retry thread could not be spawned.
    #[error("failed to spawn service retry thread: {source}")]
    ServiceRetry {
        /// Spawn failure.
        #[source]
        source: std::io::Error,
    },
}

/// A bootstrapped master that is not yet accepting clients.
pub struct Master {
    config: Config,
    context: Arc<MasterContext>,
    reporter: Arc<dyn HealthReporter>,
}

impl Master {
    /// Shared state handed to every connection.
    #[must_use]
    pub const fn context(&self) -> &Arc<MasterContext> {
        &self.context
    }

    /// Binds the listener, starts accepting and keeps retrying services
    /// that failed to start.
    pub fn start(self) -> Result<RunningMaster, BootstrapError> {
        let endpoint = self.config.listen_socket();
        let fail = |error: BootstrapError| {
            self.reporter.bootstrap_failed(&error);
            error
        };
        let listener = SocketListener::bind(endpoint)
            .map_err(|source| fail(BootstrapError::Listener { source }))?;
        let local_addr = listener.local_addr();
        let retry = self
            .context
            .registry()
            .spawn_retry(
                self.config.service_retry_interval(),
                Arc::clone(&self.reporter),
            )
            .map_err(|source| fail(BootstrapError::ServiceRetry { source }))?;
        let handler = Arc::new(MasterConnectionHandler::new(Arc::clone(&self.context)));
        let listener = listener
            .start(handler)
            .map_err(|source| fail(BootstrapError::Listener { source }))?;
        self.reporter.listener_active(endpoint);
        Ok(RunningMaster {
            context: self.context,
            listener,
            retry,
            local_addr,
        })
    }
}

/// A master accepting clients.
pub struct RunningMaster {
    context: Arc<MasterContext>,
    listener: ListenerHandle,
    retry: RetryHandle,
    local_addr: Option<SocketAddr>,
}

impl RunningMaster {
    /// Bound TCP address, useful when the configured port was zero.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Shared state handed to every connection.
    #[must_use]
    pub const fn context(&self) -> &Arc<MasterContext> {
        &self.context
    }

    /// Stops accepting, ends every cache listener and stops service retries.
    pub fn stop(self) -> Result<(), ListenerError> {
        self.listener.shutdown();
        self.context.listeners().interrupt_all();
        self.retry.stop();
        self.listener.join()?;
        info!(target: PROCESS_TARGET, "master stopped");
        Ok(())
    }
}

/// Bootstraps the master with the supplied collaborators.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    collaborators: Collaborators,
) -> Result<Master, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = telemetry::initialise(&config) {
        let error = BootstrapError::Telemetry { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    if let Err(source) = config.listen_socket().prepare_filesystem() {
        let error = BootstrapError::Socket { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    let context = Arc::new(MasterContext::new(
        collaborators,
        MasterSettings::from(&config),
    ));
    let failures = context.registry().start_all(reporter.as_ref());
    if !failures.is_empty() {
        info!(
            target: PROCESS_TARGET,
            pending = ?context.registry().pending(),
            "some services will be retried in the background"
        );
    }
    reporter.bootstrap_succeeded(&config);

    Ok(Master {
        config,
        context,
        reporter,
    })
}
