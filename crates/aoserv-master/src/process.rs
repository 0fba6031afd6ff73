//! Process lifecycle for the `aoserv-master` binary.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::context::Collaborators;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::placeholder;
use crate::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use crate::transport::ListenerError;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Failures that end the process with a non-zero status.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The master never came up.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// Waiting for a signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// The listener failed while stopping.
    #[error("listener did not stop cleanly: {0}")]
    Listener(#[from] ListenerError),
}

/// Runs the master with production collaborators until a signal arrives.
pub fn run_master() -> Result<(), LaunchError> {
    run_master_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        placeholder::collaborators(),
        &SystemShutdownSignal,
    )
}

/// Runs the master with injected collaborators.
pub fn run_master_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    collaborators: Collaborators,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let master = bootstrap_with(loader, reporter, collaborators)?.start()?;
    info!(
        target: PROCESS_TARGET,
        address = ?master.local_addr(),
        "master running"
    );
    let waited = shutdown.wait();
    master.stop()?;
    waited?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
