//! Waiting for the operator to stop the master.

use std::io;

use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use crate::process::PROCESS_TARGET;

/// Blocks until the master should shut down.
pub trait ShutdownSignal: Send + Sync {
    /// Returns once a shutdown has been requested.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Failure waiting for a shutdown request.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Signal handlers could not be installed.
    #[error("cannot install signal handlers: {source}")]
    Install {
        /// Registration failure.
        #[source]
        source: io::Error,
    },
}

/// Waits for SIGTERM, SIGINT or SIGQUIT.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])
            .map_err(|source| ShutdownError::Install { source })?;
        if let Some(signal) = signals.forever().next() {
            info!(target: PROCESS_TARGET, signal, "shutdown signal received");
        }
        Ok(())
    }
}
