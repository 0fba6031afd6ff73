//! Process-wide `tracing` setup.
//!
//! Events go to stderr. Connection threads are named `aoserv-conn-N`, so
//! thread names are kept in every line to tell sessions apart.

use std::io::{self, IsTerminal};

use aoserv_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Registry};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Proof that telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Failure installing the log subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The filter expression did not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// The rejected expression.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// Another global subscriber is already installed.
    #[error("cannot install telemetry subscriber: {0}")]
    Subscriber(#[source] TryInitError),
}

/// Installs the global subscriber once per process. Later calls return a
/// handle without touching the installed one.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| install(config))
        .map(|_| TelemetryHandle)
}

fn install(config: &Config) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
            filter: config.log_filter().to_owned(),
            message: error.to_string(),
        })?;

    let lines = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(true)
        .with_thread_names(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    let output: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format() {
        LogFormat::Json => lines.json().flatten_event(true).boxed(),
        LogFormat::Compact => lines.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}
