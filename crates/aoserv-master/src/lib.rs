//! The AOServ master: request dispatch and cache invalidation.
//!
//! Clients connect over TCP or a Unix socket, authenticate, and then send a
//! stream of framed commands. Each mutating command runs inside a database
//! transaction and records which tables it changed in an
//! [`InvalidateList`]. After the commit the master answers the caller with
//! its own invalidations and pushes the rest to every other client that is
//! blocked in `LISTEN_CACHES` and allowed to see the change.
//!
//! The database, credential store, authorization directory and business
//! services are collaborators behind traits ([`Database`], [`Authenticator`],
//! [`AccessDirectory`], [`Service`] plus the capability traits in
//! [`capabilities`]). The binary starts with refusing placeholders until a
//! deployment supplies real ones through [`run_master_with`].

pub mod access;
mod bootstrap;
pub mod capabilities;
mod context;
pub mod database;
pub mod dispatch;
pub mod fanout;
pub mod handshake;
mod health;
pub mod invalidate;
pub mod listeners;
pub mod metrics;
mod placeholder;
pub mod priority;
mod process;
pub mod services;
mod shutdown;
pub mod source;
pub mod sync;
mod telemetry;
pub mod transport;

pub use access::{AccessCache, AccessDirectory, AccessScope, DirectoryError};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Master, RunningMaster, SystemConfigLoader,
    bootstrap_with,
};
pub use context::{Collaborators, MasterContext, MasterSettings};
pub use database::{Database, DatabaseError, Transaction};
pub use fanout::{FAILOVER_SENSITIVE_TABLES, Invalidator, SyncOutcome};
pub use handshake::{AuthError, Authenticator};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use invalidate::{InvalidateList, Scope};
pub use process::{LaunchError, run_master, run_master_with};
pub use services::{Service, ServiceLookupError, ServiceRegistration, ServiceStartError};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use source::RequestSource;
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
