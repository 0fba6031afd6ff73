//! Collaborators used until a deployment wires in its database, credential
//! store and authorization directory. Every one of them refuses, so an
//! unconfigured master accepts connections but lets nobody in.

use std::sync::Arc;

use aoserv_protocol::{HostId, UserName};

use crate::access::{AccessDirectory, AccessScope, DirectoryError};
use crate::context::Collaborators;
use crate::database::{Database, DatabaseError, Transaction};
use crate::handshake::{AuthError, Authenticator};

const PLACEHOLDER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::placeholder");

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RefusingDatabase;

impl Database for RefusingDatabase {
    fn begin(&self) -> Result<Box<dyn Transaction>, DatabaseError> {
        Err(DatabaseError::new("no database is configured"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RefusingAuthenticator;

impl Authenticator for RefusingAuthenticator {
    fn authenticate(&self, user: &UserName, _password: &str) -> Result<(), AuthError> {
        tracing::warn!(
            target: PLACEHOLDER_TARGET,
            %user,
            "login refused; no credential store is configured"
        );
        Err(AuthError::new("authentication is not configured on this master"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RefusingDirectory;

impl AccessDirectory for RefusingDirectory {
    fn load_scope(&self, _user: &UserName) -> Result<AccessScope, DirectoryError> {
        Err(DirectoryError::new("no authorization directory is configured"))
    }

    fn is_disabled(&self, _user: &UserName) -> Result<bool, DirectoryError> {
        Err(DirectoryError::new("no authorization directory is configured"))
    }

    fn failover_parent(&self, _host: HostId) -> Result<Option<HostId>, DirectoryError> {
        Ok(None)
    }
}

/// Collaborators for a master with nothing wired in and no services.
pub(crate) fn collaborators() -> Collaborators {
    Collaborators {
        database: Arc::new(RefusingDatabase),
        authenticator: Arc::new(RefusingAuthenticator),
        directory: Arc::new(RefusingDirectory),
        services: Vec::new(),
    }
}
