//! Error taxonomy for command dispatch.
//!
//! Every failure is either fatal, meaning the stream can no longer be trusted
//! and the connection closes after a best-effort `IO_EXCEPTION`, or
//! recoverable, meaning the client gets `SQL_EXCEPTION` and may send its next
//! command.

use aoserv_protocol::{ResponseStatus, UserName, WireError};
use thiserror::Error;

use crate::access::DirectoryError;
use crate::capabilities::ServiceError;
use crate::database::{DatabaseError, RowStreamError};
use crate::services::ServiceLookupError;

/// Failure while serving one command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Reading or writing the stream failed, or a value broke its grammar.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The client sent a sequence number other than the one expected.
    #[error("sequence mismatch: expected {expected}, received {received}")]
    SequenceMismatch {
        /// Next number the server expected.
        expected: i64,
        /// Number the client sent.
        received: i64,
    },

    /// The command ordinal is not one this server knows.
    #[error("unknown command ordinal {0}")]
    UnknownCommand(i32),

    /// The authenticated identity has been disabled since it logged in.
    #[error("{user} is disabled")]
    IdentityDisabled {
        /// The disabled identity.
        user: UserName,
    },

    /// A row stream broke after the client had seen part of it.
    #[error(transparent)]
    Stream(#[from] RowStreamError),

    /// The database failed; the transaction was rolled back.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// A service refused or failed the request.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// No started service offers what the command needs.
    #[error(transparent)]
    Unavailable(#[from] ServiceLookupError),

    /// An authorization lookup failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The caller may not act on the named resource.
    #[error("access denied: {message}")]
    AccessDenied {
        /// What was refused.
        message: String,
    },
}

impl DispatchError {
    /// Returns `true` when the connection must close.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Wire(_)
                | Self::SequenceMismatch { .. }
                | Self::UnknownCommand(_)
                | Self::IdentityDisabled { .. }
                | Self::Stream(_)
        )
    }

    /// Status byte reported to the client.
    #[must_use]
    pub const fn status(&self) -> ResponseStatus {
        if self.is_fatal() {
            ResponseStatus::IoException
        } else {
            ResponseStatus::SqlException
        }
    }

    /// Returns `true` when the client sent a value that breaks its grammar.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Wire(error) if error.is_validation())
    }

    /// Whether the peer simply went away; such errors are not worth a
    /// warning.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Wire(error) => error.is_eof(),
            _ => false,
        }
    }

    /// Refusal for a resource outside the caller's scope.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }
}
