//! Capability traits implemented by business services.
//!
//! Each handler runs inside the request's transaction and records every
//! table it changes in the request's [`InvalidateList`]. The dispatcher owns
//! commit, fan-out and the response; handlers only do the work.

use std::io::Read;

use aoserv_protocol::TableId;
use aoserv_protocol::requests::{
    AddDnsRecord, AddTransaction, DisableAccount, DumpDatabase, RemoveDnsRecord, StartDistro,
};
use thiserror::Error;

use crate::database::{DatabaseError, RowCursor, Transaction};
use crate::invalidate::InvalidateList;
use crate::source::RequestSource;

/// Failure reported by a service handler. Both kinds are recoverable: the
/// transaction is rolled back and the client may continue.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A business rule refused the request.
    #[error("{0}")]
    Refused(String),
    /// The database rejected the work.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    /// A refusal carrying `message` back to the client.
    #[must_use]
    pub fn refused(message: impl Into<String>) -> Self {
        Self::Refused(message.into())
    }
}

/// Result of a capability call.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// DNS record maintenance.
pub trait DnsService: Send + Sync {
    /// Adds a record and returns its id.
    fn add_record(
        &self,
        transaction: &mut dyn Transaction,
        source: &RequestSource,
        invalidate: &mut InvalidateList,
        request: &AddDnsRecord,
    ) -> ServiceResult<i32>;

    /// Removes a record by id.
    fn remove_record(
        &self,
        transaction: &mut dyn Transaction,
        source: &RequestSource,
        invalidate: &mut InvalidateList,
        request: &RemoveDnsRecord,
    ) -> ServiceResult<()>;
}

/// Billing ledger.
pub trait BillingService: Send + Sync {
    /// Records a transaction and returns its id.
    fn add_transaction(
        &self,
        transaction: &mut dyn Transaction,
        source: &RequestSource,
        invalidate: &mut InvalidateList,
        request: &AddTransaction,
    ) -> ServiceResult<i32>;
}

/// Account lifecycle.
pub trait AccountService: Send + Sync {
    /// Disables an account and everything under it.
    fn disable(
        &self,
        transaction: &mut dyn Transaction,
        source: &RequestSource,
        invalidate: &mut InvalidateList,
        request: &DisableAccount,
    ) -> ServiceResult<()>;
}

/// Read access to whole tables, filtered to what the caller may see.
pub trait TableService: Send + Sync {
    /// Number of rows the caller may see.
    fn row_count(
        &self,
        transaction: &mut dyn Transaction,
        source: &RequestSource,
        table: TableId,
    ) -> ServiceResult<i32>;

    /// Cursor over the rows the caller may see.
    fn table_rows(
        &self,
        transaction: &mut dyn Transaction,
        source: &RequestSource,
        table: TableId,
    ) -> ServiceResult<Box<dyn RowCursor>>;
}

/// Distribution file verification.
pub trait DistroService: Send + Sync {
    /// Starts a distribution verification run on a host and returns at once.
    fn start(
        &self,
        transaction: &mut dyn Transaction,
        source: &RequestSource,
        request: &StartDistro,
    ) -> ServiceResult<()>;
}

/// Database dumps.
pub trait DumpService: Send + Sync {
    /// Opens a database dump for streaming to the client.
    fn open_dump(
        &self,
        transaction: &mut dyn Transaction,
        source: &RequestSource,
        request: &DumpDatabase,
    ) -> ServiceResult<Box<dyn Read + Send>>;
}
