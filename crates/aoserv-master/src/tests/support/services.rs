//! Business services backed by the in-memory database.

use std::collections::HashMap;
use std::sync::Arc;

use aoserv_protocol::requests::{AddDnsRecord, DisableAccount, RemoveDnsRecord};
use aoserv_protocol::{AccountName, DomainName, TableId};

use crate::capabilities::{
    AccountService, DnsService, ServiceError, ServiceResult, TableService,
};
use crate::database::{RowCursor, Transaction, WireRow};
use crate::invalidate::InvalidateList;
use crate::services::{Service, ServiceRegistration, ServiceStartError};
use crate::source::RequestSource;

use super::memory::{DnsRow, MemoryDirectory, MemoryTransaction};

fn memory(transaction: &mut dyn Transaction) -> ServiceResult<&mut MemoryTransaction> {
    transaction
        .as_any_mut()
        .downcast_mut::<MemoryTransaction>()
        .ok_or_else(|| ServiceError::refused("unexpected transaction type"))
}

/// DNS, table and account commands over zones owned by known accounts.
pub struct FakeDnsService {
    zones: HashMap<DomainName, AccountName>,
    directory: MemoryDirectory,
}

impl FakeDnsService {
    #[must_use]
    pub fn new(directory: MemoryDirectory) -> Self {
        Self {
            zones: HashMap::new(),
            directory,
        }
    }

    #[must_use]
    pub fn with_zone(mut self, zone: &str, account: &str) -> Self {
        self.zones.insert(
            DomainName::new(zone).expect("valid zone"),
            AccountName::new(account).expect("valid account"),
        );
        self
    }

    /// Registers the service under every capability it offers.
    #[must_use]
    pub fn register(self) -> ServiceRegistration {
        let service = Arc::new(self);
        ServiceRegistration::new(Arc::clone(&service) as Arc<dyn Service>)
            .provides::<dyn DnsService>(Arc::clone(&service) as Arc<dyn DnsService>)
            .provides::<dyn TableService>(Arc::clone(&service) as Arc<dyn TableService>)
            .provides::<dyn AccountService>(service as Arc<dyn AccountService>)
    }

    fn owner(&self, zone: &DomainName) -> ServiceResult<&AccountName> {
        self.zones
            .get(zone)
            .ok_or_else(|| ServiceError::refused(format!("zone {zone} not found")))
    }
}

impl Service for FakeDnsService {
    fn name(&self) -> &str {
        "dns"
    }

    fn start(&self) -> Result<(), ServiceStartError> {
        Ok(())
    }
}

impl DnsService for FakeDnsService {
    fn add_record(
        &self,
        transaction: &mut dyn Transaction,
        _source: &RequestSource,
        invalidate: &mut InvalidateList,
        request: &AddDnsRecord,
    ) -> ServiceResult<i32> {
        let owner = self.owner(&request.zone)?.clone();
        let id = memory(transaction)?.insert(DnsRow {
            id: 0,
            zone: request.zone.clone(),
            domain: request.domain.clone(),
            record_type: request.record_type,
            destination: request.destination.clone(),
        });
        invalidate.record_affected(TableId::DnsRecords, Some(owner), None);
        Ok(id)
    }

    fn remove_record(
        &self,
        transaction: &mut dyn Transaction,
        _source: &RequestSource,
        invalidate: &mut InvalidateList,
        request: &RemoveDnsRecord,
    ) -> ServiceResult<()> {
        let transaction = memory(transaction)?;
        let row = transaction
            .find(request.record_id)
            .ok_or_else(|| ServiceError::refused(format!("no DNS record #{}", request.record_id)))?;
        let owner = self.owner(&row.zone)?.clone();
        transaction.remove(row.id);
        invalidate.record_affected(TableId::DnsRecords, Some(owner), None);
        Ok(())
    }
}

struct RowsCursor {
    rows: std::vec::IntoIter<DnsRow>,
}

impl RowCursor for RowsCursor {
    fn size_hint(&self) -> Option<usize> {
        Some(self.rows.len())
    }

    fn next_row(&mut self) -> Result<Option<Box<dyn WireRow>>, crate::database::DatabaseError> {
        Ok(self.rows.next().map(|row| Box::new(row) as Box<dyn WireRow>))
    }
}

impl TableService for FakeDnsService {
    fn row_count(
        &self,
        transaction: &mut dyn Transaction,
        _source: &RequestSource,
        table: TableId,
    ) -> ServiceResult<i32> {
        let rows = match table {
            TableId::DnsRecords => memory(transaction)?.database().records().len(),
            _ => 0,
        };
        Ok(i32::try_from(rows).unwrap_or(i32::MAX))
    }

    fn table_rows(
        &self,
        transaction: &mut dyn Transaction,
        _source: &RequestSource,
        table: TableId,
    ) -> ServiceResult<Box<dyn RowCursor>> {
        let rows = match table {
            TableId::DnsRecords => memory(transaction)?.database().records(),
            _ => Vec::new(),
        };
        Ok(Box::new(RowsCursor {
            rows: rows.into_iter(),
        }))
    }
}

impl AccountService for FakeDnsService {
    fn disable(
        &self,
        _transaction: &mut dyn Transaction,
        _source: &RequestSource,
        invalidate: &mut InvalidateList,
        request: &DisableAccount,
    ) -> ServiceResult<()> {
        self.directory.disable(&request.account);
        invalidate.record_affected(TableId::Accounts, Some(request.account.clone()), None);
        Ok(())
    }
}

/// A service that never manages to start.
pub struct StubbornService;

impl StubbornService {
    #[must_use]
    pub fn register() -> ServiceRegistration {
        let service = Arc::new(Self);
        ServiceRegistration::new(Arc::clone(&service) as Arc<dyn Service>)
            .provides::<dyn DnsService>(service as Arc<dyn DnsService>)
    }
}

impl Service for StubbornService {
    fn name(&self) -> &str {
        "stubborn"
    }

    fn start(&self) -> Result<(), ServiceStartError> {
        Err(ServiceStartError::new("stubborn", "zone files are locked"))
    }
}

impl DnsService for StubbornService {
    fn add_record(
        &self,
        _transaction: &mut dyn Transaction,
        _source: &RequestSource,
        _invalidate: &mut InvalidateList,
        _request: &AddDnsRecord,
    ) -> ServiceResult<i32> {
        Err(ServiceError::refused("stubborn service never serves"))
    }

    fn remove_record(
        &self,
        _transaction: &mut dyn Transaction,
        _source: &RequestSource,
        _invalidate: &mut InvalidateList,
        _request: &RemoveDnsRecord,
    ) -> ServiceResult<()> {
        Err(ServiceError::refused("stubborn service never serves"))
    }
}
