//! Delivery of committed invalidations to listening clients.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use aoserv_protocol::{HostId, Identifier, TableId};
use tracing::{debug, warn};

use crate::access::{AccessCache, DirectoryError};
use crate::invalidate::{InvalidateList, Scope};
use crate::listeners::CacheListenerRegistry;
use crate::source::{CacheNotice, RequestSource};
use crate::sync::SyncWaiters;

const INVALIDATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::invalidation");

/// Tables whose rows stay visible to the owner of a failover source host
/// after being replicated onto the failover target.
pub const FAILOVER_SENSITIVE_TABLES: [TableId; 5] = [
    TableId::AccountHosts,
    TableId::IpAddresses,
    TableId::LinuxAccounts,
    TableId::NetDevices,
    TableId::Usernames,
];

/// Result of a synchronised invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The connector acknowledged the notice.
    Acknowledged,
    /// The connector was listening but did not acknowledge in time.
    TimedOut,
    /// No listener was registered for the connector.
    NotListening,
}

/// Pushes invalidations to every listener allowed to see them.
pub struct Invalidator {
    listeners: Arc<CacheListenerRegistry>,
    access: Arc<AccessCache>,
    waiters: Arc<SyncWaiters>,
    failover_tables: BTreeSet<TableId>,
}

impl Invalidator {
    /// An invalidator over the shared listener and waiter registries.
    #[must_use]
    pub fn new(
        listeners: Arc<CacheListenerRegistry>,
        access: Arc<AccessCache>,
        waiters: Arc<SyncWaiters>,
    ) -> Self {
        Self {
            listeners,
            access,
            waiters,
            failover_tables: FAILOVER_SENSITIVE_TABLES.into_iter().collect(),
        }
    }

    /// Replaces the tables that inherit visibility from a failover parent.
    #[must_use]
    pub fn with_failover_tables(mut self, tables: impl IntoIterator<Item = TableId>) -> Self {
        self.failover_tables = tables.into_iter().collect();
        self
    }

    /// Notifies every listener except `origin` of the tables in `list` it may
    /// see. Returns how many listeners were notified.
    pub fn invalidate_tables(&self, list: &InvalidateList, origin: Option<Identifier>) -> usize {
        if list.is_empty() {
            return 0;
        }
        self.access.invalidate(list);

        let mut notified = 0;
        for listener in self.listeners.snapshot_all() {
            if origin == Some(listener.connector()) {
                continue;
            }
            match self.visible_client_ids(list, &listener) {
                Ok(ids) if ids.is_empty() => {}
                Ok(ids) => {
                    listener.mailbox().post(CacheNotice::tables(ids));
                    notified += 1;
                }
                Err(error) => warn!(
                    target: INVALIDATION_TARGET,
                    connector = %listener.connector(),
                    user = %listener.user(),
                    %error,
                    "skipping listener whose access could not be resolved"
                ),
            }
        }
        debug!(
            target: INVALIDATION_TARGET,
            tables = ?list.tables().collect::<Vec<_>>(),
            notified,
            "invalidation delivered"
        );
        notified
    }

    /// Notifies everyone else, then pushes `list` to `connector` tagged with
    /// a sync id and waits up to `timeout` for its acknowledgement.
    pub fn sync_tables(
        &self,
        list: &InvalidateList,
        connector: Identifier,
        timeout: Duration,
    ) -> SyncOutcome {
        self.invalidate_tables(list, Some(connector));

        let targets = self.listeners.listeners_for(connector);
        if targets.is_empty() {
            return SyncOutcome::NotListening;
        }
        let ticket = self.waiters.register();
        for listener in &targets {
            let ids = list.client_table_ids(listener.version());
            listener
                .mailbox()
                .post(CacheNotice::tables(ids).with_sync_id(ticket.id()));
        }
        if ticket.wait(timeout) {
            SyncOutcome::Acknowledged
        } else {
            warn!(
                target: INVALIDATION_TARGET,
                %connector,
                sync_id = ticket.id(),
                "synchronised invalidation was not acknowledged in time"
            );
            SyncOutcome::TimedOut
        }
    }

    fn visible_client_ids(
        &self,
        list: &InvalidateList,
        listener: &RequestSource,
    ) -> Result<Vec<i32>, DirectoryError> {
        let version = listener.version();
        let scope = self.access.scope(listener.user())?;
        let mut ids = Vec::new();
        for table in list.tables() {
            let Some(client_id) = table.client_id(version) else {
                continue;
            };
            let (Some(accounts), Some(hosts)) =
                (list.affected_accounts(table), list.affected_hosts(table))
            else {
                continue;
            };
            if !reaches(accounts, &scope.accounts) {
                continue;
            }
            if reaches(hosts, &scope.hosts)
                || (self.failover_tables.contains(&table)
                    && self.reaches_through_failover(hosts, &scope.hosts)?)
            {
                ids.push(client_id);
            }
        }
        Ok(ids)
    }

    fn reaches_through_failover(
        &self,
        affected: &Scope<HostId>,
        visible: &Scope<HostId>,
    ) -> Result<bool, DirectoryError> {
        let Scope::Only(hosts) = affected else {
            return Ok(true);
        };
        for host in hosts {
            if let Some(parent) = self.access.failover_parent(*host)?
                && visible.contains(&parent)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn reaches<T: Ord>(affected: &Scope<T>, visible: &Scope<T>) -> bool {
    affected.is_all() || visible.intersects(affected)
}
