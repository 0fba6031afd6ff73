//! Request-scoped record of which tables a command changed, and for whom.

use std::collections::{BTreeMap, BTreeSet};

use aoserv_protocol::{AccountName, HostId, ProtocolVersion, TableId};

/// Which accounts or hosts a table change touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope<T: Ord> {
    /// Everyone; the change was not scoped.
    All,
    /// Only these members.
    Only(BTreeSet<T>),
}

impl<T: Ord> Default for Scope<T> {
    fn default() -> Self {
        Self::Only(BTreeSet::new())
    }
}

impl<T: Ord> Scope<T> {
    /// Widens the scope. `None` means "everyone" and is permanent.
    pub fn add(&mut self, member: Option<T>) {
        match member {
            None => *self = Self::All,
            Some(member) => {
                if let Self::Only(members) = self {
                    members.insert(member);
                }
            }
        }
    }

    /// Whether `member` falls inside the scope.
    #[must_use]
    pub fn contains(&self, member: &T) -> bool {
        match self {
            Self::All => true,
            Self::Only(members) => members.contains(member),
        }
    }

    /// Whether the scope covers everything.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Returns `true` when any member of `other` is in this scope.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::All, Self::All) => true,
            (Self::All, Self::Only(members)) | (Self::Only(members), Self::All) => {
                !members.is_empty()
            }
            (Self::Only(left), Self::Only(right)) => !left.is_disjoint(right),
        }
    }

    fn merge(&mut self, other: Self) {
        match other {
            Self::All => *self = Self::All,
            Self::Only(members) => {
                if let Self::Only(mine) = self {
                    mine.extend(members);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Affected {
    accounts: Scope<AccountName>,
    hosts: Scope<HostId>,
}

/// Tables a single request invalidated.
///
/// Owned by one request and never shared across threads while it is being
/// filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidateList {
    tables: BTreeMap<TableId, Affected>,
}

impl InvalidateList {
    /// An empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `table` changed for `account` on `host`. A `None` on either axis
    /// widens that axis to everyone.
    pub fn record_affected(
        &mut self,
        table: TableId,
        account: Option<AccountName>,
        host: Option<HostId>,
    ) {
        let affected = self.tables.entry(table).or_default();
        affected.accounts.add(account);
        affected.hosts.add(host);
    }

    /// Marks `table` changed for everyone everywhere.
    pub fn record_all(&mut self, table: TableId) {
        self.record_affected(table, None, None);
    }

    /// Whether `table` has been marked.
    #[must_use]
    pub fn is_invalid(&self, table: TableId) -> bool {
        self.tables.contains_key(&table)
    }

    /// Accounts affected by changes to `table`, or `None` when the table is
    /// untouched.
    #[must_use]
    pub fn affected_accounts(&self, table: TableId) -> Option<&Scope<AccountName>> {
        self.tables.get(&table).map(|affected| &affected.accounts)
    }

    /// Hosts affected by changes to `table`, if it was marked.
    #[must_use]
    pub fn affected_hosts(&self, table: TableId) -> Option<&Scope<HostId>> {
        self.tables.get(&table).map(|affected| &affected.hosts)
    }

    /// Invalidated tables in server ordinal order.
    pub fn tables(&self) -> impl Iterator<Item = TableId> + '_ {
        self.tables.keys().copied()
    }

    /// Whether nothing has been marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Client-side ids for `version`, silently dropping tables the client
    /// does not know.
    #[must_use]
    pub fn client_table_ids(&self, version: ProtocolVersion) -> Vec<i32> {
        self.tables()
            .filter_map(|table| table.client_id(version))
            .collect()
    }

    /// Folds another list into this one.
    pub fn merge(&mut self, other: Self) {
        for (table, affected) in other.tables {
            let mine = self.tables.entry(table).or_default();
            mine.accounts.merge(affected.accounts);
            mine.hosts.merge(affected.hosts);
        }
    }
}
