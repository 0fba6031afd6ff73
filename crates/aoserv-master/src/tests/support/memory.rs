//! In-memory database and authorization directory.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use aoserv_protocol::requests::DnsRecordType;
use aoserv_protocol::{
    AccountName, DomainName, HostId, UserName, WireEncode, WireError, WireWriter,
};

use crate::access::{AccessDirectory, AccessScope, DirectoryError};
use crate::database::{Database, DatabaseError, Transaction};
use crate::invalidate::Scope;

/// A committed DNS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRow {
    pub id: i32,
    pub zone: DomainName,
    pub domain: String,
    pub record_type: DnsRecordType,
    pub destination: String,
}

impl WireEncode for DnsRow {
    fn encode<W: std::io::Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write_compressed_int(self.id)?;
        out.write_utf(self.zone.as_str())?;
        out.write_utf(&self.domain)?;
        out.write_enum(self.record_type)?;
        out.write_utf(&self.destination)
    }
}

#[derive(Debug, Default)]
struct Store {
    records: BTreeMap<i32, DnsRow>,
    next_id: i32,
    commits: usize,
    rollbacks: usize,
    fail_commits: bool,
    unreachable: bool,
}

/// Database whose transactions stage DNS rows until commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    store: Arc<Mutex<Store>>,
}

impl MemoryDatabase {
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().expect("memory database mutex poisoned")
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }

    #[must_use]
    pub fn records(&self) -> Vec<DnsRow> {
        self.lock().records.values().cloned().collect()
    }

    #[must_use]
    pub fn record(&self, id: i32) -> Option<DnsRow> {
        self.lock().records.get(&id).cloned()
    }

    pub fn fail_commits(&self) {
        self.lock().fail_commits = true;
    }

    pub fn go_offline(&self) {
        self.lock().unreachable = true;
    }
}

impl Database for MemoryDatabase {
    fn begin(&self) -> Result<Box<dyn Transaction>, DatabaseError> {
        if self.lock().unreachable {
            return Err(DatabaseError::new("connection refused"));
        }
        Ok(Box::new(MemoryTransaction {
            database: self.clone(),
            inserts: Vec::new(),
            removals: Vec::new(),
        }))
    }
}

/// Staged writes against a [`MemoryDatabase`].
pub struct MemoryTransaction {
    database: MemoryDatabase,
    inserts: Vec<DnsRow>,
    removals: Vec<i32>,
}

impl MemoryTransaction {
    pub fn insert(&mut self, mut row: DnsRow) -> i32 {
        let mut store = self.database.lock();
        store.next_id += 1;
        row.id = store.next_id;
        drop(store);
        let id = row.id;
        self.inserts.push(row);
        id
    }

    #[must_use]
    pub fn find(&self, id: i32) -> Option<DnsRow> {
        if self.removals.contains(&id) {
            return None;
        }
        self.inserts
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .or_else(|| self.database.record(id))
    }

    pub fn remove(&mut self, id: i32) {
        self.inserts.retain(|row| row.id != id);
        self.removals.push(id);
    }

    #[must_use]
    pub fn database(&self) -> &MemoryDatabase {
        &self.database
    }
}

impl Transaction for MemoryTransaction {
    fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let mut store = self.database.lock();
        if store.fail_commits {
            store.rollbacks += 1;
            return Err(DatabaseError::new("could not serialize access"));
        }
        for id in &self.removals {
            store.records.remove(id);
        }
        for row in self.inserts {
            store.records.insert(row.id, row);
        }
        store.commits += 1;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        self.database.lock().rollbacks += 1;
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug)]
struct Administrator {
    account: AccountName,
    scope: AccessScope,
}

#[derive(Debug, Default)]
struct Directory {
    administrators: HashMap<UserName, Administrator>,
    disabled: BTreeSet<AccountName>,
}

/// Administrators, their scopes and which accounts are disabled.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<Directory>>,
}

impl MemoryDirectory {
    fn lock(&self) -> MutexGuard<'_, Directory> {
        self.state.lock().expect("memory directory mutex poisoned")
    }

    /// Adds `user` belonging to `account`, seeing that account on `hosts`.
    pub fn add_administrator(&self, user: &str, account: &str, hosts: &[i32]) {
        let account = AccountName::new(account).expect("valid account");
        let scope = AccessScope {
            accounts: Scope::Only([account.clone()].into_iter().collect()),
            hosts: Scope::Only(
                hosts
                    .iter()
                    .map(|id| HostId::new(*id).expect("valid host"))
                    .collect(),
            ),
        };
        self.insert(user, account, scope);
    }

    /// Adds `user` seeing everything.
    pub fn add_superuser(&self, user: &str, account: &str) {
        let account = AccountName::new(account).expect("valid account");
        self.insert(user, account, AccessScope::unrestricted());
    }

    fn insert(&self, user: &str, account: AccountName, scope: AccessScope) {
        self.lock().administrators.insert(
            UserName::new(user).expect("valid user"),
            Administrator { account, scope },
        );
    }

    pub fn disable(&self, account: &AccountName) {
        self.lock().disabled.insert(account.clone());
    }
}

impl AccessDirectory for MemoryDirectory {
    fn load_scope(&self, user: &UserName) -> Result<AccessScope, DirectoryError> {
        self.lock()
            .administrators
            .get(user)
            .map(|admin| admin.scope.clone())
            .ok_or_else(|| DirectoryError::new(format!("{user} is not an administrator")))
    }

    fn is_disabled(&self, user: &UserName) -> Result<bool, DirectoryError> {
        let directory = self.lock();
        let admin = directory
            .administrators
            .get(user)
            .ok_or_else(|| DirectoryError::new(format!("{user} is not an administrator")))?;
        Ok(directory.disabled.contains(&admin.account))
    }

    fn failover_parent(&self, _host: HostId) -> Result<Option<HostId>, DirectoryError> {
        Ok(None)
    }
}
