//! Authorization data and the caches derived from it.
//!
//! Fan-out asks the same questions for every listener on every change, so the
//! answers are cached per user and per host. The caches are dropped by the
//! same table signals that drive client invalidation.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aoserv_protocol::{AccountName, HostId, TableId, UserName};
use thiserror::Error;
use tracing::debug;

use crate::invalidate::{InvalidateList, Scope};

const ACCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::access");

/// Failure looking up authorization data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("authorization lookup failed: {message}")]
pub struct DirectoryError {
    message: String,
}

impl DirectoryError {
    /// A failure described by `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Accounts and hosts a user may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessScope {
    /// Visible accounts.
    pub accounts: Scope<AccountName>,
    /// Visible hosts.
    pub hosts: Scope<HostId>,
}

impl AccessScope {
    /// A scope that sees everything, as a master administrator does.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            accounts: Scope::All,
            hosts: Scope::All,
        }
    }
}

/// Source of authorization facts, normally backed by the master database.
#[cfg_attr(test, mockall::automock)]
pub trait AccessDirectory: Send + Sync {
    /// Accounts and hosts `user` may see.
    fn load_scope(&self, user: &UserName) -> Result<AccessScope, DirectoryError>;

    /// Whether `user` or its account has been disabled.
    fn is_disabled(&self, user: &UserName) -> Result<bool, DirectoryError>;

    /// Host that `host` replicates from, when it is a failover target.
    fn failover_parent(&self, host: HostId) -> Result<Option<HostId>, DirectoryError>;
}

/// Tables whose changes make cached scopes and disabled flags stale.
const SCOPE_TABLES: [TableId; 5] = [
    TableId::Accounts,
    TableId::AccountHosts,
    TableId::Administrators,
    TableId::MasterHosts,
    TableId::MasterUsers,
];

/// Tables whose changes make cached failover parents stale.
const FAILOVER_TABLES: [TableId; 2] = [TableId::Hosts, TableId::FailoverFileReplications];

#[derive(Debug)]
struct MemoState<K, V> {
    /// Bumped by every clear. A load that straddles a clear is not kept.
    generation: u64,
    entries: HashMap<K, V>,
}

#[derive(Debug)]
struct Memo<K, V> {
    state: Mutex<MemoState<K, V>>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            state: Mutex::new(MemoState {
                generation: 0,
                entries: HashMap::new(),
            }),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Memo<K, V> {
    fn get_or_load(
        &self,
        key: &K,
        load: impl FnOnce() -> Result<V, DirectoryError>,
    ) -> Result<V, DirectoryError> {
        let generation = {
            let state = self.lock();
            if let Some(value) = state.entries.get(key) {
                return Ok(value.clone());
            }
            state.generation
        };
        let value = load()?;
        let mut state = self.lock();
        if state.generation == generation {
            state.entries.insert(key.clone(), value.clone());
        }
        Ok(value)
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        state.entries.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MemoState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Caching front for an [`AccessDirectory`].
pub struct AccessCache {
    directory: Arc<dyn AccessDirectory>,
    scopes: Memo<UserName, Arc<AccessScope>>,
    disabled: Memo<UserName, bool>,
    failover_parents: Memo<HostId, Option<HostId>>,
}

impl AccessCache {
    /// An empty cache in front of `directory`.
    #[must_use]
    pub fn new(directory: Arc<dyn AccessDirectory>) -> Self {
        Self {
            directory,
            scopes: Memo::default(),
            disabled: Memo::default(),
            failover_parents: Memo::default(),
        }
    }

    /// The user's visible accounts and hosts.
    pub fn scope(&self, user: &UserName) -> Result<Arc<AccessScope>, DirectoryError> {
        self.scopes
            .get_or_load(user, || self.directory.load_scope(user).map(Arc::new))
    }

    /// Whether the user is disabled.
    pub fn is_disabled(&self, user: &UserName) -> Result<bool, DirectoryError> {
        self.disabled
            .get_or_load(user, || self.directory.is_disabled(user))
    }

    /// The host `host` replicates from, if it is a failover copy.
    pub fn failover_parent(&self, host: HostId) -> Result<Option<HostId>, DirectoryError> {
        self.failover_parents
            .get_or_load(&host, || self.directory.failover_parent(host))
    }

    /// Drops whatever `list` makes stale.
    pub fn invalidate(&self, list: &InvalidateList) {
        if SCOPE_TABLES.iter().any(|table| list.is_invalid(*table)) {
            debug!(target: ACCESS_TARGET, "dropping cached access scopes");
            self.scopes.clear();
            self.disabled.clear();
        }
        if FAILOVER_TABLES.iter().any(|table| list.is_invalid(*table)) {
            debug!(target: ACCESS_TARGET, "dropping cached failover parents");
            self.failover_parents.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use rstest::rstest;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::thread;

    fn user() -> UserName {
        UserName::new("admin").expect("valid user")
    }

    #[rstest]
    fn scopes_are_loaded_once_until_invalidated() {
        let mut directory = MockAccessDirectory::new();
        directory
            .expect_load_scope()
            .times(2)
            .returning(|_| Ok(AccessScope::unrestricted()));
        let cache = AccessCache::new(Arc::new(directory));

        cache.scope(&user()).expect("first load");
        cache.scope(&user()).expect("cached");

        let mut list = InvalidateList::new();
        list.record_all(TableId::DnsRecords);
        cache.invalidate(&list);
        cache.scope(&user()).expect("still cached");

        list.record_all(TableId::AccountHosts);
        cache.invalidate(&list);
        cache.scope(&user()).expect("reloaded");
    }

    #[rstest]
    fn failover_parents_follow_host_tables() {
        let host = HostId::new(7).expect("host");
        let parent = HostId::new(2).expect("host");
        let mut directory = MockAccessDirectory::new();
        directory
            .expect_failover_parent()
            .with(eq(host))
            .times(2)
            .returning(move |_| Ok(Some(parent)));
        let cache = AccessCache::new(Arc::new(directory));

        assert_eq!(cache.failover_parent(host), Ok(Some(parent)));
        let mut list = InvalidateList::new();
        list.record_all(TableId::FailoverFileReplications);
        cache.invalidate(&list);
        assert_eq!(cache.failover_parent(host), Ok(Some(parent)));
    }

    #[rstest]
    fn failed_lookups_are_not_cached() {
        let mut directory = MockAccessDirectory::new();
        let mut calls = 0;
        directory.expect_is_disabled().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(DirectoryError::new("database unavailable"))
            } else {
                Ok(false)
            }
        });
        let cache = AccessCache::new(Arc::new(directory));

        assert!(cache.is_disabled(&user()).is_err());
        assert_eq!(cache.is_disabled(&user()), Ok(false));
    }

    /// Answers `is_disabled` from a flag, pausing after the read until the
    /// test lets it return.
    struct StallingDirectory {
        disabled: AtomicBool,
        reached: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl AccessDirectory for StallingDirectory {
        fn load_scope(&self, _user: &UserName) -> Result<AccessScope, DirectoryError> {
            Ok(AccessScope::unrestricted())
        }

        fn is_disabled(&self, _user: &UserName) -> Result<bool, DirectoryError> {
            let seen = self.disabled.load(Ordering::SeqCst);
            self.reached
                .lock()
                .expect("reached lock")
                .send(())
                .expect("test waiting");
            self.release
                .lock()
                .expect("release lock")
                .recv()
                .expect("test releases the lookup");
            Ok(seen)
        }

        fn failover_parent(&self, _host: HostId) -> Result<Option<HostId>, DirectoryError> {
            Ok(None)
        }
    }

    #[rstest]
    fn lookup_overtaken_by_a_disable_is_not_remembered() {
        let (reached_tx, reached) = mpsc::channel();
        let (release, release_rx) = mpsc::channel();
        let directory = Arc::new(StallingDirectory {
            disabled: AtomicBool::new(false),
            reached: Mutex::new(reached_tx),
            release: Mutex::new(release_rx),
        });
        let cache = AccessCache::new(Arc::clone(&directory) as Arc<dyn AccessDirectory>);

        thread::scope(|scope| {
            let lookup = scope.spawn(|| cache.is_disabled(&user()));
            reached.recv().expect("lookup started");

            directory.disabled.store(true, Ordering::SeqCst);
            let mut list = InvalidateList::new();
            list.record_all(TableId::Accounts);
            cache.invalidate(&list);

            release.send(()).expect("release first lookup");
            assert_eq!(lookup.join().expect("lookup thread"), Ok(false));
        });

        release.send(()).expect("release second lookup");
        assert_eq!(cache.is_disabled(&user()), Ok(true));
        reached.recv().expect("second lookup went to the directory");
    }
}
