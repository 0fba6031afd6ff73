//! Registry of connections currently inside LISTEN_CACHES.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aoserv_protocol::Identifier;

use crate::source::RequestSource;

#[derive(Debug, Default)]
struct Registrations {
    by_connector: HashMap<Identifier, Vec<Arc<RequestSource>>>,
    count: usize,
}

/// Listening sources keyed by connector id.
///
/// A connector normally has one listener; a client that opens a second
/// listening connection under the same id gets a second entry.
#[derive(Debug, Default)]
pub struct CacheListenerRegistry {
    inner: Mutex<Registrations>,
}

impl CacheListenerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registrations> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `source`. Returns `false` when this exact source is already
    /// registered.
    pub fn add(&self, source: &Arc<RequestSource>) -> bool {
        let mut inner = self.lock();
        let entries = inner.by_connector.entry(source.connector()).or_default();
        if entries.iter().any(|entry| Arc::ptr_eq(entry, source)) {
            return false;
        }
        entries.push(Arc::clone(source));
        inner.count += 1;
        true
    }

    /// Removes `source`. Returns `false` when it was not registered.
    pub fn remove(&self, source: &Arc<RequestSource>) -> bool {
        let mut inner = self.lock();
        let connector = source.connector();
        let Some(entries) = inner.by_connector.get_mut(&connector) else {
            return false;
        };
        let Some(position) = entries.iter().position(|entry| Arc::ptr_eq(entry, source)) else {
            return false;
        };
        entries.swap_remove(position);
        if entries.is_empty() {
            inner.by_connector.remove(&connector);
        }
        inner.count -= 1;
        true
    }

    /// Every registered source at this instant.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<Arc<RequestSource>> {
        let inner = self.lock();
        let mut snapshot = Vec::with_capacity(inner.count);
        for entries in inner.by_connector.values() {
            snapshot.extend(entries.iter().cloned());
        }
        snapshot
    }

    /// Listeners registered under `connector`.
    #[must_use]
    pub fn listeners_for(&self, connector: Identifier) -> Vec<Arc<RequestSource>> {
        self.lock()
            .by_connector
            .get(&connector)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().count
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wakes every listener so its loop ends.
    pub fn interrupt_all(&self) {
        for source in self.snapshot_all() {
            source.mailbox().interrupt();
        }
    }

    /// Registers `source` for as long as the returned guard lives.
    pub fn register(self: &Arc<Self>, source: &Arc<RequestSource>) -> ListenerRegistration {
        self.add(source);
        ListenerRegistration {
            registry: Arc::clone(self),
            source: Arc::clone(source),
        }
    }

    #[cfg(test)]
    fn recount(&self) -> usize {
        self.lock().by_connector.values().map(Vec::len).sum()
    }
}

/// Removes its listener when dropped, including during unwinding.
#[derive(Debug)]
pub struct ListenerRegistration {
    registry: Arc<CacheListenerRegistry>,
    source: Arc<RequestSource>,
}

impl ListenerRegistration {
    /// The registered source.
    #[must_use]
    pub fn source(&self) -> &Arc<RequestSource> {
        &self.source
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.registry.remove(&self.source);
    }
}
