//! Server-side waiters for synchronised invalidations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use aoserv_protocol::SyncId;

#[derive(Debug, Default)]
struct Waiter {
    released: Mutex<bool>,
    signal: Condvar,
}

impl Waiter {
    fn released(&self) -> MutexGuard<'_, bool> {
        self.released.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Issues sync ids and wakes whoever waits on them once a listener acks.
#[derive(Debug, Default)]
pub struct SyncWaiters {
    next_id: AtomicI64,
    waiting: Mutex<HashMap<SyncId, Arc<Waiter>>>,
}

impl SyncWaiters {
    /// No pending waits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn waiting(&self) -> MutexGuard<'_, HashMap<SyncId, Arc<Waiter>>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a sync id with a waiter attached.
    pub fn register(self: &Arc<Self>) -> SyncTicket {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let waiter = Arc::new(Waiter::default());
        self.waiting().insert(id, Arc::clone(&waiter));
        SyncTicket {
            id,
            waiter,
            owner: Arc::clone(self),
        }
    }

    /// Releases the waiter for `id`. Unknown ids are ignored; the waiter may
    /// already have timed out.
    pub fn release(&self, id: SyncId) {
        let waiter = self.waiting().remove(&id);
        if let Some(waiter) = waiter {
            *waiter.released() = true;
            waiter.signal.notify_all();
        }
    }

    /// Number of unsettled waits.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.waiting().len()
    }
}

/// A registered sync id. Dropping the ticket forgets the waiter.
#[derive(Debug)]
pub struct SyncTicket {
    id: SyncId,
    waiter: Arc<Waiter>,
    owner: Arc<SyncWaiters>,
}

impl SyncTicket {
    /// Sync id the listener must echo.
    #[must_use]
    pub const fn id(&self) -> SyncId {
        self.id
    }

    /// Blocks until the id is released or `timeout` elapses. Returns `true`
    /// when released.
    #[must_use]
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut released = self.waiter.released();
        while !*released {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            released = self
                .waiter
                .signal
                .wait_timeout(released, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        true
    }
}

impl Drop for SyncTicket {
    fn drop(&mut self) {
        self.owner.waiting().remove(&self.id);
    }
}
