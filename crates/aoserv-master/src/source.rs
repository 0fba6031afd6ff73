//! The authenticated side of a connection and its notice mailbox.

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use aoserv_protocol::{Identifier, ProtocolVersion, SyncId, UserName};

/// Invalidation waiting to be pushed to a listening client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheNotice {
    /// Client-side table ids, already translated for the listener's version.
    pub client_table_ids: BTreeSet<i32>,
    /// Waiters released when the client acknowledges this notice.
    pub sync_ids: Vec<SyncId>,
}

impl CacheNotice {
    /// A notice naming `client_table_ids`.
    #[must_use]
    pub fn tables(client_table_ids: impl IntoIterator<Item = i32>) -> Self {
        Self {
            client_table_ids: client_table_ids.into_iter().collect(),
            sync_ids: Vec::new(),
        }
    }

    /// Attaches the sync id the listener must acknowledge.
    #[must_use]
    pub fn with_sync_id(mut self, sync_id: SyncId) -> Self {
        self.sync_ids.push(sync_id);
        self
    }

    fn absorb(&mut self, other: Self) {
        self.client_table_ids.extend(other.client_table_ids);
        self.sync_ids.extend(other.sync_ids);
    }
}

/// What a listener woke up to.
#[derive(Debug, PartialEq, Eq)]
pub enum MailboxEvent {
    /// A notice arrived.
    Notice(CacheNotice),
    /// Nothing arrived before the timeout.
    TimedOut,
    /// The mailbox was interrupted.
    Interrupted,
}

#[derive(Debug, Default)]
struct MailboxState {
    pending: Option<CacheNotice>,
    interrupted: bool,
}

/// Single-slot mailbox. A notice posted while another is pending is merged
/// into it, so nothing is lost between wake-ups.
#[derive(Debug, Default)]
pub struct Mailbox {
    state: Mutex<MailboxState>,
    ready: Condvar,
}

impl Mailbox {
    fn lock(&self) -> MutexGuard<'_, MailboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deposits a notice and wakes the listener.
    pub fn post(&self, notice: CacheNotice) {
        let mut state = self.lock();
        match state.pending.as_mut() {
            Some(pending) => pending.absorb(notice),
            None => state.pending = Some(notice),
        }
        drop(state);
        self.ready.notify_all();
    }

    /// Ends the listener's wait for good.
    pub fn interrupt(&self) {
        self.lock().interrupted = true;
        self.ready.notify_all();
    }

    /// Whether the mailbox has been interrupted.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.lock().interrupted
    }

    /// Blocks until a notice arrives, the mailbox is interrupted or `timeout`
    /// elapses. Interruption wins over a pending notice.
    pub fn wait(&self, timeout: Duration) -> MailboxEvent {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.interrupted {
                return MailboxEvent::Interrupted;
            }
            if let Some(notice) = state.pending.take() {
                return MailboxEvent::Notice(notice);
            }
            let now = Instant::now();
            if now >= deadline {
                return MailboxEvent::TimedOut;
            }
            state = self
                .ready
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

/// Who is on the other end of a connection.
#[derive(Debug)]
pub struct RequestSource {
    version: ProtocolVersion,
    user: UserName,
    connector: Identifier,
    mailbox: Mailbox,
}

impl RequestSource {
    /// A source for an authenticated session.
    #[must_use]
    pub fn new(version: ProtocolVersion, user: UserName, connector: Identifier) -> Self {
        Self {
            version,
            user,
            connector,
            mailbox: Mailbox::default(),
        }
    }

    /// Protocol version the client speaks.
    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Authenticated administrator.
    #[must_use]
    pub const fn user(&self) -> &UserName {
        &self.user
    }

    /// Connector id the client chose.
    #[must_use]
    pub const fn connector(&self) -> Identifier {
        self.connector
    }

    /// Where notices for this session are posted.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}
