//! Stable command codes.

use strum::{Display, EnumCount, EnumIter, FromRepr};

/// Commands a client can send, by stable ordinal.
///
/// Old clients send raw ordinals, so variants are only ever appended and an
/// existing discriminant is never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount, FromRepr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum CommandId {
    /// Liveness probe; answered without touching the database.
    Ping = 0,
    /// Ends the session.
    Quit = 1,
    /// Connectivity probe used by monitoring.
    TestConnection = 2,
    /// Enters the long-poll cache invalidation loop.
    ListenCaches = 3,
    /// Counts the rows of one table visible to the caller.
    GetRowCount = 4,
    /// Streams the rows of one table visible to the caller.
    GetTable = 5,
    /// Adds a DNS resource record.
    AddDnsRecord = 6,
    /// Removes a DNS resource record.
    RemoveDnsRecord = 7,
    /// Records a billing transaction.
    AddTransaction = 8,
    /// Disables a business account.
    DisableAccount = 9,
    /// Asks the master to broadcast an invalidation for one table.
    InvalidateTable = 10,
    /// Starts a distribution file verification run on a host.
    StartDistro = 11,
    /// Streams a database dump from a host.
    DumpDatabase = 12,
}

impl CommandId {
    /// Ordinal sent on the wire when the client closes the session without
    /// [`CommandId::Quit`].
    pub const END_OF_STREAM: i32 = -1;

    /// Wire ordinal.
    #[must_use]
    pub const fn ordinal(self) -> i32 {
        self as i32
    }

    /// Looks up a command by wire ordinal.
    #[must_use]
    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        u8::try_from(ordinal).ok().and_then(Self::from_repr)
    }
}
