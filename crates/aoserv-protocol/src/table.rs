//! Stable table kinds and their per-version client numbering.
//!
//! Each client era sees its own subset of tables, numbered densely in server
//! ordinal order. A [`TableId`] that did not exist yet, or no longer exists,
//! for a client's version has no client id at all; callers treat that as
//! "unrecognized" and drop it rather than failing.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use strum::{Display, EnumCount, EnumIter, FromRepr, IntoEnumIterator};

use crate::version::ProtocolVersion;

/// Logical tables that take part in cache invalidation, by stable ordinal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount, FromRepr,
)]
#[repr(u16)]
pub enum TableId {
    /// Business accounts.
    #[strum(serialize = "account.Account")]
    Accounts = 0,
    /// Hosts each account may use.
    #[strum(serialize = "account.AccountHost")]
    AccountHosts = 1,
    /// Administrators and their credentials.
    #[strum(serialize = "account.Administrator")]
    Administrators = 2,
    /// DNS records.
    #[strum(serialize = "dns.Record")]
    DnsRecords = 3,
    /// DNS zones.
    #[strum(serialize = "dns.Zone")]
    DnsZones = 4,
    /// Servers.
    #[strum(serialize = "net.Host")]
    Hosts = 5,
    /// IP addresses bound to network devices.
    #[strum(serialize = "net.IpAddress")]
    IpAddresses = 6,
    /// Network devices.
    #[strum(serialize = "net.Device")]
    NetDevices = 7,
    /// Login names.
    #[strum(serialize = "account.User")]
    Usernames = 8,
    /// Linux shell accounts.
    #[strum(serialize = "linux.User")]
    LinuxAccounts = 9,
    /// Billing transactions.
    #[strum(serialize = "billing.Transaction")]
    Transactions = 10,
    /// Hosts a master user may administer.
    #[strum(serialize = "master.UserHost")]
    MasterHosts = 11,
    /// Master users.
    #[strum(serialize = "master.User")]
    MasterUsers = 12,
    /// Failover file replications; their changes move failover parents.
    #[strum(serialize = "backup.FileReplication")]
    FailoverFileReplications = 13,
    /// Email domains.
    #[strum(serialize = "email.Domain")]
    EmailDomains = 14,
    /// MySQL databases.
    #[strum(serialize = "mysql.Database")]
    MysqlDatabases = 15,
    /// PostgreSQL databases.
    #[strum(serialize = "postgresql.Database")]
    PostgresDatabases = 16,
    /// Majordomo list servers, gone since 1.83.0.
    #[strum(serialize = "email.MajordomoServer")]
    MajordomoServers = 17,
    /// Distribution file checksums.
    #[strum(serialize = "distribution.management.DistroFile")]
    DistroFiles = 18,
    /// SpamAssassin modes, gone since 1.82.0.
    #[strum(serialize = "email.SpamAssassinMode")]
    SpamAssassinModes = 19,
    /// Currencies, introduced with unscaled money.
    #[strum(serialize = "billing.Currency")]
    Currencies = 20,
}

impl TableId {
    /// Terminator written after a list of client table ids.
    pub const END_OF_LIST: i32 = -1;

    /// Stable server ordinal.
    #[must_use]
    pub const fn ordinal(self) -> u16 {
        self as u16
    }

    /// Looks up a table by server ordinal.
    #[must_use]
    pub fn from_ordinal(ordinal: u16) -> Option<Self> {
        Self::from_repr(ordinal)
    }

    /// First protocol version whose clients know this table.
    #[must_use]
    pub const fn introduced(self) -> ProtocolVersion {
        match self {
            Self::DistroFiles => ProtocolVersion::V1_0_A104,
            Self::Currencies => ProtocolVersion::V1_83_0,
            _ => ProtocolVersion::V1_0_A100,
        }
    }

    /// First protocol version whose clients no longer know this table.
    #[must_use]
    pub const fn removed(self) -> Option<ProtocolVersion> {
        match self {
            Self::SpamAssassinModes => Some(ProtocolVersion::V1_82_0),
            Self::MajordomoServers => Some(ProtocolVersion::V1_83_0),
            _ => None,
        }
    }

    /// Returns `true` when clients speaking `version` know this table.
    #[must_use]
    pub fn is_visible_to(self, version: ProtocolVersion) -> bool {
        version >= self.introduced() && self.removed().is_none_or(|removed| version < removed)
    }

    /// Client-side id of this table for `version`, if the client knows it.
    #[must_use]
    pub fn client_id(self, version: ProtocolVersion) -> Option<i32> {
        client_map(version).and_then(|map| map.client_ids.get(&self).copied())
    }

    /// Server table for a client-side id, if `version` defines one.
    #[must_use]
    pub fn from_client_id(version: ProtocolVersion, client_id: i32) -> Option<Self> {
        let index = usize::try_from(client_id).ok()?;
        client_map(version)?.tables.get(index).copied()
    }

    /// Tables visible to `version`, in client id order.
    pub fn visible_to(version: ProtocolVersion) -> impl Iterator<Item = Self> {
        client_map(version)
            .into_iter()
            .flat_map(|map| map.tables.iter().copied())
    }
}

#[derive(Debug)]
struct ClientTableMap {
    client_ids: HashMap<TableId, i32>,
    tables: Vec<TableId>,
}

impl ClientTableMap {
    fn build(version: ProtocolVersion) -> Self {
        let tables: Vec<TableId> = TableId::iter()
            .filter(|table| table.is_visible_to(version))
            .collect();
        let client_ids = tables.iter().copied().zip(0_i32..).collect();
        Self { client_ids, tables }
    }
}

static CLIENT_MAPS: Lazy<HashMap<ProtocolVersion, ClientTableMap>> = Lazy::new(|| {
    ProtocolVersion::all()
        .map(|version| (version, ClientTableMap::build(version)))
        .collect()
});

fn client_map(version: ProtocolVersion) -> Option<&'static ClientTableMap> {
    CLIENT_MAPS.get(&version)
}
