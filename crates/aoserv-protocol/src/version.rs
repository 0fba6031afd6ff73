//! Protocol versions and the gates that switch wire formats between them.
//!
//! Every wire decision in the master is expressed as a [`VersionGate`]: a
//! half-open range of protocol versions in which a field is present or takes a
//! particular shape. Gates are data, so the compatibility matrix can be read in
//! one place and each boundary can be tested on both sides.

use std::fmt;
use std::str::FromStr;

use strum::{EnumCount, EnumIter, IntoEnumIterator};
use thiserror::Error;

/// Protocol versions understood by the master, oldest first.
///
/// The declaration order is the version order. New versions are appended;
/// existing variants are never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumCount)]
pub enum ProtocolVersion {
    /// `1.0a100`, the oldest client still accepted.
    V1_0_A100,
    /// `1.0a101`
    V1_0_A101,
    /// `1.0a102`
    V1_0_A102,
    /// `1.0a103`
    V1_0_A103,
    /// `1.0a104`
    V1_0_A104,
    /// `1.0a130`
    V1_0_A130,
    /// `1.30`
    V1_30,
    /// `1.62`
    V1_62,
    /// `1.79`
    V1_79,
    /// `1.80.0`
    V1_80_0,
    /// `1.81.0`
    V1_81_0,
    /// `1.82.0`
    V1_82_0,
    /// `1.83.0`
    V1_83_0,
    /// `1.84.0`
    V1_84_0,
}

impl ProtocolVersion {
    /// The newest version, offered to clients whose version is refused.
    pub const CURRENT: Self = Self::V1_84_0;

    /// Returns the string clients send during the handshake.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1_0_A100 => "1.0a100",
            Self::V1_0_A101 => "1.0a101",
            Self::V1_0_A102 => "1.0a102",
            Self::V1_0_A103 => "1.0a103",
            Self::V1_0_A104 => "1.0a104",
            Self::V1_0_A130 => "1.0a130",
            Self::V1_30 => "1.30",
            Self::V1_62 => "1.62",
            Self::V1_79 => "1.79",
            Self::V1_80_0 => "1.80.0",
            Self::V1_81_0 => "1.81.0",
            Self::V1_82_0 => "1.82.0",
            Self::V1_83_0 => "1.83.0",
            Self::V1_84_0 => "1.84.0",
        }
    }

    /// Iterates every known version from oldest to newest.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error returned when a client announces a version the master does not know.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported protocol version: {0}")]
pub struct UnsupportedVersion(pub String);

impl FromStr for ProtocolVersion {
    type Err = UnsupportedVersion;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::iter()
            .find(|version| version.as_str() == value)
            .ok_or_else(|| UnsupportedVersion(value.to_owned()))
    }
}

/// A half-open range of versions in which a wire feature applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionGate {
    name: &'static str,
    since: ProtocolVersion,
    until: Option<ProtocolVersion>,
}

impl VersionGate {
    /// A gate that applies from `since` onwards.
    #[must_use]
    pub const fn since(name: &'static str, since: ProtocolVersion) -> Self {
        Self {
            name,
            since,
            until: None,
        }
    }

    /// A gate that applies from `since` up to, but excluding, `until`.
    #[must_use]
    pub const fn window(name: &'static str, since: ProtocolVersion, until: ProtocolVersion) -> Self {
        Self {
            name,
            since,
            until: Some(until),
        }
    }

    /// Returns `true` when the feature is present for `version`.
    #[must_use]
    pub fn applies(&self, version: ProtocolVersion) -> bool {
        version >= self.since && self.until.is_none_or(|until| version < until)
    }

    /// Short name used in logs and test output.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// First version the gate applies to.
    #[must_use]
    pub const fn first(&self) -> ProtocolVersion {
        self.since
    }

    /// First version after the window, for windowed gates.
    #[must_use]
    pub const fn end(&self) -> Option<ProtocolVersion> {
        self.until
    }
}

/// Every wire-format boundary the master knows about.
pub mod gates {
    use super::{ProtocolVersion, VersionGate};

    /// Legacy window in which the response invalidation tail is prefixed by a
    /// `false` "has sync id" flag.
    pub const RESPONSE_SYNC_PREFIX: VersionGate = VersionGate::window(
        "response-sync-prefix",
        ProtocolVersion::V1_0_A101,
        ProtocolVersion::V1_0_A104,
    );

    /// Cache notices carry an optional sync id and are only acknowledged when
    /// one is present. Older clients acknowledge every notice.
    pub const CACHE_SYNC_ID: VersionGate =
        VersionGate::since("cache-sync-id", ProtocolVersion::V1_0_A104);

    /// Connector identifiers are sent as 128 bits instead of a signed long.
    pub const IDENTIFIER_128: VersionGate =
        VersionGate::since("identifier-128", ProtocolVersion::V1_80_0);

    /// Requests carry a client sequence number that the master echoes.
    pub const SEQUENCE_NUMBERS: VersionGate =
        VersionGate::since("sequence-numbers", ProtocolVersion::V1_80_0);

    /// Enumerations are sent as an ordinal byte instead of a display string.
    pub const ENUM_ORDINALS: VersionGate =
        VersionGate::since("enum-ordinals", ProtocolVersion::V1_81_0);

    /// DNS priority and ttl become nullable instead of using `-1` for "none".
    pub const NULLABLE_DNS_FIELDS: VersionGate =
        VersionGate::since("nullable-dns-fields", ProtocolVersion::V1_82_0);

    /// Money travels as currency, unscaled value and scale rather than a
    /// decimal string in US dollars.
    pub const MONEY_AS_UNSCALED: VersionGate =
        VersionGate::since("money-as-unscaled", ProtocolVersion::V1_83_0);

    /// All gates, for exhaustive boundary tests.
    pub const ALL: &[VersionGate] = &[
        RESPONSE_SYNC_PREFIX,
        CACHE_SYNC_ID,
        IDENTIFIER_128,
        SEQUENCE_NUMBERS,
        ENUM_ORDINALS,
        NULLABLE_DNS_FIELDS,
        MONEY_AS_UNSCALED,
    ];
}
