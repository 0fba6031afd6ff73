//! Connector identities.

use std::fmt;
use std::io::{Read, Write};

use rand::RngCore;
use rand::rngs::OsRng;

use crate::codec::{WireDecode, WireEncode, WireError, WireReader, WireWriter};
use crate::version::{ProtocolVersion, gates};

/// 128-bit random identity assigned to each accepted connection.
///
/// Clients older than [`gates::IDENTIFIER_128`] only see the low 64 bits as a
/// signed long, where `-1` meant "no connector". Identifiers handed to those
/// clients never use that value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier {
    hi: u64,
    lo: u64,
}

impl Identifier {
    const LEGACY_SENTINEL_LO: u64 = u64::MAX;

    /// Builds an identifier from its halves.
    #[must_use]
    pub const fn from_parts(hi: u64, lo: u64) -> Self {
        Self { hi, lo }
    }

    /// Generates a fresh identifier from the operating system's CSPRNG that
    /// is safe to hand to a client speaking `version`.
    #[must_use]
    pub fn random_for(version: ProtocolVersion) -> Self {
        let mut rng = OsRng;
        loop {
            let candidate = Self::from_parts(rng.next_u64(), rng.next_u64());
            if !candidate.is_legacy_sentinel_for(version) {
                return candidate;
            }
        }
    }

    /// Returns `true` when the identifier collides with the legacy sentinel
    /// for a client speaking `version`.
    #[must_use]
    pub fn is_legacy_sentinel_for(self, version: ProtocolVersion) -> bool {
        !gates::IDENTIFIER_128.applies(version) && self.lo == Self::LEGACY_SENTINEL_LO
    }

    /// High half.
    #[must_use]
    pub const fn hi(self) -> u64 {
        self.hi
    }

    /// Low half.
    #[must_use]
    pub const fn lo(self) -> u64 {
        self.lo
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:016x}{:016x}", self.hi, self.lo)
    }
}

impl WireEncode for Identifier {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        if gates::IDENTIFIER_128.applies(out.version()) {
            out.write_i64(self.hi.cast_signed())?;
        }
        out.write_i64(self.lo.cast_signed())
    }
}

impl WireDecode for Identifier {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        let hi = if gates::IDENTIFIER_128.applies(input.version()) {
            input.read_i64()?.cast_unsigned()
        } else {
            0
        };
        let lo = input.read_i64()?.cast_unsigned();
        Ok(Self::from_parts(hi, lo))
    }
}
