//! Command payloads.
//!
//! Each struct is the argument list of one [`CommandId`](crate::CommandId),
//! read by the master after the command ordinal and written by clients. Fields
//! whose shape changed between client eras consult the matching
//! [`gates`] constant, so every layout is a function of the negotiated
//! version alone.

use std::io::{Read, Write};

use strum::{EnumIter, EnumString, FromRepr, IntoStaticStr};

use crate::codec::{WireDecode, WireEncode, WireEnum, WireError, WireReader, WireWriter};
use crate::money::Money;
use crate::names::{AccountName, DomainName, HostId, UserName};
use crate::version::gates;

/// Implements [`WireEnum`] from strum's repr and string derives.
macro_rules! strum_wire_enum {
    ($name:ident, $kind:literal) => {
        impl WireEnum for $name {
            const KIND: &'static str = $kind;

            fn ordinal(self) -> u8 {
                self as u8
            }

            fn from_ordinal(ordinal: u8) -> Option<Self> {
                Self::from_repr(ordinal)
            }

            fn display_name(self) -> &'static str {
                self.into()
            }

            fn from_display_name(name: &str) -> Option<Self> {
                name.parse().ok()
            }
        }
    };
}

/// DNS resource record types the master accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr, FromRepr)]
#[repr(u8)]
pub enum DnsRecordType {
    /// Address record.
    #[strum(serialize = "A")]
    A = 0,
    /// IPv6 address record.
    #[strum(serialize = "AAAA")]
    Aaaa = 1,
    /// Canonical name.
    #[strum(serialize = "CNAME")]
    Cname = 2,
    /// Mail exchanger; carries a priority.
    #[strum(serialize = "MX")]
    Mx = 3,
    /// Name server.
    #[strum(serialize = "NS")]
    Ns = 4,
    /// Free text.
    #[strum(serialize = "TXT")]
    Txt = 5,
    /// Service locator; carries a priority.
    #[strum(serialize = "SRV")]
    Srv = 6,
}

strum_wire_enum!(DnsRecordType, "DNS record type");

/// Outcome of a card payment attached to a billing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr, FromRepr)]
#[repr(u8)]
pub enum PaymentConfirmation {
    /// The payment cleared.
    #[strum(serialize = "Y")]
    Confirmed = 0,
    /// The processor has not answered yet.
    #[strum(serialize = "W")]
    Pending = 1,
    /// The payment was declined.
    #[strum(serialize = "N")]
    Failed = 2,
}

strum_wire_enum!(PaymentConfirmation, "payment confirmation");

/// Legacy stand-in for an absent DNS priority or ttl.
const LEGACY_DNS_NONE: i32 = -1;

fn write_dns_optional<W: Write>(
    out: &mut WireWriter<W>,
    value: Option<i32>,
) -> Result<(), WireError> {
    if gates::NULLABLE_DNS_FIELDS.applies(out.version()) {
        out.write_nullable_compressed_int(value)
    } else {
        out.write_compressed_int(value.unwrap_or(LEGACY_DNS_NONE))
    }
}

fn read_dns_optional<R: Read>(input: &mut WireReader<R>) -> Result<Option<i32>, WireError> {
    if gates::NULLABLE_DNS_FIELDS.applies(input.version()) {
        input.read_nullable_compressed_int()
    } else {
        let value = input.read_compressed_int()?;
        Ok((value != LEGACY_DNS_NONE).then_some(value))
    }
}

/// `ADD_DNS_RECORD` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddDnsRecord {
    /// Zone the record belongs to.
    pub zone: DomainName,
    /// Name within the zone, `@` for the apex.
    pub domain: String,
    /// Record type.
    pub record_type: DnsRecordType,
    /// Priority for `MX` and `SRV` records.
    pub priority: Option<i32>,
    /// Target of the record.
    pub destination: String,
    /// Time to live in seconds, or the zone default when absent.
    pub ttl: Option<i32>,
}

impl WireEncode for AddDnsRecord {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write(&self.zone)?;
        out.write_utf(&self.domain)?;
        out.write_enum(self.record_type)?;
        write_dns_optional(out, self.priority)?;
        out.write_utf(&self.destination)?;
        write_dns_optional(out, self.ttl)
    }
}

impl WireDecode for AddDnsRecord {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        Ok(Self {
            zone: input.read()?,
            domain: input.read_utf()?,
            record_type: input.read_enum()?,
            priority: read_dns_optional(input)?,
            destination: input.read_utf()?,
            ttl: read_dns_optional(input)?,
        })
    }
}

/// `REMOVE_DNS_RECORD` arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveDnsRecord {
    /// Row id of the record to remove.
    pub record_id: i32,
}

impl WireEncode for RemoveDnsRecord {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write_compressed_int(self.record_id)
    }
}

impl WireDecode for RemoveDnsRecord {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        Ok(Self {
            record_id: input.read_compressed_int()?,
        })
    }
}

/// `ADD_TRANSACTION` arguments.
///
/// `quantity` is in thousandths of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTransaction {
    /// Account charged.
    pub account: AccountName,
    /// Account that caused the charge.
    pub source_account: AccountName,
    /// Administrator entering the transaction.
    pub administrator: UserName,
    /// Transaction type code.
    pub type_code: String,
    /// Free-form description.
    pub description: String,
    /// Quantity in thousandths.
    pub quantity: i32,
    /// Price per unit.
    pub rate: Money,
    /// Payment type, when the transaction is a payment.
    pub payment_type: Option<String>,
    /// Masked card or account details.
    pub payment_info: Option<String>,
    /// Payment processor name.
    pub processor: Option<String>,
    /// Payment outcome.
    pub confirmation: PaymentConfirmation,
}

impl WireEncode for AddTransaction {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write(&self.account)?;
        out.write(&self.source_account)?;
        out.write(&self.administrator)?;
        out.write_utf(&self.type_code)?;
        out.write_utf(&self.description)?;
        out.write_compressed_int(self.quantity)?;
        out.write(&self.rate)?;
        out.write_nullable_utf(self.payment_type.as_deref())?;
        out.write_nullable_utf(self.payment_info.as_deref())?;
        out.write_nullable_utf(self.processor.as_deref())?;
        out.write_enum(self.confirmation)
    }
}

impl WireDecode for AddTransaction {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        Ok(Self {
            account: input.read()?,
            source_account: input.read()?,
            administrator: input.read()?,
            type_code: input.read_utf()?,
            description: input.read_utf()?,
            quantity: input.read_compressed_int()?,
            rate: input.read()?,
            payment_type: input.read_nullable_utf()?,
            payment_info: input.read_nullable_utf()?,
            processor: input.read_nullable_utf()?,
            confirmation: input.read_enum()?,
        })
    }
}

/// `DISABLE_ACCOUNT` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableAccount {
    /// Account to disable.
    pub account: AccountName,
    /// Reason recorded with the disable.
    pub reason: Option<String>,
}

impl WireEncode for DisableAccount {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write(&self.account)?;
        out.write_nullable_utf(self.reason.as_deref())
    }
}

impl WireDecode for DisableAccount {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        Ok(Self {
            account: input.read()?,
            reason: input.read_nullable_utf()?,
        })
    }
}

/// `INVALIDATE_TABLE` arguments, naming the table in the client's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidateTable {
    /// Table to invalidate.
    pub client_table_id: i32,
    /// Limit the invalidation to one host.
    pub host: Option<HostId>,
}

impl WireEncode for InvalidateTable {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write_compressed_int(self.client_table_id)?;
        out.write_nullable(self.host, |out, host| out.write(&host))
    }
}

impl WireDecode for InvalidateTable {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        Ok(Self {
            client_table_id: input.read_compressed_int()?,
            host: input.read_nullable(|input| input.read())?,
        })
    }
}

/// `GET_ROW_COUNT` arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetRowCount {
    /// Table to count.
    pub client_table_id: i32,
}

impl WireEncode for GetRowCount {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write_compressed_int(self.client_table_id)
    }
}

impl WireDecode for GetRowCount {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        Ok(Self {
            client_table_id: input.read_compressed_int()?,
        })
    }
}

/// `GET_TABLE` arguments. With `progress` set the row count is sent before
/// the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetTable {
    /// Table to stream.
    pub client_table_id: i32,
    /// Send the row count ahead of the rows.
    pub progress: bool,
}

impl WireEncode for GetTable {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write_compressed_int(self.client_table_id)?;
        out.write_bool(self.progress)
    }
}

impl WireDecode for GetTable {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        Ok(Self {
            client_table_id: input.read_compressed_int()?,
            progress: input.read_bool()?,
        })
    }
}

/// `START_DISTRO` arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartDistro {
    /// Host whose distribution files are checked.
    pub host: HostId,
    /// Also check files owned by regular users.
    pub include_user: bool,
}

impl WireEncode for StartDistro {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write(&self.host)?;
        out.write_bool(self.include_user)
    }
}

impl WireDecode for StartDistro {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        Ok(Self {
            host: input.read()?,
            include_user: input.read_bool()?,
        })
    }
}

/// `DUMP_DATABASE` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpDatabase {
    /// Host running the database.
    pub host: HostId,
    /// Database name.
    pub database: String,
    /// Compress the dump before sending.
    pub gzip: bool,
}

impl WireEncode for DumpDatabase {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write(&self.host)?;
        out.write_utf(&self.database)?;
        out.write_bool(self.gzip)
    }
}

impl WireDecode for DumpDatabase {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        Ok(Self {
            host: input.read()?,
            database: input.read_utf()?,
            gzip: input.read_bool()?,
        })
    }
}
