//! Wire-level vocabulary shared by the AOServ master and its clients.
//!
//! The crate is pure data and codec: protocol versions and the gates that
//! switch encodings between them, the primitive reader and writer, stable
//! command and table enumerations with per-version client numbering, and the
//! payloads of the representative command set. The server lives in
//! `aoserv-master`.

pub mod codec;
pub mod command;
pub mod identifier;
pub mod money;
pub mod names;
pub mod notice;
pub mod requests;
pub mod status;
pub mod table;
pub mod version;

pub use codec::{WireDecode, WireEncode, WireEnum, WireError, WireReader, WireWriter};
pub use command::CommandId;
pub use identifier::Identifier;
pub use money::{Currency, Money};
pub use names::{AccountName, DomainName, HostId, NameError, UserName};
pub use notice::{InvalidationTail, NoticeFrame, SyncId};
pub use status::ResponseStatus;
pub use table::TableId;
pub use version::{ProtocolVersion, UnsupportedVersion, VersionGate, gates};
