//! Decoding of command arguments.

use std::io::Read;

use aoserv_protocol::requests::{
    AddDnsRecord, AddTransaction, DisableAccount, DumpDatabase, GetRowCount, GetTable,
    InvalidateTable, RemoveDnsRecord, StartDistro,
};
use aoserv_protocol::{CommandId, WireError, WireReader};

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Liveness check.
    Ping,
    /// Ends the session.
    Quit,
    /// Opens and rolls back a transaction.
    TestConnection,
    /// Blocks the connection to receive invalidation notices.
    ListenCaches,
    /// A command that runs inside a transaction.
    Transactional(Command),
}

/// Commands that run inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `GET_ROW_COUNT`.
    GetRowCount(GetRowCount),
    /// `GET_TABLE`.
    GetTable(GetTable),
    /// `ADD_DNS_RECORD`.
    AddDnsRecord(AddDnsRecord),
    /// `REMOVE_DNS_RECORD`.
    RemoveDnsRecord(RemoveDnsRecord),
    /// `ADD_TRANSACTION`.
    AddTransaction(AddTransaction),
    /// `DISABLE_ACCOUNT`.
    DisableAccount(DisableAccount),
    /// `INVALIDATE_TABLE`.
    InvalidateTable(InvalidateTable),
    /// `START_DISTRO`.
    StartDistro(StartDistro),
    /// `DUMP_DATABASE`.
    DumpDatabase(DumpDatabase),
}

impl Request {
    /// Reads the arguments that follow `command` on the wire.
    pub fn read<R: Read>(command: CommandId, input: &mut WireReader<R>) -> Result<Self, WireError> {
        let command = match command {
            CommandId::Ping => return Ok(Self::Ping),
            CommandId::Quit => return Ok(Self::Quit),
            CommandId::TestConnection => return Ok(Self::TestConnection),
            CommandId::ListenCaches => return Ok(Self::ListenCaches),
            CommandId::GetRowCount => Command::GetRowCount(input.read()?),
            CommandId::GetTable => Command::GetTable(input.read()?),
            CommandId::AddDnsRecord => Command::AddDnsRecord(input.read()?),
            CommandId::RemoveDnsRecord => Command::RemoveDnsRecord(input.read()?),
            CommandId::AddTransaction => Command::AddTransaction(input.read()?),
            CommandId::DisableAccount => Command::DisableAccount(input.read()?),
            CommandId::InvalidateTable => Command::InvalidateTable(input.read()?),
            CommandId::StartDistro => Command::StartDistro(input.read()?),
            CommandId::DumpDatabase => Command::DumpDatabase(input.read()?),
        };
        Ok(Self::Transactional(command))
    }
}

impl Command {
    /// Command id on the wire.
    #[must_use]
    pub const fn id(&self) -> CommandId {
        match self {
            Self::GetRowCount(_) => CommandId::GetRowCount,
            Self::GetTable(_) => CommandId::GetTable,
            Self::AddDnsRecord(_) => CommandId::AddDnsRecord,
            Self::RemoveDnsRecord(_) => CommandId::RemoveDnsRecord,
            Self::AddTransaction(_) => CommandId::AddTransaction,
            Self::DisableAccount(_) => CommandId::DisableAccount,
            Self::InvalidateTable(_) => CommandId::InvalidateTable,
            Self::StartDistro(_) => CommandId::StartDistro,
            Self::DumpDatabase(_) => CommandId::DumpDatabase,
        }
    }
}
