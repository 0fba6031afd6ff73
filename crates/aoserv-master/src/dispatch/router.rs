//! Routes a decoded command to the one handler that serves it.

use std::io::{Read, Write};

use aoserv_protocol::codec::MAX_CHUNK_BYTES;
use aoserv_protocol::{ResponseStatus, TableId, WireWriter};
use tracing::debug;

use crate::capabilities::{
    AccountService, BillingService, DistroService, DnsService, DumpService, TableService,
};
use crate::context::MasterContext;
use crate::database::{EmptyCursor, RowCursor, RowStreamError, Transaction, write_cursor_rows};
use crate::invalidate::InvalidateList;
use crate::priority::{HIGH_PRIORITY, LOW_PRIORITY, PriorityGuard};
use crate::source::RequestSource;

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::request::Command;
use super::response::Response;

/// Per-request view of the context used while a command runs.
pub struct Router<'a> {
    context: &'a MasterContext,
    source: &'a RequestSource,
}

impl<'a> Router<'a> {
    /// A router acting for `source`.
    #[must_use]
    pub const fn new(context: &'a MasterContext, source: &'a RequestSource) -> Self {
        Self { context, source }
    }

    /// Runs `command`. Streamed commands write their rows to `out` before
    /// returning [`Response::Streamed`].
    pub fn route<W: Write>(
        &self,
        command: &Command,
        transaction: &mut dyn Transaction,
        invalidate: &mut InvalidateList,
        out: &mut WireWriter<W>,
    ) -> Result<Response, DispatchError> {
        let source = self.source;
        match command {
            Command::GetRowCount(request) => {
                let Some(table) = self.table(request.client_table_id) else {
                    return Ok(Response::DoneInt(0));
                };
                let tables = self.context.service::<dyn TableService>()?;
                Ok(Response::DoneInt(tables.row_count(transaction, source, table)?))
            }
            Command::GetTable(request) => {
                let cursor: Box<dyn RowCursor> = match self.table(request.client_table_id) {
                    Some(table) => {
                        let tables = self.context.service::<dyn TableService>()?;
                        tables.table_rows(transaction, source, table)?
                    }
                    None => Box::new(EmptyCursor),
                };
                write_cursor_rows(out, cursor, request.progress)?;
                Ok(Response::Streamed)
            }
            Command::AddDnsRecord(request) => {
                let dns = self.context.service::<dyn DnsService>()?;
                let id = dns.add_record(transaction, source, invalidate, request)?;
                Ok(Response::DoneInt(id))
            }
            Command::RemoveDnsRecord(request) => {
                let dns = self.context.service::<dyn DnsService>()?;
                dns.remove_record(transaction, source, invalidate, request)?;
                Ok(Response::Done)
            }
            Command::AddTransaction(request) => {
                let billing = self.context.service::<dyn BillingService>()?;
                let id = billing.add_transaction(transaction, source, invalidate, request)?;
                Ok(Response::DoneInt(id))
            }
            Command::DisableAccount(request) => {
                let accounts = self.context.service::<dyn AccountService>()?;
                accounts.disable(transaction, source, invalidate, request)?;
                Ok(Response::Done)
            }
            Command::InvalidateTable(request) => {
                let Some(table) = self.table(request.client_table_id) else {
                    return Ok(Response::Done);
                };
                if let Some(host) = request.host
                    && !self.context.access().scope(source.user())?.hosts.contains(&host)
                {
                    return Err(DispatchError::access_denied(format!(
                        "{} may not invalidate {table} on {host}",
                        source.user()
                    )));
                }
                invalidate.record_affected(table, None, request.host);
                Ok(Response::Done)
            }
            Command::StartDistro(request) => {
                let distro = self.context.service::<dyn DistroService>()?;
                let _priority = PriorityGuard::set(LOW_PRIORITY);
                distro.start(transaction, source, request)?;
                Ok(Response::Done)
            }
            Command::DumpDatabase(request) => {
                let dumps = self.context.service::<dyn DumpService>()?;
                let _priority = PriorityGuard::set(HIGH_PRIORITY);
                let dump = dumps.open_dump(transaction, source, request)?;
                let bytes = stream_chunks(out, dump)?;
                debug!(
                    target: DISPATCH_TARGET,
                    database = %request.database,
                    host = %request.host,
                    bytes,
                    "database dump streamed"
                );
                Ok(Response::Streamed)
            }
        }
    }

    fn table(&self, client_table_id: i32) -> Option<TableId> {
        let table = TableId::from_client_id(self.source.version(), client_table_id);
        if table.is_none() {
            debug!(
                target: DISPATCH_TARGET,
                client_table_id,
                version = %self.source.version(),
                "ignoring unrecognized client table"
            );
        }
        table
    }
}

/// Copies `source` to the client as `NEXT` + chunk frames closed by `DONE`.
fn stream_chunks<W: Write>(
    out: &mut WireWriter<W>,
    mut source: Box<dyn Read + Send>,
) -> Result<u64, RowStreamError> {
    let mut buffer = vec![0_u8; MAX_CHUNK_BYTES];
    let mut total = 0_u64;
    loop {
        let read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        };
        out.write(&ResponseStatus::Next)?;
        out.write_chunk(buffer.get(..read).unwrap_or_default())?;
        total = total.saturating_add(u64::try_from(read).unwrap_or(u64::MAX));
    }
    out.write(&ResponseStatus::Done)?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoserv_protocol::{ProtocolVersion, WireReader};
    use std::io::Cursor;

    #[test]
    fn dumps_are_chunked() {
        let payload = vec![7_u8; MAX_CHUNK_BYTES + 10];
        let mut out = WireWriter::new(Vec::new(), ProtocolVersion::CURRENT);
        let total = stream_chunks(&mut out, Box::new(Cursor::new(payload.clone()))).expect("stream");
        assert_eq!(total, payload.len() as u64);

        let mut input = WireReader::new(Cursor::new(out.into_inner()), ProtocolVersion::CURRENT);
        let mut received = Vec::new();
        while input.read::<ResponseStatus>().expect("status") == ResponseStatus::Next {
            received.extend(input.read_chunk().expect("chunk"));
        }
        assert_eq!(received, payload);
    }
}
