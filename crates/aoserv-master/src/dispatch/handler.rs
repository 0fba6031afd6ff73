//! Per-connection session: handshake, then one command after another.

use std::io::{BufReader, BufWriter, Read, Write};
use std::sync::Arc;

use aoserv_protocol::{
    CommandId, InvalidationTail, ProtocolVersion, ResponseStatus, WireReader, WireWriter,
};
use tracing::{debug, warn};

use crate::context::MasterContext;
use crate::database::{RowStreamError, Transaction};
use crate::handshake::{self, HandshakeError};
use crate::invalidate::InvalidateList;
use crate::source::RequestSource;
use crate::transport::{ConnectionHandler, ConnectionStream};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::listen::listen_caches;
use super::request::{Command, Request};
use super::response::{Response, ResponseWriter};
use super::router::Router;

/// Connection handler that runs the master protocol.
pub struct MasterConnectionHandler {
    context: Arc<MasterContext>,
}

impl MasterConnectionHandler {
    /// Handler serving every connection against `context`.
    #[must_use]
    pub fn new(context: Arc<MasterContext>) -> Self {
        Self { context }
    }
}

impl ConnectionHandler for MasterConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        let peer = stream.peer();
        let read_half = match stream.try_clone() {
            Ok(read_half) => read_half,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %peer, %error, "cannot split connection");
                return;
            }
        };
        let mut input = WireReader::new(BufReader::new(read_half), ProtocolVersion::CURRENT);
        let mut out = WireWriter::new(BufWriter::new(stream), ProtocolVersion::CURRENT);

        let opened = match handshake::accept(&mut input, &mut out, self.context.authenticator()) {
            Ok(opened) => opened,
            Err(HandshakeError::Wire(error)) if error.is_eof() => {
                debug!(target: DISPATCH_TARGET, %peer, "client left during handshake");
                return;
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %peer, %error, "handshake refused");
                return;
            }
        };
        debug!(
            target: DISPATCH_TARGET,
            %peer,
            user = %opened.user,
            version = %opened.version,
            connector = %opened.connector,
            "session opened"
        );

        let source = Arc::new(RequestSource::new(
            opened.version,
            opened.user,
            opened.connector,
        ));
        let mut session = Session {
            context: &self.context,
            source,
            input,
            out,
            next_sequence: opened.first_sequence,
        };
        session.run();
        if let Err(error) = session.out.get_mut().get_ref().shutdown() {
            debug!(target: DISPATCH_TARGET, %peer, %error, "socket already closed");
        }
    }
}

/// One authenticated connection.
struct Session<'a, R: Read, W: Write> {
    context: &'a MasterContext,
    source: Arc<RequestSource>,
    input: WireReader<R>,
    out: WireWriter<W>,
    next_sequence: Option<i64>,
}

enum Step {
    Continue,
    Close,
}

impl<R: Read, W: Write> Session<'_, R, W> {
    /// Serves commands until the client leaves or a fatal error occurs.
    fn run(&mut self) {
        loop {
            match self.step() {
                Ok(Step::Continue) => {}
                Ok(Step::Close) => {
                    debug!(target: DISPATCH_TARGET, user = %self.source.user(), "session closed");
                    return;
                }
                Err(error) if error.is_disconnect() => {
                    debug!(target: DISPATCH_TARGET, user = %self.source.user(), "client disconnected");
                    return;
                }
                Err(error) if error.is_fatal() => {
                    warn!(
                        target: DISPATCH_TARGET,
                        user = %self.source.user(),
                        validation = error.is_validation(),
                        %error,
                        "closing session after fatal error"
                    );
                    if let Err(write_error) = ResponseWriter::new(&mut self.out).write_error(&error)
                    {
                        debug!(target: DISPATCH_TARGET, error = %write_error, "cannot report fatal error");
                    }
                    return;
                }
                Err(error) => {
                    if let Err(write_error) = ResponseWriter::new(&mut self.out).write_error(&error)
                    {
                        debug!(target: DISPATCH_TARGET, error = %write_error, "cannot report error");
                        return;
                    }
                }
            }
        }
    }

    fn step(&mut self) -> Result<Step, DispatchError> {
        if let Some(expected) = self.next_sequence {
            let received = self.input.read_i64()?;
            if received != expected {
                return Err(DispatchError::SequenceMismatch { expected, received });
            }
            self.out.write_i64(received)?;
            self.next_sequence = Some(expected.wrapping_add(1));
        }

        let ordinal = self.input.read_compressed_int()?;
        if ordinal == CommandId::END_OF_STREAM {
            return Ok(Step::Close);
        }
        let command =
            CommandId::from_ordinal(ordinal).ok_or(DispatchError::UnknownCommand(ordinal))?;
        let timer = self.context.metrics().begin();
        let request = Request::read(command, &mut self.input)?;
        match request {
            Request::Ping => {
                self.out.write(&ResponseStatus::Done)?;
                self.out.flush()?;
                Ok(Step::Continue)
            }
            Request::Quit => {
                self.out.flush()?;
                Ok(Step::Close)
            }
            Request::TestConnection => self.test_connection(),
            Request::ListenCaches => {
                // A listener parks for as long as it stays connected.
                drop(timer);
                let end = listen_caches(
                    self.context,
                    &self.source,
                    &mut self.input,
                    &mut self.out,
                )?;
                debug!(target: DISPATCH_TARGET, ?end, "cache listener finished");
                Ok(Step::Close)
            }
            Request::Transactional(command) => {
                self.execute(&command)?;
                Ok(Step::Continue)
            }
        }
    }

    fn test_connection(&mut self) -> Result<Step, DispatchError> {
        let probe = self
            .context
            .database()
            .begin()
            .and_then(|transaction| transaction.rollback());
        match probe {
            Ok(()) => {
                self.out.write(&ResponseStatus::Done)?;
                self.out.flush()?;
            }
            Err(error) => {
                if self.context.settings().log_probe_failures {
                    warn!(target: DISPATCH_TARGET, %error, "connection probe failed");
                } else {
                    debug!(target: DISPATCH_TARGET, %error, "connection probe failed");
                }
                let error = DispatchError::from(error);
                ResponseWriter::new(&mut self.out).write_error(&error)?;
            }
        }
        Ok(Step::Continue)
    }

    fn execute(&mut self, command: &Command) -> Result<(), DispatchError> {
        let id = command.id();
        let mut transaction = self.context.database().begin()?;
        let refusal = match self.context.access().is_disabled(self.source.user()) {
            Ok(false) => None,
            Ok(true) => Some(DispatchError::IdentityDisabled {
                user: self.source.user().clone(),
            }),
            Err(error) => Some(error.into()),
        };
        if let Some(error) = refusal {
            rollback(transaction, id);
            return Err(error);
        }

        let mut invalidate = InvalidateList::new();
        let routed = Router::new(self.context, &self.source).route(
            command,
            transaction.as_mut(),
            &mut invalidate,
            &mut self.out,
        );
        let response = match routed {
            Ok(response) => response,
            Err(error) => {
                if !error.is_fatal() {
                    warn!(target: DISPATCH_TARGET, command = %id, %error, "command failed");
                }
                rollback(transaction, id);
                return Err(error);
            }
        };
        if let Err(error) = transaction.commit() {
            // A streamed reply has already been closed with DONE.
            return Err(match response {
                Response::Streamed => RowStreamError::Database(error).into(),
                _ => error.into(),
            });
        }

        let tail = InvalidationTail {
            client_table_ids: invalidate.client_table_ids(self.source.version()),
        };
        self.context
            .invalidator()
            .invalidate_tables(&invalidate, Some(self.source.connector()));
        ResponseWriter::new(&mut self.out).write_success(response, &tail)?;
        Ok(())
    }
}

fn rollback(transaction: Box<dyn Transaction>, command: CommandId) {
    if let Err(error) = transaction.rollback() {
        warn!(target: DISPATCH_TARGET, %command, %error, "rollback failed");
    }
}
