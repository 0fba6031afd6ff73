//! Blocking wire client used to drive a running master.

use std::io::{self, BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use aoserv_protocol::requests::DnsRecordType;
use aoserv_protocol::{
    CommandId, Identifier, NoticeFrame, ProtocolVersion, ResponseStatus, WireError, WireReader,
    WireWriter, gates,
};

use crate::handshake;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub type ClientWriter = WireWriter<BufWriter<TcpStream>>;

/// One authenticated client connection.
pub struct TestClient {
    input: WireReader<BufReader<TcpStream>>,
    out: ClientWriter,
    connector: Identifier,
    next_sequence: i64,
}

fn open(address: SocketAddr) -> (WireReader<BufReader<TcpStream>>, ClientWriter) {
    let stream = TcpStream::connect(address).expect("connect to master");
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .expect("set read timeout");
    let read_half = stream.try_clone().expect("split stream");
    (
        WireReader::new(BufReader::new(read_half), ProtocolVersion::CURRENT),
        WireWriter::new(BufWriter::new(stream), ProtocolVersion::CURRENT),
    )
}

impl TestClient {
    /// Logs in, returning the server's refusal message on failure.
    pub fn connect(
        address: SocketAddr,
        version: ProtocolVersion,
        user: &str,
        password: &str,
    ) -> Result<Self, String> {
        let (mut input, mut out) = open(address);
        let first_sequence = 1_000;
        let connector =
            handshake::connect(&mut input, &mut out, version, first_sequence, user, password)
                .expect("handshake exchange")?;
        Ok(Self {
            input,
            out,
            connector,
            next_sequence: first_sequence,
        })
    }

    /// Offers a raw version string and returns the server's answer.
    pub fn offer_version(address: SocketAddr, version: &str) -> (bool, String) {
        let (mut input, mut out) = open(address);
        out.write_utf(version).expect("write version");
        out.flush().expect("flush");
        let accepted = input.read_bool().expect("version verdict");
        let current = input.read_utf().expect("current version");
        (accepted, current)
    }

    #[must_use]
    pub const fn connector(&self) -> Identifier {
        self.connector
    }

    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        self.out.version()
    }

    fn uses_sequences(&self) -> bool {
        gates::SEQUENCE_NUMBERS.applies(self.out.version())
    }

    /// Sends `command` with the arguments written by `args`, then consumes
    /// the echoed sequence number.
    pub fn send_with(
        &mut self,
        command: CommandId,
        args: impl FnOnce(&mut ClientWriter) -> Result<(), WireError>,
    ) -> Result<(), WireError> {
        self.send_ordinal(command.ordinal(), args)
    }

    /// Like [`Self::send_with`] for an ordinal the client may not know.
    pub fn send_ordinal(
        &mut self,
        ordinal: i32,
        args: impl FnOnce(&mut ClientWriter) -> Result<(), WireError>,
    ) -> Result<(), WireError> {
        let sequence = self.next_sequence;
        self.send_raw(Some(sequence), ordinal, args)?;
        if self.uses_sequences() {
            let echoed = self.input.read_i64()?;
            assert_eq!(echoed, sequence, "server echoed the wrong sequence");
        }
        self.next_sequence += 1;
        Ok(())
    }

    pub fn send(&mut self, command: CommandId) -> Result<(), WireError> {
        self.send_with(command, |_| Ok(()))
    }

    /// Writes a frame without checking the echo, for malformed requests.
    pub fn send_raw(
        &mut self,
        sequence: Option<i64>,
        ordinal: i32,
        args: impl FnOnce(&mut ClientWriter) -> Result<(), WireError>,
    ) -> Result<(), WireError> {
        if let Some(sequence) = sequence
            && self.uses_sequences()
        {
            self.out.write_i64(sequence)?;
        }
        self.out.write_compressed_int(ordinal)?;
        args(&mut self.out)?;
        self.out.flush()
    }

    pub fn read_status(&mut self) -> Result<ResponseStatus, WireError> {
        self.input.read()
    }

    pub fn read_int(&mut self) -> Result<i32, WireError> {
        self.input.read_compressed_int()
    }

    pub fn read_message(&mut self) -> Result<String, WireError> {
        self.input.read_utf()
    }

    /// Reads the invalidation tail that closes a successful response.
    pub fn read_tail(&mut self) -> Result<Vec<i32>, WireError> {
        self.input
            .read::<aoserv_protocol::InvalidationTail>()
            .map(|tail| tail.client_table_ids)
    }

    pub fn read_frame(&mut self) -> Result<NoticeFrame, WireError> {
        self.input.read()
    }

    pub fn acknowledge(&mut self, flag: bool) -> Result<(), WireError> {
        self.out.write_bool(flag)?;
        self.out.flush()
    }

    /// Returns `true` once the server has closed the connection. Anything
    /// still buffered, such as a heartbeat, is skipped.
    pub fn is_closed(&mut self) -> bool {
        for _ in 0..64 {
            match self.input.read_u8() {
                Ok(_) => {}
                Err(WireError::Io(error)) => {
                    return !matches!(
                        error.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    );
                }
                Err(_) => return false,
            }
        }
        false
    }

    /// Reads DNS rows streamed by `GET_TABLE` until `DONE`.
    pub fn read_row_ids(&mut self) -> Result<Vec<i32>, WireError> {
        let mut ids = Vec::new();
        while self.read_status()? == ResponseStatus::Next {
            ids.push(self.input.read_compressed_int()?);
            self.input.read_utf()?;
            self.input.read_utf()?;
            self.input.read_enum::<DnsRecordType>()?;
            self.input.read_utf()?;
        }
        Ok(ids)
    }
}
