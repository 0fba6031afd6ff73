//! Writing command results back to the client.

use std::io::Write;

use aoserv_protocol::{InvalidationTail, ResponseStatus, WireError, WireWriter};

use super::errors::DispatchError;

/// Result of a successful command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// `DONE` with no payload.
    Done,
    /// `DONE` followed by a signed compressed int.
    DoneInt(i32),
    /// The handler already wrote rows and the closing `DONE`.
    Streamed,
}

/// Writes responses and error reports onto a session's stream.
pub struct ResponseWriter<'a, W: Write> {
    out: &'a mut WireWriter<W>,
}

impl<'a, W: Write> ResponseWriter<'a, W> {
    /// A writer over `out`.
    pub fn new(out: &'a mut WireWriter<W>) -> Self {
        Self { out }
    }

    /// Writes the result followed by the caller's own invalidations. A
    /// streamed result has no body.
    pub fn write_success(
        &mut self,
        response: Response,
        tail: &InvalidationTail,
    ) -> Result<(), WireError> {
        match response {
            Response::Streamed => return self.out.flush(),
            Response::Done => self.out.write(&ResponseStatus::Done)?,
            Response::DoneInt(value) => {
                self.out.write(&ResponseStatus::Done)?;
                self.out.write_compressed_int(value)?;
            }
        }
        self.out.write(tail)?;
        self.out.flush()
    }

    /// Reports a failure with its status byte and message.
    pub fn write_error(&mut self, error: &DispatchError) -> Result<(), WireError> {
        self.out.write(&error.status())?;
        self.out.write_utf(&truncate(&error.to_string()))?;
        self.out.flush()
    }
}

fn truncate(message: &str) -> String {
    const LIMIT: usize = aoserv_protocol::codec::MAX_UTF_BYTES;
    if message.len() <= LIMIT {
        return message.to_owned();
    }
    let mut end = LIMIT;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoserv_protocol::{ProtocolVersion, WireReader};
    use rstest::rstest;
    use std::io::Cursor;

    fn written(version: ProtocolVersion, write: impl FnOnce(&mut ResponseWriter<'_, Vec<u8>>)) -> Vec<u8> {
        let mut out = WireWriter::new(Vec::new(), version);
        write(&mut ResponseWriter::new(&mut out));
        out.into_inner()
    }

    #[rstest]
    #[case(ProtocolVersion::CURRENT, vec![0x00, 0x0e, 0x06, 0x01])]
    #[case(ProtocolVersion::V1_0_A102, vec![0x00, 0x0e, 0x00, 0x06, 0x01])]
    fn int_response_carries_the_tail(#[case] version: ProtocolVersion, #[case] expected: Vec<u8>) {
        let tail = InvalidationTail {
            client_table_ids: vec![3],
        };
        let bytes = written(version, |writer| {
            writer
                .write_success(Response::DoneInt(7), &tail)
                .expect("write");
        });
        assert_eq!(bytes, expected);
    }

    #[test]
    fn streamed_response_adds_nothing() {
        let bytes = written(ProtocolVersion::CURRENT, |writer| {
            writer
                .write_success(Response::Streamed, &InvalidationTail::default())
                .expect("write");
        });
        assert!(bytes.is_empty());
    }

    #[test]
    fn recoverable_error_reports_sql_exception() {
        let error = DispatchError::access_denied("host#4 is not visible");
        let bytes = written(ProtocolVersion::CURRENT, |writer| {
            writer.write_error(&error).expect("write");
        });
        let mut input = WireReader::new(Cursor::new(bytes), ProtocolVersion::CURRENT);
        assert_eq!(
            input.read::<ResponseStatus>().expect("status"),
            ResponseStatus::SqlException
        );
        assert_eq!(
            input.read_utf().expect("message"),
            "access denied: host#4 is not visible"
        );
    }
}
