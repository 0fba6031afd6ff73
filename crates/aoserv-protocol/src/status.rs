//! Response status bytes.

use std::io::{Read, Write};

use strum::{Display, FromRepr};

use crate::codec::{WireDecode, WireEncode, WireError, WireReader, WireWriter};

/// First byte of every response frame and of every streamed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ResponseStatus {
    /// The command completed; any result follows.
    Done = 0,
    /// Another streamed row follows.
    Next = 1,
    /// The command failed recoverably; a message follows and the connection
    /// stays open.
    SqlException = 2,
    /// The command failed fatally; a message follows and the connection is
    /// closed.
    IoException = 3,
}

impl WireEncode for ResponseStatus {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        out.write_u8(*self as u8)
    }
}

impl WireDecode for ResponseStatus {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        let byte = input.read_u8()?;
        Self::from_repr(byte).ok_or(WireError::UnknownOrdinal {
            kind: "response status",
            ordinal: i64::from(byte),
        })
    }
}
