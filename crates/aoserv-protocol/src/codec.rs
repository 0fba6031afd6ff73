//! Binary primitives shared by every command and response.
//!
//! Nothing on the wire is self-describing: a reader must call exactly the
//! sequence of methods the sibling writer called for the negotiated version.
//! Both halves therefore carry the [`ProtocolVersion`] so that version-gated
//! encodings (enumerations, money) are decided in one place.

use std::io::{self, Read, Write};
use std::string::FromUtf8Error;

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use unsigned_varint::io::ReadError;

use crate::names::NameError;
use crate::version::{ProtocolVersion, gates};

/// Largest UTF-8 payload accepted by the short string form.
pub const MAX_UTF_BYTES: usize = 0xFFFF;

/// Largest payload accepted by the long string form.
pub const MAX_LONG_UTF_BYTES: usize = 64 * 1024 * 1024;

/// Largest block accepted by [`WireWriter::write_chunk`].
pub const MAX_CHUNK_BYTES: usize = 0xFFFF;

/// Errors raised while encoding or decoding wire values.
///
/// All of these are fatal to the connection: once a read has gone wrong the
/// stream position no longer matches what the client wrote.
#[derive(Debug, Error)]
pub enum WireError {
    /// The underlying stream failed or ended early.
    #[error("wire I/O failed: {0}")]
    Io(#[from] io::Error),
    /// A boolean byte held something other than 0 or 1.
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBoolean(u8),
    /// A string exceeded the limit for its encoding.
    #[error("string of {len} bytes exceeds the {max} byte limit")]
    StringTooLong {
        /// Encoded length in bytes.
        len: usize,
        /// Limit for the encoding in use.
        max: usize,
    },
    /// A raw byte block exceeded [`MAX_CHUNK_BYTES`].
    #[error("byte chunk of {len} bytes exceeds the {max} byte limit")]
    ChunkTooLong {
        /// Block length in bytes.
        len: usize,
        /// Always [`MAX_CHUNK_BYTES`].
        max: usize,
    },
    /// A length prefix does not fit the integer width that carries it.
    #[error("length prefix out of range")]
    LengthOutOfRange,
    /// String bytes were not valid UTF-8.
    #[error("string is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),
    /// A variable-length integer was malformed.
    #[error("malformed compressed integer: {0}")]
    Varint(String),
    /// An ordinal did not name a known enumeration value.
    #[error("unknown {kind} ordinal {ordinal}")]
    UnknownOrdinal {
        /// Enumeration being read.
        kind: &'static str,
        /// Ordinal the peer sent.
        ordinal: i64,
    },
    /// A display name did not name a known enumeration value.
    #[error("unknown {kind} name '{name}'")]
    UnknownName {
        /// Enumeration being read.
        kind: &'static str,
        /// Name the peer sent.
        name: String,
    },
    /// An identifier or name failed its grammar.
    #[error(transparent)]
    InvalidName(#[from] NameError),
    /// A money value could not be parsed or represented.
    #[error("invalid money value: {0}")]
    InvalidMoney(String),
}

impl WireError {
    /// Returns `true` for grammar violations in identifiers and names, which
    /// mean client and server disagree on basic types.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidName(_) | Self::InvalidMoney(_))
    }

    /// Returns `true` when the peer closed the stream.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io(error) if error.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// An enumeration sent as an ordinal byte or, for old clients, its name.
pub trait WireEnum: Sized + Copy {
    /// Human-readable kind used in errors.
    const KIND: &'static str;

    /// Stable ordinal.
    fn ordinal(self) -> u8;

    /// Looks up a value by ordinal.
    fn from_ordinal(ordinal: u8) -> Option<Self>;

    /// Legacy display name.
    fn display_name(self) -> &'static str;

    /// Looks up a value by legacy display name.
    fn from_display_name(name: &str) -> Option<Self>;
}

/// A value that can be written for the writer's protocol version.
pub trait WireEncode {
    /// Writes the value.
    ///
    /// # Errors
    ///
    /// Returns an error when the value cannot be represented or the stream
    /// fails.
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError>;
}

/// A value that can be read for the reader's protocol version.
pub trait WireDecode: Sized {
    /// Reads the value.
    ///
    /// # Errors
    ///
    /// Returns an error when the stream is truncated or malformed.
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError>;
}

const fn zigzag_encode(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)).cast_unsigned()
}

const fn zigzag_decode(value: u32) -> i32 {
    (value >> 1).cast_signed() ^ -(value & 1).cast_signed()
}

fn to_len(prefix: u32) -> Result<usize, WireError> {
    usize::try_from(prefix).map_err(|_| WireError::LengthOutOfRange)
}

fn to_prefix(len: usize) -> Result<u32, WireError> {
    u32::try_from(len).map_err(|_| WireError::LengthOutOfRange)
}

/// Decoding half of the codec.
#[derive(Debug)]
pub struct WireReader<R> {
    inner: R,
    version: ProtocolVersion,
}

impl<R: Read> WireReader<R> {
    /// Wraps a stream for the given protocol version.
    pub const fn new(inner: R, version: ProtocolVersion) -> Self {
        Self { inner, version }
    }

    /// Negotiated protocol version.
    pub const fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Switches the version once the handshake has negotiated it.
    pub const fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    /// Mutable access to the wrapped stream.
    pub const fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwraps the stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads one raw byte.
    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.inner.read_u8()?)
    }

    /// Reads a boolean byte.
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidBoolean(other)),
        }
    }

    /// Reads a big-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        Ok(self.inner.read_u16::<NetworkEndian>()?)
    }

    /// Reads a big-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        Ok(self.inner.read_i32::<NetworkEndian>()?)
    }

    /// Reads a big-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        Ok(self.inner.read_i64::<NetworkEndian>()?)
    }

    /// Reads a non-negative compressed integer.
    pub fn read_compressed_uint(&mut self) -> Result<u32, WireError> {
        match unsigned_varint::io::read_u32(&mut self.inner) {
            Ok(value) => Ok(value),
            Err(ReadError::Io(source)) => Err(WireError::Io(source)),
            Err(other) => Err(WireError::Varint(other.to_string())),
        }
    }

    /// Reads a signed compressed integer.
    pub fn read_compressed_int(&mut self) -> Result<i32, WireError> {
        self.read_compressed_uint().map(zigzag_decode)
    }

    /// Reads a nullable signed compressed integer.
    pub fn read_nullable_compressed_int(&mut self) -> Result<Option<i32>, WireError> {
        self.read_nullable(Self::read_compressed_int)
    }

    /// Reads a short UTF-8 string.
    pub fn read_utf(&mut self) -> Result<String, WireError> {
        let len = to_len(self.read_compressed_uint()?)?;
        self.read_string_bytes(len, MAX_UTF_BYTES)
    }

    /// Reads a long UTF-8 string with a 32-bit length prefix.
    pub fn read_long_utf(&mut self) -> Result<String, WireError> {
        let len = to_len(self.inner.read_u32::<NetworkEndian>()?)?;
        self.read_string_bytes(len, MAX_LONG_UTF_BYTES)
    }

    /// Reads a length-prefixed block of raw bytes.
    pub fn read_chunk(&mut self) -> Result<Vec<u8>, WireError> {
        let len = to_len(self.read_compressed_uint()?)?;
        if len > MAX_CHUNK_BYTES {
            return Err(WireError::ChunkTooLong {
                len,
                max: MAX_CHUNK_BYTES,
            });
        }
        let mut bytes = vec![0_u8; len];
        self.inner.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads a nullable short UTF-8 string.
    pub fn read_nullable_utf(&mut self) -> Result<Option<String>, WireError> {
        self.read_nullable(Self::read_utf)
    }

    /// Reads a presence flag and, when set, the value.
    pub fn read_nullable<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, WireError>,
    ) -> Result<Option<T>, WireError> {
        if self.read_bool()? {
            read(self).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reads an enumeration in the form the version expects.
    pub fn read_enum<E: WireEnum>(&mut self) -> Result<E, WireError> {
        if gates::ENUM_ORDINALS.applies(self.version) {
            let ordinal = self.read_u8()?;
            E::from_ordinal(ordinal).ok_or(WireError::UnknownOrdinal {
                kind: E::KIND,
                ordinal: i64::from(ordinal),
            })
        } else {
            let name = self.read_utf()?;
            E::from_display_name(&name).ok_or(WireError::UnknownName { kind: E::KIND, name })
        }
    }

    /// Reads any [`WireDecode`] value.
    pub fn read<T: WireDecode>(&mut self) -> Result<T, WireError> {
        T::decode(self)
    }

    fn read_string_bytes(&mut self, len: usize, max: usize) -> Result<String, WireError> {
        if len > max {
            return Err(WireError::StringTooLong { len, max });
        }
        // The prefix is untrusted, so memory grows with the bytes that arrive.
        let limit = u64::try_from(len).map_err(|_| WireError::LengthOutOfRange)?;
        let mut bytes = Vec::with_capacity(len.min(MAX_UTF_BYTES));
        self.inner.by_ref().take(limit).read_to_end(&mut bytes)?;
        if bytes.len() < len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(String::from_utf8(bytes)?)
    }
}

/// Encoding half of the codec.
#[derive(Debug)]
pub struct WireWriter<W> {
    inner: W,
    version: ProtocolVersion,
}

impl<W: Write> WireWriter<W> {
    /// Wraps a stream for the given protocol version.
    pub const fn new(inner: W, version: ProtocolVersion) -> Self {
        Self { inner, version }
    }

    /// Negotiated protocol version.
    pub const fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Switches the version once the handshake has negotiated it.
    pub const fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    /// Mutable access to the wrapped stream.
    pub const fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwraps the stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Borrows this writer as one over a trait object, for row encoders that
    /// cannot be generic.
    pub fn as_dyn(&mut self) -> WireWriter<&mut dyn Write> {
        WireWriter {
            version: self.version,
            inner: &mut self.inner as &mut dyn Write,
        }
    }

    /// Writes one raw byte.
    pub fn write_u8(&mut self, value: u8) -> Result<(), WireError> {
        Ok(self.inner.write_u8(value)?)
    }

    /// Writes a boolean byte.
    pub fn write_bool(&mut self, value: bool) -> Result<(), WireError> {
        self.write_u8(u8::from(value))
    }

    /// Writes a big-endian `u16`.
    pub fn write_u16(&mut self, value: u16) -> Result<(), WireError> {
        Ok(self.inner.write_u16::<NetworkEndian>(value)?)
    }

    /// Writes a big-endian `i32`.
    pub fn write_i32(&mut self, value: i32) -> Result<(), WireError> {
        Ok(self.inner.write_i32::<NetworkEndian>(value)?)
    }

    /// Writes a big-endian `i64`.
    pub fn write_i64(&mut self, value: i64) -> Result<(), WireError> {
        Ok(self.inner.write_i64::<NetworkEndian>(value)?)
    }

    /// Writes a non-negative compressed integer.
    pub fn write_compressed_uint(&mut self, value: u32) -> Result<(), WireError> {
        let mut buffer = unsigned_varint::encode::u32_buffer();
        let encoded = unsigned_varint::encode::u32(value, &mut buffer);
        Ok(self.inner.write_all(encoded)?)
    }

    /// Writes a signed compressed integer.
    pub fn write_compressed_int(&mut self, value: i32) -> Result<(), WireError> {
        self.write_compressed_uint(zigzag_encode(value))
    }

    /// Writes a nullable signed compressed integer.
    pub fn write_nullable_compressed_int(&mut self, value: Option<i32>) -> Result<(), WireError> {
        self.write_nullable(value, Self::write_compressed_int)
    }

    /// Writes a short UTF-8 string.
    pub fn write_utf(&mut self, value: &str) -> Result<(), WireError> {
        let len = value.len();
        if len > MAX_UTF_BYTES {
            return Err(WireError::StringTooLong {
                len,
                max: MAX_UTF_BYTES,
            });
        }
        self.write_compressed_uint(to_prefix(len)?)?;
        Ok(self.inner.write_all(value.as_bytes())?)
    }

    /// Writes a long UTF-8 string with a 32-bit length prefix.
    pub fn write_long_utf(&mut self, value: &str) -> Result<(), WireError> {
        let len = value.len();
        if len > MAX_LONG_UTF_BYTES {
            return Err(WireError::StringTooLong {
                len,
                max: MAX_LONG_UTF_BYTES,
            });
        }
        self.inner.write_u32::<NetworkEndian>(to_prefix(len)?)?;
        Ok(self.inner.write_all(value.as_bytes())?)
    }

    /// Writes a block of raw bytes behind a compressed length.
    pub fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        let len = bytes.len();
        if len > MAX_CHUNK_BYTES {
            return Err(WireError::ChunkTooLong {
                len,
                max: MAX_CHUNK_BYTES,
            });
        }
        self.write_compressed_uint(to_prefix(len)?)?;
        Ok(self.inner.write_all(bytes)?)
    }

    /// Writes a nullable short UTF-8 string.
    pub fn write_nullable_utf(&mut self, value: Option<&str>) -> Result<(), WireError> {
        self.write_nullable(value, Self::write_utf)
    }

    /// Writes a presence flag and, when present, the value.
    pub fn write_nullable<T>(
        &mut self,
        value: Option<T>,
        write: impl FnOnce(&mut Self, T) -> Result<(), WireError>,
    ) -> Result<(), WireError> {
        match value {
            Some(value) => {
                self.write_bool(true)?;
                write(self, value)
            }
            None => self.write_bool(false),
        }
    }

    /// Writes an enumeration in the form the version expects.
    pub fn write_enum<E: WireEnum>(&mut self, value: E) -> Result<(), WireError> {
        if gates::ENUM_ORDINALS.applies(self.version) {
            self.write_u8(value.ordinal())
        } else {
            self.write_utf(value.display_name())
        }
    }

    /// Writes any [`WireEncode`] value.
    pub fn write<T: WireEncode + ?Sized>(&mut self, value: &T) -> Result<(), WireError> {
        value.encode(self)
    }

    /// Flushes the wrapped stream.
    pub fn flush(&mut self) -> Result<(), WireError> {
        Ok(self.inner.flush()?)
    }
}
