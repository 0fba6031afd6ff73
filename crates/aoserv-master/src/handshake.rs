//! Connection opening: version negotiation, authentication and connector id.

use std::io::{Read, Write};

use aoserv_protocol::{
    Identifier, NameError, ProtocolVersion, UserName, WireError, WireReader, WireWriter, gates,
};
use thiserror::Error;

/// Credential check failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AuthError {
    message: String,
}

impl AuthError {
    /// A rejection described by `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The rejection text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Verifies administrator credentials.
pub trait Authenticator: Send + Sync {
    /// Accepts or rejects `user`'s `password`.
    fn authenticate(&self, user: &UserName, password: &str) -> Result<(), AuthError>;
}

/// Reasons a connection never got past the handshake.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The stream broke or carried garbage.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// The client's version string is not supported.
    #[error("client speaks unsupported protocol version '{0}'")]
    UnsupportedVersion(String),
    /// The user name broke its grammar.
    #[error("invalid user name: {0}")]
    InvalidUser(#[source] NameError),
    /// The credentials were refused.
    #[error("authentication failed for {user}: {source}")]
    Rejected {
        /// Who tried to log in.
        user: UserName,
        /// Why they were refused.
        #[source]
        source: AuthError,
    },
}

/// Outcome of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Protocol version the client speaks.
    pub version: ProtocolVersion,
    /// Authenticated administrator.
    pub user: UserName,
    /// Connector id the client chose for itself.
    pub connector: Identifier,
    /// Sequence the first command must carry, when the version uses them.
    pub first_sequence: Option<i64>,
}

/// Runs the server side of the handshake. On success both halves of the
/// codec are switched to the negotiated version.
pub fn accept<R: Read, W: Write>(
    input: &mut WireReader<R>,
    out: &mut WireWriter<W>,
    authenticator: &dyn Authenticator,
) -> Result<Handshake, HandshakeError> {
    let requested = input.read_utf()?;
    let Ok(version) = requested.parse::<ProtocolVersion>() else {
        out.write_bool(false)?;
        out.write_utf(ProtocolVersion::CURRENT.as_str())?;
        out.flush()?;
        return Err(HandshakeError::UnsupportedVersion(requested));
    };
    input.set_version(version);
    out.set_version(version);

    let first_sequence = if gates::SEQUENCE_NUMBERS.applies(version) {
        Some(input.read_i64()?)
    } else {
        None
    };
    let user = input.read_utf()?;
    let password = input.read_utf()?;
    out.write_bool(true)?;

    let user = match UserName::new(user) {
        Ok(user) => user,
        Err(error) => {
            refuse(out, &error.to_string())?;
            return Err(HandshakeError::InvalidUser(error));
        }
    };
    if let Err(source) = authenticator.authenticate(&user, &password) {
        refuse(out, source.message())?;
        return Err(HandshakeError::Rejected { user, source });
    }

    let connector = Identifier::random_for(version);
    out.write_bool(true)?;
    out.write(&connector)?;
    out.flush()?;
    Ok(Handshake {
        version,
        user,
        connector,
        first_sequence,
    })
}

fn refuse<W: Write>(out: &mut WireWriter<W>, message: &str) -> Result<(), WireError> {
    out.write_bool(false)?;
    out.write_utf(message)?;
    out.flush()
}

/// Client side of [`accept`], for tests and tooling.
#[cfg(test)]
pub(crate) fn connect<R: Read, W: Write>(
    input: &mut WireReader<R>,
    out: &mut WireWriter<W>,
    version: ProtocolVersion,
    first_sequence: i64,
    user: &str,
    password: &str,
) -> Result<Result<Identifier, String>, WireError> {
    input.set_version(version);
    out.set_version(version);
    out.write_utf(version.as_str())?;
    if gates::SEQUENCE_NUMBERS.applies(version) {
        out.write_i64(first_sequence)?;
    }
    out.write_utf(user)?;
    out.write_utf(password)?;
    out.flush()?;
    if !input.read_bool()? {
        return Ok(Err(input.read_utf()?));
    }
    if !input.read_bool()? {
        return Ok(Err(input.read_utf()?));
    }
    Ok(Ok(input.read()?))
}
