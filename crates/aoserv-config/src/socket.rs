use std::fmt;
use std::fs::DirBuilder;
use std::io;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Where the master accepts client connections.
///
/// Text forms, as used by flags and environment variables:
///
/// - `tcp://0.0.0.0:4582` or the shorthand `0.0.0.0:4582`;
/// - `unix:///run/aoserv/master.sock` or a bare absolute path.
///
/// Configuration files may also use a table,
/// `{ transport = "tcp", host = "0.0.0.0", port = 4582 }`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "EndpointSetting", tag = "transport", rename_all = "snake_case")]
pub enum SocketEndpoint {
    /// Unix domain socket at `path`.
    Unix {
        /// Absolute socket path.
        path: Utf8PathBuf,
    },
    /// TCP socket bound to `host` and `port`.
    Tcp {
        /// Host name or address to bind.
        host: String,
        /// Port to bind.
        port: u16,
    },
}

/// Raw shape of the setting before validation.
#[derive(Deserialize)]
#[serde(untagged)]
enum EndpointSetting {
    Text(String),
    Table(EndpointTable),
}

#[derive(Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
enum EndpointTable {
    Unix { path: Utf8PathBuf },
    Tcp { host: String, port: u16 },
}

impl TryFrom<EndpointSetting> for SocketEndpoint {
    type Error = SocketParseError;

    fn try_from(setting: EndpointSetting) -> Result<Self, Self::Error> {
        match setting {
            EndpointSetting::Text(text) => text.parse(),
            EndpointSetting::Table(EndpointTable::Unix { path }) => {
                require_absolute(path.as_str())?;
                Ok(Self::unix(path))
            }
            EndpointSetting::Table(EndpointTable::Tcp { host, port }) => Ok(Self::tcp(host, port)),
        }
    }
}

impl SocketEndpoint {
    /// A Unix socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// A TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Socket file path for Unix endpoints.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_path()),
            Self::Tcp { .. } => None,
        }
    }

    /// Creates the directory that will hold a Unix socket, readable by the
    /// owner only. TCP endpoints need nothing.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let directory = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .ok_or_else(|| SocketPreparationError::NoDirectory {
                path: path.to_path_buf(),
            })?;
        if directory.is_dir() {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        std::os::unix::fs::DirBuilderExt::mode(&mut builder, 0o700);
        builder
            .create(directory)
            .map_err(|source| SocketPreparationError::CreateDirectory {
                directory: directory.to_path_buf(),
                source,
            })
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } if host.contains(':') => {
                write!(formatter, "tcp://[{host}]:{port}")
            }
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.starts_with('/') {
            return Ok(Self::unix(input));
        }
        if !input.contains("://") {
            return parse_host_port(input);
        }

        let url = Url::parse(input).map_err(|source| SocketParseError::Url {
            input: input.to_owned(),
            source,
        })?;
        match url.scheme() {
            "unix" => {
                let path = url.path();
                require_absolute(path)?;
                Ok(Self::unix(path))
            }
            "tcp" => {
                let host = url
                    .host_str()
                    .filter(|host| !host.is_empty())
                    .ok_or_else(|| SocketParseError::missing(input, "host"))?;
                let port = url
                    .port()
                    .ok_or_else(|| SocketParseError::missing(input, "port"))?;
                Ok(Self::tcp(host.trim_matches(['[', ']']), port))
            }
            scheme => Err(SocketParseError::Scheme(scheme.to_owned())),
        }
    }
}

fn parse_host_port(input: &str) -> Result<SocketEndpoint, SocketParseError> {
    let (host, port) = input
        .rsplit_once(':')
        .ok_or_else(|| SocketParseError::missing(input, "port"))?;
    let host = host.trim_matches(['[', ']']);
    if host.is_empty() {
        return Err(SocketParseError::missing(input, "host"));
    }
    let port = port.parse().map_err(|_| SocketParseError::Port {
        input: input.to_owned(),
    })?;
    Ok(SocketEndpoint::tcp(host, port))
}

fn require_absolute(path: &str) -> Result<(), SocketParseError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(SocketParseError::RelativePath(path.to_owned()))
    }
}

/// Rejected endpoint text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// The scheme was neither `tcp` nor `unix`.
    #[error("unsupported endpoint scheme '{0}'; use tcp:// or unix://")]
    Scheme(String),
    /// A required part of the endpoint was absent.
    #[error("endpoint '{input}' has no {part}")]
    Missing {
        /// The endpoint text.
        input: String,
        /// The absent part.
        part: &'static str,
    },
    /// The port was not a number in range.
    #[error("endpoint '{input}' has an invalid port")]
    Port {
        /// The endpoint text.
        input: String,
    },
    /// A Unix socket path was relative.
    #[error("unix socket path '{0}' must be absolute")]
    RelativePath(String),
    /// The text did not parse as a URL.
    #[error("endpoint '{input}' is not a valid URL: {source}")]
    Url {
        /// The endpoint text.
        input: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },
}

impl SocketParseError {
    fn missing(input: &str, part: &'static str) -> Self {
        Self::Missing {
            input: input.to_owned(),
            part,
        }
    }
}

/// Failure preparing the directory of a Unix socket.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// The path has no parent directory.
    #[error("socket path '{path}' names no directory")]
    NoDirectory {
        /// The socket path.
        path: Utf8PathBuf,
    },
    /// The parent directory could not be created.
    #[error("cannot create socket directory '{directory}': {source}")]
    CreateDirectory {
        /// Directory that was being created.
        directory: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
}
