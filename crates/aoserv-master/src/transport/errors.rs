//! Error types for the client listener.

use std::io;
use std::net::SocketAddr;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Failures while binding or running the client listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host name could not be resolved.
    #[error("cannot resolve listen address {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Resolver failure.
        #[source]
        source: io::Error,
    },
    /// The TCP host name resolved to no addresses.
    #[error("listen address {host}:{port} resolved to nothing")]
    ResolveEmpty {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// Binding the TCP socket failed.
    #[error("cannot listen on {addr}: {source}")]
    BindTcp {
        /// Address being bound.
        addr: SocketAddr,
        /// Bind failure.
        #[source]
        source: io::Error,
    },
    /// The socket could not be made non-blocking.
    #[error("cannot switch listener to non-blocking mode: {source}")]
    NonBlocking {
        /// Socket option failure.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be spawned.
    #[error("cannot spawn listener thread: {source}")]
    Spawn {
        /// Spawn failure.
        #[source]
        source: io::Error,
    },
    /// A Unix socket was configured on a platform without them.
    #[cfg(not(unix))]
    #[error("unix sockets are unavailable on this platform ({endpoint})")]
    UnsupportedUnix {
        /// The configured endpoint.
        endpoint: String,
    },
    /// Binding the Unix socket failed.
    #[cfg(unix)]
    #[error("cannot listen on unix socket {path}: {source}")]
    BindUnix {
        /// Socket path.
        path: Utf8PathBuf,
        /// Bind failure.
        #[source]
        source: io::Error,
    },
    /// Another master answers on the socket path.
    #[cfg(unix)]
    #[error("unix socket {path} already has a live master behind it")]
    UnixInUse {
        /// Socket path.
        path: Utf8PathBuf,
    },
    /// Something other than a socket occupies the path.
    #[cfg(unix)]
    #[error("{path} exists and is not a socket")]
    UnixNotSocket {
        /// Socket path.
        path: Utf8PathBuf,
    },
    /// The existing path could not be inspected.
    #[cfg(unix)]
    #[error("cannot inspect {path}: {source}")]
    UnixProbe {
        /// Socket path.
        path: Utf8PathBuf,
        /// Metadata or connect failure.
        #[source]
        source: io::Error,
    },
    /// A stale socket file could not be removed.
    #[cfg(unix)]
    #[error("cannot remove stale unix socket {path}: {source}")]
    UnixCleanup {
        /// Socket path.
        path: Utf8PathBuf,
        /// Removal failure.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}
