//! Accept loop for client connections.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::thread;
use std::time::Duration;

use aoserv_config::SocketEndpoint;
use tracing::{debug, info, warn};

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use camino::Utf8Path;
#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

const IDLE_POLL: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Bound, not yet accepting, client socket.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: SocketEndpoint,
    socket: BoundSocket,
}

#[derive(Debug)]
enum BoundSocket {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl BoundSocket {
    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

impl SocketListener {
    /// Binds the endpoint, replacing a stale unix socket file if one is left
    /// over from a previous run.
    pub fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let socket = match endpoint {
            SocketEndpoint::Tcp { host, port } => BoundSocket::Tcp(bind_tcp(host, *port)?),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => BoundSocket::Unix(bind_unix(path)?),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(ListenerError::UnsupportedUnix {
                    endpoint: endpoint.to_string(),
                });
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            socket,
        })
    }

    /// Address actually bound, for TCP endpoints.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.socket {
            BoundSocket::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            BoundSocket::Unix(_) => None,
        }
    }

    /// Starts accepting on a background thread. Each connection runs the
    /// handler on its own thread.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        if let Err(source) = self.socket.set_nonblocking() {
            self.cleanup();
            return Err(ListenerError::NonBlocking { source });
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("aoserv-accept".to_owned())
            .spawn(move || self.accept_loop(&flag, &handler))
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }

    fn accept_loop(self, shutdown: &AtomicBool, handler: &Arc<dyn ConnectionHandler>) {
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.endpoint,
            "accepting client connections"
        );
        let sequence = AtomicU64::new(0);
        let mut last_error = None::<io::ErrorKind>;
        while !shutdown.load(Ordering::SeqCst) {
            match self.socket.accept() {
                Ok(Some(stream)) => {
                    last_error = None;
                    let number = sequence.fetch_add(1, Ordering::Relaxed);
                    spawn_session(number, stream, Arc::clone(handler));
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(target: LISTENER_TARGET, %error, "accept failed");
                    }
                    last_error = Some(kind);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        self.cleanup();
        info!(target: LISTENER_TARGET, endpoint = %self.endpoint, "listener stopped");
    }

    fn cleanup(&self) {
        #[cfg(unix)]
        {
            if let SocketEndpoint::Unix { path } = &self.endpoint
                && let Err(error) = fs::remove_file(path.as_std_path())
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: LISTENER_TARGET,
                    %error,
                    %path,
                    "cannot remove unix socket file"
                );
            }
        }
    }
}

fn spawn_session(number: u64, stream: ConnectionStream, handler: Arc<dyn ConnectionHandler>) {
    let peer = stream.peer();
    debug!(target: LISTENER_TARGET, connection = number, %peer, "connection accepted");
    let spawned = thread::Builder::new()
        .name(format!("aoserv-conn-{number}"))
        .spawn(move || handler.handle(stream));
    if let Err(error) = spawned {
        warn!(
            target: LISTENER_TARGET,
            connection = number,
            %peer,
            %error,
            "cannot spawn session thread; dropping connection"
        );
    }
}

/// Controls the background accept thread.
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop. Sessions already running are unaffected.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop to exit.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}

#[cfg(unix)]
fn bind_unix(path: &Utf8Path) -> Result<UnixListener, ListenerError> {
    match fs::symlink_metadata(path.as_std_path()) {
        Ok(metadata) if !metadata.file_type().is_socket() => {
            return Err(ListenerError::UnixNotSocket {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => remove_stale_socket(path)?,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ListenerError::UnixProbe {
                path: path.to_path_buf(),
                source,
            });
        }
    }
    UnixListener::bind(path.as_std_path()).map_err(|source| ListenerError::BindUnix {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn remove_stale_socket(path: &Utf8Path) -> Result<(), ListenerError> {
    match UnixStream::connect(path.as_std_path()) {
        Ok(_) => Err(ListenerError::UnixInUse {
            path: path.to_path_buf(),
        }),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            fs::remove_file(path.as_std_path()).map_err(|source| ListenerError::UnixCleanup {
                path: path.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(ListenerError::UnixProbe {
            path: path.to_path_buf(),
            source,
        }),
    }
}
