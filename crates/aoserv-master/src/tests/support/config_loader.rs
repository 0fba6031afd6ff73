//! Configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use aoserv_config::{Config, SocketEndpoint};
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use crate::bootstrap::ConfigLoader;

/// Loader for a master on an ephemeral loopback port or a Unix socket in a
/// temporary directory.
pub struct TestConfigLoader {
    endpoint: SocketEndpoint,
    _socket_dir: Option<TempDir>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn tcp() -> Self {
        Self {
            endpoint: SocketEndpoint::tcp("127.0.0.1", 0),
            _socket_dir: None,
        }
    }

    #[must_use]
    pub fn unix() -> Self {
        let dir = TempDir::new().expect("failed to create temporary directory for socket");
        let path = dir
            .path()
            .join("run")
            .join("master.sock")
            .to_str()
            .expect("temporary socket path was not valid UTF-8")
            .to_owned();
        Self {
            endpoint: SocketEndpoint::unix(path),
            _socket_dir: Some(dir),
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            listen_socket: self.endpoint.clone(),
            log_filter: "aoserv_master=debug".to_owned(),
            cache_listen_timeout_secs: 1,
            service_retry_secs: 1,
            sync_ack_timeout_secs: 5,
            ..Config::default()
        })
    }
}

/// Loader that fails by passing an unparseable socket flag.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("aoserv-master"),
            OsString::from("--listen-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
