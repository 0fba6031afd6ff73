//! Socket listener for client connections.
//!
//! The listener binds the configured endpoint and hands every accepted stream
//! to a [`ConnectionHandler`] on its own thread. Sessions are fully
//! synchronous, so one thread owns one client for the life of the connection.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub use self::handler::{ConnectionHandler, ConnectionStream, Peer};
pub use self::listener::{ListenerHandle, SocketListener};
#[cfg(test)]
pub(crate) use self::test_utils::FirstByteHandler;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
