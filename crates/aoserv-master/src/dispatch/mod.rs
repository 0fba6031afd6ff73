//! Command dispatch for authenticated client sessions.
//!
//! ## Request framing
//!
//! Each request is an optional sequence number (`i64`, for clients that use
//! them), a command ordinal (signed compressed int) and the command's
//! arguments. The server echoes the sequence number before doing anything
//! else, then answers with a status byte:
//!
//! - `DONE`, the result, and the client table ids the command invalidated;
//! - `NEXT` rows closed by `DONE` for streamed commands;
//! - `SQL_EXCEPTION` + message when the command failed but the session lives;
//! - `IO_EXCEPTION` + message just before the server closes the connection.
//!
//! `LISTEN_CACHES` turns the connection into a notice stream instead; see
//! [`listen`].

mod errors;
mod handler;
pub mod listen;
mod request;
mod response;
mod router;

pub use self::errors::DispatchError;
pub use self::handler::MasterConnectionHandler;
pub use self::request::{Command, Request};
pub use self::response::{Response, ResponseWriter};
pub use self::router::Router;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
