//! Connection handler doubles for listener tests.

use std::io::Read;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use super::{ConnectionHandler, ConnectionStream};

/// Reads the first byte of every connection and reports it on a channel.
pub(crate) struct FirstByteHandler {
    seen: Mutex<Sender<Option<u8>>>,
}

impl FirstByteHandler {
    pub(crate) fn new() -> (Arc<Self>, Receiver<Option<u8>>) {
        let (sender, receiver) = mpsc::channel();
        let handler = Arc::new(Self {
            seen: Mutex::new(sender),
        });
        (handler, receiver)
    }
}

impl ConnectionHandler for FirstByteHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        let mut byte = [0_u8; 1];
        let first = match stream.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) | Err(_) => None,
        };
        let seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        // The test may have stopped listening already.
        seen.send(first).ok();
    }
}
