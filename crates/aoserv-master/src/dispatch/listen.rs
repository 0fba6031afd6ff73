//! The LISTEN_CACHES long-poll loop.
//!
//! After the sequence echo the connection carries nothing but notice frames
//! from the server and acknowledgement booleans from the client, until the
//! client leaves, the master shuts down or the identity is disabled.

use std::io::{Read, Write};
use std::sync::Arc;

use aoserv_protocol::{NoticeFrame, SyncId, TableId, WireReader, WireWriter};
use tracing::{debug, info, warn};

use crate::context::MasterContext;
use crate::source::{MailboxEvent, RequestSource};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;

/// Why a listen loop ended without a stream error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenEnd {
    /// The server ended the listener.
    Interrupted,
    /// The listening identity was disabled.
    Disabled,
    /// The identity's access scope could not be resolved.
    AccessUnknown,
}

/// Serves `LISTEN_CACHES` until the client goes away or the listener is
/// ended, pushing every notice this source may see.
pub fn listen_caches<R: Read, W: Write>(
    context: &MasterContext,
    source: &Arc<RequestSource>,
    input: &mut WireReader<R>,
    out: &mut WireWriter<W>,
) -> Result<ListenEnd, DispatchError> {
    let _registration = context.listeners().register(source);
    let version = source.version();
    debug!(
        target: DISPATCH_TARGET,
        connector = %source.connector(),
        listeners = context.listeners().len(),
        "cache listener registered"
    );

    let mut frame = NoticeFrame {
        sync_id: None,
        client_table_ids: TableId::visible_to(version)
            .filter_map(|table| table.client_id(version))
            .collect(),
    };
    let mut sync_ids: Vec<SyncId> = Vec::new();
    loop {
        match context.access().is_disabled(source.user()) {
            Ok(false) => {}
            Ok(true) => {
                info!(
                    target: DISPATCH_TARGET,
                    user = %source.user(),
                    "ending cache listener for disabled identity"
                );
                return Ok(ListenEnd::Disabled);
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    user = %source.user(),
                    %error,
                    "ending cache listener; cannot confirm identity is enabled"
                );
                return Ok(ListenEnd::AccessUnknown);
            }
        }

        out.write(&frame)?;
        out.flush()?;
        if frame.requires_ack(version) && input.read_bool()? {
            for id in sync_ids.drain(..) {
                context.waiters().release(id);
            }
        }

        (frame, sync_ids) = match source
            .mailbox()
            .wait(context.settings().cache_listen_timeout)
        {
            MailboxEvent::Notice(notice) => (
                NoticeFrame {
                    sync_id: notice.sync_ids.last().copied(),
                    client_table_ids: notice.client_table_ids.into_iter().collect(),
                },
                notice.sync_ids,
            ),
            MailboxEvent::TimedOut => (NoticeFrame::heartbeat(), Vec::new()),
            MailboxEvent::Interrupted => return Ok(ListenEnd::Interrupted),
        };
    }
}
