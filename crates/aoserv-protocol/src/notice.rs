//! Invalidation payloads: the tail of every response and the frames pushed to
//! cache listeners.
//!
//! Both carry client table ids as compressed ints terminated by
//! [`TableId::END_OF_LIST`](crate::TableId::END_OF_LIST).

use std::io::{Read, Write};

use crate::codec::{WireDecode, WireEncode, WireError, WireReader, WireWriter};
use crate::table::TableId;
use crate::version::{ProtocolVersion, gates};

/// Correlates a pushed notice with a server-side waiter.
pub type SyncId = i64;

fn write_table_ids<W: Write>(out: &mut WireWriter<W>, ids: &[i32]) -> Result<(), WireError> {
    for id in ids {
        out.write_compressed_int(*id)?;
    }
    out.write_compressed_int(TableId::END_OF_LIST)
}

fn read_table_ids<R: Read>(input: &mut WireReader<R>) -> Result<Vec<i32>, WireError> {
    let mut ids = Vec::new();
    loop {
        match input.read_compressed_int()? {
            TableId::END_OF_LIST => return Ok(ids),
            id => ids.push(id),
        }
    }
}

/// Client table ids the caller's own command invalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationTail {
    /// Invalidated tables, in the client's numbering.
    pub client_table_ids: Vec<i32>,
}

impl WireEncode for InvalidationTail {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        if gates::RESPONSE_SYNC_PREFIX.applies(out.version()) {
            out.write_bool(false)?;
        }
        write_table_ids(out, &self.client_table_ids)
    }
}

impl WireDecode for InvalidationTail {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        if gates::RESPONSE_SYNC_PREFIX.applies(input.version()) && input.read_bool()? {
            // Servers in that window never set the flag; a set flag carried a
            // sync id that has no meaning in a direct response.
            input.read_i64()?;
        }
        Ok(Self {
            client_table_ids: read_table_ids(input)?,
        })
    }
}

/// One push to a listening client. An empty frame without a sync id is a
/// heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeFrame {
    /// Sync id the listener acknowledges, absent on heartbeats.
    pub sync_id: Option<SyncId>,
    /// Invalidated tables, in the client's numbering.
    pub client_table_ids: Vec<i32>,
}

impl NoticeFrame {
    /// A frame with no tables, sent when the long-poll wait times out.
    #[must_use]
    pub const fn heartbeat() -> Self {
        Self {
            sync_id: None,
            client_table_ids: Vec::new(),
        }
    }

    /// Returns `true` when the client answers this frame with an ack byte.
    ///
    /// Clients predating sync ids ack everything; newer clients only ack
    /// frames that carry one.
    #[must_use]
    pub fn requires_ack(&self, version: ProtocolVersion) -> bool {
        !gates::CACHE_SYNC_ID.applies(version) || self.sync_id.is_some()
    }
}

impl WireEncode for NoticeFrame {
    fn encode<W: Write>(&self, out: &mut WireWriter<W>) -> Result<(), WireError> {
        if gates::CACHE_SYNC_ID.applies(out.version()) {
            out.write_nullable(self.sync_id, |out, id| out.write_i64(id))?;
        }
        write_table_ids(out, &self.client_table_ids)
    }
}

impl WireDecode for NoticeFrame {
    fn decode<R: Read>(input: &mut WireReader<R>) -> Result<Self, WireError> {
        let sync_id = if gates::CACHE_SYNC_ID.applies(input.version()) {
            input.read_nullable(|input| input.read_i64())?
        } else {
            None
        };
        Ok(Self {
            sync_id,
            client_table_ids: read_table_ids(input)?,
        })
    }
}
