//! Database seam and the row streaming helpers used by table commands.

use std::any::Any;
use std::io::{self, Write};

use aoserv_protocol::{ResponseStatus, WireEncode, WireError, WireWriter};
use thiserror::Error;

/// Error reported by the database layer. Surfaces to the client as a
/// recoverable SQL exception.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DatabaseError {
    message: String,
}

impl DatabaseError {
    /// A failure described by `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure text.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Connection pool or equivalent.
pub trait Database: Send + Sync {
    /// Opens a transaction for one request.
    fn begin(&self) -> Result<Box<dyn Transaction>, DatabaseError>;
}

/// One request's unit of work.
pub trait Transaction: Send {
    /// Makes the work durable.
    fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

    /// Discards the work.
    fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;

    /// Lets services reach their concrete transaction type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A value that can be sent as one streamed row.
pub trait WireRow: Send {
    /// Writes the row's columns.
    fn write_row(&self, out: &mut WireWriter<&mut dyn Write>) -> Result<(), WireError>;
}

impl<T: WireEncode + Send> WireRow for T {
    fn write_row(&self, out: &mut WireWriter<&mut dyn Write>) -> Result<(), WireError> {
        out.write(self)
    }
}

/// Rows produced lazily by a service.
pub trait RowCursor: Send {
    /// Row count when known up front; required for a progress preamble.
    fn size_hint(&self) -> Option<usize> {
        None
    }

    /// The next row, or `None` once the cursor is drained.
    fn next_row(&mut self) -> Result<Option<Box<dyn WireRow>>, DatabaseError>;
}

/// Failure partway through a row stream. The client has already seen part
/// of the stream, so the connection cannot be reused.
#[derive(Debug, Error)]
pub enum RowStreamError {
    /// Encoding a row failed.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// The cursor failed.
    #[error("row source failed mid-stream: {0}")]
    Database(#[from] DatabaseError),
    /// Reading a byte stream failed.
    #[error("byte source failed mid-stream: {0}")]
    Read(#[from] io::Error),
}

fn write_progress<W: Write>(out: &mut WireWriter<W>, rows: usize) -> Result<(), WireError> {
    let count = u32::try_from(rows).unwrap_or(u32::MAX);
    out.write(&ResponseStatus::Next)?;
    out.write_compressed_uint(count)
}

fn write_rows<'a, W: Write, R: WireRow + ?Sized + 'a>(
    out: &mut WireWriter<W>,
    rows: impl IntoIterator<Item = &'a R>,
) -> Result<(), RowStreamError> {
    let mut out = out.as_dyn();
    for row in rows {
        out.write(&ResponseStatus::Next)?;
        row.write_row(&mut out)?;
    }
    out.write(&ResponseStatus::Done)?;
    Ok(())
}

/// Streams rows already held in memory: an optional `NEXT` + row count
/// preamble, `NEXT` + row for each row, then `DONE`.
pub fn write_buffered_rows<W: Write, R: WireRow>(
    out: &mut WireWriter<W>,
    rows: &[R],
    progress: bool,
) -> Result<(), RowStreamError> {
    if progress {
        write_progress(out, rows.len())?;
    }
    write_rows(out, rows)
}

/// Streams rows from a cursor in the same framing as
/// [`write_buffered_rows`]. When a progress preamble is wanted and the
/// cursor cannot say how many rows it holds, the rows are collected first.
pub fn write_cursor_rows<W: Write>(
    out: &mut WireWriter<W>,
    mut cursor: Box<dyn RowCursor>,
    progress: bool,
) -> Result<usize, RowStreamError> {
    if progress && cursor.size_hint().is_none() {
        let mut rows = Vec::new();
        while let Some(row) = cursor.next_row()? {
            rows.push(row);
        }
        write_progress(out, rows.len())?;
        write_rows(out, rows.iter().map(|row| &**row))?;
        return Ok(rows.len());
    }
    if progress && let Some(rows) = cursor.size_hint() {
        write_progress(out, rows)?;
    }
    let mut out = out.as_dyn();
    let mut written = 0;
    while let Some(row) = cursor.next_row()? {
        out.write(&ResponseStatus::Next)?;
        row.write_row(&mut out)?;
        written += 1;
    }
    out.write(&ResponseStatus::Done)?;
    Ok(written)
}

/// Cursor with no rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyCursor;

impl RowCursor for EmptyCursor {
    fn size_hint(&self) -> Option<usize> {
        Some(0)
    }

    /// The next row, or `None` once the cursor is drained.
    fn next_row(&mut self) -> Result<Option<Box<dyn WireRow>>, DatabaseError> {
        Ok(None)
    }
}
