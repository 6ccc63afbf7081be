use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::stream::TransportConfig;

/// Outcome of [`TransportWriter::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushResult {
    /// The peer no longer accepts bytes, or this side was completed.
    pub is_completed: bool,
}

/// Write side of a transport.
///
/// Callers ask for a buffer of an exact size, serialize into it, commit the
/// bytes they actually wrote, then flush. Uncommitted bytes are never sent.
pub struct TransportWriter<W> {
    inner: W,
    buf: BytesMut,
    committed: usize,
    completed: bool,
}

impl<W> TransportWriter<W> {
    pub(crate) fn new(inner: W, config: &TransportConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(config.initial_buffer_capacity),
            committed: 0,
            completed: false,
        }
    }

    /// A zeroed writable region of exactly `size` bytes.
    ///
    /// Any region handed out earlier but not committed is discarded.
    pub fn get_buffer(&mut self, size: usize) -> &mut [u8] {
        self.buf.truncate(self.committed);
        self.buf.resize(self.committed + size, 0);
        &mut self.buf[self.committed..]
    }

    /// Commit the first `count` bytes of the region from [`get_buffer`](Self::get_buffer).
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the size of that region.
    pub fn advance(&mut self, count: usize) {
        let staged = self.buf.len() - self.committed;
        assert!(
            count <= staged,
            "advance({count}) exceeds {staged} staged bytes"
        );
        self.committed += count;
        self.buf.truncate(self.committed);
    }

    /// Committed bytes not yet flushed.
    pub fn pending(&self) -> usize {
        self.committed
    }

    /// Whether the write side has been completed.
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl<W: AsyncWrite + Unpin> TransportWriter<W> {
    /// Write every committed byte to the peer and flush.
    pub async fn flush(&mut self) -> Result<FlushResult> {
        self.buf.truncate(self.committed);
        if self.completed {
            return Ok(FlushResult { is_completed: true });
        }

        while !self.buf.is_empty() {
            match self.inner.write(&self.buf).await {
                Ok(0) => {
                    debug!(pending = self.buf.len(), "peer stopped accepting bytes");
                    self.completed = true;
                    return Ok(FlushResult { is_completed: true });
                }
                Ok(written) => {
                    self.buf.advance(written);
                    self.committed = self.buf.len();
                    trace!(written, "transport write");
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match self.inner.flush().await {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        Ok(FlushResult { is_completed: false })
    }

    /// Finalize the write side and signal end-of-stream to the peer.
    pub async fn complete(mut self) -> Result<()> {
        if !self.buf.is_empty() {
            debug!(unsent = self.buf.len(), "discarding unsent bytes on write completion");
        }
        self.completed = true;
        match self.inner.shutdown().await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotConnected => {}
            Err(err) => return Err(TransportError::Io(err)),
        }
        debug!("transport write side completed");
        Ok(())
    }
}

impl<W> std::fmt::Debug for TransportWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportWriter")
            .field("committed", &self.committed)
            .field("completed", &self.completed)
            .finish()
    }
}
