use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::stream::TransportConfig;

/// Outcome of [`TransportReader::read_at_least`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    /// Unconsumed bytes currently buffered.
    pub buffered: usize,
    /// The peer closed its side; no further bytes will arrive.
    pub is_completed: bool,
}

/// Read side of a transport.
///
/// Bytes stay buffered until [`consume`](Self::consume) is called, so a
/// caller can retry a parse from the same position after more data arrives.
pub struct TransportReader<R> {
    inner: R,
    buf: BytesMut,
    chunk_size: usize,
    eof: bool,
}

impl<R> TransportReader<R> {
    pub(crate) fn new(inner: R, config: &TransportConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(config.initial_buffer_capacity),
            chunk_size: config.read_chunk_size.max(1),
            eof: false,
        }
    }

    /// Unconsumed bytes, starting at the first byte not yet consumed.
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Mark the first `count` buffered bytes as consumed.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the number of buffered bytes.
    pub fn consume(&mut self, count: usize) {
        assert!(
            count <= self.buf.len(),
            "consume({count}) exceeds {} buffered bytes",
            self.buf.len()
        );
        self.buf.advance(count);
    }

    /// Whether end-of-stream has been observed.
    pub fn is_completed(&self) -> bool {
        self.eof
    }

    /// Finalize the read side. Unconsumed bytes are discarded.
    pub fn complete(self) {
        if !self.buf.is_empty() {
            debug!(unread = self.buf.len(), "discarding unread bytes on read completion");
        }
        debug!("transport read side completed");
    }
}

impl<R: AsyncRead + Unpin> TransportReader<R> {
    /// Wait until at least `min` unconsumed bytes are buffered, or the peer closes.
    ///
    /// Cancel-safe: bytes received before a cancellation stay buffered.
    pub async fn read_at_least(&mut self, min: usize) -> Result<ReadResult> {
        while self.buf.len() < min && !self.eof {
            let wanted = min - self.buf.len();
            self.buf.reserve(wanted.max(self.chunk_size));

            match self.inner.read_buf(&mut self.buf).await {
                Ok(0) => {
                    debug!(buffered = self.buf.len(), "transport reached end of stream");
                    self.eof = true;
                }
                Ok(read) => trace!(read, buffered = self.buf.len(), "transport read"),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        Ok(ReadResult {
            buffered: self.buf.len(),
            is_completed: self.eof,
        })
    }
}

impl<R> std::fmt::Debug for TransportReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportReader")
            .field("buffered", &self.buf.len())
            .field("eof", &self.eof)
            .finish()
    }
}
