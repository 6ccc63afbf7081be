//! Client → server frame encoding.
//!
//! [`WriteEvent::encoded_len`] and [`WriteEvent::encode_into`] are a pair:
//! a buffer sized with the first is always large enough for the second, and
//! `encode_into` returns exactly that many bytes.

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::event::{ensure_blank_name, WriteEvent, PROTOCOL_FAMILY, PROTOCOL_MAJOR, PROTOCOL_MINOR};
use crate::tag;
use crate::varint::{encode_varint, varint_len};

impl WriteEvent {
    /// Exact number of bytes this event occupies on the wire.
    pub fn encoded_len(&self) -> Result<usize> {
        match self {
            WriteEvent::ClientHello { client_name } => {
                ensure_blank_name(client_name)?;
                Ok(3 + varint_len(0))
            }
            WriteEvent::ClientHelloComplete => Ok(1),
        }
    }

    /// Serialize into `dst`, returning the number of bytes written.
    ///
    /// Validation happens before the first byte is written, so an error never
    /// leaves a partial frame behind.
    pub fn encode_into(&self, dst: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len()?;
        if dst.len() < len {
            return Err(FrameError::BufferTooSmall {
                needed: len,
                available: dst.len(),
            });
        }

        let mut out = &mut dst[..len];
        match self {
            WriteEvent::ClientHello { .. } => {
                out.put_u8(PROTOCOL_FAMILY);
                out.put_u8(PROTOCOL_MAJOR);
                out.put_u8(PROTOCOL_MINOR);
                encode_varint(0, &mut out);
            }
            WriteEvent::ClientHelloComplete => out.put_u8(tag::CLIENT_HELLO_COMPLETE),
        }
        debug_assert!(out.is_empty(), "encoded_len and encode_into disagree");
        Ok(len)
    }

    /// Append the encoded frame to `dst`.
    pub fn encode_to(&self, dst: &mut BytesMut) -> Result<()> {
        let len = self.encoded_len()?;
        let start = dst.len();
        dst.resize(start + len, 0);
        match self.encode_into(&mut dst[start..]) {
            Ok(written) => {
                dst.truncate(start + written);
                Ok(())
            }
            Err(err) => {
                dst.truncate(start);
                Err(err)
            }
        }
    }
}
