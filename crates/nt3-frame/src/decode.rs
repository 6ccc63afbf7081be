//! Incremental frame decoding.
//!
//! A decode attempt either produces a whole frame or reports how many bytes
//! (counted from the frame's first byte) it needs before it can make progress.
//! Nothing is consumed on an incomplete attempt; the caller retries from the
//! same position once more bytes are buffered.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::{FrameError, Result};
use crate::event::{
    Entry, EntryType, EntryUpdate, EntryValue, ReadEvent, RpcResponse, ServerHello,
    CLEAR_ALL_MAGIC,
};
use crate::tag;
use crate::varint::decode_varint;

/// Default cap on a single length-prefixed field: 16 MiB.
pub const DEFAULT_MAX_FIELD_LEN: usize = 16 * 1024 * 1024;

/// Configuration for the frame decoder.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest accepted string or raw payload. Longer declared lengths are malformed.
    pub max_field_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }
}

/// Result of a single decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Decode {
    /// A complete frame occupying the first `consumed` bytes.
    ///
    /// `event` is `None` for frames that carry nothing to report (a clear-all
    /// with the wrong magic).
    Frame {
        event: Option<ReadEvent>,
        consumed: usize,
    },
    /// At least `needed` bytes from the frame start are required.
    /// Always larger than the length of the input that was offered.
    Incomplete { needed: usize },
}

/// Why a decode attempt stopped early.
enum Stop {
    Incomplete(usize),
    Malformed(FrameError),
}

impl From<FrameError> for Stop {
    fn from(err: FrameError) -> Self {
        Stop::Malformed(err)
    }
}

type Step<T> = std::result::Result<T, Stop>;

/// Read position within one decode attempt.
struct Cursor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Step<&'a [u8]> {
        let end = self.pos + len;
        if end > self.src.len() {
            return Err(Stop::Incomplete(end));
        }
        let bytes = &self.src[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Step<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Step<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Step<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Step<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Step<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn varint(&mut self) -> Step<usize> {
        match decode_varint(&self.src[self.pos..])? {
            Some((value, used)) => {
                self.pos += used;
                Ok(value as usize)
            }
            None => Err(Stop::Incomplete(self.src.len() + 1)),
        }
    }
}

/// Decodes NT3 frames from an accumulating byte buffer.
///
/// Owns one scratch buffer for the length-prefixed field currently being
/// copied. The buffer survives incomplete attempts so a retry does not
/// allocate again, and is handed over to the decoded value once the field is
/// complete.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    scratch: Option<Vec<u8>>,
    config: FrameConfig,
}

impl FrameDecoder {
    /// Create a decoder with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            scratch: None,
            config,
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Length of the field currently held in the scratch buffer, if any.
    pub fn scratch_len(&self) -> Option<usize> {
        self.scratch.as_ref().map(Vec::len)
    }

    /// Attempt to decode the frame at the start of `src`.
    pub fn decode(&mut self, src: &[u8]) -> Result<Decode> {
        let mut cursor = Cursor::new(src);
        match self.frame(&mut cursor) {
            Ok(event) => {
                trace!(
                    tag = src.first().map_or("-", |&byte| tag::tag_name(byte)),
                    consumed = cursor.pos,
                    "decoded frame"
                );
                Ok(Decode::Frame {
                    event,
                    consumed: cursor.pos,
                })
            }
            Err(Stop::Incomplete(needed)) => {
                debug_assert!(needed > src.len());
                Ok(Decode::Incomplete { needed })
            }
            Err(Stop::Malformed(err)) => Err(err),
        }
    }

    fn frame(&mut self, cursor: &mut Cursor<'_>) -> Step<Option<ReadEvent>> {
        let event = match cursor.u8()? {
            tag::KEEP_ALIVE => ReadEvent::KeepAlive,
            tag::SERVER_HELLO_COMPLETE => ReadEvent::ServerHelloComplete,
            tag::SERVER_HELLO => {
                let flags = cursor.u8()?;
                let server_identity = self.string(cursor)?;
                ReadEvent::ServerHello(ServerHello {
                    flags,
                    server_identity,
                })
            }
            tag::ENTRY_ASSIGNMENT => {
                let name = self.string(cursor)?;
                let entry_type = EntryType::from_wire(cursor.u8()?)?;
                let id = cursor.u16()?;
                let seq = cursor.u16()?;
                let flags = cursor.u8()?;
                let value = self.value(cursor, entry_type)?;
                ReadEvent::EntryAssignment(Entry {
                    name,
                    id,
                    seq,
                    flags,
                    value,
                })
            }
            tag::ENTRY_UPDATE => {
                let id = cursor.u16()?;
                let seq = cursor.u16()?;
                let entry_type = EntryType::from_wire(cursor.u8()?)?;
                let value = self.value(cursor, entry_type)?;
                ReadEvent::EntryUpdate(EntryUpdate { id, seq, value })
            }
            tag::ENTRY_FLAGS_UPDATE => {
                let id = cursor.u16()?;
                let flags = cursor.u8()?;
                ReadEvent::EntryFlagsUpdate { id, flags }
            }
            tag::ENTRY_DELETE => ReadEvent::EntryDelete { id: cursor.u16()? },
            tag::CLEAR_ALL_ENTRIES => {
                let magic = cursor.u32()?;
                if magic != CLEAR_ALL_MAGIC {
                    debug!(magic = format_args!("{magic:#010x}"), "ignoring clear-all with bad magic");
                    return Ok(None);
                }
                ReadEvent::ClearAllEntries
            }
            tag::RPC_RESPONSE => {
                let id = cursor.u16()?;
                let call_uid = cursor.u16()?;
                let result = self.raw(cursor)?;
                ReadEvent::RpcResponse(RpcResponse {
                    id,
                    call_uid,
                    result,
                })
            }
            other => return Err(FrameError::UnknownMessageType(other).into()),
        };
        Ok(Some(event))
    }

    fn value(&mut self, cursor: &mut Cursor<'_>, entry_type: EntryType) -> Step<EntryValue> {
        let value = match entry_type {
            EntryType::Boolean => EntryValue::Boolean(cursor.u8()? != 0),
            EntryType::Double => EntryValue::Double(f64::from_bits(cursor.u64()?)),
            EntryType::String => EntryValue::String(self.string(cursor)?),
            EntryType::Raw => EntryValue::Raw(self.raw(cursor)?),
            unsupported => return Err(FrameError::UnsupportedEntryType(unsupported).into()),
        };
        Ok(value)
    }

    fn string(&mut self, cursor: &mut Cursor<'_>) -> Step<String> {
        let bytes = self.field(cursor)?;
        Ok(String::from_utf8(bytes)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()))
    }

    fn raw(&mut self, cursor: &mut Cursor<'_>) -> Step<Bytes> {
        Ok(Bytes::from(self.field(cursor)?))
    }

    /// Read one length-prefixed field through the scratch buffer.
    fn field(&mut self, cursor: &mut Cursor<'_>) -> Step<Vec<u8>> {
        let len = cursor.varint()?;
        if len > self.config.max_field_len {
            return Err(FrameError::FieldTooLarge {
                len,
                max: self.config.max_field_len,
            }
            .into());
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut scratch = match self.scratch.take() {
            Some(buf) if buf.len() == len => buf,
            _ => vec![0u8; len],
        };
        match cursor.take(len) {
            Ok(bytes) => {
                scratch.copy_from_slice(bytes);
                Ok(scratch)
            }
            Err(stop) => {
                self.scratch = Some(scratch);
                Err(stop)
            }
        }
    }
}
