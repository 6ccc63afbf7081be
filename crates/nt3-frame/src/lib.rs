//! Incremental NT3 frame codec and typed event model.
//!
//! Every frame starts with a one-byte message tag; the rest of the layout is
//! tag-specific:
//! - Integers are fixed-width big-endian (u16 ids and sequence numbers, u32
//!   clear-all magic, u64 double bit patterns)
//! - Strings and raw payloads carry an unsigned LEB128 length prefix
//!
//! [`FrameDecoder`] re-attempts a frame from its first byte each time more
//! bytes arrive, so callers only need to keep unconsumed bytes around.

#[cfg(feature = "async")]
pub mod codec;
pub mod decode;
pub mod encode;
pub mod error;
pub mod event;
pub mod tag;
pub mod varint;

#[cfg(feature = "async")]
pub use codec::Nt3Codec;
pub use decode::{Decode, FrameConfig, FrameDecoder, DEFAULT_MAX_FIELD_LEN};
pub use error::{FrameError, Result};
pub use event::{
    Entry, EntryType, EntryUpdate, EntryValue, ReadEvent, ReadEventKind, RpcResponse, ServerHello,
    WriteEvent, WriteEventKind, CLEAR_ALL_MAGIC, PROTOCOL_FAMILY, PROTOCOL_MAJOR, PROTOCOL_MINOR,
};
pub use varint::{decode_varint, encode_varint, varint_len, MAX_VARINT_LEN};
