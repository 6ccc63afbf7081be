use crate::event::EntryType;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame starts with a message tag this client does not know.
    #[error("unknown message type 0x{0:02x}")]
    UnknownMessageType(u8),

    /// An entry carries a type tag outside the NT3 type space.
    #[error("unknown entry type 0x{0:02x}")]
    UnknownEntryType(u8),

    /// An entry value of this type cannot be decoded (arrays, RPC definitions).
    #[error("entry type {} cannot be decoded", .0.name())]
    UnsupportedEntryType(EntryType),

    /// A length-prefixed field declares more bytes than allowed.
    #[error("field too large ({len} bytes, max {max})")]
    FieldTooLarge { len: usize, max: usize },

    /// A varint length prefix did not terminate within the allowed bytes.
    #[error("varint length prefix exceeds {} bytes", crate::varint::MAX_VARINT_LEN)]
    VarintOverflow,

    /// Only blank client names can currently be encoded.
    #[error("client name {0:?} is not supported (only blank names can be encoded)")]
    UnsupportedClientName(String),

    /// The destination buffer cannot hold the encoded frame.
    #[error("buffer too small ({available} bytes, need {needed})")]
    BufferTooSmall { needed: usize, available: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True for errors caused by bytes received from the peer.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FrameError::UnknownMessageType(_)
                | FrameError::UnknownEntryType(_)
                | FrameError::UnsupportedEntryType(_)
                | FrameError::FieldTooLarge { .. }
                | FrameError::VarintOverflow
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
