//! NT3 message type tags (first byte of every frame).

/// Liveness frame, no payload. Sent by either side.
pub const KEEP_ALIVE: u8 = 0x00;

/// Client hello (client → server). Also the protocol-family byte.
pub const CLIENT_HELLO: u8 = 0x01;

/// Server hello complete, no payload.
pub const SERVER_HELLO_COMPLETE: u8 = 0x03;

/// Server hello: flags byte, server identity string.
pub const SERVER_HELLO: u8 = 0x04;

/// Client hello complete (client → server), no payload.
pub const CLIENT_HELLO_COMPLETE: u8 = 0x05;

/// Entry assignment: name, type, id, sequence number, flags, value.
pub const ENTRY_ASSIGNMENT: u8 = 0x10;

/// Entry value update: id, sequence number, type, value.
pub const ENTRY_UPDATE: u8 = 0x11;

/// Entry flags update: id, flags.
pub const ENTRY_FLAGS_UPDATE: u8 = 0x12;

/// Entry delete: id.
pub const ENTRY_DELETE: u8 = 0x13;

/// Clear all entries: u32 magic.
pub const CLEAR_ALL_ENTRIES: u8 = 0x14;

/// RPC response: id, call uid, raw result.
pub const RPC_RESPONSE: u8 = 0x21;

/// Returns a human-readable name for a message tag.
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        KEEP_ALIVE => "KEEP_ALIVE",
        CLIENT_HELLO => "CLIENT_HELLO",
        SERVER_HELLO_COMPLETE => "SERVER_HELLO_COMPLETE",
        SERVER_HELLO => "SERVER_HELLO",
        CLIENT_HELLO_COMPLETE => "CLIENT_HELLO_COMPLETE",
        ENTRY_ASSIGNMENT => "ENTRY_ASSIGNMENT",
        ENTRY_UPDATE => "ENTRY_UPDATE",
        ENTRY_FLAGS_UPDATE => "ENTRY_FLAGS_UPDATE",
        ENTRY_DELETE => "ENTRY_DELETE",
        CLEAR_ALL_ENTRIES => "CLEAR_ALL_ENTRIES",
        RPC_RESPONSE => "RPC_RESPONSE",
        _ => "UNKNOWN",
    }
}
