//! Typed protocol events and entry values.

use std::fmt;

use bytes::Bytes;

use crate::error::{FrameError, Result};

/// Sentinel carried by a valid clear-all-entries frame.
pub const CLEAR_ALL_MAGIC: u32 = 0xD06C_B27A;

/// Protocol family byte; shares its value with the ClientHello tag.
pub const PROTOCOL_FAMILY: u8 = crate::tag::CLIENT_HELLO;

/// Protocol revision announced in the client hello (3.0).
pub const PROTOCOL_MAJOR: u8 = 0x03;
pub const PROTOCOL_MINOR: u8 = 0x00;

/// Wire type tag of an entry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntryType {
    Boolean = 0x00,
    Double = 0x01,
    String = 0x02,
    Raw = 0x03,
    BooleanArray = 0x10,
    DoubleArray = 0x11,
    StringArray = 0x12,
    RpcDefinition = 0x20,
}

impl EntryType {
    /// Map a wire type byte to an entry type.
    pub fn from_wire(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::Boolean),
            0x01 => Ok(Self::Double),
            0x02 => Ok(Self::String),
            0x03 => Ok(Self::Raw),
            0x10 => Ok(Self::BooleanArray),
            0x11 => Ok(Self::DoubleArray),
            0x12 => Ok(Self::StringArray),
            0x20 => Ok(Self::RpcDefinition),
            other => Err(FrameError::UnknownEntryType(other)),
        }
    }

    /// The wire type byte.
    pub fn wire(self) -> u8 {
        self as u8
    }

    /// Whether values of this type can be decoded by this client.
    pub fn is_decodable(self) -> bool {
        matches!(self, Self::Boolean | Self::Double | Self::String | Self::Raw)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Double => "double",
            Self::String => "string",
            Self::Raw => "raw",
            Self::BooleanArray => "boolean[]",
            Self::DoubleArray => "double[]",
            Self::StringArray => "string[]",
            Self::RpcDefinition => "rpc",
        }
    }
}

/// A decoded entry value. Either numeric or heap-backed, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    Boolean(bool),
    Double(f64),
    String(String),
    Raw(Bytes),
}

impl EntryValue {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Boolean(_) => EntryType::Boolean,
            Self::Double(_) => EntryType::Double,
            Self::String(_) => EntryType::String,
            Self::Raw(_) => EntryType::Raw,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Raw(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for EntryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::Raw(value) => write!(f, "<raw {} bytes>", value.len()),
        }
    }
}

/// A named entry as announced by an entry assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Entry name. Only sent with the assignment; later frames use `id`.
    pub name: String,
    /// Numeric identifier assigned by the server.
    pub id: u16,
    /// Sequence number ordering updates to this id.
    pub seq: u16,
    /// Entry flags bitmask (bit 0: persistent).
    pub flags: u8,
    pub value: EntryValue,
}

impl Entry {
    pub fn entry_type(&self) -> EntryType {
        self.value.entry_type()
    }

    pub fn is_persistent(&self) -> bool {
        self.flags & 0x01 != 0
    }
}

/// A value update for an already assigned entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryUpdate {
    pub id: u16,
    pub seq: u16,
    pub value: EntryValue,
}

impl EntryUpdate {
    pub fn entry_type(&self) -> EntryType {
        self.value.entry_type()
    }
}

/// Server hello contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub flags: u8,
    pub server_identity: String,
}

impl ServerHello {
    /// Bit 0: the server has seen this client before.
    pub fn client_seen(&self) -> bool {
        self.flags & 0x01 != 0
    }
}

/// RPC response. The result stays opaque; RPC definitions are not decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse {
    pub id: u16,
    pub call_uid: u16,
    pub result: Bytes,
}

/// Discriminant of a [`ReadEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadEventKind {
    KeepAlive,
    ServerHello,
    ServerHelloComplete,
    EntryAssignment,
    EntryUpdate,
    EntryFlagsUpdate,
    EntryDelete,
    ClearAllEntries,
    RpcResponse,
}

impl ReadEventKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::KeepAlive => "keep_alive",
            Self::ServerHello => "server_hello",
            Self::ServerHelloComplete => "server_hello_complete",
            Self::EntryAssignment => "entry_assignment",
            Self::EntryUpdate => "entry_update",
            Self::EntryFlagsUpdate => "entry_flags_update",
            Self::EntryDelete => "entry_delete",
            Self::ClearAllEntries => "clear_all_entries",
            Self::RpcResponse => "rpc_response",
        }
    }
}

/// A decoded server → client message.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadEvent {
    KeepAlive,
    ServerHello(ServerHello),
    ServerHelloComplete,
    EntryAssignment(Entry),
    EntryUpdate(EntryUpdate),
    EntryFlagsUpdate { id: u16, flags: u8 },
    EntryDelete { id: u16 },
    ClearAllEntries,
    RpcResponse(RpcResponse),
}

impl ReadEvent {
    pub fn kind(&self) -> ReadEventKind {
        match self {
            Self::KeepAlive => ReadEventKind::KeepAlive,
            Self::ServerHello(_) => ReadEventKind::ServerHello,
            Self::ServerHelloComplete => ReadEventKind::ServerHelloComplete,
            Self::EntryAssignment(_) => ReadEventKind::EntryAssignment,
            Self::EntryUpdate(_) => ReadEventKind::EntryUpdate,
            Self::EntryFlagsUpdate { .. } => ReadEventKind::EntryFlagsUpdate,
            Self::EntryDelete { .. } => ReadEventKind::EntryDelete,
            Self::ClearAllEntries => ReadEventKind::ClearAllEntries,
            Self::RpcResponse(_) => ReadEventKind::RpcResponse,
        }
    }

    /// The assigned entry.
    ///
    /// # Panics
    ///
    /// Panics if this is not an entry assignment.
    pub fn entry_assignment(&self) -> &Entry {
        match self {
            Self::EntryAssignment(entry) => entry,
            other => panic!("expected entry_assignment, got {}", other.kind().name()),
        }
    }

    /// The entry update.
    ///
    /// # Panics
    ///
    /// Panics if this is not an entry update.
    pub fn entry_update(&self) -> &EntryUpdate {
        match self {
            Self::EntryUpdate(update) => update,
            other => panic!("expected entry_update, got {}", other.kind().name()),
        }
    }
}

impl fmt::Display for ReadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerHello(hello) => write!(
                f,
                "server_hello identity={:?} flags=0x{:02x}",
                hello.server_identity, hello.flags
            ),
            Self::EntryAssignment(entry) => write!(
                f,
                "entry_assignment name={:?} id={} seq={} type={} flags=0x{:02x} value={}",
                entry.name,
                entry.id,
                entry.seq,
                entry.entry_type().name(),
                entry.flags,
                entry.value
            ),
            Self::EntryUpdate(update) => write!(
                f,
                "entry_update id={} seq={} type={} value={}",
                update.id,
                update.seq,
                update.entry_type().name(),
                update.value
            ),
            Self::EntryFlagsUpdate { id, flags } => {
                write!(f, "entry_flags_update id={id} flags=0x{flags:02x}")
            }
            Self::EntryDelete { id } => write!(f, "entry_delete id={id}"),
            Self::RpcResponse(response) => write!(
                f,
                "rpc_response id={} call_uid={} result=<{} bytes>",
                response.id,
                response.call_uid,
                response.result.len()
            ),
            other => f.write_str(other.kind().name()),
        }
    }
}

/// Discriminant of a [`WriteEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteEventKind {
    ClientHello,
    ClientHelloComplete,
}

/// A client → server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEvent {
    ClientHello { client_name: String },
    ClientHelloComplete,
}

impl WriteEvent {
    /// Build a client hello.
    ///
    /// Only blank names can be encoded today; anything else is rejected here
    /// instead of being truncated on the wire.
    pub fn client_hello(client_name: impl Into<String>) -> Result<Self> {
        let client_name = client_name.into();
        ensure_blank_name(&client_name)?;
        Ok(Self::ClientHello { client_name })
    }

    pub fn client_hello_complete() -> Self {
        Self::ClientHelloComplete
    }

    pub fn kind(&self) -> WriteEventKind {
        match self {
            Self::ClientHello { .. } => WriteEventKind::ClientHello,
            Self::ClientHelloComplete => WriteEventKind::ClientHelloComplete,
        }
    }
}

pub(crate) fn ensure_blank_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        Ok(())
    } else {
        Err(FrameError::UnsupportedClientName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_wire_mapping() {
        for byte in [0x00, 0x01, 0x02, 0x03, 0x10, 0x11, 0x12, 0x20] {
            assert_eq!(EntryType::from_wire(byte).unwrap().wire(), byte);
        }
        assert!(matches!(
            EntryType::from_wire(0x04),
            Err(FrameError::UnknownEntryType(0x04))
        ));
    }

    #[test]
    fn only_scalar_types_are_decodable() {
        assert!(EntryType::Raw.is_decodable());
        assert!(!EntryType::DoubleArray.is_decodable());
        assert!(!EntryType::RpcDefinition.is_decodable());
    }

    #[test]
    fn value_accessors_match_variant() {
        let value = EntryValue::Double(1.5);
        assert_eq!(value.as_f64(), Some(1.5));
        assert_eq!(value.as_bool(), None);
        assert_eq!(value.entry_type(), EntryType::Double);

        let value = EntryValue::String("auto".to_string());
        assert_eq!(value.as_str(), Some("auto"));
        assert!(value.as_bytes().is_none());
    }

    #[test]
    fn accessor_returns_matching_variant() {
        let event = ReadEvent::EntryUpdate(EntryUpdate {
            id: 4,
            seq: 9,
            value: EntryValue::Boolean(true),
        });
        assert_eq!(event.entry_update().id, 4);
        assert_eq!(event.kind(), ReadEventKind::EntryUpdate);
    }

    #[test]
    #[should_panic(expected = "expected entry_assignment, got keep_alive")]
    fn wrong_variant_access_panics() {
        let _ = ReadEvent::KeepAlive.entry_assignment();
    }

    #[test]
    fn client_hello_rejects_non_blank_names() {
        assert!(WriteEvent::client_hello("").is_ok());
        assert!(WriteEvent::client_hello("   ").is_ok());
        assert!(matches!(
            WriteEvent::client_hello("dashboard"),
            Err(FrameError::UnsupportedClientName(name)) if name == "dashboard"
        ));
    }

    #[test]
    fn server_hello_flags() {
        let hello = ServerHello {
            flags: 0x01,
            server_identity: "robot".to_string(),
        };
        assert!(hello.client_seen());
    }

    #[test]
    fn display_is_compact() {
        let event = ReadEvent::EntryAssignment(Entry {
            name: "/SmartDashboard/speed".to_string(),
            id: 1,
            seq: 2,
            flags: 0,
            value: EntryValue::Double(0.5),
        });
        assert_eq!(
            event.to_string(),
            "entry_assignment name=\"/SmartDashboard/speed\" id=1 seq=2 type=double flags=0x00 value=0.5"
        );
        assert_eq!(ReadEvent::ClearAllEntries.to_string(), "clear_all_entries");
    }
}
