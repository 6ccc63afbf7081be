//! Duplex byte transport for the NT3 protocol engine.
//!
//! Turns a connected socket (or any `AsyncRead + AsyncWrite`) into two
//! independently owned directions:
//! - [`TransportReader`]: "give me at least N unread bytes", then mark bytes consumed
//! - [`TransportWriter`]: "give me a buffer of N bytes", commit, then flush
//!
//! This is the lowest layer. The frame codec never sees sockets, and the
//! pipeline loops never share a direction.

pub mod error;
pub mod reader;
pub mod stream;
pub mod writer;

pub use error::{Result, TransportError};
pub use reader::{ReadResult, TransportReader};
pub use stream::{with_default_port, TcpTransport, TransportConfig, TransportStream, DEFAULT_PORT};
pub use writer::{FlushResult, TransportWriter};
