//! Concurrent NT3 protocol pipeline.
//!
//! Bridges a duplex byte transport to typed event queues:
//! - decode loop: transport read side → [`FrameDecoder`](nt3_frame::FrameDecoder) → event queue
//! - encode loop: request queue → frame encoder → transport write side
//!
//! The two loops share nothing but the transport, and each owns one direction
//! of it. Application code only ever touches the queues, usually through
//! [`Client`].

pub mod channel;
pub mod client;
pub mod error;
pub mod pipeline;
pub mod table;

pub use channel::{event_channel, ApplicationEnd, ChannelError, EventReceiver, EventSender, PipelineEnd};
pub use client::{
    Client, ClientConfig, HandshakeResult, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use error::{ClientError, PipelineError, Result};
pub use pipeline::{LoopExit, Pipeline, PipelineReport};
pub use table::{seq_newer, EntryTable};
