//! NT3 telemetry protocol client.
//!
//! Talks to NetworkTables 3.0 servers: connects over TCP, decodes the server's
//! frame stream into typed events, and encodes client messages, with the two
//! directions running as independent tasks.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP or in-memory duplex split into owned read and write sides
//! - [`frame`]: incremental frame decoder, encoder, and event model
//! - [`pipeline`]: event queues, decode/encode loops, client facade (behind `pipeline` feature)

/// Re-export transport types.
pub mod transport {
    pub use nt3_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use nt3_frame::*;
}

/// Re-export pipeline types (requires `pipeline` feature).
#[cfg(feature = "pipeline")]
pub mod pipeline {
    pub use nt3_pipeline::*;
}
