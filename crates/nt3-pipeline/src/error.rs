use std::time::Duration;

/// Errors that stop one of the pipeline loops.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] nt3_transport::TransportError),

    /// Frame-level error (malformed input or unsupported request).
    #[error("frame error: {0}")]
    Frame(#[from] nt3_frame::FrameError),

    /// The loop task panicked or was aborted.
    #[error("pipeline task failed: {0}")]
    TaskPanicked(String),
}

/// Errors surfaced by the client facade.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] nt3_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] nt3_frame::FrameError),

    /// Pipeline loop error.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// The request queue no longer accepts events.
    #[error("request queue closed")]
    Channel,

    /// The server did not finish its hello in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The server sent something the handshake cannot accept.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The event queue completed.
    #[error("server disconnected: {0}")]
    Disconnected(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
