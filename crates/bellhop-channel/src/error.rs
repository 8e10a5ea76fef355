/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] bellhop_transport::TransportError),

    /// Envelope encoding error.
    #[error("wire error: {0}")]
    Wire(#[from] bellhop_wire::WireError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Event types must be non-empty and free of whitespace.
    #[error("invalid event type {0:?}")]
    InvalidEventType(String),

    /// The operation needs a connection attempt first.
    #[error("channel is not connected or connecting")]
    NotConnected,

    /// The channel has been destroyed.
    #[error("channel has been destroyed")]
    Destroyed,
}

pub type Result<T> = std::result::Result<T, ChannelError>;
