/// Errors that can occur in window transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target window has been closed or navigated away.
    #[error("window {0} is closed")]
    Closed(u64),

    /// The platform rejected a posted message.
    #[error("postMessage failed: {0}")]
    Post(String),

    /// A `message` listener could not be installed.
    #[error("failed to install message listener: {0}")]
    Listener(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
