/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The message is not valid JSON, or a value could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The message exceeds the configured size limit.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The message nests deeper than the configured limit.
    #[error("message nested deeper than {max} levels")]
    TooDeep { max: usize },

    /// A registered class failed to rebuild itself from its raw value.
    #[error("failed to revive {class}: {message}")]
    Revival { class: String, message: String },

    /// A class name is not a dotted identifier path.
    #[error("invalid class name '{0}'")]
    InvalidClassName(String),

    /// A class name was registered twice.
    #[error("class '{0}' is already registered")]
    DuplicateClass(String),
}

pub type Result<T> = std::result::Result<T, WireError>;
