/// Errors that can occur during schema registration or validation.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema file could not be loaded.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// The schema could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// The payload failed schema validation.
    #[error("validation failed for '{event_type}': {message}")]
    ValidationFailed { event_type: String, message: String },

    /// The schema text is not valid JSON.
    #[error("schema is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// No schema registered for the given event type.
    #[error("no schema registered for '{0}'")]
    NoSchema(String),

    /// The event type cannot be used as a schema key.
    #[error("invalid event type '{0}'")]
    InvalidEventType(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
