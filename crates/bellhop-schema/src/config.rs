/// Default longest event type a schema can be registered under.
pub const DEFAULT_MAX_EVENT_TYPE_LEN: usize = 128;

/// How schemas are keyed, loaded and applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Add `additionalProperties: false` to every object schema on register.
    pub strict_mode: bool,
    /// Reject payloads whose event type has no schema instead of passing them.
    pub fail_on_missing_schema: bool,
    /// Longest event type accepted as a registry key.
    pub max_event_type_len: usize,
    /// Cap on `<event-type>.schema.json` files read from one directory.
    pub max_schemas_from_directory: usize,
    /// Cap on the size of a single schema file, in bytes.
    pub max_schema_file_size: usize,
}

impl RegistryConfig {
    /// Whether `event_type` can key a schema: non-empty, within
    /// `max_event_type_len`, and made of `[A-Za-z0-9_.:-]` so it also
    /// works as a file name stem.
    pub fn accepts_event_type(&self, event_type: &str) -> bool {
        !event_type.is_empty()
            && event_type.len() <= self.max_event_type_len
            && event_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            fail_on_missing_schema: false,
            max_event_type_len: DEFAULT_MAX_EVENT_TYPE_LEN,
            max_schemas_from_directory: 256,
            max_schema_file_size: 256 * 1024,
        }
    }
}
