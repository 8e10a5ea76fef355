use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use jsonschema::Validator;
use serde_json::{Map, Value};

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::validator::validate_value;

const SCHEMA_SUFFIX: &str = ".schema.json";
/// Keywords whose value is a map of subschemas.
const MAP_KEYWORDS: [&str; 5] = [
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "definitions",
];

/// Keywords whose value is a single subschema.
const SINGLE_KEYWORDS: [&str; 11] = [
    "propertyNames",
    "additionalProperties",
    "unevaluatedProperties",
    "items",
    "contains",
    "additionalItems",
    "unevaluatedItems",
    "not",
    "if",
    "then",
    "else",
];

/// Keywords whose value is an array of subschemas.
const ARRAY_KEYWORDS: [&str; 4] = ["prefixItems", "allOf", "anyOf", "oneOf"];

/// Keywords that only make sense on object schemas.
const OBJECT_KEYWORDS: [&str; 8] = [
    "properties",
    "patternProperties",
    "additionalProperties",
    "unevaluatedProperties",
    "required",
    "dependentRequired",
    "dependentSchemas",
    "propertyNames",
];

/// Event-type keyed registry of compiled JSON Schema validators.
pub struct SchemaRegistry {
    validators: HashMap<String, Validator>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            validators: HashMap::new(),
            config,
        }
    }

    /// Register a schema for an event type from a JSON string.
    pub fn register(&mut self, event_type: &str, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)?;
        self.register_value(event_type, &schema)
    }

    /// Register a schema for an event type from a JSON value.
    pub fn register_value(&mut self, event_type: &str, schema: &Value) -> Result<()> {
        if !self.config.accepts_event_type(event_type) {
            return Err(SchemaError::InvalidEventType(event_type.to_string()));
        }

        let mut schema = schema.clone();
        if self.config.strict_mode {
            apply_strict_mode(&mut schema);
        }
        let compiled = jsonschema::validator_for(&schema)
            .map_err(|err| SchemaError::CompileFailed(err.to_string()))?;

        self.validators.insert(event_type.to_string(), compiled);
        Ok(())
    }

    /// Load from embedded `(event type, schema)` pairs.
    pub fn from_embedded(schemas: &[(&str, &str)]) -> Result<Self> {
        Self::from_embedded_with_config(schemas, RegistryConfig::default())
    }

    /// Load from embedded pairs with explicit config.
    pub fn from_embedded_with_config(
        schemas: &[(&str, &str)],
        config: RegistryConfig,
    ) -> Result<Self> {
        let mut registry = Self::with_config(config);
        for (event_type, schema) in schemas {
            registry.register(event_type, schema)?;
        }
        Ok(registry)
    }

    /// Load every `<event-type>.schema.json` file in a directory.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, RegistryConfig::default())
    }

    /// Load schemas from a directory with explicit config.
    ///
    /// Symlinked schema files are refused; other files are ignored.
    pub fn from_directory_with_config(path: &Path, config: RegistryConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);
        let mut loaded = 0usize;

        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;

        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some(event_type) = file_name.strip_suffix(SCHEMA_SUFFIX) else {
                continue;
            };

            let entry_path = entry.path();
            let path_metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            if path_metadata.file_type().is_symlink() {
                return Err(SchemaError::LoadFailed(format!(
                    "refusing to load schema symlink: {file_name}"
                )));
            }
            if !path_metadata.is_file() {
                continue;
            }

            loaded = loaded.saturating_add(1);
            if loaded > registry.config.max_schemas_from_directory {
                return Err(SchemaError::LoadFailed(format!(
                    "schema count exceeds configured max ({})",
                    registry.config.max_schemas_from_directory
                )));
            }

            let content = read_schema_file(&entry_path, &path_metadata, &registry.config)?;
            tracing::debug!(event_type, file = %file_name, "loaded schema");
            registry.register(event_type, &content)?;
        }

        Ok(registry)
    }

    /// Validate an event payload against the schema of its type.
    ///
    /// Envelopes without `data` are validated as `null`.
    pub fn validate(&self, event_type: &str, data: Option<&Value>) -> Result<()> {
        match self.validators.get(event_type) {
            Some(validator) => validate_value(event_type, data.unwrap_or(&Value::Null), validator),
            None if self.config.fail_on_missing_schema => {
                Err(SchemaError::NoSchema(event_type.to_string()))
            }
            None => Ok(()),
        }
    }

    /// Check if an event type has a registered schema.
    pub fn has_schema(&self, event_type: &str) -> bool {
        self.validators.contains_key(event_type)
    }

    /// Event types that have registered schemas, sorted.
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.validators.keys().cloned().collect();
        types.sort_unstable();
        types
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("event_types", &self.event_types())
            .field("config", &self.config)
            .finish()
    }
}

fn read_schema_file(
    path: &Path,
    path_metadata: &std::fs::Metadata,
    config: &RegistryConfig,
) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|err| {
        SchemaError::LoadFailed(format!("failed opening schema {}: {err}", path.display()))
    })?;
    let opened_metadata = file
        .metadata()
        .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;

    #[cfg(unix)]
    if !same_file_identity(path_metadata, &opened_metadata) {
        return Err(SchemaError::LoadFailed(format!(
            "schema file changed during load: {}",
            path.display()
        )));
    }
    #[cfg(not(unix))]
    let _ = path_metadata;

    let max_bytes = config.max_schema_file_size;
    if opened_metadata.len() > max_bytes as u64 {
        return Err(SchemaError::LoadFailed(format!(
            "schema file too large ({} bytes): {}",
            opened_metadata.len(),
            path.display()
        )));
    }

    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| {
            SchemaError::LoadFailed(format!("failed reading schema {}: {err}", path.display()))
        })?;
    if content.len() > max_bytes {
        return Err(SchemaError::LoadFailed(format!(
            "schema file too large while reading: {}",
            path.display()
        )));
    }
    Ok(content)
}

fn apply_strict_mode(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }

            for key in MAP_KEYWORDS {
                if let Some(Value::Object(children)) = map.get_mut(key) {
                    children.values_mut().for_each(apply_strict_mode);
                }
            }
            for key in SINGLE_KEYWORDS {
                if let Some(child) = map.get_mut(key) {
                    apply_strict_mode(child);
                }
            }
            for key in ARRAY_KEYWORDS {
                if let Some(Value::Array(children)) = map.get_mut(key) {
                    children.iter_mut().for_each(apply_strict_mode);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(apply_strict_mode),
        _ => {}
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds
            .iter()
            .any(|kind| matches!(kind, Value::String(kind) if kind == "object")),
        _ => OBJECT_KEYWORDS.iter().any(|keyword| map.contains_key(*keyword)),
    }
}

#[cfg(unix)]
fn same_file_identity(
    path_metadata: &std::fs::Metadata,
    opened_metadata: &std::fs::Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}
