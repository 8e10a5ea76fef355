use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::data::Data;
use crate::error::{Result, WireError};

/// Field that tags a JSON object with the class it revives into.
pub const CLASSNAME_FIELD: &str = "__classname";

const MAX_CLASS_NAME_LEN: usize = 128;

/// Downcasting support for [`WireObject`] trait objects.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A domain value that travels inside message payloads.
pub trait WireObject: AsAny + fmt::Debug {
    /// Name written to [`CLASSNAME_FIELD`] when encoding.
    fn class_name(&self) -> &str;

    /// JSON form of the value. Objects get the class tag added on encode
    /// unless they already carry one.
    fn to_json(&self) -> Value;
}

/// A [`WireObject`] that can be rebuilt from its tagged form.
///
/// Revival is post-order: nested tagged objects are rebuilt first, then
/// `Self::default()` is constructed and [`FromWire::from_json`] receives
/// the tagged object (still carrying [`CLASSNAME_FIELD`]) with those
/// children already in place as [`Data::Typed`].
pub trait FromWire: WireObject + Default + 'static {
    fn from_json(&mut self, raw: &Data) -> Result<()>;
}

type Factory = fn(&Data) -> Result<Rc<dyn WireObject>>;

fn construct<T: FromWire>(raw: &Data) -> Result<Rc<dyn WireObject>> {
    let mut instance = T::default();
    instance.from_json(raw)?;
    Ok(Rc::new(instance))
}

/// Class-name keyed table of revivable types.
///
/// Built once at startup and shared (usually behind an `Arc`) by every
/// channel that should understand those types.
#[derive(Default)]
pub struct ClassRegistry {
    factories: HashMap<String, Factory>,
}

impl ClassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`, a dotted identifier path such as
    /// `springroll.Point`.
    pub fn register<T: FromWire>(&mut self, name: &str) -> Result<()> {
        validate_class_name(name)?;
        if self.factories.contains_key(name) {
            return Err(WireError::DuplicateClass(name.to_string()));
        }
        self.factories
            .insert(name.to_string(), construct::<T> as Factory);
        Ok(())
    }

    /// Builder form of [`ClassRegistry::register`].
    pub fn with<T: FromWire>(mut self, name: &str) -> Result<Self> {
        self.register::<T>(name)?;
        Ok(self)
    }

    /// Check if a class name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered class names, sorted.
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Rebuild the class registered as `name` from `raw`.
    ///
    /// Returns `None` for unknown names.
    pub fn revive(&self, name: &str, raw: &Data) -> Option<Result<Rc<dyn WireObject>>> {
        let factory = self.factories.get(name)?;
        Some(factory(raw).map_err(|err| WireError::Revival {
            class: name.to_string(),
            message: err.to_string(),
        }))
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.class_names())
            .finish()
    }
}

fn validate_class_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_CLASS_NAME_LEN {
        return Err(WireError::InvalidClassName(name.to_string()));
    }
    let valid = name.split('.').all(|segment| {
        let mut chars = segment.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => chars
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
            _ => false,
        }
    });
    if !valid {
        return Err(WireError::InvalidClassName(name.to_string()));
    }
    Ok(())
}
