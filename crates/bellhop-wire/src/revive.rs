use std::collections::BTreeMap;

use serde_json::Value;

use crate::class::{ClassRegistry, CLASSNAME_FIELD};
use crate::data::{Data, TypedValue};
use crate::error::{Result, WireError};

/// Convert parsed JSON into [`Data`], rebuilding registered classes.
///
/// Revival is post-order. Tagged objects whose class is unknown stay
/// plain objects; their children are still revived.
pub(crate) fn revive(value: Value, classes: &ClassRegistry, max_depth: usize) -> Result<Data> {
    revive_at(value, classes, 0, max_depth)
}

fn revive_at(value: Value, classes: &ClassRegistry, depth: usize, max_depth: usize) -> Result<Data> {
    if depth > max_depth {
        return Err(WireError::TooDeep { max: max_depth });
    }

    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| revive_at(item, classes, depth + 1, max_depth))
            .collect::<Result<Vec<_>>>()
            .map(Data::Array),
        Value::Object(map) => {
            let class = match map.get(CLASSNAME_FIELD) {
                Some(Value::String(class)) if classes.contains(class) => Some(class.clone()),
                Some(Value::String(class)) => {
                    tracing::trace!(class = %class, "unregistered class tag left as plain object");
                    None
                }
                _ => None,
            };
            // Children first, so the class sees revived values.
            let object = revive_object(map, classes, depth, max_depth)?;
            match class {
                Some(class) => classes
                    .revive(&class, &object)
                    .unwrap_or_else(|| {
                        Err(WireError::Revival {
                            class: class.clone(),
                            message: "class not registered".to_string(),
                        })
                    })
                    .map(|revived| Data::Typed(TypedValue::from_rc(revived))),
                None => Ok(object),
            }
        }
        other => Ok(Data::from_value(other)),
    }
}

fn revive_object(
    map: serde_json::Map<String, Value>,
    classes: &ClassRegistry,
    depth: usize,
    max_depth: usize,
) -> Result<Data> {
    map.into_iter()
        .map(|(key, value)| -> Result<(String, Data)> {
            Ok((key, revive_at(value, classes, depth + 1, max_depth)?))
        })
        .collect::<Result<BTreeMap<_, _>>>()
        .map(Data::Object)
}
