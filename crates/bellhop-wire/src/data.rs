use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

use crate::class::{AsAny, WireObject, CLASSNAME_FIELD};

/// A payload value: plain JSON, possibly with revived domain objects inside.
#[derive(Clone, Debug, Default)]
pub enum Data {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Data>),
    Object(BTreeMap<String, Data>),
    Typed(TypedValue),
}

/// A revived domain object inside a [`Data`] tree.
#[derive(Clone)]
pub struct TypedValue(Rc<dyn WireObject>);

impl TypedValue {
    pub fn new<T: WireObject>(value: T) -> Self {
        Self(Rc::new(value))
    }

    pub fn from_rc(value: Rc<dyn WireObject>) -> Self {
        Self(value)
    }

    pub fn class_name(&self) -> &str {
        self.0.class_name()
    }

    /// Borrow the object as `T` if that is its concrete type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        <dyn WireObject as AsAny>::as_any(&*self.0).downcast_ref::<T>()
    }

    /// Tagged JSON form.
    pub fn to_value(&self) -> Value {
        let mut value = self.0.to_json();
        if let Value::Object(map) = &mut value {
            map.entry(CLASSNAME_FIELD.to_string())
                .or_insert_with(|| Value::String(self.0.class_name().to_string()));
        }
        value
    }
}

impl fmt::Debug for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
            || (self.class_name() == other.class_name() && self.0.to_json() == other.0.to_json())
    }
}

impl Data {
    /// Wrap a domain object.
    pub fn typed<T: WireObject>(value: T) -> Self {
        Data::Typed(TypedValue::new(value))
    }

    /// Convert plain JSON without reviving anything.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Data::Null,
            Value::Bool(b) => Data::Bool(b),
            Value::Number(n) => Data::Number(n),
            Value::String(s) => Data::String(s),
            Value::Array(items) => Data::Array(items.into_iter().map(Data::from_value).collect()),
            Value::Object(map) => Data::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Data::from_value(value)))
                    .collect(),
            ),
        }
    }

    /// JSON form, with typed values re-tagged.
    pub fn to_value(&self) -> Value {
        match self {
            Data::Null => Value::Null,
            Data::Bool(b) => Value::Bool(*b),
            Data::Number(n) => Value::Number(n.clone()),
            Data::String(s) => Value::String(s.clone()),
            Data::Array(items) => Value::Array(items.iter().map(Data::to_value).collect()),
            Data::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_value()))
                    .collect(),
            ),
            Data::Typed(typed) => typed.to_value(),
        }
    }

    /// Deserialize the JSON form into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.to_value())
    }

    /// Field of an object value.
    pub fn get(&self, key: &str) -> Option<&Data> {
        match self {
            Data::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Data::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Data::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Data::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Data::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// The revived object as `T`, if this value is one.
    pub fn as_typed<T: 'static>(&self) -> Option<&T> {
        match self {
            Data::Typed(typed) => typed.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Class name of a typed value.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Data::Typed(typed) => Some(typed.class_name()),
            _ => None,
        }
    }
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Data::Null, Data::Null) => true,
            (Data::Bool(a), Data::Bool(b)) => a == b,
            (Data::Number(a), Data::Number(b)) => a == b,
            (Data::String(a), Data::String(b)) => a == b,
            (Data::Array(a), Data::Array(b)) => a == b,
            (Data::Object(a), Data::Object(b)) => a == b,
            (Data::Typed(a), Data::Typed(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for Data {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Data::from_value(value)
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::String(value.to_string())
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::String(value)
    }
}

impl From<bool> for Data {
    fn from(value: bool) -> Self {
        Data::Bool(value)
    }
}

impl From<i64> for Data {
    fn from(value: i64) -> Self {
        Data::Number(value.into())
    }
}

impl From<f64> for Data {
    /// Non-finite numbers have no JSON form and become `null`.
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Data::Null, Data::Number)
    }
}

impl From<Vec<Data>> for Data {
    fn from(value: Vec<Data>) -> Self {
        Data::Array(value)
    }
}

impl From<TypedValue> for Data {
    fn from(value: TypedValue) -> Self {
        Data::Typed(value)
    }
}
