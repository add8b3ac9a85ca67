//! The dynamic value model.
//!
//! Maps and lists are shared containers compared by identity, like objects
//! in a garbage-collected host. Everything else is compared by value.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use super::{Observer, ReactiveList, ReactiveMap};

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Map(ReactiveMap),
    List(ReactiveList),
    /// A special-purpose object. Never wrapped, never traversed.
    Opaque(Rc<dyn Any>),
}

impl Value {
    /// Change detection: equality for primitives, identity for containers,
    /// and NaN is the same as NaN.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// True for values whose contents can change without their identity
    /// changing.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Map(_) | Value::List(_) | Value::Opaque(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ReactiveMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ReactiveList> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn opaque<T: Any>(value: T) -> Self {
        Value::Opaque(Rc::new(value))
    }

    /// The observer attached to a wrapped container.
    pub fn observer(&self) -> Option<Rc<Observer>> {
        match self {
            Value::Map(map) => map.observer(),
            Value::List(list) => list.observer(),
            _ => None,
        }
    }

    /// One step of a path lookup: a map field (tracked), a list index or
    /// `length`. Anything else yields `Null`.
    pub fn get_key(&self, key: &str) -> Value {
        match self {
            Value::Map(map) => map.get(key).unwrap_or_default(),
            Value::List(list) if key == "length" => Value::from(list.len()),
            Value::List(list) => key
                .parse::<usize>()
                .ok()
                .and_then(|index| list.get(index))
                .unwrap_or_default(),
            _ => Value::Null,
        }
    }

    /// Build plain, not yet reactive containers from JSON.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s.as_str()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Map(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Snapshot as JSON without tracking. Opaque values and repeated
    /// visits of a container on the current path become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_guarded(&mut HashSet::new())
    }

    fn to_json_guarded(&self, path: &mut HashSet<*const ()>) -> serde_json::Value {
        match self {
            Value::Null | Value::Opaque(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serde_json::Value::from(*n as i64)
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Map(map) => {
                if !path.insert(map.as_ptr()) {
                    return serde_json::Value::Null;
                }
                let fields = map
                    .entries_untracked()
                    .into_iter()
                    .map(|(key, value)| (key, value.to_json_guarded(path)))
                    .collect();
                path.remove(&map.as_ptr());
                serde_json::Value::Object(fields)
            }
            Value::List(list) => {
                if !path.insert(list.as_ptr()) {
                    return serde_json::Value::Null;
                }
                let items = list.to_vec().iter().map(|v| v.to_json_guarded(path)).collect();
                path.remove(&list.as_ptr());
                serde_json::Value::Array(items)
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Map(_) => write!(f, "Map({})", self.to_json()),
            Value::List(_) => write!(f, "List({})", self.to_json()),
            Value::Opaque(_) => write!(f, "Opaque"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(&json))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<ReactiveMap> for Value {
    fn from(map: ReactiveMap) -> Self {
        Value::Map(map)
    }
}

impl From<ReactiveList> for Value {
    fn from(list: ReactiveList) -> Self {
        Value::List(list)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}
