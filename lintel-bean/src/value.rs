// Dynamic value graph that expressions are evaluated against

use crate::types::GenericType;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A node of an object graph.
///
/// Beans, collections and maps carry the name of their runtime class so the
/// resolver can fall back to instance inspection when declared types run out.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Char(char),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Enum {
        class: String,
        constant: String,
    },
    Bean {
        class: String,
        properties: IndexMap<String, Value>,
    },
    /// Any collection (`ArrayList`, `HashSet`, ...).
    Collection {
        class: String,
        items: Vec<Value>,
    },
    Map {
        class: String,
        entries: IndexMap<Value, Value>,
    },
    Array {
        component: String,
        items: Vec<Value>,
    },
}

impl Value {
    /// An empty bean of the given class.
    pub fn bean(class: impl Into<String>) -> Self {
        Value::Bean {
            class: class.into(),
            properties: IndexMap::new(),
        }
    }

    /// Builder-style property assignment on a bean; no-op for other values.
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Value::Bean { properties, .. } = &mut self {
            properties.insert(property.into(), value.into());
        }
        self
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::Collection {
            class: "ArrayList".to_string(),
            items,
        }
    }

    pub fn map(class: impl Into<String>) -> Self {
        Value::Map {
            class: class.into(),
            entries: IndexMap::new(),
        }
    }

    pub fn enumeration(class: impl Into<String>, constant: impl Into<String>) -> Self {
        Value::Enum {
            class: class.into(),
            constant: constant.into(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime class name, `None` for null.
    pub fn class_name(&self) -> Option<String> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(_) => "Boolean".to_string(),
            Value::Char(_) => "Character".to_string(),
            Value::Integer(_) => "Integer".to_string(),
            Value::Long(_) => "Long".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Double(_) => "Double".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Enum { class, .. }
            | Value::Bean { class, .. }
            | Value::Collection { class, .. }
            | Value::Map { class, .. } => class.clone(),
            Value::Array { component, .. } => format!("{}[]", component),
        })
    }

    /// Runtime type in the same vocabulary as declared types.
    pub fn runtime_type(&self) -> Option<GenericType> {
        match self {
            Value::Null => None,
            Value::Array { component, .. } => {
                Some(GenericType::array_of(GenericType::class(component.clone())))
            }
            other => other.class_name().map(GenericType::Class),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(i64::from(*i)),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(f64::from(*i)),
            Value::Long(l) => Some(*l as f64),
            Value::Float(f) => Some(f64::from(*f)),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Named property of a bean.
    pub fn property(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Bean { properties, .. } => properties.get(name),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[Value]> {
        match self {
            Value::Collection { items, .. } | Value::Array { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&IndexMap<Value, Value>> {
        match self {
            Value::Map { entries, .. } => Some(entries),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Enum { class: c1, constant: k1 }, Enum { class: c2, constant: k2 }) => {
                c1 == c2 && k1 == k2
            }
            (
                Bean { class: c1, properties: p1 },
                Bean { class: c2, properties: p2 },
            ) => c1 == c2 && p1 == p2,
            (Collection { class: c1, items: i1 }, Collection { class: c2, items: i2 }) => {
                c1 == c2 && i1 == i2
            }
            (Map { class: c1, entries: e1 }, Map { class: c2, entries: e2 }) => {
                c1 == c2 && e1 == e2
            }
            (
                Array { component: c1, items: i1 },
                Array { component: c2, items: i2 },
            ) => c1 == c2 && i1 == i2,
            _ => false,
        }
    }
}

impl Eq for Value {}

// Beans and maps hash by class and size only: their equality ignores order.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Char(c) => c.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Long(l) => l.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Double(d) => d.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Enum { class, constant } => {
                class.hash(state);
                constant.hash(state);
            }
            Value::Bean { class, properties } => {
                class.hash(state);
                properties.len().hash(state);
            }
            Value::Collection { class, items } => {
                class.hash(state);
                items.hash(state);
            }
            Value::Map { class, entries } => {
                class.hash(state);
                entries.len().hash(state);
            }
            Value::Array { component, items } => {
                component.hash(state);
                items.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{}", c),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::Enum { constant, .. } => f.write_str(constant),
            Value::Bean { class, properties } => {
                write!(f, "{}{{", class)?;
                for (i, (name, value)) in properties.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", name, value)?;
                }
                f.write_str("}")
            }
            Value::Collection { items, .. } | Value::Array { items, .. } => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map { entries, .. } => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Char(c) => serializer.serialize_char(*c),
            Value::Integer(i) => serializer.serialize_i32(*i),
            Value::Long(l) => serializer.serialize_i64(*l),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Enum { constant, .. } => serializer.serialize_str(constant),
            Value::Bean { properties, .. } => {
                let mut map = serializer.serialize_map(Some(properties.len()))?;
                for (name, value) in properties {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            Value::Collection { items, .. } | Value::Array { items, .. } => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map { entries, .. } => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bean_builder_and_lookup() {
        let person = Value::bean("Person").with("name", "Ada").with("age", 36);
        assert_eq!(person.property("name"), Some(&Value::from("Ada")));
        assert_eq!(person.class_name().as_deref(), Some("Person"));
        assert_eq!(person.property("missing"), None);
    }

    #[test]
    fn test_map_keys_distinguish_types() {
        let mut entries = IndexMap::new();
        entries.insert(Value::Integer(1), Value::from("int"));
        entries.insert(Value::Long(1), Value::from("long"));
        entries.insert(Value::from("1"), Value::from("string"));
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[&Value::Long(1)], Value::from("long"));
    }

    #[test]
    fn test_array_runtime_type() {
        let array = Value::Array {
            component: "String".into(),
            items: vec![],
        };
        assert_eq!(array.class_name().as_deref(), Some("String[]"));
        assert_eq!(
            array.runtime_type(),
            Some(GenericType::array_of(GenericType::class("String")))
        );
    }

    #[test]
    fn test_serialize_to_json() {
        let mut colors = Value::map("HashMap");
        if let Value::Map { entries, .. } = &mut colors {
            entries.insert(Value::Integer(7), Value::from("seven"));
        }
        let bean = Value::bean("Palette")
            .with("colors", colors)
            .with("tags", Value::list(vec!["a".into(), Value::Null]))
            .with("kind", Value::enumeration("Kind", "WARM"));

        let json = serde_json::to_value(&bean).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "colors": {"7": "seven"},
                "tags": ["a", null],
                "kind": "WARM"
            })
        );
    }
}
