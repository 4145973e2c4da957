//! Runtime values produced by catalog evaluation
//!
//! A value is either concrete or [`Value::Deferred`]: a function call whose
//! result is postponed until fact data is available. The deferred resolver
//! replaces deferred values in place once the catalog is compiled.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a catalog resource: lowercase type plus title
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub type_name: String,
    pub title: String,
}

impl ResourceKey {
    pub fn new(type_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into().to_lowercase(),
            title: title.into(),
        }
    }

    /// Whether this key names a container (`class` or `node`) rather than a
    /// resource that a provider manages
    pub fn is_container(&self) -> bool {
        matches!(self.type_name.as_str(), "class" | "node")
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_name = self
            .type_name
            .split("::")
            .map(capitalize)
            .collect::<Vec<_>>()
            .join("::");
        write!(f, "{}[{}]", type_name, self.title)
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A postponed function call
#[derive(Debug, Clone, PartialEq)]
pub struct Deferred {
    pub function: String,
    pub arguments: Vec<Value>,
}

impl Serialize for Deferred {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("__ptype", "Deferred")?;
        map.serialize_entry("name", &self.function)?;
        map.serialize_entry("arguments", &self.arguments)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Undef,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Regex(String),
    Array(Vec<Value>),
    Hash(BTreeMap<String, Value>),
    Reference(ResourceKey),
    Deferred(Deferred),
}

impl Value {
    /// `undef` and `false` are false; everything else is true
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Undef | Value::Boolean(false))
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Value::Undef)
    }

    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undef => "Undef",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Regex(_) => "Regexp",
            Value::Array(_) => "Array",
            Value::Hash(_) => "Hash",
            Value::Reference(_) => "Resource reference",
            Value::Deferred(_) => "Deferred",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether a deferred value remains anywhere inside this value
    pub fn contains_deferred(&self) -> bool {
        match self {
            Value::Deferred(_) => true,
            Value::Array(items) => items.iter().any(Value::contains_deferred),
            Value::Hash(entries) => entries.values().any(Value::contains_deferred),
            _ => false,
        }
    }

    /// Loose equality: strings compare case-insensitively, numbers by value
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.to_lowercase() == b.to_lowercase(),
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            (Value::Hash(a), Value::Hash(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.loosely_equals(vb))
            }
            _ => self == other,
        }
    }

    /// Convert a JSON document (facts files, external data) into a value
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Undef,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Hash(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn write_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "'{s}'"),
            other => write!(f, "{other}"),
        }
    }
}

/// String conversion used by interpolation: strings render bare at the top
/// level and quoted inside collections.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undef => Ok(()),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Regex(r) => write!(f, "/{r}/"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_nested(f)?;
                }
                f.write_str("]")
            }
            Value::Hash(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{key}' => ")?;
                    value.write_nested(f)?;
                }
                f.write_str("}")
            }
            Value::Reference(key) => write!(f, "{key}"),
            Value::Deferred(d) => write!(f, "Deferred('{}')", d.function),
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

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_key_display_capitalizes_segments() {
        assert_eq!(ResourceKey::new("File", "/tmp/x").to_string(), "File[/tmp/x]");
        assert_eq!(
            ResourceKey::new("apt::source", "main").to_string(),
            "Apt::Source[main]"
        );
        assert_eq!(ResourceKey::new("file", "a").type_name, "file");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undef.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
        assert!(Value::Integer(0).is_truthy());
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::from("Linux").loosely_equals(&Value::from("linux")));
        assert!(Value::Integer(2).loosely_equals(&Value::Float(2.0)));
        assert!(!Value::from("1").loosely_equals(&Value::Integer(1)));
    }

    #[test]
    fn test_contains_deferred_nested() {
        let deferred = Value::Deferred(Deferred {
            function: "fact".into(),
            arguments: vec![Value::from("os.family")],
        });
        let nested = Value::Array(vec![Value::from("a"), Value::Hash(BTreeMap::from([("k".to_string(), deferred)]))]);
        assert!(nested.contains_deferred());
        assert!(!Value::from("plain").contains_deferred());
    }

    #[test]
    fn test_display_for_interpolation() {
        let value = Value::Array(vec![Value::from("a"), Value::Integer(1), Value::Undef]);
        assert_eq!(value.to_string(), "['a', 1, ]");
        assert_eq!(Value::Undef.to_string(), "");
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"os": {"family": "Debian"}, "cpus": 4, "load": 0.5});
        let Value::Hash(entries) = Value::from_json(json) else {
            panic!("expected hash");
        };
        assert_eq!(entries["cpus"], Value::Integer(4));
        assert_eq!(entries["load"], Value::Float(0.5));
    }

    #[test]
    fn test_deferred_serializes_as_rich_data() {
        let value = Value::Deferred(Deferred {
            function: "fact".into(),
            arguments: vec![Value::from("hostname")],
        });
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["__ptype"], "Deferred");
        assert_eq!(json["name"], "fact");
    }
}
