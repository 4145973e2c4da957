//! Pure functions shared by compile-time evaluation and deferred resolution

use crate::facts::FactSet;
use crate::value::Value;

/// Functions that may be evaluated both at compile time and when a deferred
/// value is resolved
pub const PURE_FUNCTIONS: &[&str] = &["fact", "upcase", "downcase", "join"];

pub fn is_pure(name: &str) -> bool {
    PURE_FUNCTIONS.contains(&name)
}

/// Call a pure function. Errors are plain messages; callers attach location.
pub fn call(name: &str, arguments: &[Value], facts: &FactSet) -> Result<Value, String> {
    match name {
        "fact" => {
            let [Value::String(path)] = arguments else {
                return Err(signature(name, "a single String fact name", arguments));
            };
            facts
                .get(path)
                .cloned()
                .ok_or_else(|| format!("fact '{path}' is not available"))
        }
        "upcase" => map_strings(name, arguments, |s| s.to_uppercase()),
        "downcase" => map_strings(name, arguments, |s| s.to_lowercase()),
        "join" => {
            let (items, separator) = match arguments {
                [Value::Array(items)] => (items, ""),
                [Value::Array(items), Value::String(sep)] => (items, sep.as_str()),
                _ => {
                    return Err(signature(name, "an Array and an optional String separator", arguments));
                }
            };
            let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
            Ok(Value::String(parts.join(separator)))
        }
        other => Err(format!("unknown function '{other}'")),
    }
}

fn map_strings(name: &str, arguments: &[Value], f: fn(&str) -> String) -> Result<Value, String> {
    match arguments {
        [Value::String(s)] => Ok(Value::String(f(s))),
        [Value::Array(items)] => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(Value::String(f(s))),
                other => Err(format!(
                    "'{name}' expects Array[String], got an element of type {}",
                    other.type_name()
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => Err(signature(name, "a String or an Array of Strings", arguments)),
    }
}

fn signature(name: &str, expected: &str, arguments: &[Value]) -> String {
    let got: Vec<&str> = arguments.iter().map(Value::type_name).collect();
    format!("'{name}' expects {expected}, got ({})", got.join(", "))
}
