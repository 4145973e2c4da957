//! Fact data about the node being configured

use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// Named fact values. Nested facts are hashes; [`FactSet::get`] accepts a
/// dotted path (`os.family`) and walks into them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FactSet {
    facts: BTreeMap<String, Value>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.facts.insert(name.into(), value.into());
    }

    /// Set a fact by dotted path, creating intermediate hashes as needed.
    /// A non-hash value in the way is replaced.
    pub fn insert_path(&mut self, path: &str, value: impl Into<Value>) {
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return;
        };
        let rest: Vec<&str> = segments.collect();
        let slot = self.facts.entry(first.to_string()).or_insert(Value::Undef);
        set_nested(slot, &rest, value.into());
    }

    /// Look up a fact; `a.b.c` descends through nested hashes
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.facts.get(path) {
            return Some(value);
        }
        let mut segments = path.split('.');
        let mut current = self.facts.get(segments.next()?)?;
        for segment in segments {
            match current {
                Value::Hash(entries) => current = entries.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Overlay another fact set; nested hashes merge key by key
    pub fn merge(&mut self, other: FactSet) {
        for (name, value) in other.facts {
            match self.facts.get_mut(&name) {
                Some(existing) => merge_value(existing, value),
                None => {
                    self.facts.insert(name, value);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.facts.iter()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// All facts as one hash value (the `$facts` variable)
    pub fn to_value(&self) -> Value {
        Value::Hash(self.facts.clone())
    }
}

impl From<BTreeMap<String, Value>> for FactSet {
    fn from(facts: BTreeMap<String, Value>) -> Self {
        Self { facts }
    }
}

impl FromIterator<(String, Value)> for FactSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            facts: iter.into_iter().collect(),
        }
    }
}

fn set_nested(slot: &mut Value, path: &[&str], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *slot = value;
        return;
    };
    if !matches!(slot, Value::Hash(_)) {
        *slot = Value::Hash(BTreeMap::new());
    }
    if let Value::Hash(entries) = slot {
        let child = entries.entry((*head).to_string()).or_insert(Value::Undef);
        set_nested(child, rest, value);
    }
}

fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Hash(current), Value::Hash(overlay)) => {
            for (key, value) in overlay {
                match current.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        current.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
