//! Providers turn catalog entries into concrete resources

use crate::resource::BoxedResource;
use anyhow::{Result, bail};
use catalog::Value;
use std::collections::BTreeMap;

/// Title and parameters of one catalog resource, as handed to a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    pub title: String,
    pub parameters: BTreeMap<String, Value>,
}

impl ResourceSpec {
    pub fn new(title: impl Into<String>, parameters: BTreeMap<String, Value>) -> Self {
        Self {
            title: title.into(),
            parameters,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Reject parameters the provider does not understand
    pub fn check_known(&self, known: &[&str]) -> Result<()> {
        let unknown: Vec<&str> = self
            .parameters
            .keys()
            .map(String::as_str)
            .filter(|name| !known.contains(name))
            .collect();
        if !unknown.is_empty() {
            bail!("unknown parameter(s): {}", unknown.join(", "));
        }
        Ok(())
    }

    /// String parameter; integers are accepted and converted
    pub fn string(&self, name: &str) -> Result<Option<String>> {
        match self.get(name) {
            None | Some(Value::Undef) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Integer(n)) => Ok(Some(n.to_string())),
            Some(other) => bail!("parameter '{name}' expects a String, got {}", other.type_name()),
        }
    }

    /// String parameter, falling back to the title
    pub fn string_or_title(&self, name: &str) -> Result<String> {
        Ok(self.string(name)?.unwrap_or_else(|| self.title.clone()))
    }

    pub fn boolean(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name) {
            None | Some(Value::Undef) => Ok(None),
            Some(Value::Boolean(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s == "true" => Ok(Some(true)),
            Some(Value::String(s)) if s == "false" => Ok(Some(false)),
            Some(other) => bail!("parameter '{name}' expects a Boolean, got {}", other.type_name()),
        }
    }

    /// A single value or an array of values, each converted with `string`
    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        let items = match self.get(name) {
            None | Some(Value::Undef) => return Ok(Vec::new()),
            Some(Value::Array(items)) => items.clone(),
            Some(single) => vec![single.clone()],
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                Value::Integer(n) => Ok(n.to_string()),
                other => bail!("parameter '{name}' expects Strings, got {}", other.type_name()),
            })
            .collect()
    }
}

/// Knows how to build resources of one type
pub trait Provider: Send + Sync {
    /// Catalog type name this provider handles (`file`, `exec`, ...)
    fn resource_type(&self) -> &'static str;

    /// Build a resource; invalid parameters are an error for this resource only
    fn instantiate(&self, spec: &ResourceSpec) -> Result<BoxedResource>;
}

/// Explicit mapping from resource type to provider
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any provider for the same type
    pub fn register(&mut self, provider: impl Provider + 'static) -> &mut Self {
        self.providers
            .insert(provider.resource_type().to_string(), Box::new(provider));
        self
    }

    pub fn get(&self, resource_type: &str) -> Option<&dyn Provider> {
        self.providers.get(resource_type).map(AsRef::as_ref)
    }

    pub fn contains(&self, resource_type: &str) -> bool {
        self.providers.contains_key(resource_type)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
