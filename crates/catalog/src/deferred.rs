//! Resolve deferred values in a compiled catalog

use crate::catalog::Catalog;
use crate::facts::FactSet;
use crate::functions;
use crate::value::{Deferred, ResourceKey, Value};
use log::{debug, warn};

/// A deferred value that could not be resolved
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredFailure {
    pub resource: ResourceKey,
    pub parameter: String,
    pub message: String,
}

/// Outcome of a resolution pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Number of deferred values replaced
    pub resolved: usize,
    pub failures: Vec<DeferredFailure>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Replace every deferred parameter value with its result.
///
/// Arrays and hashes are walked recursively and nested deferred arguments are
/// resolved first. A value that fails stays deferred; the failure is logged
/// and returned, and resolution carries on with the remaining values.
pub fn resolve_and_replace(catalog: &mut Catalog, facts: &FactSet) -> Resolution {
    let mut resolution = Resolution::default();

    for resource in catalog.resources_mut() {
        for (parameter, value) in resource.parameters.iter_mut() {
            let mut errors = Vec::new();
            resolution.resolved += replace(value, facts, &mut errors);
            for message in errors {
                warn!(
                    "Failed to resolve deferred value for {} parameter '{}': {}",
                    resource.key, parameter, message
                );
                resolution.failures.push(DeferredFailure {
                    resource: resource.key.clone(),
                    parameter: parameter.clone(),
                    message,
                });
            }
        }
    }

    debug!(
        "Resolved {} deferred value(s), {} failure(s)",
        resolution.resolved,
        resolution.failures.len()
    );
    resolution
}

fn replace(value: &mut Value, facts: &FactSet, errors: &mut Vec<String>) -> usize {
    match value {
        Value::Deferred(deferred) => match evaluate(deferred, facts) {
            Ok(result) => {
                *value = result;
                1
            }
            Err(message) => {
                errors.push(message);
                0
            }
        },
        Value::Array(items) => items.iter_mut().map(|item| replace(item, facts, errors)).sum(),
        Value::Hash(entries) => entries
            .values_mut()
            .map(|item| replace(item, facts, errors))
            .sum(),
        _ => 0,
    }
}

fn evaluate(deferred: &Deferred, facts: &FactSet) -> Result<Value, String> {
    let arguments = deferred
        .arguments
        .iter()
        .map(|argument| resolve_argument(argument, facts))
        .collect::<Result<Vec<_>, _>>()?;
    functions::call(&deferred.function, &arguments, facts)
        .map_err(|e| format!("Deferred('{}'): {e}", deferred.function))
}

fn resolve_argument(argument: &Value, facts: &FactSet) -> Result<Value, String> {
    match argument {
        Value::Deferred(inner) => evaluate(inner, facts),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_argument(item, facts))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Hash(entries) => entries
            .iter()
            .map(|(k, v)| resolve_argument(v, facts).map(|v| (k.clone(), v)))
            .collect::<Result<_, _>>()
            .map(Value::Hash),
        other => Ok(other.clone()),
    }
}
