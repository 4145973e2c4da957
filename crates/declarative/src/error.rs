//! Structural errors: conditions that stop a run before any resource is touched

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Mode flag other than `run` or `observe`
    #[error("invalid mode '{mode}': expected 'run' or 'observe'")]
    InvalidMode { mode: String },

    /// No provider is registered for a declared resource type
    #[error("no provider for resource type '{type_name}' (declared by {resource})")]
    UnknownResourceType { type_name: String, resource: String },

    /// A provider rejected a resource's parameters
    #[error("invalid parameters for {resource}: {message}")]
    InvalidParameter { resource: String, message: String },

    /// Ordering constraints form a cycle
    #[error("dependency cycle between {}", resources.join(", "))]
    DependencyCycle { resources: Vec<String> },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_resources() {
        let err = Error::DependencyCycle {
            resources: vec!["File[/a]".into(), "Exec[b]".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle between File[/a], Exec[b]");
    }

    #[test]
    fn test_invalid_parameter_names_resource() {
        let err = Error::InvalidParameter {
            resource: "File[/a]".into(),
            message: "unknown parameter 'bogus'".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid parameters for File[/a]: unknown parameter 'bogus'"
        );
    }
}
