//! Error types for script parsing and catalog compilation.
//!
//! Both kinds are structural: a script that fails to parse or compile cannot
//! produce a catalog, so nothing downstream may run.

use crate::ast::Location;
use thiserror::Error;

/// Invalid script syntax
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at {location}: {message}")]
pub struct SyntaxError {
    /// What the parser expected or rejected
    pub message: String,
    /// Where the problem starts
    pub location: Location,
}

/// Failure while evaluating a program into a catalog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    /// A variable-free reference that does not resolve (class, resource, function)
    #[error("unresolved reference at {location}: {message}")]
    UnresolvedReference {
        message: String,
        location: Location,
    },

    /// Operand of the wrong kind
    #[error("type error at {location}: {message}")]
    Type { message: String, location: Location },

    /// Bad or missing resource/class parameter
    #[error("invalid parameter '{parameter}' for {resource} at {location}: {message}")]
    InvalidParameter {
        resource: String,
        parameter: String,
        message: String,
        location: Location,
    },

    /// Same (type, title) declared twice
    #[error("duplicate declaration: {resource} is already declared at {first}; cannot redeclare at {second}")]
    DuplicateResource {
        resource: String,
        first: Location,
        second: Location,
    },

    /// A containment edge would close a cycle
    #[error("cyclic containment at {location}: {container} cannot contain {class}")]
    CyclicContainment {
        container: String,
        class: String,
        location: Location,
    },

    /// Variable assigned twice in one scope
    #[error("cannot reassign variable '${name}' at {location}")]
    Reassignment { name: String, location: Location },

    /// Node definitions exist but none matches this node
    #[error("could not find node statement with name '{node}' or 'default'")]
    NodeNotFound { node: String },

    /// `fail()` called from the script
    #[error("evaluation failed at {location}: {message}")]
    Failed { message: String, location: Location },

    /// A module manifest could not be read or parsed
    #[error("could not load {path}: {message}")]
    ModuleLoad { path: String, message: String },
}

/// Errors produced by the catalog front end
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Compile(#[from] CompilationError),
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;
