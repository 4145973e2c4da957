//! # Catalog
//!
//! Front end for configuration scripts: parse, normalize and compile a
//! script into a resource catalog for one node.
//!
//! ## Pipeline
//!
//! - **Parser**: text to [`Ast`], or a [`SyntaxError`] with location
//! - **Normalizer**: [`Ast`] to [`Program`], node definitions lifted out
//! - **Compiler**: [`Program`] plus [`EnvironmentContext`] to [`Catalog`]
//! - **Resolver**: replaces [`Value::Deferred`] entries using the [`FactSet`]
//!
//! ## Example
//!
//! ```ignore
//! use catalog::{compile_script, resolve_and_replace, EnvironmentContext, FactSet};
//!
//! let mut facts = FactSet::new();
//! facts.insert_path("os.family", "Debian");
//! let env = EnvironmentContext::new("web01", facts.clone());
//!
//! let mut catalog = compile_script("file { '/tmp/motd': ensure => file }", &env)?;
//! let resolution = resolve_and_replace(&mut catalog, &facts);
//! assert!(resolution.is_complete());
//! ```
//!
//! The compiler never reads process-wide state: the node name, facts and
//! module path all arrive through [`EnvironmentContext`].

pub mod ast;
pub mod catalog;
pub mod compiler;
pub mod deferred;
pub mod env;
pub mod error;
pub mod facts;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod program;
pub mod value;

pub use ast::{Ast, AstKind, Location, Locator, Span};
pub use catalog::{AbstractResource, Catalog, Edge, EdgeKind};
pub use compiler::compile;
pub use deferred::{DeferredFailure, Resolution, resolve_and_replace};
pub use env::EnvironmentContext;
pub use error::{CompilationError, Error, Result, SyntaxError};
pub use facts::FactSet;
pub use parser::{ParsedSource, parse_script};
pub use program::{Program, build_program};
pub use value::{Deferred, ResourceKey, Value};

/// Parse, normalize and compile a script in one step
pub fn compile_script(text: &str, env: &EnvironmentContext) -> Result<Catalog> {
    let parsed = parse_script(text)?;
    let program = build_program(parsed.ast, parsed.locator);
    Ok(compile(&program, env)?)
}
