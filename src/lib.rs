//! # graphql-shape: Declarative Reshaping of GraphQL Responses
//!
//! graphql-shape lets a query describe how its own response should be
//! reshaped. Fields carry an `@shape` directive listing operations; compiling
//! the query removes the directives (so the server never sees them) and yields
//! a transform program that is replayed against the JSON response.
//!
//! ## Features
//!
//! - **Directive compiler**: turns `@shape(...)` into addressed rules, expands fragments and drops `@_shape` fields
//! - **Transform interpreter**: path navigation, per-element mapping, hoisting, renaming and value assignment
//! - **Function registry**: built-in helpers, core namespaces and native value members, extensible at runtime
//! - **CLI**: compile queries and apply programs from the command line
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//!
//! let compiled = graphql_shape::compile(r#"
//!     query {
//!         user {
//!             name @shape(map: "toUpperCase")
//!             address @shape(hoist: false) { city }
//!         }
//!     }
//! "#)
//! .unwrap();
//!
//! assert!(!compiled.query.contains("@shape"));
//!
//! let response = json!({"user": {"name": "ada", "address": {"city": "London"}}});
//! let reshaped = compiled.transform(response).unwrap();
//!
//! assert_eq!(reshaped, json!({"user": {"name": "ADA", "city": "London"}}));
//! ```

// Core modules
pub mod path;
pub mod program;
pub mod transform_registry;

// Function resolution: built-ins, namespaces and native members
pub mod functions;

// Interpreter, path queries and configuration
pub mod runtime;

// Directive compiler
pub mod compiler;

// Compile-and-apply facade
pub mod shape;

use std::sync::Arc;

use serde_json::Value;

// Re-export key types
pub use compiler::{CompileError, CompileOptions, Compilation};
pub use path::FieldPath;
pub use program::{FragmentTable, Operation, Program, Rule, Scope};
pub use runtime::{ShapeConfig, Transformer};
pub use shape::{Compiled, Shape, ShapeError};
pub use transform_registry::{default_registry, register, FunctionRegistry, TransformError, TransformFn};

/// Compile query text with the default directive and registry
pub fn compile(source: &str) -> Result<Compiled, ShapeError> {
    Shape::new().compile(source)
}

/// Apply `program` to `tree` using the default registry
///
/// Returns the reshaped tree, which is `tree` itself; a rule addressed at the
/// root may have replaced it wholesale.
pub fn apply<'t>(tree: &'t mut Value, program: &Program) -> Result<&'t mut Value, TransformError> {
    Transformer::new(Arc::new(default_registry())).apply(tree, program)
}
