//! Compile-and-apply facade.
//!
//! [`Shape`] bundles the compiler options with the function registry calls are
//! resolved against. Compiling a query through it yields a [`Compiled`] value
//! that carries the cleaned query, the program and a ready transformer.

use std::fmt;
use std::sync::Arc;

use graphql_parser::query::Document;
use serde_json::Value;

use crate::compiler::{self, CompileError, CompileOptions, Compilation};
use crate::program::{FragmentTable, Program};
use crate::runtime::Transformer;
use crate::transform_registry::{default_registry, FunctionRegistry, TransformError};

/// Error type for the facade and the command-line tool
#[derive(Debug)]
pub enum ShapeError {
    Compile(CompileError),
    Transform(TransformError),
    Config(String),
    Io(std::io::Error),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::Compile(e) => write!(f, "Compile error: {}", e),
            ShapeError::Transform(e) => write!(f, "Transform error: {}", e),
            ShapeError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ShapeError::Io(e) => write!(f, "IO error: {}", e),
            ShapeError::Json(e) => write!(f, "JSON error: {}", e),
            ShapeError::Yaml(e) => write!(f, "YAML error: {}", e),
        }
    }
}

impl std::error::Error for ShapeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShapeError::Compile(e) => Some(e),
            ShapeError::Transform(e) => Some(e),
            ShapeError::Config(_) => None,
            ShapeError::Io(e) => Some(e),
            ShapeError::Json(e) => Some(e),
            ShapeError::Yaml(e) => Some(e),
        }
    }
}

impl From<CompileError> for ShapeError {
    fn from(e: CompileError) -> Self {
        ShapeError::Compile(e)
    }
}

impl From<TransformError> for ShapeError {
    fn from(e: TransformError) -> Self {
        ShapeError::Transform(e)
    }
}

impl From<std::io::Error> for ShapeError {
    fn from(e: std::io::Error) -> Self {
        ShapeError::Io(e)
    }
}

impl From<serde_json::Error> for ShapeError {
    fn from(e: serde_json::Error) -> Self {
        ShapeError::Json(e)
    }
}

impl From<serde_yaml::Error> for ShapeError {
    fn from(e: serde_yaml::Error) -> Self {
        ShapeError::Yaml(e)
    }
}

/// Compiler options plus the registry used by compiled programs
///
/// # Example
///
/// ```
/// use graphql_shape::{FunctionRegistry, Shape};
/// use serde_json::{json, Value};
///
/// let mut registry = FunctionRegistry::with_builtins();
/// registry.register("shout", |value: Value, _args: &[Value]| {
///     Ok(json!(format!("{}!", value.as_str().unwrap_or_default())))
/// });
///
/// let shape = Shape::new().with_registry(registry);
/// let compiled = shape.compile(r#"{ greeting @shape(shout: null) }"#).unwrap();
///
/// let result = compiled.transform(json!({"greeting": "hi"})).unwrap();
/// assert_eq!(result, json!({"greeting": "hi!"}));
/// ```
#[derive(Debug, Clone)]
pub struct Shape {
    options: CompileOptions,
    registry: Arc<FunctionRegistry>,
}

impl Shape {
    /// Default options and a snapshot of the process-wide registry
    pub fn new() -> Self {
        Self::with_options(CompileOptions::default())
    }

    /// Custom options and a snapshot of the process-wide registry
    pub fn with_options(options: CompileOptions) -> Self {
        Self {
            options,
            registry: Arc::new(default_registry()),
        }
    }

    /// Resolve calls through `registry` instead of the process-wide one
    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Transform directive name
    pub fn directive(&self) -> &str {
        &self.options.directive
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Interpreter bound to this shape's registry
    pub fn transformer(&self) -> Transformer {
        Transformer::new(Arc::clone(&self.registry))
    }

    /// Compile query text
    pub fn compile(&self, source: &str) -> Result<Compiled, ShapeError> {
        let compilation = compiler::compile(source, &self.options)?;
        Ok(self.bind(compilation))
    }

    /// Compile an already parsed document
    pub fn compile_document(&self, document: Document<'_, String>) -> Result<Compiled, ShapeError> {
        let compilation = compiler::compile_document(document, &self.options)?;
        Ok(self.bind(compilation))
    }

    fn bind(&self, compilation: Compilation) -> Compiled {
        Compiled {
            query: compilation.query,
            program: compilation.program,
            fragments: compilation.fragments,
            transformer: self.transformer(),
        }
    }
}

impl Default for Shape {
    fn default() -> Self {
        Self::new()
    }
}

/// A compiled query, ready to reshape responses
pub struct Compiled {
    /// Query text to send, free of transform directives
    pub query: String,
    /// Rules in execution order
    pub program: Program,
    /// Expanded fragment rules, relative to each fragment
    pub fragments: FragmentTable,
    transformer: Transformer,
}

impl Compiled {
    /// Reshape `tree` in place; see [`Transformer::apply`]
    pub fn apply<'t>(&self, tree: &'t mut Value) -> Result<&'t mut Value, TransformError> {
        self.transformer.apply(tree, &self.program)
    }

    /// Reshape an owned response
    pub fn transform(&self, tree: Value) -> Result<Value, TransformError> {
        self.transformer.transform(tree, &self.program)
    }

    /// Drop the transformer, keeping the serializable parts
    pub fn into_parts(self) -> (String, Program, FragmentTable) {
        (self.query, self.program, self.fragments)
    }
}

impl fmt::Debug for Compiled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiled")
            .field("query", &self.query)
            .field("program", &self.program)
            .field("fragments", &self.fragments)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_injected_registries_are_independent() {
        let mut loud = FunctionRegistry::with_builtins();
        loud.register("tone", |value: Value, _args: &[Value]| {
            Ok(json!(value.as_str().unwrap_or_default().to_uppercase()))
        });
        let mut quiet = FunctionRegistry::with_builtins();
        quiet.register("tone", |value: Value, _args: &[Value]| {
            Ok(json!(value.as_str().unwrap_or_default().to_lowercase()))
        });

        let query = r#"{ word @shape(tone: null) }"#;
        let loud = Shape::new().with_registry(loud).compile(query).unwrap();
        let quiet = Shape::new().with_registry(quiet).compile(query).unwrap();

        assert_eq!(loud.transform(json!({"word": "MiXeD"})).unwrap(), json!({"word": "MIXED"}));
        assert_eq!(quiet.transform(json!({"word": "MiXeD"})).unwrap(), json!({"word": "mixed"}));
    }

    #[test]
    fn test_apply_returns_replaced_tree() {
        let compiled = Shape::new().compile(r#"query @shape(path: "$.data") { data }"#).unwrap();

        let mut tree = json!({"data": [1, 2]});
        let result = compiled.apply(&mut tree).unwrap().clone();

        assert_eq!(result, json!([1, 2]));
        assert_eq!(tree, json!([1, 2]));
    }

    #[test]
    fn test_custom_directive() {
        let shape = Shape::with_options(CompileOptions::new("view"));
        assert_eq!(shape.directive(), "view");

        let compiled = shape.compile(r#"{ a @view(rename: "b") }"#).unwrap();
        assert_eq!(compiled.transform(json!({"a": 1})).unwrap(), json!({"b": 1}));
    }

    #[test]
    fn test_errors_convert() {
        let err = Shape::new().compile("{ a { ...nope } }").unwrap_err();

        assert!(matches!(err, ShapeError::Compile(CompileError::UnknownFragment { .. })));
        assert!(err.to_string().starts_with("Compile error"));
    }

    #[test]
    fn test_into_parts() {
        let compiled = Shape::new().compile(r#"{ a @shape(hoist: true) }"#).unwrap();
        let (query, program, fragments) = compiled.into_parts();

        assert!(!query.contains("@shape"));
        assert_eq!(program.len(), 1);
        assert!(fragments.is_empty());
    }
}
