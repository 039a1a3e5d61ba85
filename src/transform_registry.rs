//! Function registry: the user-defined tier of operation dispatch.
//!
//! Embedders register named functions here before compiling or applying a
//! program. Every default registry starts with the built-in catalog
//! (comparison, arithmetic, collection and case helpers).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde_json::Value;

/// Error type for transform operations
#[derive(Debug, Clone)]
pub enum TransformError {
    NotFound(String),
    InvalidArgs(String),
    ExecutionError(String),
    /// A path expression could not be evaluated
    PathQuery {
        expression: String,
        value: Value,
        reason: String,
    },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::NotFound(name) => write!(f, "Function not found: {}", name),
            TransformError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            TransformError::ExecutionError(msg) => write!(f, "Execution error: {}", msg),
            TransformError::PathQuery { expression, value, reason } => write!(
                f,
                "Path expression '{}' failed against {}: {}",
                expression, value, reason
            ),
        }
    }
}

impl std::error::Error for TransformError {}

/// Trait for registered functions
///
/// A function receives the current value followed by the resolved call
/// arguments and returns the replacement value.
pub trait TransformFn: Send + Sync {
    /// Execute the function
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - the new current value
    /// * `Err(TransformError)` - execution failed
    fn execute(&self, value: Value, args: &[Value]) -> Result<Value, TransformError>;
}

/// Simple function-based implementation of TransformFn
impl<F> TransformFn for F
where
    F: Fn(Value, &[Value]) -> Result<Value, TransformError> + Send + Sync,
{
    fn execute(&self, value: Value, args: &[Value]) -> Result<Value, TransformError> {
        self(value, args)
    }
}

#[derive(Clone)]
struct Registered {
    func: Arc<dyn TransformFn>,
    null_safe: bool,
}

/// Registry for storing and calling named functions
///
/// Cloning is cheap: entries are shared, so a clone is a snapshot that can be
/// extended independently.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Registered>,
}

impl FunctionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in catalog
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::functions::builtins::install(&mut registry);
        registry
    }

    /// Register a function, replacing any previous entry of the same name
    ///
    /// # Example
    ///
    /// ```
    /// use graphql_shape::{FunctionRegistry, TransformError};
    /// use serde_json::{json, Value};
    ///
    /// let mut registry = FunctionRegistry::new();
    /// registry.register("double", |value: Value, _args: &[Value]| {
    ///     let n = value
    ///         .as_i64()
    ///         .ok_or_else(|| TransformError::InvalidArgs("expected an integer".to_string()))?;
    ///     Ok(json!(n * 2))
    /// });
    ///
    /// assert_eq!(registry.call("double", json!(21), &[]).unwrap(), json!(42));
    /// ```
    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(Value, &[Value]) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        self.insert(name.into(), Arc::new(func), false);
    }

    /// Register a function that also runs when the current value is null
    ///
    /// Other functions are skipped for null values and the null passes through.
    pub fn register_null_safe<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(Value, &[Value]) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        self.insert(name.into(), Arc::new(func), true);
    }

    fn insert(&mut self, name: String, func: Arc<dyn TransformFn>, null_safe: bool) {
        tracing::trace!(name = %name, null_safe, "Registering function");
        self.functions.insert(name, Registered { func, null_safe });
    }

    /// Call a registered function
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the registered function
    /// * `value` - Current value
    /// * `args` - Resolved call arguments
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - the function's result
    /// * `Err(TransformError::NotFound)` - no function of that name
    pub fn call(&self, name: &str, value: Value, args: &[Value]) -> Result<Value, TransformError> {
        let registered = self
            .functions
            .get(name)
            .ok_or_else(|| TransformError::NotFound(name.to_string()))?;

        registered.func.execute(value, args)
    }

    /// Check if a function is registered
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Check if a registered function runs on null values
    pub fn is_null_safe(&self, name: &str) -> bool {
        self.functions.get(name).map_or(false, |r| r.null_safe)
    }

    /// Get list of all registered function names, sorted
    pub fn list_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered functions
    pub fn count(&self) -> usize {
        self.functions.len()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.list_functions())
            .finish()
    }
}

static DEFAULT_REGISTRY: Lazy<RwLock<FunctionRegistry>> =
    Lazy::new(|| RwLock::new(FunctionRegistry::with_builtins()));

/// Register a function in the process-wide default registry
///
/// Compilations and applications started afterwards see the new name; ones
/// already holding a snapshot do not.
pub fn register<F>(name: impl Into<String>, func: F)
where
    F: Fn(Value, &[Value]) -> Result<Value, TransformError> + Send + Sync + 'static,
{
    DEFAULT_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(name, func);
}

/// Snapshot of the process-wide default registry
pub fn default_registry() -> FunctionRegistry {
    DEFAULT_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
