//! Name resolution for `Call` operations.
//!
//! A call name is offered to an ordered chain of [`Resolver`]s:
//!
//! 1. [`namespaces::CoreNamespace`] - well-known namespaces such as `Date` or `Math`,
//!    selected by a discriminator argument
//! 2. the [`FunctionRegistry`] - built-ins plus anything embedders registered
//! 3. [`native::NativeMembers`] - methods of the current value itself
//!
//! The first resolver that recognizes the name produces the result. A name no
//! tier recognizes leaves the value unchanged.

pub mod builtins;
pub mod namespaces;
pub mod native;
pub mod value;

use std::sync::Arc;

use serde_json::Value;

use crate::transform_registry::{FunctionRegistry, TransformError};

/// One tier of call resolution
pub trait Resolver: Send + Sync {
    /// Name of the tier, for logs
    fn tier(&self) -> &'static str;

    /// Try to evaluate `name` against `value`
    ///
    /// # Returns
    ///
    /// * `None` - this tier does not know the name
    /// * `Some(Ok(value))` - the call's result
    /// * `Some(Err(e))` - the name was recognized but the call failed
    fn resolve(&self, name: &str, value: &Value, args: &[Value]) -> Option<Result<Value, TransformError>>;
}

impl Resolver for Arc<FunctionRegistry> {
    fn tier(&self) -> &'static str {
        "registry"
    }

    fn resolve(&self, name: &str, value: &Value, args: &[Value]) -> Option<Result<Value, TransformError>> {
        if !self.has_function(name) {
            return None;
        }
        Some(self.call(name, value.clone(), strip_discriminator(args)))
    }
}

/// Drop a leading null argument
///
/// Directive authors write `fn: [null, ...]` to leave the discriminator slot
/// empty; only the core namespaces read that slot.
pub(crate) fn strip_discriminator(args: &[Value]) -> &[Value] {
    match args.split_first() {
        Some((Value::Null, rest)) => rest,
        _ => args,
    }
}

/// Ordered resolver chain used by the interpreter
pub struct Dispatcher {
    resolvers: Vec<Box<dyn Resolver>>,
    registry: Arc<FunctionRegistry>,
}

impl Dispatcher {
    /// Chain the core namespaces, `registry` and native members
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        let resolvers: Vec<Box<dyn Resolver>> = vec![
            Box::new(namespaces::CoreNamespace),
            Box::new(Arc::clone(&registry)),
            Box::new(native::NativeMembers),
        ];

        Self { resolvers, registry }
    }

    /// Evaluate a call; unknown names return `value` unchanged
    pub fn dispatch(&self, name: &str, value: Value, args: &[Value]) -> Result<Value, TransformError> {
        for resolver in &self.resolvers {
            if let Some(result) = resolver.resolve(name, &value, args) {
                tracing::trace!(name, tier = resolver.tier(), "Resolved call");
                return result;
            }
        }

        tracing::debug!(name, "No resolver knows this name, passing value through");
        Ok(value)
    }

    /// Whether `name` must run even when the current value is null
    pub fn is_null_safe(&self, name: &str) -> bool {
        self.registry.is_null_safe(name)
    }
}
