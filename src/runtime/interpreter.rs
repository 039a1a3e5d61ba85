//! Transform interpreter: replays a compiled program against a response.
//!
//! Rules run in program order. For every location a rule's address matches,
//! the rule's operations run left to right over that location's value while a
//! [`Trace`] records each intermediate result. Structural operations (`hoist`,
//! `rename`) only queue mutations of the parent; they are applied once the
//! chain for that location has finished.

use std::sync::Arc;

use serde_json::Value;

use super::jsonpath;
use super::trace::Trace;
use crate::functions::Dispatcher;
use crate::path::{self, Deferred, MatchContext};
use crate::program::{Operation, Program, Rule, Scope};
use crate::transform_registry::{FunctionRegistry, TransformError};

/// Executes programs using one function registry
pub struct Transformer {
    dispatcher: Dispatcher,
}

impl Transformer {
    /// Create a transformer resolving calls through `registry`
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry),
        }
    }

    /// Apply every rule of `program` to `tree`, in order
    ///
    /// The tree is rewritten in place and returned, since a rule at the empty
    /// address may replace it entirely.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use graphql_shape::program::{Operation, Program, Rule};
    /// use graphql_shape::runtime::Transformer;
    /// use graphql_shape::FunctionRegistry;
    /// use serde_json::json;
    ///
    /// let transformer = Transformer::new(Arc::new(FunctionRegistry::with_builtins()));
    /// let program = Program::new(vec![Rule::new(
    ///     "obj",
    ///     vec![Operation::Rename { key: "data".to_string() }],
    /// )]);
    ///
    /// let mut tree = json!({"obj": {"a": "a"}});
    /// transformer.apply(&mut tree, &program).unwrap();
    /// assert_eq!(tree, json!({"data": {"a": "a"}}));
    /// ```
    pub fn apply<'t>(&self, tree: &'t mut Value, program: &Program) -> Result<&'t mut Value, TransformError> {
        for rule in program {
            self.apply_rule(tree, rule)?;
        }
        Ok(tree)
    }

    /// Owned variant of [`Transformer::apply`]
    pub fn transform(&self, mut tree: Value, program: &Program) -> Result<Value, TransformError> {
        self.apply(&mut tree, program)?;
        Ok(tree)
    }

    /// Apply one rule at every location its address matches
    ///
    /// # Returns
    ///
    /// Number of locations rewritten
    pub fn apply_rule(&self, tree: &mut Value, rule: &Rule) -> Result<usize, TransformError> {
        let address = rule.field_path();

        let matches = path::write(tree, &address, |value, context, deferred| {
            self.execute(&rule.operations, value, context, Some(deferred))
        })?;

        tracing::debug!(address = %address, matches, operations = rule.operations.len(), "Applied rule");
        Ok(matches)
    }

    /// Run an operation chain over one value with a fresh trace
    ///
    /// `deferred` is `None` inside `each`, where elements have no parent key
    /// to restructure.
    fn execute(
        &self,
        operations: &[Operation],
        value: Value,
        context: &MatchContext<'_>,
        mut deferred: Option<&mut Deferred>,
    ) -> Result<Value, TransformError> {
        let mut trace = Trace::new(value.clone());
        let mut current = value;

        for operation in operations {
            current = if current.is_null() && !self.runs_on_null(operation) {
                tracing::trace!(op = operation.label(), "Null value, skipping operation");
                current
            } else {
                self.step(operation, current, &trace, context, deferred.as_deref_mut())?
            };
            trace.record(current.clone());
        }

        Ok(current)
    }

    fn runs_on_null(&self, operation: &Operation) -> bool {
        match operation {
            Operation::Navigate { scope, .. } => *scope != Scope::Current,
            Operation::Assign { .. } => true,
            Operation::Call { name, .. } => self.dispatcher.is_null_safe(name),
            Operation::MapEach { .. } | Operation::Hoist { .. } | Operation::Rename { .. } => false,
        }
    }

    fn step(
        &self,
        operation: &Operation,
        value: Value,
        trace: &Trace,
        context: &MatchContext<'_>,
        deferred: Option<&mut Deferred>,
    ) -> Result<Value, TransformError> {
        tracing::trace!(op = operation.label(), location = %context.location(), "Executing operation");

        match operation {
            Operation::Navigate { scope: Scope::Current, path } => navigate(path, &value).map(|v| v.unwrap_or(value)),
            // The whole response has no parent; it passes through like a scalar
            Operation::Navigate { scope: Scope::Parent, path } => match context.parent() {
                Some(parent) => navigate(path, parent).map(|v| v.unwrap_or_else(|| parent.clone())),
                None => Ok(value),
            },
            Operation::Navigate { scope: Scope::Root, path } => {
                let root = context.root();
                navigate(path, root).map(|v| v.unwrap_or_else(|| root.clone()))
            }

            Operation::MapEach { operations } => match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| self.execute(operations, item, context, None))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                other => self.execute(operations, other, context, None),
            },

            Operation::Hoist { keep } => {
                let Some(deferred) = deferred else {
                    tracing::warn!(location = %context.location(), "hoist has no effect inside each");
                    return Ok(value);
                };
                match &value {
                    Value::Object(fields) => {
                        let fields = fields.clone();
                        let keep = *keep;
                        deferred.push(move |parent, key| {
                            if !keep {
                                parent.shift_remove(key);
                            }
                            for (name, field) in fields {
                                parent.insert(name, field);
                            }
                        });
                    }
                    _ => {
                        tracing::debug!(location = %context.location(), "Only objects can be hoisted");
                    }
                }
                Ok(value)
            }

            Operation::Rename { key } => {
                let Some(deferred) = deferred else {
                    tracing::warn!(location = %context.location(), "rename has no effect inside each");
                    return Ok(value);
                };
                let target = key.clone();
                deferred.push(move |parent, original| {
                    if let Some(moved) = parent.shift_remove(original) {
                        parent.insert(target, moved);
                    }
                });
                Ok(value)
            }

            Operation::Assign { args } => {
                let mut resolved: Vec<Value> = args.iter().map(|arg| trace.interpolate(arg)).collect();
                Ok(match resolved.len() {
                    0 => Value::Null,
                    1 => resolved.remove(0),
                    _ => Value::Array(resolved),
                })
            }

            Operation::Call { name, args } => {
                let resolved: Vec<Value> = args.iter().map(|arg| trace.resolve(arg)).collect();
                self.dispatcher.dispatch(name, value, &resolved)
            }
        }
    }
}

/// Evaluate `path` against a structured target; `None` for scalars, which pass through
fn navigate(path: &str, target: &Value) -> Result<Option<Value>, TransformError> {
    if target.is_object() || target.is_array() {
        jsonpath::evaluate(path, target).map(Some)
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transformer() -> Transformer {
        Transformer::new(Arc::new(FunctionRegistry::with_builtins()))
    }

    fn run(tree: Value, rules: Vec<Rule>) -> Value {
        transformer().transform(tree, &Program::new(rules)).unwrap()
    }

    fn call(name: &str, args: Vec<Value>) -> Operation {
        Operation::Call { name: name.to_string(), args }
    }

    fn navigate_self(path: &str) -> Operation {
        Operation::Navigate { scope: Scope::Current, path: path.to_string() }
    }

    #[test]
    fn test_empty_program_is_noop() {
        let tree = json!({"a": [1, 2, {"b": null}]});
        assert_eq!(run(tree.clone(), vec![]), tree);
    }

    #[test]
    fn test_navigate_self_on_scalar_passes_through() {
        let tree = json!({"name": "ada"});
        let result = run(tree.clone(), vec![Rule::new("name", vec![navigate_self("$.x")])]);
        assert_eq!(result, tree);
    }

    #[test]
    fn test_navigate_parent_and_root() {
        let tree = json!({"id": 1, "meta": {"label": "m"}, "nested": {"value": 2}});

        let result = run(
            tree,
            vec![
                Rule::new("id", vec![Operation::Navigate { scope: Scope::Parent, path: "$.meta.label".to_string() }]),
                Rule::new(
                    "nested.value",
                    vec![Operation::Navigate { scope: Scope::Root, path: "$.meta".to_string() }],
                ),
            ],
        );

        assert_eq!(result["id"], json!("m"));
        assert_eq!(result["nested"]["value"], json!({"label": "m"}));
    }

    #[test]
    fn test_navigate_parent_at_root_passes_through() {
        let tree = json!({"data": {"items": [1, 2]}});
        let result = run(
            tree.clone(),
            vec![Rule::new("", vec![Operation::Navigate { scope: Scope::Parent, path: "$.data".to_string() }])],
        );
        assert_eq!(result, tree);
    }

    #[test]
    fn test_root_rule_replaces_tree() {
        let tree = json!({"data": {"items": [1, 2]}});
        let result = run(tree, vec![Rule::new("", vec![navigate_self("$.data.items")])]);
        assert_eq!(result, json!([1, 2]));
    }

    #[test]
    fn test_map_each_with_fresh_trace() {
        let tree = json!({"tags": ["a", "b"]});
        let result = run(
            tree,
            vec![Rule::new(
                "tags",
                vec![Operation::MapEach {
                    operations: vec![call("toUpperCase", vec![]), call("concat", vec![json!("$0")])],
                }],
            )],
        );
        assert_eq!(result, json!({"tags": ["Aa", "Bb"]}));
    }

    #[test]
    fn test_map_each_propagates_null_elements() {
        let tree = json!({"names": ["x", null]});
        let result = run(
            tree,
            vec![Rule::new("names", vec![Operation::MapEach { operations: vec![call("toUpperCase", vec![])] }])],
        );
        assert_eq!(result, json!({"names": ["X", null]}));
    }

    #[test]
    fn test_null_skips_calls_but_not_null_safe_ones() {
        let tree = json!({"a": null, "b": null});
        let result = run(
            tree,
            vec![
                Rule::new("a", vec![call("add", vec![json!(1)])]),
                Rule::new("b", vec![call("default", vec![json!("fallback")]), call("toUpperCase", vec![])]),
            ],
        );
        assert_eq!(result, json!({"a": null, "b": "FALLBACK"}));
    }

    #[test]
    fn test_hoist_keep_original() {
        let tree = json!({"wrapper": {"a": 1}});
        let result = run(tree, vec![Rule::new("wrapper", vec![Operation::Hoist { keep: true }])]);
        assert_eq!(result, json!({"wrapper": {"a": 1}, "a": 1}));
    }

    #[test]
    fn test_rename_moves_final_value() {
        let tree = json!({"obj": {"a": "a"}});
        let result = run(
            tree,
            vec![Rule::new("obj", vec![Operation::Rename { key: "data".to_string() }, navigate_self("$.a")])],
        );
        assert_eq!(result, json!({"data": "a"}));
    }

    #[test]
    fn test_structural_ops_keep_sibling_order() {
        let renamed = run(
            json!({"a": 1, "obj": 2, "b": 3, "c": 4}),
            vec![Rule::new("obj", vec![Operation::Rename { key: "data".to_string() }])],
        );
        assert_eq!(serde_json::to_string(&renamed).unwrap(), r#"{"a":1,"b":3,"c":4,"data":2}"#);

        let hoisted = run(
            json!({"a": 1, "w": {"x": 9}, "b": 3, "c": 4}),
            vec![Rule::new("w", vec![Operation::Hoist { keep: false }])],
        );
        assert_eq!(serde_json::to_string(&hoisted).unwrap(), r#"{"a":1,"b":3,"c":4,"x":9}"#);
    }

    #[test]
    fn test_rename_inside_each_is_ignored() {
        let tree = json!({"list": [{"a": 1}]});
        let result = run(
            tree.clone(),
            vec![Rule::new(
                "list",
                vec![Operation::MapEach { operations: vec![Operation::Rename { key: "b".to_string() }] }],
            )],
        );
        assert_eq!(result, tree);
    }

    #[test]
    fn test_assign_with_trace() {
        let tree = json!({"first": "Ada", "age": 36});
        let result = run(
            tree,
            vec![Rule::new(
                "first",
                vec![
                    Operation::Navigate { scope: Scope::Parent, path: "$.age".to_string() },
                    Operation::Assign { args: vec![json!("$0 ($1)")] },
                ],
            )],
        );
        assert_eq!(result["first"], json!("Ada (36)"));
    }

    #[test]
    fn test_assign_many_args_builds_array() {
        let tree = json!({"v": 1});
        let result = run(tree, vec![Rule::new("v", vec![Operation::Assign { args: vec![json!("$0"), json!(2)] }])]);
        assert_eq!(result, json!({"v": [1, 2]}));
    }

    #[test]
    fn test_path_query_error_surfaces() {
        let mut tree = json!({"obj": {"a": 1}});
        let program = Program::new(vec![Rule::new("obj", vec![navigate_self("$[?(")])]);

        let err = transformer().apply(&mut tree, &program).unwrap_err();
        assert!(matches!(err, TransformError::PathQuery { .. }));
    }
}
