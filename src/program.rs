//! Transform programs: rules, operations and their decoding from directive arguments.
//!
//! A program is an ordered list of [`Rule`]s. Each rule names an address in
//! the response and the chain of [`Operation`]s replayed at every location the
//! address matches. Programs serialize with serde so they can be stored and
//! replayed without recompiling the query.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::FieldPath;

/// Which value a navigation expression is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The value being rewritten
    #[serde(rename = "self")]
    Current,
    /// The container enclosing the value being rewritten
    Parent,
    /// The whole response
    Root,
}

/// One step of a rule's operation chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    /// Evaluate a path expression against the current value, its parent or the root
    Navigate { scope: Scope, path: String },

    /// Apply a nested chain to every element (or once to a non-array)
    #[serde(rename = "each")]
    MapEach { operations: Vec<Operation> },

    /// Merge the value's keys into its parent, keeping the original key if `keep`
    Hoist { keep: bool },

    /// Move the value to another key of its parent
    Rename { key: String },

    /// Replace the value with literal (trace-substituted) arguments
    Assign { args: Vec<Value> },

    /// Invoke a named function through the resolver chain
    Call { name: String, args: Vec<Value> },
}

impl Operation {
    /// Decode one directive argument into an operation.
    ///
    /// # Arguments
    ///
    /// * `name` - Argument name (`self`, `path`, `parent`, `root`, `each`, `map`,
    ///   `hoist`, `rename`, `assign`, or any function name)
    /// * `value` - Literal argument value
    ///
    /// # Example
    ///
    /// ```
    /// use graphql_shape::program::{Operation, Scope};
    /// use serde_json::json;
    ///
    /// let op = Operation::from_argument("parent", json!("$.books"));
    /// assert_eq!(op, Operation::Navigate { scope: Scope::Parent, path: "$.books".to_string() });
    ///
    /// let op = Operation::from_argument("join", json!(", "));
    /// assert_eq!(op, Operation::Call { name: "join".to_string(), args: vec![json!(", ")] });
    /// ```
    pub fn from_argument(name: &str, value: Value) -> Self {
        match name {
            "self" | "path" => Operation::Navigate {
                scope: Scope::Current,
                path: text(value),
            },
            "parent" => Operation::Navigate {
                scope: Scope::Parent,
                path: text(value),
            },
            "root" => Operation::Navigate {
                scope: Scope::Root,
                path: text(value),
            },
            "each" | "map" => Operation::MapEach {
                operations: sub_operations(value),
            },
            "hoist" => Operation::Hoist {
                keep: value.as_bool().unwrap_or(false),
            },
            "rename" => Operation::Rename { key: text(value) },
            "assign" => Operation::Assign {
                args: into_args(value),
            },
            _ => Operation::Call {
                name: name.to_string(),
                args: into_args(value),
            },
        }
    }

    /// Short label used in logs
    pub fn label(&self) -> &str {
        match self {
            Operation::Navigate { scope: Scope::Current, .. } => "self",
            Operation::Navigate { scope: Scope::Parent, .. } => "parent",
            Operation::Navigate { scope: Scope::Root, .. } => "root",
            Operation::MapEach { .. } => "each",
            Operation::Hoist { .. } => "hoist",
            Operation::Rename { .. } => "rename",
            Operation::Assign { .. } => "assign",
            Operation::Call { name, .. } => name.as_str(),
        }
    }
}

fn text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn into_args(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Decode the argument of `each`/`map`.
///
/// A string is a single call without arguments; a list holds strings or
/// single-key objects (`{name: args}`) decoded like directive arguments.
fn sub_operations(value: Value) -> Vec<Operation> {
    match value {
        Value::String(name) => vec![Operation::Call { name, args: Vec::new() }],
        Value::Array(items) => items.into_iter().flat_map(sub_operations).collect(),
        Value::Object(fields) => fields
            .into_iter()
            .map(|(name, args)| Operation::from_argument(&name, args))
            .collect(),
        _ => Vec::new(),
    }
}

/// A compiled address plus its ordered operation chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Dotted response address; empty for the whole response
    pub address: String,

    /// Operations, in directive argument order
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Rule {
    /// Create a rule
    pub fn new(address: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            address: address.into(),
            operations,
        }
    }

    /// Parsed form of the address
    pub fn field_path(&self) -> FieldPath {
        FieldPath::parse(&self.address)
    }

    /// Copy of this rule with its address placed under `prefix`
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self {
            address: join_address(prefix, &self.address),
            operations: self.operations.clone(),
        }
    }
}

/// Join two dotted addresses, either of which may be empty
pub fn join_address(prefix: &str, relative: &str) -> String {
    match (prefix.is_empty(), relative.is_empty()) {
        (true, _) => relative.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}.{}", prefix, relative),
    }
}

/// Ordered transform rules, deepest first once compiled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program {
    rules: Vec<Rule>,
}

impl Program {
    /// Create a program from rules in execution order
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Rules in execution order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Iterate rules in execution order
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the program has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Consume into the rule list
    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }
}

impl From<Vec<Rule>> for Program {
    fn from(rules: Vec<Rule>) -> Self {
        Self::new(rules)
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Fragment name -> rules relative to the fragment body, in declaration order.
pub type FragmentTable = IndexMap<String, Vec<Rule>>;
