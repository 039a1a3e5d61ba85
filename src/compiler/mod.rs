//! Directive compiler: turns `@shape` directives into a transform program.
//!
//! The compiler walks a parsed query depth first, keeping the response keys
//! (aliases where present) of the enclosing fields on a path stack. Every
//! transform directive becomes a [`Rule`] addressed by the current stack, and
//! is removed from the document. Fields carrying the deletion variant of the
//! directive (`@_shape`) are removed with their whole subtree.
//!
//! Rules are collected shallow first and the program is reversed at the end,
//! so nested rules run before the rules of the fields enclosing them.
//!
//! # Example
//!
//! ```
//! use graphql_shape::compiler::{compile, CompileOptions};
//!
//! let compilation = compile(
//!     r#"{ user { name @shape(map: "toUpperCase") } }"#,
//!     &CompileOptions::default(),
//! )
//! .unwrap();
//!
//! assert!(!compilation.query.contains("@shape"));
//! assert_eq!(compilation.program.rules()[0].address, "user.name");
//! ```

pub mod fragments;

use std::fmt;

use graphql_parser::query::{
    parse_query, Definition, Directive, Document, FragmentDefinition, OperationDefinition, Selection,
    SelectionSet, Value as GraphQLValue,
};
use serde_json::{Map, Value};

use crate::program::{FragmentTable, Operation, Program, Rule};
use fragments::{FragmentResolver, Target};

/// Error type for query compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The query text is not a valid executable document
    Parse(String),
    /// Two fragments share a name
    DuplicateFragment(String),
    /// A spread names a fragment the document does not declare
    UnknownFragment { fragment: String, referenced_from: String },
    /// A fragment spreads itself or a fragment declared after it
    ForwardFragment { fragment: String, referenced_from: String },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Parse(msg) => write!(f, "Failed to parse query: {}", msg),
            CompileError::DuplicateFragment(name) => write!(f, "Fragment '{}' is declared more than once", name),
            CompileError::UnknownFragment { fragment, referenced_from } => {
                write!(f, "Unknown fragment '{}' spread in {}", fragment, referenced_from)
            }
            CompileError::ForwardFragment { fragment, referenced_from } => write!(
                f,
                "Fragment '{}' spread in {} must be declared before the fragment spreading it",
                fragment, referenced_from
            ),
        }
    }
}

impl std::error::Error for CompileError {}

/// Directive names recognized by the compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Transform directive name, without `@`
    pub directive: String,
    /// Prefix forming the deletion directive from the transform directive
    pub delete_prefix: String,
}

impl CompileOptions {
    pub const DEFAULT_DIRECTIVE: &'static str = "shape";
    pub const DEFAULT_DELETE_PREFIX: &'static str = "_";

    /// Options for a custom directive name
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            directive: directive.into(),
            ..Self::default()
        }
    }

    /// Name of the deletion directive, e.g. `_shape`
    pub fn delete_directive(&self) -> String {
        format!("{}{}", self.delete_prefix, self.directive)
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            directive: Self::DEFAULT_DIRECTIVE.to_string(),
            delete_prefix: Self::DEFAULT_DELETE_PREFIX.to_string(),
        }
    }
}

/// Result of compiling a query
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    /// Query text with every transform and deletion directive removed
    pub query: String,
    /// Rules in execution order (deepest first)
    pub program: Program,
    /// Expanded rules of each fragment, relative to the fragment body
    pub fragments: FragmentTable,
}

/// Parse and compile query text
pub fn compile(source: &str, options: &CompileOptions) -> Result<Compilation, CompileError> {
    let document = parse_query::<String>(source).map_err(|e| CompileError::Parse(e.to_string()))?;
    compile_document(document, options)
}

/// Compile an already parsed document
pub fn compile_document(
    mut document: Document<'_, String>,
    options: &CompileOptions,
) -> Result<Compilation, CompileError> {
    let mut walker = Walker::new(options);
    walker.walk_document(&mut document)?;

    let (mut rules, fragments) = walker.resolver.finish()?;
    rules.reverse();

    tracing::debug!(rules = rules.len(), fragments = fragments.len(), "Compiled query");

    Ok(Compilation {
        query: document.to_string(),
        program: Program::new(rules),
        fragments,
    })
}

struct Walker<'o> {
    options: &'o CompileOptions,
    delete_directive: String,
    resolver: FragmentResolver,
    operation_path: Vec<String>,
    fragment_path: Vec<String>,
}

impl<'o> Walker<'o> {
    fn new(options: &'o CompileOptions) -> Self {
        Self {
            options,
            delete_directive: options.delete_directive(),
            resolver: FragmentResolver::new(),
            operation_path: Vec::new(),
            fragment_path: Vec::new(),
        }
    }

    fn stack(&mut self, target: &Target) -> &mut Vec<String> {
        match target {
            Target::Program => &mut self.operation_path,
            Target::Fragment(_) => &mut self.fragment_path,
        }
    }

    fn address(&self, target: &Target) -> String {
        match target {
            Target::Program => self.operation_path.join("."),
            Target::Fragment(_) => self.fragment_path.join("."),
        }
    }

    fn walk_document(&mut self, document: &mut Document<'_, String>) -> Result<(), CompileError> {
        for definition in &mut document.definitions {
            match definition {
                Definition::Operation(operation) => self.walk_operation(operation),
                Definition::Fragment(fragment) => self.walk_fragment(fragment)?,
            }
        }
        Ok(())
    }

    fn walk_operation(&mut self, operation: &mut OperationDefinition<'_, String>) {
        let target = Target::Program;
        self.operation_path.clear();

        let selection_set = match operation {
            OperationDefinition::SelectionSet(set) => set,
            OperationDefinition::Query(query) => {
                self.capture(&target, &mut query.directives);
                &mut query.selection_set
            }
            OperationDefinition::Mutation(mutation) => {
                self.capture(&target, &mut mutation.directives);
                &mut mutation.selection_set
            }
            OperationDefinition::Subscription(subscription) => {
                self.capture(&target, &mut subscription.directives);
                &mut subscription.selection_set
            }
        };

        self.walk_selection_set(&target, selection_set);
    }

    fn walk_fragment(&mut self, fragment: &mut FragmentDefinition<'_, String>) -> Result<(), CompileError> {
        self.resolver.declare(&fragment.name)?;

        let target = Target::Fragment(fragment.name.clone());
        self.fragment_path.clear();

        self.capture(&target, &mut fragment.directives);
        self.walk_selection_set(&target, &mut fragment.selection_set);
        Ok(())
    }

    fn walk_selection_set(&mut self, target: &Target, selection_set: &mut SelectionSet<'_, String>) {
        let delete = &self.delete_directive;
        let before = selection_set.items.len();
        selection_set
            .items
            .retain(|selection| !selection_directives(selection).iter().any(|d| &d.name == delete));

        let removed = before - selection_set.items.len();
        if removed > 0 {
            tracing::debug!(removed, address = %self.address(target), "Removed selections marked for deletion");
        }

        for selection in &mut selection_set.items {
            match selection {
                Selection::Field(field) => {
                    let key = field.alias.clone().unwrap_or_else(|| field.name.clone());
                    self.stack(target).push(key);
                    self.capture(target, &mut field.directives);
                    self.walk_selection_set(target, &mut field.selection_set);
                    self.stack(target).pop();
                }
                Selection::FragmentSpread(spread) => {
                    self.capture(target, &mut spread.directives);
                    let prefix = self.address(target);
                    self.resolver.enqueue(target, prefix, spread.fragment_name.clone());
                }
                Selection::InlineFragment(inline) => {
                    self.capture(target, &mut inline.directives);
                    self.walk_selection_set(target, &mut inline.selection_set);
                }
            }
        }
    }

    /// Turn transform directives into a rule at the current address and strip them
    fn capture(&mut self, target: &Target, directives: &mut Vec<Directive<'_, String>>) {
        let directive = &self.options.directive;
        let delete = &self.delete_directive;
        let mut operations = Vec::new();
        let mut found = false;

        directives.retain(|d| {
            if &d.name == directive {
                found = true;
                operations.extend(
                    d.arguments
                        .iter()
                        .map(|(name, value)| Operation::from_argument(name, literal(value))),
                );
                false
            } else {
                &d.name != delete
            }
        });

        if found {
            let address = self.address(target);
            tracing::debug!(collection = %target, address = %address, operations = operations.len(), "Captured rule");
            self.resolver.push(target, Rule::new(address, operations));
        }
    }
}

fn selection_directives<'s, 'a>(selection: &'s Selection<'a, String>) -> &'s [Directive<'a, String>] {
    match selection {
        Selection::Field(field) => &field.directives,
        Selection::FragmentSpread(spread) => &spread.directives,
        Selection::InlineFragment(inline) => &inline.directives,
    }
}

/// JSON form of a directive argument
///
/// Variables cannot be resolved at compile time and become null.
fn literal(value: &GraphQLValue<'_, String>) -> Value {
    match value {
        GraphQLValue::Variable(name) => {
            tracing::warn!(variable = %name, "Variables are not supported in directive arguments, using null");
            Value::Null
        }
        GraphQLValue::Int(n) => n.as_i64().map_or(Value::Null, Value::from),
        GraphQLValue::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        GraphQLValue::String(s) => Value::String(s.clone()),
        GraphQLValue::Boolean(b) => Value::Bool(*b),
        GraphQLValue::Null => Value::Null,
        GraphQLValue::Enum(name) => Value::String(name.clone()),
        GraphQLValue::List(items) => Value::Array(items.iter().map(literal).collect()),
        GraphQLValue::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, item)| (key.clone(), literal(item)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Scope;
    use serde_json::json;

    fn compile_default(source: &str) -> Compilation {
        compile(source, &CompileOptions::default()).unwrap()
    }

    fn addresses(program: &Program) -> Vec<&str> {
        program.iter().map(|r| r.address.as_str()).collect()
    }

    #[test]
    fn test_rules_use_aliases_and_run_deepest_first() {
        let compilation = compile_default(
            r#"
            query {
              result: findIt @shape(path: "$[items]") {
                items @shape(path: "$[*].name") { name }
              }
            }
            "#,
        );

        assert_eq!(addresses(&compilation.program), vec!["result.items", "result"]);
        assert_eq!(
            compilation.program.rules()[1].operations,
            vec![Operation::Navigate { scope: Scope::Current, path: "$[items]".to_string() }]
        );
    }

    #[test]
    fn test_arguments_keep_order_and_literals() {
        let compilation = compile_default(
            r#"{ str @shape(split: ",", map: ["toUpperCase"], slice: [0, -1], flag: true, ratio: 1.5, kind: ASC) }"#,
        );

        let rule = &compilation.program.rules()[0];
        assert_eq!(rule.address, "str");
        assert_eq!(
            rule.operations,
            vec![
                Operation::Call { name: "split".to_string(), args: vec![json!(",")] },
                Operation::MapEach {
                    operations: vec![Operation::Call { name: "toUpperCase".to_string(), args: vec![] }]
                },
                Operation::Call { name: "slice".to_string(), args: vec![json!(0), json!(-1)] },
                Operation::Call { name: "flag".to_string(), args: vec![json!(true)] },
                Operation::Call { name: "ratio".to_string(), args: vec![json!(1.5)] },
                Operation::Call { name: "kind".to_string(), args: vec![json!("ASC")] },
            ]
        );
    }

    #[test]
    fn test_directives_are_stripped() {
        let compilation = compile_default(r#"{ a @shape(path: "x") @include(if: true) { b @shape(map: "trim") } }"#);

        assert!(!compilation.query.contains("@shape"));
        assert!(compilation.query.contains("@include"));
        assert!(graphql_parser::query::parse_query::<String>(&compilation.query).is_ok());
    }

    #[test]
    fn test_delete_marker_removes_field_and_subtree() {
        let compilation = compile_default(r#"{ keep drop @_shape { inner @shape(map: "trim") } }"#);

        assert!(!compilation.query.contains("drop"));
        assert!(!compilation.query.contains("_shape"));
        assert!(compilation.query.contains("keep"));
        assert!(compilation.program.is_empty());
    }

    #[test]
    fn test_custom_directive_name() {
        let options = CompileOptions::new("view");
        let compilation = compile(r#"{ a @view(rename: "b") @shape(path: "x") }"#, &options).unwrap();

        assert_eq!(compilation.program.len(), 1);
        assert!(!compilation.query.contains("@view"));
        assert!(compilation.query.contains("@shape"));
    }

    #[test]
    fn test_fragment_declared_after_use() {
        let compilation = compile_default(
            r#"
            query {
              edges { node { location @shape(path: "address") { ...frag } } }
            }
            fragment frag on Location {
              address { state @shape(map: "toUpperCase") }
            }
            "#,
        );

        assert_eq!(
            addresses(&compilation.program),
            vec!["edges.node.location.address.state", "edges.node.location"]
        );
        assert_eq!(compilation.fragments["frag"][0].address, "address.state");
    }

    #[test]
    fn test_nested_fragment_spreads() {
        let compilation = compile_default(
            r#"
            fragment inner on T { leaf @shape(map: "trim") }
            fragment outer on T { mid { ...inner } }
            { top { ...outer } }
            "#,
        );

        assert_eq!(addresses(&compilation.program), vec!["top.mid.leaf"]);
        assert_eq!(compilation.fragments["outer"][0].address, "mid.leaf");
    }

    #[test]
    fn test_inline_fragment_and_spread_directives() {
        let compilation = compile_default(
            r#"
            fragment f on T { x @shape(map: "trim") }
            { a { ... on T { b @shape(map: "trim") } ...f @shape(hoist: true) } }
            "#,
        );

        assert_eq!(addresses(&compilation.program), vec!["a.x", "a", "a.b"]);
    }

    #[test]
    fn test_variables_become_null() {
        let compilation = compile_default(r#"query Q($v: String) { a @shape(default: $v) }"#);

        assert_eq!(
            compilation.program.rules()[0].operations,
            vec![Operation::Call { name: "default".to_string(), args: vec![json!(null)] }]
        );
    }

    #[test]
    fn test_fragment_errors() {
        let unknown = compile(r#"{ a { ...missing } }"#, &CompileOptions::default());
        assert!(matches!(unknown, Err(CompileError::UnknownFragment { .. })));

        let forward = compile(
            r#"
            fragment first on T { ...second }
            fragment second on T { b }
            { a { ...first } }
            "#,
            &CompileOptions::default(),
        );
        assert!(matches!(forward, Err(CompileError::ForwardFragment { .. })));

        let duplicate = compile(
            r#"
            fragment f on T { a }
            fragment f on T { b }
            { x { ...f } }
            "#,
            &CompileOptions::default(),
        );
        assert!(matches!(duplicate, Err(CompileError::DuplicateFragment(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = compile("{ unclosed", &CompileOptions::default());
        assert!(matches!(result, Err(CompileError::Parse(_))));
    }
}
