//! Integration tests for compiling shape directives and applying programs

use graphql_shape::{
    apply, compile, register, CompileError, Operation, Program, Rule, Scope, ShapeError, TransformError,
};
use serde_json::{json, Value};

const FIXTURE_QUERY: &str = r#"
    query {
      result1: findIt {
        id
        arr
        cats: arrObj @shape(path: "$[*].name", map: "ucFirst", join: ", ") {
          name
        }
        str @shape(split: ",", map: ["toUpperCase"], slice: [0, -1])
        edges @shape(path: "$[*].node") {
          node {
            id
            location @shape(path: "address") {
              ...frag
            }
          }
        }
      }
      result2: findIt @shape(path: "$[arrObj]") {
        id
        arr
        arrObj @shape(path: "$[*].name") {
          name
        }
        edges {
          node {
            id
            location {
              ...frag
            }
          }
        }
      }
    }
    fragment frag on Location {
      address {
        city
        state @shape(map: "toUpperCase")
        zip: zipcode
      }
    }
"#;

fn edges() -> Value {
    json!([
        {"node": {"id": 1, "location": {"address": {"city": "city1", "state": "state1", "zipcode": "zipcode1"}}}},
        {"node": {"id": 2, "location": {"address": {"city": "city2", "state": "state2", "zipcode": "zipcode2"}}}}
    ])
}

fn fixture_data() -> Value {
    json!({
        "result1": [{
            "id": 1,
            "arr": ["one", "two", "three"],
            "cats": [{"name": "one"}, {"name": "two"}, {"name": "three"}],
            "str": "five,six,seven,eight",
            "edges": edges()
        }],
        "result2": {
            "id": 2,
            "arr": ["one", "two", "three"],
            "arrObj": [{"name": "one"}, {"name": "two"}, {"name": "three"}],
            "str": "five,six,seven,eight",
            "edges": edges()
        }
    })
}

fn call(name: &str, args: Vec<Value>) -> Operation {
    Operation::Call { name: name.to_string(), args }
}

fn run(mut tree: Value, rules: Vec<Rule>) -> Value {
    apply(&mut tree, &Program::new(rules)).unwrap().clone()
}

#[test]
fn test_fixture_end_to_end() {
    let compiled = compile(FIXTURE_QUERY).unwrap();

    assert!(!compiled.query.contains("@shape"));
    assert!(compiled.query.contains("zip: zipcode"));
    assert!(compiled.query.contains("...frag"));
    assert!(graphql_parser::parse_query::<String>(&compiled.query).is_ok());

    let addresses: Vec<&str> = compiled.program.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(
        addresses,
        vec![
            "result2.edges.node.location.address.state",
            "result2.arrObj",
            "result2",
            "result1.edges.node.location.address.state",
            "result1.edges.node.location",
            "result1.edges",
            "result1.str",
            "result1.cats",
        ]
    );
    assert_eq!(compiled.fragments["frag"].len(), 1);
    assert_eq!(compiled.fragments["frag"][0].address, "address.state");

    let result = compiled.transform(fixture_data()).unwrap();

    assert_eq!(
        result,
        json!({
            "result1": [{
                "id": 1,
                "arr": ["one", "two", "three"],
                "cats": "One, Two, Three",
                "str": ["FIVE", "SIX", "SEVEN"],
                "edges": [
                    {"id": 1, "location": {"city": "city1", "state": "STATE1", "zipcode": "zipcode1"}},
                    {"id": 2, "location": {"city": "city2", "state": "STATE2", "zipcode": "zipcode2"}}
                ]
            }],
            "result2": ["one", "two", "three"]
        })
    );
}

#[test]
fn test_empty_program_is_noop() {
    let tree = fixture_data();
    assert_eq!(run(tree.clone(), vec![]), tree);
}

#[test]
fn test_deepest_rules_run_first() {
    let compiled = compile(r#"{ a @shape(path: "$.b") { b @shape(map: "toUpperCase") } }"#).unwrap();

    let result = compiled.transform(json!({"a": {"b": "x"}})).unwrap();

    assert_eq!(result, json!({"a": "X"}));
}

#[test]
fn test_address_broadcasts_over_arrays() {
    let result = run(
        json!({"items": [{"name": "x"}, {"name": "y"}]}),
        vec![Rule::new("items.name", vec![call("toUpperCase", vec![])])],
    );

    assert_eq!(result, json!({"items": [{"name": "X"}, {"name": "Y"}]}));
}

#[test]
fn test_hoist_merges_into_parent() {
    let result = run(
        json!({"wrapper": {"a": 1, "b": 2}}),
        vec![Rule::new("wrapper", vec![Operation::Hoist { keep: false }])],
    );

    assert_eq!(result, json!({"a": 1, "b": 2}));
}

#[test]
fn test_hoist_directive_controls_original_key() {
    let response = json!({"user": {"name": "ada", "address": {"city": "London"}}});

    let dropped = compile(r#"{ user { name address @shape(hoist: false) { city } } }"#).unwrap();
    assert_eq!(dropped.program.rules()[0].operations, vec![Operation::Hoist { keep: false }]);
    assert_eq!(
        dropped.transform(response.clone()).unwrap(),
        json!({"user": {"name": "ada", "city": "London"}})
    );

    let kept = compile(r#"{ user { name address @shape(hoist: true) { city } } }"#).unwrap();
    assert_eq!(kept.program.rules()[0].operations, vec![Operation::Hoist { keep: true }]);
    assert_eq!(
        kept.transform(response).unwrap(),
        json!({"user": {"name": "ada", "address": {"city": "London"}, "city": "London"}})
    );
}

#[test]
fn test_hoist_over_array_elements() {
    let result = run(
        json!({"items": [
            {"id": 1, "wrapper": {"a": "x"}},
            {"id": 2, "wrapper": {"a": "y"}},
            {"id": 3}
        ]}),
        vec![Rule::new("items.wrapper", vec![Operation::Hoist { keep: false }])],
    );

    assert_eq!(
        result,
        json!({"items": [{"id": 1, "a": "x"}, {"id": 2, "a": "y"}, {"id": 3}]})
    );
}

#[test]
fn test_rename_over_array_elements() {
    let compiled = compile(r#"{ items { id obj @shape(rename: "data") { a } } }"#).unwrap();

    let result = compiled
        .transform(json!({"items": [{"id": 1, "obj": {"a": 1}}, {"obj": {"a": 2}, "id": 2}]}))
        .unwrap();

    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        r#"{"items":[{"id":1,"data":{"a":1}},{"id":2,"data":{"a":2}}]}"#
    );
}

#[test]
fn test_rename() {
    let result = run(
        json!({"obj": {"a": "a"}}),
        vec![Rule::new("obj", vec![Operation::Rename { key: "data".to_string() }])],
    );

    assert_eq!(result, json!({"data": {"a": "a"}}));
}

#[test]
fn test_trace_survives_navigation() {
    let result = run(
        json!({"id": 1, "books": [10, 20]}),
        vec![Rule::new(
            "id",
            vec![
                Operation::Navigate { scope: Scope::Parent, path: "$.books".to_string() },
                call("push", vec![json!("$0")]),
            ],
        )],
    );

    assert_eq!(result, json!({"id": [10, 20, 1], "books": [10, 20]}));
}

#[test]
fn test_conditional_family() {
    let rules = vec![Rule::new("kind", vec![call("eq", vec![json!("site"), json!(""), json!("$0")])])];

    assert_eq!(run(json!({"kind": "site"}), rules.clone()), json!({"kind": ""}));
    assert_eq!(run(json!({"kind": "blog"}), rules), json!({"kind": "blog"}));

    let switch = vec![Rule::new(
        "size",
        vec![call("eq", vec![json!(1), json!("small"), json!(2), json!("medium"), json!("large")])],
    )];
    assert_eq!(run(json!({"size": 2}), switch.clone()), json!({"size": "medium"}));
    assert_eq!(run(json!({"size": 9}), switch), json!({"size": "large"}));

    let test = vec![Rule::new("size", vec![call("gt", vec![json!(5)])])];
    assert_eq!(run(json!({"size": 9}), test), json!({"size": true}));
}

#[test]
fn test_unknown_operation_is_noop() {
    let result = run(
        json!({"name": "ada"}),
        vec![Rule::new("name", vec![call("nonexistentMethod", vec![])])],
    );

    assert_eq!(result, json!({"name": "ada"}));
}

#[test]
fn test_oversized_call_is_an_error() {
    let compiled = compile(r#"{ s @shape(repeat: 9223372036854775807) }"#).unwrap();

    let err = compiled.transform(json!({"s": "abc"})).unwrap_err();

    assert!(matches!(err, TransformError::InvalidArgs(_)));
}

#[test]
fn test_delete_marker_removes_field() {
    let compiled = compile(r#"{ user { id secret @_shape } }"#).unwrap();

    assert!(!compiled.query.contains("secret"));
    assert!(!compiled.query.contains("_shape"));
    assert!(compiled.program.is_empty());
}

#[test]
fn test_fragment_errors_are_reported() {
    let unknown = compile(r#"{ a { ...missing } }"#).unwrap_err();
    assert!(matches!(
        unknown,
        ShapeError::Compile(CompileError::UnknownFragment { ref fragment, .. }) if fragment == "missing"
    ));

    let forward = compile(
        r#"
        fragment first on T { x { ...second } }
        fragment second on T { y @shape(map: "toUpperCase") }
        { a { ...first } }
        "#,
    )
    .unwrap_err();
    assert!(matches!(forward, ShapeError::Compile(CompileError::ForwardFragment { .. })));

    let duplicate = compile(
        r#"
        fragment f on T { x }
        fragment f on T { y }
        { a { ...f } }
        "#,
    )
    .unwrap_err();
    assert!(matches!(duplicate, ShapeError::Compile(CompileError::DuplicateFragment(_))));
}

#[test]
fn test_registered_function_is_visible_to_later_compilations() {
    register("integrationTriple", |value: Value, _args: &[Value]| {
        Ok(json!(value.as_i64().unwrap_or_default() * 3))
    });

    let compiled = compile(r#"{ count @shape(integrationTriple: null) }"#).unwrap();

    assert_eq!(compiled.transform(json!({"count": 4})).unwrap(), json!({"count": 12}));
}

#[test]
fn test_program_loads_from_json() {
    let program: Program = serde_json::from_value(json!([
        {"address": "user.name", "operations": [{"op": "call", "name": "toUpperCase", "args": []}]},
        {"address": "user", "operations": [{"op": "rename", "key": "person"}]}
    ]))
    .unwrap();

    let result = run(json!({"user": {"name": "ada"}}), program.into_rules());

    assert_eq!(result, json!({"person": {"name": "ADA"}}));
}
