//! Free-variable classification over whole queries.

use comprehend::classify::classify;
use comprehend::error::CompileError;
use comprehend::functions::BUILTINS;
use comprehend::tree::{call, constant, name, none, Comprehension, NodeKind, QueryRoot};

fn extracted(query: &QueryRoot) -> Vec<String> {
    classify(query, &BUILTINS)
        .unwrap()
        .extracted
        .into_keys()
        .collect()
}

fn people() -> QueryRoot {
    QueryRoot::select(name("p")).iterate("p", name("Person"))
}

#[test]
fn test_outer_variable_inside_nested_comprehension_is_local() {
    let cheap = Comprehension::new(name("c"))
        .iterate("c", name("p").attr("cars"))
        .filter(name("c").attr("price").lt(name("limit")))
        .into_node();
    let query = people().filter(call("exists", vec![cheap]));

    assert_eq!(extracted(&query), vec!["Person", "limit"]);
}

#[test]
fn test_attribute_chain_extracted_whole() {
    let query = people().filter(name("p").attr("age").ge(name("cfg").attr("min_age")));
    assert_eq!(extracted(&query), vec!["Person", "cfg.min_age"]);
}

#[test]
fn test_host_call_extracted_whole() {
    let query = people().filter(name("p").attr("name").eq(call("lookup", vec![name("x"), constant(1)])));
    assert_eq!(extracted(&query), vec!["Person", "lookup(x, 1)"]);
}

#[test]
fn test_method_on_external_value_extracted_whole() {
    let query = people().filter(name("p").attr("name").eq(name("who").method("upper", vec![])));
    assert_eq!(extracted(&query), vec!["Person", "who.upper()"]);
}

#[test]
fn test_qualified_builtin_stays_in_query() {
    let query = people().filter(name("p").attr("age").gt(call("math.sqrt", vec![name("x")])));
    let classified = classify(&query, &BUILTINS).unwrap();

    assert_eq!(
        classified.extracted.keys().collect::<Vec<_>>(),
        vec!["Person", "x"]
    );
    let condition = &classified.root.comprehension.clauses[0].conditions[0];
    let NodeKind::Compare { comparators, .. } = &condition.kind else {
        panic!("expected a comparison");
    };
    assert_eq!(comparators[0].is_external, Some(false));
}

#[test]
fn test_arithmetic_on_externals_is_one_parameter() {
    let query = people().filter(name("p").attr("age").gt(name("base").add(constant(1))));
    assert_eq!(extracted(&query), vec!["Person", "base + 1"]);
}

#[test]
fn test_none_never_extracted() {
    let query = people()
        .filter(name("p").attr("email").is_not(none()))
        .filter(name("p").attr("age").gt(constant(30)));
    assert_eq!(extracted(&query), vec!["30", "Person"]);
}

#[test]
fn test_order_keys_see_loop_variables() {
    let query = people()
        .order_by(name("p").attr("age"))
        .order_by_desc(name("rank"));
    assert_eq!(extracted(&query), vec!["Person", "rank"]);
}

#[test]
fn test_duplicate_sources_share_one_entry() {
    let query = people()
        .filter(name("p").attr("age").gt(name("x")))
        .filter(name("p").attr("id").ne(name("x")));
    assert_eq!(extracted(&query), vec!["Person", "x"]);
}

#[test]
fn test_classification_flags_every_node() {
    let query = people().filter(name("p").attr("age").gt(name("x")));
    let classified = classify(&query, &BUILTINS).unwrap();

    let clause = &classified.root.comprehension.clauses[0];
    assert_eq!(clause.iter.is_external, Some(true));
    assert_eq!(clause.iter.is_constant, Some(false));
    let condition = &clause.conditions[0];
    assert_eq!(condition.is_external, Some(false));
    for child in condition.children() {
        assert!(child.is_external.is_some());
    }
    // The input is left untouched.
    assert_eq!(query.comprehension.clauses[0].iter.is_external, None);
}

#[test]
fn test_reserved_loop_variable_rejected() {
    let query = QueryRoot::select(name("__x")).iterate("__x", name("Person"));
    let err = classify(&query, &BUILTINS).unwrap_err();
    assert!(matches!(err, CompileError::MalformedInputTree { .. }));
}

#[test]
fn test_tree_deserialized_from_json() {
    let json = r#"{
        "comprehension": {
            "elt": {"Name": "p"},
            "clauses": [{
                "target": "p",
                "iter": {"Name": "Person"},
                "conditions": [{"Compare": {
                    "left": {"Attribute": {"value": {"Name": "p"}, "attr": "age"}},
                    "ops": ["Gt"],
                    "comparators": [{"Constant": {"Int": 30}}]
                }}]
            }]
        },
        "limit": 10
    }"#;
    let query: QueryRoot = serde_json::from_str(json).unwrap();

    assert_eq!(query.limit, Some(10));
    assert_eq!(query.source(), "(p for p in Person if p.age > 30)");
    assert_eq!(extracted(&query), vec!["30", "Person"]);
}
