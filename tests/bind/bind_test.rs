//! Calling-scope resolution and parameter normalization.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use comprehend::bind::{self, evaluate, Scope};
use comprehend::error::CompileError;
use comprehend::sql::Dialect;
use comprehend::tree::{call, constant, name, ExprNode, NodeKind, QueryRoot};
use comprehend::types::{Value, ValueType};

use common::{compile_err_in, compile_in, compiler, shop};

fn adults_over(bound: ExprNode) -> QueryRoot {
    QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("age").gt(bound))
}

#[test]
fn test_cell_wins_over_local_and_global() {
    let scope = Scope::default()
        .with_global("limit", 10)
        .with_local("limit", 20)
        .with_cell("limit", 30);

    let bound = compile_in(Dialect::Postgres, &adults_over(name("limit")), &scope);
    assert_eq!(bound.params, vec![Value::Int(30)]);
}

#[test]
fn test_global_used_when_no_local() {
    let scope = Scope::default().with_global("limit", 10);
    let bound = compile_in(Dialect::Postgres, &adults_over(name("limit")), &scope);
    assert_eq!(bound.params, vec![Value::Int(10)]);
}

#[test]
fn test_unassigned_cell_hides_global() {
    let scope = Scope::default()
        .with_unassigned_cell("limit")
        .with_global("limit", 10);

    let err = compile_err_in(Dialect::Postgres, &adults_over(name("limit")), &scope);
    match err {
        CompileError::UnboundVariable { name, expr } => {
            assert_eq!(name, "limit (referenced before assignment)");
            assert_eq!(expr, "limit");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_missing_variable_names_the_subexpression() {
    let err = compile_err_in(
        Dialect::Postgres,
        &adults_over(name("limit").add(constant(1))),
        &Scope::default(),
    );
    match err {
        CompileError::UnboundVariable { name, expr } => {
            assert_eq!(name, "limit");
            assert_eq!(expr, "limit");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_entity_name_falls_back_to_catalog() {
    let value = evaluate(&name("Person"), &Scope::default(), &shop()).unwrap();
    assert_eq!(value, Value::EntitySet("Person".into()));

    // A scope variable with the same name shadows the entity.
    let scope = Scope::default().with_local("Person", 1);
    let value = evaluate(&name("Person"), &scope, &shop()).unwrap();
    assert_eq!(value, Value::Int(1));
}

#[test]
fn test_field_of_mapping() {
    let mut cfg = BTreeMap::new();
    cfg.insert("min_age".to_string(), Value::Int(21));
    let scope = Scope::default().with_global("cfg", Value::Map(cfg));

    let bound = compile_in(
        Dialect::Postgres,
        &adults_over(name("cfg").attr("min_age")),
        &scope,
    );
    assert!(bound.sql.ends_with("WHERE \"p\".\"age\" > $1"));
    assert_eq!(bound.params, vec![Value::Int(21)]);
}

#[test]
fn test_mapping_is_not_a_parameter() {
    let scope = Scope::default().with_local("cfg", Value::Map(BTreeMap::new()));
    let err = compile_err_in(Dialect::Postgres, &adults_over(name("cfg")), &scope);
    match err {
        CompileError::UnsupportedParameterType {
            type_name, expr, ..
        } => {
            assert_eq!(type_name, "mapping");
            assert_eq!(expr, "cfg");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_non_finite_float_rejected() {
    let scope = Scope::default().with_local("x", f64::NAN);
    let err = compile_err_in(Dialect::Postgres, &adults_over(name("x")), &scope);
    assert!(matches!(err, CompileError::UnsupportedParameterType { .. }));
}

#[test]
fn test_arithmetic_evaluated_before_binding() {
    let scope = Scope::default().with_local("base", 17);
    let bound = compile_in(
        Dialect::Postgres,
        &adults_over(name("base").add(constant(1))),
        &scope,
    );
    assert_eq!(bound.params, vec![Value::Int(18)]);
    assert_eq!(bound.sql.matches('$').count(), 1);
}

#[test]
fn test_host_function_result_is_bound() {
    let scope = Scope::default()
        .with_local("who", "ada")
        .with_function("adult_age", |args: &[Value]| match args {
            [Value::Text(country)] if country == "ada" => Ok(Value::Int(21)),
            [_] => Ok(Value::Int(18)),
            _ => Err("adult_age takes one argument".into()),
        });

    let bound = compile_in(
        Dialect::Postgres,
        &adults_over(call("adult_age", vec![name("who")])),
        &scope,
    );
    assert_eq!(bound.params, vec![Value::Int(21)]);
}

#[test]
fn test_host_function_error_is_type_mismatch() {
    let scope = Scope::default().with_function("fails", |_: &[Value]| Err("boom".into()));
    let err = compile_err_in(
        Dialect::Postgres,
        &adults_over(call("fails", vec![])),
        &scope,
    );
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
    assert_eq!(err.expr(), Some("fails()"));
}

#[test]
fn test_date_constructor_bound_as_single_parameter() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("born").ge(call(
            "date",
            vec![constant(2000), constant(1), constant(1)],
        )));

    let bound = compile_in(Dialect::Postgres, &query, &Scope::default());
    assert!(bound.sql.ends_with("WHERE \"p\".\"born\" >= $1"));
    assert_eq!(
        bound.params,
        vec![Value::Date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())]
    );
}

#[test]
fn test_formatted_value_renders_as_text() {
    let formatted = |inner: ExprNode| ExprNode::new(NodeKind::FormattedValue(Box::new(inner)));
    let scope = Scope::default().with_local("n", 5).with_local("s", "five");

    assert_eq!(
        evaluate(&formatted(name("n")), &scope, &shop()).unwrap(),
        Value::Text("5".into())
    );
    assert_eq!(
        evaluate(&formatted(name("s")), &scope, &shop()).unwrap(),
        Value::Text("five".into())
    );
}

#[test]
fn test_scope_from_mapping_value() {
    let mut fields = BTreeMap::new();
    fields.insert("limit".to_string(), Value::Int(40));
    let scope = Scope::from(Value::Map(fields));

    let bound = compile_in(Dialect::Postgres, &adults_over(name("limit")), &scope);
    assert_eq!(bound.params, vec![Value::Int(40)]);
}

#[test]
fn test_parameter_table_for_prepared_query() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("id").in_(name("ids")));
    let prepared = compiler(Dialect::Postgres).prepare(&query).unwrap();
    let scope = Scope::default().with_local(
        "ids",
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    );

    let table = bind::bind(&prepared.id, prepared.extracted(), &scope, &shop()).unwrap();
    assert_eq!(table.len(), 2);

    let ids = table.get("ids").unwrap();
    assert_eq!(ids.value_type, ValueType::set_of(ValueType::INT));
    assert_eq!(ids.set_len(), Some(3));
    assert_eq!(ids.flattened().len(), 3);
    assert_eq!(ids.key.query_id, prepared.id);

    let person = table.get("Person").unwrap();
    assert_eq!(person.value, Value::EntitySet("Person".into()));
    assert_eq!(person.set_len(), None);
}

#[test]
fn test_empty_list_binds_as_set_of_null() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("id").in_(name("ids")));
    let prepared = compiler(Dialect::Postgres).prepare(&query).unwrap();
    let scope = Scope::default().with_local("ids", Value::List(vec![]));

    let table = bind::bind(&prepared.id, prepared.extracted(), &scope, &shop()).unwrap();
    let ids = table.get("ids").unwrap();
    assert_eq!(ids.value_type, ValueType::set_of(ValueType::Null));
    assert_eq!(ids.set_len(), Some(0));
}

#[test]
fn test_mixed_list_rejected() {
    let scope = Scope::default().with_local(
        "ids",
        Value::List(vec![Value::Int(1), Value::Text("two".into())]),
    );
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("id").in_(name("ids")));

    let err = compile_err_in(Dialect::Postgres, &query, &scope);
    assert!(matches!(err, CompileError::UnsupportedParameterType { .. }));
}
