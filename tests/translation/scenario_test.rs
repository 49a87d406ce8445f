//! End-to-end scenarios: expression tree in, SQL and parameters out.

#[path = "../common/mod.rs"]
mod common;

use comprehend::bind::Scope;
use comprehend::error::CompileError;
use comprehend::sql::{Dialect, ParamStyle};
use comprehend::tree::{all, call, constant, name, none, tuple, ExprNode, QueryRoot};
use comprehend::types::{Value, ValueType};

use common::{compile_in, compiler, pg, pg_err};

fn adults_named_ann() -> ExprNode {
    all(vec![
        name("p").attr("age").gt(constant(30)),
        name("p").attr("name").eq(constant("Ann")),
    ])
}

#[test]
fn test_filter_params_follow_source_order() {
    let query = QueryRoot::select(tuple(vec![name("p").attr("name"), name("p").attr("age")]))
        .iterate("p", name("Person"))
        .filter(adults_named_ann());

    let bound = pg(&query);
    insta::assert_snapshot!(
        bound.sql,
        @r#"SELECT "p"."name", "p"."age" FROM "person" AS "p" WHERE "p"."age" > $1 AND "p"."name" = $2"#
    );
    assert_eq!(bound.params, vec![Value::Int(30), Value::Text("Ann".into())]);
    assert_eq!(bound.style, ParamStyle::Numeric);
}

#[test]
fn test_selecting_entity_projects_every_column_key_first() {
    let query = QueryRoot::select(name("p"))
        .iterate("p", name("Person"))
        .filter(adults_named_ann());

    let bound = pg(&query);
    assert_eq!(
        bound.sql,
        "SELECT \"p\".\"id\", \"p\".\"name\", \"p\".\"age\", \"p\".\"city\", \"p\".\"email\", \
         \"p\".\"born\", \"p\".\"active\", \"p\".\"employer_id\" FROM \"person\" AS \"p\" \
         WHERE \"p\".\"age\" > $1 AND \"p\".\"name\" = $2"
    );
    assert_eq!(bound.columns, 8);
}

#[test]
fn test_single_aggregate_has_no_group_by() {
    let query = QueryRoot::select(call("avg", vec![name("p").attr("age")]))
        .iterate("p", name("Person"));

    let bound = pg(&query);
    assert_eq!(bound.sql, "SELECT AVG(\"p\".\"age\") FROM \"person\" AS \"p\"");
    assert_eq!(bound.result_type, ValueType::FLOAT);
    assert!(bound.params.is_empty());
}

#[test]
fn test_group_by_inferred_from_plain_columns() {
    let query = QueryRoot::select(tuple(vec![
        name("p").attr("city"),
        call("avg", vec![name("p").attr("age")]),
    ]))
    .iterate("p", name("Person"));

    let bound = pg(&query);
    assert_eq!(
        bound.sql,
        "SELECT \"p\".\"city\", AVG(\"p\".\"age\") FROM \"person\" AS \"p\" GROUP BY \"p\".\"city\""
    );
}

#[test]
fn test_every_plain_column_is_grouped() {
    let query = QueryRoot::select(tuple(vec![
        name("p").attr("city"),
        name("p").attr("name"),
        call("count", vec![]),
    ]))
    .iterate("p", name("Person"));

    let bound = pg(&query);
    assert!(bound.sql.contains("COUNT(*)"), "{}", bound.sql);
    assert!(
        bound.sql.ends_with("GROUP BY \"p\".\"city\", \"p\".\"name\""),
        "{}",
        bound.sql
    );
}

#[test]
fn test_comparison_with_none_is_null_test() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("email").eq(none()));

    let bound = pg(&query);
    assert_eq!(
        bound.sql,
        "SELECT \"p\".\"name\" FROM \"person\" AS \"p\" WHERE \"p\".\"email\" IS NULL"
    );
    assert!(bound.params.is_empty());
}

#[test]
fn test_none_on_the_left_is_swapped() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(none().is_not(name("p").attr("email")));

    let bound = pg(&query);
    assert!(bound.sql.ends_with("WHERE \"p\".\"email\" IS NOT NULL"), "{}", bound.sql);
}

#[test]
fn test_unknown_attribute_reports_entity_and_source() {
    let query = QueryRoot::select(name("p").attr("nonexistent")).iterate("p", name("Person"));

    match pg_err(&query) {
        CompileError::UnknownAttribute {
            entity,
            attribute,
            expr,
        } => {
            assert_eq!(entity, "Person");
            assert_eq!(attribute, "nonexistent");
            assert_eq!(expr, "p.nonexistent");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_plan_reused_with_new_values() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("age").ge(name("min_age")));
    let compiler = compiler(Dialect::Postgres);

    let first = compiler
        .compile(&query, &Scope::default().with_local("min_age", 18))
        .unwrap();
    let second = compiler
        .compile(&query, &Scope::default().with_local("min_age", 65))
        .unwrap();

    assert_eq!(first.sql, second.sql);
    assert_eq!(first.params, vec![Value::Int(18)]);
    assert_eq!(second.params, vec![Value::Int(65)]);

    let stats = compiler.cache().unwrap().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[test]
fn test_compilation_is_deterministic() {
    let query = QueryRoot::select(tuple(vec![
        name("p").attr("employer").attr("name"),
        name("c").attr("model"),
    ]))
    .iterate("p", name("Person"))
    .iterate("c", name("p").attr("cars"))
    .filter(name("c").attr("price").lt(name("budget")));
    let scope = Scope::default().with_local("budget", 20_000);

    let a = compile_in(Dialect::TSql, &query, &scope);
    let b = compile_in(Dialect::TSql, &query, &scope);
    assert_eq!(a, b);
}

#[test]
fn test_unbound_variable() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("age").gt(name("limit")));

    match pg_err(&query) {
        CompileError::UnboundVariable { name, .. } => assert_eq!(name, "limit"),
        other => panic!("unexpected {other:?}"),
    }
}
