//! Comparisons, membership tests, text matching and truthiness.

#[path = "../common/mod.rs"]
mod common;

use comprehend::bind::Scope;
use comprehend::compile::Compiler;
use comprehend::config::CompilerSettings;
use comprehend::error::CompileError;
use comprehend::sql::Dialect;
use comprehend::tree::{constant, name, none, tuple, CmpOp, Comprehension, QueryRoot};
use comprehend::types::Value;

use common::{catalog, compile_err_in, compile_in, pg, pg_err};

fn names_where(condition: comprehend::tree::ExprNode) -> QueryRoot {
    QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(condition)
}

fn inline_pg(query: &QueryRoot) -> String {
    let settings = CompilerSettings::default()
        .with_dialect(Dialect::Postgres)
        .with_inline_constants(true);
    Compiler::with_settings(catalog(), settings)
        .compile(query, &Scope::default())
        .unwrap()
        .sql
}

#[test]
fn test_in_bound_list_expands_per_element() {
    let query = names_where(name("p").attr("age").in_(name("ages")));
    let scope = Scope::default().with_local("ages", Value::List(vec![Value::Int(20), Value::Int(30)]));

    let bound = compile_in(Dialect::Postgres, &query, &scope);
    assert!(
        bound.sql.ends_with("WHERE \"p\".\"age\" IN ($1, $2)"),
        "{}",
        bound.sql
    );
    assert_eq!(bound.params, vec![Value::Int(20), Value::Int(30)]);
}

#[test]
fn test_in_empty_list_is_false() {
    let query = names_where(name("p").attr("age").in_(name("ages")));
    let scope = Scope::default().with_local("ages", Value::List(Vec::new()));

    let bound = compile_in(Dialect::Postgres, &query, &scope);
    assert!(bound.sql.ends_with("WHERE 1 = 0"), "{}", bound.sql);
    assert!(bound.params.is_empty());
}

#[test]
fn test_in_tuple_display_binds_each_item() {
    let query = names_where(
        name("p")
            .attr("city")
            .not_in(tuple(vec![name("a"), name("b")])),
    );
    let scope = Scope::default().with_local("a", "Oslo").with_local("b", "Rome");

    let bound = compile_in(Dialect::Postgres, &query, &scope);
    assert!(
        bound.sql.ends_with("WHERE \"p\".\"city\" NOT IN ($1, $2)"),
        "{}",
        bound.sql
    );
    assert_eq!(
        bound.params,
        vec![Value::Text("Oslo".into()), Value::Text("Rome".into())]
    );
}

#[test]
fn test_in_generator_is_subquery() {
    let owners = Comprehension::new(name("c").attr("owner").attr("id"))
        .iterate("c", name("Car"))
        .into_node();
    let bound = pg(&names_where(name("p").attr("id").in_(owners)));

    assert!(
        bound
            .sql
            .ends_with("WHERE \"p\".\"id\" IN (SELECT \"c\".\"owner_id\" FROM \"car\" AS \"c\")"),
        "{}",
        bound.sql
    );
}

#[test]
fn test_member_of_collection_reads_foreign_key() {
    let query = QueryRoot::select(name("c").attr("model"))
        .iterate("p", name("Person"))
        .iterate("c", name("Car"))
        .filter(name("c").in_(name("p").attr("cars")));

    let bound = pg(&query);
    assert!(
        bound.sql.ends_with("WHERE \"c\".\"owner_id\" = \"p\".\"id\""),
        "{}",
        bound.sql
    );
}

#[test]
fn test_substring_test_uses_like() {
    let query = names_where(constant("bob").in_(name("p").attr("email")));
    assert!(inline_pg(&query).ends_with("WHERE \"p\".\"email\" LIKE '%bob%'"));

    let bound = pg(&query);
    assert!(bound.sql.contains("\"p\".\"email\" LIKE"), "{}", bound.sql);
    assert_eq!(bound.params, vec![Value::Text("bob".into())]);
}

#[test]
fn test_like_wildcards_are_escaped() {
    let query = names_where(
        name("p")
            .attr("name")
            .method("startswith", vec![constant("50%")]),
    );
    assert!(inline_pg(&query).ends_with("WHERE \"p\".\"name\" LIKE '50!%%' ESCAPE '!'"));
}

const ESCAPED_NEEDLE: &str = "REPLACE(REPLACE(REPLACE($1, '!', '!!'), '%', '!%'), '_', '!_')";

#[test]
fn test_bound_like_needle_is_escaped() {
    let cases = [
        ("startswith", "50%", format!("LIKE {ESCAPED_NEEDLE} || '%' ESCAPE '!'")),
        ("endswith", "_x", format!("LIKE '%' || {ESCAPED_NEEDLE} ESCAPE '!'")),
    ];
    for (method, needle, expected) in cases {
        let query = names_where(
            name("p")
                .attr("name")
                .method(method, vec![constant(needle)]),
        );
        let bound = pg(&query);
        assert!(
            bound.sql.ends_with(&format!("WHERE \"p\".\"name\" {expected}")),
            "{method}: {}",
            bound.sql
        );
        assert_eq!(bound.params, vec![Value::Text(needle.into())]);
    }
}

#[test]
fn test_bound_substring_needle_is_escaped() {
    let query = names_where(constant("a_b").in_(name("p").attr("name")));
    let bound = pg(&query);
    assert!(
        bound.sql.ends_with(&format!(
            "WHERE \"p\".\"name\" LIKE '%' || {ESCAPED_NEEDLE} || '%' ESCAPE '!'"
        )),
        "{}",
        bound.sql
    );
    assert_eq!(bound.params, vec![Value::Text("a_b".into())]);
}

#[test]
fn test_scope_variable_like_needle_is_escaped() {
    let query = names_where(
        name("p")
            .attr("name")
            .method("startswith", vec![name("prefix")]),
    );
    let scope = Scope::default().with_local("prefix", "5%");
    let bound = compile_in(Dialect::Postgres, &query, &scope);
    assert!(bound.sql.contains(ESCAPED_NEEDLE), "{}", bound.sql);
    assert!(bound.sql.ends_with("ESCAPE '!'"));
    assert_eq!(bound.params, vec![Value::Text("5%".into())]);
}

#[test]
fn test_chained_comparison_is_conjunction() {
    let query = names_where(
        constant(18)
            .le(name("p").attr("age"))
            .chain(CmpOp::Lt, constant(65)),
    );

    let bound = pg(&query);
    assert!(
        bound
            .sql
            .ends_with("WHERE $1 <= \"p\".\"age\" AND \"p\".\"age\" < $2"),
        "{}",
        bound.sql
    );
    assert_eq!(bound.params, vec![Value::Int(18), Value::Int(65)]);
}

#[test]
fn test_row_comparison_per_dialect() {
    let query = names_where(
        tuple(vec![name("p").attr("age"), name("p").attr("name")])
            .gt(tuple(vec![name("a"), name("b")])),
    );
    let scope = Scope::default().with_local("a", 30).with_local("b", "M");

    let postgres = compile_in(Dialect::Postgres, &query, &scope);
    assert!(
        postgres
            .sql
            .ends_with("WHERE (\"p\".\"age\", \"p\".\"name\") > ($1, $2)"),
        "{}",
        postgres.sql
    );

    let tsql = compile_in(Dialect::TSql, &query, &scope);
    assert!(
        tsql.sql
            .ends_with("WHERE [p].[age] > @p1 OR [p].[age] = @p1 AND [p].[name] > @p2"),
        "{}",
        tsql.sql
    );
    assert_eq!(
        tsql.named_params(),
        Some(vec![
            ("p1".to_string(), Value::Int(30)),
            ("p2".to_string(), Value::Text("M".into())),
        ])
    );
}

#[test]
fn test_entity_parameter_compares_by_key() {
    let query = QueryRoot::select(name("c").attr("model"))
        .iterate("c", name("Car"))
        .filter(name("c").attr("owner").eq(name("boss")));
    let boss = Value::Entity {
        entity: "Person".into(),
        key: vec![Value::Int(7)],
    };

    let bound = compile_in(Dialect::Postgres, &query, &Scope::default().with_local("boss", boss));
    assert!(
        bound.sql.ends_with("WHERE \"c\".\"owner_id\" = $1"),
        "{}",
        bound.sql
    );
    assert_eq!(bound.params, vec![Value::Int(7)]);
}

#[test]
fn test_boolean_column_truthiness_per_dialect() {
    let query = names_where(name("p").attr("active"));

    assert!(pg(&query).sql.ends_with("WHERE \"p\".\"active\""));
    let tsql = compile_in(Dialect::TSql, &query, &Scope::default());
    assert!(tsql.sql.ends_with("WHERE [p].[active] = 1"), "{}", tsql.sql);
}

#[test]
fn test_selected_predicate_without_boolean_type() {
    let query = QueryRoot::select(name("p").attr("age").gt(constant(30))).iterate("p", name("Person"));

    let tsql = compile_in(Dialect::TSql, &query, &Scope::default());
    assert_eq!(
        tsql.sql,
        "SELECT CASE WHEN [p].[age] > @p1 THEN 1 ELSE 0 END FROM [person] AS [p]"
    );
}

#[test]
fn test_negation_pushed_into_comparison() {
    let bound = pg(&names_where(name("p").attr("age").gt(constant(30)).not()));
    assert!(bound.sql.ends_with("WHERE \"p\".\"age\" <= $1"), "{}", bound.sql);
}

#[test]
fn test_incomparable_types() {
    let err = pg_err(&names_where(name("p").attr("age").eq(constant("x"))));
    match err {
        CompileError::TypeMismatch { message, expr } => {
            assert!(message.contains("Incomparable"), "{message}");
            assert_eq!(expr, "p.age == 'x'");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_ordering_against_none_is_rejected() {
    let err = pg_err(&names_where(name("p").attr("age").lt(none())));
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
}

#[test]
fn test_bitwise_unsupported_on_oracle() {
    let query = names_where(
        name("p")
            .attr("age")
            .binop(comprehend::tree::BinOpKind::BitAnd, constant(1))
            .eq(constant(1)),
    );
    // Both literals share the source text "1" and so one parameter.
    assert!(pg(&query).sql.contains("\"p\".\"age\" & $1 = $1"));
    assert!(matches!(
        compile_err_in(Dialect::Oracle, &query, &Scope::default()),
        CompileError::DialectUnsupportedConstruct { .. }
    ));
}
