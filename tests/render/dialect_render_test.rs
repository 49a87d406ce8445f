//! Placeholder styles, quoting and pagination per dialect.

#[path = "../common/mod.rs"]
mod common;

use comprehend::bind::Scope;
use comprehend::compile::{BoundQuery, Compiler};
use comprehend::config::CompilerSettings;
use comprehend::sql::dialect::{ParamStyle, SqlDialect};
use comprehend::sql::test_utils::validate_sql;
use comprehend::sql::Dialect;
use comprehend::tree::{constant, name, QueryRoot};
use comprehend::types::Value;

use common::{catalog, compile_in};

fn two_params() -> QueryRoot {
    QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("age").gt(name("x")))
        .filter(name("p").attr("city").eq(name("town")))
}

fn scope() -> Scope {
    Scope::default().with_local("x", 30).with_local("town", "Oslo")
}

fn compile_with(settings: CompilerSettings, query: &QueryRoot) -> BoundQuery {
    Compiler::with_settings(catalog(), settings)
        .compile(query, &scope())
        .unwrap_or_else(|e| panic!("compile failed: {e}"))
}

#[test]
fn test_native_placeholders() {
    let cases = [
        (
            Dialect::Postgres,
            "SELECT \"p\".\"name\" FROM \"person\" AS \"p\" WHERE \"p\".\"age\" > $1 AND \"p\".\"city\" = $2",
        ),
        (
            Dialect::DuckDb,
            "SELECT \"p\".\"name\" FROM \"person\" AS \"p\" WHERE \"p\".\"age\" > ? AND \"p\".\"city\" = ?",
        ),
        (
            Dialect::Sqlite,
            "SELECT \"p\".\"name\" FROM \"person\" AS \"p\" WHERE \"p\".\"age\" > ? AND \"p\".\"city\" = ?",
        ),
        (
            Dialect::MySql,
            "SELECT `p`.`name` FROM `person` AS `p` WHERE `p`.`age` > %s AND `p`.`city` = %s",
        ),
        (
            Dialect::TSql,
            "SELECT [p].[name] FROM [person] AS [p] WHERE [p].[age] > @p1 AND [p].[city] = @p2",
        ),
        (
            Dialect::Oracle,
            "SELECT \"p\".\"name\" FROM \"person\" \"p\" WHERE \"p\".\"age\" > :p1 AND \"p\".\"city\" = :p2",
        ),
    ];

    for (dialect, expected) in cases {
        let bound = compile_in(dialect, &two_params(), &scope());
        assert_eq!(bound.sql, expected, "{dialect}");
        assert_eq!(bound.style, dialect.paramstyle());
        assert_eq!(
            bound.params,
            vec![Value::Int(30), Value::Text("Oslo".into())],
            "{dialect}"
        );
    }
}

#[test]
fn test_numbered_style_reuses_placeholder() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("age").gt(name("x")))
        .filter(name("p").attr("id").ne(name("x")));

    let bound = compile_in(Dialect::Postgres, &query, &scope());
    assert!(bound
        .sql
        .ends_with("WHERE \"p\".\"age\" > $1 AND \"p\".\"id\" <> $1"));
    assert_eq!(bound.params, vec![Value::Int(30)]);

    let bound = compile_in(Dialect::Sqlite, &query, &scope());
    assert_eq!(bound.sql.matches('?').count(), 2);
    assert_eq!(bound.params, vec![Value::Int(30), Value::Int(30)]);
}

#[test]
fn test_style_override() {
    let settings = CompilerSettings::default()
        .with_dialect(Dialect::Postgres)
        .with_paramstyle(ParamStyle::Named);
    let bound = compile_with(settings, &two_params());

    assert!(bound.sql.ends_with("\"p\".\"age\" > :p1 AND \"p\".\"city\" = :p2"));
    assert_eq!(
        bound.named_params(),
        Some(vec![
            ("p1".to_string(), Value::Int(30)),
            ("p2".to_string(), Value::Text("Oslo".into())),
        ])
    );
}

#[test]
fn test_format_style_escapes_percent() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(
            name("p")
                .attr("name")
                .method("startswith", vec![constant("50%")]),
        );
    let settings = CompilerSettings::default()
        .with_dialect(Dialect::MySql)
        .with_inline_constants(true);
    let bound = compile_with(settings, &query);

    assert!(bound.sql.contains("LIKE '50!%%%%' ESCAPE '!'"), "{}", bound.sql);
    assert!(bound.params.is_empty());
}

fn paged(limit: Option<u64>, offset: Option<u64>, ordered: bool) -> QueryRoot {
    let mut query = QueryRoot::select(name("p").attr("name")).iterate("p", name("Person"));
    if ordered {
        query = query.order_by(name("p").attr("name"));
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    if let Some(offset) = offset {
        query = query.offset(offset);
    }
    query
}

#[test]
fn test_limit_and_offset_per_dialect() {
    let query = paged(Some(10), Some(20), true);
    let sql = |d| compile_in(d, &query, &Scope::default()).sql;

    assert!(sql(Dialect::Postgres).ends_with("ORDER BY \"p\".\"name\" LIMIT 10 OFFSET 20"));
    assert!(sql(Dialect::Sqlite).ends_with("LIMIT 10 OFFSET 20"));
    assert!(sql(Dialect::TSql).ends_with("ORDER BY [p].[name] OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"));
    assert!(sql(Dialect::Oracle).ends_with("OFFSET 20 ROWS FETCH FIRST 10 ROWS ONLY"));
}

#[test]
fn test_tsql_pagination_without_order_by() {
    let bound = compile_in(Dialect::TSql, &paged(Some(5), None, false), &Scope::default());
    assert_eq!(
        bound.sql,
        "SELECT [p].[name] FROM [person] AS [p] ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"
    );
}

#[test]
fn test_offset_alone_needs_limit_on_mysql_and_sqlite() {
    let query = paged(None, Some(5), false);
    let expected = format!("LIMIT {} OFFSET 5", i64::MAX);
    for dialect in [Dialect::MySql, Dialect::Sqlite] {
        let bound = compile_in(dialect, &query, &Scope::default());
        assert!(bound.sql.ends_with(&expected), "{dialect}: {}", bound.sql);
    }
    let bound = compile_in(Dialect::Postgres, &query, &Scope::default());
    assert!(bound.sql.ends_with("FROM \"person\" AS \"p\" OFFSET 5"));
}

#[test]
fn test_descending_order() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .order_by_desc(name("p").attr("age"));
    let bound = compile_in(Dialect::Postgres, &query, &Scope::default());
    assert!(bound.sql.ends_with("ORDER BY \"p\".\"age\" DESC"));
}

#[test]
fn test_pretty_output() {
    let settings = CompilerSettings::default()
        .with_dialect(Dialect::Postgres)
        .with_pretty(true);
    let bound = compile_with(settings, &two_params());
    assert_eq!(
        bound.sql,
        "SELECT\n  \"p\".\"name\"\nFROM \"person\" AS \"p\"\nWHERE \"p\".\"age\" > $1 AND \"p\".\"city\" = $2"
    );
}

#[test]
fn test_pretty_and_compact_plans_differ() {
    let compact = compile_in(Dialect::Postgres, &two_params(), &scope());
    let pretty = compile_with(
        CompilerSettings::default().with_pretty(true),
        &two_params(),
    );
    assert_ne!(compact.sql, pretty.sql);
    assert_eq!(compact.sql, pretty.sql.replace("\n  ", " ").replace('\n', " "));
}

#[test]
fn test_generated_sql_parses() {
    let queries = [
        two_params(),
        paged(Some(10), Some(20), true),
        QueryRoot::select(name("p").attr("employer").attr("name"))
            .iterate("p", name("Person"))
            .filter(name("p").attr("id").in_(name("ids"))),
    ];
    let scope = scope().with_local("ids", Value::List(vec![Value::Int(1), Value::Int(2)]));

    for dialect in Dialect::ALL {
        let settings = CompilerSettings::default()
            .with_dialect(dialect)
            .with_paramstyle(ParamStyle::Qmark);
        let compiler = Compiler::with_settings(catalog(), settings);
        for query in &queries {
            let bound = compiler
                .compile(query, &scope)
                .unwrap_or_else(|e| panic!("{dialect}: {e}"));
            validate_sql(&bound.sql, dialect).unwrap_or_else(|e| panic!("{e}"));
        }
    }
}
