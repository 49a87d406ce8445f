//! Aggregates: grouping, HAVING placement, correlated sub-queries and the
//! per-dialect ordered-set and composite-key forms.

#[path = "../common/mod.rs"]
mod common;

use comprehend::bind::Scope;
use comprehend::error::CompileError;
use comprehend::sql::Dialect;
use comprehend::tree::{all, any, call, constant, name, tuple, Comprehension, QueryRoot};
use comprehend::types::{Value, ValueType};

use common::{compile_err_in, compile_in, pg, pg_err};

fn people() -> QueryRoot {
    QueryRoot::select(name("p")).iterate("p", name("Person"))
}

fn select_over_people(elt: comprehend::tree::ExprNode) -> QueryRoot {
    QueryRoot::select(elt).iterate("p", name("Person"))
}

#[test]
fn test_nested_aggregate_is_ambiguous() {
    let query = select_over_people(call(
        "sum",
        vec![call("count", vec![name("p").attr("id")])],
    ));

    let err = pg_err(&query);
    assert!(
        matches!(err, CompileError::AmbiguousAggregation { .. }),
        "{err:?}"
    );
    assert_eq!(err.expr(), Some("sum(count(p.id))"));
}

#[test]
fn test_aggregate_over_aggregated_subquery_is_ambiguous() {
    let inner = Comprehension::new(call("count", vec![name("c")]))
        .iterate("c", name("p").attr("cars"))
        .into_node();
    let query = select_over_people(call("max", vec![inner]));

    assert!(matches!(
        pg_err(&query),
        CompileError::AmbiguousAggregation { .. }
    ));
}

#[test]
fn test_mixing_aggregate_and_row_condition_under_or() {
    let query = people().filter(any(vec![
        call("count", vec![]).gt(constant(2)),
        name("p").attr("age").gt(constant(18)),
    ]));

    assert!(matches!(
        pg_err(&query),
        CompileError::AmbiguousAggregation { .. }
    ));
}

#[test]
fn test_entity_beside_aggregate_groups_by_every_column() {
    let query = QueryRoot::select(tuple(vec![name("k"), call("count", vec![])]))
        .iterate("k", name("Country"));

    let bound = pg(&query);
    assert!(bound.sql.contains("COUNT(*)"), "{}", bound.sql);
    assert!(
        bound.sql.ends_with("GROUP BY \"k\".\"id\", \"k\".\"name\""),
        "{}",
        bound.sql
    );
}

#[test]
fn test_conjunction_split_between_where_and_having() {
    let query = select_over_people(tuple(vec![name("p").attr("city"), call("count", vec![])]))
        .filter(all(vec![
            call("count", vec![]).gt(constant(2)),
            name("p").attr("age").gt(constant(18)),
        ]));

    let bound = pg(&query);
    assert_eq!(
        bound.sql,
        "SELECT \"p\".\"city\", COUNT(*) FROM \"person\" AS \"p\" \
         WHERE \"p\".\"age\" > $1 GROUP BY \"p\".\"city\" HAVING COUNT(*) > $2"
    );
    assert_eq!(bound.params, vec![Value::Int(18), Value::Int(2)]);
}

#[test]
fn test_count_of_entity_counts_distinct_keys() {
    let bound = pg(&select_over_people(call("count", vec![name("p")])));
    assert_eq!(
        bound.sql,
        "SELECT COUNT(DISTINCT \"p\".\"id\") FROM \"person\" AS \"p\""
    );
    assert_eq!(bound.result_type, ValueType::INT);
}

#[test]
fn test_count_distinct_can_be_disabled() {
    let count = call("count", vec![name("p")]).keyword("distinct", constant(false));
    let bound = pg(&select_over_people(count));
    assert_eq!(bound.sql, "SELECT COUNT(\"p\".\"id\") FROM \"person\" AS \"p\"");
}

#[test]
fn test_count_of_flag_counts_true_rows() {
    let bound = pg(&select_over_people(call("count", vec![name("p").attr("active")])));
    assert_eq!(
        bound.sql,
        "SELECT COUNT(CASE WHEN \"p\".\"active\" THEN 1 END) FROM \"person\" AS \"p\""
    );
}

#[test]
fn test_sum_of_flag_casts_to_integer() {
    let bound = pg(&select_over_people(call("sum", vec![name("p").attr("active")])));
    assert_eq!(
        bound.sql,
        "SELECT SUM(CAST(\"p\".\"active\" AS INTEGER)) FROM \"person\" AS \"p\""
    );
    assert_eq!(bound.result_type, ValueType::INT);
}

#[test]
fn test_composite_key_count_per_dialect() {
    let query = QueryRoot::select(call("count", vec![name("l")])).iterate("l", name("Line"));

    let postgres = pg(&query);
    assert_eq!(
        postgres.sql,
        "SELECT COUNT(DISTINCT (\"l\".\"order_no\", \"l\".\"line_no\")) FROM \"order_line\" AS \"l\""
    );

    let mysql = compile_in(Dialect::MySql, &query, &Scope::default());
    assert_eq!(
        mysql.sql,
        "SELECT COUNT(DISTINCT `l`.`order_no`, `l`.`line_no`) FROM `order_line` AS `l`"
    );

    let err = compile_err_in(Dialect::Sqlite, &query, &Scope::default());
    match err {
        CompileError::UnsupportedCompositeAggregate { entity, .. } => assert_eq!(entity, "Line"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_method_aggregate_on_collection() {
    let query = select_over_people(tuple(vec![
        name("p").attr("name"),
        name("p").attr("cars").method("count", vec![]),
    ]));

    let bound = pg(&query);
    assert!(
        bound.sql.contains(
            "(SELECT COUNT(DISTINCT \"car\".\"id\") FROM \"car\" AS \"car\" \
             WHERE \"p\".\"id\" = \"car\".\"owner_id\")"
        ),
        "{}",
        bound.sql
    );
}

#[test]
fn test_aggregate_over_generator_is_correlated() {
    let prices = Comprehension::new(name("c").attr("price"))
        .iterate("c", name("p").attr("cars"))
        .into_node();
    let query = select_over_people(tuple(vec![
        name("p").attr("name"),
        call("sum", vec![prices]),
    ]));

    let bound = pg(&query);
    assert_eq!(
        bound.sql,
        "SELECT \"p\".\"name\", \
         (SELECT SUM(\"c\".\"price\") FROM \"car\" AS \"c\" WHERE \"p\".\"id\" = \"c\".\"owner_id\") \
         FROM \"person\" AS \"p\""
    );
}

#[test]
fn test_median_uses_within_group() {
    let query = select_over_people(call("median", vec![name("p").attr("age")]));

    let bound = pg(&query);
    assert!(
        bound
            .sql
            .contains("PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY \"p\".\"age\")"),
        "{}",
        bound.sql
    );

    let err = compile_err_in(Dialect::MySql, &query, &Scope::default());
    assert!(matches!(
        err,
        CompileError::DialectUnsupportedConstruct { .. }
    ));
}

#[test]
fn test_mode_per_dialect() {
    let query = select_over_people(call("mode", vec![name("p").attr("city")]));

    assert!(pg(&query)
        .sql
        .contains("MODE() WITHIN GROUP (ORDER BY \"p\".\"city\")"));

    let oracle = compile_in(Dialect::Oracle, &query, &Scope::default());
    assert!(oracle.sql.contains("STATS_MODE(\"p\".\"city\")"), "{}", oracle.sql);

    let err = compile_err_in(Dialect::Sqlite, &query, &Scope::default());
    match err {
        CompileError::DialectUnsupportedConstruct {
            dialect, construct, ..
        } => {
            assert_eq!(dialect, "sqlite");
            assert_eq!(construct, "mode()");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_string_aggregation_per_dialect() {
    let query = select_over_people(call(
        "group_concat",
        vec![name("p").attr("name"), constant("; ")],
    ));

    assert!(pg(&query).sql.contains("STRING_AGG(\"p\".\"name\", '; ')"));

    let mysql = compile_in(Dialect::MySql, &query, &Scope::default());
    assert!(
        mysql.sql.contains("GROUP_CONCAT(`p`.`name` SEPARATOR '; ')"),
        "{}",
        mysql.sql
    );
}

#[test]
fn test_statistical_aggregate_unsupported_on_sqlite() {
    let query = select_over_people(call("stddev", vec![name("p").attr("age")]));

    assert!(pg(&query).sql.contains("STDDEV_SAMP(\"p\".\"age\")"));
    assert!(matches!(
        compile_err_in(Dialect::Sqlite, &query, &Scope::default()),
        CompileError::DialectUnsupportedConstruct { .. }
    ));
}

#[test]
fn test_min_with_two_arguments_is_scalar() {
    let query = select_over_people(call(
        "min",
        vec![name("p").attr("age"), constant(65)],
    ));

    let bound = pg(&query);
    assert_eq!(bound.sql, "SELECT LEAST(\"p\".\"age\", $1) FROM \"person\" AS \"p\"");
    assert!(!bound.sql.contains("GROUP BY"));
}
