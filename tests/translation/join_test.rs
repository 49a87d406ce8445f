//! Join placement, alias allocation and sub-query correlation.

#[path = "../common/mod.rs"]
mod common;

use comprehend::bind::Scope;
use comprehend::sql::Dialect;
use comprehend::tree::{call, constant, name, tuple, Comprehension, QueryRoot};
use comprehend::types::Value;

use common::{compile_in, pg};

#[test]
fn test_reference_chain_joined_once_per_prefix() {
    let employer = || name("p").attr("employer");
    let query = QueryRoot::select(tuple(vec![
        employer().attr("name"),
        employer().attr("country").attr("name"),
        employer().attr("name"),
    ]))
    .iterate("p", name("Person"));

    let bound = pg(&query);
    assert_eq!(
        bound.sql,
        "SELECT \"company\".\"name\", \"country\".\"name\", \"company\".\"name\" \
         FROM \"person\" AS \"p\" \
         LEFT JOIN \"company\" AS \"company\" ON \"p\".\"employer_id\" = \"company\".\"id\" \
         LEFT JOIN \"country\" AS \"country\" ON \"company\".\"country_id\" = \"country\".\"id\""
    );
    assert_eq!(bound.sql.matches("JOIN").count(), 2);
}

#[test]
fn test_key_of_reference_read_from_foreign_key() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("employer").attr("id").eq(constant(5)));

    let bound = pg(&query);
    assert_eq!(
        bound.sql,
        "SELECT \"p\".\"name\" FROM \"person\" AS \"p\" WHERE \"p\".\"employer_id\" = $1"
    );
    assert_eq!(bound.params, vec![Value::Int(5)]);
}

#[test]
fn test_collection_clause_joins_and_deduplicates() {
    let query = QueryRoot::select(name("c").attr("model"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("age").gt(constant(30)))
        .iterate("c", name("p").attr("cars"));

    let bound = pg(&query);
    assert_eq!(
        bound.sql,
        "SELECT DISTINCT \"c\".\"model\" FROM \"person\" AS \"p\" \
         INNER JOIN \"car\" AS \"c\" ON \"p\".\"id\" = \"c\".\"owner_id\" \
         WHERE \"p\".\"age\" > $1"
    );
}

#[test]
fn test_projected_member_key_needs_no_distinct() {
    let query = QueryRoot::select(name("c"))
        .iterate("p", name("Person"))
        .iterate("c", name("p").attr("cars"));

    let bound = pg(&query);
    assert!(bound.sql.starts_with("SELECT \"c\".\"id\""), "{}", bound.sql);
    assert!(!bound.sql.contains("DISTINCT"), "{}", bound.sql);
}

#[test]
fn test_explicit_distinct_override() {
    let query = QueryRoot::select(name("c").attr("model"))
        .iterate("p", name("Person"))
        .iterate("c", name("p").attr("cars"))
        .distinct(false);

    assert!(!pg(&query).sql.contains("DISTINCT"));
}

#[test]
fn test_second_entity_set_is_cross_joined() {
    let query = QueryRoot::select(tuple(vec![name("p").attr("name"), name("c").attr("model")]))
        .iterate("p", name("Person"))
        .iterate("c", name("Car"))
        .filter(name("c").attr("owner").eq(name("p")));

    let bound = pg(&query);
    assert!(
        bound.sql.contains("FROM \"person\" AS \"p\" CROSS JOIN \"car\" AS \"c\""),
        "{}",
        bound.sql
    );
    assert!(
        bound.sql.ends_with("WHERE \"c\".\"owner_id\" = \"p\".\"id\""),
        "{}",
        bound.sql
    );
}

#[test]
fn test_shadowed_variable_gets_fresh_alias() {
    let inner = Comprehension::new(name("p"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("age").gt(constant(90)))
        .into_node();
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(call("exists", vec![inner]));

    let bound = pg(&query);
    assert_eq!(
        bound.sql,
        "SELECT \"p\".\"name\" FROM \"person\" AS \"p\" \
         WHERE EXISTS (SELECT 1 FROM \"person\" AS \"p-2\" WHERE \"p-2\".\"age\" > $1)"
    );
}

#[test]
fn test_aggregate_over_collection_is_correlated() {
    let query = QueryRoot::select(tuple(vec![
        name("p").attr("name"),
        call("count", vec![name("p").attr("cars")]),
    ]))
    .iterate("p", name("Person"));

    let bound = pg(&query);
    assert_eq!(
        bound.sql,
        "SELECT \"p\".\"name\", \
         (SELECT COUNT(DISTINCT \"car\".\"id\") FROM \"car\" AS \"car\" WHERE \"p\".\"id\" = \"car\".\"owner_id\") \
         FROM \"person\" AS \"p\""
    );
    assert!(!bound.sql.contains("GROUP BY"));
}

#[test]
fn test_collection_truthiness_is_exists() {
    let query = QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("cars"));

    let bound = pg(&query);
    assert!(
        bound.sql.ends_with(
            "WHERE EXISTS (SELECT 1 FROM \"car\" AS \"car\" WHERE \"p\".\"id\" = \"car\".\"owner_id\")"
        ),
        "{}",
        bound.sql
    );
}

#[test]
fn test_oracle_aliases_without_as() {
    let query = QueryRoot::select(name("p").attr("employer").attr("name"))
        .iterate("p", name("Person"));

    let bound = compile_in(Dialect::Oracle, &query, &Scope::default());
    assert_eq!(
        bound.sql,
        "SELECT \"company\".\"name\" FROM \"person\" \"p\" \
         LEFT JOIN \"company\" \"company\" ON \"p\".\"employer_id\" = \"company\".\"id\""
    );
}
