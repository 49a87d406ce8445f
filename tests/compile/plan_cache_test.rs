//! Plan reuse across bindings, dialects and threads.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::thread;

use comprehend::bind::Scope;
use comprehend::cache::PlanCache;
use comprehend::compile::Compiler;
use comprehend::config::CompilerSettings;
use comprehend::sql::Dialect;
use comprehend::tree::{name, QueryRoot};
use comprehend::types::Value;

use common::{catalog, compiler};

fn older_than() -> QueryRoot {
    QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("age").gt(name("x")))
}

fn with_ids() -> QueryRoot {
    QueryRoot::select(name("p").attr("name"))
        .iterate("p", name("Person"))
        .filter(name("p").attr("id").in_(name("ids")))
}

fn ids(values: &[i64]) -> Scope {
    Scope::default().with_local(
        "ids",
        Value::List(values.iter().map(|v| Value::Int(*v)).collect()),
    )
}

#[test]
fn test_rebinding_reuses_plan() {
    let compiler = compiler(Dialect::Postgres);
    let first = compiler
        .compile(&older_than(), &Scope::default().with_local("x", 30))
        .unwrap();
    let second = compiler
        .compile(&older_than(), &Scope::default().with_local("x", 40))
        .unwrap();

    assert_eq!(first.sql, second.sql);
    assert_eq!(first.params, vec![Value::Int(30)]);
    assert_eq!(second.params, vec![Value::Int(40)]);

    let stats = compiler.cache().unwrap().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.plans, 1);
    assert_eq!(stats.prepared, 1);
}

#[test]
fn test_set_length_is_part_of_plan_key() {
    let compiler = compiler(Dialect::Postgres);
    let two = compiler.compile(&with_ids(), &ids(&[1, 2])).unwrap();
    let three = compiler.compile(&with_ids(), &ids(&[1, 2, 3])).unwrap();
    let two_again = compiler.compile(&with_ids(), &ids(&[8, 9])).unwrap();

    assert!(two.sql.ends_with("IN ($1, $2)"));
    assert!(three.sql.ends_with("IN ($1, $2, $3)"));
    assert_eq!(two.sql, two_again.sql);
    assert_eq!(two_again.params, vec![Value::Int(8), Value::Int(9)]);

    let stats = compiler.cache().unwrap().stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.plans, 2);
}

#[test]
fn test_value_type_is_part_of_plan_key() {
    let compiler = compiler(Dialect::Postgres);
    compiler
        .compile(&older_than(), &Scope::default().with_local("x", 30))
        .unwrap();
    compiler
        .compile(&older_than(), &Scope::default().with_local("x", 30.5))
        .unwrap();

    let stats = compiler.cache().unwrap().stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.plans, 2);
}

#[test]
fn test_shared_cache_keys_by_dialect() {
    let cache = Arc::new(PlanCache::default());
    let pg = compiler(Dialect::Postgres).with_cache(Arc::clone(&cache));
    let tsql = compiler(Dialect::TSql).with_cache(Arc::clone(&cache));
    let scope = Scope::default().with_local("x", 30);

    let a = pg.compile(&older_than(), &scope).unwrap();
    let b = tsql.compile(&older_than(), &scope).unwrap();
    assert_ne!(a.sql, b.sql);
    assert!(b.sql.contains("@p1"));

    let stats = cache.stats();
    assert_eq!(stats.prepared, 1);
    assert_eq!(stats.plans, 2);
    assert_eq!(stats.misses, 2);
}

#[test]
fn test_inline_constants_is_part_of_plan_key() {
    let cache = Arc::new(PlanCache::default());
    let bound = |inline: bool| {
        let settings = CompilerSettings::default().with_inline_constants(inline);
        Compiler::with_settings(catalog(), settings)
            .with_cache(Arc::clone(&cache))
            .compile(&older_than(), &Scope::default().with_local("x", 30))
            .unwrap()
    };

    bound(false);
    bound(true);
    assert_eq!(cache.stats().plans, 2);
}

#[test]
fn test_disabled_cache() {
    let settings = CompilerSettings::default().without_plan_cache();
    let compiler = Compiler::with_settings(catalog(), settings);
    assert!(compiler.cache().is_none());

    let bound = compiler
        .compile(&older_than(), &Scope::default().with_local("x", 30))
        .unwrap();
    assert_eq!(bound.params, vec![Value::Int(30)]);
}

#[test]
fn test_full_cache_is_cleared() {
    let settings = CompilerSettings {
        plan_cache: comprehend::config::PlanCacheSettings {
            enabled: true,
            max_entries: 2,
        },
        ..CompilerSettings::default()
    };
    let compiler = Compiler::with_settings(catalog(), settings);

    compiler.compile(&with_ids(), &ids(&[1])).unwrap();
    compiler.compile(&with_ids(), &ids(&[1, 2])).unwrap();
    assert_eq!(compiler.cache().unwrap().stats().plans, 2);

    compiler.compile(&with_ids(), &ids(&[1, 2, 3])).unwrap();
    assert_eq!(compiler.cache().unwrap().stats().plans, 1);
}

#[test]
fn test_failed_binding_leaves_cache_usable() {
    let compiler = compiler(Dialect::Postgres);
    assert!(compiler.compile(&older_than(), &Scope::default()).is_err());

    let bound = compiler
        .compile(&older_than(), &Scope::default().with_local("x", 30))
        .unwrap();
    assert_eq!(bound.params, vec![Value::Int(30)]);
    assert_eq!(compiler.cache().unwrap().stats().plans, 1);
}

#[test]
fn test_compiler_shared_between_threads() {
    let compiler = Arc::new(compiler(Dialect::Postgres));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let compiler = Arc::clone(&compiler);
            thread::spawn(move || {
                compiler
                    .compile(&older_than(), &Scope::default().with_local("x", i))
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (i, bound) in results.iter().enumerate() {
        assert_eq!(bound.sql, results[0].sql);
        assert_eq!(bound.params, vec![Value::Int(i as i64)]);
    }

    let stats = compiler.cache().unwrap().stats();
    assert_eq!(stats.plans, 1);
    assert_eq!(stats.prepared, 1);
    assert_eq!(stats.hits + stats.misses, 8);
}
