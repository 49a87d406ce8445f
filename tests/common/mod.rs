//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use comprehend::bind::Scope;
use comprehend::catalog::{Catalog, SchemaCatalog};
use comprehend::compile::{BoundQuery, Compiler};
use comprehend::config::CompilerSettings;
use comprehend::error::CompileError;
use comprehend::sql::Dialect;
use comprehend::tree::QueryRoot;
use comprehend::types::ValueType;

/// People, their cars, employers and countries, plus a composite-key entity.
pub fn shop() -> SchemaCatalog {
    SchemaCatalog::builder()
        .entity("Person", "person", |e| {
            e.key("id", ValueType::INT)
                .column("name", ValueType::Text)
                .column("age", ValueType::INT)
                .column("city", ValueType::Text)
                .optional("email", ValueType::Text)
                .column("born", ValueType::Date)
                .column("active", ValueType::BOOL)
                .optional_reference("employer", "Company", &["employer_id"])
                .collection("cars", "Car", "owner")
        })
        .entity("Company", "company", |e| {
            e.key("id", ValueType::INT)
                .column("name", ValueType::Text)
                .reference("country", "Country", &["country_id"])
        })
        .entity("Country", "country", |e| {
            e.key("id", ValueType::INT).column("name", ValueType::Text)
        })
        .entity("Car", "car", |e| {
            e.key("id", ValueType::INT)
                .column("model", ValueType::Text)
                .column("price", ValueType::INT)
                .reference("owner", "Person", &["owner_id"])
        })
        .entity("Line", "order_line", |e| {
            e.key("order_no", ValueType::INT)
                .key("line_no", ValueType::INT)
                .column("qty", ValueType::INT)
        })
        .build()
        .expect("fixture catalog")
}

pub fn catalog() -> Arc<dyn Catalog> {
    Arc::new(shop())
}

pub fn compiler(dialect: Dialect) -> Compiler {
    Compiler::with_settings(catalog(), CompilerSettings::default().with_dialect(dialect))
}

/// Compile for Postgres with an empty calling scope.
pub fn pg(query: &QueryRoot) -> BoundQuery {
    compile_in(Dialect::Postgres, query, &Scope::default())
}

pub fn compile_in(dialect: Dialect, query: &QueryRoot, scope: &Scope) -> BoundQuery {
    compiler(dialect)
        .compile(query, scope)
        .unwrap_or_else(|e| panic!("compile failed: {e}"))
}

pub fn pg_err(query: &QueryRoot) -> CompileError {
    compile_err_in(Dialect::Postgres, query, &Scope::default())
}

pub fn compile_err_in(dialect: Dialect, query: &QueryRoot, scope: &Scope) -> CompileError {
    match compiler(dialect).compile(query, scope) {
        Ok(bound) => panic!("expected an error, got {}", bound.sql),
        Err(e) => e,
    }
}
