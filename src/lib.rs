//! # comprehend
//!
//! Compiles comprehension-style query expressions into dialect-specific SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          QueryRoot (expression tree, builder API)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [classify]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Annotated tree + maximal external sub-expressions      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [bind] (calling scope)
//! ┌─────────────────────────────────────────────────────────┐
//! │              ParameterTable (typed values)               │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [translate] (catalog, dialect)
//! ┌─────────────────────────────────────────────────────────┐
//! │        Typed nodes → table registry → SQL Query          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [render]
//! ┌─────────────────────────────────────────────────────────┐
//! │            SQL text + ordered parameter list             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`compile::Compiler`] runs the pipeline and caches classified queries and
//! rendered plans, so a repeated query only re-runs the binder.

pub mod bind;
pub mod cache;
pub mod catalog;
pub mod classify;
pub mod compile;
pub mod config;
pub mod error;
pub mod functions;
pub mod sql;
pub mod translate;
pub mod tree;
pub mod types;

pub use sql::dialect;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::bind::{QueryId, Scope};
    pub use crate::catalog::{Catalog, EntityId, SchemaCatalog};
    pub use crate::compile::{BoundQuery, CompiledPlan, Compiler, PreparedQuery};
    pub use crate::config::CompilerSettings;
    pub use crate::error::{CompileError, CompileResult};
    pub use crate::sql::dialect::{Dialect, ParamStyle, SqlDialect};
    pub use crate::tree::{ExprNode, QueryRoot};
    pub use crate::types::{Value, ValueType};
}

// Also export at crate root for convenience
pub use compile::{compile, BoundQuery, Compiler};
pub use error::{CompileError, CompileResult};
pub use sql::Dialect;
