//! SQL statement model, dialects and rendering.
//!
//! Queries are built as [`Query`] trees of [`Expr`] nodes, lowered to a
//! [`TokenStream`] for a [`Dialect`], then rendered with a [`ParamStyle`].
//!
//! ```ignore
//! use comprehend::sql::*;
//!
//! let query = Query::new()
//!     .select(vec![table_col("p", "name")])
//!     .from(TableRef::new("person").with_alias("p"))
//!     .filter(table_col("p", "age").gt(param("age", 0)));
//!
//! let sql = query.to_sql(Dialect::Postgres);
//! ```

pub mod builder;
pub mod dialect;
pub mod expr;
pub mod query;
pub mod render;
pub mod test_utils;
pub mod token;

pub use builder::SelectPlan;
pub use dialect::{Dialect, ParamStyle, SqlDialect};
pub use expr::{
    aggregate, and_all, case_when, cast, col, count_star, func, lit_bool, lit_float, lit_int,
    lit_null, lit_str, or_all, param, row, star, table_col, BinaryOperator, Expr, ExprExt,
    Literal, UnaryOperator,
};
pub use query::{Join, JoinType, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use render::Renderer;
pub use token::{ParamSlot, RenderedSql, Token, TokenStream};
