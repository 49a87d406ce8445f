//! Final SQL text for a translated query.

use super::dialect::{Dialect, ParamStyle, SqlDialect};
use super::query::Query;
use super::token::RenderedSql;

/// Renders queries for one dialect.
///
/// The placeholder style defaults to the dialect's native one.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    dialect: Dialect,
    style: Option<ParamStyle>,
    pretty: bool,
}

impl Renderer {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            style: None,
            pretty: false,
        }
    }

    pub fn with_style(mut self, style: Option<ParamStyle>) -> Self {
        self.style = style;
        self
    }

    /// One clause per line, select items indented.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn style(&self) -> ParamStyle {
        self.style.unwrap_or_else(|| self.dialect.paramstyle())
    }

    pub fn render(&self, query: &Query) -> RenderedSql {
        query
            .to_tokens(self.dialect)
            .render(self.dialect, self.style(), self.pretty)
    }
}
