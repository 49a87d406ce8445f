//! SELECT statement AST.
//!
//! A [`Query`] is assembled with `#[must_use]` builder methods and rendered
//! with [`Query::to_tokens`]. Clause order and line breaks are fixed; compact
//! rendering turns every break into a single space.

use super::dialect::{Dialect, ParamStyle, SqlDialect};
use super::expr::{and_all, Expr};
use super::token::{Token, TokenStream};

// =============================================================================
// SELECT list
// =============================================================================

/// One item of the SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens(dialect);
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

// =============================================================================
// FROM and JOIN
// =============================================================================

/// A table with an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.table.clone()));
        if let Some(alias) = &self.alias {
            ts.space();
            if dialect.table_alias_keyword() {
                ts.push(Token::As).space();
            }
            ts.push(Token::Ident(alias.clone()));
        }
        ts
    }
}

/// Join kinds produced by the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    /// Join condition; ignored for CROSS JOIN.
    pub on: Option<Expr>,
}

impl Join {
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self.join_type {
            JoinType::Inner => ts.push(Token::Inner),
            JoinType::Left => ts.push(Token::Left),
            JoinType::Cross => ts.push(Token::Cross),
        };
        ts.space()
            .push(Token::Join)
            .space()
            .append(&self.table.to_tokens(dialect));
        match (&self.on, self.join_type) {
            (_, JoinType::Cross) => {}
            (Some(on), _) => {
                ts.space()
                    .push(Token::On)
                    .space()
                    .append(&on.to_tokens(dialect));
            }
            // Keeps the statement well-formed for a key-less join
            (None, _) => {
                ts.space()
                    .push(Token::On)
                    .space()
                    .append(&Expr::And(Vec::new()).to_tokens(dialect));
            }
        }
        ts
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: SortDir,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Desc,
        }
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens(dialect);
        if self.dir == SortDir::Desc {
            ts.space().push(Token::Desc);
        }
        ts
    }
}

// =============================================================================
// Query
// =============================================================================

/// A SELECT statement.
///
/// `where_clause` and `having` hold conjuncts; they are joined with AND when
/// rendered, so pushing a condition never has to rebuild the tree.
#[derive(Debug, Clone, PartialEq, Default)]
#[must_use]
pub struct Query {
    pub distinct: bool,
    pub select: Vec<SelectExpr>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Vec<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select.extend(exprs.into_iter().map(Into::into));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Option<Expr>) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            on,
        });
        self
    }

    pub fn left_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Left, table, Some(on))
    }

    pub fn cross_join(self, table: TableRef) -> Self {
        self.join(JoinType::Cross, table, None)
    }

    /// Add a WHERE conjunct. Nested conjunctions are flattened.
    pub fn filter(mut self, condition: Expr) -> Self {
        push_conjunct(&mut self.where_clause, condition);
        self
    }

    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by.extend(exprs);
        self
    }

    /// Add a HAVING conjunct.
    pub fn having(mut self, condition: Expr) -> Self {
        push_conjunct(&mut self.having, condition);
        self
    }

    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by.extend(exprs);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Convert to tokens for `dialect`.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        // SELECT
        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }
        if self.select.is_empty() {
            ts.newline().indent(1).push(Token::Star);
        }
        for (i, select_expr) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.newline()
                .indent(1)
                .append(&select_expr.to_tokens(dialect));
        }

        // FROM
        if let Some(from) = &self.from {
            ts.newline()
                .push(Token::From)
                .space()
                .append(&from.to_tokens(dialect));
        }

        // JOINs
        for join in &self.joins {
            ts.newline().append(&join.to_tokens(dialect));
        }

        // WHERE
        if !self.where_clause.is_empty() {
            ts.newline()
                .push(Token::Where)
                .space()
                .append(&and_all(self.where_clause.iter().cloned()).to_tokens(dialect));
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens(dialect));
            }
        }

        // HAVING
        if !self.having.is_empty() {
            ts.newline()
                .push(Token::Having)
                .space()
                .append(&and_all(self.having.iter().cloned()).to_tokens(dialect));
        }

        // ORDER BY
        let paginated = self.limit.is_some() || self.offset.is_some();
        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            for (i, order_expr) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order_expr.to_tokens(dialect));
            }
        } else if paginated && dialect.requires_order_by_for_offset() {
            // OFFSET/FETCH needs an ORDER BY; row order stays unspecified.
            ts.newline()
                .push(Token::OrderBy)
                .space()
                .lparen()
                .push(Token::Select)
                .space()
                .push(Token::Null)
                .rparen();
        }

        // LIMIT / OFFSET
        if paginated {
            ts.newline()
                .append(&dialect.emit_limit_offset(self.limit, self.offset));
        }

        ts
    }

    /// Single-line SQL text with `?` placeholders.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect)
            .render(dialect, ParamStyle::Qmark, false)
            .sql
    }
}

fn push_conjunct(list: &mut Vec<Expr>, condition: Expr) {
    match condition {
        Expr::And(items) => list.extend(items),
        other => list.push(other),
    }
}

// =============================================================================
// Tests
// =============================================================================
