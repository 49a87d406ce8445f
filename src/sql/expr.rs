//! Expression AST - the scalar half of the SQL syntax tree.
//!
//! Every variant is handled by an exhaustive match in [`Expr::to_tokens`].
//! The dialect is threaded through the whole walk, so nested expressions are
//! rendered with the same rules as their parent. Parentheses are inserted
//! from operator precedence; the builder never has to add [`Expr::Paren`]
//! to get correct grouping.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::dialect::{Dialect, ParamStyle, SqlDialect};
use super::query::{Query, SelectExpr};
use super::token::{ParamSlot, Token, TokenStream};
use crate::functions::DatePart;
use crate::types::Value;

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: `alias.column`
    Column {
        table: Option<String>,
        column: String,
    },

    Literal(Literal),

    /// Placeholder for one scalar of a bound parameter.
    Param(ParamSlot),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// N-ary conjunction. Empty renders as an always-true predicate.
    And(Vec<Expr>),

    /// N-ary disjunction. Empty renders as an always-false predicate.
    Or(Vec<Expr>),

    Not(Box<Expr>),

    /// Arithmetic unary operation: op expr
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Function call: name([DISTINCT] args...)
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// Ordered-set aggregate: name(args) WITHIN GROUP (ORDER BY order_by)
    WithinGroup {
        name: String,
        args: Vec<Expr>,
        order_by: Box<Expr>,
    },

    /// String aggregation, spelled per dialect.
    StringAgg {
        expr: Box<Expr>,
        separator: Box<Expr>,
        distinct: bool,
    },

    /// Most frequent value, spelled per dialect.
    Mode(Box<Expr>),

    /// Date/time component extraction, spelled per dialect.
    Extract { part: DatePart, expr: Box<Expr> },

    /// CAST(expr AS type)
    Cast { expr: Box<Expr>, type_name: String },

    /// CASE [operand] WHEN ... THEN ... ELSE ... END
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// Row value: (a, b, ...)
    Row(Vec<Expr>),

    /// IN: expr IN (values...)
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// IN subquery: expr IN (SELECT ...)
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
        negated: bool,
    },

    /// [NOT] EXISTS (SELECT ...)
    Exists { subquery: Box<Query>, negated: bool },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// expr [NOT] LIKE pattern [ESCAPE 'c']
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<char>,
        negated: bool,
    },

    /// Scalar subquery: (SELECT ...)
    Subquery(Box<Query>),

    /// Wildcard: * or alias.*
    Star { table: Option<String> },

    /// Explicit parentheses.
    Paren(Box<Expr>),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    /// Canonical decimal text.
    Decimal(String),
    String(String),
    Bool(bool),
    Null,
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Bytes(Vec<u8>),
    /// Microseconds.
    Interval(i64),
}

impl Literal {
    /// Literal for a scalar runtime value. Composite values have no literal form.
    pub fn from_value(value: &Value) -> Option<Literal> {
        let lit = match value {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(*b),
            Value::Int(n) => Literal::Int(*n),
            Value::Float(f) => Literal::Float(*f),
            Value::Decimal(s) => Literal::Decimal(s.clone()),
            Value::Text(s) => Literal::String(s.clone()),
            Value::Date(d) => Literal::Date(*d),
            Value::Time(t) => Literal::Time(*t),
            Value::DateTime(dt) => Literal::DateTime(*dt),
            Value::Interval(us) => Literal::Interval(*us),
            Value::Bytes(b) => Literal::Bytes(b.clone()),
            Value::Tuple(_)
            | Value::List(_)
            | Value::EntitySet(_)
            | Value::Entity { .. }
            | Value::Map(_) => return None,
        };
        Some(lit)
    }

    fn is_negative(&self) -> bool {
        match self {
            Literal::Int(n) => *n < 0,
            Literal::Float(f) => *f < 0.0,
            Literal::Decimal(s) => s.starts_with('-'),
            Literal::Interval(us) => *us < 0,
            _ => false,
        }
    }

    fn to_token(&self) -> Token {
        match self {
            Literal::Int(n) => Token::LitInt(*n),
            Literal::Float(f) => Token::LitFloat(*f),
            Literal::Decimal(s) => Token::LitDecimal(s.clone()),
            Literal::String(s) => Token::LitString(s.clone()),
            Literal::Bool(b) => Token::LitBool(*b),
            Literal::Null => Token::LitNull,
            Literal::Date(d) => Token::LitDate(*d),
            Literal::Time(t) => Token::LitTime(*t),
            Literal::DateTime(dt) => Token::LitTimestamp(*dt),
            Literal::Bytes(b) => Token::LitBytes(b.clone()),
            Literal::Interval(us) => Token::LitInterval(*us),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,

    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
    Mod,

    // String
    Concat,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
}

impl BinaryOperator {
    fn to_token(self) -> Token {
        match self {
            BinaryOperator::Eq => Token::Eq,
            BinaryOperator::Ne => Token::Ne,
            BinaryOperator::Lt => Token::Lt,
            BinaryOperator::Gt => Token::Gt,
            BinaryOperator::Lte => Token::Lte,
            BinaryOperator::Gte => Token::Gte,
            BinaryOperator::Plus => Token::Plus,
            BinaryOperator::Minus => Token::Minus,
            BinaryOperator::Mul => Token::Mul,
            BinaryOperator::Div => Token::Div,
            BinaryOperator::Mod => Token::Mod,
            BinaryOperator::Concat => Token::Concat,
            BinaryOperator::BitAnd => Token::BitAnd,
            BinaryOperator::BitOr => Token::BitOr,
            BinaryOperator::BitXor => Token::BitXor,
            BinaryOperator::ShiftLeft => Token::ShiftLeft,
            BinaryOperator::ShiftRight => Token::ShiftRight,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Lt
                | BinaryOperator::Gt
                | BinaryOperator::Lte
                | BinaryOperator::Gte
        )
    }

    /// Operator giving the logical negation of a comparison.
    pub fn negated(self) -> Option<BinaryOperator> {
        let op = match self {
            BinaryOperator::Eq => BinaryOperator::Ne,
            BinaryOperator::Ne => BinaryOperator::Eq,
            BinaryOperator::Lt => BinaryOperator::Gte,
            BinaryOperator::Gte => BinaryOperator::Lt,
            BinaryOperator::Gt => BinaryOperator::Lte,
            BinaryOperator::Lte => BinaryOperator::Gt,
            _ => return None,
        };
        Some(op)
    }

    fn precedence(self, dialect: Dialect) -> Precedence {
        match self {
            op if op.is_comparison() => Precedence::Comparison,
            BinaryOperator::Plus | BinaryOperator::Minus => Precedence::Additive,
            BinaryOperator::Concat if dialect.supports_concat_operator() => Precedence::Additive,
            BinaryOperator::Concat => Precedence::Atom,
            BinaryOperator::Mod if dialect.mod_as_function() => Precedence::Atom,
            BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => {
                Precedence::Multiplicative
            }
            BinaryOperator::BitXor if dialect.bit_xor_operator().is_none() => Precedence::Additive,
            _ => Precedence::Bitwise,
        }
    }
}

/// Unary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
    BitNot,
}

/// Binding strength, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Or,
    And,
    Not,
    Comparison,
    Bitwise,
    Additive,
    Multiplicative,
    Unary,
    Atom,
}

impl Expr {
    fn precedence(&self, dialect: Dialect) -> Precedence {
        match self {
            Expr::Or(items) if items.len() > 1 => Precedence::Or,
            Expr::And(items) if items.len() > 1 => Precedence::And,
            Expr::Or(items) | Expr::And(items) => match items.first() {
                Some(only) => only.precedence(dialect),
                None => Precedence::Comparison,
            },
            Expr::Not(_) => Precedence::Not,
            Expr::BinaryOp { op, .. } => op.precedence(dialect),
            Expr::In { .. }
            | Expr::InSubquery { .. }
            | Expr::IsNull { .. }
            | Expr::Like { .. } => Precedence::Comparison,
            Expr::UnaryOp { .. } => Precedence::Unary,
            Expr::Literal(lit) if lit.is_negative() => Precedence::Unary,
            Expr::Exists { negated: true, .. } => Precedence::Not,
            Expr::Column { .. }
            | Expr::Literal(_)
            | Expr::Param(_)
            | Expr::Function { .. }
            | Expr::WithinGroup { .. }
            | Expr::StringAgg { .. }
            | Expr::Mode(_)
            | Expr::Extract { .. }
            | Expr::Cast { .. }
            | Expr::Case { .. }
            | Expr::Row(_)
            | Expr::Exists { .. }
            | Expr::Subquery(_)
            | Expr::Star { .. }
            | Expr::Paren(_) => Precedence::Atom,
        }
    }

    /// Whether the expression is a boolean predicate rather than a value.
    pub fn is_predicate(&self) -> bool {
        match self {
            Expr::BinaryOp { op, .. } => op.is_comparison(),
            Expr::And(_)
            | Expr::Or(_)
            | Expr::Not(_)
            | Expr::In { .. }
            | Expr::InSubquery { .. }
            | Expr::Exists { .. }
            | Expr::IsNull { .. }
            | Expr::Like { .. } => true,
            Expr::Paren(inner) => inner.is_predicate(),
            _ => false,
        }
    }

    /// Render with the grouping of `parent`.
    fn operand(&self, dialect: Dialect, wrap: impl FnOnce(Precedence) -> bool) -> TokenStream {
        let inner = self.to_tokens(dialect);
        if wrap(self.precedence(dialect)) {
            let mut ts = TokenStream::new();
            ts.lparen().append(&inner).rparen();
            ts
        } else {
            inner
        }
    }

    /// Convert to tokens for `dialect`.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone())).push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(lit.to_token());
            }

            Expr::Param(slot) => {
                ts.push(Token::Param(slot.clone()));
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&binary_tokens(left, *op, right, dialect));
            }

            Expr::And(items) | Expr::Or(items) => {
                let is_and = matches!(self, Expr::And(_));
                if items.is_empty() {
                    // 1 = 1 / 1 = 0 works where boolean literals do not
                    ts.push(Token::LitInt(1))
                        .space()
                        .push(Token::Eq)
                        .space()
                        .push(Token::LitInt(if is_and { 1 } else { 0 }));
                    return ts;
                }
                let (keyword, level) = if is_and {
                    (Token::And, Precedence::And)
                } else {
                    (Token::Or, Precedence::Or)
                };
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        ts.space().push(keyword.clone()).space();
                    }
                    ts.append(&item.operand(dialect, |p| p < level));
                }
            }

            Expr::Not(inner) => {
                ts.push(Token::Not)
                    .space()
                    .append(&inner.operand(dialect, |p| p <= Precedence::Bitwise));
            }

            Expr::UnaryOp { op, expr } => {
                ts.push(match op {
                    UnaryOperator::Minus => Token::Minus,
                    UnaryOperator::BitNot => Token::BitNot,
                });
                // `--x` would start a comment
                ts.append(&expr.operand(dialect, |p| p <= Precedence::Unary));
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone())).lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                let args: &[Expr] = match args.as_slice() {
                    [Expr::Row(columns)] if *distinct && dialect.distinct_count_takes_column_list() => {
                        columns
                    }
                    _ => args,
                };
                ts.append(&comma_list(args, dialect));
                ts.rparen();
            }

            Expr::WithinGroup {
                name,
                args,
                order_by,
            } => {
                ts.push(Token::FunctionName(name.clone()))
                    .lparen()
                    .append(&comma_list(args, dialect))
                    .rparen()
                    .space()
                    .push(Token::WithinGroup)
                    .space()
                    .lparen()
                    .push(Token::OrderBy)
                    .space()
                    .append(&order_by.to_tokens(dialect))
                    .rparen();
            }

            Expr::StringAgg {
                expr,
                separator,
                distinct,
            } => {
                ts.append(&dialect.emit_string_agg(
                    expr.to_tokens(dialect),
                    separator.to_tokens(dialect),
                    *distinct,
                ));
            }

            Expr::Mode(expr) => {
                let arg = expr.to_tokens(dialect);
                match dialect.emit_mode(arg.clone()) {
                    Some(mode) => ts.append(&mode),
                    None => ts
                        .push(Token::FunctionName("MODE".into()))
                        .lparen()
                        .append(&arg)
                        .rparen(),
                };
            }

            Expr::Extract { part, expr } => {
                ts.append(&dialect.emit_extract(*part, expr.to_tokens(dialect)));
            }

            Expr::Cast { expr, type_name } => {
                ts.push(Token::Cast)
                    .lparen()
                    .append(&expr.to_tokens(dialect))
                    .space()
                    .push(Token::As)
                    .space()
                    .push(Token::Raw(type_name.clone()))
                    .rparen();
            }

            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                if let Some(op) = operand {
                    ts.space().append(&op.to_tokens(dialect));
                }
                for (when, then) in when_clauses {
                    ts.space()
                        .push(Token::When)
                        .space()
                        .append(&when.to_tokens(dialect))
                        .space()
                        .push(Token::Then)
                        .space()
                        .append(&then.to_tokens(dialect));
                }
                if let Some(else_expr) = else_clause {
                    ts.space()
                        .push(Token::Else)
                        .space()
                        .append(&else_expr.to_tokens(dialect));
                }
                ts.space().push(Token::End);
            }

            Expr::Row(items) => {
                ts.lparen().append(&comma_list(items, dialect)).rparen();
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // Nothing is in an empty list.
                    return Expr::Or(Vec::new())
                        .negate_if(*negated)
                        .to_tokens(dialect);
                }
                ts.append(&expr.operand(dialect, |p| p <= Precedence::Comparison));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space()
                    .push(Token::In)
                    .space()
                    .lparen()
                    .append(&comma_list(values, dialect))
                    .rparen();
            }

            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                ts.append(&expr.operand(dialect, |p| p <= Precedence::Comparison));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space()
                    .push(Token::In)
                    .space()
                    .lparen()
                    .append(&subquery.to_tokens(dialect))
                    .rparen();
            }

            Expr::Exists { subquery, negated } => {
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::Exists)
                    .space()
                    .lparen()
                    .append(&subquery.to_tokens(dialect))
                    .rparen();
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.operand(dialect, |p| p <= Precedence::Comparison))
                    .space()
                    .push(if *negated {
                        Token::IsNotNull
                    } else {
                        Token::IsNull
                    });
            }

            Expr::Like {
                expr,
                pattern,
                escape,
                negated,
            } => {
                ts.append(&expr.operand(dialect, |p| p <= Precedence::Comparison));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space()
                    .push(Token::Like)
                    .space()
                    .append(&pattern.operand(dialect, |p| p <= Precedence::Comparison));
                if let Some(c) = escape {
                    ts.space()
                        .push(Token::Escape)
                        .space()
                        .push(Token::LitString(c.to_string()));
                }
            }

            Expr::Subquery(query) => {
                ts.lparen().append(&query.to_tokens(dialect)).rparen();
            }

            Expr::Star { table } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone())).push(Token::Dot);
                }
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen().append(&inner.to_tokens(dialect)).rparen();
            }
        }

        ts
    }

    /// Single-line SQL text with `?` placeholders.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect)
            .render(dialect, ParamStyle::Qmark, false)
            .sql
    }

    fn negate_if(self, negated: bool) -> Expr {
        if negated {
            self.not()
        } else {
            self
        }
    }
}

fn comma_list(items: &[Expr], dialect: Dialect) -> TokenStream {
    let mut ts = TokenStream::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(&item.to_tokens(dialect));
    }
    ts
}

fn binary_tokens(left: &Expr, op: BinaryOperator, right: &Expr, dialect: Dialect) -> TokenStream {
    let mut ts = TokenStream::new();

    // Function spellings
    let function = match op {
        BinaryOperator::Concat if !dialect.supports_concat_operator() => Some("CONCAT"),
        BinaryOperator::Mod if dialect.mod_as_function() => Some("MOD"),
        _ => None,
    };
    if let Some(name) = function {
        ts.push(Token::FunctionName(name.into()))
            .lparen()
            .append(&left.to_tokens(dialect))
            .comma()
            .space()
            .append(&right.to_tokens(dialect))
            .rparen();
        return ts;
    }

    // a ^ b == (a | b) - (a & b)
    if op == BinaryOperator::BitXor && dialect.bit_xor_operator().is_none() {
        let or = binary_tokens(left, BinaryOperator::BitOr, right, dialect);
        let and = binary_tokens(left, BinaryOperator::BitAnd, right, dialect);
        ts.lparen()
            .append(&or)
            .rparen()
            .space()
            .push(Token::Minus)
            .space()
            .lparen()
            .append(&and)
            .rparen();
        return ts;
    }

    let level = op.precedence(dialect);
    // Bitwise operators share one level with arithmetic in some engines.
    let left_wrap = move |p: Precedence| match level {
        Precedence::Bitwise => p < Precedence::Unary,
        Precedence::Comparison => p <= level,
        _ => p < level,
    };
    let right_wrap = move |p: Precedence| match level {
        Precedence::Bitwise => p < Precedence::Unary,
        _ => p <= level,
    };
    ts.append(&left.operand(dialect, left_wrap))
        .space()
        .push(op.to_token())
        .space()
        .append(&right.operand(dialect, right_wrap));
    ts
}

// =============================================================================
// Expression Builders
// =============================================================================

/// Create a column reference.
pub fn col(column: &str) -> Expr {
    Expr::Column {
        table: None,
        column: column.into(),
    }
}

/// Create a qualified column reference.
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// Placeholder for scalar `index` of the parameter bound to `source`.
pub fn param(source: &str, index: usize) -> Expr {
    Expr::Param(ParamSlot::new(source, index))
}

/// Create a star expression.
pub fn star() -> Expr {
    Expr::Star { table: None }
}

/// Create a function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct: false,
    }
}

/// Create an aggregate call, optionally DISTINCT.
pub fn aggregate(name: &str, args: Vec<Expr>, distinct: bool) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct,
    }
}

/// COUNT(*)
pub fn count_star() -> Expr {
    func("COUNT", vec![star()])
}

pub fn cast(expr: Expr, type_name: &str) -> Expr {
    Expr::Cast {
        expr: Box::new(expr),
        type_name: type_name.into(),
    }
}

/// Row value. A single item is returned as is.
pub fn row(mut items: Vec<Expr>) -> Expr {
    if items.len() == 1 {
        if let Some(only) = items.pop() {
            return only;
        }
    }
    Expr::Row(items)
}

/// Conjunction, flattening nested conjunctions.
pub fn and_all(items: impl IntoIterator<Item = Expr>) -> Expr {
    let mut out = Vec::new();
    for item in items {
        match item {
            Expr::And(inner) => out.extend(inner),
            other => out.push(other),
        }
    }
    if out.len() == 1 {
        if let Some(only) = out.pop() {
            return only;
        }
    }
    Expr::And(out)
}

/// Disjunction, flattening nested disjunctions.
pub fn or_all(items: impl IntoIterator<Item = Expr>) -> Expr {
    let mut out = Vec::new();
    for item in items {
        match item {
            Expr::Or(inner) => out.extend(inner),
            other => out.push(other),
        }
    }
    if out.len() == 1 {
        if let Some(only) = out.pop() {
            return only;
        }
    }
    Expr::Or(out)
}

/// CASE WHEN cond THEN then [ELSE otherwise] END
pub fn case_when(cond: Expr, then: Expr, otherwise: Option<Expr>) -> Expr {
    Expr::Case {
        operand: None,
        when_clauses: vec![(cond, then)],
        else_clause: otherwise.map(Box::new),
    }
}

// =============================================================================
// Fluent Expression Extension Trait
// =============================================================================

/// Extension trait for fluent expression building.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, other: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other.into()),
        }
    }

    // Comparison
    fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }
    fn ne(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Ne, other)
    }
    fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gt, other)
    }
    fn gte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gte, other)
    }
    fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lt, other)
    }
    fn lte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lte, other)
    }

    // Logical
    fn and(self, other: impl Into<Expr>) -> Expr {
        and_all([self.into_expr(), other.into()])
    }
    fn or(self, other: impl Into<Expr>) -> Expr {
        or_all([self.into_expr(), other.into()])
    }
    fn not(self) -> Expr {
        Expr::Not(Box::new(self.into_expr()))
    }

    // Arithmetic
    fn add(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Plus, other)
    }
    fn sub(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Minus, other)
    }
    fn mul(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Mul, other)
    }
    fn div(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Div, other)
    }
    fn neg(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: Box::new(self.into_expr()),
        }
    }

    // String
    fn concat(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Concat, other)
    }
    fn like(self, pattern: impl Into<Expr>) -> Expr {
        Expr::Like {
            expr: Box::new(self.into_expr()),
            pattern: Box::new(pattern.into()),
            escape: None,
            negated: false,
        }
    }

    // Null checks
    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }
    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }

    // Set membership
    fn in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: false,
        }
    }
    fn not_in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: true,
        }
    }
    fn in_subquery(self, subquery: Query) -> Expr {
        Expr::InSubquery {
            expr: Box::new(self.into_expr()),
            subquery: Box::new(subquery),
            negated: false,
        }
    }

    // Aliasing
    fn alias(self, name: &str) -> SelectExpr {
        SelectExpr::new(self.into_expr()).with_alias(name)
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit_int(n as i64)
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        lit_float(f)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        lit_bool(b)
    }
}

impl From<Literal> for Expr {
    fn from(lit: Literal) -> Self {
        Expr::Literal(lit)
    }
}

impl From<Query> for Expr {
    fn from(query: Query) -> Self {
        Expr::Subquery(Box::new(query))
    }
}
