//! SQL Tokens - the atomic units of SQL output.
//!
//! Tokens are dialect-agnostic representations that serialize
//! to dialect-specific strings. Parameter placeholders are numbered only when
//! a whole stream is rendered, since numbering depends on every placeholder
//! that precedes them.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::dialect::{Dialect, ParamStyle, SqlDialect};

/// One scalar of a bound parameter.
///
/// `index` addresses the parameter's flattened values: element `i` of a set,
/// key column `i` of an entity, item `i` of a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamSlot {
    pub source: String,
    pub index: usize,
}

impl ParamSlot {
    pub fn new(source: &str, index: usize) -> Self {
        Self {
            source: source.into(),
            index,
        }
    }
}

impl fmt::Display for ParamSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.source, self.index)
    }
}

/// SQL Token - every element of a SELECT statement.
///
/// Adding a new variant here will cause compile errors everywhere
/// it needs to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    On,
    Join,
    Inner,
    Left,
    Cross,
    GroupBy,
    Having,
    OrderBy,
    Desc,
    Limit,
    Offset,
    Fetch,
    Next,
    First,
    Rows,
    Only,
    Case,
    When,
    Then,
    Else,
    End,
    In,
    Like,
    Escape,
    IsNull,
    IsNotNull,
    Distinct,
    Exists,
    Cast,
    WithinGroup,
    Null,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Concat,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    ShiftLeft,
    ShiftRight,

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Simple identifier (table, column, alias)
    Ident(String),
    LitInt(i64),
    LitFloat(f64),
    /// Decimal in canonical text form
    LitDecimal(String),
    LitString(String),
    LitBool(bool),
    LitNull,
    LitDate(NaiveDate),
    LitTime(NaiveTime),
    LitTimestamp(NaiveDateTime),
    LitBytes(Vec<u8>),
    /// Interval in microseconds
    LitInterval(i64),
    /// Bound value placeholder
    Param(ParamSlot),

    // === Function Names ===
    /// Function name, remapped per dialect (e.g. LENGTH -> LEN for T-SQL)
    FunctionName(String),

    // === Escape Hatch ===
    /// Fixed SQL text produced by dialect hooks. Never built from input values.
    Raw(String),
}

impl Token {
    /// Serialize this token to a string for the given dialect.
    ///
    /// Placeholders serialize as `?`; use [`TokenStream::render`] to number
    /// them for a paramstyle.
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            // Keywords
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::Not => "NOT".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Join => "JOIN".into(),
            Token::Inner => "INNER".into(),
            Token::Left => "LEFT".into(),
            Token::Cross => "CROSS".into(),
            Token::GroupBy => "GROUP BY".into(),
            Token::Having => "HAVING".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Desc => "DESC".into(),
            Token::Limit => "LIMIT".into(),
            Token::Offset => "OFFSET".into(),
            Token::Fetch => "FETCH".into(),
            Token::Next => "NEXT".into(),
            Token::First => "FIRST".into(),
            Token::Rows => "ROWS".into(),
            Token::Only => "ONLY".into(),
            Token::Case => "CASE".into(),
            Token::When => "WHEN".into(),
            Token::Then => "THEN".into(),
            Token::Else => "ELSE".into(),
            Token::End => "END".into(),
            Token::In => "IN".into(),
            Token::Like => "LIKE".into(),
            Token::Escape => "ESCAPE".into(),
            Token::IsNull => "IS NULL".into(),
            Token::IsNotNull => "IS NOT NULL".into(),
            Token::Distinct => "DISTINCT".into(),
            Token::Exists => "EXISTS".into(),
            Token::Cast => "CAST".into(),
            Token::WithinGroup => "WITHIN GROUP".into(),
            Token::Null => "NULL".into(),

            // Punctuation
            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Star => "*".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            // Operators
            Token::Eq => "=".into(),
            Token::Ne => "<>".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Lte => "<=".into(),
            Token::Gte => ">=".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Mul => "*".into(),
            Token::Div => "/".into(),
            Token::Mod => "%".into(),
            Token::Concat => dialect.concat_operator().into(),
            Token::BitAnd => "&".into(),
            Token::BitOr => "|".into(),
            Token::BitXor => dialect.bit_xor_operator().unwrap_or("^").into(),
            Token::BitNot => "~".into(),
            Token::ShiftLeft => "<<".into(),
            Token::ShiftRight => ">>".into(),

            // Whitespace
            Token::Space => " ".into(),
            Token::Newline => "\n".into(),
            Token::Indent(n) => "  ".repeat(*n),

            // Dynamic - dialect-specific formatting
            Token::Ident(name) => dialect.quote_identifier(name),
            Token::LitInt(n) => n.to_string(),
            Token::LitFloat(f) => {
                // Non-finite values are rejected before they reach the AST.
                if !f.is_finite() {
                    return dialect.format_null().into();
                }
                let mut buffer = ryu::Buffer::new();
                buffer.format(*f).to_string()
            }
            Token::LitDecimal(s) => s.clone(),
            Token::LitString(s) => dialect.quote_string(s),
            Token::LitBool(b) => dialect.format_bool(*b).into(),
            Token::LitNull => dialect.format_null().into(),
            Token::LitDate(d) => dialect.format_date_literal(&d.format("%Y-%m-%d").to_string()),
            Token::LitTime(t) => dialect.format_time_literal(&t.format("%H:%M:%S%.f").to_string()),
            Token::LitTimestamp(ts) => {
                dialect.format_timestamp_literal(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            Token::LitBytes(bytes) => dialect.format_bytes_literal(bytes),
            Token::LitInterval(micros) => dialect.format_interval_literal(*micros),
            Token::Param(_) => "?".into(),

            // Function names with dialect-specific remapping
            Token::FunctionName(name) => match dialect.remap_function(name) {
                Some(remapped) => remapped.to_uppercase(),
                None => name.to_uppercase(),
            },

            // Escape hatch
            Token::Raw(s) => s.clone(),
        }
    }
}

/// SQL text together with the parameter slot behind each placeholder number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSql {
    pub sql: String,
    /// For positional styles one entry per placeholder occurrence, otherwise
    /// one entry per distinct slot in numbering order.
    pub placeholders: Vec<ParamSlot>,
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Extend with multiple tokens.
    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self, dialect: Dialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    /// Serialize with numbered placeholders.
    ///
    /// Compact output (`pretty == false`) turns line breaks into single
    /// spaces and drops indentation.
    pub fn render(&self, dialect: Dialect, style: ParamStyle, pretty: bool) -> RenderedSql {
        let mut sql = String::new();
        let mut placeholders: Vec<ParamSlot> = Vec::new();
        for token in &self.tokens {
            match token {
                Token::Param(slot) => {
                    let number = if style.is_positional() {
                        placeholders.push(slot.clone());
                        placeholders.len()
                    } else {
                        match placeholders.iter().position(|s| s == slot) {
                            Some(i) => i + 1,
                            None => {
                                placeholders.push(slot.clone());
                                placeholders.len()
                            }
                        }
                    };
                    sql.push_str(&style.placeholder(number));
                }
                Token::Newline if !pretty => sql.push(' '),
                Token::Indent(_) if !pretty => {}
                // pyformat drivers treat a bare % as a placeholder prefix
                other if style == ParamStyle::Format => {
                    sql.push_str(&other.serialize(dialect).replace('%', "%%"))
                }
                other => sql.push_str(&other.serialize(dialect)),
            }
        }
        RenderedSql { sql, placeholders }
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn indent(&mut self, n: usize) -> &mut Self {
        self.push(Token::Indent(n))
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}
