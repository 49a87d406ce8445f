//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (PG/DuckDB/SQLite/Oracle), `` ` `` (MySQL), `[]` (T-SQL)
//! - Parameter placeholders: `$1`, `?`, `%s`, `:p1`, `@p1`
//! - Pagination: LIMIT/OFFSET vs OFFSET FETCH
//! - Boolean literals: true/false vs 1/0
//! - Date part extraction, string aggregation, interval literals
//!
//! # Usage
//!
//! ```ignore
//! use comprehend::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("user");  // "user"
//! ```
//!
//! # Feature Matrix
//!
//! | Feature | PostgreSQL | DuckDB | MySQL | SQLite | SQL Server | Oracle |
//! |---------|-----------|--------|-------|--------|------------|--------|
//! | Row values | ✓ | ✓ | ✓ | 3.15+ | ❌ | ❌ |
//! | WITHIN GROUP | ✓ | ✓ | ❌ | ❌ | ❌ | ✓ |
//! | Interval arithmetic | ✓ | ✓ | ✓ | ❌ | ❌ | ✓ |
//! | Bit shifts | ✓ | ✓ | ✓ | ✓ | ❌ | ❌ |
//! | Boolean type | ✓ | ✓ | ✓ | ✓ | ❌ | ❌ |
//! | NULLS FIRST/LAST | ✓ | ✓ | ❌ | 3.30+ | ❌ | ✓ |
//!
//! Legend: ✓ = supported, ❌ = not supported, version = minimum required

mod duckdb;
pub mod helpers;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;
mod tsql;

pub use duckdb::DuckDb;
pub use mysql::MySql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use sqlite::Sqlite;
pub use tsql::TSql;

use serde::{Deserialize, Serialize};

use super::token::TokenStream;
use crate::functions::DatePart;

// =============================================================================
// Parameter styles
// =============================================================================

/// Placeholder syntax for bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamStyle {
    /// `?`
    Qmark,
    /// `$1`
    Numeric,
    /// `:p1`
    Named,
    /// `%s`
    Format,
    /// `@p1`
    AtNamed,
}

impl ParamStyle {
    /// Positional styles bind one value per placeholder occurrence.
    pub fn is_positional(self) -> bool {
        matches!(self, ParamStyle::Qmark | ParamStyle::Format)
    }

    /// Placeholder text for the 1-based parameter `number`.
    pub fn placeholder(self, number: usize) -> String {
        match self {
            ParamStyle::Qmark => "?".into(),
            ParamStyle::Numeric => format!("${number}"),
            ParamStyle::Named => format!(":p{number}"),
            ParamStyle::Format => "%s".into(),
            ParamStyle::AtNamed => format!("@p{number}"),
        }
    }

    /// Parameter name for named styles.
    pub fn param_name(self, number: usize) -> Option<String> {
        match self {
            ParamStyle::Named | ParamStyle::AtNamed => Some(format!("p{number}")),
            ParamStyle::Qmark | ParamStyle::Numeric | ParamStyle::Format => None,
        }
    }
}

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    ///
    /// Must escape any embedded quote characters.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    ///
    /// Default: single quotes with '' escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    /// Format NULL literal.
    fn format_null(&self) -> &'static str {
        "NULL"
    }

    /// Longest identifier the engine accepts. Table aliases are truncated to
    /// fit.
    fn identifier_max_len(&self) -> usize {
        128
    }

    // =========================================================================
    // Temporal and Binary Literals
    // =========================================================================

    /// Format a date literal (`YYYY-MM-DD`).
    fn format_date_literal(&self, date: &str) -> String {
        format!("DATE '{}'", date)
    }

    /// Format a time-of-day literal (`HH:MM:SS[.ffffff]`).
    fn format_time_literal(&self, time: &str) -> String {
        format!("TIME '{}'", time)
    }

    /// Format a timestamp literal (`YYYY-MM-DD HH:MM:SS[.ffffff]`).
    fn format_timestamp_literal(&self, ts: &str) -> String {
        format!("TIMESTAMP '{}'", ts)
    }

    /// Format a binary literal.
    fn format_bytes_literal(&self, bytes: &[u8]) -> String {
        format!("X'{}'", helpers::hex(bytes))
    }

    /// Format a duration given in microseconds.
    fn format_interval_literal(&self, micros: i64) -> String {
        format!("INTERVAL '{} seconds'", helpers::seconds(micros))
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// Native placeholder style of the engine's usual driver.
    fn paramstyle(&self) -> ParamStyle;

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT/OFFSET clause.
    ///
    /// Default: LIMIT n OFFSET m
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    /// Whether OFFSET requires ORDER BY (T-SQL).
    fn requires_order_by_for_offset(&self) -> bool {
        false
    }

    // =========================================================================
    // Operators
    // =========================================================================

    /// String concatenation operator.
    ///
    /// Default: ||
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether dialect supports || for concatenation.
    ///
    /// MySQL uses CONCAT() function instead.
    fn supports_concat_operator(&self) -> bool {
        true
    }

    /// Whether `& | ^ ~` are available as infix operators.
    fn supports_bitwise_operators(&self) -> bool {
        true
    }

    /// Bitwise XOR operator, `None` when it has to be emulated.
    fn bit_xor_operator(&self) -> Option<&'static str> {
        Some("^")
    }

    /// Whether `<<` and `>>` exist.
    fn supports_bit_shift(&self) -> bool {
        true
    }

    /// Whether the remainder must be written `MOD(a, b)`.
    fn mod_as_function(&self) -> bool {
        false
    }

    /// Whether date and timestamp values can be shifted by an interval.
    fn supports_interval_arithmetic(&self) -> bool {
        true
    }

    /// Type name for casting booleans to integers.
    fn integer_cast_type(&self) -> &'static str {
        "INTEGER"
    }

    /// Type name for casting integers before true division.
    fn float_cast_type(&self) -> &'static str {
        "DOUBLE PRECISION"
    }

    // =========================================================================
    // Booleans and Row Values
    // =========================================================================

    /// Whether predicates are values (can be selected, compared, used bare in
    /// WHERE). Without it boolean columns are tested with `= 1` and selected
    /// predicates go through CASE.
    fn supports_boolean_type(&self) -> bool {
        true
    }

    /// Whether `(a, b) < (c, d)` and `(a, b) IN ((..), (..))` are valid.
    fn supports_row_values(&self) -> bool {
        true
    }

    /// Whether COUNT(DISTINCT ...) accepts several columns.
    fn supports_composite_key_aggregation(&self) -> bool {
        false
    }

    /// Whether COUNT(DISTINCT a, b) is written as a column list rather than a
    /// row value.
    fn distinct_count_takes_column_list(&self) -> bool {
        false
    }

    // =========================================================================
    // FROM Clause
    // =========================================================================

    /// Whether `AS` may precede a table alias (Oracle rejects it).
    fn table_alias_keyword(&self) -> bool {
        true
    }

    // =========================================================================
    // Functions and Aggregates
    // =========================================================================

    /// Emit extraction of a date/time component.
    ///
    /// Default: EXTRACT(PART FROM arg)
    fn emit_extract(&self, part: DatePart, arg: TokenStream) -> TokenStream {
        helpers::emit_extract_standard(part, arg)
    }

    /// Whether ordered-set aggregates take `WITHIN GROUP (ORDER BY ...)`.
    fn supports_within_group(&self) -> bool {
        false
    }

    /// Whether STDDEV/VARIANCE aggregates exist.
    fn supports_statistical_aggregates(&self) -> bool {
        true
    }

    /// Emit string aggregation with a separator.
    ///
    /// Default: STRING_AGG([DISTINCT] arg, sep)
    fn emit_string_agg(&self, arg: TokenStream, sep: TokenStream, distinct: bool) -> TokenStream {
        helpers::emit_string_agg_standard(arg, sep, distinct)
    }

    /// Emit the most frequent value aggregate, `None` when unavailable.
    fn emit_mode(&self, arg: TokenStream) -> Option<TokenStream> {
        self.supports_within_group()
            .then(|| helpers::emit_mode_within_group(arg))
    }

    // =========================================================================
    // Function Remapping
    // =========================================================================

    /// Remap a function name for this dialect.
    ///
    /// Returns `Some(new_name)` if the function should be renamed,
    /// or `None` to use the original name.
    fn remap_function(&self, _name: &str) -> Option<&'static str> {
        None
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    DuckDb,
    Postgres,
    MySql,
    Sqlite,
    TSql,
    Oracle,
}

impl Dialect {
    pub const ALL: [Dialect; 6] = [
        Dialect::DuckDb,
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::Sqlite,
        Dialect::TSql,
        Dialect::Oracle,
    ];

    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::DuckDb => &DuckDb,
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::Sqlite => &Sqlite,
            Dialect::TSql => &TSql,
            Dialect::Oracle => &Oracle,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_null(&self) -> &'static str {
        self.dialect().format_null()
    }

    fn identifier_max_len(&self) -> usize {
        self.dialect().identifier_max_len()
    }

    fn format_date_literal(&self, date: &str) -> String {
        self.dialect().format_date_literal(date)
    }

    fn format_time_literal(&self, time: &str) -> String {
        self.dialect().format_time_literal(time)
    }

    fn format_timestamp_literal(&self, ts: &str) -> String {
        self.dialect().format_timestamp_literal(ts)
    }

    fn format_bytes_literal(&self, bytes: &[u8]) -> String {
        self.dialect().format_bytes_literal(bytes)
    }

    fn format_interval_literal(&self, micros: i64) -> String {
        self.dialect().format_interval_literal(micros)
    }

    fn paramstyle(&self) -> ParamStyle {
        self.dialect().paramstyle()
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn requires_order_by_for_offset(&self) -> bool {
        self.dialect().requires_order_by_for_offset()
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn supports_concat_operator(&self) -> bool {
        self.dialect().supports_concat_operator()
    }

    fn supports_bitwise_operators(&self) -> bool {
        self.dialect().supports_bitwise_operators()
    }

    fn bit_xor_operator(&self) -> Option<&'static str> {
        self.dialect().bit_xor_operator()
    }

    fn supports_bit_shift(&self) -> bool {
        self.dialect().supports_bit_shift()
    }

    fn mod_as_function(&self) -> bool {
        self.dialect().mod_as_function()
    }

    fn supports_interval_arithmetic(&self) -> bool {
        self.dialect().supports_interval_arithmetic()
    }

    fn integer_cast_type(&self) -> &'static str {
        self.dialect().integer_cast_type()
    }

    fn float_cast_type(&self) -> &'static str {
        self.dialect().float_cast_type()
    }

    fn supports_boolean_type(&self) -> bool {
        self.dialect().supports_boolean_type()
    }

    fn supports_row_values(&self) -> bool {
        self.dialect().supports_row_values()
    }

    fn supports_composite_key_aggregation(&self) -> bool {
        self.dialect().supports_composite_key_aggregation()
    }

    fn distinct_count_takes_column_list(&self) -> bool {
        self.dialect().distinct_count_takes_column_list()
    }

    fn table_alias_keyword(&self) -> bool {
        self.dialect().table_alias_keyword()
    }

    fn emit_extract(&self, part: DatePart, arg: TokenStream) -> TokenStream {
        self.dialect().emit_extract(part, arg)
    }

    fn supports_within_group(&self) -> bool {
        self.dialect().supports_within_group()
    }

    fn supports_statistical_aggregates(&self) -> bool {
        self.dialect().supports_statistical_aggregates()
    }

    fn emit_string_agg(&self, arg: TokenStream, sep: TokenStream, distinct: bool) -> TokenStream {
        self.dialect().emit_string_agg(arg, sep, distinct)
    }

    fn emit_mode(&self, arg: TokenStream) -> Option<TokenStream> {
        self.dialect().emit_mode(arg)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Dialect::ALL
            .into_iter()
            .find(|d| d.name() == lowered)
            .ok_or_else(|| format!("unknown dialect '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::token::Token;

    #[test]
    fn test_dialect_display() {
        assert_eq!(Dialect::DuckDb.to_string(), "duckdb");
        assert_eq!(Dialect::Postgres.to_string(), "postgres");
        assert_eq!(Dialect::TSql.to_string(), "tsql");
        assert_eq!(Dialect::MySql.to_string(), "mysql");
        assert_eq!(Dialect::Sqlite.to_string(), "sqlite");
        assert_eq!(Dialect::Oracle.to_string(), "oracle");
    }

    #[test]
    fn test_from_str_round_trips_names() {
        for d in Dialect::ALL {
            assert_eq!(d.to_string().parse::<Dialect>(), Ok(d));
        }
        assert_eq!("PostgreS".parse::<Dialect>(), Ok(Dialect::Postgres));
        assert!("bigquery".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&Dialect::TSql).unwrap();
        assert_eq!(json, "\"tsql\"");
        let d: Dialect = serde_json::from_str("\"duckdb\"").unwrap();
        assert_eq!(d, Dialect::DuckDb);
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::DuckDb.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::Postgres.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::TSql.quote_identifier("users"), "[users]");
        assert_eq!(Dialect::MySql.quote_identifier("users"), "`users`");
        assert_eq!(Dialect::Sqlite.quote_identifier("users"), "\"users\"");
    }

    #[test]
    fn test_quote_identifier_escaping() {
        assert_eq!(
            Dialect::DuckDb.quote_identifier("weird\"name"),
            "\"weird\"\"name\""
        );
        assert_eq!(
            Dialect::TSql.quote_identifier("weird]name"),
            "[weird]]name]"
        );
        assert_eq!(
            Dialect::MySql.quote_identifier("weird`name"),
            "`weird``name`"
        );
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(Dialect::Postgres.quote_string("it's"), "'it''s'");
        assert_eq!(Dialect::TSql.quote_string("café"), "N'café'");
        assert_eq!(Dialect::MySql.quote_string("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn test_format_bool() {
        assert_eq!(Dialect::DuckDb.format_bool(true), "true");
        assert_eq!(Dialect::Postgres.format_bool(false), "false");
        assert_eq!(Dialect::TSql.format_bool(true), "1");
        assert_eq!(Dialect::Oracle.format_bool(false), "0");
    }

    #[test]
    fn test_paramstyles() {
        assert_eq!(Dialect::Postgres.paramstyle(), ParamStyle::Numeric);
        assert_eq!(Dialect::DuckDb.paramstyle(), ParamStyle::Qmark);
        assert_eq!(Dialect::MySql.paramstyle(), ParamStyle::Format);
        assert_eq!(Dialect::Sqlite.paramstyle(), ParamStyle::Qmark);
        assert_eq!(Dialect::TSql.paramstyle(), ParamStyle::AtNamed);
        assert_eq!(Dialect::Oracle.paramstyle(), ParamStyle::Named);
        assert_eq!(ParamStyle::Named.placeholder(3), ":p3");
        assert_eq!(ParamStyle::AtNamed.param_name(2).as_deref(), Some("p2"));
        assert_eq!(ParamStyle::Numeric.param_name(2), None);
    }

    #[test]
    fn test_concat_operator() {
        assert_eq!(Dialect::DuckDb.concat_operator(), "||");
        assert_eq!(Dialect::TSql.concat_operator(), "+");
        // MySQL uses CONCAT() function, operator returns || but shouldn't be used
        assert!(!Dialect::MySql.supports_concat_operator());
    }

    #[test]
    fn test_identifier_limits() {
        assert_eq!(Dialect::Oracle.identifier_max_len(), 30);
        assert_eq!(Dialect::Postgres.identifier_max_len(), 63);
        assert_eq!(Dialect::MySql.identifier_max_len(), 64);
    }

    #[test]
    fn test_interval_literals() {
        assert_eq!(
            Dialect::Postgres.format_interval_literal(90_000_000),
            "INTERVAL '90 seconds'"
        );
        assert_eq!(
            Dialect::DuckDb.format_interval_literal(1_500_000),
            "INTERVAL '1.500000 seconds'"
        );
        assert_eq!(
            Dialect::MySql.format_interval_literal(1_500_000),
            "INTERVAL 1500000 MICROSECOND"
        );
        assert_eq!(
            Dialect::Oracle.format_interval_literal(-60_000_000),
            "NUMTODSINTERVAL(-60, 'SECOND')"
        );
    }

    #[test]
    fn test_extract_syntax() {
        let arg = || {
            let mut ts = TokenStream::new();
            ts.push(Token::Ident("d".into()));
            ts
        };
        assert_eq!(
            Dialect::Postgres
                .emit_extract(DatePart::Year, arg())
                .serialize(Dialect::Postgres),
            "EXTRACT(YEAR FROM \"d\")"
        );
        assert_eq!(
            Dialect::TSql
                .emit_extract(DatePart::Month, arg())
                .serialize(Dialect::TSql),
            "DATEPART(MONTH, [d])"
        );
        assert_eq!(
            Dialect::Sqlite
                .emit_extract(DatePart::Day, arg())
                .serialize(Dialect::Sqlite),
            "CAST(STRFTIME('%d', \"d\") AS INTEGER)"
        );
    }

    #[test]
    fn test_feature_flags() {
        assert!(Dialect::Postgres.supports_row_values());
        assert!(!Dialect::TSql.supports_row_values());
        assert!(!Dialect::Oracle.table_alias_keyword());
        assert!(Dialect::Postgres.supports_within_group());
        assert!(!Dialect::MySql.supports_within_group());
        assert!(!Dialect::Sqlite.supports_interval_arithmetic());
        assert!(!Dialect::TSql.supports_bit_shift());
        assert!(Dialect::Oracle.mod_as_function());
        assert!(!Dialect::Sqlite.supports_statistical_aggregates());
        assert!(Dialect::MySql.distinct_count_takes_column_list());
    }

    #[test]
    fn test_mode_fallbacks() {
        let arg = || {
            let mut ts = TokenStream::new();
            ts.push(Token::Ident("x".into()));
            ts
        };
        assert_eq!(
            Dialect::Postgres
                .emit_mode(arg())
                .map(|ts| ts.serialize(Dialect::Postgres)),
            Some("MODE() WITHIN GROUP (ORDER BY \"x\")".to_string())
        );
        assert_eq!(
            Dialect::Oracle
                .emit_mode(arg())
                .map(|ts| ts.serialize(Dialect::Oracle)),
            Some("STATS_MODE(\"x\")".to_string())
        );
        assert!(Dialect::MySql.emit_mode(arg()).is_none());
    }

    #[test]
    fn test_remap_function() {
        assert_eq!(Dialect::TSql.remap_function("LENGTH"), Some("LEN"));
        assert_eq!(Dialect::TSql.remap_function("ceil"), Some("CEILING"));
        assert_eq!(Dialect::Sqlite.remap_function("GREATEST"), Some("MAX"));
        assert_eq!(Dialect::MySql.remap_function("SUBSTR"), Some("SUBSTRING"));
        assert_eq!(Dialect::Postgres.remap_function("UPPER"), None);
    }
}
