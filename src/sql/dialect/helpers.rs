//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use super::super::token::{Token, TokenStream};
use crate::functions::DatePart;

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, DuckDB, SQLite, Oracle
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote identifier with square brackets.
/// Used by: T-SQL (SQL Server, Azure SQL)
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote string with N prefix for Unicode (T-SQL).
pub fn quote_string_unicode(s: &str) -> String {
    format!("N'{}'", s.replace('\'', "''"))
}

/// Quote string for engines that treat backslash as an escape (MySQL).
pub fn quote_string_backslash(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
/// Used by: Postgres, DuckDB
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Format boolean as numeric 1/0.
/// Used by: T-SQL, MySQL, SQLite, Oracle
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// =============================================================================
// Binary and Interval Literals
// =============================================================================

/// Lowercase hex digits of `bytes`.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Microseconds as a decimal number of seconds, fraction only when needed.
pub fn seconds(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let (whole, frac) = (abs / 1_000_000, abs % 1_000_000);
    if frac == 0 {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole}.{frac:06}")
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit LIMIT ... OFFSET ... (standard SQL).
/// Used by: Postgres, DuckDB, MySQL, SQLite
pub fn emit_limit_offset_standard(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    if let Some(lim) = limit {
        ts.push(Token::Limit)
            .space()
            .push(Token::LitInt(lim as i64));
    }

    if let Some(off) = offset {
        if limit.is_some() {
            ts.space();
        }
        ts.push(Token::Offset)
            .space()
            .push(Token::LitInt(off as i64));
    }

    ts
}

/// Emit LIMIT/OFFSET for engines where OFFSET needs a LIMIT (MySQL, SQLite).
///
/// A missing limit becomes the largest value the engine accepts.
pub fn emit_limit_offset_required_limit(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    match (limit, offset) {
        (None, Some(_)) => emit_limit_offset_standard(Some(i64::MAX as u64), offset),
        _ => emit_limit_offset_standard(limit, offset),
    }
}

/// Emit OFFSET ... ROWS FETCH NEXT ... ROWS ONLY (T-SQL style).
/// Note: Requires ORDER BY clause in T-SQL
pub fn emit_limit_offset_tsql(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    let off = offset.unwrap_or(0);
    ts.push(Token::Offset)
        .space()
        .push(Token::LitInt(off as i64))
        .space()
        .push(Token::Rows);

    if let Some(lim) = limit {
        ts.space()
            .push(Token::Fetch)
            .space()
            .push(Token::Next)
            .space()
            .push(Token::LitInt(lim as i64))
            .space()
            .push(Token::Rows)
            .space()
            .push(Token::Only);
    }

    ts
}

/// Emit [OFFSET ... ROWS] [FETCH FIRST ... ROWS ONLY] (Oracle 12c+).
pub fn emit_limit_offset_fetch_first(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    if let Some(off) = offset {
        ts.push(Token::Offset)
            .space()
            .push(Token::LitInt(off as i64))
            .space()
            .push(Token::Rows);
    }

    if let Some(lim) = limit {
        if offset.is_some() {
            ts.space();
        }
        ts.push(Token::Fetch)
            .space()
            .push(Token::First)
            .space()
            .push(Token::LitInt(lim as i64))
            .space()
            .push(Token::Rows)
            .space()
            .push(Token::Only);
    }

    ts
}

// =============================================================================
// Date Part Extraction
// =============================================================================

/// EXTRACT(PART FROM arg)
pub fn emit_extract_standard(part: DatePart, arg: TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName("EXTRACT".into()))
        .lparen()
        .push(Token::Raw(part.keyword().into()))
        .space()
        .push(Token::From)
        .space()
        .append(&arg)
        .rparen();
    ts
}

/// DATEPART(PART, arg)
pub fn emit_extract_tsql(part: DatePart, arg: TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName("DATEPART".into()))
        .lparen()
        .push(Token::Raw(part.keyword().into()))
        .comma()
        .space()
        .append(&arg)
        .rparen();
    ts
}

/// CAST(STRFTIME('%Y', arg) AS INTEGER)
pub fn emit_extract_sqlite(part: DatePart, arg: TokenStream) -> TokenStream {
    let format = match part {
        DatePart::Year => "%Y",
        DatePart::Month => "%m",
        DatePart::Day => "%d",
        DatePart::Hour => "%H",
        DatePart::Minute => "%M",
        DatePart::Second => "%S",
    };
    let mut ts = TokenStream::new();
    ts.push(Token::Cast)
        .lparen()
        .push(Token::FunctionName("STRFTIME".into()))
        .lparen()
        .push(Token::LitString(format.into()))
        .comma()
        .space()
        .append(&arg)
        .rparen()
        .space()
        .push(Token::As)
        .space()
        .push(Token::Raw("INTEGER".into()))
        .rparen();
    ts
}

// =============================================================================
// Aggregates
// =============================================================================

fn open_aggregate(name: &str, distinct: bool) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName(name.into())).lparen();
    if distinct {
        ts.push(Token::Distinct).space();
    }
    ts
}

/// STRING_AGG([DISTINCT] arg, sep)
/// Used by: Postgres, DuckDB, T-SQL
pub fn emit_string_agg_standard(arg: TokenStream, sep: TokenStream, distinct: bool) -> TokenStream {
    let mut ts = open_aggregate("STRING_AGG", distinct);
    ts.append(&arg).comma().space().append(&sep).rparen();
    ts
}

/// GROUP_CONCAT([DISTINCT] arg SEPARATOR sep)
pub fn emit_string_agg_mysql(arg: TokenStream, sep: TokenStream, distinct: bool) -> TokenStream {
    let mut ts = open_aggregate("GROUP_CONCAT", distinct);
    ts.append(&arg)
        .space()
        .push(Token::Raw("SEPARATOR".into()))
        .space()
        .append(&sep)
        .rparen();
    ts
}

/// GROUP_CONCAT(arg, sep)
///
/// SQLite accepts DISTINCT only on single-argument aggregates, so the
/// distinct form falls back to the default `,` separator.
pub fn emit_string_agg_sqlite(arg: TokenStream, sep: TokenStream, distinct: bool) -> TokenStream {
    let mut ts = open_aggregate("GROUP_CONCAT", distinct);
    ts.append(&arg);
    if !distinct {
        ts.comma().space().append(&sep);
    }
    ts.rparen();
    ts
}

/// LISTAGG([DISTINCT] arg, sep) WITHIN GROUP (ORDER BY arg)
pub fn emit_string_agg_listagg(arg: TokenStream, sep: TokenStream, distinct: bool) -> TokenStream {
    let mut ts = open_aggregate("LISTAGG", distinct);
    ts.append(&arg)
        .comma()
        .space()
        .append(&sep)
        .rparen()
        .space()
        .push(Token::WithinGroup)
        .space()
        .lparen()
        .push(Token::OrderBy)
        .space()
        .append(&arg)
        .rparen();
    ts
}

/// MODE() WITHIN GROUP (ORDER BY arg)
pub fn emit_mode_within_group(arg: TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName("MODE".into()))
        .lparen()
        .rparen()
        .space()
        .push(Token::WithinGroup)
        .space()
        .lparen()
        .push(Token::OrderBy)
        .space()
        .append(&arg)
        .rparen();
    ts
}

// =============================================================================
// Function Remapping
// =============================================================================

/// Remap functions for Postgres dialect.
pub fn remap_function_postgres(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "NVL" | "IFNULL" => Some("COALESCE"),
        _ => None,
    }
}

/// Remap functions for DuckDB dialect.
pub fn remap_function_duckdb(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "NVL" | "IFNULL" => Some("COALESCE"),
        _ => None,
    }
}

/// Remap functions for MySQL dialect.
pub fn remap_function_mysql(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        // LENGTH counts bytes in MySQL
        "LENGTH" => Some("CHAR_LENGTH"),
        "SUBSTR" => Some("SUBSTRING"),
        "NVL" => Some("IFNULL"),
        _ => None,
    }
}

/// Remap functions for SQLite dialect.
pub fn remap_function_sqlite(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        // Multi-argument MAX/MIN are the scalar forms in SQLite
        "GREATEST" => Some("MAX"),
        "LEAST" => Some("MIN"),
        "NVL" => Some("IFNULL"),
        _ => None,
    }
}

/// Remap functions for T-SQL dialect.
pub fn remap_function_tsql(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "LENGTH" => Some("LEN"),
        "SUBSTR" => Some("SUBSTRING"),
        "CEIL" => Some("CEILING"),
        "LN" => Some("LOG"),
        "STDDEV_SAMP" => Some("STDEV"),
        "STDDEV_POP" => Some("STDEVP"),
        "VAR_SAMP" => Some("VAR"),
        "VAR_POP" => Some("VARP"),
        "NVL" | "IFNULL" => Some("ISNULL"),
        _ => None,
    }
}

/// Remap functions for Oracle dialect.
pub fn remap_function_oracle(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "IFNULL" => Some("NVL"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_formatting() {
        assert_eq!(seconds(0), "0");
        assert_eq!(seconds(3_000_000), "3");
        assert_eq!(seconds(1_000_001), "1.000001");
        assert_eq!(seconds(-2_500_000), "-2.500000");
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x00, 0xff, 0x10]), "00ff10");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn test_fetch_first_without_offset() {
        use crate::sql::dialect::Dialect;
        let ts = emit_limit_offset_fetch_first(Some(5), None);
        assert_eq!(ts.serialize(Dialect::Oracle), "FETCH FIRST 5 ROWS ONLY");
        let ts = emit_limit_offset_fetch_first(Some(5), Some(10));
        assert_eq!(
            ts.serialize(Dialect::Oracle),
            "OFFSET 10 ROWS FETCH FIRST 5 ROWS ONLY"
        );
    }

    #[test]
    fn test_offset_without_limit_gets_upper_bound() {
        use crate::sql::dialect::Dialect;
        let ts = emit_limit_offset_required_limit(None, Some(3));
        assert_eq!(
            ts.serialize(Dialect::MySql),
            format!("LIMIT {} OFFSET 3", i64::MAX)
        );
    }

    #[test]
    fn test_string_agg_forms() {
        use crate::sql::dialect::Dialect;
        let arg = || {
            let mut ts = TokenStream::new();
            ts.push(Token::Ident("n".into()));
            ts
        };
        let sep = || {
            let mut ts = TokenStream::new();
            ts.push(Token::LitString(",".into()));
            ts
        };
        assert_eq!(
            emit_string_agg_standard(arg(), sep(), true).serialize(Dialect::Postgres),
            "STRING_AGG(DISTINCT \"n\", ',')"
        );
        assert_eq!(
            emit_string_agg_mysql(arg(), sep(), false).serialize(Dialect::MySql),
            "GROUP_CONCAT(`n` SEPARATOR ',')"
        );
        assert_eq!(
            emit_string_agg_sqlite(arg(), sep(), true).serialize(Dialect::Sqlite),
            "GROUP_CONCAT(DISTINCT \"n\")"
        );
        assert_eq!(
            emit_string_agg_listagg(arg(), sep(), false).serialize(Dialect::Oracle),
            "LISTAGG(\"n\", ',') WITHIN GROUP (ORDER BY \"n\")"
        );
    }
}
