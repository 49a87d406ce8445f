//! T-SQL (SQL Server / Azure SQL) dialect.
//!
//! T-SQL has significant differences from ANSI:
//! - Square bracket identifier quoting (`[name]`)
//! - No boolean type: predicates cannot be selected or compared
//! - OFFSET FETCH for pagination (requires ORDER BY)
//! - N'...' prefix for Unicode strings
//! - `@p1` placeholders
//! - String concatenation with `+`
//! - DATEPART instead of EXTRACT
//! - No row values, no shifts, no interval arithmetic

use super::helpers;
use super::{ParamStyle, SqlDialect};
use crate::functions::DatePart;
use crate::sql::token::TokenStream;

/// T-SQL (SQL Server) dialect.
#[derive(Debug, Clone, Copy)]
pub struct TSql;

impl SqlDialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        // T-SQL uses N'...' for Unicode strings
        if !s.is_ascii() {
            helpers::quote_string_unicode(s)
        } else {
            helpers::quote_string_single(s)
        }
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        // T-SQL doesn't support DATE 'YYYY-MM-DD' syntax
        format!("'{}'", date)
    }

    fn format_time_literal(&self, time: &str) -> String {
        format!("'{}'", time)
    }

    fn format_timestamp_literal(&self, ts: &str) -> String {
        format!("'{}'", ts)
    }

    fn format_bytes_literal(&self, bytes: &[u8]) -> String {
        format!("0x{}", helpers::hex(bytes))
    }

    fn paramstyle(&self) -> ParamStyle {
        ParamStyle::AtNamed
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_tsql(limit, offset)
    }

    fn requires_order_by_for_offset(&self) -> bool {
        true
    }

    fn concat_operator(&self) -> &'static str {
        "+"
    }

    fn supports_bit_shift(&self) -> bool {
        false
    }

    fn supports_interval_arithmetic(&self) -> bool {
        // DATEADD only, which takes a unit rather than an interval value
        false
    }

    fn integer_cast_type(&self) -> &'static str {
        "INT"
    }

    fn float_cast_type(&self) -> &'static str {
        "FLOAT"
    }

    fn supports_boolean_type(&self) -> bool {
        false
    }

    fn supports_row_values(&self) -> bool {
        false
    }

    fn emit_extract(&self, part: DatePart, arg: TokenStream) -> TokenStream {
        helpers::emit_extract_tsql(part, arg)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_tsql(name)
    }
}
