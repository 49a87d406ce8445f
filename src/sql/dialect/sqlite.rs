//! SQLite SQL dialect.
//!
//! SQLite differences:
//! - Dynamic typing, booleans are integers
//! - `?` placeholders
//! - No EXTRACT (uses STRFTIME)
//! - No interval type or date arithmetic operators
//! - No STDDEV/VARIANCE aggregates
//! - GROUP_CONCAT instead of STRING_AGG
//! - Multi-argument MAX/MIN instead of GREATEST/LEAST

use super::helpers;
use super::{ParamStyle, SqlDialect};
use crate::functions::DatePart;
use crate::sql::token::TokenStream;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        // Dates are stored as ISO-8601 text
        helpers::quote_string_single(date)
    }

    fn format_time_literal(&self, time: &str) -> String {
        helpers::quote_string_single(time)
    }

    fn format_timestamp_literal(&self, ts: &str) -> String {
        helpers::quote_string_single(ts)
    }

    fn paramstyle(&self) -> ParamStyle {
        ParamStyle::Qmark
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_required_limit(limit, offset)
    }

    fn bit_xor_operator(&self) -> Option<&'static str> {
        None
    }

    fn supports_interval_arithmetic(&self) -> bool {
        false
    }

    fn float_cast_type(&self) -> &'static str {
        "REAL"
    }

    fn emit_extract(&self, part: DatePart, arg: TokenStream) -> TokenStream {
        helpers::emit_extract_sqlite(part, arg)
    }

    fn supports_statistical_aggregates(&self) -> bool {
        false
    }

    fn emit_string_agg(&self, arg: TokenStream, sep: TokenStream, distinct: bool) -> TokenStream {
        helpers::emit_string_agg_sqlite(arg, sep, distinct)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_sqlite(name)
    }
}
