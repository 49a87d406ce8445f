//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting
//! - Backslash escapes inside string literals
//! - `%s` placeholders (DB-API format style)
//! - No || concatenation (uses CONCAT())
//! - No NULLS FIRST/LAST
//! - OFFSET is only valid after LIMIT
//! - COUNT(DISTINCT a, b) takes a column list
//! - GROUP_CONCAT instead of STRING_AGG
//! - Intervals as `INTERVAL n MICROSECOND`

use super::helpers;
use super::{ParamStyle, SqlDialect};
use crate::sql::token::TokenStream;

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_backslash(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn identifier_max_len(&self) -> usize {
        64
    }

    fn format_interval_literal(&self, micros: i64) -> String {
        format!("INTERVAL {} MICROSECOND", micros)
    }

    fn paramstyle(&self) -> ParamStyle {
        ParamStyle::Format
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_required_limit(limit, offset)
    }

    fn supports_concat_operator(&self) -> bool {
        // || is logical OR in MySQL by default
        false
    }

    fn integer_cast_type(&self) -> &'static str {
        "SIGNED"
    }

    fn float_cast_type(&self) -> &'static str {
        "DOUBLE"
    }

    fn supports_composite_key_aggregation(&self) -> bool {
        true
    }

    fn distinct_count_takes_column_list(&self) -> bool {
        true
    }

    fn emit_string_agg(&self, arg: TokenStream, sep: TokenStream, distinct: bool) -> TokenStream {
        helpers::emit_string_agg_mysql(arg, sep, distinct)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_mysql(name)
    }
}
