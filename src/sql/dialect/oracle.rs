//! Oracle SQL dialect.
//!
//! Oracle differences:
//! - 30-character identifiers (pre-12.2 limit, kept for portability)
//! - No `AS` before table aliases
//! - `:p1` placeholders
//! - No boolean type in SQL
//! - OFFSET/FETCH FIRST pagination
//! - MOD() instead of `%`, no infix bitwise operators
//! - LISTAGG, STATS_MODE, NUMTODSINTERVAL

use super::helpers;
use super::{ParamStyle, SqlDialect};
use crate::sql::token::{Token, TokenStream};

/// Oracle SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl SqlDialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn identifier_max_len(&self) -> usize {
        30
    }

    fn format_time_literal(&self, time: &str) -> String {
        // No TIME type
        helpers::quote_string_single(time)
    }

    fn format_bytes_literal(&self, bytes: &[u8]) -> String {
        format!("HEXTORAW('{}')", helpers::hex(bytes))
    }

    fn format_interval_literal(&self, micros: i64) -> String {
        format!("NUMTODSINTERVAL({}, 'SECOND')", helpers::seconds(micros))
    }

    fn paramstyle(&self) -> ParamStyle {
        ParamStyle::Named
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_fetch_first(limit, offset)
    }

    fn supports_bitwise_operators(&self) -> bool {
        false
    }

    fn bit_xor_operator(&self) -> Option<&'static str> {
        None
    }

    fn supports_bit_shift(&self) -> bool {
        false
    }

    fn mod_as_function(&self) -> bool {
        true
    }

    fn float_cast_type(&self) -> &'static str {
        "BINARY_DOUBLE"
    }

    fn supports_boolean_type(&self) -> bool {
        false
    }

    fn supports_row_values(&self) -> bool {
        false
    }

    fn table_alias_keyword(&self) -> bool {
        false
    }

    fn supports_within_group(&self) -> bool {
        true
    }

    fn emit_string_agg(&self, arg: TokenStream, sep: TokenStream, distinct: bool) -> TokenStream {
        helpers::emit_string_agg_listagg(arg, sep, distinct)
    }

    fn emit_mode(&self, arg: TokenStream) -> Option<TokenStream> {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("STATS_MODE".into()))
            .lparen()
            .append(&arg)
            .rparen();
        Some(ts)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_oracle(name)
    }
}
