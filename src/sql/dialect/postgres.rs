//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - `$1` placeholders
//! - Row value comparisons
//! - Ordered-set aggregates with WITHIN GROUP
//! - `#` for bitwise XOR
//! - 63-byte identifiers

use super::helpers;
use super::{ParamStyle, SqlDialect};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn identifier_max_len(&self) -> usize {
        63
    }

    fn format_bytes_literal(&self, bytes: &[u8]) -> String {
        format!("'\\x{}'::bytea", helpers::hex(bytes))
    }

    fn paramstyle(&self) -> ParamStyle {
        ParamStyle::Numeric
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn bit_xor_operator(&self) -> Option<&'static str> {
        Some("#")
    }

    fn supports_composite_key_aggregation(&self) -> bool {
        true
    }

    fn supports_within_group(&self) -> bool {
        true
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_postgres(name)
    }
}
