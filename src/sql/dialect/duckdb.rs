//! DuckDB SQL dialect.
//!
//! DuckDB is largely PostgreSQL-compatible:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type
//! - `?` placeholders
//! - Row values and WITHIN GROUP
//! - No infix XOR operator (`xor()` only), so XOR is emulated

use super::helpers;
use super::{ParamStyle, SqlDialect};

/// DuckDB SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn format_bytes_literal(&self, bytes: &[u8]) -> String {
        let escaped: String = bytes.iter().map(|b| format!("\\x{b:02X}")).collect();
        format!("'{}'::BLOB", escaped)
    }

    fn paramstyle(&self) -> ParamStyle {
        ParamStyle::Qmark
    }

    fn bit_xor_operator(&self) -> Option<&'static str> {
        None
    }

    fn float_cast_type(&self) -> &'static str {
        "DOUBLE"
    }

    fn supports_composite_key_aggregation(&self) -> bool {
        true
    }

    fn supports_within_group(&self) -> bool {
        true
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_duckdb(name)
    }
}
