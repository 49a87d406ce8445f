//! Built-in function registry.
//!
//! A single immutable table, built on first use and shared read-only by every
//! compile. The classifier consults it to keep built-in calls inside the query;
//! the translator consults it to dispatch calls to SQL.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::types::ValueType;

/// Date/time component extracted by `year(d)` or `d.year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl DatePart {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "year" => Some(DatePart::Year),
            "month" => Some(DatePart::Month),
            "day" => Some(DatePart::Day),
            "hour" => Some(DatePart::Hour),
            "minute" => Some(DatePart::Minute),
            "second" => Some(DatePart::Second),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            DatePart::Year => "YEAR",
            DatePart::Month => "MONTH",
            DatePart::Day => "DAY",
            DatePart::Hour => "HOUR",
            DatePart::Minute => "MINUTE",
            DatePart::Second => "SECOND",
        }
    }

    /// Whether the part exists on values of `value_type`.
    pub fn applies_to(self, value_type: &ValueType) -> bool {
        match self {
            DatePart::Year | DatePart::Month | DatePart::Day => {
                matches!(value_type, ValueType::Date | ValueType::DateTime)
            }
            DatePart::Hour | DatePart::Minute | DatePart::Second => {
                matches!(value_type, ValueType::Time | ValueType::DateTime)
            }
        }
    }
}

/// How a call is translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Plain SQL scalar function.
    Scalar,
    /// Date/time component extraction.
    Extract(DatePart),
    /// Aggregate over a column, collection or sub-query.
    Aggregate,
    /// `count`, which has its own argument rules.
    Count,
    /// Ordered-set aggregate rendered with `WITHIN GROUP (ORDER BY ...)`.
    OrderedSet,
    /// String aggregation with a separator.
    StringAgg,
    /// `exists(subquery)`.
    Exists,
}

/// Accepted argument domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgDomain {
    Any,
    Numeric,
    Text,
    Temporal,
    Ordered,
}

impl ArgDomain {
    pub fn accepts(self, value_type: &ValueType) -> bool {
        match self {
            ArgDomain::Any => true,
            ArgDomain::Numeric => value_type.is_numeric() || value_type.is_null(),
            ArgDomain::Text => value_type.is_text() || value_type.is_null(),
            ArgDomain::Temporal => value_type.is_temporal() || value_type.is_null(),
            ArgDomain::Ordered => value_type.is_ordered() || value_type.is_null(),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            ArgDomain::Any => "any value",
            ArgDomain::Numeric => "a number",
            ArgDomain::Text => "a string",
            ArgDomain::Temporal => "a date or time",
            ArgDomain::Ordered => "an ordered value",
        }
    }
}

/// Result type rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    /// Type of the first argument, booleans widened to int.
    Argument,
    /// Common type of all arguments.
    Common,
    Fixed(ValueType),
}

/// Registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub sql_name: &'static str,
    pub kind: FunctionKind,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub domain: ArgDomain,
    pub returns: ReturnType,
    /// Scalar counterpart used when called with two or more arguments
    /// (`min(a, b)` is `LEAST(a, b)`).
    pub scalar_variant: Option<&'static str>,
}

impl FunctionDescriptor {
    fn new(name: &'static str, sql_name: &'static str, kind: FunctionKind) -> Self {
        Self {
            name,
            sql_name,
            kind,
            min_args: 1,
            max_args: Some(1),
            domain: ArgDomain::Any,
            returns: ReturnType::Argument,
            scalar_variant: None,
        }
    }

    fn args(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_args = min;
        self.max_args = max;
        self
    }

    fn domain(mut self, domain: ArgDomain) -> Self {
        self.domain = domain;
        self
    }

    fn returns(mut self, returns: ReturnType) -> Self {
        self.returns = returns;
        self
    }

    fn scalar_variant(mut self, sql_name: &'static str) -> Self {
        self.scalar_variant = Some(sql_name);
        self
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.kind,
            FunctionKind::Aggregate
                | FunctionKind::Count
                | FunctionKind::OrderedSet
                | FunctionKind::StringAgg
        )
    }

    pub fn accepts_arity(&self, n: usize) -> bool {
        n >= self.min_args && self.max_args.map_or(true, |max| n <= max)
    }

    /// Standard deviation and variance, which not every dialect provides.
    pub fn is_statistical(&self) -> bool {
        matches!(
            self.sql_name,
            "STDDEV_SAMP" | "STDDEV_POP" | "VAR_SAMP" | "VAR_POP"
        )
    }
}

/// Name-indexed table of built-ins.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionDescriptor>,
}

/// Module prefixes that do not change which built-in is meant.
const TRANSPARENT_MODULES: &[&str] = &["math", "builtins", "sql"];

/// Functions whose result can be computed before translation when every
/// argument is constant.
const CONST_FUNCTIONS: &[&str] = &[
    "date",
    "time",
    "datetime",
    "timedelta",
    "decimal",
    "Decimal",
    "datetime.date",
    "datetime.time",
    "datetime.datetime",
    "datetime.timedelta",
    "decimal.Decimal",
];

impl FunctionRegistry {
    fn register(&mut self, descriptor: FunctionDescriptor) {
        self.functions.insert(descriptor.name, descriptor);
    }

    /// Resolve a possibly qualified name (`math.sqrt`).
    pub fn lookup(&self, qualified: &str) -> Option<&FunctionDescriptor> {
        if let Some(found) = self.functions.get(qualified) {
            return Some(found);
        }
        let (module, name) = qualified.rsplit_once('.')?;
        if TRANSPARENT_MODULES.contains(&module) {
            self.functions.get(name)
        } else {
            None
        }
    }

    pub fn contains(&self, qualified: &str) -> bool {
        self.lookup(qualified).is_some()
    }

    pub fn is_const_function(&self, qualified: &str) -> bool {
        CONST_FUNCTIONS.contains(&qualified)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn standard() -> Self {
        use ArgDomain::*;
        use FunctionKind::*;

        let mut r = FunctionRegistry::default();
        let float = || ReturnType::Fixed(ValueType::FLOAT);
        let int = || ReturnType::Fixed(ValueType::INT);
        let text = || ReturnType::Fixed(ValueType::Text);

        // Math
        r.register(FunctionDescriptor::new("abs", "ABS", Scalar).domain(Numeric));
        r.register(
            FunctionDescriptor::new("round", "ROUND", Scalar)
                .args(1, Some(2))
                .domain(Numeric),
        );
        r.register(FunctionDescriptor::new("ceil", "CEIL", Scalar).domain(Numeric).returns(int()));
        r.register(FunctionDescriptor::new("floor", "FLOOR", Scalar).domain(Numeric).returns(int()));
        r.register(FunctionDescriptor::new("sqrt", "SQRT", Scalar).domain(Numeric).returns(float()));
        r.register(FunctionDescriptor::new("exp", "EXP", Scalar).domain(Numeric).returns(float()));
        r.register(FunctionDescriptor::new("log", "LN", Scalar).domain(Numeric).returns(float()));
        r.register(
            FunctionDescriptor::new("pow", "POWER", Scalar)
                .args(2, Some(2))
                .domain(Numeric)
                .returns(float()),
        );
        r.register(FunctionDescriptor::new("sign", "SIGN", Scalar).domain(Numeric).returns(int()));

        // Strings
        r.register(FunctionDescriptor::new("upper", "UPPER", Scalar).domain(Text).returns(text()));
        r.register(FunctionDescriptor::new("lower", "LOWER", Scalar).domain(Text).returns(text()));
        r.register(FunctionDescriptor::new("len", "LENGTH", Scalar).domain(Text).returns(int()));
        r.register(FunctionDescriptor::new("trim", "TRIM", Scalar).domain(Text).returns(text()));
        r.register(
            FunctionDescriptor::new("replace", "REPLACE", Scalar)
                .args(3, Some(3))
                .domain(Text)
                .returns(text()),
        );
        r.register(
            FunctionDescriptor::new("substr", "SUBSTR", Scalar)
                .args(2, Some(3))
                .returns(text()),
        );

        // Null handling
        r.register(
            FunctionDescriptor::new("coalesce", "COALESCE", Scalar)
                .args(2, None)
                .returns(ReturnType::Common),
        );

        // Date/time extraction
        for (name, part) in [
            ("year", DatePart::Year),
            ("month", DatePart::Month),
            ("day", DatePart::Day),
            ("hour", DatePart::Hour),
            ("minute", DatePart::Minute),
            ("second", DatePart::Second),
        ] {
            r.register(
                FunctionDescriptor::new(name, part.keyword(), Extract(part))
                    .domain(Temporal)
                    .returns(int()),
            );
        }

        // Aggregates
        r.register(FunctionDescriptor::new("count", "COUNT", Count).args(0, Some(1)).returns(int()));
        r.register(FunctionDescriptor::new("sum", "SUM", Aggregate).domain(Numeric));
        r.register(FunctionDescriptor::new("avg", "AVG", Aggregate).domain(Numeric).returns(float()));
        r.register(
            FunctionDescriptor::new("min", "MIN", Aggregate)
                .args(1, None)
                .domain(Ordered)
                .returns(ReturnType::Common)
                .scalar_variant("LEAST"),
        );
        r.register(
            FunctionDescriptor::new("max", "MAX", Aggregate)
                .args(1, None)
                .domain(Ordered)
                .returns(ReturnType::Common)
                .scalar_variant("GREATEST"),
        );
        for (name, sql) in [
            ("stddev", "STDDEV_SAMP"),
            ("stddev_pop", "STDDEV_POP"),
            ("variance", "VAR_SAMP"),
            ("var_pop", "VAR_POP"),
        ] {
            r.register(FunctionDescriptor::new(name, sql, Aggregate).domain(Numeric).returns(float()));
        }
        r.register(
            FunctionDescriptor::new("median", "PERCENTILE_CONT", OrderedSet)
                .domain(Numeric)
                .returns(float()),
        );
        r.register(
            FunctionDescriptor::new("quantile", "PERCENTILE_CONT", OrderedSet)
                .args(2, Some(2))
                .domain(Numeric)
                .returns(float()),
        );
        r.register(FunctionDescriptor::new("mode", "MODE", OrderedSet));
        for name in ["group_concat", "string_agg"] {
            r.register(
                FunctionDescriptor::new(name, "STRING_AGG", StringAgg)
                    .args(1, Some(2))
                    .returns(text()),
            );
        }

        r.register(
            FunctionDescriptor::new("exists", "EXISTS", Exists).returns(ReturnType::Fixed(ValueType::BOOL)),
        );
        r
    }
}

/// The process-wide built-in table.
pub static BUILTINS: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::standard);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_plain_and_qualified() {
        assert_eq!(BUILTINS.lookup("sqrt").map(|f| f.sql_name), Some("SQRT"));
        assert_eq!(BUILTINS.lookup("math.sqrt").map(|f| f.sql_name), Some("SQRT"));
        assert!(BUILTINS.lookup("os.sqrt").is_none());
        assert!(BUILTINS.lookup("frobnicate").is_none());
    }

    #[test]
    fn test_aggregate_flags() {
        assert!(BUILTINS.lookup("avg").unwrap().is_aggregate());
        assert!(BUILTINS.lookup("count").unwrap().is_aggregate());
        assert!(BUILTINS.lookup("median").unwrap().is_aggregate());
        assert!(!BUILTINS.lookup("upper").unwrap().is_aggregate());
        assert!(!BUILTINS.lookup("exists").unwrap().is_aggregate());
    }

    #[test]
    fn test_arity() {
        let pow = BUILTINS.lookup("pow").unwrap();
        assert!(pow.accepts_arity(2));
        assert!(!pow.accepts_arity(1));
        let coalesce = BUILTINS.lookup("coalesce").unwrap();
        assert!(coalesce.accepts_arity(5));
        let count = BUILTINS.lookup("count").unwrap();
        assert!(count.accepts_arity(0));
    }

    #[test]
    fn test_const_functions() {
        assert!(BUILTINS.is_const_function("date"));
        assert!(BUILTINS.is_const_function("datetime.timedelta"));
        assert!(!BUILTINS.is_const_function("sum"));
    }

    #[test]
    fn test_date_part_domain() {
        assert!(DatePart::Year.applies_to(&ValueType::Date));
        assert!(!DatePart::Hour.applies_to(&ValueType::Date));
        assert!(DatePart::Hour.applies_to(&ValueType::DateTime));
    }
}
