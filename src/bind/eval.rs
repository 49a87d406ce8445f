//! Evaluation of external subtrees.
//!
//! Only the operations an external expression can reasonably contain are
//! supported: name lookup, field access on mappings, arithmetic, comparisons,
//! boolean logic, tuple/list displays, the safe constant functions, and host
//! functions registered on the [`Scope`]. A nested comprehension is never
//! external, so meeting one here means the tree was built inconsistently.

use std::cmp::Ordering;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::bind::{Lookup, Scope};
use crate::catalog::Catalog;
use crate::error::{CompileError, CompileResult};
use crate::tree::source::value_source;
use crate::tree::{BinOpKind, BoolOpKind, CmpOp, ExprNode, Keyword, NodeKind, UnaryOpKind};
use crate::types::Value;

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Evaluate `node` against `scope`.
pub fn evaluate(node: &ExprNode, scope: &Scope, catalog: &dyn Catalog) -> CompileResult<Value> {
    Evaluator { scope, catalog }
        .eval(node)
        .map_err(|e| e.at(|| node.source()))
}

struct Evaluator<'a> {
    scope: &'a Scope,
    catalog: &'a dyn Catalog,
}

impl Evaluator<'_> {
    fn eval(&self, node: &ExprNode) -> CompileResult<Value> {
        let result = match &node.kind {
            NodeKind::Name(id) => self.name(id),
            NodeKind::Constant(value) => Ok(value.clone()),
            NodeKind::Attribute { value, attr } => {
                let base = self.eval(value)?;
                attribute(&base, attr)
            }
            NodeKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut current = self.eval(left)?;
                for (op, right) in ops.iter().zip(comparators) {
                    let right = self.eval(right)?;
                    if !compare(*op, &current, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    current = right;
                }
                Ok(Value::Bool(true))
            }
            NodeKind::BoolOp { op, values } => {
                let mut last = Value::Null;
                for value in values {
                    last = self.eval(value)?;
                    let stop = match op {
                        BoolOpKind::And => !last.truthy(),
                        BoolOpKind::Or => last.truthy(),
                    };
                    if stop {
                        break;
                    }
                }
                Ok(last)
            }
            NodeKind::BinOp { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binop(*op, left, right)
            }
            NodeKind::UnaryOp { op, operand } => {
                let value = self.eval(operand)?;
                unary(*op, value)
            }
            NodeKind::Call {
                func,
                args,
                keywords,
            } => self.call(func, args, keywords),
            NodeKind::Tuple(items) => Ok(Value::Tuple(self.eval_items(items)?)),
            NodeKind::List(items) => Ok(Value::List(self.eval_items(items)?)),
            NodeKind::Starred(_) => Err(CompileError::malformed(
                "starred expression outside of a call",
            )),
            NodeKind::Comprehension(_) => Err(CompileError::malformed(
                "sub-query cannot be evaluated outside the query",
            )),
            NodeKind::FormattedValue(inner) => match self.eval(inner)? {
                Value::Text(s) => Ok(Value::Text(s)),
                other => Ok(Value::Text(value_source(&other))),
            },
        };
        result.map_err(|e| e.at(|| node.source()))
    }

    fn name(&self, id: &str) -> CompileResult<Value> {
        match self.scope.lookup(id) {
            Lookup::Found(value) => Ok(value.clone()),
            Lookup::Unassigned => Err(CompileError::UnboundVariable {
                name: format!("{id} (referenced before assignment)"),
                expr: String::new(),
            }),
            Lookup::Missing => match self.catalog.entity_by_name(id) {
                Some(_) => Ok(Value::EntitySet(id.to_string())),
                None => Err(CompileError::UnboundVariable {
                    name: id.to_string(),
                    expr: String::new(),
                }),
            },
        }
    }

    /// Evaluate items, expanding `*xs`.
    fn eval_items(&self, items: &[ExprNode]) -> CompileResult<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match &item.kind {
                NodeKind::Starred(inner) => match self.eval(inner)? {
                    Value::Tuple(values) | Value::List(values) => out.extend(values),
                    other => {
                        return Err(CompileError::type_mismatch(format!(
                            "cannot unpack {}",
                            other.kind_name()
                        ))
                        .at(|| item.source()))
                    }
                },
                _ => out.push(self.eval(item)?),
            }
        }
        Ok(out)
    }

    fn call(&self, func: &ExprNode, args: &[ExprNode], keywords: &[Keyword]) -> CompileResult<Value> {
        let name = func
            .dotted_name()
            .ok_or_else(|| CompileError::malformed("call target must be a name"))?;
        let args = self.eval_items(args)?;
        let mut kwargs = Vec::with_capacity(keywords.len());
        for kw in keywords {
            kwargs.push((kw.name.as_str(), self.eval(&kw.value)?));
        }

        if let Some(host) = self.scope.function(&name) {
            if !kwargs.is_empty() {
                return Err(CompileError::malformed(format!(
                    "host function {name} does not take keyword arguments"
                )));
            }
            return host(&args).map_err(CompileError::type_mismatch);
        }

        let short = name.rsplit('.').next().unwrap_or(&name);
        let args = Arguments {
            function: short,
            positional: args,
            keywords: kwargs,
        };
        match short {
            "date" => make_date(&args),
            "time" => make_time(&args),
            "datetime" => make_datetime(&args),
            "timedelta" => make_timedelta(&args),
            "Decimal" | "decimal" => make_decimal(&args),
            _ => Err(CompileError::UnknownFunction {
                name: name.clone(),
                expr: String::new(),
            }),
        }
    }
}

// =============================================================================
// Constant constructors
// =============================================================================

struct Arguments<'a> {
    function: &'a str,
    positional: Vec<Value>,
    keywords: Vec<(&'a str, Value)>,
}

impl Arguments<'_> {
    /// Argument by position or keyword, with a default.
    fn int(&self, index: usize, name: &str, default: Option<i64>) -> CompileResult<i64> {
        let value = self
            .positional
            .get(index)
            .or_else(|| self.keywords.iter().find(|(k, _)| *k == name).map(|(_, v)| v));
        match (value, default) {
            (Some(Value::Int(n)), _) => Ok(*n),
            (Some(Value::Bool(b)), _) => Ok(i64::from(*b)),
            (Some(other), _) => Err(CompileError::type_mismatch(format!(
                "{}() argument {name} must be int, not {}",
                self.function,
                other.kind_name()
            ))),
            (None, Some(default)) => Ok(default),
            (None, None) => Err(CompileError::type_mismatch(format!(
                "{}() missing required argument {name}",
                self.function
            ))),
        }
    }

    fn number(&self, name: &str) -> CompileResult<f64> {
        match self.keywords.iter().find(|(k, _)| *k == name).map(|(_, v)| v) {
            None => Ok(0.0),
            Some(Value::Int(n)) => Ok(*n as f64),
            Some(Value::Float(f)) => Ok(*f),
            Some(other) => Err(CompileError::type_mismatch(format!(
                "{}() argument {name} must be a number, not {}",
                self.function,
                other.kind_name()
            ))),
        }
    }
}

fn u32_arg(n: i64) -> CompileResult<u32> {
    u32::try_from(n).map_err(|_| CompileError::type_mismatch(format!("{n} is out of range")))
}

fn make_date(args: &Arguments<'_>) -> CompileResult<Value> {
    let year = i32::try_from(args.int(0, "year", None)?)
        .map_err(|_| CompileError::type_mismatch("year is out of range"))?;
    let month = u32_arg(args.int(1, "month", None)?)?;
    let day = u32_arg(args.int(2, "day", None)?)?;
    NaiveDate::from_ymd_opt(year, month, day)
        .map(Value::Date)
        .ok_or_else(|| CompileError::type_mismatch("day is out of range for month"))
}

fn time_of(args: &Arguments<'_>, offset: usize) -> CompileResult<NaiveTime> {
    let hour = u32_arg(args.int(offset, "hour", Some(0))?)?;
    let minute = u32_arg(args.int(offset + 1, "minute", Some(0))?)?;
    let second = u32_arg(args.int(offset + 2, "second", Some(0))?)?;
    let micro = u32_arg(args.int(offset + 3, "microsecond", Some(0))?)?;
    NaiveTime::from_hms_micro_opt(hour, minute, second, micro)
        .ok_or_else(|| CompileError::type_mismatch("time component out of range"))
}

fn make_time(args: &Arguments<'_>) -> CompileResult<Value> {
    time_of(args, 0).map(Value::Time)
}

fn make_datetime(args: &Arguments<'_>) -> CompileResult<Value> {
    let Value::Date(date) = make_date(args)? else {
        return Err(CompileError::type_mismatch("invalid date"));
    };
    let time = time_of(args, 3)?;
    Ok(Value::DateTime(NaiveDateTime::new(date, time)))
}

fn make_timedelta(args: &Arguments<'_>) -> CompileResult<Value> {
    let positional = |i: usize| -> CompileResult<f64> {
        match args.positional.get(i) {
            None => Ok(0.0),
            Some(Value::Int(n)) => Ok(*n as f64),
            Some(Value::Float(f)) => Ok(*f),
            Some(other) => Err(CompileError::type_mismatch(format!(
                "unsupported type for timedelta component: {}",
                other.kind_name()
            ))),
        }
    };
    let days = positional(0)? + args.number("days")? + 7.0 * args.number("weeks")?;
    let seconds = positional(1)?
        + args.number("seconds")?
        + 60.0 * args.number("minutes")?
        + 3600.0 * args.number("hours")?;
    let micros = positional(2)? + args.number("microseconds")? + 1000.0 * args.number("milliseconds")?;
    let total = days * MICROS_PER_DAY as f64 + seconds * 1e6 + micros;
    if !total.is_finite() || total.abs() > i64::MAX as f64 {
        return Err(CompileError::type_mismatch("timedelta out of range"));
    }
    Ok(Value::Interval(total.round() as i64))
}

fn make_decimal(args: &Arguments<'_>) -> CompileResult<Value> {
    match args.positional.first() {
        Some(Value::Text(s)) => Ok(Value::Decimal(s.trim().to_string())),
        Some(Value::Int(n)) => Ok(Value::Decimal(n.to_string())),
        Some(Value::Float(f)) => Ok(Value::Decimal(f.to_string())),
        None => Ok(Value::Decimal("0".into())),
        Some(other) => Err(CompileError::type_mismatch(format!(
            "cannot convert {} to Decimal",
            other.kind_name()
        ))),
    }
}

// =============================================================================
// Operators
// =============================================================================

fn attribute(base: &Value, attr: &str) -> CompileResult<Value> {
    let part = |v: u32| -> CompileResult<Value> { Ok(Value::Int(i64::from(v))) };
    match (base, attr) {
        (Value::Map(map), _) => map.get(attr).cloned().ok_or_else(|| {
            CompileError::type_mismatch(format!("mapping has no field '{attr}'"))
        }),
        (Value::Date(d), "year") => Ok(Value::Int(i64::from(d.year()))),
        (Value::Date(d), "month") => part(d.month()),
        (Value::Date(d), "day") => part(d.day()),
        (Value::DateTime(dt), "year") => Ok(Value::Int(i64::from(dt.year()))),
        (Value::DateTime(dt), "month") => part(dt.month()),
        (Value::DateTime(dt), "day") => part(dt.day()),
        (Value::DateTime(dt), "hour") => part(dt.hour()),
        (Value::DateTime(dt), "minute") => part(dt.minute()),
        (Value::DateTime(dt), "second") => part(dt.second()),
        (Value::DateTime(dt), "date") => Ok(Value::Date(dt.date())),
        (Value::Time(t), "hour") => part(t.hour()),
        (Value::Time(t), "minute") => part(t.minute()),
        (Value::Time(t), "second") => part(t.second()),
        (other, _) => Err(CompileError::type_mismatch(format!(
            "'{}' object has no attribute '{attr}'",
            other.kind_name()
        ))),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Int(n) => Some(*n),
        _ => None,
    }
}

/// Host-language equality; numerics compare across kinds.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

pub(crate) fn order(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Interval(x), Value::Interval(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Tuple(x), Value::Tuple(y)) => {
            for (l, r) in x.iter().zip(y) {
                match order(l, r)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => None,
    }
}

fn contains(container: &Value, item: &Value) -> CompileResult<bool> {
    match (container, item) {
        (Value::Tuple(items) | Value::List(items), _) => {
            Ok(items.iter().any(|v| values_equal(v, item)))
        }
        (Value::Text(haystack), Value::Text(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Map(map), Value::Text(key)) => Ok(map.contains_key(key)),
        _ => Err(CompileError::type_mismatch(format!(
            "argument of type '{}' is not a container for {}",
            container.kind_name(),
            item.kind_name()
        ))),
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> CompileResult<bool> {
    let ordered = |accept: fn(Ordering) -> bool| {
        order(left, right).map(accept).ok_or_else(|| {
            CompileError::type_mismatch(format!(
                "'{}' not supported between {} and {}",
                op.symbol(),
                left.kind_name(),
                right.kind_name()
            ))
        })
    };
    match op {
        CmpOp::Eq | CmpOp::Is => Ok(values_equal(left, right)),
        CmpOp::NotEq | CmpOp::IsNot => Ok(!values_equal(left, right)),
        CmpOp::Lt => ordered(|o| o == Ordering::Less),
        CmpOp::LtE => ordered(|o| o != Ordering::Greater),
        CmpOp::Gt => ordered(|o| o == Ordering::Greater),
        CmpOp::GtE => ordered(|o| o != Ordering::Less),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
    }
}

fn overflow() -> CompileError {
    CompileError::type_mismatch("integer overflow")
}

fn binop(op: BinOpKind, left: Value, right: Value) -> CompileResult<Value> {
    use BinOpKind::*;

    // Integer arithmetic first, bools count as ints.
    if let (Some(a), Some(b)) = (as_i64(&left), as_i64(&right)) {
        let result = match op {
            Add => a.checked_add(b),
            Sub => a.checked_sub(b),
            Mult => a.checked_mul(b),
            Div => {
                if b == 0 {
                    return Err(CompileError::type_mismatch("division by zero"));
                }
                return Ok(Value::Float(a as f64 / b as f64));
            }
            FloorDiv | Mod if b == 0 => {
                return Err(CompileError::type_mismatch("integer division or modulo by zero"))
            }
            FloorDiv => Some(a.div_euclid(b) - i64::from(b < 0 && a.rem_euclid(b) != 0)),
            Mod => Some(a - b * (a.div_euclid(b) - i64::from(b < 0 && a.rem_euclid(b) != 0))),
            Pow => {
                if b < 0 {
                    return Ok(Value::Float((a as f64).powf(b as f64)));
                }
                u32::try_from(b).ok().and_then(|e| a.checked_pow(e))
            }
            BitAnd => Some(a & b),
            BitOr => Some(a | b),
            BitXor => Some(a ^ b),
            LShift => u32::try_from(b).ok().and_then(|s| a.checked_shl(s)),
            RShift => u32::try_from(b).ok().map(|s| a >> s.min(63)),
        };
        return result.map(Value::Int).ok_or_else(overflow);
    }

    if let (Some(a), Some(b)) = (as_f64(&left), as_f64(&right)) {
        let result = match op {
            Add => a + b,
            Sub => a - b,
            Mult => a * b,
            Div | FloorDiv | Mod if b == 0.0 => {
                return Err(CompileError::type_mismatch("float division by zero"))
            }
            Div => a / b,
            FloorDiv => (a / b).floor(),
            Mod => a - b * (a / b).floor(),
            Pow => a.powf(b),
            BitAnd | BitOr | BitXor | LShift | RShift => {
                return Err(unsupported_operands(op, &left, &right))
            }
        };
        return Ok(Value::Float(result));
    }

    match (op, left, right) {
        (Add, Value::Text(a), Value::Text(b)) => Ok(Value::Text(a + &b)),
        (Add, Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (Add, Value::Tuple(mut a), Value::Tuple(b)) => {
            a.extend(b);
            Ok(Value::Tuple(a))
        }
        (Add, Value::Interval(a), Value::Interval(b)) => {
            a.checked_add(b).map(Value::Interval).ok_or_else(overflow)
        }
        (Sub, Value::Interval(a), Value::Interval(b)) => {
            a.checked_sub(b).map(Value::Interval).ok_or_else(overflow)
        }
        (Add, Value::Date(d), Value::Interval(us)) | (Add, Value::Interval(us), Value::Date(d)) => {
            shift_date(d, us / MICROS_PER_DAY)
        }
        (Sub, Value::Date(d), Value::Interval(us)) => shift_date(d, -(us / MICROS_PER_DAY)),
        (Add, Value::DateTime(dt), Value::Interval(us))
        | (Add, Value::Interval(us), Value::DateTime(dt)) => shift_datetime(dt, us),
        (Sub, Value::DateTime(dt), Value::Interval(us)) => shift_datetime(dt, -us),
        (Sub, Value::Date(a), Value::Date(b)) => Ok(Value::Interval(
            a.signed_duration_since(b).num_days() * MICROS_PER_DAY,
        )),
        (Sub, Value::DateTime(a), Value::DateTime(b)) => a
            .signed_duration_since(b)
            .num_microseconds()
            .map(Value::Interval)
            .ok_or_else(overflow),
        (op, left, right) => Err(unsupported_operands(op, &left, &right)),
    }
}

fn shift_date(date: NaiveDate, days: i64) -> CompileResult<Value> {
    date.checked_add_signed(Duration::days(days))
        .map(Value::Date)
        .ok_or_else(|| CompileError::type_mismatch("date value out of range"))
}

fn shift_datetime(dt: NaiveDateTime, micros: i64) -> CompileResult<Value> {
    dt.checked_add_signed(Duration::microseconds(micros))
        .map(Value::DateTime)
        .ok_or_else(|| CompileError::type_mismatch("date value out of range"))
}

fn unsupported_operands(op: BinOpKind, left: &Value, right: &Value) -> CompileError {
    CompileError::type_mismatch(format!(
        "unsupported operand types for {}: {} and {}",
        op.symbol(),
        left.kind_name(),
        right.kind_name()
    ))
}

fn unary(op: UnaryOpKind, value: Value) -> CompileResult<Value> {
    match (op, value) {
        (UnaryOpKind::Not, v) => Ok(Value::Bool(!v.truthy())),
        (UnaryOpKind::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOpKind::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(b))),
        (UnaryOpKind::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOpKind::Neg, Value::Interval(us)) => Ok(Value::Interval(-us)),
        (UnaryOpKind::Neg, Value::Decimal(d)) => Ok(Value::Decimal(match d.strip_prefix('-') {
            Some(rest) => rest.to_string(),
            None => format!("-{d}"),
        })),
        (UnaryOpKind::Pos, v @ (Value::Int(_) | Value::Float(_) | Value::Decimal(_) | Value::Interval(_))) => Ok(v),
        (UnaryOpKind::Pos, Value::Bool(b)) => Ok(Value::Int(i64::from(b))),
        (UnaryOpKind::Invert, Value::Int(n)) => Ok(Value::Int(!n)),
        (UnaryOpKind::Invert, Value::Bool(b)) => Ok(Value::Int(!i64::from(b))),
        (op, v) => Err(CompileError::type_mismatch(format!(
            "bad operand type for unary {}: {}",
            match op {
                UnaryOpKind::Not => "not",
                UnaryOpKind::Neg => "-",
                UnaryOpKind::Pos => "+",
                UnaryOpKind::Invert => "~",
            },
            v.kind_name()
        ))),
    }
}
