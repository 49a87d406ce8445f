//! Value domains and the coercion table.
//!
//! Every typed node produced by the translator carries a [`ValueType`]. Binary
//! operators and comparisons consult [`coerce`] to find the common type of two
//! operands; `None` means the pair is incomparable and translation fails with
//! `TypeMismatch`.
//!
//! Runtime values supplied by the calling scope are [`Value`]s. Before they can
//! be bound as parameters they are passed through [`ValueType::normalize`],
//! which infers their type and flattens collections into `SetOf(T)` shapes.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, EntityId};

// =============================================================================
// Types
// =============================================================================

/// Numeric sub-kinds, declared in widening order.
///
/// The derived `Ord` is load-bearing: the common type of two numerics is the
/// wider of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericKind {
    Bool,
    Int,
    Float,
    Decimal,
}

/// SQL-level type of a typed node or bound parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Type of the `None` literal; compatible with everything.
    Null,
    Numeric(NumericKind),
    Text,
    Date,
    Time,
    DateTime,
    Interval,
    Bytes,
    Entity(EntityId),
    SetOf(Box<ValueType>),
    /// Fixed-arity tuple, rendered as a SQL row value or a column list.
    Row(Vec<ValueType>),
}

impl ValueType {
    pub const BOOL: ValueType = ValueType::Numeric(NumericKind::Bool);
    pub const INT: ValueType = ValueType::Numeric(NumericKind::Int);
    pub const FLOAT: ValueType = ValueType::Numeric(NumericKind::Float);
    pub const DECIMAL: ValueType = ValueType::Numeric(NumericKind::Decimal);

    pub fn set_of(element: ValueType) -> Self {
        ValueType::SetOf(Box::new(element))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, ValueType::Numeric(NumericKind::Bool))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Numeric(_))
    }

    /// Numeric but not boolean.
    pub fn is_number(&self) -> bool {
        matches!(self, ValueType::Numeric(kind) if *kind != NumericKind::Bool)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ValueType::Numeric(NumericKind::Int) | ValueType::Numeric(NumericKind::Bool)
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ValueType::Text)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ValueType::Null)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ValueType::Date | ValueType::DateTime | ValueType::Time)
    }

    pub fn entity(&self) -> Option<EntityId> {
        match self {
            ValueType::Entity(id) => Some(*id),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<&ValueType> {
        match self {
            ValueType::SetOf(inner) => Some(inner),
            _ => None,
        }
    }

    /// Whether values of this type have a meaningful order.
    pub fn is_ordered(&self) -> bool {
        match self {
            ValueType::Numeric(_)
            | ValueType::Text
            | ValueType::Date
            | ValueType::Time
            | ValueType::DateTime
            | ValueType::Interval
            | ValueType::Bytes => true,
            ValueType::Row(items) => items.iter().all(ValueType::is_ordered),
            ValueType::Null | ValueType::Entity(_) | ValueType::SetOf(_) => false,
        }
    }

    /// Infer the type of a runtime value and normalize its shape.
    ///
    /// Lists are flattened into `SetOf(T)` where `T` is the common type of the
    /// elements; tuples become `Row`. Entity references are resolved by name
    /// against the catalog. Mappings have no SQL counterpart and are rejected.
    pub fn normalize(value: &Value, catalog: &dyn Catalog) -> Result<Normalized, String> {
        let (value_type, value) = match value {
            Value::Null => (ValueType::Null, Value::Null),
            Value::Bool(b) => (ValueType::BOOL, Value::Bool(*b)),
            Value::Int(n) => (ValueType::INT, Value::Int(*n)),
            Value::Float(f) => {
                if !f.is_finite() {
                    return Err(format!("non-finite float {f}"));
                }
                (ValueType::FLOAT, Value::Float(*f))
            }
            Value::Decimal(s) => {
                if !is_decimal_literal(s) {
                    return Err(format!("malformed decimal '{s}'"));
                }
                (ValueType::DECIMAL, Value::Decimal(s.clone()))
            }
            Value::Text(s) => (ValueType::Text, Value::Text(s.clone())),
            Value::Date(d) => (ValueType::Date, Value::Date(*d)),
            Value::Time(t) => (ValueType::Time, Value::Time(*t)),
            Value::DateTime(dt) => (ValueType::DateTime, Value::DateTime(*dt)),
            Value::Interval(us) => (ValueType::Interval, Value::Interval(*us)),
            Value::Bytes(b) => (ValueType::Bytes, Value::Bytes(b.clone())),
            Value::Tuple(items) => {
                let mut types = Vec::with_capacity(items.len());
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let n = ValueType::normalize(item, catalog)?;
                    if matches!(n.value_type, ValueType::SetOf(_)) {
                        return Err("collection nested inside a tuple".into());
                    }
                    types.push(n.value_type);
                    values.push(n.value);
                }
                (ValueType::Row(types), Value::Tuple(values))
            }
            Value::List(items) => {
                let mut element = ValueType::Null;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let n = ValueType::normalize(item, catalog)?;
                    if matches!(n.value_type, ValueType::SetOf(_)) {
                        return Err("nested collection".into());
                    }
                    element = coerce(&element, &n.value_type).ok_or_else(|| {
                        format!(
                            "collection mixes incompatible element types {} and {}",
                            element, n.value_type
                        )
                    })?;
                    values.push(n.value);
                }
                (ValueType::set_of(element), Value::List(values))
            }
            Value::EntitySet(name) => {
                let id = catalog
                    .entity_by_name(name)
                    .ok_or_else(|| format!("unknown entity '{name}'"))?;
                (
                    ValueType::set_of(ValueType::Entity(id)),
                    Value::EntitySet(name.clone()),
                )
            }
            Value::Entity { entity, key } => {
                let id = catalog
                    .entity_by_name(entity)
                    .ok_or_else(|| format!("unknown entity '{entity}'"))?;
                let pk = catalog.entity_primary_key_columns(id);
                if pk.len() != key.len() {
                    return Err(format!(
                        "{entity} key has {} columns, got {} values",
                        pk.len(),
                        key.len()
                    ));
                }
                let mut values = Vec::with_capacity(key.len());
                for part in key {
                    let n = ValueType::normalize(part, catalog)?;
                    if matches!(n.value_type, ValueType::SetOf(_) | ValueType::Row(_)) {
                        return Err(format!("{entity} key must be scalar"));
                    }
                    values.push(n.value);
                }
                (
                    ValueType::Entity(id),
                    Value::Entity {
                        entity: entity.clone(),
                        key: values,
                    },
                )
            }
            Value::Map(_) => return Err("mapping".into()),
        };
        Ok(Normalized { value_type, value })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Null => write!(f, "NoneType"),
            ValueType::Numeric(NumericKind::Bool) => write!(f, "bool"),
            ValueType::Numeric(NumericKind::Int) => write!(f, "int"),
            ValueType::Numeric(NumericKind::Float) => write!(f, "float"),
            ValueType::Numeric(NumericKind::Decimal) => write!(f, "Decimal"),
            ValueType::Text => write!(f, "str"),
            ValueType::Date => write!(f, "date"),
            ValueType::Time => write!(f, "time"),
            ValueType::DateTime => write!(f, "datetime"),
            ValueType::Interval => write!(f, "timedelta"),
            ValueType::Bytes => write!(f, "bytes"),
            ValueType::Entity(id) => write!(f, "entity#{}", id.0),
            ValueType::SetOf(inner) => write!(f, "Set({inner})"),
            ValueType::Row(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Common type of two operands, or `None` when they are incomparable.
///
/// Symmetric for every pair: `coerce(a, b) == coerce(b, a)`.
pub fn coerce(left: &ValueType, right: &ValueType) -> Option<ValueType> {
    use ValueType::*;
    match (left, right) {
        _ if left == right => Some(left.clone()),
        (Null, other) | (other, Null) => Some(other.clone()),
        (Numeric(a), Numeric(b)) => Some(Numeric((*a).max(*b))),
        (Date, DateTime) | (DateTime, Date) => Some(DateTime),
        (SetOf(a), SetOf(b)) => coerce(a, b).map(ValueType::set_of),
        (Row(a), Row(b)) if a.len() == b.len() => a
            .iter()
            .zip(b)
            .map(|(x, y)| coerce(x, y))
            .collect::<Option<Vec<_>>>()
            .map(Row),
        _ => None,
    }
}

fn is_decimal_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let frac = parts.next().unwrap_or("");
    (!whole.is_empty() || !frac.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && frac.chars().all(|c| c.is_ascii_digit())
}

// =============================================================================
// Values
// =============================================================================

/// A runtime value from the calling scope, or a constant known at translation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Decimal kept in its canonical text form to avoid rounding.
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    /// Duration in microseconds.
    Interval(i64),
    Bytes(Vec<u8>),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    /// All instances of the named entity (an iterable query source).
    EntitySet(String),
    /// A single entity instance, identified by its primary key values.
    Entity { entity: String, key: Vec<Value> },
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short type name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "Decimal",
            Value::Text(_) => "str",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::Interval(_) => "timedelta",
            Value::Bytes(_) => "bytes",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::EntitySet(_) => "entity set",
            Value::Entity { .. } => "entity",
            Value::Map(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness with host-language semantics.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Decimal(s) => s.chars().any(|c| c.is_ascii_digit() && c != '0'),
            Value::Text(s) => !s.is_empty(),
            Value::Interval(us) => *us != 0,
            Value::Bytes(b) => !b.is_empty(),
            Value::Tuple(items) | Value::List(items) => !items.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Date(_)
            | Value::Time(_)
            | Value::DateTime(_)
            | Value::EntitySet(_)
            | Value::Entity { .. } => true,
        }
    }

    /// Flatten into the scalar values bound for one placeholder each.
    ///
    /// Entities contribute their key columns, tuples their items.
    pub fn flatten_into(&self, out: &mut Vec<Value>) {
        match self {
            Value::Entity { key, .. } => out.extend(key.iter().cloned()),
            Value::Tuple(items) | Value::List(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
            other => out.push(other.clone()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

/// A value together with its inferred type.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub value_type: ValueType,
    pub value: Value,
}
