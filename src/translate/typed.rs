//! Typed nodes: the translator's intermediate form.

use crate::catalog::EntityId;
use crate::sql::expr::Expr;
use crate::types::{Value, ValueType};

use super::registry::{ScopeId, TableId};

/// An expression node annotated with its SQL-level type.
#[derive(Debug, Clone)]
pub struct TypedNode {
    pub value_type: ValueType,
    pub repr: Repr,
    pub nullable: bool,
    /// Contains an aggregate over the rows of the current scope.
    pub aggregated: bool,
    /// Never needs a GROUP BY entry (constants and parameters).
    pub nogroup: bool,
}

/// What backs a typed node.
#[derive(Debug, Clone)]
pub enum Repr {
    /// One or more SQL expressions; more than one for composite keys.
    Sql(Vec<Expr>),
    /// An entity bound to a table reference.
    Table(TableId),
    /// A value known at translation time.
    Constant(Value),
    /// Tuple display.
    Row(Vec<TypedNode>),
    /// A finite set of values (set parameter or list display).
    Values(Vec<TypedNode>),
    /// Every row of an entity.
    EntitySet(EntityId),
    /// A to-many attribute of an entity.
    Collection { parent: TableId, attr: String },
    /// A nested comprehension.
    Subquery { scope: ScopeId, elt: Box<TypedNode> },
}

impl TypedNode {
    pub fn new(value_type: ValueType, repr: Repr) -> Self {
        Self {
            value_type,
            repr,
            nullable: false,
            aggregated: false,
            nogroup: false,
        }
    }

    /// A single SQL expression.
    pub fn sql(value_type: ValueType, expr: Expr) -> Self {
        Self::new(value_type, Repr::Sql(vec![expr]))
    }

    pub fn constant(value: Value, value_type: ValueType) -> Self {
        Self {
            nullable: value.is_null(),
            nogroup: true,
            ..Self::new(value_type, Repr::Constant(value))
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn aggregated(mut self, aggregated: bool) -> Self {
        self.aggregated = aggregated;
        self
    }

    pub fn nogroup(mut self, nogroup: bool) -> Self {
        self.nogroup = nogroup;
        self
    }

    /// Copy nullability and aggregation flags from the operands a node was
    /// built from.
    pub fn derived_from<'a>(mut self, operands: impl IntoIterator<Item = &'a TypedNode>) -> Self {
        let mut any = false;
        let mut nullable = false;
        let mut aggregated = false;
        let mut nogroup = true;
        for op in operands {
            any = true;
            nullable |= op.nullable;
            aggregated |= op.aggregated;
            nogroup &= op.nogroup;
        }
        self.nullable = nullable;
        self.aggregated = aggregated;
        self.nogroup = any && nogroup;
        self
    }

    pub fn is_null(&self) -> bool {
        matches!(self.repr, Repr::Constant(Value::Null)) || self.value_type.is_null()
    }

    /// Sets, collections and sub-queries.
    pub fn is_set(&self) -> bool {
        matches!(
            self.repr,
            Repr::Values(_) | Repr::EntitySet(_) | Repr::Collection { .. } | Repr::Subquery { .. }
        )
    }

    pub fn constant_value(&self) -> Option<&Value> {
        match &self.repr {
            Repr::Constant(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::col;

    #[test]
    fn test_derived_flags() {
        let column = TypedNode::sql(ValueType::INT, col("a")).nullable(true);
        let constant = TypedNode::constant(Value::Int(1), ValueType::INT);
        let agg = TypedNode::sql(ValueType::INT, col("b")).aggregated(true);

        let sum = TypedNode::sql(ValueType::INT, col("x")).derived_from([&column, &constant]);
        assert!(sum.nullable);
        assert!(!sum.aggregated);
        assert!(!sum.nogroup);

        let scaled = TypedNode::sql(ValueType::INT, col("x")).derived_from([&agg, &constant]);
        assert!(scaled.aggregated);

        let folded = TypedNode::sql(ValueType::INT, col("x")).derived_from([&constant]);
        assert!(folded.nogroup);
    }

    #[test]
    fn test_null_constant() {
        let none = TypedNode::constant(Value::Null, ValueType::Null);
        assert!(none.is_null());
        assert!(none.nullable);
        assert!(!none.is_set());
    }
}
