//! Comparisons, boolean connectives and arithmetic.

use crate::error::{CompileError, CompileResult};
use crate::sql::dialect::SqlDialect;
use crate::sql::expr::{
    and_all, cast, func, lit_int, lit_str, or_all, row, BinaryOperator, Expr, ExprExt,
    UnaryOperator,
};
use crate::tree::{BinOpKind, BoolOpKind, CmpOp, ExprNode, UnaryOpKind};
use crate::types::{coerce, NumericKind, Value, ValueType};

use super::registry::TableId;
use super::typed::{Repr, TypedNode};
use super::{truth, Translator};

impl Translator<'_> {
    // =========================================================================
    // Comparisons
    // =========================================================================

    /// `a < b < c` is `a < b AND b < c`.
    pub(super) fn compare(
        &mut self,
        left: &ExprNode,
        ops: &[CmpOp],
        comparators: &[ExprNode],
    ) -> CompileResult<TypedNode> {
        if ops.is_empty() || ops.len() != comparators.len() {
            return Err(CompileError::malformed(
                "comparison operators and operands do not line up",
            ));
        }
        let mut current = self.node(left)?;
        let mut operands = vec![current.clone()];
        let mut conjuncts = Vec::with_capacity(ops.len());
        for (op, comparator) in ops.iter().zip(comparators) {
            let right = self.node(comparator)?;
            conjuncts.push(self.comparison(*op, &current, &right)?);
            operands.push(right.clone());
            current = right;
        }
        Ok(TypedNode::sql(ValueType::BOOL, and_all(conjuncts)).derived_from(&operands))
    }

    fn comparison(&mut self, op: CmpOp, left: &TypedNode, right: &TypedNode) -> CompileResult<Expr> {
        match op {
            CmpOp::In => return self.membership(left, right, false),
            CmpOp::NotIn => return self.membership(left, right, true),
            _ => {}
        }
        if left.is_null() || right.is_null() {
            return self.null_comparison(op, left, right);
        }
        let op = match op {
            CmpOp::Is => CmpOp::Eq,
            CmpOp::IsNot => CmpOp::NotEq,
            other => other,
        };
        self.compare_values(op, left, right)
    }

    /// Equality with `None` is `IS [NOT] NULL`; ordering against it is an
    /// error.
    fn null_comparison(&mut self, op: CmpOp, left: &TypedNode, right: &TypedNode) -> CompileResult<Expr> {
        let (value, op) = if right.is_null() {
            (left, op)
        } else {
            (right, op.swapped())
        };
        let negated = match op {
            CmpOp::Eq | CmpOp::Is => false,
            CmpOp::NotEq | CmpOp::IsNot => true,
            _ => {
                return Err(CompileError::type_mismatch(format!(
                    "'{}' not supported between {} and NoneType",
                    op.symbol(),
                    value.value_type
                )))
            }
        };
        if value.is_null() {
            return Ok(truth(!negated));
        }
        let columns = self.columns(value)?;
        Ok(and_all(columns.into_iter().map(|c| Expr::IsNull {
            expr: Box::new(c),
            negated,
        })))
    }

    fn compare_values(&mut self, op: CmpOp, left: &TypedNode, right: &TypedNode) -> CompileResult<Expr> {
        let incomparable = || {
            CompileError::type_mismatch(format!(
                "Incomparable types '{}' and '{}' in expression",
                left.value_type, right.value_type
            ))
        };
        if left.is_set() || right.is_set() {
            return Err(incomparable());
        }
        let common = coerce(&left.value_type, &right.value_type).ok_or_else(incomparable)?;
        if op.is_ordering() && !common.is_ordered() {
            return Err(CompileError::type_mismatch(format!(
                "'{}' not supported between instances of '{}'",
                op.symbol(),
                common
            )));
        }

        let mut lhs = self.columns(left)?;
        let mut rhs = self.columns(right)?;
        if lhs.len() != rhs.len() {
            return Err(incomparable());
        }
        let sql_op = comparison_operator(op)?;
        if lhs.len() == 1 {
            // Booleans compared with numbers, or ordered, compare as integers.
            let widen = |t: &ValueType| t.is_bool() && (op.is_ordering() || !common.is_bool());
            let int_type = self.dialect.integer_cast_type();
            let mut l = lhs.remove(0);
            let mut r = rhs.remove(0);
            if widen(&left.value_type) {
                l = cast(l, int_type);
            }
            if widen(&right.value_type) {
                r = cast(r, int_type);
            }
            return Ok(l.binary(sql_op, r));
        }
        if self.dialect.supports_row_values() {
            return Ok(Expr::Row(lhs).binary(sql_op, Expr::Row(rhs)));
        }
        Ok(expand_row_comparison(op, lhs, rhs))
    }

    // =========================================================================
    // Membership
    // =========================================================================

    fn membership(&mut self, left: &TypedNode, right: &TypedNode, negated: bool) -> CompileResult<Expr> {
        match &right.repr {
            Repr::Values(items) | Repr::Row(items) => self.in_values(left, items, negated),
            Repr::Collection { parent, attr } if !negated => {
                match self.member_of_collection(left, *parent, attr)? {
                    Some(expr) => Ok(expr),
                    None => self.in_subquery(left, right, negated),
                }
            }
            Repr::Collection { .. } | Repr::Subquery { .. } | Repr::EntitySet(_) => {
                self.in_subquery(left, right, negated)
            }
            Repr::Sql(_) | Repr::Constant(_) if right.value_type.is_text() => {
                self.contains_text(left, right, negated)
            }
            Repr::Sql(_) | Repr::Constant(_) | Repr::Table(_) => Err(CompileError::type_mismatch(
                format!("argument of type '{}' is not iterable", right.value_type),
            )),
        }
    }

    fn in_values(&mut self, left: &TypedNode, items: &[TypedNode], negated: bool) -> CompileResult<Expr> {
        if left.is_set() {
            return Err(CompileError::type_mismatch(format!(
                "{} cannot be tested for membership",
                left.value_type
            )));
        }
        for item in items {
            if coerce(&left.value_type, &item.value_type).is_none() {
                return Err(CompileError::type_mismatch(format!(
                    "Incomparable types '{}' and '{}' in expression",
                    left.value_type, item.value_type
                )));
            }
        }
        let lhs = self.columns(left)?;
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let columns = self.columns(item)?;
            if columns.len() != lhs.len() {
                return Err(CompileError::type_mismatch(format!(
                    "cannot compare {} with {}",
                    left.value_type, item.value_type
                )));
            }
            rows.push(columns);
        }
        if lhs.len() == 1 || self.dialect.supports_row_values() {
            return Ok(Expr::In {
                expr: Box::new(row(lhs)),
                values: rows.into_iter().map(row).collect(),
                negated,
            });
        }
        let any = or_all(rows.into_iter().map(|values| {
            and_all(lhs.iter().cloned().zip(values).map(|(l, r)| l.eq(r)))
        }));
        Ok(if negated { negate(any) } else { any })
    }

    /// `c in p.cars` where `c` is already a row of the member entity reads the
    /// foreign key directly: `c.owner_id = p.id`.
    fn member_of_collection(
        &mut self,
        left: &TypedNode,
        parent: TableId,
        attr: &str,
    ) -> CompileResult<Option<Expr>> {
        let Repr::Table(member) = &left.repr else {
            return Ok(None);
        };
        let member = *member;
        let catalog = self.catalog;
        let def = self.attribute_def(parent, attr)?;
        let (Some(target), Some(reverse)) = (def.relationship_target, def.reverse.as_deref()) else {
            return Ok(None);
        };
        if self.registry.table(member).entity != target {
            return Err(CompileError::type_mismatch(format!(
                "Incomparable types '{}' and '{}' in expression",
                left.value_type, def.value_type
            )));
        }
        let Some(reverse_def) = catalog.attribute(target, reverse) else {
            return Ok(None);
        };
        if !reverse_def.owns_fk {
            return Ok(None);
        }
        let fk = self.registry.attribute_columns(member, reverse_def, catalog)?;
        let keys = self.registry.key_columns(parent, catalog)?;
        if fk.len() != keys.len() {
            return Ok(None);
        }
        Ok(Some(and_all(fk.into_iter().zip(keys).map(|(l, r)| l.eq(r)))))
    }

    fn in_subquery(&mut self, left: &TypedNode, right: &TypedNode, negated: bool) -> CompileResult<Expr> {
        let (scope, elt) = self.subquery_source(right)?;
        if coerce(&left.value_type, &elt.value_type).is_none() {
            return Err(CompileError::type_mismatch(format!(
                "Incomparable types '{}' and '{}' in expression",
                left.value_type, elt.value_type
            )));
        }
        let lhs = self.columns(left)?;
        let inner = self.columns(&elt)?;
        if lhs.len() != inner.len() {
            return Err(CompileError::type_mismatch(format!(
                "cannot compare {} with {}",
                left.value_type, elt.value_type
            )));
        }
        if lhs.len() == 1 || self.dialect.supports_row_values() {
            let query = self.scope_query(scope).select(inner);
            return Ok(Expr::InSubquery {
                expr: Box::new(row(lhs)),
                subquery: Box::new(query),
                negated,
            });
        }
        // No row values: correlate column by column.
        let correlation = and_all(inner.into_iter().zip(lhs).map(|(i, l)| i.eq(l)));
        let query = self
            .scope_query(scope)
            .select(vec![lit_int(1)])
            .filter(correlation);
        Ok(Expr::Exists {
            subquery: Box::new(query),
            negated,
        })
    }

    /// `needle in text` is a substring test.
    fn contains_text(&mut self, left: &TypedNode, right: &TypedNode, negated: bool) -> CompileResult<Expr> {
        if !left.value_type.is_text() {
            return Err(CompileError::type_mismatch(format!(
                "'in <str>' requires str as left operand, not {}",
                left.value_type
            )));
        }
        let haystack = self.scalar(right)?;
        let (pattern, escape) = self.like_pattern(left, true, true)?;
        Ok(Expr::Like {
            expr: Box::new(haystack),
            pattern: Box::new(pattern),
            escape,
            negated,
        })
    }

    /// LIKE pattern matching `needle` with `%` on the requested sides.
    ///
    /// Known text is escaped and inlined. Anything else is escaped in SQL
    /// with nested `REPLACE` calls and concatenated.
    pub(super) fn like_pattern(
        &mut self,
        needle: &TypedNode,
        leading: bool,
        trailing: bool,
    ) -> CompileResult<(Expr, Option<char>)> {
        if let Some(Value::Text(text)) = needle.constant_value() {
            let escaped = escape_like(text);
            let escape = (escaped != *text).then_some(LIKE_ESCAPE);
            let pattern = format!(
                "{}{}{}",
                if leading { "%" } else { "" },
                escaped,
                if trailing { "%" } else { "" }
            );
            return Ok((lit_str(&pattern), escape));
        }
        let mut pattern = escape_like_sql(self.scalar(needle)?);
        if leading {
            pattern = lit_str("%").concat(pattern);
        }
        if trailing {
            pattern = pattern.concat(lit_str("%"));
        }
        Ok((pattern, Some(LIKE_ESCAPE)))
    }

    // =========================================================================
    // Boolean connectives
    // =========================================================================

    pub(super) fn bool_op(&mut self, op: BoolOpKind, values: &[ExprNode]) -> CompileResult<TypedNode> {
        if values.is_empty() {
            return Err(CompileError::malformed("boolean operator without operands"));
        }
        let nodes = self.nodes(values)?;
        let aggregated = nodes.iter().any(|n| n.aggregated);
        let per_row = nodes.iter().any(|n| !n.aggregated && !n.nogroup);
        if aggregated && per_row {
            let keyword = match op {
                BoolOpKind::And => "and",
                BoolOpKind::Or => "or",
            };
            return Err(CompileError::ambiguous(format!(
                "'{keyword}' mixes aggregated and per-row conditions"
            )));
        }
        let mut conditions = Vec::with_capacity(nodes.len());
        for node in &nodes {
            conditions.push(self.as_condition(node)?);
        }
        let expr = match op {
            BoolOpKind::And => and_all(conditions),
            BoolOpKind::Or => or_all(conditions),
        };
        Ok(TypedNode::sql(ValueType::BOOL, expr).derived_from(&nodes))
    }

    // =========================================================================
    // Unary operators
    // =========================================================================

    pub(super) fn unary_op(&mut self, op: UnaryOpKind, operand: &ExprNode) -> CompileResult<TypedNode> {
        let inner = self.node(operand)?;
        let value_type = &inner.value_type;
        let typed = match op {
            UnaryOpKind::Not => {
                let condition = self.as_condition(&inner)?;
                TypedNode::sql(ValueType::BOOL, negate(condition))
            }
            UnaryOpKind::Neg if value_type.is_numeric() || *value_type == ValueType::Interval => {
                let expr = self.numeric_operand(&inner)?;
                TypedNode::sql(widen_bool(value_type), expr.neg())
            }
            UnaryOpKind::Pos if value_type.is_numeric() || *value_type == ValueType::Interval => {
                let expr = self.numeric_operand(&inner)?;
                TypedNode::sql(widen_bool(value_type), expr)
            }
            UnaryOpKind::Invert if value_type.is_integer() => {
                if !self.dialect.supports_bitwise_operators() {
                    return Err(self.unsupported("bitwise operators"));
                }
                let expr = self.numeric_operand(&inner)?;
                TypedNode::sql(
                    ValueType::INT,
                    Expr::UnaryOp {
                        op: UnaryOperator::BitNot,
                        expr: Box::new(expr),
                    },
                )
            }
            UnaryOpKind::Neg | UnaryOpKind::Pos | UnaryOpKind::Invert => {
                let symbol = match op {
                    UnaryOpKind::Neg => "-",
                    UnaryOpKind::Pos => "+",
                    _ => "~",
                };
                return Err(CompileError::type_mismatch(format!(
                    "bad operand type for unary {symbol}: '{value_type}'"
                )));
            }
        };
        Ok(typed.derived_from([&inner]))
    }

    // =========================================================================
    // Binary operators
    // =========================================================================

    pub(super) fn bin_op(&mut self, op: BinOpKind, left: &ExprNode, right: &ExprNode) -> CompileResult<TypedNode> {
        let l = self.node(left)?;
        let r = self.node(right)?;
        let (lt, rt) = (&l.value_type, &r.value_type);
        let typed = match op {
            BinOpKind::Add if lt.is_text() && rt.is_text() => {
                let a = self.scalar(&l)?;
                let b = self.scalar(&r)?;
                TypedNode::sql(ValueType::Text, a.concat(b))
            }
            BinOpKind::Add | BinOpKind::Sub if is_interval_arithmetic(op, lt, rt) => {
                self.interval_arithmetic(op, &l, &r)?
            }
            BinOpKind::Add
            | BinOpKind::Sub
            | BinOpKind::Mult
            | BinOpKind::Div
            | BinOpKind::FloorDiv
            | BinOpKind::Mod
            | BinOpKind::Pow
                if lt.is_numeric() && rt.is_numeric() =>
            {
                self.arithmetic(op, &l, &r)?
            }
            BinOpKind::BitAnd
            | BinOpKind::BitOr
            | BinOpKind::BitXor
            | BinOpKind::LShift
            | BinOpKind::RShift
                if lt.is_integer() && rt.is_integer() =>
            {
                self.bitwise(op, &l, &r)?
            }
            _ => {
                return Err(CompileError::type_mismatch(format!(
                    "unsupported operand type(s) for {}: '{}' and '{}'",
                    op.symbol(),
                    lt,
                    rt
                )))
            }
        };
        Ok(typed.derived_from([&l, &r]))
    }

    fn arithmetic(&mut self, op: BinOpKind, l: &TypedNode, r: &TypedNode) -> CompileResult<TypedNode> {
        let common = match coerce(&l.value_type, &r.value_type) {
            Some(ValueType::Numeric(kind)) => ValueType::Numeric(kind.max(NumericKind::Int)),
            _ => {
                return Err(CompileError::type_mismatch(format!(
                    "unsupported operand type(s) for {}: '{}' and '{}'",
                    op.symbol(),
                    l.value_type,
                    r.value_type
                )))
            }
        };
        let integers = l.value_type.is_integer() && r.value_type.is_integer();
        let float_type = self.dialect.float_cast_type();
        let a = self.numeric_operand(l)?;
        let b = self.numeric_operand(r)?;
        let typed = match op {
            BinOpKind::Add => TypedNode::sql(common, a.add(b)),
            BinOpKind::Sub => TypedNode::sql(common, a.sub(b)),
            BinOpKind::Mult => TypedNode::sql(common, a.mul(b)),
            // True division, even between integers.
            BinOpKind::Div if integers => TypedNode::sql(ValueType::FLOAT, cast(a, float_type).div(b)),
            BinOpKind::Div => TypedNode::sql(common, a.div(b)),
            BinOpKind::FloorDiv => {
                let quotient = if integers {
                    cast(a, float_type).div(b)
                } else {
                    a.div(b)
                };
                TypedNode::sql(common, func("FLOOR", vec![quotient]))
            }
            BinOpKind::Mod => TypedNode::sql(common, a.binary(BinaryOperator::Mod, b)),
            BinOpKind::Pow => TypedNode::sql(ValueType::FLOAT, func("POWER", vec![a, b])),
            _ => return Err(CompileError::malformed(format!("{} is not arithmetic", op.symbol()))),
        };
        Ok(typed)
    }

    fn bitwise(&mut self, op: BinOpKind, l: &TypedNode, r: &TypedNode) -> CompileResult<TypedNode> {
        if !self.dialect.supports_bitwise_operators() {
            return Err(self.unsupported("bitwise operators"));
        }
        let sql_op = match op {
            BinOpKind::BitAnd => BinaryOperator::BitAnd,
            BinOpKind::BitOr => BinaryOperator::BitOr,
            BinOpKind::BitXor => BinaryOperator::BitXor,
            BinOpKind::LShift | BinOpKind::RShift if !self.dialect.supports_bit_shift() => {
                return Err(self.unsupported("bit shift operators"));
            }
            BinOpKind::LShift => BinaryOperator::ShiftLeft,
            BinOpKind::RShift => BinaryOperator::ShiftRight,
            _ => return Err(CompileError::malformed(format!("{} is not bitwise", op.symbol()))),
        };
        let a = self.numeric_operand(l)?;
        let b = self.numeric_operand(r)?;
        Ok(TypedNode::sql(ValueType::INT, a.binary(sql_op, b)))
    }

    fn interval_arithmetic(&mut self, op: BinOpKind, l: &TypedNode, r: &TypedNode) -> CompileResult<TypedNode> {
        if !self.dialect.supports_interval_arithmetic() {
            return Err(self.unsupported("date/time arithmetic with intervals"));
        }
        let value_type = match (&l.value_type, &r.value_type) {
            (ValueType::Interval, ValueType::Interval) => ValueType::Interval,
            (ValueType::Interval, other) | (other, ValueType::Interval) => other.clone(),
            (a, b) => {
                return Err(CompileError::type_mismatch(format!(
                    "unsupported operand type(s) for {}: '{a}' and '{b}'",
                    op.symbol()
                )))
            }
        };
        let sql_op = match op {
            BinOpKind::Add => BinaryOperator::Plus,
            _ => BinaryOperator::Minus,
        };
        let a = self.scalar(l)?;
        let b = self.scalar(r)?;
        Ok(TypedNode::sql(value_type, a.binary(sql_op, b)))
    }
}

const LIKE_ESCAPE: char = '!';

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// `escape_like` for a value only known at execution time. The escape
/// character is doubled first so later replacements are not re-escaped.
fn escape_like_sql(expr: Expr) -> Expr {
    [LIKE_ESCAPE, '%', '_'].into_iter().fold(expr, |acc, c| {
        func(
            "REPLACE",
            vec![
                acc,
                lit_str(&c.to_string()),
                lit_str(&format!("{LIKE_ESCAPE}{c}")),
            ],
        )
    })
}

/// Date ± interval, interval + date, and interval ± interval.
fn is_interval_arithmetic(op: BinOpKind, lt: &ValueType, rt: &ValueType) -> bool {
    match (lt, rt) {
        (ValueType::Interval, ValueType::Interval) => true,
        (t, ValueType::Interval) => t.is_temporal(),
        (ValueType::Interval, t) => op == BinOpKind::Add && t.is_temporal(),
        _ => false,
    }
}

fn widen_bool(value_type: &ValueType) -> ValueType {
    if value_type.is_bool() {
        ValueType::INT
    } else {
        value_type.clone()
    }
}

fn comparison_operator(op: CmpOp) -> CompileResult<BinaryOperator> {
    Ok(match op {
        CmpOp::Eq => BinaryOperator::Eq,
        CmpOp::NotEq => BinaryOperator::Ne,
        CmpOp::Lt => BinaryOperator::Lt,
        CmpOp::LtE => BinaryOperator::Lte,
        CmpOp::Gt => BinaryOperator::Gt,
        CmpOp::GtE => BinaryOperator::Gte,
        CmpOp::Is | CmpOp::IsNot | CmpOp::In | CmpOp::NotIn => {
            return Err(CompileError::malformed(format!(
                "'{}' is not a value comparison",
                op.symbol()
            )))
        }
    })
}

/// Column-wise form of a row comparison.
///
/// Ordering is lexicographic: `(a, b) < (x, y)` is
/// `a < x OR (a = x AND b < y)`.
fn expand_row_comparison(op: CmpOp, lhs: Vec<Expr>, rhs: Vec<Expr>) -> Expr {
    let pairs: Vec<(Expr, Expr)> = lhs.into_iter().zip(rhs).collect();
    match op {
        CmpOp::Eq => and_all(pairs.into_iter().map(|(l, r)| l.eq(r))),
        CmpOp::NotEq => or_all(pairs.into_iter().map(|(l, r)| l.ne(r))),
        _ => {
            let (strict, last) = match op {
                CmpOp::Lt => (BinaryOperator::Lt, BinaryOperator::Lt),
                CmpOp::LtE => (BinaryOperator::Lt, BinaryOperator::Lte),
                CmpOp::Gt => (BinaryOperator::Gt, BinaryOperator::Gt),
                _ => (BinaryOperator::Gt, BinaryOperator::Gte),
            };
            let n = pairs.len();
            or_all((0..n).map(|i| {
                let prefix = pairs[..i].iter().map(|(l, r)| l.clone().eq(r.clone()));
                let (l, r) = pairs[i].clone();
                let op = if i + 1 == n { last } else { strict };
                and_all(prefix.chain(std::iter::once(l.binary(op, r))))
            }))
        }
    }
}

/// Logical negation, pushed into the expression where SQL has a direct form.
pub(super) fn negate(expr: Expr) -> Expr {
    match expr {
        Expr::BinaryOp { left, op, right } => match op.negated() {
            Some(op) => Expr::BinaryOp { left, op, right },
            None => Expr::Not(Box::new(Expr::BinaryOp { left, op, right })),
        },
        Expr::Not(inner) => *inner,
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr,
            negated: !negated,
        },
        Expr::In {
            expr,
            values,
            negated,
        } => Expr::In {
            expr,
            values,
            negated: !negated,
        },
        Expr::InSubquery {
            expr,
            subquery,
            negated,
        } => Expr::InSubquery {
            expr,
            subquery,
            negated: !negated,
        },
        Expr::Exists { subquery, negated } => Expr::Exists {
            subquery,
            negated: !negated,
        },
        Expr::Like {
            expr,
            pattern,
            escape,
            negated,
        } => Expr::Like {
            expr,
            pattern,
            escape,
            negated: !negated,
        },
        other => Expr::Not(Box::new(other)),
    }
}
