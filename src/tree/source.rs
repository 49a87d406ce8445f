//! Source-text reconstruction.
//!
//! The reconstructed text identifies extracted parameters and appears in
//! error messages, so it must be deterministic: equal trees give equal text.
//! Parentheses are inserted from operator priority alone; the original
//! grouping of the user's text is not preserved.

use std::fmt::Write;

use crate::tree::{BinOpKind, BoolOpKind, Comprehension, ExprNode, NodeKind, UnaryOpKind};
use crate::types::Value;

/// Binding strength, lower binds tighter.
fn priority(node: &ExprNode) -> u8 {
    match &node.kind {
        NodeKind::BoolOp {
            op: BoolOpKind::Or, ..
        } => 14,
        NodeKind::BoolOp {
            op: BoolOpKind::And,
            ..
        } => 13,
        NodeKind::UnaryOp {
            op: UnaryOpKind::Not,
            ..
        } => 12,
        NodeKind::Compare { .. } => 11,
        NodeKind::BinOp { op, .. } => binop_priority(*op),
        NodeKind::UnaryOp { .. } => 4,
        NodeKind::Attribute { .. } | NodeKind::Call { .. } => 2,
        NodeKind::Name(_)
        | NodeKind::Constant(_)
        | NodeKind::Tuple(_)
        | NodeKind::List(_)
        | NodeKind::Starred(_)
        | NodeKind::Comprehension(_)
        | NodeKind::FormattedValue(_) => 1,
    }
}

fn binop_priority(op: BinOpKind) -> u8 {
    match op {
        BinOpKind::BitOr => 10,
        BinOpKind::BitXor => 9,
        BinOpKind::BitAnd => 8,
        BinOpKind::LShift | BinOpKind::RShift => 7,
        BinOpKind::Add | BinOpKind::Sub => 6,
        BinOpKind::Mult | BinOpKind::Div | BinOpKind::FloorDiv | BinOpKind::Mod => 5,
        BinOpKind::Pow => 3,
    }
}

/// Render `child` under an operator of priority `parent`, wrapping it when
/// it binds no tighter than the operator.
fn operand(child: &ExprNode, parent: u8) -> String {
    let text = to_source(child);
    if priority(child) >= parent {
        format!("({text})")
    } else {
        text
    }
}

/// Reconstruct the source text of a node.
pub fn to_source(node: &ExprNode) -> String {
    match &node.kind {
        NodeKind::Name(id) => id.clone(),
        NodeKind::Constant(value) => value_source(value),
        NodeKind::Attribute { value, attr } => {
            format!("{}.{attr}", operand(value, 3))
        }
        NodeKind::Compare {
            left,
            ops,
            comparators,
        } => {
            let mut out = operand(left, 11);
            for (op, right) in ops.iter().zip(comparators) {
                let _ = write!(out, " {} {}", op.symbol(), operand(right, 11));
            }
            out
        }
        NodeKind::BoolOp { op, values } => {
            let (sep, p) = match op {
                BoolOpKind::And => (" and ", 13),
                BoolOpKind::Or => (" or ", 14),
            };
            values
                .iter()
                .map(|v| operand(v, p))
                .collect::<Vec<_>>()
                .join(sep)
        }
        NodeKind::BinOp { op, left, right } => {
            let p = binop_priority(*op);
            format!(
                "{} {} {}",
                operand(left, p),
                op.symbol(),
                operand(right, p)
            )
        }
        NodeKind::UnaryOp { op, operand: inner } => match op {
            UnaryOpKind::Not => format!("not {}", operand(inner, 12)),
            UnaryOpKind::Neg => format!("-{}", operand(inner, 4)),
            UnaryOpKind::Pos => format!("+{}", operand(inner, 4)),
            UnaryOpKind::Invert => format!("~{}", operand(inner, 4)),
        },
        NodeKind::Call {
            func,
            args,
            keywords,
        } => {
            let callee = operand(func, 3);
            // A lone generator argument drops its own parentheses.
            if keywords.is_empty() && args.len() == 1 {
                if let NodeKind::Comprehension(comp) = &args[0].kind {
                    return format!("{callee}({})", comprehension_body(comp));
                }
            }
            let mut parts: Vec<String> = args.iter().map(to_source).collect();
            parts.extend(
                keywords
                    .iter()
                    .map(|k| format!("{}={}", k.name, to_source(&k.value))),
            );
            format!("{callee}({})", parts.join(", "))
        }
        NodeKind::Tuple(items) => {
            if items.len() == 1 {
                format!("({},)", to_source(&items[0]))
            } else {
                format!("({})", join(items))
            }
        }
        NodeKind::List(items) => format!("[{}]", join(items)),
        NodeKind::Starred(inner) => format!("*{}", to_source(inner)),
        NodeKind::Comprehension(comp) => comprehension_source(comp),
        NodeKind::FormattedValue(inner) => to_source(inner),
    }
}

fn join(items: &[ExprNode]) -> String {
    items.iter().map(to_source).collect::<Vec<_>>().join(", ")
}

fn comprehension_body(comp: &Comprehension) -> String {
    let mut out = to_source(&comp.elt);
    for clause in &comp.clauses {
        let _ = write!(out, " for {} in {}", clause.target, to_source(&clause.iter));
        for cond in &clause.conditions {
            let _ = write!(out, " if {}", to_source(cond));
        }
    }
    out
}

/// `(elt for x in xs if cond)`
pub fn comprehension_source(comp: &Comprehension) -> String {
    format!("({})", comprehension_body(comp))
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// Literal text for a constant.
pub fn value_source(value: &Value) -> String {
    match value {
        Value::Null => "None".into(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{f:?}"),
        Value::Decimal(d) => format!("Decimal({})", quote(d)),
        Value::Text(s) => quote(s),
        Value::Date(d) => format!("date({})", d.format("%Y, %-m, %-d")),
        Value::Time(t) => format!("time({})", t.format("%-H, %-M, %-S")),
        Value::DateTime(dt) => format!("datetime({})", dt.format("%Y, %-m, %-d, %-H, %-M, %-S")),
        Value::Interval(us) => format!("timedelta(microseconds={us})"),
        Value::Bytes(bytes) => {
            let mut out = String::from("b'");
            for b in bytes {
                if b.is_ascii_graphic() && *b != b'\'' && *b != b'\\' {
                    out.push(*b as char);
                } else {
                    let _ = write!(out, "\\x{b:02x}");
                }
            }
            out.push('\'');
            out
        }
        Value::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(value_source).collect();
            if parts.len() == 1 {
                format!("({},)", parts[0])
            } else {
                format!("({})", parts.join(", "))
            }
        }
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(value_source).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::EntitySet(name) => name.clone(),
        Value::Entity { entity, key } => {
            let parts: Vec<String> = key.iter().map(value_source).collect();
            format!("{entity}[{}]", parts.join(", "))
        }
        Value::Map(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), value_source(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}
