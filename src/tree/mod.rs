//! Input expression tree.
//!
//! The front end (host-language specific, not part of this crate) produces a
//! [`QueryRoot`]: one comprehension with a projection, its `for` clauses and
//! their `if` conditions, plus optional ordering and pagination. Trees can be
//! built in code with the constructor functions and the [`ExprNode`] fluent
//! methods below, or deserialized from JSON.
//!
//! # Example
//!
//! ```ignore
//! use comprehend::tree::{constant, name, QueryRoot};
//!
//! // select p for p in Person if p.age > 30
//! let query = QueryRoot::select(name("p"))
//!     .iterate("p", name("Person"))
//!     .filter(name("p").attr("age").gt(constant(30)));
//! ```
//!
//! Each node carries two annotations, `is_external` and `is_constant`, that
//! stay `None` until the classifier fills them in.

pub mod source;

use serde::{Deserialize, Serialize};

use crate::types::Value;

pub use source::to_source;

// =============================================================================
// Operators
// =============================================================================

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }

    /// The operator that yields the logical negation, for two-valued operands.
    pub fn negated(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::NotEq,
            CmpOp::NotEq => CmpOp::Eq,
            CmpOp::Lt => CmpOp::GtE,
            CmpOp::GtE => CmpOp::Lt,
            CmpOp::LtE => CmpOp::Gt,
            CmpOp::Gt => CmpOp::LtE,
            CmpOp::Is => CmpOp::IsNot,
            CmpOp::IsNot => CmpOp::Is,
            CmpOp::In => CmpOp::NotIn,
            CmpOp::NotIn => CmpOp::In,
        }
    }

    /// Operator after swapping operands (`a < b` becomes `b > a`).
    pub fn swapped(self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::LtE => CmpOp::GtE,
            CmpOp::GtE => CmpOp::LtE,
            other => other,
        }
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOpKind {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOpKind {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
}

impl BinOpKind {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOpKind::Add => "+",
            BinOpKind::Sub => "-",
            BinOpKind::Mult => "*",
            BinOpKind::Div => "/",
            BinOpKind::FloorDiv => "//",
            BinOpKind::Mod => "%",
            BinOpKind::Pow => "**",
            BinOpKind::BitAnd => "&",
            BinOpKind::BitOr => "|",
            BinOpKind::BitXor => "^",
            BinOpKind::LShift => "<<",
            BinOpKind::RShift => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOpKind {
    Not,
    Neg,
    Pos,
    Invert,
}

// =============================================================================
// Nodes
// =============================================================================

/// A node of the input tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeKind", into = "NodeKind")]
pub struct ExprNode {
    pub kind: NodeKind,
    /// Evaluable entirely in the calling scope.
    pub is_external: Option<bool>,
    /// Evaluable without any scope at all.
    pub is_constant: Option<bool>,
}

/// Node discriminant with owned children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Name(String),
    Attribute {
        value: Box<ExprNode>,
        attr: String,
    },
    Constant(Value),
    /// `left op1 c1 op2 c2 ...`; chained comparisons are conjunctions.
    Compare {
        left: Box<ExprNode>,
        ops: Vec<CmpOp>,
        comparators: Vec<ExprNode>,
    },
    BoolOp {
        op: BoolOpKind,
        values: Vec<ExprNode>,
    },
    BinOp {
        op: BinOpKind,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    UnaryOp {
        op: UnaryOpKind,
        operand: Box<ExprNode>,
    },
    Call {
        func: Box<ExprNode>,
        args: Vec<ExprNode>,
        #[serde(default)]
        keywords: Vec<Keyword>,
    },
    Tuple(Vec<ExprNode>),
    List(Vec<ExprNode>),
    /// `*items` inside a call's argument list.
    Starred(Box<ExprNode>),
    /// A nested comprehension used as a sub-query.
    Comprehension(Box<Comprehension>),
    /// An interpolated value inside a formatted string.
    FormattedValue(Box<ExprNode>),
}

/// `name=value` argument of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub name: String,
    pub value: ExprNode,
}

/// `for target in iter if c1 if c2 ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForClause {
    pub target: String,
    pub iter: ExprNode,
    #[serde(default)]
    pub conditions: Vec<ExprNode>,
}

/// `(elt for ... in ... if ...)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comprehension {
    pub elt: ExprNode,
    pub clauses: Vec<ForClause>,
}

/// Explicit ORDER BY key of a root query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderKey {
    pub expr: ExprNode,
    #[serde(default)]
    pub descending: bool,
}

/// The root of a query: one comprehension plus result shaping options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRoot {
    pub comprehension: Comprehension,
    #[serde(default)]
    pub order_by: Vec<OrderKey>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    /// Overrides DISTINCT inference when set.
    #[serde(default)]
    pub distinct: Option<bool>,
}

impl From<NodeKind> for ExprNode {
    fn from(kind: NodeKind) -> Self {
        ExprNode {
            kind,
            is_external: None,
            is_constant: None,
        }
    }
}

impl From<ExprNode> for NodeKind {
    fn from(node: ExprNode) -> Self {
        node.kind
    }
}

impl ExprNode {
    pub fn new(kind: NodeKind) -> Self {
        kind.into()
    }

    /// Short discriminant name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Name(_) => "Name",
            NodeKind::Attribute { .. } => "Attribute",
            NodeKind::Constant(_) => "Constant",
            NodeKind::Compare { .. } => "Compare",
            NodeKind::BoolOp { .. } => "BoolOp",
            NodeKind::BinOp { .. } => "BinOp",
            NodeKind::UnaryOp { .. } => "UnaryOp",
            NodeKind::Call { .. } => "Call",
            NodeKind::Tuple(_) => "Tuple",
            NodeKind::List(_) => "List",
            NodeKind::Starred(_) => "Starred",
            NodeKind::Comprehension(_) => "Comprehension",
            NodeKind::FormattedValue(_) => "FormattedValue",
        }
    }

    /// Reconstructed source text.
    pub fn source(&self) -> String {
        to_source(self)
    }

    pub fn is_external(&self) -> bool {
        self.is_external == Some(true)
    }

    pub fn is_constant(&self) -> bool {
        self.is_constant == Some(true)
    }

    /// Whether a fully external node of this kind may be bound as one
    /// parameter. Containers keep their structure visible to the translator.
    pub fn is_extractable(&self) -> bool {
        !matches!(
            self.kind,
            NodeKind::Tuple(_) | NodeKind::List(_) | NodeKind::Starred(_)
        )
    }

    /// Dotted name for `a.b.c` chains made only of names and attributes.
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            NodeKind::Name(n) => Some(n.clone()),
            NodeKind::Attribute { value, attr } => {
                value.dotted_name().map(|prefix| format!("{prefix}.{attr}"))
            }
            _ => None,
        }
    }

    /// Direct children in evaluation order. Comprehension children are the
    /// clause iterables and conditions followed by the element.
    pub fn children(&self) -> Vec<&ExprNode> {
        match &self.kind {
            NodeKind::Name(_) | NodeKind::Constant(_) => Vec::new(),
            NodeKind::Attribute { value, .. } => vec![value],
            NodeKind::Compare {
                left, comparators, ..
            } => std::iter::once(left.as_ref()).chain(comparators).collect(),
            NodeKind::BoolOp { values, .. } => values.iter().collect(),
            NodeKind::BinOp { left, right, .. } => vec![left, right],
            NodeKind::UnaryOp { operand, .. } => vec![operand],
            NodeKind::Call {
                func,
                args,
                keywords,
            } => std::iter::once(func.as_ref())
                .chain(args)
                .chain(keywords.iter().map(|k| &k.value))
                .collect(),
            NodeKind::Tuple(items) | NodeKind::List(items) => items.iter().collect(),
            NodeKind::Starred(inner) | NodeKind::FormattedValue(inner) => vec![inner],
            NodeKind::Comprehension(comp) => comp.children(),
        }
    }

    // -------------------------------------------------------------------------
    // Fluent construction
    // -------------------------------------------------------------------------

    pub fn attr(self, name: &str) -> ExprNode {
        NodeKind::Attribute {
            value: Box::new(self),
            attr: name.into(),
        }
        .into()
    }

    fn compare(self, op: CmpOp, other: ExprNode) -> ExprNode {
        NodeKind::Compare {
            left: Box::new(self),
            ops: vec![op],
            comparators: vec![other],
        }
        .into()
    }

    /// Extend a comparison chain: `a < b` then `.chain(Lt, c)` gives `a < b < c`.
    pub fn chain(mut self, op: CmpOp, other: ExprNode) -> ExprNode {
        match &mut self.kind {
            NodeKind::Compare {
                ops, comparators, ..
            } => {
                ops.push(op);
                comparators.push(other);
                self
            }
            _ => self.compare(op, other),
        }
    }

    pub fn eq(self, other: ExprNode) -> ExprNode {
        self.compare(CmpOp::Eq, other)
    }

    pub fn ne(self, other: ExprNode) -> ExprNode {
        self.compare(CmpOp::NotEq, other)
    }

    pub fn lt(self, other: ExprNode) -> ExprNode {
        self.compare(CmpOp::Lt, other)
    }

    pub fn le(self, other: ExprNode) -> ExprNode {
        self.compare(CmpOp::LtE, other)
    }

    pub fn gt(self, other: ExprNode) -> ExprNode {
        self.compare(CmpOp::Gt, other)
    }

    pub fn ge(self, other: ExprNode) -> ExprNode {
        self.compare(CmpOp::GtE, other)
    }

    pub fn is(self, other: ExprNode) -> ExprNode {
        self.compare(CmpOp::Is, other)
    }

    pub fn is_not(self, other: ExprNode) -> ExprNode {
        self.compare(CmpOp::IsNot, other)
    }

    /// `self in container`
    pub fn in_(self, container: ExprNode) -> ExprNode {
        self.compare(CmpOp::In, container)
    }

    pub fn not_in(self, container: ExprNode) -> ExprNode {
        self.compare(CmpOp::NotIn, container)
    }

    pub fn and(self, other: ExprNode) -> ExprNode {
        all(vec![self, other])
    }

    pub fn or(self, other: ExprNode) -> ExprNode {
        any(vec![self, other])
    }

    pub fn not(self) -> ExprNode {
        self.unary(UnaryOpKind::Not)
    }

    pub fn neg(self) -> ExprNode {
        self.unary(UnaryOpKind::Neg)
    }

    pub fn invert(self) -> ExprNode {
        self.unary(UnaryOpKind::Invert)
    }

    fn unary(self, op: UnaryOpKind) -> ExprNode {
        NodeKind::UnaryOp {
            op,
            operand: Box::new(self),
        }
        .into()
    }

    pub fn binop(self, op: BinOpKind, other: ExprNode) -> ExprNode {
        NodeKind::BinOp {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
        .into()
    }

    pub fn add(self, other: ExprNode) -> ExprNode {
        self.binop(BinOpKind::Add, other)
    }

    pub fn sub(self, other: ExprNode) -> ExprNode {
        self.binop(BinOpKind::Sub, other)
    }

    pub fn mul(self, other: ExprNode) -> ExprNode {
        self.binop(BinOpKind::Mult, other)
    }

    pub fn div(self, other: ExprNode) -> ExprNode {
        self.binop(BinOpKind::Div, other)
    }

    /// Method call: `self.method(args...)`.
    pub fn method(self, method: &str, args: Vec<ExprNode>) -> ExprNode {
        NodeKind::Call {
            func: Box::new(self.attr(method)),
            args,
            keywords: Vec::new(),
        }
        .into()
    }

    /// Attach a keyword argument to a call node. Other nodes are returned unchanged.
    pub fn keyword(mut self, name: &str, value: ExprNode) -> ExprNode {
        if let NodeKind::Call { keywords, .. } = &mut self.kind {
            keywords.push(Keyword {
                name: name.into(),
                value,
            });
        }
        self
    }
}

impl std::fmt::Display for ExprNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&to_source(self))
    }
}

impl Comprehension {
    pub fn new(elt: ExprNode) -> Self {
        Self {
            elt,
            clauses: Vec::new(),
        }
    }

    #[must_use]
    pub fn iterate(mut self, target: &str, iter: ExprNode) -> Self {
        self.clauses.push(ForClause {
            target: target.into(),
            iter,
            conditions: Vec::new(),
        });
        self
    }

    /// Add an `if` condition to the most recent clause.
    #[must_use]
    pub fn filter(mut self, condition: ExprNode) -> Self {
        if let Some(clause) = self.clauses.last_mut() {
            clause.conditions.push(condition);
        }
        self
    }

    pub fn into_node(self) -> ExprNode {
        NodeKind::Comprehension(Box::new(self)).into()
    }

    fn children(&self) -> Vec<&ExprNode> {
        let mut out = Vec::new();
        for clause in &self.clauses {
            out.push(&clause.iter);
            out.extend(clause.conditions.iter());
        }
        out.push(&self.elt);
        out
    }
}

impl QueryRoot {
    /// Start a query projecting `elt`.
    pub fn select(elt: ExprNode) -> Self {
        Self::new(Comprehension::new(elt))
    }

    pub fn new(comprehension: Comprehension) -> Self {
        Self {
            comprehension,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: None,
        }
    }

    #[must_use]
    pub fn iterate(mut self, target: &str, iter: ExprNode) -> Self {
        self.comprehension = self.comprehension.iterate(target, iter);
        self
    }

    #[must_use]
    pub fn filter(mut self, condition: ExprNode) -> Self {
        self.comprehension = self.comprehension.filter(condition);
        self
    }

    #[must_use]
    pub fn order_by(mut self, expr: ExprNode) -> Self {
        self.order_by.push(OrderKey {
            expr,
            descending: false,
        });
        self
    }

    #[must_use]
    pub fn order_by_desc(mut self, expr: ExprNode) -> Self {
        self.order_by.push(OrderKey {
            expr,
            descending: true,
        });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = Some(distinct);
        self
    }

    /// Source text of the whole query.
    pub fn source(&self) -> String {
        source::comprehension_source(&self.comprehension)
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Variable reference.
pub fn name(id: &str) -> ExprNode {
    NodeKind::Name(id.into()).into()
}

/// Literal constant.
pub fn constant(value: impl Into<Value>) -> ExprNode {
    NodeKind::Constant(value.into()).into()
}

/// The `None` literal.
pub fn none() -> ExprNode {
    NodeKind::Constant(Value::Null).into()
}

/// Call a function by (possibly dotted) name.
pub fn call(func: &str, args: Vec<ExprNode>) -> ExprNode {
    let mut parts = func.split('.');
    let head = parts.next().unwrap_or(func);
    let callee = parts.fold(name(head), |node, part| node.attr(part));
    NodeKind::Call {
        func: Box::new(callee),
        args,
        keywords: Vec::new(),
    }
    .into()
}

pub fn tuple(items: Vec<ExprNode>) -> ExprNode {
    NodeKind::Tuple(items).into()
}

pub fn list(items: Vec<ExprNode>) -> ExprNode {
    NodeKind::List(items).into()
}

pub fn starred(inner: ExprNode) -> ExprNode {
    NodeKind::Starred(Box::new(inner)).into()
}

/// N-ary conjunction.
pub fn all(values: Vec<ExprNode>) -> ExprNode {
    NodeKind::BoolOp {
        op: BoolOpKind::And,
        values,
    }
    .into()
}

/// N-ary disjunction.
pub fn any(values: Vec<ExprNode>) -> ExprNode {
    NodeKind::BoolOp {
        op: BoolOpKind::Or,
        values,
    }
    .into()
}
