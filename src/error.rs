//! Compile-time error taxonomy.
//!
//! Every failure stops the pipeline; nothing is retried and no partial SQL is
//! returned. Variants raised while walking the tree carry the reconstructed
//! source text of the offending sub-expression in their `expr` field.

use thiserror::Error;

/// Errors produced while compiling a query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Name '{name}' is not defined (in {expr})")]
    UnboundVariable { name: String, expr: String },

    #[error("Unsupported parameter type {type_name} for {expr}: {reason}")]
    UnsupportedParameterType {
        type_name: String,
        reason: String,
        expr: String,
    },

    #[error("Entity {entity} does not have attribute {attribute}: {expr}")]
    UnknownAttribute {
        entity: String,
        attribute: String,
        expr: String,
    },

    #[error("Type mismatch: {message} (in {expr})")]
    TypeMismatch { message: String, expr: String },

    #[error("Ambiguous aggregation: {message} (in {expr})")]
    AmbiguousAggregation { message: String, expr: String },

    #[error("Composite key of {entity} cannot be aggregated in this dialect: {expr}")]
    UnsupportedCompositeAggregate { entity: String, expr: String },

    #[error("Malformed expression tree: {message} (in {expr})")]
    MalformedInputTree { message: String, expr: String },

    #[error("{dialect} does not support {construct}: {expr}")]
    DialectUnsupportedConstruct {
        dialect: String,
        construct: String,
        expr: String,
    },

    #[error("Unknown function {name}: {expr}")]
    UnknownFunction { name: String, expr: String },

    #[error("Failed to compute query identity: {0}")]
    Serialization(String),
}

pub type CompileResult<T> = Result<T, CompileError>;

impl CompileError {
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        CompileError::TypeMismatch {
            message: message.into(),
            expr: String::new(),
        }
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        CompileError::AmbiguousAggregation {
            message: message.into(),
            expr: String::new(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        CompileError::MalformedInputTree {
            message: message.into(),
            expr: String::new(),
        }
    }

    pub fn unsupported(dialect: impl Into<String>, construct: impl Into<String>) -> Self {
        CompileError::DialectUnsupportedConstruct {
            dialect: dialect.into(),
            construct: construct.into(),
            expr: String::new(),
        }
    }

    /// Source text the error points at, if any.
    pub fn expr(&self) -> Option<&str> {
        let expr = match self {
            CompileError::UnboundVariable { expr, .. }
            | CompileError::UnsupportedParameterType { expr, .. }
            | CompileError::UnknownAttribute { expr, .. }
            | CompileError::TypeMismatch { expr, .. }
            | CompileError::AmbiguousAggregation { expr, .. }
            | CompileError::UnsupportedCompositeAggregate { expr, .. }
            | CompileError::MalformedInputTree { expr, .. }
            | CompileError::DialectUnsupportedConstruct { expr, .. }
            | CompileError::UnknownFunction { expr, .. } => expr,
            CompileError::Serialization(_) => return None,
        };
        (!expr.is_empty()).then_some(expr.as_str())
    }

    /// Attach source text unless an inner node already did.
    ///
    /// Errors bubble up through every enclosing node, so the innermost
    /// location wins.
    pub fn at(mut self, source: impl FnOnce() -> String) -> Self {
        let slot = match &mut self {
            CompileError::UnboundVariable { expr, .. }
            | CompileError::UnsupportedParameterType { expr, .. }
            | CompileError::UnknownAttribute { expr, .. }
            | CompileError::TypeMismatch { expr, .. }
            | CompileError::AmbiguousAggregation { expr, .. }
            | CompileError::UnsupportedCompositeAggregate { expr, .. }
            | CompileError::MalformedInputTree { expr, .. }
            | CompileError::DialectUnsupportedConstruct { expr, .. }
            | CompileError::UnknownFunction { expr, .. } => expr,
            CompileError::Serialization(_) => return self,
        };
        if slot.is_empty() {
            *slot = source();
        }
        self
    }
}
