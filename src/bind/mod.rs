//! Parameter binding.
//!
//! Evaluates every maximal external subtree found by the classifier against
//! the calling scope and normalizes the results into a [`ParameterTable`].
//! Binding is side-effect free, so a cached plan can be re-bound with a new
//! scope without translating the query again.

pub mod eval;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{CompileError, CompileResult};
use crate::tree::ExprNode;
use crate::types::{Value, ValueType};

pub use eval::evaluate;

/// A function supplied by the host and callable from external expressions.
pub type HostFunction = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Three-tier calling scope.
///
/// Lookup order is closure cells, then locals, then globals. A cell that
/// exists without a value is a variable referenced before assignment.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scope {
    cells: BTreeMap<String, Option<Value>>,
    locals: BTreeMap<String, Value>,
    globals: BTreeMap<String, Value>,
    #[serde(skip)]
    functions: BTreeMap<String, HostFunction>,
}

/// Result of a scope lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Value),
    Unassigned,
    Missing,
}

impl Scope {
    #[must_use]
    pub fn with_cell(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.cells.insert(name.into(), Some(value.into()));
        self
    }

    /// A closure cell whose variable has not been assigned yet.
    #[must_use]
    pub fn with_unassigned_cell(mut self, name: &str) -> Self {
        self.cells.insert(name.into(), None);
        self
    }

    #[must_use]
    pub fn with_local(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.locals.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_global(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_function(
        mut self,
        name: &str,
        f: impl Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.functions.insert(name.into(), Arc::new(f));
        self
    }

    pub fn set_local(&mut self, name: &str, value: impl Into<Value>) {
        self.locals.insert(name.into(), value.into());
    }

    pub fn lookup(&self, name: &str) -> Lookup<'_> {
        if let Some(cell) = self.cells.get(name) {
            return match cell {
                Some(value) => Lookup::Found(value),
                None => Lookup::Unassigned,
            };
        }
        self.locals
            .get(name)
            .or_else(|| self.globals.get(name))
            .map_or(Lookup::Missing, Lookup::Found)
    }

    pub fn function(&self, name: &str) -> Option<&HostFunction> {
        self.functions.get(name)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("cells", &self.cells)
            .field("locals", &self.locals)
            .field("globals", &self.globals)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl From<Value> for Scope {
    /// A scope whose locals are the fields of a mapping value.
    fn from(value: Value) -> Self {
        match value {
            Value::Map(locals) => Scope {
                locals,
                ..Scope::default()
            },
            _ => Scope::default(),
        }
    }
}

// =============================================================================
// Parameter table
// =============================================================================

/// Content hash identifying a query shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(pub String);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for logs.
        let short: String = self.0.chars().take(12).collect();
        f.write_str(&short)
    }
}

/// Identity of one bound parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ParameterKey {
    pub query_id: QueryId,
    pub source: String,
}

/// A normalized parameter value.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub key: ParameterKey,
    pub value_type: ValueType,
    pub value: Value,
}

impl BoundParameter {
    /// Scalars bound for this parameter, one per placeholder.
    pub fn flattened(&self) -> Vec<Value> {
        let mut out = Vec::new();
        self.value.flatten_into(&mut out);
        out
    }

    /// Element count for set-valued parameters.
    pub fn set_len(&self) -> Option<usize> {
        match (&self.value_type, &self.value) {
            (ValueType::SetOf(_), Value::List(items)) => Some(items.len()),
            _ => None,
        }
    }
}

/// Shape of one parameter as seen by the translator. Two bindings with the
/// same shapes translate to the same SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamShape {
    pub source: String,
    pub value_type: ValueType,
    pub set_len: Option<usize>,
}

/// All parameters of one query, keyed by source text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterTable {
    entries: BTreeMap<String, BoundParameter>,
}

impl ParameterTable {
    pub fn get(&self, source: &str) -> Option<&BoundParameter> {
        self.entries.get(source)
    }

    pub fn insert(&mut self, param: BoundParameter) {
        self.entries.insert(param.key.source.clone(), param);
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundParameter> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Type signature used as part of the plan cache key.
    pub fn signature(&self) -> Vec<ParamShape> {
        self.entries
            .values()
            .map(|p| ParamShape {
                source: p.key.source.clone(),
                value_type: p.value_type.clone(),
                set_len: p.set_len(),
            })
            .collect()
    }
}

/// Evaluate and normalize every extracted subtree.
pub fn bind(
    query_id: &QueryId,
    extracted: &BTreeMap<String, ExprNode>,
    scope: &Scope,
    catalog: &dyn Catalog,
) -> CompileResult<ParameterTable> {
    let mut table = ParameterTable::default();
    for (source, node) in extracted {
        let raw = evaluate(node, scope, catalog)?;
        let normalized = ValueType::normalize(&raw, catalog).map_err(|reason| {
            CompileError::UnsupportedParameterType {
                type_name: raw.kind_name().to_string(),
                reason,
                expr: source.clone(),
            }
        })?;
        table.insert(BoundParameter {
            key: ParameterKey {
                query_id: query_id.clone(),
                source: source.clone(),
            },
            value_type: normalized.value_type,
            value: normalized.value,
        });
    }
    debug!(query = %query_id, params = table.len(), "bound parameters");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaCatalog;
    use crate::tree::{constant, name};

    fn extracted(nodes: Vec<ExprNode>) -> BTreeMap<String, ExprNode> {
        nodes.into_iter().map(|n| (n.source(), n)).collect()
    }

    fn qid() -> QueryId {
        QueryId("abc".into())
    }

    #[test]
    fn test_cells_shadow_locals_and_globals() {
        let scope = Scope::default()
            .with_global("x", 1)
            .with_local("x", 2)
            .with_cell("x", 3);
        assert_eq!(scope.lookup("x"), Lookup::Found(&Value::Int(3)));
        let scope = Scope::default().with_global("x", 1).with_local("x", 2);
        assert_eq!(scope.lookup("x"), Lookup::Found(&Value::Int(2)));
        assert_eq!(scope.lookup("y"), Lookup::Missing);
    }

    #[test]
    fn test_unassigned_cell_is_unbound() {
        let scope = Scope::default().with_unassigned_cell("x").with_global("x", 1);
        let err = bind(&qid(), &extracted(vec![name("x")]), &scope, &SchemaCatalog::default())
            .unwrap_err();
        assert!(matches!(err, CompileError::UnboundVariable { .. }));
    }

    #[test]
    fn test_missing_name_is_unbound() {
        let err = bind(&qid(), &extracted(vec![name("nope")]), &Scope::default(), &SchemaCatalog::default())
            .unwrap_err();
        match err {
            CompileError::UnboundVariable { name, expr } => {
                assert_eq!(name, "nope");
                assert_eq!(expr, "nope");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_mapping_rejected() {
        let scope = Scope::default().with_local("m", Value::Map(BTreeMap::new()));
        let err = bind(&qid(), &extracted(vec![name("m")]), &scope, &SchemaCatalog::default())
            .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedParameterType { .. }));
    }

    #[test]
    fn test_signature_tracks_set_length() {
        let scope = Scope::default()
            .with_local("ids", Value::List(vec![Value::Int(1), Value::Int(2)]));
        let table = bind(
            &qid(),
            &extracted(vec![name("ids"), constant(30)]),
            &scope,
            &SchemaCatalog::default(),
        )
        .unwrap();
        let sig = table.signature();
        assert_eq!(sig.len(), 2);
        let ids = sig.iter().find(|s| s.source == "ids").unwrap();
        assert_eq!(ids.value_type, ValueType::set_of(ValueType::INT));
        assert_eq!(ids.set_len, Some(2));
    }

    #[test]
    fn test_rebinding_changes_only_values() {
        let nodes = extracted(vec![name("x")]);
        let a = bind(&qid(), &nodes, &Scope::default().with_local("x", 1), &SchemaCatalog::default()).unwrap();
        let b = bind(&qid(), &nodes, &Scope::default().with_local("x", 2), &SchemaCatalog::default()).unwrap();
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a, b);
    }
}
