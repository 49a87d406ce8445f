//! Typed-node translator.
//!
//! Walks a classified [`QueryRoot`] and produces a SQL [`Query`]. Every piece
//! of translation state (current scope, table registry, bound parameters)
//! lives in a [`Translator`] owned by one compilation, so independent
//! compilations never share anything mutable.
//!
//! Dispatch over [`NodeKind`] is a single exhaustive `match`: adding a node
//! kind fails to compile until the translator handles it.

mod calls;
mod operators;
pub mod registry;
pub mod typed;

use tracing::{debug, warn};

use crate::bind::{evaluate, ParameterTable, Scope};
use crate::catalog::{AttributeDef, Catalog};
use crate::error::{CompileError, CompileResult};
use crate::functions::{DatePart, FunctionRegistry, BUILTINS};
use crate::sql::builder::{self, SelectPlan};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{and_all, case_when, cast, lit_int, lit_str, param, Expr, ExprExt, Literal};
use crate::sql::query::{OrderByExpr, Query};
use crate::tree::{BoolOpKind, Comprehension, ExprNode, ForClause, NodeKind, QueryRoot};
use crate::types::{coerce, Value, ValueType};

use registry::{Origin, Registry, ScopeId, TableId};
use typed::{Repr, TypedNode};

/// A translated query.
#[derive(Debug, Clone)]
pub struct Translation {
    pub query: Query,
    /// Type of one result row.
    pub result_type: ValueType,
    /// Number of select-list columns.
    pub columns: usize,
}

/// One select-list or ORDER BY column.
#[derive(Debug, Clone)]
struct Projected {
    expr: Expr,
    aggregated: bool,
    nogroup: bool,
}

/// Translation context for one query.
pub struct Translator<'a> {
    catalog: &'a dyn Catalog,
    functions: &'a FunctionRegistry,
    params: &'a ParameterTable,
    dialect: Dialect,
    inline_constants: bool,
    registry: Registry,
    scope: ScopeId,
}

impl<'a> Translator<'a> {
    pub fn new(catalog: &'a dyn Catalog, params: &'a ParameterTable, dialect: Dialect) -> Self {
        let mut registry = Registry::new(dialect.identifier_max_len());
        let scope = registry.new_scope(None);
        Self {
            catalog,
            functions: &*BUILTINS,
            params,
            dialect,
            inline_constants: false,
            registry,
            scope,
        }
    }

    /// Use a different built-in table.
    pub fn with_functions(mut self, functions: &'a FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Render literal constants inline instead of binding them.
    pub fn inline_constants(mut self, inline: bool) -> Self {
        self.inline_constants = inline;
        self
    }

    /// Translate the whole query: FROM/WHERE from the loops, the select list
    /// from the element, then grouping, DISTINCT, ordering and paging.
    pub fn translate(mut self, root: &QueryRoot) -> CompileResult<Translation> {
        let comp = &root.comprehension;
        let elt = self.comprehension(comp)?;

        let mut columns = Vec::new();
        self.project(&elt, &mut columns)
            .map_err(|e| e.at(|| comp.elt.source()))?;
        if columns.is_empty() {
            return Err(CompileError::malformed("empty select list").at(|| comp.elt.source()));
        }

        let mut order_by = Vec::new();
        let mut order_columns = Vec::new();
        for key in &root.order_by {
            let node = self.node(&key.expr)?;
            let exprs = self
                .columns(&node)
                .map_err(|e| e.at(|| key.expr.source()))?;
            for expr in exprs {
                order_columns.push(Projected {
                    expr: expr.clone(),
                    aggregated: node.aggregated,
                    nogroup: node.nogroup,
                });
                order_by.push(if key.descending {
                    OrderByExpr::desc(expr)
                } else {
                    OrderByExpr::asc(expr)
                });
            }
        }

        let scope = self.scope;
        let grouped = columns.iter().chain(&order_columns).any(|c| c.aggregated)
            || !self.registry.scope(scope).having.is_empty();
        let group_by = if grouped {
            group_keys(&columns, &order_columns)
        } else {
            Vec::new()
        };
        let distinct = match root.distinct {
            Some(explicit) => explicit,
            None => self.infer_distinct(&columns, &order_columns, grouped)?,
        };

        let select: Vec<Expr> = columns.into_iter().map(|c| c.expr).collect();
        let width = select.len();
        let query = builder::build_select(
            &self.registry,
            scope,
            SelectPlan {
                select,
                distinct,
                group_by,
                order_by,
                limit: root.limit,
                offset: root.offset,
            },
        );
        debug!(columns = width, distinct, grouped, "translated query");
        Ok(Translation {
            query,
            result_type: elt.value_type,
            columns: width,
        })
    }

    // =========================================================================
    // Comprehensions
    // =========================================================================

    fn comprehension(&mut self, comp: &Comprehension) -> CompileResult<TypedNode> {
        if comp.clauses.is_empty() {
            return Err(CompileError::malformed("comprehension without a for clause"));
        }
        for clause in &comp.clauses {
            self.clause(clause)?;
        }
        self.node(&comp.elt)
    }

    fn clause(&mut self, clause: &ForClause) -> CompileResult<()> {
        let iter = self.node(&clause.iter)?;
        let catalog = self.catalog;
        match &iter.repr {
            Repr::EntitySet(entity) => {
                let id = self
                    .registry
                    .add_root_tableref(self.scope, &clause.target, *entity, catalog);
                self.registry.make_join(id, catalog)?;
            }
            Repr::Collection { parent, attr } => {
                let def = self.attribute_def(*parent, attr)?;
                self.registry
                    .iterate_collection(self.scope, &clause.target, *parent, def, catalog)
                    .map_err(|e| e.at(|| clause.iter.source()))?;
            }
            _ => {
                return Err(CompileError::type_mismatch(format!(
                    "cannot iterate over {}",
                    iter.value_type
                ))
                .at(|| clause.iter.source()))
            }
        }
        debug!(variable = %clause.target, "bound loop variable");
        self.registry.scope_mut(self.scope).clauses += 1;
        for condition in &clause.conditions {
            self.condition(condition)?;
        }
        Ok(())
    }

    /// Add one `if` condition to WHERE or HAVING.
    ///
    /// A top-level `and` is split so that aggregated and per-row conjuncts
    /// each land where they belong.
    fn condition(&mut self, node: &ExprNode) -> CompileResult<()> {
        if let NodeKind::BoolOp {
            op: BoolOpKind::And,
            values,
        } = &node.kind
        {
            if !node.is_external() {
                for value in values {
                    self.condition(value)?;
                }
                return Ok(());
            }
        }
        let typed = self.node(node)?;
        let expr = self
            .as_condition(&typed)
            .map_err(|e| e.at(|| node.source()))?;
        let scope = self.registry.scope_mut(self.scope);
        if typed.aggregated {
            scope.having.push(expr);
        } else {
            scope.conditions.push(expr);
        }
        Ok(())
    }

    fn nested(&mut self, comp: &Comprehension) -> CompileResult<TypedNode> {
        let child = self.registry.new_scope(Some(self.scope));
        let outer = std::mem::replace(&mut self.scope, child);
        let result = self.comprehension(comp);
        self.scope = outer;
        let elt = result?;
        Ok(TypedNode::new(
            ValueType::set_of(elt.value_type.clone()),
            Repr::Subquery {
                scope: child,
                elt: Box::new(elt),
            },
        ))
    }

    // =========================================================================
    // Node dispatch
    // =========================================================================

    /// Translate one node, tagging errors with its source text.
    pub(crate) fn node(&mut self, node: &ExprNode) -> CompileResult<TypedNode> {
        self.dispatch(node).map_err(|e| e.at(|| node.source()))
    }

    fn dispatch(&mut self, node: &ExprNode) -> CompileResult<TypedNode> {
        match &node.kind {
            NodeKind::Constant(value) => self.constant(node, value),
            _ if node.is_external() && node.is_extractable() => {
                if node.is_constant() {
                    let value = evaluate(node, &Scope::default(), self.catalog)?;
                    self.folded(value)
                } else {
                    self.parameter(node)
                }
            }
            NodeKind::Name(id) => self.name(id),
            NodeKind::Attribute { value, attr } => {
                let base = self.node(value)?;
                self.attribute(base, attr)
            }
            NodeKind::Compare {
                left,
                ops,
                comparators,
            } => self.compare(left, ops, comparators),
            NodeKind::BoolOp { op, values } => self.bool_op(*op, values),
            NodeKind::BinOp { op, left, right } => self.bin_op(*op, left, right),
            NodeKind::UnaryOp { op, operand } => self.unary_op(*op, operand),
            NodeKind::Call {
                func,
                args,
                keywords,
            } => self.call(func, args, keywords),
            NodeKind::Tuple(items) => {
                let nodes = self.nodes(items)?;
                let value_type = ValueType::Row(nodes.iter().map(|n| n.value_type.clone()).collect());
                let mut typed = TypedNode::new(value_type, Repr::Row(Vec::new())).derived_from(&nodes);
                typed.repr = Repr::Row(nodes);
                Ok(typed)
            }
            NodeKind::List(items) => {
                let nodes = self.nodes(items)?;
                let mut element = ValueType::Null;
                for n in &nodes {
                    element = coerce(&element, &n.value_type).ok_or_else(|| {
                        CompileError::type_mismatch(format!(
                            "list mixes {} and {}",
                            element, n.value_type
                        ))
                    })?;
                }
                let mut typed = TypedNode::new(ValueType::set_of(element), Repr::Values(Vec::new()))
                    .derived_from(&nodes);
                typed.repr = Repr::Values(nodes);
                Ok(typed)
            }
            NodeKind::Starred(_) => Err(CompileError::malformed(
                "starred expression outside of a call argument list",
            )),
            NodeKind::Comprehension(comp) => self.nested(comp),
            NodeKind::FormattedValue(inner) => self.node(inner),
        }
    }

    fn nodes(&mut self, items: &[ExprNode]) -> CompileResult<Vec<TypedNode>> {
        items.iter().map(|item| self.node(item)).collect()
    }

    // =========================================================================
    // Leaves
    // =========================================================================

    fn constant(&mut self, node: &ExprNode, value: &Value) -> CompileResult<TypedNode> {
        if value.is_null() {
            return Ok(TypedNode::constant(Value::Null, ValueType::Null));
        }
        if self.inline_constants {
            return self.folded(value.clone());
        }
        self.parameter(node)
    }

    /// A value computed at translation time.
    fn folded(&self, value: Value) -> CompileResult<TypedNode> {
        let normalized = ValueType::normalize(&value, self.catalog).map_err(|reason| {
            CompileError::UnsupportedParameterType {
                type_name: value.kind_name().to_string(),
                reason,
                expr: String::new(),
            }
        })?;
        match normalized.value {
            Value::List(items) => {
                let nodes = items
                    .into_iter()
                    .map(|item| self.folded(item))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(TypedNode::new(normalized.value_type, Repr::Values(nodes)).nogroup(true))
            }
            Value::EntitySet(_) => match normalized.value_type.element().and_then(ValueType::entity) {
                Some(entity) => Ok(TypedNode::new(normalized.value_type, Repr::EntitySet(entity))),
                None => Err(CompileError::malformed("entity set without an entity type")),
            },
            value => Ok(TypedNode::constant(value, normalized.value_type)),
        }
    }

    /// Placeholders for an extracted sub-expression.
    fn parameter(&self, node: &ExprNode) -> CompileResult<TypedNode> {
        let source = node.source();
        let bound = self.params.get(&source).ok_or_else(|| {
            CompileError::malformed(format!("no value bound for '{source}'"))
        })?;
        if bound.value_type.is_null() {
            return Ok(TypedNode::constant(Value::Null, ValueType::Null));
        }
        let mut offset = 0;
        self.bound_value(&source, &bound.value_type, &bound.value, &mut offset)
    }

    /// Slots are numbered in the order [`Value::flatten_into`] emits scalars.
    fn bound_value(
        &self,
        source: &str,
        value_type: &ValueType,
        value: &Value,
        offset: &mut usize,
    ) -> CompileResult<TypedNode> {
        let typed = match value {
            Value::EntitySet(name) => {
                let entity = value_type
                    .element()
                    .and_then(ValueType::entity)
                    .ok_or_else(|| CompileError::malformed(format!("{name} is not an entity set")))?;
                *offset += 1;
                TypedNode::new(value_type.clone(), Repr::EntitySet(entity))
            }
            Value::List(items) => {
                let element = value_type.element().cloned().unwrap_or(ValueType::Null);
                let nodes = items
                    .iter()
                    .map(|item| self.bound_value(source, &element, item, offset))
                    .collect::<CompileResult<Vec<_>>>()?;
                TypedNode::new(value_type.clone(), Repr::Values(nodes))
            }
            Value::Tuple(items) => {
                let types = match value_type {
                    ValueType::Row(types) if types.len() == items.len() => types.clone(),
                    _ => vec![ValueType::Null; items.len()],
                };
                let nodes = items
                    .iter()
                    .zip(&types)
                    .map(|(item, item_type)| self.bound_value(source, item_type, item, offset))
                    .collect::<CompileResult<Vec<_>>>()?;
                TypedNode::new(value_type.clone(), Repr::Row(nodes))
            }
            Value::Entity { key, .. } => {
                let exprs = key
                    .iter()
                    .map(|_| {
                        let slot = param(source, *offset);
                        *offset += 1;
                        slot
                    })
                    .collect();
                TypedNode::new(value_type.clone(), Repr::Sql(exprs))
            }
            scalar => {
                let slot = param(source, *offset);
                *offset += 1;
                TypedNode::sql(value_type.clone(), slot).nullable(scalar.is_null())
            }
        };
        Ok(typed.nogroup(true))
    }

    fn name(&mut self, id: &str) -> CompileResult<TypedNode> {
        let table = self
            .registry
            .lookup(self.scope, id)
            .ok_or_else(|| CompileError::UnboundVariable {
                name: id.to_string(),
                expr: String::new(),
            })?;
        Ok(self.table_node(table))
    }

    fn table_node(&self, id: TableId) -> TypedNode {
        let table = self.registry.table(id);
        TypedNode::new(ValueType::Entity(table.entity), Repr::Table(id)).nullable(table.nullable)
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    fn attribute(&mut self, base: TypedNode, attr: &str) -> CompileResult<TypedNode> {
        match &base.repr {
            Repr::Table(id) => self.entity_attribute(&base, *id, attr),
            Repr::Sql(_) | Repr::Constant(_) if base.value_type.is_temporal() => {
                match DatePart::from_name(attr) {
                    Some(part) => self.extract(base, part),
                    None => Err(no_attribute(&base.value_type, attr)),
                }
            }
            _ => Err(no_attribute(&base.value_type, attr)),
        }
    }

    fn entity_attribute(&mut self, base: &TypedNode, id: TableId, attr: &str) -> CompileResult<TypedNode> {
        let catalog = self.catalog;
        let def = self.attribute_def(id, attr)?;
        if def.is_collection() {
            return Ok(TypedNode::new(
                def.value_type.clone(),
                Repr::Collection {
                    parent: id,
                    attr: attr.to_string(),
                },
            ));
        }
        if def.is_relationship() {
            let child = self.registry.join_attribute(id, def, catalog)?;
            return Ok(self.table_node(child));
        }
        let columns = self.registry.attribute_columns(id, def, catalog)?;
        Ok(TypedNode::new(def.value_type.clone(), Repr::Sql(columns))
            .nullable(def.nullable || base.nullable))
    }

    /// Attribute `attr` of the entity behind `table`.
    fn attribute_def(&self, table: TableId, attr: &str) -> CompileResult<&'a AttributeDef> {
        let catalog = self.catalog;
        let entity = self.registry.table(table).entity;
        catalog
            .attribute(entity, attr)
            .ok_or_else(|| CompileError::UnknownAttribute {
                entity: catalog.entity_name(entity).to_string(),
                attribute: attr.to_string(),
                expr: String::new(),
            })
    }

    pub(crate) fn extract(&mut self, base: TypedNode, part: DatePart) -> CompileResult<TypedNode> {
        if !part.applies_to(&base.value_type) {
            return Err(CompileError::type_mismatch(format!(
                "{} has no {} component",
                base.value_type,
                part.keyword().to_lowercase()
            )));
        }
        let expr = self.scalar(&base)?;
        Ok(TypedNode::sql(
            ValueType::INT,
            Expr::Extract {
                part,
                expr: Box::new(expr),
            },
        )
        .derived_from([&base]))
    }

    // =========================================================================
    // Lowering typed nodes to SQL
    // =========================================================================

    /// SQL value expressions of a node, one per column.
    pub(crate) fn columns(&mut self, node: &TypedNode) -> CompileResult<Vec<Expr>> {
        match &node.repr {
            Repr::Sql(exprs) => Ok(exprs.iter().cloned().map(|e| self.value_expr(e)).collect()),
            Repr::Table(id) => self.registry.key_columns(*id, self.catalog),
            Repr::Constant(value) => literal_columns(value),
            Repr::Row(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.extend(self.columns(item)?);
                }
                Ok(out)
            }
            Repr::Values(_) | Repr::EntitySet(_) | Repr::Collection { .. } | Repr::Subquery { .. } => {
                Err(CompileError::type_mismatch(format!(
                    "{} cannot be used as a single value",
                    node.value_type
                )))
            }
        }
    }

    /// The single SQL expression of a scalar node.
    pub(crate) fn scalar(&mut self, node: &TypedNode) -> CompileResult<Expr> {
        let mut columns = self.columns(node)?;
        match columns.len() {
            1 => columns
                .pop()
                .ok_or_else(|| CompileError::malformed("missing column")),
            n => Err(CompileError::type_mismatch(format!(
                "expected a single value, got {n} columns of {}",
                node.value_type
            ))),
        }
    }

    /// A scalar with booleans widened to integers, for arithmetic.
    pub(crate) fn numeric_operand(&mut self, node: &TypedNode) -> CompileResult<Expr> {
        let expr = self.scalar(node)?;
        Ok(if node.value_type.is_bool() {
            cast(expr, self.dialect.integer_cast_type())
        } else {
            expr
        })
    }

    /// Predicates used as values become 1/0 where there is no boolean type.
    fn value_expr(&self, expr: Expr) -> Expr {
        if !self.dialect.supports_boolean_type() && expr.is_predicate() {
            case_when(expr, lit_int(1), Some(lit_int(0)))
        } else {
            expr
        }
    }

    /// The node as a WHERE/HAVING predicate, following host truthiness.
    pub(crate) fn as_condition(&mut self, node: &TypedNode) -> CompileResult<Expr> {
        match &node.repr {
            Repr::Constant(value) => Ok(truth(value.truthy())),
            Repr::Values(items) | Repr::Row(items) => Ok(truth(!items.is_empty())),
            Repr::EntitySet(_) => Ok(truth(true)),
            Repr::Collection { .. } | Repr::Subquery { .. } => self.exists(node, false),
            Repr::Table(id) => {
                let keys = self.registry.key_columns(*id, self.catalog)?;
                Ok(and_all(keys.into_iter().map(ExprExt::is_not_null)))
            }
            Repr::Sql(exprs) => {
                let [expr] = exprs.as_slice() else {
                    return Err(CompileError::type_mismatch(format!(
                        "{} cannot be used as a condition",
                        node.value_type
                    )));
                };
                let expr = expr.clone();
                let value_type = &node.value_type;
                Ok(if expr.is_predicate() {
                    expr
                } else if value_type.is_bool() {
                    if self.dialect.supports_boolean_type() {
                        expr
                    } else {
                        expr.eq(lit_int(1))
                    }
                } else if value_type.is_number() {
                    expr.ne(lit_int(0))
                } else if value_type.is_text() {
                    expr.ne(lit_str(""))
                } else if value_type.is_null() {
                    truth(false)
                } else {
                    expr.is_not_null()
                })
            }
        }
    }

    // =========================================================================
    // Sub-queries
    // =========================================================================

    /// The scope and element of anything that can act as a sub-query.
    ///
    /// Collections and entity sets get a fresh child scope; nested
    /// comprehensions already have one.
    pub(crate) fn subquery_source(&mut self, node: &TypedNode) -> CompileResult<(ScopeId, TypedNode)> {
        let catalog = self.catalog;
        match &node.repr {
            Repr::Subquery { scope, elt } => Ok((*scope, (**elt).clone())),
            Repr::Collection { parent, attr } => {
                let def = self.attribute_def(*parent, attr)?;
                let target = def.relationship_target.ok_or_else(|| {
                    CompileError::type_mismatch(format!("{attr} is not a relationship"))
                })?;
                let child = self.registry.new_scope(Some(self.scope));
                let table = self.registry.iterate_collection(
                    child,
                    catalog.entity_name(target),
                    *parent,
                    def,
                    catalog,
                )?;
                Ok((child, self.table_node(table)))
            }
            Repr::EntitySet(entity) => {
                let child = self.registry.new_scope(Some(self.scope));
                let table = self.registry.add_root_tableref(
                    child,
                    catalog.entity_name(*entity),
                    *entity,
                    catalog,
                );
                self.registry.make_join(table, catalog)?;
                Ok((child, self.table_node(table)))
            }
            Repr::Values(_) | Repr::Sql(_) | Repr::Table(_) | Repr::Constant(_) | Repr::Row(_) => {
                Err(CompileError::type_mismatch(format!(
                    "{} cannot be queried",
                    node.value_type
                )))
            }
        }
    }

    /// FROM/WHERE/HAVING of a sub-query scope, without a select list.
    pub(crate) fn scope_query(&self, scope: ScopeId) -> Query {
        builder::scope_query(&self.registry, scope)
    }

    pub(crate) fn exists(&mut self, node: &TypedNode, negated: bool) -> CompileResult<Expr> {
        let (scope, _) = self.subquery_source(node)?;
        let query = self.scope_query(scope).select(vec![lit_int(1)]);
        Ok(Expr::Exists {
            subquery: Box::new(query),
            negated,
        })
    }

    pub(crate) fn unsupported(&self, construct: impl Into<String>) -> CompileError {
        CompileError::unsupported(self.dialect.to_string(), construct)
    }

    // =========================================================================
    // Projection
    // =========================================================================

    fn project(&mut self, node: &TypedNode, out: &mut Vec<Projected>) -> CompileResult<()> {
        let exprs = match &node.repr {
            Repr::Row(items) => {
                for item in items {
                    self.project(item, out)?;
                }
                return Ok(());
            }
            Repr::Table(id) => self.entity_columns(*id)?,
            Repr::Sql(_) | Repr::Constant(_) => self.columns(node)?,
            Repr::Values(_) | Repr::EntitySet(_) | Repr::Collection { .. } | Repr::Subquery { .. } => {
                return Err(CompileError::type_mismatch(format!(
                    "cannot select {}; aggregate it or iterate over it",
                    node.value_type
                )))
            }
        };
        out.extend(exprs.into_iter().map(|expr| Projected {
            expr,
            aggregated: node.aggregated,
            nogroup: node.nogroup,
        }));
        Ok(())
    }

    /// Every stored column of an entity, key first.
    fn entity_columns(&mut self, id: TableId) -> CompileResult<Vec<Expr>> {
        let catalog = self.catalog;
        self.registry.make_join(id, catalog)?;
        let entity = self.registry.table(id).entity;
        let mut out: Vec<Expr> = Vec::new();
        let (keys, rest): (Vec<&AttributeDef>, Vec<&AttributeDef>) = catalog
            .entity_attributes(entity)
            .iter()
            .filter(|a| !a.column_names.is_empty())
            .partition(|a| a.primary_key);
        for attr in keys.into_iter().chain(rest) {
            for expr in self.registry.attribute_columns(id, attr, catalog)? {
                if !out.contains(&expr) {
                    out.push(expr);
                }
            }
        }
        Ok(out)
    }

    /// DISTINCT is needed when some loop variable's row can repeat in the
    /// result: its key is not projected, nor implied by a projected child
    /// iterated through one of its collections.
    fn infer_distinct(
        &mut self,
        columns: &[Projected],
        order_columns: &[Projected],
        grouped: bool,
    ) -> CompileResult<bool> {
        if grouped {
            return Ok(false);
        }
        let scope = self.registry.scope(self.scope);
        if !scope.fans_out && scope.clauses < 2 {
            return Ok(false);
        }
        let loop_tables: Vec<TableId> = scope.names().map(|(_, id)| id).collect();

        let mut covered = Vec::new();
        for &table in &loop_tables {
            let keys = self.registry.key_columns(table, self.catalog)?;
            if keys.iter().all(|k| columns.iter().any(|c| &c.expr == k)) {
                covered.push(table);
            }
        }
        // A projected collection member identifies its parent row too.
        let mut i = 0;
        while i < covered.len() {
            if let Origin::Joined { parent, .. } = &self.registry.table(covered[i]).origin {
                if !covered.contains(parent) {
                    covered.push(*parent);
                }
            }
            i += 1;
        }
        if loop_tables.iter().all(|t| covered.contains(t)) {
            return Ok(false);
        }

        if let Some(missing) = order_columns
            .iter()
            .find(|o| !columns.iter().any(|c| c.expr == o.expr))
        {
            warn!(
                order_key = ?missing.expr,
                "ordering by a column outside the select list; rows may repeat"
            );
            return Ok(false);
        }
        Ok(true)
    }
}

/// GROUP BY keys: every per-row column of the select list and ORDER BY.
fn group_keys(columns: &[Projected], order_columns: &[Projected]) -> Vec<Expr> {
    let mut keys: Vec<Expr> = Vec::new();
    for column in columns.iter().chain(order_columns) {
        if !column.aggregated && !column.nogroup && !keys.contains(&column.expr) {
            keys.push(column.expr.clone());
        }
    }
    keys
}

/// Always-true or always-false predicate.
pub(crate) fn truth(value: bool) -> Expr {
    if value {
        Expr::And(Vec::new())
    } else {
        Expr::Or(Vec::new())
    }
}

fn literal_columns(value: &Value) -> CompileResult<Vec<Expr>> {
    let mut flat = Vec::new();
    value.flatten_into(&mut flat);
    flat.iter()
        .map(|v| {
            Literal::from_value(v)
                .map(Expr::Literal)
                .ok_or_else(|| CompileError::UnsupportedParameterType {
                    type_name: v.kind_name().to_string(),
                    reason: "has no SQL literal form".into(),
                    expr: String::new(),
                })
        })
        .collect()
}

fn no_attribute(value_type: &ValueType, attr: &str) -> CompileError {
    CompileError::type_mismatch(format!("'{value_type}' object has no attribute '{attr}'"))
}
