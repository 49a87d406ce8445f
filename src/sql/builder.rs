//! Assemble [`Query`] values from translated scopes.

use crate::translate::registry::{FromItem, Registry, ScopeId, TableId};

use super::expr::Expr;
use super::query::{OrderByExpr, Query, TableRef};

/// Everything a SELECT needs beyond its scope's FROM/WHERE/HAVING.
#[derive(Debug, Clone, Default)]
pub struct SelectPlan {
    pub select: Vec<Expr>,
    pub distinct: bool,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// FROM, WHERE and HAVING of `scope`, with an empty select list.
///
/// The first plain table becomes the FROM item. Further plain tables are
/// cross joined; their correlation lives in the WHERE conditions.
pub fn scope_query(registry: &Registry, scope: ScopeId) -> Query {
    let sql_scope = registry.scope(scope);
    let mut query = Query::new();
    for item in &sql_scope.from {
        query = match item {
            FromItem::Table(id) => {
                let table = table_ref(registry, *id);
                if query.from.is_none() {
                    query.from(table)
                } else {
                    query.cross_join(table)
                }
            }
            FromItem::Join {
                table,
                join_type,
                on,
            } => query.join(*join_type, table_ref(registry, *table), Some(on.clone())),
        };
    }
    for condition in &sql_scope.conditions {
        query = query.filter(condition.clone());
    }
    for condition in &sql_scope.having {
        query = query.having(condition.clone());
    }
    query
}

/// The complete SELECT for `scope`.
pub fn build_select(registry: &Registry, scope: ScopeId, plan: SelectPlan) -> Query {
    let mut query = scope_query(registry, scope)
        .select(plan.select)
        .group_by(plan.group_by)
        .order_by(plan.order_by);
    if plan.distinct {
        query = query.distinct();
    }
    if let Some(limit) = plan.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = plan.offset {
        query = query.offset(offset);
    }
    query
}

fn table_ref(registry: &Registry, id: TableId) -> TableRef {
    let table = registry.table(id);
    let reference = TableRef::new(&table.table);
    match &table.alias {
        Some(alias) => reference.with_alias(alias),
        None => reference,
    }
}
