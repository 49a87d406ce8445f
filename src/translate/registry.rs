//! Join/table registry.
//!
//! One registry lives for one translation. It owns every SQL scope (the root
//! SELECT and each nested sub-query), every table reference and the alias
//! allocator they share.
//!
//! Table references are created unjoined. A root reference is placed in FROM
//! and a joined reference gets its JOIN edge only when [`Registry::make_join`]
//! is first called for it, so a reference that is only ever compared by key
//! through a foreign key held on the parent side never costs a join.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::catalog::{AttributeDef, Catalog, EntityId};
use crate::error::{CompileError, CompileResult};
use crate::sql::expr::{and_all, table_col, Expr, ExprExt};
use crate::sql::query::JoinType;

/// Index of a scope inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

/// Index of a table reference inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(usize);

/// How a table reference is reached.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    /// Iterated directly (`for p in Person`).
    Root,
    /// Reached from `parent` through the relationship attribute `attr`.
    Joined { parent: TableId, attr: String },
}

/// A named, aliased binding of an entity table within one scope.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub entity: EntityId,
    pub table: String,
    pub scope: ScopeId,
    pub origin: Origin,
    /// Assigned when the reference is materialized.
    pub alias: Option<String>,
    /// Rows may be missing (reached through an optional relationship).
    pub nullable: bool,
    pub used_attrs: BTreeSet<String>,
    base_name: String,
}

impl TableRef {
    pub fn is_joined(&self) -> bool {
        self.alias.is_some()
    }
}

/// One FROM-clause item, in materialization order.
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Table(TableId),
    Join {
        table: TableId,
        join_type: JoinType,
        on: Expr,
    },
}

/// Tables, joins and conditions of one SELECT.
#[derive(Debug, Clone, Default)]
pub struct SqlScope {
    pub parent: Option<ScopeId>,
    names: BTreeMap<String, TableId>,
    pub from: Vec<FromItem>,
    pub conditions: Vec<Expr>,
    pub having: Vec<Expr>,
    /// Number of `for` clauses translated into this scope.
    pub clauses: usize,
    /// A one-to-many relationship was traversed, so root rows may repeat.
    pub fans_out: bool,
}

impl SqlScope {
    /// Loop variables bound directly in this scope.
    pub fn names(&self) -> impl Iterator<Item = (&str, TableId)> {
        self.names.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

/// Allocates unique table aliases.
///
/// Counters only grow, and one allocator serves every scope of a
/// translation, so an alias is never reused anywhere in the statement.
#[derive(Debug, Clone)]
pub struct AliasAllocator {
    max_len: usize,
    counters: HashMap<String, usize>,
}

impl AliasAllocator {
    pub fn new(identifier_max_len: usize) -> Self {
        Self {
            max_len: identifier_max_len,
            counters: HashMap::new(),
        }
    }

    /// Next alias for `base`: the bare name on first use (`t` excepted),
    /// then `name-2`, `name-3`, ...
    pub fn allocate(&mut self, base: &str) -> String {
        // Room for the "-N" suffix.
        let keep = self.max_len.saturating_sub(3).max(1);
        let name: String = base.to_lowercase().chars().take(keep).collect();
        let counter = self.counters.entry(name.clone()).or_insert(0);
        *counter += 1;
        let alias = if *counter == 1 && name != "t" {
            name
        } else {
            format!("{name}-{counter}")
        };
        trace!(base, alias = %alias, "allocated alias");
        alias
    }
}

/// Scopes and table references of one translation.
#[derive(Debug, Clone)]
pub struct Registry {
    scopes: Vec<SqlScope>,
    tables: Vec<TableRef>,
    /// `(parent, attribute)` → joined reference, so a prefix is joined once.
    paths: HashMap<(TableId, String), TableId>,
    aliases: AliasAllocator,
}

impl Registry {
    pub fn new(identifier_max_len: usize) -> Self {
        Self {
            scopes: Vec::new(),
            tables: Vec::new(),
            paths: HashMap::new(),
            aliases: AliasAllocator::new(identifier_max_len),
        }
    }

    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(SqlScope {
            parent,
            ..SqlScope::default()
        });
        ScopeId(self.scopes.len() - 1)
    }

    pub fn scope(&self, id: ScopeId) -> &SqlScope {
        &self.scopes[id.0]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut SqlScope {
        &mut self.scopes[id.0]
    }

    pub fn table(&self, id: TableId) -> &TableRef {
        &self.tables[id.0]
    }

    /// Whether `inner` is `outer` or nested inside it.
    pub fn is_within(&self, inner: ScopeId, outer: ScopeId) -> bool {
        let mut current = Some(inner);
        while let Some(id) = current {
            if id == outer {
                return true;
            }
            current = self.scope(id).parent;
        }
        false
    }

    /// Resolve a loop variable from `scope` outwards.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<TableId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            if let Some(table) = s.names.get(name) {
                return Some(*table);
            }
            current = s.parent;
        }
        None
    }

    pub fn bind_name(&mut self, scope: ScopeId, name: &str, table: TableId) {
        self.scope_mut(scope).names.insert(name.to_string(), table);
    }

    fn push_table(&mut self, table: TableRef) -> TableId {
        self.tables.push(table);
        TableId(self.tables.len() - 1)
    }

    /// Register `for name in Entity`. Nothing is emitted until
    /// [`make_join`](Self::make_join).
    pub fn add_root_tableref(
        &mut self,
        scope: ScopeId,
        name: &str,
        entity: EntityId,
        catalog: &dyn Catalog,
    ) -> TableId {
        let id = self.push_table(TableRef {
            entity,
            table: catalog.entity_table_name(entity),
            scope,
            origin: Origin::Root,
            alias: None,
            nullable: false,
            used_attrs: BTreeSet::new(),
            base_name: name.to_string(),
        });
        self.bind_name(scope, name, id);
        id
    }

    /// Reference reached from `parent` through a to-one relationship.
    ///
    /// Cached per `(parent, attribute)`: `p.city.name` and `p.city.id` share
    /// one reference and therefore at most one join.
    pub fn join_attribute(
        &mut self,
        parent: TableId,
        attr: &AttributeDef,
        catalog: &dyn Catalog,
    ) -> CompileResult<TableId> {
        let key = (parent, attr.name.clone());
        if let Some(existing) = self.paths.get(&key) {
            return Ok(*existing);
        }
        let target = relationship_target(attr)?;
        let parent_ref = self.table(parent);
        let table = TableRef {
            entity: target,
            table: catalog.entity_table_name(target),
            scope: parent_ref.scope,
            origin: Origin::Joined {
                parent,
                attr: attr.name.clone(),
            },
            alias: None,
            nullable: parent_ref.nullable || attr.nullable || !attr.owns_fk,
            used_attrs: BTreeSet::new(),
            base_name: catalog.entity_name(target).to_string(),
        };
        let id = self.push_table(table);
        self.tables[parent.0].used_attrs.insert(attr.name.clone());
        self.paths.insert(key, id);
        Ok(id)
    }

    /// Follow a chain of to-one attributes from `parent`.
    pub fn resolve_path(
        &mut self,
        parent: TableId,
        attr_names: &[&str],
        catalog: &dyn Catalog,
    ) -> CompileResult<TableId> {
        let mut current = parent;
        for name in attr_names {
            let entity = self.table(current).entity;
            let attr = catalog.attribute(entity, name).ok_or_else(|| {
                CompileError::UnknownAttribute {
                    entity: catalog.entity_name(entity).to_string(),
                    attribute: name.to_string(),
                    expr: String::new(),
                }
            })?;
            if attr.is_collection() || !attr.is_relationship() {
                return Err(CompileError::type_mismatch(format!(
                    "{}.{} is not a reference",
                    catalog.entity_name(entity),
                    name
                )));
            }
            current = self.join_attribute(current, attr, catalog)?;
        }
        Ok(current)
    }

    /// Bind `for name in parent.collection` inside `scope`.
    ///
    /// When the parent lives in the same scope the collection is joined
    /// there, which fans out the parent's rows. When the parent belongs to an
    /// enclosing scope the collection becomes the sub-query's own table,
    /// correlated to the parent through a WHERE condition.
    pub fn iterate_collection(
        &mut self,
        scope: ScopeId,
        name: &str,
        parent: TableId,
        attr: &AttributeDef,
        catalog: &dyn Catalog,
    ) -> CompileResult<TableId> {
        let target = relationship_target(attr)?;
        let parent_scope = self.table(parent).scope;
        if parent_scope == scope {
            let id = self.push_table(TableRef {
                entity: target,
                table: catalog.entity_table_name(target),
                scope,
                origin: Origin::Joined {
                    parent,
                    attr: attr.name.clone(),
                },
                alias: None,
                nullable: false,
                used_attrs: BTreeSet::new(),
                base_name: name.to_string(),
            });
            self.tables[parent.0].used_attrs.insert(attr.name.clone());
            self.bind_name(scope, name, id);
            self.make_join(id, catalog)?;
            self.scope_mut(scope).fans_out = true;
            Ok(id)
        } else {
            let id = self.add_root_tableref(scope, name, target, catalog);
            let child_alias = self.make_join(id, catalog)?;
            let parent_keys = self.key_columns(parent, catalog)?;
            let reverse = reverse_columns(attr, target, catalog)?;
            let condition = pair_columns(&child_alias, &reverse, parent_keys)?;
            self.scope_mut(scope).conditions.push(condition);
            Ok(id)
        }
    }

    /// Emit the FROM item or JOIN edge for `id` if not done yet and return
    /// its alias.
    pub fn make_join(&mut self, id: TableId, catalog: &dyn Catalog) -> CompileResult<String> {
        if let Some(alias) = &self.table(id).alias {
            return Ok(alias.clone());
        }
        let table = self.table(id).clone();
        let item = match &table.origin {
            Origin::Root => {
                let alias = self.aliases.allocate(&table.base_name);
                self.tables[id.0].alias = Some(alias);
                FromItem::Table(id)
            }
            Origin::Joined { parent, attr } => {
                let parent_alias = self.make_join(*parent, catalog)?;
                let parent_entity = self.table(*parent).entity;
                let attr = catalog.attribute(parent_entity, attr).ok_or_else(|| {
                    CompileError::malformed(format!("relationship {attr} vanished from catalog"))
                })?;
                let alias = self.aliases.allocate(&table.base_name);
                let on = if attr.owns_fk {
                    // parent.fk = target.pk
                    let target_pk = catalog.entity_primary_key_columns(table.entity);
                    let left = attr
                        .column_names
                        .iter()
                        .map(|c| table_col(&parent_alias, c))
                        .collect();
                    pair_columns(&alias, &target_pk, left)?
                } else {
                    // parent.pk = target.reverse_fk
                    let parent_pk = catalog.entity_primary_key_columns(parent_entity);
                    let reverse = reverse_columns(attr, table.entity, catalog)?;
                    let left = parent_pk.iter().map(|c| table_col(&parent_alias, c)).collect();
                    pair_columns(&alias, &reverse, left)?
                };
                let join_type = if table.nullable {
                    JoinType::Left
                } else {
                    JoinType::Inner
                };
                debug!(table = %table.table, alias = %alias, ?join_type, "materialized join");
                self.tables[id.0].alias = Some(alias);
                FromItem::Join {
                    table: id,
                    join_type,
                    on,
                }
            }
        };
        self.scope_mut(table.scope).from.push(item);
        self.alias_of(id)
    }

    fn alias_of(&self, id: TableId) -> CompileResult<String> {
        self.table(id)
            .alias
            .clone()
            .ok_or_else(|| CompileError::malformed("table reference has no alias"))
    }

    /// Primary key columns of `id`, read from the parent's foreign key when
    /// that avoids a join.
    pub fn key_columns(&mut self, id: TableId, catalog: &dyn Catalog) -> CompileResult<Vec<Expr>> {
        let table = self.table(id).clone();
        if let (Origin::Joined { parent, attr }, false) = (&table.origin, table.is_joined()) {
            let parent_entity = self.table(*parent).entity;
            if let Some(attr) = catalog.attribute(parent_entity, attr) {
                if attr.owns_fk {
                    let parent_alias = self.make_join(*parent, catalog)?;
                    return Ok(attr
                        .column_names
                        .iter()
                        .map(|c| table_col(&parent_alias, c))
                        .collect());
                }
            }
        }
        let alias = self.make_join(id, catalog)?;
        Ok(catalog
            .entity_primary_key_columns(table.entity)
            .iter()
            .map(|c| table_col(&alias, c))
            .collect())
    }

    /// Columns backing `attr` on `id`.
    pub fn attribute_columns(
        &mut self,
        id: TableId,
        attr: &AttributeDef,
        catalog: &dyn Catalog,
    ) -> CompileResult<Vec<Expr>> {
        self.tables[id.0].used_attrs.insert(attr.name.clone());
        let entity = self.table(id).entity;
        if attr.primary_key && !self.table(id).is_joined() {
            // A key attribute is also readable from the parent's foreign key.
            let pk = catalog.entity_primary_key_columns(entity);
            if let Some(start) = pk.iter().position(|c| Some(c) == attr.column_names.first()) {
                let keys = self.key_columns(id, catalog)?;
                if keys.len() == pk.len() && start + attr.column_names.len() <= keys.len() {
                    return Ok(keys[start..start + attr.column_names.len()].to_vec());
                }
            }
        }
        let alias = self.make_join(id, catalog)?;
        Ok(attr
            .column_names
            .iter()
            .map(|c| table_col(&alias, c))
            .collect())
    }
}

fn relationship_target(attr: &AttributeDef) -> CompileResult<EntityId> {
    attr.relationship_target
        .ok_or_else(|| CompileError::type_mismatch(format!("{} is not a relationship", attr.name)))
}

/// Foreign key columns on `target` that point back through `attr`.
fn reverse_columns(
    attr: &AttributeDef,
    target: EntityId,
    catalog: &dyn Catalog,
) -> CompileResult<Vec<String>> {
    let reverse = attr
        .reverse
        .as_deref()
        .and_then(|name| catalog.attribute(target, name))
        .ok_or_else(|| {
            CompileError::malformed(format!("{} has no reverse reference", attr.name))
        })?;
    Ok(reverse.column_names.clone())
}

/// `alias.columns[i] = left[i]` for every i.
fn pair_columns(alias: &str, columns: &[String], left: Vec<Expr>) -> CompileResult<Expr> {
    if columns.len() != left.len() || columns.is_empty() {
        return Err(CompileError::malformed(format!(
            "join of {} key columns against {}",
            left.len(),
            columns.len()
        )));
    }
    Ok(and_all(
        left.into_iter()
            .zip(columns)
            .map(|(l, c)| l.eq(table_col(alias, c))),
    ))
}
