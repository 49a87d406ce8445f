//! Read-only schema catalog consumed by the translator.
//!
//! The compiler never owns schema knowledge itself: table names, attribute to
//! column mappings and relationships come through the [`Catalog`] trait.
//! [`SchemaCatalog`] is an in-memory implementation assembled with
//! [`SchemaCatalogBuilder`] or loaded from a serialized [`CatalogSpec`].
//!
//! ```ignore
//! let catalog = SchemaCatalog::builder()
//!     .entity("Person", "person", |e| {
//!         e.key("id", ValueType::INT)
//!             .column("name", ValueType::Text)
//!             .reference("city", "City", &["city_id"])
//!             .collection("cars", "Car", "owner")
//!     })
//!     .entity("City", "city", |e| e.key("id", ValueType::INT).column("name", ValueType::Text))
//!     .entity("Car", "car", |e| {
//!         e.key("id", ValueType::INT).reference("owner", "Person", &["owner_id"])
//!     })
//!     .build()?;
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::ValueType;

/// Opaque entity handle issued by a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// One attribute of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDef {
    pub name: String,
    /// Columns backing this attribute on the entity's own table. Empty when
    /// the relationship is held by the other side.
    pub column_names: Vec<String>,
    /// Scalar type, `Entity(target)` for references, `SetOf(Entity(target))`
    /// for collections.
    pub value_type: ValueType,
    pub relationship_target: Option<EntityId>,
    /// Whether the foreign key columns live on this entity's table.
    pub owns_fk: bool,
    pub nullable: bool,
    pub primary_key: bool,
    /// Name of the attribute on the target entity that mirrors this one.
    pub reverse: Option<String>,
}

impl AttributeDef {
    pub fn is_relationship(&self) -> bool {
        self.relationship_target.is_some()
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.value_type, ValueType::SetOf(_))
    }
}

/// Schema lookup service.
pub trait Catalog: Send + Sync {
    fn entity_by_name(&self, name: &str) -> Option<EntityId>;

    fn entity_name(&self, id: EntityId) -> &str;

    fn entity_table_name(&self, id: EntityId) -> String;

    fn entity_attributes(&self, id: EntityId) -> &[AttributeDef];

    fn entity_primary_key_columns(&self, id: EntityId) -> Vec<String> {
        self.entity_attributes(id)
            .iter()
            .filter(|a| a.primary_key)
            .flat_map(|a| a.column_names.iter().cloned())
            .collect()
    }

    fn attribute(&self, id: EntityId, name: &str) -> Option<&AttributeDef> {
        self.entity_attributes(id).iter().find(|a| a.name == name)
    }
}

// =============================================================================
// In-memory catalog
// =============================================================================

#[derive(Debug, Clone)]
struct EntityDef {
    name: String,
    table: String,
    attributes: Vec<AttributeDef>,
}

/// In-memory [`Catalog`].
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    entities: Vec<EntityDef>,
    by_name: HashMap<String, EntityId>,
}

impl SchemaCatalog {
    pub fn builder() -> SchemaCatalogBuilder {
        SchemaCatalogBuilder::default()
    }

    /// Build a catalog from its serialized description.
    pub fn from_spec(spec: &CatalogSpec) -> Result<Self, CatalogError> {
        let mut builder = SchemaCatalog::builder();
        for entity in &spec.entities {
            let mut draft = EntityDraft::new(&entity.name, &entity.table);
            for attr in &entity.attributes {
                draft = draft.push_spec(attr)?;
            }
            builder.entities.push(draft);
        }
        builder.build()
    }

    fn get(&self, id: EntityId) -> Option<&EntityDef> {
        self.entities.get(id.0 as usize)
    }
}

impl Catalog for SchemaCatalog {
    fn entity_by_name(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    fn entity_name(&self, id: EntityId) -> &str {
        self.get(id).map(|e| e.name.as_str()).unwrap_or("<unknown>")
    }

    fn entity_table_name(&self, id: EntityId) -> String {
        self.get(id).map(|e| e.table.clone()).unwrap_or_default()
    }

    fn entity_attributes(&self, id: EntityId) -> &[AttributeDef] {
        self.get(id).map(|e| e.attributes.as_slice()).unwrap_or(&[])
    }
}

/// Errors raised while assembling a catalog.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("Entity defined twice: {0}")]
    DuplicateEntity(String),

    #[error("{entity}.{attribute} refers to unknown entity {target}")]
    UnknownEntity {
        entity: String,
        attribute: String,
        target: String,
    },

    #[error("{entity}.{attribute}: reverse attribute {reverse} is not a reference back to {entity}")]
    BadReverse {
        entity: String,
        attribute: String,
        reverse: String,
    },

    #[error("Entity {0} has no primary key")]
    NoPrimaryKey(String),

    #[error("{entity}.{attribute}: {message}")]
    InvalidAttribute {
        entity: String,
        attribute: String,
        message: String,
    },
}

// =============================================================================
// Builder
// =============================================================================

#[derive(Debug, Clone)]
enum DraftKind {
    Scalar(ValueType),
    Reference { target: String },
    Collection { target: String, reverse: String },
    InverseReference { target: String, reverse: String },
}

#[derive(Debug, Clone)]
struct AttrDraft {
    name: String,
    columns: Vec<String>,
    kind: DraftKind,
    key: bool,
    nullable: bool,
}

/// Attribute collector for one entity.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until used"]
pub struct EntityDraft {
    name: String,
    table: String,
    attrs: Vec<AttrDraft>,
}

impl EntityDraft {
    fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            attrs: Vec::new(),
        }
    }

    fn push(mut self, name: &str, columns: Vec<String>, kind: DraftKind, key: bool, nullable: bool) -> Self {
        self.attrs.push(AttrDraft {
            name: name.into(),
            columns,
            kind,
            key,
            nullable,
        });
        self
    }

    /// Primary key column.
    pub fn key(self, name: &str, value_type: ValueType) -> Self {
        self.push(name, vec![name.into()], DraftKind::Scalar(value_type), true, false)
    }

    /// Required scalar column named after the attribute.
    pub fn column(self, name: &str, value_type: ValueType) -> Self {
        self.push(name, vec![name.into()], DraftKind::Scalar(value_type), false, false)
    }

    /// Nullable scalar column.
    pub fn optional(self, name: &str, value_type: ValueType) -> Self {
        self.push(name, vec![name.into()], DraftKind::Scalar(value_type), false, true)
    }

    /// Scalar attribute stored under a different column name.
    pub fn mapped(self, name: &str, column: &str, value_type: ValueType) -> Self {
        self.push(name, vec![column.into()], DraftKind::Scalar(value_type), false, false)
    }

    /// Required many-to-one reference holding the foreign key columns.
    pub fn reference(self, name: &str, target: &str, columns: &[&str]) -> Self {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.push(
            name,
            columns,
            DraftKind::Reference {
                target: target.into(),
            },
            false,
            false,
        )
    }

    /// Nullable many-to-one reference.
    pub fn optional_reference(self, name: &str, target: &str, columns: &[&str]) -> Self {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.push(
            name,
            columns,
            DraftKind::Reference {
                target: target.into(),
            },
            false,
            true,
        )
    }

    /// Reference that is part of the primary key (composite keys).
    pub fn key_reference(self, name: &str, target: &str, columns: &[&str]) -> Self {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.push(
            name,
            columns,
            DraftKind::Reference {
                target: target.into(),
            },
            true,
            false,
        )
    }

    /// One-to-many side; `reverse` names the reference on the target.
    pub fn collection(self, name: &str, target: &str, reverse: &str) -> Self {
        self.push(
            name,
            Vec::new(),
            DraftKind::Collection {
                target: target.into(),
                reverse: reverse.into(),
            },
            false,
            false,
        )
    }

    /// One-to-one side whose foreign key lives on the target table.
    pub fn inverse_reference(self, name: &str, target: &str, reverse: &str) -> Self {
        self.push(
            name,
            Vec::new(),
            DraftKind::InverseReference {
                target: target.into(),
                reverse: reverse.into(),
            },
            false,
            true,
        )
    }

    fn push_spec(self, spec: &AttributeSpec) -> Result<Self, CatalogError> {
        let invalid = |message: &str| CatalogError::InvalidAttribute {
            entity: self.name.clone(),
            attribute: spec.name.clone(),
            message: message.into(),
        };
        let columns = spec.columns.clone().unwrap_or_else(|| vec![spec.name.clone()]);
        let kind = match (&spec.value_type, &spec.references, &spec.collection_of) {
            (Some(t), None, None) => DraftKind::Scalar(t.to_value_type()),
            (None, Some(target), None) => match &spec.reverse {
                Some(reverse) if spec.columns.is_none() => DraftKind::InverseReference {
                    target: target.clone(),
                    reverse: reverse.clone(),
                },
                _ => DraftKind::Reference {
                    target: target.clone(),
                },
            },
            (None, None, Some(target)) => DraftKind::Collection {
                target: target.clone(),
                reverse: spec
                    .reverse
                    .clone()
                    .ok_or_else(|| invalid("collection needs a reverse attribute"))?,
            },
            _ => {
                return Err(invalid(
                    "exactly one of type, references, collection_of is required",
                ))
            }
        };
        let columns = match kind {
            DraftKind::Collection { .. } | DraftKind::InverseReference { .. } => Vec::new(),
            _ => columns,
        };
        let (name, key, nullable) = (spec.name.clone(), spec.key, spec.nullable);
        Ok(self.push(&name, columns, kind, key, nullable))
    }
}

/// Collects entity drafts and resolves cross references on [`build`](Self::build).
#[derive(Debug, Clone, Default)]
#[must_use = "builders have no effect until build() is called"]
pub struct SchemaCatalogBuilder {
    entities: Vec<EntityDraft>,
}

impl SchemaCatalogBuilder {
    pub fn entity(mut self, name: &str, table: &str, f: impl FnOnce(EntityDraft) -> EntityDraft) -> Self {
        self.entities.push(f(EntityDraft::new(name, table)));
        self
    }

    pub fn build(self) -> Result<SchemaCatalog, CatalogError> {
        let mut by_name = HashMap::new();
        for (i, draft) in self.entities.iter().enumerate() {
            if by_name.insert(draft.name.clone(), EntityId(i as u32)).is_some() {
                return Err(CatalogError::DuplicateEntity(draft.name.clone()));
            }
        }

        let resolve = |entity: &str, attribute: &str, target: &str| {
            by_name
                .get(target)
                .copied()
                .ok_or_else(|| CatalogError::UnknownEntity {
                    entity: entity.into(),
                    attribute: attribute.into(),
                    target: target.into(),
                })
        };

        let mut entities = Vec::with_capacity(self.entities.len());
        for draft in &self.entities {
            let mut attributes = Vec::with_capacity(draft.attrs.len());
            for attr in &draft.attrs {
                let def = match &attr.kind {
                    DraftKind::Scalar(t) => AttributeDef {
                        name: attr.name.clone(),
                        column_names: attr.columns.clone(),
                        value_type: t.clone(),
                        relationship_target: None,
                        owns_fk: false,
                        nullable: attr.nullable,
                        primary_key: attr.key,
                        reverse: None,
                    },
                    DraftKind::Reference { target } => {
                        let id = resolve(&draft.name, &attr.name, target)?;
                        let reverse = self.entities[id.0 as usize]
                            .attrs
                            .iter()
                            .find(|a| match &a.kind {
                                DraftKind::Collection { target: t, reverse }
                                | DraftKind::InverseReference { target: t, reverse } => {
                                    *t == draft.name && *reverse == attr.name
                                }
                                _ => false,
                            })
                            .map(|a| a.name.clone());
                        AttributeDef {
                            name: attr.name.clone(),
                            column_names: attr.columns.clone(),
                            value_type: ValueType::Entity(id),
                            relationship_target: Some(id),
                            owns_fk: true,
                            nullable: attr.nullable,
                            primary_key: attr.key,
                            reverse,
                        }
                    }
                    DraftKind::Collection { target, reverse }
                    | DraftKind::InverseReference { target, reverse } => {
                        let id = resolve(&draft.name, &attr.name, target)?;
                        let mirrors = self.entities[id.0 as usize].attrs.iter().any(|a| {
                            a.name == *reverse
                                && matches!(&a.kind, DraftKind::Reference { target } if *target == draft.name)
                        });
                        if !mirrors {
                            return Err(CatalogError::BadReverse {
                                entity: draft.name.clone(),
                                attribute: attr.name.clone(),
                                reverse: reverse.clone(),
                            });
                        }
                        let value_type = match attr.kind {
                            DraftKind::Collection { .. } => ValueType::set_of(ValueType::Entity(id)),
                            _ => ValueType::Entity(id),
                        };
                        AttributeDef {
                            name: attr.name.clone(),
                            column_names: Vec::new(),
                            value_type,
                            relationship_target: Some(id),
                            owns_fk: false,
                            nullable: attr.nullable,
                            primary_key: false,
                            reverse: Some(reverse.clone()),
                        }
                    }
                };
                attributes.push(def);
            }
            if !attributes.iter().any(|a| a.primary_key) {
                return Err(CatalogError::NoPrimaryKey(draft.name.clone()));
            }
            entities.push(EntityDef {
                name: draft.name.clone(),
                table: draft.table.clone(),
                attributes,
            });
        }

        Ok(SchemaCatalog { entities, by_name })
    }
}

// =============================================================================
// Serialized form
// =============================================================================

/// Serialized catalog, as loaded by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSpec {
    pub entities: Vec<EntitySpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,
    pub table: String,
    pub attributes: Vec<AttributeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub value_type: Option<ScalarType>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub references: Option<String>,
    #[serde(default)]
    pub collection_of: Option<String>,
    #[serde(default)]
    pub reverse: Option<String>,
}

/// Scalar type names accepted in a serialized catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Bool,
    Int,
    Float,
    Decimal,
    Text,
    Date,
    Time,
    Datetime,
    Interval,
    Bytes,
}

impl ScalarType {
    pub fn to_value_type(self) -> ValueType {
        match self {
            ScalarType::Bool => ValueType::BOOL,
            ScalarType::Int => ValueType::INT,
            ScalarType::Float => ValueType::FLOAT,
            ScalarType::Decimal => ValueType::DECIMAL,
            ScalarType::Text => ValueType::Text,
            ScalarType::Date => ValueType::Date,
            ScalarType::Time => ValueType::Time,
            ScalarType::Datetime => ValueType::DateTime,
            ScalarType::Interval => ValueType::Interval,
            ScalarType::Bytes => ValueType::Bytes,
        }
    }
}
