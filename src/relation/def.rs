//! Relation definitions between two schemas.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::model::TargetRef;
use crate::schema::{ForeignKey, KeyType, PrimaryKey, Registry, Schema};

/// Type of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// The target holds a foreign key to the owner; at most one target per owner
    OneToOne,
    /// The target holds a foreign key to the owner; any number of targets per owner
    OneToMany,
    /// The owner holds a foreign key to the target (belongs to)
    ManyToOne,
    /// Owner and target are linked through rows of a join table
    ManyToMany,
}

impl RelationKind {
    pub fn is_to_one(self) -> bool {
        matches!(self, RelationKind::OneToOne | RelationKind::ManyToOne)
    }

    pub fn is_to_many(self) -> bool {
        !self.is_to_one()
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationKind::OneToOne => "one-to-one",
            RelationKind::OneToMany => "one-to-many",
            RelationKind::ManyToOne => "many-to-one",
            RelationKind::ManyToMany => "many-to-many",
        })
    }
}

/// One side of a relation's key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRef {
    field: &'static str,
    column: String,
    key_type: KeyType,
    optional: bool,
}

impl KeyRef {
    /// Field name on the model that holds the key.
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

impl From<&PrimaryKey> for KeyRef {
    fn from(pk: &PrimaryKey) -> Self {
        Self {
            field: pk.name(),
            column: pk.column_name().to_string(),
            key_type: pk.key_type(),
            optional: false,
        }
    }
}

impl From<&ForeignKey> for KeyRef {
    fn from(fk: &ForeignKey) -> Self {
        Self {
            field: fk.name(),
            column: fk.column_name().to_string(),
            key_type: fk.key_type(),
            optional: fk.is_optional(),
        }
    }
}

/// Join table of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Through {
    pub(crate) model: TargetRef,
    pub(crate) table: &'static str,
    pub(crate) owner_column: String,
    pub(crate) target_column: String,
}

impl Through {
    pub fn model(&self) -> &TargetRef {
        &self.model
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Join column referencing the owner's primary key.
    pub fn owner_column(&self) -> &str {
        &self.owner_column
    }

    /// Join column referencing the target's primary key.
    pub fn target_column(&self) -> &str {
        &self.target_column
    }
}

/// An association from an owner schema to a target model.
///
/// `source` is read from owners and `reference` from fetched targets; two
/// records are related when both hold the same key. For many-to-many
/// relations the pair is matched through the join table instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub(crate) name: &'static str,
    pub(crate) field_index: usize,
    pub(crate) kind: RelationKind,
    pub(crate) owner_model: &'static str,
    pub(crate) owner_table: &'static str,
    pub(crate) source: KeyRef,
    pub(crate) reference: KeyRef,
    pub(crate) target: TargetRef,
    pub(crate) through: Option<Through>,
}

impl Relation {
    /// Name of the association field on the owner.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn field_index(&self) -> usize {
        self.field_index
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn owner_model(&self) -> &'static str {
        self.owner_model
    }

    pub fn owner_table(&self) -> &'static str {
        self.owner_table
    }

    pub fn source(&self) -> &KeyRef {
        &self.source
    }

    pub fn reference(&self) -> &KeyRef {
        &self.reference
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    pub fn through(&self) -> Option<&Through> {
        self.through.as_ref()
    }

    /// The target schema, built and cached on first use.
    pub fn target_schema(&self, registry: &Registry) -> Result<Arc<Schema>> {
        registry.schema_for(self.target.descriptor())
    }
}
