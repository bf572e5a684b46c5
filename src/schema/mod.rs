//! Table metadata derived from model descriptors.
//!
//! A [`Schema`] is built once per model type by a [`Registry`] and shared as
//! `Arc<Schema>`. It records the table name, the primary key, every mapped
//! column in declaration order, the foreign keys and the relations inferred
//! from association fields.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub(crate) mod builder;
pub mod field;
pub mod keys;
pub mod registry;

pub use field::Field;
pub use keys::{ForeignKey, KeyStrategy, KeyType, PrimaryKey};
pub use registry::Registry;

use crate::model::ModelDescriptor;
use crate::relation::Relation;
use builder::{ColumnSet, Keys};

#[derive(Clone)]
pub struct Schema {
    descriptor: Arc<ModelDescriptor>,
    model_name: &'static str,
    table_name: &'static str,
    primary_key: PrimaryKey,
    fields: Vec<Field>,
    positions: HashMap<&'static str, usize>,
    foreign_keys: Vec<ForeignKey>,
    relations: HashMap<&'static str, Relation>,
    relation_order: Vec<&'static str>,
}

impl Schema {
    pub(crate) fn new(
        descriptor: Arc<ModelDescriptor>,
        columns: ColumnSet,
        relations: HashMap<&'static str, Relation>,
    ) -> Self {
        let positions = columns
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name, i))
            .collect();
        let relation_order = columns
            .associations
            .iter()
            .map(|a| a.name)
            .filter(|name| relations.contains_key(name))
            .collect();

        Self {
            descriptor,
            model_name: columns.model_name,
            table_name: columns.table_name,
            primary_key: columns.primary_key,
            fields: columns.fields,
            positions,
            foreign_keys: columns.foreign_keys,
            relations,
            relation_order,
        }
    }

    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.descriptor
    }

    pub fn type_id(&self) -> TypeId {
        self.descriptor.type_id()
    }

    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    pub fn primary_key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    /// Column fields in declaration order, excluded ones included.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.positions.get(name).map(|&i| &self.fields[i])
    }

    /// The mapped field stored in `column`, which may be qualified with this
    /// schema's table (`users.id`).
    pub fn field_by_column(&self, column: &str) -> Option<&Field> {
        let column = match column.split_once('.') {
            Some((table, bare)) if table == self.table_name => bare,
            Some(_) => return None,
            None => column,
        };
        self.fields
            .iter()
            .find(|f| !f.excluded && f.column_name == column)
    }

    /// Mapped column names in declaration order.
    pub fn columns(&self) -> Vec<&str> {
        self.mapped().map(|f| f.column_name()).collect()
    }

    /// Mapped columns qualified with the table name.
    pub fn column_paths(&self) -> Vec<String> {
        self.mapped().map(Field::column_path).collect()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.field_by_column(column).is_some()
    }

    fn mapped(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.excluded)
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name() == name)
    }

    /// Relations in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relation_order
            .iter()
            .filter_map(|name| self.relations.get(name))
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn created_key(&self) -> Option<&Field> {
        self.mapped().find(|f| f.created_key)
    }

    pub fn updated_key(&self) -> Option<&Field> {
        self.mapped().find(|f| f.updated_key)
    }

    /// Soft-delete column; rows with a non-null value are treated as deleted.
    pub fn deleted_key(&self) -> Option<&Field> {
        self.mapped().find(|f| f.deleted_key)
    }

    pub(crate) fn keys(&self) -> Keys<'_> {
        Keys {
            model_name: self.model_name,
            table_name: self.table_name,
            primary_key: &self.primary_key,
            foreign_keys: &self.foreign_keys,
        }
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
            && self.table_name == other.table_name
            && self.primary_key == other.primary_key
            && self.fields == other.fields
            && self.foreign_keys == other.foreign_keys
            && self.relations == other.relations
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("model", &self.model_name)
            .field("table", &self.table_name)
            .field("primary_key", &self.primary_key.column_name())
            .field("columns", &self.columns())
            .field("relations", &self.relation_order)
            .finish()
    }
}
