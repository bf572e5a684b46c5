use crate::tags::Tags;
use crate::value::ColumnKind;

/// Column metadata for one model field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub(crate) model_name: &'static str,
    pub(crate) table_name: &'static str,
    pub(crate) name: &'static str,
    pub(crate) index: usize,
    pub(crate) column_name: String,
    pub(crate) kind: ColumnKind,
    pub(crate) nullable: bool,
    pub(crate) tags: Tags,
    pub(crate) primary_key: bool,
    pub(crate) foreign_key: Option<String>,
    pub(crate) excluded: bool,
    pub(crate) default: Option<String>,
    pub(crate) has_default: bool,
    pub(crate) created_key: bool,
    pub(crate) updated_key: bool,
    pub(crate) deleted_key: bool,
}

impl Field {
    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    /// Field name as declared on the model.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Position in the model's descriptor table.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// `table.column`
    pub fn column_path(&self) -> String {
        format!("{}.{}", self.table_name, self.column_name)
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key.is_some()
    }

    /// Referenced table or model of a foreign key.
    pub fn foreign_key(&self) -> Option<&str> {
        self.foreign_key.as_deref()
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    /// Server-side default expression, when one is spelled out.
    pub fn default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// True for `default` tags (with or without an expression) and timestamp keys.
    pub fn has_default(&self) -> bool {
        self.has_default
    }

    pub fn is_created_key(&self) -> bool {
        self.created_key
    }

    pub fn is_updated_key(&self) -> bool {
        self.updated_key
    }

    pub fn is_deleted_key(&self) -> bool {
        self.deleted_key
    }
}
