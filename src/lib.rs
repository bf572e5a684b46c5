//! # Lifeline
//!
//! Schema metadata and batched relation preloading for plain Rust structs.
//!
//! Models describe their fields once through [`Model::describe`]. A
//! [`Registry`] turns those descriptors into [`Schema`]s (table, primary key,
//! foreign keys, inferred relations) and a [`Preloader`] uses them to load
//! related records for a whole batch of models with one query per relation
//! per level, through any [`Executor`].
//!
//! See `DESIGN.md` in the repository for the architecture.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod model;
pub mod preload;
pub mod relation;
pub mod schema;
pub mod tags;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod value;
pub mod walker;

pub use config::{Dialect, LifelineConfig};
pub use context::Context;
pub use error::{Error, Result};
pub use executor::{ExecError, Executor, Row};
pub use model::{
    descriptor_of, get_by_index_path, get_field, index_path, push_field, set_by_index_path,
    set_field, Entity, FieldShape, FieldValue, Model, ModelBuilder, ModelDescriptor, TargetRef,
};
pub use preload::{preload, Preload, Preloader};
pub use relation::{Relation, RelationKind};
pub use schema::{Field, ForeignKey, KeyStrategy, KeyType, PrimaryKey, Registry, Schema};
pub use tags::{AnalyzerOptions, Tag, TagProperty, Tags};
pub use value::{ColumnKind, ColumnType, KeyValue, Nullable};
pub use walker::{EntitySet, Walker};
