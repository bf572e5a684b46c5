//! Value layer
//!
//! - **`ColumnType`** - Maps Rust column types to `sea_query::Value` and back, with coercion
//! - **`Nullable`** - Validity-flagged wrapper for nullable columns
//! - **`KeyValue`** - Hashable, width-agnostic key used to match owners with fetched rows

pub mod key;
pub mod nullable;
pub mod types;

pub use key::KeyValue;
pub use nullable::Nullable;
pub use types::{is_null, is_zero_value, value_type_name, ColumnKind, ColumnType, ScanError};
