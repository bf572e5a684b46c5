//! Relations between mapped models.
//!
//! Kinds are inferred when a schema is built, from which side declares the
//! foreign key:
//! - many-to-one: the owner has `fk:<target table>` (a `One` field)
//! - one-to-one: the target has `fk:<owner table>` (a `One` field)
//! - one-to-many: the target has `fk:<owner table>` (a `Many` field)
//! - many-to-many: a join model has foreign keys to both (a `Many` field declared
//!   with `many_through`)
//!
//! A `relation:<field or column>` tag picks the foreign key when several match.

pub mod def;
pub(crate) mod resolve;

#[doc(inline)]
pub use def::{KeyRef, Relation, RelationKind, Through};
pub(crate) use resolve::resolve;
