//! Mapped types.
//!
//! A mapped type implements [`Model`]: it names its table and describes its
//! fields once through a [`ModelBuilder`]. The resulting [`ModelDescriptor`]
//! carries typed accessors for every field, so the rest of the crate can read
//! and write fields of any model through the object-safe [`Entity`] trait
//! without runtime reflection.
//!
//! ```
//! use lifeline::{Model, ModelBuilder};
//!
//! #[derive(Clone, Debug, Default)]
//! struct User {
//!     id: i64,
//!     username: String,
//! }
//!
//! impl Model for User {
//!     fn table_name() -> &'static str {
//!         "users"
//!     }
//!
//!     fn describe(model: &mut ModelBuilder<Self>) {
//!         model
//!             .column("id", r#"ll:"pk""#, |u| &u.id, |u| &mut u.id)
//!             .column("username", "", |u| &u.username, |u| &mut u.username);
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

pub mod accessor;
pub mod descriptor;

pub use accessor::{
    get_by_index_path, get_field, index_path, push_field, set_by_index_path, set_field,
    FieldValue, SetMode,
};
pub use descriptor::{FieldDescriptor, FieldShape, ModelBuilder, ModelDescriptor, TargetRef};

/// A struct mapped to a table.
pub trait Model: Clone + Default + fmt::Debug + Send + Sync + 'static {
    fn table_name() -> &'static str;

    /// Declare the fields of the model, in order.
    fn describe(model: &mut ModelBuilder<Self>);
}

/// Object-safe view of any [`Model`].
pub trait Entity: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn clone_entity(&self) -> Box<dyn Entity>;
    fn descriptor(&self) -> Arc<ModelDescriptor>;
    fn model_name(&self) -> &'static str;
}

impl<M: Model> Entity for M {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_entity(&self) -> Box<dyn Entity> {
        Box::new(self.clone())
    }

    fn descriptor(&self) -> Arc<ModelDescriptor> {
        descriptor_of::<M>()
    }

    fn model_name(&self) -> &'static str {
        short_type_name::<M>()
    }
}

impl Clone for Box<dyn Entity> {
    fn clone(&self) -> Self {
        self.clone_entity()
    }
}

static DESCRIPTORS: Lazy<RwLock<HashMap<TypeId, Arc<ModelDescriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The descriptor of `M`, built on first use.
///
/// Descriptors only depend on the static `describe` table, so they are
/// memoized per process. Schemas, which depend on configuration, live in a
/// [`Registry`](crate::schema::Registry) instead.
pub fn descriptor_of<M: Model>() -> Arc<ModelDescriptor> {
    let type_id = TypeId::of::<M>();
    if let Some(descriptor) = DESCRIPTORS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&type_id)
    {
        return Arc::clone(descriptor);
    }

    let built = Arc::new(ModelDescriptor::build::<M>());
    let mut descriptors = DESCRIPTORS.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(descriptors.entry(type_id).or_insert(built))
}

/// Last path segment of a type name (`app::models::User` → `User`).
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(i) => &full[i + 2..],
        None => full,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::value::Nullable;

    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct Profile {
        pub id: i64,
        pub account_id: i64,
        pub bio: String,
    }

    impl Model for Profile {
        fn table_name() -> &'static str {
            "profiles"
        }

        fn describe(model: &mut ModelBuilder<Self>) {
            model
                .column("id", "", |p| &p.id, |p| &mut p.id)
                .column(
                    "account_id",
                    r#"ll:"fk:accounts""#,
                    |p| &p.account_id,
                    |p| &mut p.account_id,
                )
                .column("bio", "", |p| &p.bio, |p| &mut p.bio);
        }
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct Account {
        pub id: i64,
        pub name: String,
        pub nickname: Option<String>,
        pub manager_id: Nullable<i64>,
        pub profile: Option<Profile>,
        pub mentor: Option<Box<Account>>,
        pub reports: Vec<Account>,
        pub scratch: String,
    }

    impl Model for Account {
        fn table_name() -> &'static str {
            "accounts"
        }

        fn describe(model: &mut ModelBuilder<Self>) {
            model
                .column("id", r#"ll:"pk""#, |a| &a.id, |a| &mut a.id)
                .column("name", "", |a| &a.name, |a| &mut a.name)
                .column("nickname", "", |a| &a.nickname, |a| &mut a.nickname)
                .column(
                    "manager_id",
                    r#"ll:"fk:accounts""#,
                    |a| &a.manager_id,
                    |a| &mut a.manager_id,
                )
                .one("profile", "", |a| &a.profile, |a| &mut a.profile)
                .one_boxed("mentor", r#"ll:"relation:manager_id""#, |a| &a.mentor, |a| &mut a.mentor)
                .many("reports", "", |a| &a.reports, |a| &mut a.reports)
                .column("scratch", r#"db:"-""#, |a| &a.scratch, |a| &mut a.scratch);
        }
    }
}
