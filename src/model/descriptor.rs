//! Static field-descriptor tables.

use std::any::{type_name, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::accessor::{AccessError, FieldValue, SetMode};
use super::{descriptor_of, short_type_name, Entity, Model};
use crate::value::{ColumnKind, ColumnType};

pub(crate) type GetFn = Arc<dyn Fn(&dyn Entity) -> Option<FieldValue> + Send + Sync>;
pub(crate) type SetFn =
    Arc<dyn Fn(&mut dyn Entity, FieldValue, SetMode) -> Result<(), AccessError> + Send + Sync>;
pub(crate) type ChildrenFn =
    Arc<dyn for<'a> Fn(&'a mut dyn Entity) -> Vec<&'a mut dyn Entity> + Send + Sync>;
pub(crate) type ChildrenRefFn =
    Arc<dyn for<'a> Fn(&'a dyn Entity) -> Vec<&'a dyn Entity> + Send + Sync>;
pub(crate) type EnsureFn =
    Arc<dyn for<'a> Fn(&'a mut dyn Entity) -> Option<&'a mut dyn Entity> + Send + Sync>;

// Pin closure signatures to the higher-ranked forms above.
fn children_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut dyn Entity) -> Vec<&'a mut dyn Entity> + Send + Sync,
{
    f
}

fn children_ref_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a dyn Entity) -> Vec<&'a dyn Entity> + Send + Sync,
{
    f
}

fn ensure_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut dyn Entity) -> Option<&'a mut dyn Entity> + Send + Sync,
{
    f
}

/// Reference to another mapped type, resolvable without building it.
#[derive(Clone, Copy)]
pub struct TargetRef {
    type_id: TypeId,
    model_name: &'static str,
    table_name: &'static str,
    descriptor: fn() -> Arc<ModelDescriptor>,
}

impl TargetRef {
    pub fn of<T: Model>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            model_name: short_type_name::<T>(),
            table_name: T::table_name(),
            descriptor: descriptor_of::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    pub fn descriptor(&self) -> Arc<ModelDescriptor> {
        (self.descriptor)()
    }
}

impl PartialEq for TargetRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TargetRef {}

impl fmt::Debug for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetRef")
            .field("model_name", &self.model_name)
            .field("table_name", &self.table_name)
            .finish()
    }
}

/// How a field holds its value; decided once when the model is described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Scalar(ColumnKind),
    OptionalScalar(ColumnKind),
    /// `Option<T>` or `Option<Box<T>>` of another model.
    One(TargetRef),
    /// `Vec<T>` of another model, optionally joined through a third one.
    Many {
        target: TargetRef,
        through: Option<TargetRef>,
    },
}

impl FieldShape {
    pub fn is_association(&self) -> bool {
        matches!(self, FieldShape::One(_) | FieldShape::Many { .. })
    }

    pub fn column_kind(&self) -> Option<ColumnKind> {
        match self {
            FieldShape::Scalar(kind) | FieldShape::OptionalScalar(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<&TargetRef> {
        match self {
            FieldShape::One(target) | FieldShape::Many { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// One declared field with its typed accessors.
pub struct FieldDescriptor {
    name: &'static str,
    tag: &'static str,
    shape: FieldShape,
    value_type: &'static str,
    pub(crate) get: GetFn,
    pub(crate) set: SetFn,
    children: Option<ChildrenFn>,
    children_ref: Option<ChildrenRefFn>,
    pub(crate) ensure: Option<EnsureFn>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Raw tag string as declared.
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn shape(&self) -> &FieldShape {
        &self.shape
    }

    /// Rust type name of the field.
    pub fn value_type(&self) -> &'static str {
        self.value_type
    }

    /// Records held by an association field; `None` for columns.
    pub(crate) fn children_mut<'a>(
        &self,
        owner: &'a mut dyn Entity,
    ) -> Option<Vec<&'a mut dyn Entity>> {
        self.children.as_ref().map(|children| children(owner))
    }

    pub(crate) fn children<'a>(&self, owner: &'a dyn Entity) -> Option<Vec<&'a dyn Entity>> {
        self.children_ref.as_ref().map(|children| children(owner))
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("shape", &self.shape)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// The ordered field table of a model.
pub struct ModelDescriptor {
    type_id: TypeId,
    model_name: &'static str,
    table_name: &'static str,
    primary_key: Option<&'static str>,
    fields: Vec<FieldDescriptor>,
    new: fn() -> Box<dyn Entity>,
}

fn new_entity<M: Model>() -> Box<dyn Entity> {
    Box::new(M::default())
}

impl ModelDescriptor {
    pub(crate) fn build<M: Model>() -> Self {
        let mut builder = ModelBuilder::<M>::new();
        M::describe(&mut builder);
        Self {
            type_id: TypeId::of::<M>(),
            model_name: short_type_name::<M>(),
            table_name: M::table_name(),
            primary_key: builder.primary_key,
            fields: builder.fields,
            new: new_entity::<M>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    /// Column overriding the configured implicit primary key, if declared.
    pub fn primary_key(&self) -> Option<&'static str> {
        self.primary_key
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field_at(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// A fresh `Default` instance of the model.
    pub fn new_entity(&self) -> Box<dyn Entity> {
        (self.new)()
    }
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("model_name", &self.model_name)
            .field("table_name", &self.table_name)
            .field("primary_key", &self.primary_key)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Collects the field table of `M` inside [`Model::describe`].
///
/// Every method takes the field name, its raw tag (possibly empty), and a pair
/// of accessor functions; plain non-capturing closures coerce to them.
pub struct ModelBuilder<M> {
    primary_key: Option<&'static str>,
    fields: Vec<FieldDescriptor>,
    _model: PhantomData<fn() -> M>,
}

fn downcast<T: Model>(entity: Box<dyn Entity>) -> Result<T, AccessError> {
    let actual = entity.model_name();
    entity
        .into_any()
        .downcast::<T>()
        .map(|t| *t)
        .map_err(|_| AccessError::Mismatch {
            expected: type_name::<T>(),
            actual: actual.to_string(),
        })
}

fn wrong_owner<M>() -> AccessError {
    AccessError::WrongOwner {
        expected: type_name::<M>(),
    }
}

impl<M: Model> ModelBuilder<M> {
    fn new() -> Self {
        Self {
            primary_key: None,
            fields: Vec::new(),
            _model: PhantomData,
        }
    }

    /// Use `column` as the implicit primary key instead of the configured default.
    pub fn primary_key(&mut self, column: &'static str) -> &mut Self {
        self.primary_key = Some(column);
        self
    }

    /// A plain column, nullable when `T` is `Option` or `Nullable`.
    pub fn column<T: ColumnType>(
        &mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&M) -> &T,
        get_mut: fn(&mut M) -> &mut T,
    ) -> &mut Self {
        let shape = if T::nullable() {
            FieldShape::OptionalScalar(T::kind())
        } else {
            FieldShape::Scalar(T::kind())
        };

        let getter: GetFn = Arc::new(move |owner: &dyn Entity| {
            owner
                .as_any()
                .downcast_ref::<M>()
                .map(|m| FieldValue::Column(get(m).to_value()))
        });
        let setter: SetFn = Arc::new(
            move |owner: &mut dyn Entity, value: FieldValue, _mode: SetMode| {
                let m = owner
                    .as_any_mut()
                    .downcast_mut::<M>()
                    .ok_or_else(wrong_owner::<M>)?;
                match value {
                    FieldValue::Column(value) => {
                        *get_mut(m) = T::scan(value).map_err(AccessError::Scan)?;
                        Ok(())
                    }
                    other => Err(AccessError::Mismatch {
                        expected: type_name::<T>(),
                        actual: other.describe(),
                    }),
                }
            },
        );

        self.fields.push(FieldDescriptor {
            name,
            tag,
            shape,
            value_type: type_name::<T>(),
            get: getter,
            set: setter,
            children: None,
            children_ref: None,
            ensure: None,
        });
        self
    }

    /// A single related record held as `Option<T>`.
    pub fn one<T: Model>(
        &mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&M) -> &Option<T>,
        get_mut: fn(&mut M) -> &mut Option<T>,
    ) -> &mut Self {
        self.reference::<T>(
            name,
            tag,
            type_name::<Option<T>>(),
            Arc::new(move |owner: &dyn Entity| {
                owner
                    .as_any()
                    .downcast_ref::<M>()
                    .map(|m| FieldValue::One(get(m).as_ref().map(|t| t.clone_entity())))
            }),
            Arc::new(move |owner: &mut dyn Entity, value: Option<T>| {
                let m = owner
                    .as_any_mut()
                    .downcast_mut::<M>()
                    .ok_or_else(wrong_owner::<M>)?;
                *get_mut(m) = value;
                Ok(())
            }),
            Arc::new(children_fn(move |owner| {
                match owner.as_any_mut().downcast_mut::<M>() {
                    Some(m) => get_mut(m)
                        .as_mut()
                        .map(|t| vec![t as &mut dyn Entity])
                        .unwrap_or_default(),
                    None => Vec::new(),
                }
            })),
            Arc::new(children_ref_fn(move |owner| {
                match owner.as_any().downcast_ref::<M>() {
                    Some(m) => get(m)
                        .as_ref()
                        .map(|t| vec![t as &dyn Entity])
                        .unwrap_or_default(),
                    None => Vec::new(),
                }
            })),
            Arc::new(ensure_fn(move |owner| {
                owner
                    .as_any_mut()
                    .downcast_mut::<M>()
                    .map(|m| get_mut(m).get_or_insert_with(T::default) as &mut dyn Entity)
            })),
        )
    }

    /// A single related record held as `Option<Box<T>>`, for self-referencing models.
    pub fn one_boxed<T: Model>(
        &mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&M) -> &Option<Box<T>>,
        get_mut: fn(&mut M) -> &mut Option<Box<T>>,
    ) -> &mut Self {
        self.reference::<T>(
            name,
            tag,
            type_name::<Option<Box<T>>>(),
            Arc::new(move |owner: &dyn Entity| {
                owner
                    .as_any()
                    .downcast_ref::<M>()
                    .map(|m| FieldValue::One(get(m).as_deref().map(|t| t.clone_entity())))
            }),
            Arc::new(move |owner: &mut dyn Entity, value: Option<T>| {
                let m = owner
                    .as_any_mut()
                    .downcast_mut::<M>()
                    .ok_or_else(wrong_owner::<M>)?;
                *get_mut(m) = value.map(Box::new);
                Ok(())
            }),
            Arc::new(children_fn(move |owner| {
                match owner.as_any_mut().downcast_mut::<M>() {
                    Some(m) => get_mut(m)
                        .as_deref_mut()
                        .map(|t| vec![t as &mut dyn Entity])
                        .unwrap_or_default(),
                    None => Vec::new(),
                }
            })),
            Arc::new(children_ref_fn(move |owner| {
                match owner.as_any().downcast_ref::<M>() {
                    Some(m) => get(m)
                        .as_deref()
                        .map(|t| vec![t as &dyn Entity])
                        .unwrap_or_default(),
                    None => Vec::new(),
                }
            })),
            Arc::new(ensure_fn(move |owner| {
                owner.as_any_mut().downcast_mut::<M>().map(|m| {
                    let slot = get_mut(m).get_or_insert_with(|| Box::new(T::default()));
                    &mut **slot as &mut dyn Entity
                })
            })),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn reference<T: Model>(
        &mut self,
        name: &'static str,
        tag: &'static str,
        value_type: &'static str,
        getter: GetFn,
        put: Arc<dyn Fn(&mut dyn Entity, Option<T>) -> Result<(), AccessError> + Send + Sync>,
        children: ChildrenFn,
        children_ref: ChildrenRefFn,
        ensure: EnsureFn,
    ) -> &mut Self {
        let setter: SetFn = Arc::new(
            move |owner: &mut dyn Entity, value: FieldValue, _mode: SetMode| match value {
                FieldValue::One(Some(entity)) => put(owner, Some(downcast::<T>(entity)?)),
                FieldValue::One(None) => put(owner, None),
                other => Err(AccessError::Mismatch {
                    expected: type_name::<T>(),
                    actual: other.describe(),
                }),
            },
        );

        self.fields.push(FieldDescriptor {
            name,
            tag,
            shape: FieldShape::One(TargetRef::of::<T>()),
            value_type,
            get: getter,
            set: setter,
            children: Some(children),
            children_ref: Some(children_ref),
            ensure: Some(ensure),
        });
        self
    }

    /// A collection of related records held as `Vec<T>`.
    pub fn many<T: Model>(
        &mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&M) -> &Vec<T>,
        get_mut: fn(&mut M) -> &mut Vec<T>,
    ) -> &mut Self {
        self.collection::<T>(name, tag, None, get, get_mut)
    }

    /// A collection of related records linked through the join model `J`.
    pub fn many_through<T: Model, J: Model>(
        &mut self,
        name: &'static str,
        tag: &'static str,
        get: fn(&M) -> &Vec<T>,
        get_mut: fn(&mut M) -> &mut Vec<T>,
    ) -> &mut Self {
        self.collection::<T>(name, tag, Some(TargetRef::of::<J>()), get, get_mut)
    }

    fn collection<T: Model>(
        &mut self,
        name: &'static str,
        tag: &'static str,
        through: Option<TargetRef>,
        get: fn(&M) -> &Vec<T>,
        get_mut: fn(&mut M) -> &mut Vec<T>,
    ) -> &mut Self {
        let getter: GetFn = Arc::new(move |owner: &dyn Entity| {
            owner.as_any().downcast_ref::<M>().map(|m| {
                FieldValue::Many(get(m).iter().map(|t| t.clone_entity()).collect())
            })
        });
        let setter: SetFn = Arc::new(
            move |owner: &mut dyn Entity, value: FieldValue, mode: SetMode| {
                let m = owner
                    .as_any_mut()
                    .downcast_mut::<M>()
                    .ok_or_else(wrong_owner::<M>)?;
                match (value, mode) {
                    (FieldValue::Many(items), SetMode::Strict) => {
                        *get_mut(m) = items
                            .into_iter()
                            .map(downcast::<T>)
                            .collect::<Result<_, _>>()?;
                        Ok(())
                    }
                    (FieldValue::Many(items), SetMode::Append) => {
                        for item in items {
                            get_mut(m).push(downcast::<T>(item)?);
                        }
                        Ok(())
                    }
                    (FieldValue::One(Some(item)), SetMode::Append) => {
                        get_mut(m).push(downcast::<T>(item)?);
                        Ok(())
                    }
                    (FieldValue::One(None), SetMode::Append) => Ok(()),
                    (other, _) => Err(AccessError::Mismatch {
                        expected: type_name::<Vec<T>>(),
                        actual: other.describe(),
                    }),
                }
            },
        );
        let children: ChildrenFn = Arc::new(children_fn(move |owner| {
            match owner.as_any_mut().downcast_mut::<M>() {
                Some(m) => get_mut(m)
                    .iter_mut()
                    .map(|t| t as &mut dyn Entity)
                    .collect(),
                None => Vec::new(),
            }
        }));
        let children_ref: ChildrenRefFn = Arc::new(children_ref_fn(move |owner| {
            match owner.as_any().downcast_ref::<M>() {
                Some(m) => get(m).iter().map(|t| t as &dyn Entity).collect(),
                None => Vec::new(),
            }
        }));

        self.fields.push(FieldDescriptor {
            name,
            tag,
            shape: FieldShape::Many {
                target: TargetRef::of::<T>(),
                through,
            },
            value_type: type_name::<Vec<T>>(),
            get: getter,
            set: setter,
            children: Some(children),
            children_ref: Some(children_ref),
            ensure: None,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{Account, Profile};

    #[test]
    fn test_field_table_order_and_shapes() {
        let descriptor = descriptor_of::<Account>();
        let names: Vec<_> = descriptor.fields().iter().map(FieldDescriptor::name).collect();
        assert_eq!(
            names,
            vec!["id", "name", "nickname", "manager_id", "profile", "mentor", "reports", "scratch"]
        );

        let shape = |name: &str| *descriptor.field(name).expect("declared").shape();
        assert_eq!(shape("id"), FieldShape::Scalar(ColumnKind::Integer));
        assert_eq!(shape("nickname"), FieldShape::OptionalScalar(ColumnKind::String));
        assert_eq!(shape("manager_id"), FieldShape::OptionalScalar(ColumnKind::Integer));
        assert_eq!(shape("profile"), FieldShape::One(TargetRef::of::<Profile>()));
        assert_eq!(shape("mentor"), FieldShape::One(TargetRef::of::<Account>()));
        assert!(matches!(shape("reports"), FieldShape::Many { through: None, .. }));
        assert!(shape("reports").is_association());
        assert_eq!(shape("name").column_kind(), Some(ColumnKind::String));
    }

    #[test]
    fn test_target_ref_resolves_descriptor() {
        let target = TargetRef::of::<Profile>();
        assert_eq!(target.table_name(), "profiles");
        assert_eq!(target.model_name(), "Profile");
        assert_eq!(target.descriptor().type_id(), TypeId::of::<Profile>());
    }

    #[test]
    fn test_new_entity_is_default() {
        let descriptor = descriptor_of::<Profile>();
        let entity = descriptor.new_entity();
        let profile = entity.as_any().downcast_ref::<Profile>().expect("a profile");
        assert_eq!(profile, &Profile::default());
        assert_eq!(descriptor.position("bio"), Some(2));
        assert!(descriptor.field_at(3).is_none());
    }

    #[test]
    fn test_children_skip_absent_references() {
        let descriptor = descriptor_of::<Account>();
        let mut account = Account::default();

        let profile = descriptor.field("profile").expect("declared");
        assert_eq!(profile.children_mut(&mut account).map(|c| c.len()), Some(0));

        account.profile = Some(Profile::default());
        account.reports = vec![Account::default(), Account::default()];
        assert_eq!(profile.children(&account).map(|c| c.len()), Some(1));
        let reports = descriptor.field("reports").expect("declared");
        assert_eq!(reports.children(&account).map(|c| c.len()), Some(2));

        let name = descriptor.field("name").expect("declared");
        assert!(name.children(&account).is_none());
    }
}
