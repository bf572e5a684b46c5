//! Reading and writing model fields by name or by index path.

use sea_query::Value;

use super::descriptor::FieldDescriptor;
use super::{Entity, Model, ModelDescriptor};
use crate::error::{Error, Result};
use crate::value::{is_zero_value, value_type_name, ScanError};

/// A field value read from, or destined for, a model.
#[derive(Debug)]
pub enum FieldValue {
    Column(Value),
    One(Option<Box<dyn Entity>>),
    Many(Vec<Box<dyn Entity>>),
}

impl Clone for FieldValue {
    fn clone(&self) -> Self {
        match self {
            FieldValue::Column(value) => FieldValue::Column(value.clone()),
            FieldValue::One(entity) => FieldValue::One(entity.clone()),
            FieldValue::Many(entities) => FieldValue::Many(entities.clone()),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Column(value)
    }
}

impl FieldValue {
    pub fn column(value: impl Into<Value>) -> Self {
        FieldValue::Column(value.into())
    }

    pub fn one<T: Model>(record: T) -> Self {
        FieldValue::One(Some(Box::new(record)))
    }

    pub fn many<T: Model>(records: impl IntoIterator<Item = T>) -> Self {
        FieldValue::Many(
            records
                .into_iter()
                .map(|r| Box::new(r) as Box<dyn Entity>)
                .collect(),
        )
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldValue::Column(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            FieldValue::Column(value) => Some(value),
            _ => None,
        }
    }

    /// The held record, if it is a `T`.
    pub fn into_one<T: Model>(self) -> Option<T> {
        match self {
            FieldValue::One(Some(entity)) => entity.into_any().downcast::<T>().ok().map(|t| *t),
            _ => None,
        }
    }

    /// The held records that are `T`s.
    pub fn into_many<T: Model>(self) -> Vec<T> {
        match self {
            FieldValue::Many(entities) => entities
                .into_iter()
                .filter_map(|e| e.into_any().downcast::<T>().ok().map(|t| *t))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Uniform absence check: null or zero columns, missing references and
    /// empty collections are all zero.
    pub fn is_zero(&self) -> bool {
        match self {
            FieldValue::Column(value) => is_zero_value(value),
            FieldValue::One(entity) => entity.is_none(),
            FieldValue::Many(entities) => entities.is_empty(),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            FieldValue::Column(value) => value_type_name(value).to_string(),
            FieldValue::One(Some(entity)) => entity.model_name().to_string(),
            FieldValue::One(None) => "empty reference".to_string(),
            FieldValue::Many(_) => "collection".to_string(),
        }
    }
}

/// Whether a write replaces the destination or appends to collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    Strict,
    Append,
}

/// Failure inside a typed accessor, before model/field context is attached.
#[derive(Debug)]
pub(crate) enum AccessError {
    WrongOwner { expected: &'static str },
    Mismatch { expected: &'static str, actual: String },
    Scan(ScanError),
}

impl AccessError {
    fn into_error(self, model: &str, field: &str) -> Error {
        match self {
            AccessError::WrongOwner { expected } => {
                Error::type_mismatch(model, field, expected, "another model")
            }
            AccessError::Mismatch { expected, actual } => {
                Error::type_mismatch(model, field, expected, actual)
            }
            AccessError::Scan(err) => Error::type_mismatch(model, field, err.expected(), err.actual()),
        }
    }
}

fn lookup<'d>(descriptor: &'d ModelDescriptor, name: &str) -> Result<&'d FieldDescriptor> {
    descriptor
        .field(name)
        .ok_or_else(|| Error::field_not_found(descriptor.model_name(), name))
}

/// Read a declared field.
pub fn get_field(instance: &dyn Entity, name: &str) -> Result<FieldValue> {
    let descriptor = instance.descriptor();
    let field = lookup(&descriptor, name)?;
    read(instance, &descriptor, field)
}

/// Replace a declared field, coercing column values through their scanner.
pub fn set_field(instance: &mut dyn Entity, name: &str, value: FieldValue) -> Result<()> {
    let descriptor = instance.descriptor();
    let field = lookup(&descriptor, name)?;
    write(instance, &descriptor, field, value, SetMode::Strict)
}

/// Like [`set_field`], but collections are appended to instead of replaced.
pub fn push_field(instance: &mut dyn Entity, name: &str, value: FieldValue) -> Result<()> {
    let descriptor = instance.descriptor();
    let field = lookup(&descriptor, name)?;
    write(instance, &descriptor, field, value, SetMode::Append)
}

pub(crate) fn read(
    instance: &dyn Entity,
    descriptor: &ModelDescriptor,
    field: &FieldDescriptor,
) -> Result<FieldValue> {
    (field.get)(instance).ok_or_else(|| {
        Error::type_mismatch(
            descriptor.model_name(),
            field.name(),
            descriptor.model_name(),
            instance.model_name(),
        )
    })
}

pub(crate) fn write(
    instance: &mut dyn Entity,
    descriptor: &ModelDescriptor,
    field: &FieldDescriptor,
    value: FieldValue,
    mode: SetMode,
) -> Result<()> {
    (field.set)(instance, value, mode)
        .map_err(|e| e.into_error(descriptor.model_name(), field.name()))
}

/// Translate a dotted field path into descriptor indices.
///
/// Every segment but the last must be a single-reference field.
pub fn index_path(descriptor: &ModelDescriptor, path: &str) -> Result<Vec<usize>> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut indices = Vec::with_capacity(segments.len());
    let mut current: Option<std::sync::Arc<ModelDescriptor>> = None;

    for (i, segment) in segments.iter().enumerate() {
        let owner: &ModelDescriptor = match &current {
            Some(next) => next,
            None => descriptor,
        };
        let index = owner
            .position(segment)
            .ok_or_else(|| Error::field_not_found(owner.model_name(), *segment))?;
        indices.push(index);

        if i + 1 < segments.len() {
            let field = &owner.fields()[index];
            let target = match field.shape() {
                super::FieldShape::One(target) => target.descriptor(),
                _ => {
                    return Err(Error::type_mismatch(
                        owner.model_name(),
                        field.name(),
                        "single reference",
                        field.value_type(),
                    ))
                }
            };
            current = Some(target);
        }
    }

    Ok(indices)
}

/// Walk every index but the last, allocating absent single references.
fn descend<'a>(mut current: &'a mut dyn Entity, path: &[usize]) -> Result<&'a mut dyn Entity> {
    for &index in path {
        let descriptor = current.descriptor();
        let field = descriptor
            .field_at(index)
            .ok_or_else(|| Error::field_not_found(descriptor.model_name(), format!("#{}", index)))?;
        let Some(ensure) = field.ensure.clone() else {
            return Err(Error::type_mismatch(
                descriptor.model_name(),
                field.name(),
                "single reference",
                field.value_type(),
            ));
        };
        current = ensure(current).ok_or_else(|| {
            Error::type_mismatch(
                descriptor.model_name(),
                field.name(),
                descriptor.model_name(),
                "another model",
            )
        })?;
    }
    Ok(current)
}

fn split_leaf(path: &[usize]) -> Result<(&[usize], usize)> {
    match path.split_last() {
        Some((leaf, parents)) => Ok((parents, *leaf)),
        None => Err(Error::field_not_found("", "empty index path")),
    }
}

/// Read the field at an index path.
///
/// Intermediate single references that are `None` are allocated with their
/// `Default` value on the way down, which is why the instance is borrowed
/// mutably.
pub fn get_by_index_path(instance: &mut dyn Entity, path: &[usize]) -> Result<FieldValue> {
    let (parents, leaf) = split_leaf(path)?;
    let owner = descend(instance, parents)?;
    let descriptor = owner.descriptor();
    let field = descriptor
        .field_at(leaf)
        .ok_or_else(|| Error::field_not_found(descriptor.model_name(), format!("#{}", leaf)))?;
    read(owner, &descriptor, field)
}

/// Write the field at an index path, allocating intermediate references.
pub fn set_by_index_path(instance: &mut dyn Entity, path: &[usize], value: FieldValue) -> Result<()> {
    let (parents, leaf) = split_leaf(path)?;
    let owner = descend(instance, parents)?;
    let descriptor = owner.descriptor();
    let field = descriptor
        .field_at(leaf)
        .ok_or_else(|| Error::field_not_found(descriptor.model_name(), format!("#{}", leaf)))?;
    write(owner, &descriptor, field, value, SetMode::Strict)
}
