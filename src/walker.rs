//! Traversal of loaded object graphs along dotted relation paths.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::accessor::{read, write};
use crate::model::{descriptor_of, Entity, FieldDescriptor, FieldValue, Model, ModelDescriptor, SetMode};

/// Roots a [`Walker`] or a preload can start from.
///
/// Implemented for a single model, a slice of models and a `Vec` of models;
/// a single record is a batch of one.
pub trait EntitySet {
    fn entities_mut(&mut self) -> Vec<&mut dyn Entity>;
    fn entities(&self) -> Vec<&dyn Entity>;
    /// Descriptor of the element type, available even when the set is empty.
    fn model_descriptor(&self) -> Arc<ModelDescriptor>;
}

impl<M: Model> EntitySet for M {
    fn entities_mut(&mut self) -> Vec<&mut dyn Entity> {
        vec![self as &mut dyn Entity]
    }

    fn entities(&self) -> Vec<&dyn Entity> {
        vec![self as &dyn Entity]
    }

    fn model_descriptor(&self) -> Arc<ModelDescriptor> {
        descriptor_of::<M>()
    }
}

impl<M: Model> EntitySet for [M] {
    fn entities_mut(&mut self) -> Vec<&mut dyn Entity> {
        self.iter_mut().map(|m| m as &mut dyn Entity).collect()
    }

    fn entities(&self) -> Vec<&dyn Entity> {
        self.iter().map(|m| m as &dyn Entity).collect()
    }

    fn model_descriptor(&self) -> Arc<ModelDescriptor> {
        descriptor_of::<M>()
    }
}

impl<M: Model> EntitySet for Vec<M> {
    fn entities_mut(&mut self) -> Vec<&mut dyn Entity> {
        self.as_mut_slice().entities_mut()
    }

    fn entities(&self) -> Vec<&dyn Entity> {
        self.as_slice().entities()
    }

    fn model_descriptor(&self) -> Arc<ModelDescriptor> {
        descriptor_of::<M>()
    }
}

/// Visits the records reachable from a set of roots through `One` and
/// `Many` fields. Absent references and empty collections are skipped.
pub struct Walker<'a> {
    roots: Vec<&'a mut dyn Entity>,
}

fn segments(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::field_not_found("", path));
    }
    Ok(segments)
}

fn association<'d>(descriptor: &'d ModelDescriptor, name: &str) -> Result<&'d FieldDescriptor> {
    let field = descriptor
        .field(name)
        .ok_or_else(|| Error::field_not_found(descriptor.model_name(), name))?;
    if !field.shape().is_association() {
        return Err(Error::type_mismatch(
            descriptor.model_name(),
            name,
            "association",
            field.value_type(),
        ));
    }
    Ok(field)
}

fn descend_mut<'a>(
    mut current: Vec<&'a mut dyn Entity>,
    segments: &[&str],
) -> Result<Vec<&'a mut dyn Entity>> {
    for segment in segments {
        let mut next = Vec::new();
        for entity in current {
            let descriptor = entity.descriptor();
            let field = association(&descriptor, segment)?;
            next.extend(field.children_mut(entity).unwrap_or_default());
        }
        current = next;
    }
    Ok(current)
}

fn descend<'a>(mut current: Vec<&'a dyn Entity>, segments: &[&str]) -> Result<Vec<&'a dyn Entity>> {
    for segment in segments {
        let mut next = Vec::new();
        for entity in current {
            let descriptor = entity.descriptor();
            let field = association(&descriptor, segment)?;
            next.extend(field.children(entity).unwrap_or_default());
        }
        current = next;
    }
    Ok(current)
}

impl<'a> Walker<'a> {
    pub fn new(roots: Vec<&'a mut dyn Entity>) -> Self {
        Self { roots }
    }

    pub fn of<R: EntitySet + ?Sized>(root: &'a mut R) -> Self {
        Self::new(root.entities_mut())
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Call `callback` with every record at the end of `path`, flattened.
    ///
    /// The callback is skipped when nothing is reachable.
    pub fn find<F>(self, path: &str, callback: F) -> Result<()>
    where
        F: FnOnce(Vec<&'a mut dyn Entity>) -> Result<()>,
    {
        let leaves = self.collect(path)?;
        if leaves.is_empty() {
            return Ok(());
        }
        callback(leaves)
    }

    /// Every record at the end of `path`.
    pub fn collect(self, path: &str) -> Result<Vec<&'a mut dyn Entity>> {
        let segments = segments(path)?;
        descend_mut(self.roots, &segments)
    }

    /// The value of the last field of `path` on every record reached before it.
    /// The last field may be a column.
    pub fn values(&self, path: &str) -> Result<Vec<FieldValue>> {
        let segments = segments(path)?;
        let Some((leaf, parents)) = segments.split_last() else {
            return Ok(Vec::new());
        };
        let roots = self.roots.iter().map(|r| &**r as &dyn Entity).collect();
        descend(roots, parents)?
            .into_iter()
            .map(|owner| {
                let descriptor = owner.descriptor();
                let field = descriptor
                    .field(leaf)
                    .ok_or_else(|| Error::field_not_found(descriptor.model_name(), *leaf))?;
                read(owner, &descriptor, field)
            })
            .collect()
    }

    /// Write `value` into the last field of `path` on every record reached
    /// before it, appending to collections. Returns how many records were
    /// written.
    pub fn push(&mut self, path: &str, value: FieldValue) -> Result<usize> {
        let segments = segments(path)?;
        let Some((leaf, parents)) = segments.split_last() else {
            return Ok(0);
        };
        let roots = self.roots.iter_mut().map(|r| &mut **r as &mut dyn Entity).collect();
        let owners = descend_mut(roots, parents)?;
        let written = owners.len();
        for owner in owners {
            let descriptor = owner.descriptor();
            let field = descriptor
                .field(leaf)
                .ok_or_else(|| Error::field_not_found(descriptor.model_name(), *leaf))?;
            write(owner, &descriptor, field, value.clone(), SetMode::Append)?;
        }
        Ok(written)
    }
}
