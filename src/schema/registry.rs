//! Schema cache.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::builder::Builder;
use super::Schema;
use crate::config::{LifelineConfig, SchemaConfig};
use crate::error::Result;
use crate::model::{descriptor_of, Entity, Model, ModelDescriptor};
use crate::tags::AnalyzerOptions;

/// Builds and caches one [`Schema`] per model type.
///
/// A registry is owned by the application and passed by reference to
/// whatever needs schemas. Lookups take a read lock; a miss takes the write
/// lock, checks again and builds the schema together with every schema it
/// depends on. Nothing is cached when a build fails.
#[derive(Debug, Default)]
pub struct Registry {
    defaults: SchemaConfig,
    tags: AnalyzerOptions,
    schemas: RwLock<HashMap<TypeId, Arc<Schema>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &LifelineConfig) -> Self {
        Self {
            defaults: config.schema.clone(),
            tags: AnalyzerOptions::from(&config.tags),
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Naming conventions used for models without overrides.
    pub fn defaults(&self) -> &SchemaConfig {
        &self.defaults
    }

    pub fn tag_options(&self) -> &AnalyzerOptions {
        &self.tags
    }

    pub fn schema<M: Model>(&self) -> Result<Arc<Schema>> {
        self.schema_for(descriptor_of::<M>())
    }

    /// Schema of the concrete type behind `instance`.
    pub fn schema_of(&self, instance: &dyn Entity) -> Result<Arc<Schema>> {
        self.schema_for(instance.descriptor())
    }

    pub fn schema_for(&self, descriptor: Arc<ModelDescriptor>) -> Result<Arc<Schema>> {
        let type_id = descriptor.type_id();
        if let Some(schema) = self.get(type_id) {
            return Ok(schema);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("schema.build", model = descriptor.model_name()).entered();

        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(schema) = schemas.get(&type_id) {
            return Ok(Arc::clone(schema));
        }

        let mut builder = Builder::new(&self.defaults, &self.tags, &schemas);
        let schema = builder.build(descriptor)?;
        let staged = builder.into_staged();
        schemas.extend(staged);
        Ok(schema)
    }

    /// Cached schema for a type, without building it.
    pub fn get(&self, type_id: TypeId) -> Option<Arc<Schema>> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()
    }

    /// Store a schema, replacing any cached one for the same type.
    pub fn set(&self, schema: Arc<Schema>) {
        self.schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(schema.type_id(), schema);
    }

    /// Drop every cached schema.
    pub fn flush(&self) {
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        log::debug!("flushing {} cached schemas", schemas.len());
        schemas.clear();
    }

    pub fn len(&self) -> usize {
        self.schemas.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
