//! Two-phase schema construction.
//!
//! Phase one ([`analyze`]) is a pure pass over one descriptor: it parses tags,
//! classifies columns and picks the primary key. Phase two ([`Builder`])
//! resolves associations, which needs the keys of every target model and so
//! recurses through the registry cache. A target that is still being built
//! higher up the stack (a cycle) is resolved from its phase-one columns only.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use heck::ToSnakeCase;

use super::field::Field;
use super::keys::{ForeignKey, KeyStrategy, KeyType, PrimaryKey};
use super::Schema;
use crate::config::SchemaConfig;
use crate::error::{Error, Result};
use crate::model::{FieldShape, ModelDescriptor, TargetRef};
use crate::relation::{self, Relation};
use crate::tags::{self, keys, AnalyzerOptions};

/// An association field awaiting resolution.
#[derive(Debug, Clone)]
pub(crate) struct Association {
    pub(crate) name: &'static str,
    pub(crate) index: usize,
    pub(crate) shape: FieldShape,
    pub(crate) hint: Option<String>,
}

/// Output of phase one.
#[derive(Debug, Clone)]
pub(crate) struct ColumnSet {
    pub(crate) model_name: &'static str,
    pub(crate) table_name: &'static str,
    pub(crate) fields: Vec<Field>,
    pub(crate) primary_key: PrimaryKey,
    pub(crate) foreign_keys: Vec<ForeignKey>,
    pub(crate) associations: Vec<Association>,
}

/// The key-related view of a model that relation inference works on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Keys<'a> {
    pub(crate) model_name: &'static str,
    pub(crate) table_name: &'static str,
    pub(crate) primary_key: &'a PrimaryKey,
    pub(crate) foreign_keys: &'a [ForeignKey],
}

impl ColumnSet {
    pub(crate) fn keys(&self) -> Keys<'_> {
        Keys {
            model_name: self.model_name,
            table_name: self.table_name,
            primary_key: &self.primary_key,
            foreign_keys: &self.foreign_keys,
        }
    }
}

/// Phase one: classify the columns of a descriptor.
pub(crate) fn analyze(
    descriptor: &ModelDescriptor,
    defaults: &SchemaConfig,
    options: &AnalyzerOptions,
) -> Result<ColumnSet> {
    let model_name = descriptor.model_name();
    let table_name = descriptor.table_name();

    let mut fields = Vec::new();
    let mut associations = Vec::new();
    let mut tagged_pk: Option<usize> = None;

    for (index, declared) in descriptor.fields().iter().enumerate() {
        let parsed = tags::parse(declared.tag(), options);
        let tag = |key: &str| parsed.get_by_key(&options.name, key);

        if tag(keys::EXCLUDED).is_some() && !declared.shape().is_association() {
            let kind = declared.shape().column_kind();
            if let Some(kind) = kind {
                fields.push(Field {
                    model_name,
                    table_name,
                    name: declared.name(),
                    index,
                    column_name: declared.name().to_snake_case(),
                    kind,
                    nullable: matches!(declared.shape(), FieldShape::OptionalScalar(_)),
                    tags: parsed.clone(),
                    primary_key: false,
                    foreign_key: None,
                    excluded: true,
                    default: None,
                    has_default: false,
                    created_key: false,
                    updated_key: false,
                    deleted_key: false,
                });
            }
            continue;
        }

        let (kind, nullable) = match declared.shape() {
            FieldShape::Scalar(kind) => (*kind, false),
            FieldShape::OptionalScalar(kind) => (*kind, true),
            shape => {
                if tag(keys::EXCLUDED).is_some() {
                    continue;
                }
                if tag(keys::PRIMARY_KEY).is_some() {
                    return Err(Error::InvalidAssociation {
                        model: model_name.to_string(),
                        field: declared.name().to_string(),
                        reason: "a primary key cannot be an association".to_string(),
                    });
                }
                associations.push(Association {
                    name: declared.name(),
                    index,
                    shape: *shape,
                    hint: tag(keys::RELATION).map(str::to_string),
                });
                continue;
            }
        };

        let column_name = tag(keys::COLUMN)
            .map(str::to_string)
            .unwrap_or_else(|| declared.name().to_snake_case());

        let foreign_key = match tag(keys::FOREIGN_KEY) {
            Some(tags::TRUE) => {
                return Err(Error::UnresolvableReference {
                    model: model_name.to_string(),
                    field: declared.name().to_string(),
                    target: String::new(),
                })
            }
            other => other.map(str::to_string),
        };

        let default = tag(keys::DEFAULT);
        let created_key = column_name == defaults.created_key;
        let updated_key = column_name == defaults.updated_key;
        let deleted_key = column_name == defaults.deleted_key;

        let primary_key = tag(keys::PRIMARY_KEY).is_some();
        if primary_key {
            if let Some(first) = tagged_pk {
                let first: &Field = &fields[first];
                return Err(Error::DuplicatePrimaryKey {
                    model: model_name.to_string(),
                    first: first.name.to_string(),
                    second: declared.name().to_string(),
                });
            }
            tagged_pk = Some(fields.len());
        }

        fields.push(Field {
            model_name,
            table_name,
            name: declared.name(),
            index,
            column_name,
            kind,
            nullable,
            tags: parsed.clone(),
            primary_key,
            foreign_key,
            excluded: false,
            default: default.filter(|d| *d != tags::TRUE).map(str::to_string),
            has_default: default.is_some() || created_key || updated_key,
            created_key,
            updated_key,
            deleted_key,
        });
    }

    let pk_position = match tagged_pk {
        Some(position) => position,
        None => {
            let implicit = descriptor.primary_key().unwrap_or(&defaults.primary_key);
            let position = fields
                .iter()
                .position(|f| !f.excluded && f.column_name == implicit)
                .ok_or_else(|| Error::MissingPrimaryKey {
                    model: model_name.to_string(),
                })?;
            fields[position].primary_key = true;
            position
        }
    };
    let primary_key = primary_key_of(&fields[pk_position])?;

    let foreign_keys = fields
        .iter()
        .filter(|f| f.foreign_key.is_some())
        .map(foreign_key_of)
        .collect::<Result<Vec<_>>>()?;

    Ok(ColumnSet {
        model_name,
        table_name,
        fields,
        primary_key,
        foreign_keys,
        associations,
    })
}

fn primary_key_of(field: &Field) -> Result<PrimaryKey> {
    let key_type = match KeyType::of(field.kind) {
        Some(key_type) if !field.nullable => key_type,
        _ => {
            return Err(Error::InvalidPrimaryKeyType {
                model: field.model_name.to_string(),
                field: field.name.to_string(),
                kind: if field.nullable {
                    format!("nullable {}", field.kind)
                } else {
                    field.kind.to_string()
                },
            })
        }
    };

    let tagged = field
        .tags
        .iter()
        .flat_map(|t| t.properties())
        .find(|p| p.key() == keys::PRIMARY_KEY)
        .map(|p| p.value())
        .unwrap_or_default();
    let strategy = KeyStrategy::from_tag(tagged).unwrap_or_else(|| {
        log::warn!(
            "unknown primary key strategy {:?} on {}.{}, using database keys",
            tagged,
            field.model_name,
            field.name
        );
        KeyStrategy::Database
    });

    Ok(PrimaryKey {
        field: field.clone(),
        key_type,
        strategy,
    })
}

fn foreign_key_of(field: &Field) -> Result<ForeignKey> {
    let key_type = KeyType::of(field.kind).ok_or_else(|| Error::InvalidForeignKeyType {
        model: field.model_name.to_string(),
        field: field.name.to_string(),
        kind: field.kind.to_string(),
    })?;
    Ok(ForeignKey {
        field: field.clone(),
        reference: field.foreign_key.clone().unwrap_or_default(),
        key_type,
    })
}

enum Target {
    Built(Arc<Schema>),
    Shallow(ColumnSet),
}

impl Target {
    fn keys(&self) -> Keys<'_> {
        match self {
            Target::Built(schema) => schema.keys(),
            Target::Shallow(columns) => columns.keys(),
        }
    }
}

/// Phase two, run under the registry's write lock.
pub(crate) struct Builder<'r> {
    defaults: &'r SchemaConfig,
    options: &'r AnalyzerOptions,
    cache: &'r HashMap<TypeId, Arc<Schema>>,
    staged: HashMap<TypeId, Arc<Schema>>,
    in_progress: HashSet<TypeId>,
}

impl<'r> Builder<'r> {
    pub(crate) fn new(
        defaults: &'r SchemaConfig,
        options: &'r AnalyzerOptions,
        cache: &'r HashMap<TypeId, Arc<Schema>>,
    ) -> Self {
        Self {
            defaults,
            options,
            cache,
            staged: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Every schema built along the way, to be committed together.
    pub(crate) fn into_staged(self) -> HashMap<TypeId, Arc<Schema>> {
        self.staged
    }

    fn lookup(&self, type_id: TypeId) -> Option<Arc<Schema>> {
        self.cache
            .get(&type_id)
            .or_else(|| self.staged.get(&type_id))
            .cloned()
    }

    pub(crate) fn build(&mut self, descriptor: Arc<ModelDescriptor>) -> Result<Arc<Schema>> {
        let type_id = descriptor.type_id();
        if let Some(schema) = self.lookup(type_id) {
            return Ok(schema);
        }

        self.in_progress.insert(type_id);
        let built = self.build_uncached(descriptor);
        self.in_progress.remove(&type_id);

        let schema = Arc::new(built?);
        log::debug!(
            "built schema for {} ({} columns, {} relations)",
            schema.model_name(),
            schema.columns().len(),
            schema.relations().count()
        );
        self.staged.insert(type_id, Arc::clone(&schema));
        Ok(schema)
    }

    fn build_uncached(&mut self, descriptor: Arc<ModelDescriptor>) -> Result<Schema> {
        let columns = analyze(&descriptor, self.defaults, self.options)?;

        let mut relations: HashMap<&'static str, Relation> = HashMap::new();
        for association in &columns.associations {
            let (target_ref, through_ref) = match &association.shape {
                FieldShape::One(target) => (target, None),
                FieldShape::Many { target, through } => (target, through.as_ref()),
                _ => continue,
            };

            let target = self.target(target_ref)?;
            let through = match through_ref {
                Some(join) => Some((*join, self.target(join)?)),
                None => None,
            };

            let relation = relation::resolve(
                columns.keys(),
                association,
                *target_ref,
                target.keys(),
                through.as_ref().map(|(join, t)| (*join, t.keys())),
            )?;
            relations.insert(association.name, relation);
        }

        Ok(Schema::new(descriptor, columns, relations))
    }

    fn target(&mut self, target: &TargetRef) -> Result<Target> {
        if let Some(schema) = self.lookup(target.type_id()) {
            return Ok(Target::Built(schema));
        }
        if self.in_progress.contains(&target.type_id()) {
            let descriptor = target.descriptor();
            return Ok(Target::Shallow(analyze(&descriptor, self.defaults, self.options)?));
        }
        self.build(target.descriptor()).map(Target::Built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::Account;
    use crate::model::{descriptor_of, Model, ModelBuilder};

    fn analyze_model<M: Model>() -> Result<ColumnSet> {
        analyze(
            &descriptor_of::<M>(),
            &SchemaConfig::default(),
            &AnalyzerOptions::default(),
        )
    }

    #[test]
    fn test_analyze_classifies_fields() {
        let columns = analyze_model::<Account>().expect("valid model");
        assert_eq!(columns.primary_key.name(), "id");
        assert_eq!(columns.primary_key.key_type(), KeyType::Integer);

        let names: Vec<_> = columns.fields.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["id", "name", "nickname", "manager_id", "scratch"]);
        assert!(columns.fields[4].excluded);

        let fk: Vec<_> = columns.foreign_keys.iter().map(|f| f.name()).collect();
        assert_eq!(fk, vec!["manager_id"]);
        assert!(columns.foreign_keys[0].is_optional());

        let assoc: Vec<_> = columns.associations.iter().map(|a| a.name).collect();
        assert_eq!(assoc, vec!["profile", "mentor", "reports"]);
        assert_eq!(columns.associations[1].hint.as_deref(), Some("manager_id"));
    }

    #[derive(Clone, Debug, Default)]
    struct Session {
        token: String,
        user_id: i64,
        expires_at: f64,
    }

    impl Model for Session {
        fn table_name() -> &'static str {
            "sessions"
        }

        fn describe(model: &mut ModelBuilder<Self>) {
            model
                .column("token", r#"ll:"pk:uuid-v4""#, |s| &s.token, |s| &mut s.token)
                .column("user_id", r#"ll:"fk:users""#, |s| &s.user_id, |s| &mut s.user_id)
                .column(
                    "expires_at",
                    r#"ll:"default:now() + interval '1 day'""#,
                    |s| &s.expires_at,
                    |s| &mut s.expires_at,
                );
        }
    }

    #[test]
    fn test_analyze_string_key_with_strategy() {
        let columns = analyze_model::<Session>().expect("valid model");
        assert_eq!(columns.primary_key.column_name(), "token");
        assert_eq!(columns.primary_key.key_type(), KeyType::String);
        assert_eq!(columns.primary_key.strategy(), KeyStrategy::UuidV4);
        assert!(columns.primary_key.generate().is_some());

        let expires = &columns.fields[2];
        assert_eq!(expires.default(), Some("now() + interval '1 day'"));
        assert!(expires.has_default());
    }

    #[derive(Clone, Debug, Default)]
    struct Legacy {
        code: i32,
        label: String,
    }

    impl Model for Legacy {
        fn table_name() -> &'static str {
            "legacy"
        }

        fn describe(model: &mut ModelBuilder<Self>) {
            model
                .primary_key("code")
                .column("code", "", |l| &l.code, |l| &mut l.code)
                .column("label", "", |l| &l.label, |l| &mut l.label);
        }
    }

    #[test]
    fn test_analyze_primary_key_override() {
        let columns = analyze_model::<Legacy>().expect("valid model");
        assert_eq!(columns.primary_key.name(), "code");
        assert!(columns.fields[0].primary_key);
    }

    #[test]
    fn test_analyze_custom_default_primary_key() {
        let defaults = SchemaConfig {
            primary_key: "label".to_string(),
            ..SchemaConfig::default()
        };
        let columns = analyze(&descriptor_of::<Session>(), &defaults, &AnalyzerOptions::default())
            .expect("tagged key wins");
        assert_eq!(columns.primary_key.name(), "token");
    }
}
