//! Batched relation loading.
//!
//! A preload path such as `"author.profile"` names relation fields to follow
//! from the root model. Every level of every path is loaded with a single
//! query over all owners reached so far, so loading `author` for a hundred
//! articles costs one `SELECT ... WHERE id IN (...)`, not a hundred.
//!
//! ```ignore
//! let registry = Registry::new();
//! let preloader = Preloader::new(&registry, &executor);
//! preloader.preload(&cx, &mut articles, &["author".into()])?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sea_query::SelectStatement;

pub(crate) mod loader;
pub(crate) mod query;

use crate::config::{Dialect, LifelineConfig};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::relation::Relation;
use crate::schema::{Registry, Schema};
use crate::walker::{EntitySet, Walker};
use loader::Fetch;

type SelectCallback = Arc<dyn Fn(&mut SelectStatement) + Send + Sync>;

/// A relation path to load, with per-path options.
#[derive(Clone)]
pub struct Preload {
    path: String,
    unscoped: bool,
    callback: Option<SelectCallback>,
}

impl Preload {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            unscoped: false,
            callback: None,
        }
    }

    /// Customize the fetch for this path (ordering, extra filters).
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut SelectStatement) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Include soft-deleted targets.
    pub fn unscoped(mut self) -> Self {
        self.unscoped = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_unscoped(&self) -> bool {
        self.unscoped
    }

    pub(crate) fn callback(&self) -> Option<&SelectCallback> {
        self.callback.as_ref()
    }
}

impl fmt::Debug for Preload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preload")
            .field("path", &self.path)
            .field("unscoped", &self.unscoped)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl From<&str> for Preload {
    fn from(path: &str) -> Self {
        Preload::new(path)
    }
}

impl From<String> for Preload {
    fn from(path: String) -> Self {
        Preload::new(path)
    }
}

/// One relation to load: its full path, the owner-side path leading to it
/// and the resolved relation.
struct Step<'h> {
    path: String,
    parent: String,
    relation: Relation,
    target: Arc<Schema>,
    handler: Option<&'h Preload>,
}

/// Loads relations of mapped records through an [`Executor`].
pub struct Preloader<'a, E: Executor + ?Sized> {
    registry: &'a Registry,
    executor: &'a E,
    dialect: Dialect,
}

impl<'a, E: Executor + ?Sized> Preloader<'a, E> {
    pub fn new(registry: &'a Registry, executor: &'a E) -> Self {
        Self {
            registry,
            executor,
            dialect: Dialect::default(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_config(self, config: &LifelineConfig) -> Self {
        self.with_dialect(config.preload.dialect)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Load every path in `handlers` into `root`.
    ///
    /// All paths are validated before the first query. Intermediate levels
    /// are implied, so `"a.b"` loads `a` and then `b` on everything `a`
    /// reached. The first error aborts the call; levels already loaded stay
    /// attached.
    pub fn preload<R: EntitySet + ?Sized>(
        &self,
        cx: &Context,
        root: &mut R,
        handlers: &[Preload],
    ) -> Result<()> {
        let schema = self.registry.schema_for(root.model_descriptor())?;
        let steps = self.plan(&schema, handlers)?;

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "preload",
            model = schema.model_name(),
            steps = steps.len()
        )
        .entered();

        for step in &steps {
            let owners = if step.parent.is_empty() {
                root.entities_mut()
            } else {
                Walker::of(&mut *root).collect(&step.parent)?
            };
            if owners.is_empty() {
                log::debug!("preload {}: no owners", step.path);
                continue;
            }
            let fetch = Fetch {
                path: &step.path,
                relation: &step.relation,
                target: &step.target,
                handler: step.handler,
            };
            loader::load(cx, self.executor, self.dialect, &fetch, owners)?;
        }
        Ok(())
    }

    /// Validate every path and order the steps by depth.
    fn plan<'h>(&self, schema: &Arc<Schema>, handlers: &'h [Preload]) -> Result<Vec<Step<'h>>> {
        let mut steps: BTreeMap<(usize, String), Step<'h>> = BTreeMap::new();

        for handler in handlers {
            let segments: Vec<&str> = handler.path().split('.').collect();
            let mut owner = Arc::clone(schema);
            for (depth, segment) in segments.iter().enumerate() {
                let relation = owner
                    .relation(segment)
                    .cloned()
                    .ok_or_else(|| Error::InvalidRelationPath {
                        path: handler.path().to_string(),
                        segment: segment.to_string(),
                        model: owner.model_name().to_string(),
                    })?;
                let target = relation.target_schema(self.registry)?;
                let path = segments[..=depth].join(".");
                let leaf = depth + 1 == segments.len();

                let step = steps.entry((depth, path.clone())).or_insert_with(|| Step {
                    path,
                    parent: segments[..depth].join("."),
                    relation,
                    target: Arc::clone(&target),
                    handler: None,
                });
                if leaf && step.handler.is_none() {
                    step.handler = Some(handler);
                }
                owner = target;
            }
        }

        Ok(steps.into_values().collect())
    }
}

/// Load `handlers` into `root` with a one-off [`Preloader`].
pub fn preload<E, R>(
    cx: &Context,
    registry: &Registry,
    executor: &E,
    root: &mut R,
    handlers: &[Preload],
) -> Result<()>
where
    E: Executor + ?Sized,
    R: EntitySet + ?Sized,
{
    Preloader::new(registry, executor).preload(cx, root, handlers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::Account;
    use crate::test_helpers::MockExecutor;

    #[test]
    fn test_plan_implies_intermediate_levels() {
        let registry = Registry::new();
        let executor = MockExecutor::new();
        let preloader = Preloader::new(&registry, &executor);
        let schema = registry.schema::<Account>().expect("valid model");
        let handlers = vec![Preload::new("reports.profile"), Preload::new("mentor")];
        let steps = preloader.plan(&schema, &handlers).expect("valid paths");
        let paths: Vec<_> = steps.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["mentor", "reports", "reports.profile"]);
        assert!(steps[1].handler.is_none());
        assert_eq!(steps[2].parent, "reports");
    }

    #[test]
    fn test_invalid_path_runs_no_query() {
        let registry = Registry::new();
        let executor = MockExecutor::new();
        let mut account = Account {
            id: 1,
            ..Default::default()
        };
        let err = Preloader::new(&registry, &executor)
            .preload(
                &Context::background(),
                &mut account,
                &["reports".into(), "reports.friends".into()],
            )
            .expect_err("unknown relation");
        match err {
            Error::InvalidRelationPath {
                path,
                segment,
                model,
            } => {
                assert_eq!(path, "reports.friends");
                assert_eq!(segment, "friends");
                assert_eq!(model, "Account");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(executor.query_count(), 0);
    }

    #[test]
    fn test_preload_handler_options() {
        let handler = Preload::new("reports")
            .unscoped()
            .with_callback(|select| {
                select.limit(10);
            });
        assert!(handler.is_unscoped());
        assert!(handler.callback().is_some());
        assert_eq!(format!("{:?}", handler), r#"Preload { path: "reports", unscoped: true, callback: true }"#);
    }
}
