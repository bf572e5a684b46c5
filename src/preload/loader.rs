//! One batched fetch for one relation over a set of owners.

use std::collections::{HashMap, HashSet};

use sea_query::Value;

use super::query::{self, OWNER_KEY_ALIAS};
use super::Preload;
use crate::config::Dialect;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::executor::{Executor, Row};
use crate::model::accessor::{read, write};
use crate::model::{Entity, FieldValue, SetMode};
use crate::relation::Relation;
use crate::schema::Schema;
use crate::value::KeyValue;

/// Everything needed to load one relation path.
pub(crate) struct Fetch<'p> {
    pub(crate) path: &'p str,
    pub(crate) relation: &'p Relation,
    pub(crate) target: &'p Schema,
    pub(crate) handler: Option<&'p Preload>,
}

impl Fetch<'_> {
    fn failed(&self, source: crate::executor::ExecError) -> Error {
        Error::QueryFailed {
            relation: self.path.to_string(),
            source,
        }
    }
}

/// Source key of one owner, or `None` when it is null or zero.
fn owner_key(owner: &dyn Entity, relation: &Relation) -> Result<Option<(KeyValue, Value)>> {
    let descriptor = owner.descriptor();
    let field = descriptor
        .field(relation.source().field())
        .ok_or_else(|| Error::field_not_found(descriptor.model_name(), relation.source().field()))?;
    let value = match read(owner, &descriptor, field)? {
        FieldValue::Column(value) => value,
        other => {
            return Err(Error::type_mismatch(
                descriptor.model_name(),
                field.name(),
                "key column",
                other.describe(),
            ))
        }
    };
    Ok(KeyValue::from_value(&value)
        .filter(|key| !key.is_zero())
        .map(|key| (key, value)))
}

/// Build a target record from a result row, returning it with the key it
/// should be matched on.
fn hydrate(fetch: &Fetch<'_>, row: &Row) -> Result<(Option<KeyValue>, Box<dyn Entity>)> {
    let target = fetch.target;
    let descriptor = target.descriptor();
    let mut entity = descriptor.new_entity();
    let mut link_key = None;

    for (column, value) in row.iter() {
        if column == OWNER_KEY_ALIAS {
            link_key = KeyValue::from_value(value);
            continue;
        }
        let field = target
            .field_by_column(column)
            .and_then(|f| descriptor.field_at(f.index()))
            .ok_or_else(|| Error::field_not_found(target.model_name(), column))?;
        write(
            &mut *entity,
            descriptor,
            field,
            FieldValue::Column(value.clone()),
            SetMode::Strict,
        )?;
    }

    let key = match fetch.relation.through() {
        Some(_) => link_key,
        None => {
            let reference = fetch.relation.reference().field();
            let field = descriptor
                .field(reference)
                .ok_or_else(|| Error::field_not_found(target.model_name(), reference))?;
            read(&*entity, descriptor, field)?
                .as_value()
                .and_then(KeyValue::from_value)
        }
    };
    Ok((key, entity))
}

fn empty(relation: &Relation) -> FieldValue {
    if relation.kind().is_to_one() {
        FieldValue::One(None)
    } else {
        FieldValue::Many(Vec::new())
    }
}

fn assign(owner: &mut dyn Entity, relation: &Relation, value: FieldValue) -> Result<()> {
    let descriptor = owner.descriptor();
    let field = descriptor.field_at(relation.field_index()).ok_or_else(|| {
        Error::field_not_found(descriptor.model_name(), relation.name())
    })?;
    write(owner, &descriptor, field, value, SetMode::Strict)
}

/// Fetch the targets of `fetch.relation` for every owner with one query and
/// attach them.
///
/// Owners without a key get an empty value. When no owner has a key the
/// query is skipped.
pub(crate) fn load<E: Executor + ?Sized>(
    cx: &Context,
    executor: &E,
    dialect: Dialect,
    fetch: &Fetch<'_>,
    mut owners: Vec<&mut dyn Entity>,
) -> Result<()> {
    let relation = fetch.relation;

    let mut owner_keys = Vec::with_capacity(owners.len());
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for owner in owners.iter() {
        let key = owner_key(&**owner, relation)?;
        if let Some((key, value)) = &key {
            if seen.insert(key.clone()) {
                keys.push(value.clone());
            }
        }
        owner_keys.push(key.map(|(key, _)| key));
    }

    if keys.is_empty() {
        log::debug!("preload {}: no keys, skipping fetch", fetch.path);
        for owner in owners.iter_mut() {
            assign(&mut **owner, relation, empty(relation))?;
        }
        return Ok(());
    }

    if let Some(err) = cx.err() {
        return Err(fetch.failed(err));
    }

    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!(
        "preload.fetch",
        relation = fetch.path,
        table = fetch.target.table_name(),
        keys = keys.len()
    )
    .entered();

    let unscoped = fetch.handler.map(|h| h.is_unscoped()).unwrap_or(false);
    let mut select = query::select_related(fetch.target, relation, keys, unscoped);
    if let Some(callback) = fetch.handler.and_then(|h| h.callback()) {
        callback(&mut select);
    }
    let (sql, values) = query::render(&select, dialect);
    log::debug!("preload {}: {}", fetch.path, sql);

    let rows = executor
        .query_all(cx, &sql, &values)
        .map_err(|e| fetch.failed(e))?;

    let mut matches: HashMap<KeyValue, Vec<Box<dyn Entity>>> = HashMap::new();
    for row in &rows {
        let (key, entity) = hydrate(fetch, row)?;
        if let Some(key) = key {
            matches.entry(key).or_default().push(entity);
        }
    }
    log::debug!(
        "preload {}: {} rows for {} owners",
        fetch.path,
        rows.len(),
        owners.len()
    );

    for (owner, key) in owners.iter_mut().zip(owner_keys) {
        let found = key.as_ref().and_then(|k| matches.get(k));
        let value = match found {
            None => empty(relation),
            Some(records) if relation.kind().is_to_one() => {
                FieldValue::One(records.first().cloned())
            }
            Some(records) => FieldValue::Many(records.clone()),
        };
        assign(&mut **owner, relation, value)?;
    }
    Ok(())
}
