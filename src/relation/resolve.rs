//! Relation kind inference from foreign keys.

use super::def::{KeyRef, Relation, RelationKind, Through};
use crate::error::{Error, Result};
use crate::model::{FieldShape, TargetRef};
use crate::schema::builder::{Association, Keys};
use crate::schema::ForeignKey;

fn matches_hint(fk: &ForeignKey, hint: Option<&str>) -> bool {
    match hint {
        Some(hint) => fk.name() == hint || fk.column_name() == hint,
        None => true,
    }
}

fn pointing_at<'a>(
    from: &Keys<'a>,
    to: &Keys<'_>,
    hint: Option<&str>,
) -> impl Iterator<Item = &'a ForeignKey> + 'a {
    let table = to.table_name;
    let model = to.model_name;
    let hint = hint.map(str::to_string);
    from.foreign_keys
        .iter()
        .filter(move |fk| fk.references(table, model) && matches_hint(fk, hint.as_deref()))
}

/// Infer the relation declared by `association` on `owner`.
pub(crate) fn resolve(
    owner: Keys<'_>,
    association: &Association,
    target_ref: TargetRef,
    target: Keys<'_>,
    through: Option<(TargetRef, Keys<'_>)>,
) -> Result<Relation> {
    let hint = association.hint.as_deref();
    let unresolvable = || Error::UnresolvableReference {
        model: owner.model_name.to_string(),
        field: association.name.to_string(),
        target: target.model_name.to_string(),
    };

    let (kind, source, reference, through) = match (&association.shape, through) {
        (FieldShape::One(_), _) => {
            if let Some(local) = pointing_at(&owner, &target, hint).next() {
                (
                    RelationKind::ManyToOne,
                    KeyRef::from(local),
                    KeyRef::from(target.primary_key),
                    None,
                )
            } else if let Some(remote) = pointing_at(&target, &owner, hint).next() {
                (
                    RelationKind::OneToOne,
                    KeyRef::from(owner.primary_key),
                    KeyRef::from(remote),
                    None,
                )
            } else {
                return Err(unresolvable());
            }
        }
        (FieldShape::Many { .. }, Some((join_ref, join))) => {
            let owner_fk = pointing_at(&join, &owner, hint)
                .next()
                .ok_or_else(unresolvable)?;
            let target_fk = pointing_at(&join, &target, None)
                .find(|fk| fk.name() != owner_fk.name())
                .ok_or_else(unresolvable)?;
            (
                RelationKind::ManyToMany,
                KeyRef::from(owner.primary_key),
                KeyRef::from(target.primary_key),
                Some(Through {
                    model: join_ref,
                    table: join.table_name,
                    owner_column: owner_fk.column_name().to_string(),
                    target_column: target_fk.column_name().to_string(),
                }),
            )
        }
        (FieldShape::Many { .. }, None) => {
            let remote = pointing_at(&target, &owner, hint)
                .next()
                .ok_or_else(unresolvable)?;
            (
                RelationKind::OneToMany,
                KeyRef::from(owner.primary_key),
                KeyRef::from(remote),
                None,
            )
        }
        _ => return Err(unresolvable()),
    };

    if source.key_type() != reference.key_type() {
        return Err(Error::InvalidAssociation {
            model: owner.model_name.to_string(),
            field: association.name.to_string(),
            reason: format!(
                "{} key {} cannot match {} key {}",
                source.key_type(),
                source.column(),
                reference.key_type(),
                reference.column()
            ),
        });
    }

    Ok(Relation {
        name: association.name,
        field_index: association.index,
        kind,
        owner_model: owner.model_name,
        owner_table: owner.table_name,
        source,
        reference,
        target: target_ref,
        through,
    })
}
