//! Error types returned by schema building, field access and preloading.

use std::fmt;

use crate::executor::ExecError;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the mapping core.
///
/// Every variant carries the model, field or path it was raised for so the
/// caller can tell which declaration or preload handler needs fixing.
#[derive(Debug)]
pub enum Error {
    /// The model descriptor declares no field with this name (or index).
    FieldNotFound { model: String, field: String },
    /// A value could not be stored in, or read from, the destination field.
    TypeMismatch {
        model: String,
        field: String,
        expected: String,
        actual: String,
    },
    /// No field is tagged `pk` and none matches the implicit primary key column.
    MissingPrimaryKey { model: String },
    /// More than one field is tagged `pk`.
    DuplicatePrimaryKey {
        model: String,
        first: String,
        second: String,
    },
    /// The primary key is neither integer-like nor string-like, or is nullable.
    InvalidPrimaryKeyType {
        model: String,
        field: String,
        kind: String,
    },
    /// A foreign key is neither integer-like nor string-like.
    InvalidForeignKeyType {
        model: String,
        field: String,
        kind: String,
    },
    /// An association field is declared in a way that cannot be mapped.
    InvalidAssociation {
        model: String,
        field: String,
        reason: String,
    },
    /// A foreign key or association points at a target with no usable key.
    UnresolvableReference {
        model: String,
        field: String,
        target: String,
    },
    /// A preload path segment does not name a relation on the model reached so far.
    InvalidRelationPath {
        path: String,
        segment: String,
        model: String,
    },
    /// The executor failed while fetching a relation.
    QueryFailed { relation: String, source: ExecError },
}

impl Error {
    pub(crate) fn field_not_found(model: impl Into<String>, field: impl Into<String>) -> Self {
        Error::FieldNotFound {
            model: model.into(),
            field: field.into(),
        }
    }

    pub(crate) fn type_mismatch(
        model: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Error::TypeMismatch {
            model: model.into(),
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns true when the error came from a cancelled or expired context.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Error::QueryFailed {
                source: ExecError::Cancelled | ExecError::DeadlineExceeded,
                ..
            }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FieldNotFound { model, field } => {
                write!(f, "field not found: {}.{}", model, field)
            }
            Error::TypeMismatch {
                model,
                field,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch on {}.{}: expected {}, got {}",
                model, field, expected, actual
            ),
            Error::MissingPrimaryKey { model } => {
                write!(f, "model {} has no primary key", model)
            }
            Error::DuplicatePrimaryKey {
                model,
                first,
                second,
            } => write!(
                f,
                "model {} declares more than one primary key: {} and {}",
                model, first, second
            ),
            Error::InvalidPrimaryKeyType { model, field, kind } => write!(
                f,
                "primary key {}.{} has unsupported type {}",
                model, field, kind
            ),
            Error::InvalidForeignKeyType { model, field, kind } => write!(
                f,
                "foreign key {}.{} has unsupported type {}",
                model, field, kind
            ),
            Error::InvalidAssociation {
                model,
                field,
                reason,
            } => write!(f, "invalid association {}.{}: {}", model, field, reason),
            Error::UnresolvableReference {
                model,
                field,
                target,
            } => {
                if target.is_empty() {
                    write!(f, "cannot resolve reference of {}.{}", model, field)
                } else {
                    write!(
                        f,
                        "cannot resolve reference of {}.{} to {}",
                        model, field, target
                    )
                }
            }
            Error::InvalidRelationPath {
                path,
                segment,
                model,
            } => write!(
                f,
                "invalid relation path {:?}: {} has no relation {:?}",
                path, model, segment
            ),
            Error::QueryFailed { relation, source } => {
                write!(f, "failed to preload {}: {}", relation, source)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::QueryFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
