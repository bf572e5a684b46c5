use std::fmt;

use sea_query::Value;

use super::types::integer_of;

/// A primary or foreign key value normalized for hashing.
///
/// Integer keys of any width compare equal once widened, and UUIDs compare
/// by their hyphenated string form, so a key read from an owner matches the
/// same key read back from a fetched row whatever variant the driver used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Int(i128),
    Str(String),
}

impl KeyValue {
    /// Normalize a value; `None` for nulls and non-key types.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(Some(s)) => Some(KeyValue::Str(s.clone())),
            Value::Char(Some(c)) => Some(KeyValue::Str(c.to_string())),
            Value::Uuid(Some(u)) => Some(KeyValue::Str(u.to_string())),
            other => integer_of(other).ok().map(KeyValue::Int),
        }
    }

    /// Zero keys (`0`, `""`, the nil UUID) mean "no reference".
    pub fn is_zero(&self) -> bool {
        match self {
            KeyValue::Int(i) => *i == 0,
            KeyValue::Str(s) => s.is_empty() || s == NIL_UUID,
        }
    }
}

const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(i) => write!(f, "{}", i),
            KeyValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}
