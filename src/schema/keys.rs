use std::fmt;

use once_cell::sync::Lazy;
use sea_query::Value;

use super::field::Field;
use crate::value::ColumnKind;

/// Key families that can link two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Integer,
    String,
}

impl KeyType {
    pub(crate) fn of(kind: ColumnKind) -> Option<Self> {
        if kind.is_integer() {
            Some(KeyType::Integer)
        } else if kind.is_string_like() {
            Some(KeyType::String)
        } else {
            None
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Integer => f.write_str("integer"),
            KeyType::String => f.write_str("string"),
        }
    }
}

/// How primary key values are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// The database assigns the key (serial, identity, default expression).
    #[default]
    Database,
    /// A ULID is generated client-side.
    Ulid,
    /// A time-based UUID is generated client-side.
    UuidV1,
    /// A random UUID is generated client-side.
    UuidV4,
}

impl KeyStrategy {
    /// Strategy named by a `pk` tag value; `None` for unknown names.
    pub fn from_tag(value: &str) -> Option<Self> {
        match value {
            "" | crate::tags::TRUE | "db" => Some(KeyStrategy::Database),
            "ulid" => Some(KeyStrategy::Ulid),
            "uuid-v1" => Some(KeyStrategy::UuidV1),
            "uuid-v4" | "uuid" => Some(KeyStrategy::UuidV4),
            _ => None,
        }
    }
}

// Random node id with the multicast bit set, so it never collides with a MAC.
static NODE_ID: Lazy<[u8; 6]> = Lazy::new(|| {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    [bytes[10] | 0x01, bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]]
});

#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey {
    pub(crate) field: Field,
    pub(crate) key_type: KeyType,
    pub(crate) strategy: KeyStrategy,
}

impl PrimaryKey {
    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn name(&self) -> &'static str {
        self.field.name()
    }

    pub fn column_name(&self) -> &str {
        self.field.column_name()
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    /// A fresh client-side key, or `None` when the database assigns it.
    pub fn generate(&self) -> Option<Value> {
        match self.strategy {
            KeyStrategy::Database => None,
            KeyStrategy::Ulid => {
                let id = ulid::Ulid::new();
                Some(match self.field.kind() {
                    ColumnKind::Uuid => Value::from(uuid::Uuid::from_u128(id.0)),
                    _ => Value::String(Some(id.to_string())),
                })
            }
            KeyStrategy::UuidV1 => Some(self.uuid_value(uuid::Uuid::now_v1(&NODE_ID))),
            KeyStrategy::UuidV4 => Some(self.uuid_value(uuid::Uuid::new_v4())),
        }
    }

    fn uuid_value(&self, id: uuid::Uuid) -> Value {
        match self.field.kind() {
            ColumnKind::Uuid => Value::from(id),
            _ => Value::String(Some(id.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub(crate) field: Field,
    pub(crate) reference: String,
    pub(crate) key_type: KeyType,
}

impl ForeignKey {
    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn name(&self) -> &'static str {
        self.field.name()
    }

    pub fn column_name(&self) -> &str {
        self.field.column_name()
    }

    /// Referenced table (or model) name, as tagged.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Whether the key may be null.
    pub fn is_optional(&self) -> bool {
        self.field.is_nullable()
    }

    pub(crate) fn references(&self, table_name: &str, model_name: &str) -> bool {
        self.reference == table_name || self.reference == model_name
    }
}
