//! `ColumnType`: conversions between Rust column types and `sea_query::Value`.
//!
//! Reading a value into a field goes through [`ColumnType::scan`], which
//! accepts every representation a driver may reasonably hand back for the
//! type (any integer width, a string-encoded UUID, integers for booleans on
//! SQLite) and reports a [`ScanError`] otherwise.

use std::fmt;

use sea_query::Value;

/// Broad category of a column type, fixed per Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Integer,
    Unsigned,
    Float,
    Bool,
    String,
    Bytes,
    Json,
    Uuid,
    DateTime,
}

impl ColumnKind {
    pub fn is_integer(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Unsigned)
    }

    pub fn is_string_like(self) -> bool {
        matches!(self, ColumnKind::String | ColumnKind::Uuid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Unsigned => "unsigned",
            ColumnKind::Float => "float",
            ColumnKind::Bool => "bool",
            ColumnKind::String => "string",
            ColumnKind::Bytes => "bytes",
            ColumnKind::Json => "json",
            ColumnKind::Uuid => "uuid",
            ColumnKind::DateTime => "datetime",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for value scanning failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// A null was scanned into a non-nullable type
    Null { expected: &'static str },
    /// The value type doesn't match the expected type
    Mismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// Value conversion failed (overflow, invalid format)
    Conversion(String),
}

impl ScanError {
    fn mismatch(expected: &'static str, actual: &Value) -> Self {
        ScanError::Mismatch {
            expected,
            actual: value_type_name(actual),
        }
    }

    pub fn expected(&self) -> &str {
        match self {
            ScanError::Null { expected } | ScanError::Mismatch { expected, .. } => expected,
            ScanError::Conversion(_) => "convertible value",
        }
    }

    pub fn actual(&self) -> String {
        match self {
            ScanError::Null { .. } => "null".to_string(),
            ScanError::Mismatch { actual, .. } => actual.to_string(),
            ScanError::Conversion(msg) => msg.clone(),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Null { expected } => write!(f, "cannot scan null into {}", expected),
            ScanError::Mismatch { expected, actual } => {
                write!(f, "Type mismatch: expected {}, got {}", expected, actual)
            }
            ScanError::Conversion(msg) => write!(f, "Conversion error: {}", msg),
        }
    }
}

impl std::error::Error for ScanError {}

/// A Rust type that can be stored in a mapped column.
pub trait ColumnType: Clone + fmt::Debug + Send + Sync + 'static {
    fn kind() -> ColumnKind;

    /// Whether the type can hold a null.
    fn nullable() -> bool {
        false
    }

    fn to_value(&self) -> Value;

    /// The null of the `Value` variant this type maps to.
    fn null_value() -> Value;

    /// Read a value, coercing compatible representations.
    fn scan(value: Value) -> Result<Self, ScanError>;

    /// Whether this is the zero (absent) value of the type.
    fn is_zero(&self) -> bool;
}

/// Returns true for the null of every `Value` variant.
pub fn is_null(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::String(None)
            | Value::Char(None)
            | Value::Bytes(None)
            | Value::Json(None)
            | Value::Uuid(None)
            | Value::ChronoDate(None)
            | Value::ChronoTime(None)
            | Value::ChronoDateTime(None)
            | Value::ChronoDateTimeUtc(None)
            | Value::ChronoDateTimeLocal(None)
            | Value::ChronoDateTimeWithTimeZone(None)
    )
}

/// Zero check on a raw value: null, numeric zero, empty string or bytes, false.
pub fn is_zero_value(value: &Value) -> bool {
    if is_null(value) {
        return true;
    }
    match value {
        Value::Bool(Some(b)) => !*b,
        Value::Float(Some(f)) => *f == 0.0,
        Value::Double(Some(f)) => *f == 0.0,
        Value::String(Some(s)) => s.is_empty(),
        Value::Bytes(Some(b)) => b.is_empty(),
        Value::Uuid(Some(u)) => u.is_nil(),
        _ => integer_of(value).is_ok_and(|i| i == 0),
    }
}

pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "bool",
        Value::TinyInt(_) => "i8",
        Value::SmallInt(_) => "i16",
        Value::Int(_) => "i32",
        Value::BigInt(_) => "i64",
        Value::TinyUnsigned(_) => "u8",
        Value::SmallUnsigned(_) => "u16",
        Value::Unsigned(_) => "u32",
        Value::BigUnsigned(_) => "u64",
        Value::Float(_) => "f32",
        Value::Double(_) => "f64",
        Value::String(_) => "string",
        Value::Char(_) => "char",
        Value::Bytes(_) => "bytes",
        Value::Json(_) => "json",
        Value::Uuid(_) => "uuid",
        Value::ChronoDateTime(_) => "datetime",
        Value::ChronoDateTimeUtc(_) => "datetime_utc",
        _ => "other",
    }
}

/// Widen any integer variant.
pub(crate) fn integer_of(value: &Value) -> Result<i128, ScanError> {
    match value {
        Value::TinyInt(Some(v)) => Ok(i128::from(*v)),
        Value::SmallInt(Some(v)) => Ok(i128::from(*v)),
        Value::Int(Some(v)) => Ok(i128::from(*v)),
        Value::BigInt(Some(v)) => Ok(i128::from(*v)),
        Value::TinyUnsigned(Some(v)) => Ok(i128::from(*v)),
        Value::SmallUnsigned(Some(v)) => Ok(i128::from(*v)),
        Value::Unsigned(Some(v)) => Ok(i128::from(*v)),
        Value::BigUnsigned(Some(v)) => Ok(i128::from(*v)),
        v if is_null(v) => Err(ScanError::Null { expected: "integer" }),
        other => Err(ScanError::mismatch("integer", other)),
    }
}

macro_rules! integer_column {
    ($($ty:ty => $variant:ident, $kind:expr;)*) => {
        $(
            impl ColumnType for $ty {
                fn kind() -> ColumnKind {
                    $kind
                }

                fn to_value(&self) -> Value {
                    Value::$variant(Some(*self))
                }

                fn null_value() -> Value {
                    Value::$variant(None)
                }

                fn scan(value: Value) -> Result<Self, ScanError> {
                    let wide = integer_of(&value).map_err(|e| match e {
                        ScanError::Null { .. } => ScanError::Null { expected: stringify!($ty) },
                        ScanError::Mismatch { actual, .. } => ScanError::Mismatch {
                            expected: stringify!($ty),
                            actual,
                        },
                        other => other,
                    })?;
                    <$ty>::try_from(wide).map_err(|_| {
                        ScanError::Conversion(format!("{} overflows {}", wide, stringify!($ty)))
                    })
                }

                fn is_zero(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

integer_column! {
    i8 => TinyInt, ColumnKind::Integer;
    i16 => SmallInt, ColumnKind::Integer;
    i32 => Int, ColumnKind::Integer;
    i64 => BigInt, ColumnKind::Integer;
    u8 => TinyUnsigned, ColumnKind::Unsigned;
    u16 => SmallUnsigned, ColumnKind::Unsigned;
    u32 => Unsigned, ColumnKind::Unsigned;
    u64 => BigUnsigned, ColumnKind::Unsigned;
}

impl ColumnType for f64 {
    fn kind() -> ColumnKind {
        ColumnKind::Float
    }

    fn to_value(&self) -> Value {
        Value::Double(Some(*self))
    }

    fn null_value() -> Value {
        Value::Double(None)
    }

    fn scan(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Double(Some(v)) => Ok(v),
            Value::Float(Some(v)) => Ok(f64::from(v)),
            other => match integer_of(&other) {
                Ok(i) => Ok(i as f64),
                Err(ScanError::Null { .. }) => Err(ScanError::Null { expected: "f64" }),
                Err(_) => Err(ScanError::mismatch("f64", &other)),
            },
        }
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl ColumnType for f32 {
    fn kind() -> ColumnKind {
        ColumnKind::Float
    }

    fn to_value(&self) -> Value {
        Value::Float(Some(*self))
    }

    fn null_value() -> Value {
        Value::Float(None)
    }

    fn scan(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Float(Some(v)) => Ok(v),
            Value::Double(Some(v)) => Ok(v as f32),
            other => match integer_of(&other) {
                Ok(i) => Ok(i as f32),
                Err(ScanError::Null { .. }) => Err(ScanError::Null { expected: "f32" }),
                Err(_) => Err(ScanError::mismatch("f32", &other)),
            },
        }
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl ColumnType for bool {
    fn kind() -> ColumnKind {
        ColumnKind::Bool
    }

    fn to_value(&self) -> Value {
        Value::Bool(Some(*self))
    }

    fn null_value() -> Value {
        Value::Bool(None)
    }

    fn scan(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Bool(Some(v)) => Ok(v),
            other => match integer_of(&other) {
                Ok(0) => Ok(false),
                Ok(1) => Ok(true),
                Ok(i) => Err(ScanError::Conversion(format!("{} is not a bool", i))),
                Err(ScanError::Null { .. }) => Err(ScanError::Null { expected: "bool" }),
                Err(_) => Err(ScanError::mismatch("bool", &other)),
            },
        }
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl ColumnType for String {
    fn kind() -> ColumnKind {
        ColumnKind::String
    }

    fn to_value(&self) -> Value {
        Value::String(Some(self.clone()))
    }

    fn null_value() -> Value {
        Value::String(None)
    }

    fn scan(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::String(Some(v)) => Ok(v),
            Value::Char(Some(c)) => Ok(c.to_string()),
            Value::Uuid(Some(u)) => Ok(u.to_string()),
            v if is_null(&v) => Err(ScanError::Null { expected: "String" }),
            other => Err(ScanError::mismatch("String", &other)),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl ColumnType for Vec<u8> {
    fn kind() -> ColumnKind {
        ColumnKind::Bytes
    }

    fn to_value(&self) -> Value {
        Value::Bytes(Some(self.clone()))
    }

    fn null_value() -> Value {
        Value::Bytes(None)
    }

    fn scan(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Bytes(Some(v)) => Ok(v),
            Value::String(Some(s)) => Ok(s.into_bytes()),
            v if is_null(&v) => Err(ScanError::Null { expected: "Vec<u8>" }),
            other => Err(ScanError::mismatch("Vec<u8>", &other)),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl ColumnType for serde_json::Value {
    fn kind() -> ColumnKind {
        ColumnKind::Json
    }

    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }

    fn null_value() -> Value {
        Value::Json(None)
    }

    fn scan(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Json(Some(j)) => Ok(serde_json::Value::clone(&j)),
            Value::String(Some(s)) => {
                serde_json::from_str(&s).map_err(|e| ScanError::Conversion(e.to_string()))
            }
            v if is_null(&v) => Err(ScanError::Null { expected: "json" }),
            other => Err(ScanError::mismatch("json", &other)),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_null()
    }
}

impl ColumnType for uuid::Uuid {
    fn kind() -> ColumnKind {
        ColumnKind::Uuid
    }

    fn to_value(&self) -> Value {
        Value::from(*self)
    }

    fn null_value() -> Value {
        Value::Uuid(None)
    }

    fn scan(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Uuid(Some(u)) => Ok(uuid::Uuid::clone(&u)),
            Value::String(Some(s)) => {
                uuid::Uuid::parse_str(&s).map_err(|e| ScanError::Conversion(e.to_string()))
            }
            Value::Bytes(Some(b)) => {
                uuid::Uuid::from_slice(&b).map_err(|e| ScanError::Conversion(e.to_string()))
            }
            v if is_null(&v) => Err(ScanError::Null { expected: "uuid" }),
            other => Err(ScanError::mismatch("uuid", &other)),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_nil()
    }
}

impl ColumnType for chrono::NaiveDateTime {
    fn kind() -> ColumnKind {
        ColumnKind::DateTime
    }

    fn to_value(&self) -> Value {
        Value::from(*self)
    }

    fn null_value() -> Value {
        Value::ChronoDateTime(None)
    }

    fn scan(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::ChronoDateTime(Some(d)) => Ok(chrono::NaiveDateTime::clone(&d)),
            Value::ChronoDateTimeUtc(Some(d)) => Ok(d.naive_utc()),
            Value::String(Some(s)) => {
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f")
                    .map_err(|e| ScanError::Conversion(e.to_string()))
            }
            v if is_null(&v) => Err(ScanError::Null { expected: "datetime" }),
            other => Err(ScanError::mismatch("datetime", &other)),
        }
    }

    fn is_zero(&self) -> bool {
        *self == chrono::NaiveDateTime::default()
    }
}

impl ColumnType for chrono::DateTime<chrono::Utc> {
    fn kind() -> ColumnKind {
        ColumnKind::DateTime
    }

    fn to_value(&self) -> Value {
        Value::from(*self)
    }

    fn null_value() -> Value {
        Value::ChronoDateTimeUtc(None)
    }

    fn scan(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::ChronoDateTimeUtc(Some(d)) => Ok(chrono::DateTime::<chrono::Utc>::clone(&d)),
            Value::ChronoDateTime(Some(d)) => Ok(d.and_utc()),
            Value::String(Some(s)) => chrono::DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&chrono::Utc))
                .map_err(|e| ScanError::Conversion(e.to_string())),
            v if is_null(&v) => Err(ScanError::Null { expected: "datetime" }),
            other => Err(ScanError::mismatch("datetime", &other)),
        }
    }

    fn is_zero(&self) -> bool {
        *self == chrono::DateTime::<chrono::Utc>::default()
    }
}

impl<T: ColumnType> ColumnType for Option<T> {
    fn kind() -> ColumnKind {
        T::kind()
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => T::null_value(),
        }
    }

    fn null_value() -> Value {
        T::null_value()
    }

    fn scan(value: Value) -> Result<Self, ScanError> {
        if is_null(&value) {
            return Ok(None);
        }
        T::scan(value).map(Some)
    }

    fn is_zero(&self) -> bool {
        self.as_ref().map_or(true, ColumnType::is_zero)
    }
}
