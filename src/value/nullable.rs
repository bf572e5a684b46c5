use sea_query::Value;

use super::types::{is_null, ColumnKind, ColumnType, ScanError};

/// A value paired with a validity flag, for columns that may be null.
///
/// A `Nullable` with `valid == false` is zero regardless of `value`, so an
/// absent foreign key held in one is skipped by preloading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nullable<T> {
    pub valid: bool,
    pub value: T,
}

impl<T> Nullable<T> {
    pub fn new(value: T) -> Self {
        Self { valid: true, value }
    }

    pub fn into_option(self) -> Option<T> {
        self.valid.then_some(self.value)
    }

    pub fn as_option(&self) -> Option<&T> {
        self.valid.then_some(&self.value)
    }
}

impl<T: Default> Nullable<T> {
    pub fn null() -> Self {
        Self::default()
    }
}

impl<T: Default> From<Option<T>> for Nullable<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::new(value),
            None => Self::null(),
        }
    }
}

impl<T: ColumnType + Default> ColumnType for Nullable<T> {
    fn kind() -> ColumnKind {
        T::kind()
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self) -> Value {
        if self.valid {
            self.value.to_value()
        } else {
            T::null_value()
        }
    }

    fn null_value() -> Value {
        T::null_value()
    }

    fn scan(value: Value) -> Result<Self, ScanError> {
        if is_null(&value) {
            return Ok(Self::null());
        }
        T::scan(value).map(Self::new)
    }

    fn is_zero(&self) -> bool {
        !self.valid || self.value.is_zero()
    }
}
