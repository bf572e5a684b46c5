//! Query execution boundary.
//!
//! The mapping core builds statements with `sea-query` and hands the rendered
//! SQL plus bound [`Values`] to an [`Executor`]. Drivers (a pooled connection,
//! a transaction, a test double) implement the trait; the core never talks to
//! a database directly.

use std::fmt;

use sea_query::{Value, Values};

use crate::context::Context;

/// Executor error type
#[derive(Debug)]
pub enum ExecError {
    /// The context was cancelled before or during execution
    Cancelled,
    /// The context deadline passed before or during execution
    DeadlineExceeded,
    /// `query_one` found no row
    NoRows,
    /// Query execution error reported by the driver
    QueryError(String),
    /// Row parsing/conversion error
    ParseError(String),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Cancelled => write!(f, "Execution cancelled"),
            ExecError::DeadlineExceeded => write!(f, "Execution deadline exceeded"),
            ExecError::NoRows => write!(f, "Query returned no rows"),
            ExecError::QueryError(s) => write!(f, "Query error: {s}"),
            ExecError::ParseError(s) => write!(f, "Parse error: {s}"),
            ExecError::Other(s) => write!(f, "Execution error: {s}"),
        }
    }
}

impl std::error::Error for ExecError {}

/// One result row: column names paired with their values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column to the row.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.push(column.into());
        self.values.push(value.into());
    }

    /// Look a value up by column name.
    ///
    /// A qualified name (`users.id`) matches a bare column (`id`) and the other
    /// way around, since drivers disagree on which one they report.
    pub fn get(&self, column: &str) -> Option<&Value> {
        let wanted = unqualified(column);
        self.columns
            .iter()
            .position(|c| c == column || unqualified(c) == wanted)
            .map(|i| &self.values[i])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl<C: Into<String>, V: Into<Value>> FromIterator<(C, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (C, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.push(column, value);
        }
        row
    }
}

fn unqualified(column: &str) -> &str {
    match column.rfind('.') {
        Some(i) => &column[i + 1..],
        None => column,
    }
}

/// Trait for executing database operations
///
/// This trait abstracts database execution, allowing different implementations
/// (direct client, pooled connection, transaction, test double) to be used
/// interchangeably. Every call receives the caller's [`Context`]; implementations
/// should check it and return [`ExecError::Cancelled`] or
/// [`ExecError::DeadlineExceeded`] instead of running the statement.
pub trait Executor {
    /// Execute a SQL statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `ExecError` if the statement fails or the context is done.
    fn execute(&self, cx: &Context, sql: &str, values: &Values) -> Result<u64, ExecError>;

    /// Execute a query and return a single row
    ///
    /// # Errors
    ///
    /// Returns `ExecError::NoRows` when the query matched nothing.
    fn query_one(&self, cx: &Context, sql: &str, values: &Values) -> Result<Row, ExecError> {
        self.query_all(cx, sql, values)?
            .into_iter()
            .next()
            .ok_or(ExecError::NoRows)
    }

    /// Execute a query and return every row
    ///
    /// An empty result is `Ok(vec![])`, never an error.
    fn query_all(&self, cx: &Context, sql: &str, values: &Values) -> Result<Vec<Row>, ExecError>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, cx: &Context, sql: &str, values: &Values) -> Result<u64, ExecError> {
        (**self).execute(cx, sql, values)
    }

    fn query_one(&self, cx: &Context, sql: &str, values: &Values) -> Result<Row, ExecError> {
        (**self).query_one(cx, sql, values)
    }

    fn query_all(&self, cx: &Context, sql: &str, values: &Values) -> Result<Vec<Row>, ExecError> {
        (**self).query_all(cx, sql, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_error_display() {
        assert_eq!(ExecError::Cancelled.to_string(), "Execution cancelled");
        assert_eq!(
            ExecError::QueryError("boom".to_string()).to_string(),
            "Query error: boom"
        );
    }

    #[test]
    fn test_row_lookup_by_qualified_and_bare_name() {
        let row = Row::new()
            .with("id", 7i64)
            .with("users.username", "ada".to_string());

        assert_eq!(row.get("id"), Some(&Value::BigInt(Some(7))));
        assert_eq!(row.get("users.id"), Some(&Value::BigInt(Some(7))));
        assert_eq!(
            row.get("username"),
            Some(&Value::String(Some("ada".to_string())))
        );
        assert!(row.get("email").is_none());
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_row_from_iterator() {
        let row: Row = vec![("a", 1i32), ("b", 2i32)].into_iter().collect();
        assert_eq!(row.columns(), &["a".to_string(), "b".to_string()]);
        let pairs: Vec<_> = row.iter().map(|(c, _)| c.to_string()).collect();
        assert_eq!(pairs, vec!["a", "b"]);
    }

    struct Empty;

    impl Executor for Empty {
        fn execute(&self, _: &Context, _: &str, _: &Values) -> Result<u64, ExecError> {
            Ok(0)
        }

        fn query_all(&self, _: &Context, _: &str, _: &Values) -> Result<Vec<Row>, ExecError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_query_one_without_rows() {
        let cx = Context::background();
        let result = Empty.query_one(&cx, "SELECT 1", &Values(vec![]));
        assert!(matches!(result, Err(ExecError::NoRows)));
    }
}
