//! In-memory [`Executor`] for tests.
//!
//! `MockExecutor` records every statement it receives and answers the
//! selects the preloader renders from tables of [`Row`]s. It reads just
//! enough of the SQL to do so: the `FROM` table, the selected columns, one
//! `IN (...)` filter, an optional `INNER JOIN ... ON a = b`, `IS NULL`
//! filters and a single `ORDER BY` column. Anything else is ignored.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;
use regex::Regex;
use sea_query::{Value, Values};

use crate::context::Context;
use crate::executor::{ExecError, Executor, Row};
use crate::value::{is_null, KeyValue};

const IDENT: &str = r#"[`"](\w+)[`"]"#;

fn pattern(template: &str) -> Regex {
    match Regex::new(&template.replace("{id}", IDENT)) {
        Ok(regex) => regex,
        Err(err) => panic!("invalid statement pattern {template}: {err}"),
    }
}

static SELECT_LIST: Lazy<Regex> = Lazy::new(|| pattern(r"^SELECT (.*?) FROM "));
static SELECTED: Lazy<Regex> = Lazy::new(|| pattern(r"^{id}\.{id}(?: AS {id})?$"));
static FROM: Lazy<Regex> = Lazy::new(|| pattern(r" FROM {id}"));
static JOIN: Lazy<Regex> =
    Lazy::new(|| pattern(r"INNER JOIN {id} ON {id}\.{id} = {id}\.{id}"));
static IN: Lazy<Regex> = Lazy::new(|| pattern(r"{id}\.{id} IN \(([^)]*)\)"));
static IS_NULL: Lazy<Regex> = Lazy::new(|| pattern(r"{id}\.{id} IS NULL"));
static ORDER_BY: Lazy<Regex> =
    Lazy::new(|| pattern(r"ORDER BY (?:{id}\.)?{id} (ASC|DESC)"));
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| pattern(r"\$(\d+)|\?"));

/// A statement received by the mock.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub values: Values,
}

struct Failure {
    pattern: Option<Regex>,
    error: ExecError,
}

#[derive(Default)]
pub struct MockExecutor {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    statements: Mutex<Vec<Statement>>,
    failures: Mutex<Vec<Failure>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_table(self, table: &str, rows: impl IntoIterator<Item = Row>) -> Self {
        self.insert(table, rows);
        self
    }

    /// Append rows to a table. Column names are unqualified.
    pub fn insert(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// SQL of every statement, in order.
    pub fn queries(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }

    pub fn query_count(&self) -> usize {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn clear(&self) {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Fail the next statement.
    pub fn fail_next(&self, error: ExecError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Failure {
                pattern: None,
                error,
            });
    }

    /// Fail the first statement whose SQL matches `pattern`.
    pub fn fail_on(&self, pattern: &str, error: ExecError) -> Result<(), regex::Error> {
        let pattern = Regex::new(pattern)?;
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Failure {
                pattern: Some(pattern),
                error,
            });
        Ok(())
    }

    fn record(&self, cx: &Context, sql: &str, values: &Values) -> Result<(), ExecError> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Statement {
                sql: sql.to_string(),
                values: values.clone(),
            });

        if let Some(err) = cx.err() {
            return Err(err);
        }

        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let hit = failures.iter().position(|f| match &f.pattern {
            Some(pattern) => pattern.is_match(sql),
            None => true,
        });
        match hit {
            Some(i) => Err(failures.remove(i).error),
            None => Ok(()),
        }
    }

    fn select(&self, sql: &str, values: &Values) -> Result<Vec<Row>, ExecError> {
        let unsupported = || ExecError::QueryError(format!("mock cannot answer: {sql}"));
        let from = FROM
            .captures(sql)
            .map(|c| c[1].to_string())
            .ok_or_else(unsupported)?;

        let selected: Vec<(String, String, Option<String>)> = SELECT_LIST
            .captures(sql)
            .map(|c| c[1].to_string())
            .ok_or_else(unsupported)?
            .split(", ")
            .filter_map(|item| {
                SELECTED.captures(item).map(|c| {
                    (
                        c[1].to_string(),
                        c[2].to_string(),
                        c.get(3).map(|m| m.as_str().to_string()),
                    )
                })
            })
            .collect();

        let join = JOIN.captures(sql).map(|c| Join {
            table: c[1].to_string(),
            link_column: c[3].to_string(),
            target_column: c[5].to_string(),
        });

        let filter = IN.captures(sql).map(|c| {
            let offset = sql[..c.get(0).map_or(0, |m| m.start())].matches('?').count();
            let keys = PLACEHOLDER
                .captures_iter(&c[3])
                .enumerate()
                .filter_map(|(i, p)| {
                    let index = match p.get(1) {
                        Some(n) => n.as_str().parse::<usize>().ok()?.checked_sub(1)?,
                        None => offset + i,
                    };
                    values.0.get(index).and_then(KeyValue::from_value)
                })
                .collect::<Vec<_>>();
            (c[1].to_string(), c[2].to_string(), keys)
        });

        let nulls: Vec<(String, String)> = IS_NULL
            .captures_iter(sql)
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect();

        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let empty = Vec::new();

        // Pairs of (target row, link row) that survive the filters.
        let mut matched: Vec<(&Row, Option<&Row>)> = Vec::new();
        for row in tables.get(&from).unwrap_or(&empty) {
            match &join {
                Some(join) => {
                    let target_key = row.get(&join.target_column).and_then(KeyValue::from_value);
                    for link in tables.get(&join.table).unwrap_or(&empty) {
                        let link_key = link.get(&join.link_column).and_then(KeyValue::from_value);
                        if link_key.is_some() && link_key == target_key {
                            matched.push((row, Some(link)));
                        }
                    }
                }
                None => matched.push((row, None)),
            }
        }

        matched.retain(|pair| {
            let keep = match &filter {
                Some((table, column, keys)) => source(&from, table, pair)
                    .and_then(|r| r.get(column))
                    .and_then(KeyValue::from_value)
                    .map_or(false, |k| keys.contains(&k)),
                None => true,
            };
            keep && nulls.iter().all(|(table, column)| {
                source(&from, table, pair)
                    .and_then(|r| r.get(column))
                    .map_or(true, is_null)
            })
        });

        if let Some(order) = ORDER_BY.captures(sql) {
            let column = order[2].to_string();
            let descending = &order[3] == "DESC";
            matched.sort_by(|a, b| {
                let ordering = compare(a.0.get(&column), b.0.get(&column));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        Ok(matched
            .iter()
            .map(|pair| {
                selected
                    .iter()
                    .filter_map(|(table, column, alias)| {
                        let value = source(&from, table, pair)?.get(column)?.clone();
                        Some((alias.clone().unwrap_or_else(|| column.clone()), value))
                    })
                    .collect()
            })
            .collect())
    }
}

struct Join {
    table: String,
    link_column: String,
    target_column: String,
}

/// The row of `table` in a matched pair.
fn source<'r>(from: &str, table: &str, pair: &(&'r Row, Option<&'r Row>)) -> Option<&'r Row> {
    if table == from {
        Some(pair.0)
    } else {
        pair.1
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.and_then(KeyValue::from_value);
    let b = b.and_then(KeyValue::from_value);
    a.cmp(&b)
}

impl Executor for MockExecutor {
    fn execute(&self, cx: &Context, sql: &str, values: &Values) -> Result<u64, ExecError> {
        self.record(cx, sql, values)?;
        Ok(0)
    }

    fn query_all(&self, cx: &Context, sql: &str, values: &Values) -> Result<Vec<Row>, ExecError> {
        self.record(cx, sql, values)?;
        self.select(sql, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> MockExecutor {
        MockExecutor::new().with_table(
            "users",
            vec![
                Row::new().with("id", 7i64).with("name", "ada"),
                Row::new().with("id", 9i64).with("name", "bob"),
                Row::new().with("id", 11i64).with("name", "cy"),
            ],
        )
    }

    #[test]
    fn test_select_with_in_filter() {
        let mock = users();
        let rows = mock
            .query_all(
                &Context::background(),
                r#"SELECT "users"."id", "users"."name" FROM "users" WHERE "users"."id" IN ($1, $2)"#,
                &Values(vec![Value::from(9i64), Value::from(7i32)]),
            )
            .expect("answered");
        let names: Vec<_> = rows.iter().filter_map(|r| r.get("name").cloned()).collect();
        assert_eq!(
            names,
            vec![Value::from("ada".to_string()), Value::from("bob".to_string())]
        );
        assert_eq!(mock.query_count(), 1);
    }

    #[test]
    fn test_order_by_desc() {
        let mock = users();
        let rows = mock
            .query_all(
                &Context::background(),
                r#"SELECT "users"."id" FROM "users" WHERE "users"."id" IN (?, ?, ?) ORDER BY "users"."id" DESC"#,
                &Values(vec![Value::from(7i64), Value::from(9i64), Value::from(11i64)]),
            )
            .expect("answered");
        let ids: Vec<_> = rows.iter().filter_map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Value::from(11i64), Value::from(9i64), Value::from(7i64)]);
    }

    #[test]
    fn test_injected_failures() {
        let mock = users();
        mock.fail_on("FROM \"posts\"", ExecError::QueryError("boom".to_string()))
            .expect("valid pattern");
        let cx = Context::background();
        let sql = r#"SELECT "users"."id" FROM "users" WHERE "users"."id" IN ($1)"#;
        assert!(mock.query_all(&cx, sql, &Values(vec![Value::from(7i64)])).is_ok());

        mock.fail_next(ExecError::Other("down".to_string()));
        assert!(matches!(
            mock.query_all(&cx, sql, &Values(vec![Value::from(7i64)])),
            Err(ExecError::Other(_))
        ));

        cx.cancel();
        assert!(matches!(
            mock.query_all(&cx, sql, &Values(vec![Value::from(7i64)])),
            Err(ExecError::Cancelled)
        ));
        assert_eq!(mock.query_count(), 3);
    }
}
