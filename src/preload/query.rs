//! Select statements for relation fetches.

use sea_query::{
    DynIden, Expr, ExprTrait, MysqlQueryBuilder, PostgresQueryBuilder, Query, SelectStatement,
    SqliteQueryBuilder, Value, Values,
};

use crate::config::Dialect;
use crate::relation::Relation;
use crate::schema::Schema;

/// Result column carrying the owner key of a many-to-many row.
pub(crate) const OWNER_KEY_ALIAS: &str = "__lifeline_owner_key";

fn iden(name: &str) -> DynIden {
    DynIden::from(name.to_string())
}

fn column(table: &str, column: &str) -> Expr {
    Expr::col((iden(table), iden(column)))
}

/// Select every mapped column of `target` whose key matches one of `keys`.
///
/// Direct relations filter on the target's reference column. Many-to-many
/// relations join the link table and select its owner column under
/// [`OWNER_KEY_ALIAS`]. Soft-deleted targets are filtered out unless
/// `unscoped` is set.
pub(crate) fn select_related(
    target: &Schema,
    relation: &Relation,
    keys: Vec<Value>,
    unscoped: bool,
) -> SelectStatement {
    let table = target.table_name();
    let mut select = Query::select();
    for name in target.columns() {
        select.column((iden(table), iden(name)));
    }
    select.from(iden(table));

    match relation.through() {
        Some(through) => {
            select
                .expr_as(
                    column(through.table(), through.owner_column()),
                    iden(OWNER_KEY_ALIAS),
                )
                .inner_join(
                    iden(through.table()),
                    column(through.table(), through.target_column())
                        .equals((iden(table), iden(relation.reference().column()))),
                )
                .and_where(column(through.table(), through.owner_column()).is_in(keys));
        }
        None => {
            select.and_where(column(table, relation.reference().column()).is_in(keys));
        }
    }

    if !unscoped {
        if let Some(deleted) = target.deleted_key() {
            select.and_where(column(table, deleted.column_name()).is_null());
        }
    }

    select
}

pub(crate) fn render(select: &SelectStatement, dialect: Dialect) -> (String, Values) {
    match dialect {
        Dialect::Postgres => select.build(PostgresQueryBuilder),
        Dialect::Mysql => select.build(MysqlQueryBuilder),
        Dialect::Sqlite => select.build(SqliteQueryBuilder),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::Account;
    use crate::schema::Registry;

    #[test]
    fn test_one_to_many_select() {
        let registry = Registry::new();
        let schema = registry.schema::<Account>().expect("valid model");
        let relation = schema.relation("reports").expect("inferred");
        let select = select_related(
            &schema,
            relation,
            vec![Value::from(1i64), Value::from(2i64)],
            false,
        );
        let (sql, values) = render(&select, Dialect::Postgres);
        assert_eq!(
            sql,
            r#"SELECT "accounts"."id", "accounts"."name", "accounts"."nickname", "accounts"."manager_id" FROM "accounts" WHERE "accounts"."manager_id" IN ($1, $2)"#
        );
        assert_eq!(values.0.len(), 2);
    }

    #[test]
    fn test_dialects_quote_differently() {
        let registry = Registry::new();
        let schema = registry.schema::<Account>().expect("valid model");
        let relation = schema.relation("mentor").expect("inferred");
        let select = select_related(&schema, relation, vec![Value::from(5i64)], true);
        let (mysql, _) = render(&select, Dialect::Mysql);
        assert!(mysql.contains("`accounts`.`id` IN (?)"));
        let (sqlite, _) = render(&select, Dialect::Sqlite);
        assert!(sqlite.contains(r#""accounts"."id" IN (?)"#));
    }
}
