//! SQL statement rendering
//!
//! Pure functions turning a table name, column/value pairs and a predicate
//! into a parameterized [`Statement`]. Identifiers are interpolated as given;
//! values always travel as bind parameters.

use indexmap::IndexMap;

use crate::catalog::DbTable;
use crate::dialect::Dialect;
use crate::driver::Statement;
use crate::query::{order_by_sql, ColumnOrder, Predicate};
use crate::row::Value;

/// `CREATE TABLE name (col type [NOT NULL], ... [, PRIMARY KEY (k, ...)])`
pub fn create_table(dialect: &dyn Dialect, table: &DbTable) -> Statement {
    let mut clauses: Vec<String> = table
        .columns()
        .iter()
        .map(|c| dialect.column_ddl(c))
        .collect();
    if !table.primary_key().is_empty() {
        clauses.push(format!("PRIMARY KEY ({})", table.primary_key().join(", ")));
    }
    Statement::new(
        format!("CREATE TABLE {} ({})", table.name(), clauses.join(", ")),
        Vec::new(),
    )
}

/// `INSERT INTO t (a, b) VALUES (?, ?)`
pub fn insert(table: &str, values: &IndexMap<String, Value>) -> Statement {
    if values.is_empty() {
        return Statement::new(format!("INSERT INTO {} DEFAULT VALUES", table), Vec::new());
    }
    let columns = values.keys().cloned().collect::<Vec<_>>().join(", ");
    let placeholders = vec!["?"; values.len()].join(", ");
    Statement::new(
        format!("INSERT INTO {} ({}) VALUES ({})", table, columns, placeholders),
        values.values().cloned().collect(),
    )
}

/// `UPDATE t SET a = ?, b = ? <where>`; SET values bind before the predicate's
pub fn update(table: &str, values: &IndexMap<String, Value>, predicate: &Predicate) -> Statement {
    let assignments = values
        .keys()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ");
    let params = values
        .values()
        .cloned()
        .chain(predicate.constants().into_iter().cloned())
        .collect();
    Statement::new(
        format!("UPDATE {} SET {}{}", table, assignments, predicate.where_sql()),
        params,
    )
}

/// `DELETE FROM t <where>`
pub fn delete(table: &str, predicate: &Predicate) -> Statement {
    Statement::new(
        format!("DELETE FROM {}{}", table, predicate.where_sql()),
        constants(predicate),
    )
}

/// `SELECT * FROM t <where> [ORDER BY ...]`
pub fn select(table: &str, predicate: &Predicate, order_by: &[ColumnOrder]) -> Statement {
    Statement::new(
        format!(
            "SELECT * FROM {}{}{}",
            table,
            predicate.where_sql(),
            order_by_sql(order_by)
        ),
        constants(predicate),
    )
}

/// Append a pagination clause and its parameters to a statement
pub fn paginate(mut statement: Statement, clause: &str, params: Vec<Value>) -> Statement {
    statement.sql.push_str(clause);
    statement.params.extend(params);
    statement
}

/// A row offset or count as a bind value, saturating at `i64::MAX`
pub fn row_count(n: usize) -> Value {
    Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

fn constants(predicate: &Predicate) -> Vec<Value> {
    predicate.constants().into_iter().cloned().collect()
}
