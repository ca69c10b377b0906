//! SQLite dialect

use std::sync::Arc;

use super::Dialect;
use crate::driver::Statement;
use crate::executor::statement;
use crate::query::{ColumnOrder, Predicate};

/// SQLite keeps the declared type name verbatim, so the canonical names are
/// used as is and read back unchanged by the catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    pub fn shared() -> Arc<dyn Dialect> {
        Arc::new(SqliteDialect)
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn select_statement(
        &self,
        table: &str,
        predicate: &Predicate,
        offset: usize,
        count: usize,
        order_by: &[ColumnOrder],
    ) -> Option<Statement> {
        let base = statement::select(table, predicate, order_by);
        let offset = statement::row_count(offset);
        Some(if count > 0 {
            statement::paginate(
                base,
                " LIMIT ? OFFSET ?",
                vec![statement::row_count(count), offset],
            )
        } else {
            statement::paginate(base, " LIMIT -1 OFFSET ?", vec![offset])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;

    #[test]
    fn test_limit_offset() {
        let stmt = SqliteDialect
            .select_statement(
                "T",
                &Predicate::equals("a", 1),
                20,
                10,
                &[ColumnOrder::asc("id")],
            )
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM T WHERE a = ? ORDER BY id ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            stmt.params,
            vec![Value::Integer(1), Value::Integer(10), Value::Integer(20)]
        );
    }

    #[test]
    fn test_offset_without_count() {
        let stmt = SqliteDialect
            .select_statement("T", &Predicate::empty(), 3, 0, &[])
            .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM T LIMIT -1 OFFSET ?");
        assert_eq!(stmt.params, vec![Value::Integer(3)]);
    }

    #[test]
    fn test_huge_offset_saturates() {
        let stmt = SqliteDialect
            .select_statement("T", &Predicate::empty(), usize::MAX, 0, &[])
            .unwrap();
        assert_eq!(stmt.params, vec![Value::Integer(i64::MAX)]);
    }
}
