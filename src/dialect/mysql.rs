//! MySQL dialect

use std::sync::Arc;

use super::Dialect;
use crate::catalog::{DbColumn, SqlType};
use crate::driver::Statement;
use crate::executor::statement;
use crate::query::{ColumnOrder, Predicate};

/// VARCHAR columns need an explicit length in MySQL
const DEFAULT_VARCHAR_SIZE: i32 = 255;

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    pub fn shared() -> Arc<dyn Dialect> {
        Arc::new(MySqlDialect)
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn native_type(&self, sql_type: SqlType) -> &'static str {
        match sql_type {
            SqlType::LongVarchar | SqlType::Clob => "LONGTEXT",
            SqlType::Blob => "LONGBLOB",
            SqlType::Timestamp => "DATETIME",
            other => other.name(),
        }
    }

    fn column_ddl(&self, column: &DbColumn) -> String {
        let size = match (column.sql_type, column.size) {
            (SqlType::Varchar | SqlType::VarBinary, s) if s <= 0 => DEFAULT_VARCHAR_SIZE,
            (_, s) => s,
        };
        format!(
            "{} {}",
            column.name,
            column.sql_type.ddl_with_digits(
                self.native_type(column.sql_type),
                size,
                column.decimal_digits,
                column.nullable
            )
        )
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
                " LIMIT ?, ?",
                vec![offset, statement::row_count(count)],
            )
        } else {
            // MySQL has no OFFSET without LIMIT; use the largest row count
            statement::paginate(base, " LIMIT ?, 18446744073709551615", vec![offset])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;

    #[test]
    fn test_varchar_gets_default_length() {
        let d = MySqlDialect;
        assert_eq!(
            d.column_ddl(&DbColumn::new("name", SqlType::Varchar)),
            "name VARCHAR(255)"
        );
        assert_eq!(
            d.column_ddl(&DbColumn::new("at", SqlType::Timestamp).nullable(false)),
            "at DATETIME NOT NULL"
        );
    }

    #[test]
    fn test_limit_offset_order() {
        let stmt = MySqlDialect
            .select_statement("t", &Predicate::empty(), 4, 2, &[])
            .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t LIMIT ?, ?");
        assert_eq!(stmt.params, vec![Value::Integer(4), Value::Integer(2)]);
    }
}
