//! PostgreSQL dialect

use std::sync::Arc;

use super::Dialect;
use crate::catalog::SqlType;
use crate::driver::Statement;
use crate::executor::statement;
use crate::query::{ColumnOrder, Predicate};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    pub fn shared() -> Arc<dyn Dialect> {
        Arc::new(PostgresDialect)
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn native_type(&self, sql_type: SqlType) -> &'static str {
        match sql_type {
            SqlType::TinyInt => "SMALLINT",
            SqlType::Float | SqlType::Double => "DOUBLE PRECISION",
            SqlType::LongVarchar | SqlType::Clob => "TEXT",
            SqlType::Binary | SqlType::VarBinary | SqlType::Blob => "BYTEA",
            other => other.name(),
        }
    }

    fn takes_size(&self, sql_type: SqlType) -> bool {
        !matches!(sql_type, SqlType::Binary | SqlType::VarBinary) && sql_type.is_sized()
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
            statement::paginate(base, " OFFSET ?", vec![offset])
        })
    }
}
