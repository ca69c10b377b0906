//! SQL dialects
//!
//! A [`Dialect`] captures how one database product deviates from the default
//! SQL the engine renders: native type names in DDL and, optionally, native
//! pagination. Dialects are looked up by product name in a
//! [`DialectRegistry`]; products without an entry get [`GenericDialect`].

mod generic;
mod mysql;
mod postgres;
mod sqlite;

pub use generic::GenericDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::{DbColumn, SqlType};
use crate::driver::Statement;
use crate::query::{ColumnOrder, Predicate};

/// Trait for database-specific SQL rendering
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Native DDL type name for a generic type
    fn native_type(&self, sql_type: SqlType) -> &'static str {
        sql_type.name()
    }

    /// Does the native type accept a `(size)` suffix?
    fn takes_size(&self, sql_type: SqlType) -> bool {
        sql_type.is_sized()
    }

    /// Native type names for every generic type
    fn type_mapping(&self) -> HashMap<SqlType, &'static str> {
        SqlType::ALL
            .iter()
            .map(|t| (*t, self.native_type(*t)))
            .collect()
    }

    /// Column clause of a CREATE TABLE statement: `name type[(size)][ NOT NULL]`
    fn column_ddl(&self, column: &DbColumn) -> String {
        let size = if self.takes_size(column.sql_type) {
            column.size
        } else {
            0
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

    /// A paginated, ordered SELECT using native syntax.
    ///
    /// `count == 0` means no row limit. `None` means the dialect has no
    /// native pagination and the caller must skip rows itself.
    fn select_statement(
        &self,
        _table: &str,
        _predicate: &Predicate,
        _offset: usize,
        _count: usize,
        _order_by: &[ColumnOrder],
    ) -> Option<Statement> {
        None
    }
}

/// Constructs a dialect
pub type DialectFactory = fn() -> Arc<dyn Dialect>;

/// Maps database product names to dialect factories
#[derive(Debug, Clone)]
pub struct DialectRegistry {
    /// Factories keyed by lower-cased product name
    factories: HashMap<String, DialectFactory>,
}

impl DialectRegistry {
    /// A registry without any entries; everything resolves to the generic dialect
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory for a product name (case-insensitive)
    pub fn register(mut self, product: &str, factory: DialectFactory) -> Self {
        self.factories.insert(product.to_lowercase(), factory);
        self
    }

    /// Find the dialect registered for a product
    pub fn lookup(&self, product: &str) -> Option<Arc<dyn Dialect>> {
        self.factories
            .get(&product.to_lowercase())
            .map(|factory| factory())
    }

    /// Find the dialect for a product, falling back to [`GenericDialect`]
    pub fn resolve(&self, product: &str) -> Arc<dyn Dialect> {
        match self.lookup(product) {
            Some(dialect) => {
                info!(product, dialect = dialect.name(), "resolved SQL dialect");
                dialect
            }
            None => {
                warn!(product, "no SQL dialect registered, using generic dialect");
                Arc::new(GenericDialect)
            }
        }
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::empty()
            .register("SQLite", SqliteDialect::shared)
            .register("PostgreSQL", PostgresDialect::shared)
            .register("MySQL", MySqlDialect::shared)
    }
}
