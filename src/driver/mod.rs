//! Database driver capability
//!
//! The engine never talks to a concrete database library directly. It
//! borrows a [`DbConnection`] from a [`DataSource`] for the duration of one
//! operation and uses it for three things:
//! - reading schema metadata (product name, tables, columns, primary keys)
//! - executing parameterized statements that return an affected-row count
//! - running queries whose rows are pulled through a [`RowCursor`]

pub mod sqlite;

pub use sqlite::{PoolConfig, SqlitePool};

use crate::error::Result;
use crate::row::Value;

/// A parameterized SQL statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `?` placeholders
    pub sql: String,
    /// Bind parameters, positionally matching the placeholders
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Number of `?` placeholders in the SQL text
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// Column metadata as reported by the database
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,
    /// Native (JDBC) type code
    pub type_code: i32,
    /// Type name as declared in the database
    pub type_name: String,
    /// Column size (length or precision), 0 when not applicable
    pub size: i32,
    /// Decimal digits (scale), 0 when not applicable
    pub decimal_digits: i32,
    /// Does the column accept NULL?
    pub nullable: bool,
    /// Is the column filled from a sequence?
    pub auto_increment: bool,
    /// Is the column computed by the database?
    pub auto_generated: bool,
}

/// Forward-only cursor over a query result
pub trait RowCursor {
    /// Column names of the result, in select order
    fn columns(&self) -> &[String];

    /// Advance to the next row; `None` once the result is exhausted
    fn next_row(&mut self) -> Result<Option<Vec<Value>>>;
}

/// A live connection to a database
pub trait DbConnection {
    /// Database product name, used to pick a dialect
    fn product_name(&self) -> Result<String>;

    /// Names of ordinary tables, optionally restricted to one schema
    fn table_names(&self, schema: Option<&str>) -> Result<Vec<String>>;

    /// Columns of a table in declaration order
    fn columns(&self, table: &str) -> Result<Vec<ColumnMeta>>;

    /// Primary-key columns of a table with their 1-based key sequence
    fn primary_keys(&self, table: &str) -> Result<Vec<(String, u16)>>;

    /// Execute a statement and return the affected-row count
    fn execute(&self, statement: &Statement) -> Result<usize>;

    /// Run a query and hand its cursor to `consume`.
    ///
    /// The cursor is only valid inside the callback; it is closed when the
    /// callback returns.
    fn query(
        &self,
        statement: &Statement,
        consume: &mut dyn FnMut(&mut dyn RowCursor) -> Result<()>,
    ) -> Result<()>;
}

/// Hands out connections for the duration of a call
pub trait DataSource {
    /// Acquire a connection, run `f`, and release the connection whether `f`
    /// succeeds, fails or unwinds.
    fn with_connection<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&dyn DbConnection) -> Result<R>;
}

impl<D: DataSource> DataSource for std::sync::Arc<D> {
    fn with_connection<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&dyn DbConnection) -> Result<R>,
    {
        (**self).with_connection(f)
    }
}
