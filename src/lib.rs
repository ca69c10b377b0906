//! metacrud - metadata-driven CRUD access to relational databases
//!
//! This library reads a database's schema at runtime and performs generic
//! create/read/update/delete operations against any table by name:
//! - SQL type registry and schema catalog
//! - Predicates, ordering and pagination
//! - Dialect resolution by database product name
//! - Driver capability with a pooled SQLite implementation
//! - CRUD engine returning uniform rows

pub mod catalog;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod executor;
pub mod query;
pub mod row;

pub use catalog::{DbColumn, DbTable, SchemaCatalog, SqlType};
pub use dialect::{Dialect, DialectRegistry};
pub use driver::{DataSource, DbConnection, PoolConfig, SqlitePool, Statement};
pub use error::{Error, ParseError, Result};
pub use executor::{Engine, EngineConfig};
pub use query::{ColumnOrder, Predicate, RowId, SelectQuery, SortDirection};
pub use row::{QueryData, Row, RowStream, Value};
