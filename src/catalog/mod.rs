//! Catalog module
//!
//! This module contains the schema catalog, table definitions, and the
//! generic SQL type registry.

pub mod catalog;
pub mod schema;
pub mod types;

pub use catalog::SchemaCatalog;
pub use schema::{DbColumn, DbTable, TableBuilder};
pub use types::SqlType;
