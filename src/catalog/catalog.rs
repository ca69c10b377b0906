//! Schema Catalog for metacrud
//!
//! This module builds an immutable snapshot of table metadata by reading the
//! live database's catalog through a [`DbConnection`].

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::schema::{DbColumn, DbTable};
use super::types::SqlType;
use crate::driver::DbConnection;
use crate::error::Result;

/// Snapshot of table, column and primary-key metadata
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    /// Table definitions by name
    tables: BTreeMap<String, Arc<DbTable>>,
}

impl SchemaCatalog {
    /// Build a catalog from already known definitions
    pub fn from_tables(tables: impl IntoIterator<Item = DbTable>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.name().to_string(), Arc::new(t)))
                .collect(),
        }
    }

    /// Read the catalog from the database.
    ///
    /// A table whose columns or primary key cannot be read is left out and
    /// logged; only a failure to list tables is returned.
    pub fn load(conn: &dyn DbConnection, schema: Option<&str>) -> Result<Self> {
        let names = conn.table_names(schema)?;
        let mut tables = BTreeMap::new();

        for name in names {
            match load_table(conn, &name) {
                Ok(table) => {
                    tables.insert(name, Arc::new(table));
                }
                Err(e) => warn!(table = %name, error = %e, "excluding table from catalog"),
            }
        }

        info!(
            tables = tables.len(),
            schema = schema.unwrap_or("<default>"),
            "schema catalog loaded"
        );
        Ok(Self { tables })
    }

    /// Get a table by name, exact match first, then case-insensitive
    pub fn table(&self, name: &str) -> Option<&Arc<DbTable>> {
        self.tables.get(name).or_else(|| {
            self.tables
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, t)| t)
        })
    }

    /// Check if a table exists
    pub fn contains(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// All table names, sorted
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// All table definitions, sorted by name
    pub fn tables(&self) -> impl Iterator<Item = &Arc<DbTable>> {
        self.tables.values()
    }

    /// Number of tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn load_table(conn: &dyn DbConnection, name: &str) -> Result<DbTable> {
    let mut columns = Vec::new();
    for meta in conn.columns(name)? {
        let Some(sql_type) = SqlType::from_code(meta.type_code) else {
            debug!(
                table = name,
                column = %meta.name,
                type_name = %meta.type_name,
                type_code = meta.type_code,
                "skipping column of unsupported type"
            );
            continue;
        };
        columns.push(
            DbColumn::new(meta.name, sql_type)
                .size(meta.size)
                .decimal_digits(meta.decimal_digits)
                .nullable(meta.nullable)
                .auto_increment(meta.auto_increment)
                .auto_generated(meta.auto_generated),
        );
    }

    let mut keys = conn.primary_keys(name)?;
    keys.sort_by_key(|(_, seq)| *seq);
    let primary_key = keys.into_iter().map(|(column, _)| column).collect();

    DbTable::new(name, columns, primary_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ColumnMeta, RowCursor, Statement};
    use crate::error::Error;

    /// Metadata-only connection
    struct FakeMeta;

    fn meta(name: &str, type_code: i32) -> ColumnMeta {
        ColumnMeta {
            name: name.to_string(),
            type_code,
            type_name: String::new(),
            size: 0,
            decimal_digits: 0,
            nullable: true,
            auto_increment: false,
            auto_generated: false,
        }
    }

    impl DbConnection for FakeMeta {
        fn product_name(&self) -> Result<String> {
            Ok("Fake".to_string())
        }

        fn table_names(&self, _schema: Option<&str>) -> Result<Vec<String>> {
            Ok(vec![
                "orders".to_string(),
                "broken".to_string(),
                "shapes".to_string(),
                "links".to_string(),
            ])
        }

        fn columns(&self, table: &str) -> Result<Vec<ColumnMeta>> {
            match table {
                "orders" => Ok(vec![meta("id", 4), meta("note", 12), meta("raw", 1111)]),
                "shapes" => Ok(vec![meta("geom", 1111), meta("label", 12)]),
                "links" => Ok(vec![meta("a", 4), meta("b", 4)]),
                _ => Err(Error::Driver(format!("cannot describe {}", table))),
            }
        }

        fn primary_keys(&self, table: &str) -> Result<Vec<(String, u16)>> {
            match table {
                "orders" => Ok(vec![("id".to_string(), 1)]),
                // key on a column of unsupported type
                "shapes" => Ok(vec![("geom".to_string(), 1)]),
                "links" => Ok(vec![("b".to_string(), 2), ("a".to_string(), 1)]),
                _ => Ok(vec![]),
            }
        }

        fn execute(&self, _statement: &Statement) -> Result<usize> {
            unreachable!()
        }

        fn query(
            &self,
            _statement: &Statement,
            _consume: &mut dyn FnMut(&mut dyn RowCursor) -> Result<()>,
        ) -> Result<()> {
            unreachable!()
        }
    }

    #[test]
    fn test_load_is_best_effort() {
        let catalog = SchemaCatalog::load(&FakeMeta, None).unwrap();

        assert_eq!(
            catalog.table_names().collect::<Vec<_>>(),
            vec!["links", "orders"]
        );
        assert!(!catalog.contains("broken"));
        assert!(!catalog.contains("shapes"));
    }

    #[test]
    fn test_unsupported_columns_are_skipped() {
        let catalog = SchemaCatalog::load(&FakeMeta, None).unwrap();
        let orders = catalog.table("ORDERS").unwrap();
        assert_eq!(orders.column_names(), vec!["id", "note"]);
        assert_eq!(orders.primary_key(), ["id".to_string()]);
    }

    #[test]
    fn test_primary_key_follows_key_sequence() {
        let catalog = SchemaCatalog::load(&FakeMeta, None).unwrap();
        let links = catalog.table("links").unwrap();
        assert_eq!(links.primary_key(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_from_tables() {
        let users = DbTable::builder("Users")
            .column(DbColumn::new("id", SqlType::Integer))
            .primary_key(["id"])
            .build()
            .unwrap();
        let catalog = SchemaCatalog::from_tables([users.clone()]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.table("users").map(|t| t.as_ref()), Some(&users));
        assert!(SchemaCatalog::from_tables(Vec::new()).is_empty());
    }
}
