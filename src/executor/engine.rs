//! CRUD Engine for metacrud
//!
//! This module turns table names, column/value pairs and predicates into
//! parameterized statements, runs them through the data source and
//! materializes the results.

use indexmap::IndexMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use super::statement;
use crate::catalog::{DbTable, SchemaCatalog};
use crate::dialect::{Dialect, DialectRegistry, GenericDialect};
use crate::driver::{DataSource, Statement};
use crate::error::{Error, Result};
use crate::query::{Predicate, RowId, SelectQuery};
use crate::row::{QueryData, Row, RowStream, Value};

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Restrict the catalog to one schema
    pub schema: Option<String>,
    /// Check table and column names against the catalog before they are
    /// interpolated into SQL
    pub validate_identifiers: bool,
    /// Dialects available for resolution
    pub dialects: DialectRegistry,
}

impl EngineConfig {
    /// Create a new engine config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the schema filter
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Enable or disable identifier validation
    pub fn validate_identifiers(mut self, validate: bool) -> Self {
        self.validate_identifiers = validate;
        self
    }

    /// Replace the dialect registry
    pub fn dialects(mut self, dialects: DialectRegistry) -> Self {
        self.dialects = dialects;
        self
    }
}

/// Metadata-driven CRUD engine over a data source
///
/// The dialect is resolved when the engine is created. The schema catalog is
/// loaded on first use, exactly once even under concurrent first use, and is
/// then shared read-only. Tables created through [`Engine::create_table`]
/// invalidate the snapshot; other schema changes are only seen after
/// [`Engine::refresh_catalog`].
pub struct Engine<D: DataSource> {
    data_source: D,
    config: EngineConfig,
    dialect: Arc<dyn Dialect>,
    catalog: RwLock<Option<Arc<SchemaCatalog>>>,
}

impl<D: DataSource> Engine<D> {
    /// Create an engine with the default configuration
    pub fn new(data_source: D) -> Result<Self> {
        Self::with_config(data_source, EngineConfig::default())
    }

    /// Create an engine, resolving the dialect from the database product name
    pub fn with_config(data_source: D, config: EngineConfig) -> Result<Self> {
        let product = data_source.with_connection(|conn| Ok(conn.product_name()))?;
        let dialect = match product {
            Ok(product) => config.dialects.resolve(&product),
            Err(e) => {
                warn!(error = %e, "cannot read database product name, using generic dialect");
                GenericDialect::shared()
            }
        };

        Ok(Self {
            data_source,
            config,
            dialect,
            catalog: RwLock::new(None),
        })
    }

    /// The resolved dialect
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// The engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying data source
    pub fn data_source(&self) -> &D {
        &self.data_source
    }

    // ========== Catalog ==========

    /// The schema catalog, loading it on first use
    pub fn catalog(&self) -> Result<Arc<SchemaCatalog>> {
        if let Some(catalog) = self.catalog.read().map_err(poisoned)?.as_ref() {
            return Ok(catalog.clone());
        }

        let mut slot = self.catalog.write().map_err(poisoned)?;
        // another caller may have loaded it while we waited
        if let Some(catalog) = slot.as_ref() {
            return Ok(catalog.clone());
        }

        let schema = self.config.schema.as_deref();
        let catalog = Arc::new(
            self.data_source
                .with_connection(|conn| SchemaCatalog::load(conn, schema))?,
        );
        *slot = Some(catalog.clone());
        Ok(catalog)
    }

    /// Drop the cached catalog and load it again
    pub fn refresh_catalog(&self) -> Result<Arc<SchemaCatalog>> {
        self.invalidate_catalog()?;
        self.catalog()
    }

    fn invalidate_catalog(&self) -> Result<()> {
        *self.catalog.write().map_err(poisoned)? = None;
        Ok(())
    }

    /// Names of all tables in the catalog, sorted
    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.catalog()?.table_names().map(String::from).collect())
    }

    /// Definition of a table, if the catalog has it
    pub fn table_def(&self, name: &str) -> Result<Option<Arc<DbTable>>> {
        Ok(self.catalog()?.table(name).cloned())
    }

    fn require_table(&self, name: &str) -> Result<Arc<DbTable>> {
        self.table_def(name)?
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Check identifiers against the catalog when validation is enabled
    fn check_identifiers<'a>(
        &self,
        table: &str,
        columns: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        if !self.config.validate_identifiers {
            return Ok(());
        }
        let def = self.require_table(table)?;
        for column in columns {
            if !def.has_column(column) {
                return Err(Error::ColumnNotFound(
                    column.to_string(),
                    table.to_string(),
                ));
            }
        }
        Ok(())
    }

    // ========== Statements ==========

    fn execute(&self, stmt: &Statement) -> Result<usize> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "executing statement");
        let affected = self.data_source.with_connection(|conn| conn.execute(stmt))?;
        debug!(affected, "statement executed");
        Ok(affected)
    }

    /// Create a table from a definition
    pub fn create_table(&self, table: &DbTable) -> Result<()> {
        let stmt = statement::create_table(self.dialect.as_ref(), table);
        self.execute(&stmt)?;
        self.invalidate_catalog()?;
        info!(table = table.name(), "created table");
        Ok(())
    }

    /// Insert one row; values are bound in the order supplied
    pub fn insert<I, K, V>(&self, table: &str, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values = collect_pairs(values);
        self.check_identifiers(table, values.keys().map(String::as_str))?;
        self.execute(&statement::insert(table, &values))
    }

    /// Update the row(s) identified by `id`.
    ///
    /// # Panics
    ///
    /// A scalar `id` requires the table to have exactly one primary-key
    /// column; anything else is a programming error.
    pub fn update<I, K, V>(&self, table: &str, id: impl Into<RowId>, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let predicate = self.id_predicate(table, id.into())?;
        self.update_where(table, &predicate, values)
    }

    /// Update every row of the table
    pub fn update_all<I, K, V>(&self, table: &str, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.update_where(table, &Predicate::Empty, values)
    }

    /// Update the rows matching `predicate`
    pub fn update_where<I, K, V>(
        &self,
        table: &str,
        predicate: &Predicate,
        values: I,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values = collect_pairs(values);
        if values.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "update of '{}' without any column values",
                table
            )));
        }
        self.check_identifiers(
            table,
            values
                .keys()
                .map(String::as_str)
                .chain(predicate.columns()),
        )?;
        self.execute(&statement::update(table, &values, predicate))
    }

    /// Delete the row(s) identified by `id`.
    ///
    /// # Panics
    ///
    /// Same scalar-id rule as [`Engine::update`].
    pub fn delete(&self, table: &str, id: impl Into<RowId>) -> Result<usize> {
        let predicate = self.id_predicate(table, id.into())?;
        self.delete_where(table, &predicate)
    }

    /// Delete the rows matching `predicate`
    pub fn delete_where(&self, table: &str, predicate: &Predicate) -> Result<usize> {
        self.check_identifiers(table, predicate.columns())?;
        self.execute(&statement::delete(table, predicate))
    }

    /// Select rows and materialize them
    pub fn select(&self, table: &str, query: &SelectQuery) -> Result<QueryData> {
        self.select_with(table, query, |rows| rows.collect_query_data())
    }

    /// Select every row of a table
    pub fn select_all(&self, table: &str) -> Result<QueryData> {
        self.select(table, &SelectQuery::default())
    }

    /// Select rows and stream them into `consume`.
    ///
    /// The stream is backed by the open cursor and is only valid inside the
    /// callback; the connection is released when it returns.
    pub fn select_with<R, F>(&self, table: &str, query: &SelectQuery, consume: F) -> Result<R>
    where
        F: FnOnce(RowStream<'_>) -> Result<R>,
    {
        self.check_identifiers(
            table,
            query
                .predicate
                .columns()
                .into_iter()
                .chain(query.order_by.iter().map(|o| o.column.as_str())),
        )?;
        let hint = self.type_hint(table);

        let native = if query.offset > 0 {
            self.dialect.select_statement(
                table,
                &query.predicate,
                query.offset,
                query.count,
                &query.order_by,
            )
        } else {
            None
        };

        let (stmt, skip, limit) = match native {
            Some(stmt) => (stmt, 0, None),
            None => (
                statement::select(table, &query.predicate, &query.order_by),
                query.offset,
                (query.count > 0).then_some(query.count),
            ),
        };
        debug!(
            sql = %stmt.sql,
            params = stmt.params.len(),
            skip,
            fetch_limit = ?query.fetch_limit(),
            "running query"
        );

        self.data_source.with_connection(|conn| {
            let mut consume = Some(consume);
            let mut output = None;
            conn.query(&stmt, &mut |cursor| {
                let rows = RowStream::open(cursor, hint.as_deref(), skip, limit)?;
                let consume = consume
                    .take()
                    .ok_or_else(|| Error::Internal("query cursor opened twice".to_string()))?;
                output = Some(consume(rows)?);
                Ok(())
            })?;
            output.ok_or_else(|| Error::Internal("query returned no cursor".to_string()))
        })
    }

    /// Fetch a single row by primary key.
    ///
    /// A composite id must name exactly the table's primary-key columns.
    ///
    /// # Panics
    ///
    /// Same scalar-id rule as [`Engine::update`].
    pub fn select_by_id(&self, table: &str, id: impl Into<RowId>) -> Result<Option<Row>> {
        let def = self.require_table(table)?;
        let predicate = match id.into() {
            RowId::Scalar(value) => scalar_key_predicate(&def, value),
            RowId::Composite(pairs) => {
                let key = def.primary_key();
                if key.is_empty() {
                    return Err(Error::InvalidKey {
                        table: table.to_string(),
                        reason: "table has no primary key".to_string(),
                    });
                }
                let covers_key = pairs.len() == key.len()
                    && key
                        .iter()
                        .all(|k| pairs.keys().any(|c| c.eq_ignore_ascii_case(k)));
                if !covers_key {
                    return Err(Error::InvalidKey {
                        table: table.to_string(),
                        reason: format!(
                            "expected exactly the key columns ({}), got ({})",
                            key.join(", "),
                            pairs.keys().cloned().collect::<Vec<_>>().join(", ")
                        ),
                    });
                }
                Predicate::Conditions(pairs)
            }
        };

        let data = self.select(table, &SelectQuery::new().filter(predicate).count(1))?;
        Ok(data.into_iter().next())
    }

    fn id_predicate(&self, table: &str, id: RowId) -> Result<Predicate> {
        match id {
            RowId::Composite(pairs) => Ok(Predicate::Conditions(pairs)),
            RowId::Scalar(value) => {
                let def = self.require_table(table)?;
                Ok(scalar_key_predicate(&def, value))
            }
        }
    }

    /// Table definition used to restore declared value types; best effort
    fn type_hint(&self, table: &str) -> Option<Arc<DbTable>> {
        match self.table_def(table) {
            Ok(def) => def,
            Err(e) => {
                warn!(table, error = %e, "no type information for result, returning raw values");
                None
            }
        }
    }
}

fn scalar_key_predicate(table: &DbTable, value: Value) -> Predicate {
    let key = table.primary_key();
    assert!(
        key.len() == 1,
        "table '{}' must have exactly one primary-key column to be addressed by a scalar id, \
         it has {}",
        table.name(),
        key.len()
    );
    Predicate::equals(key[0].clone(), value)
}

fn collect_pairs<I, K, V>(pairs: I) -> IndexMap<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::Internal("catalog lock poisoned".to_string())
}
