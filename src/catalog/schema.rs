//! Table and column definitions
//!
//! This module defines the metadata the catalog records for every table:
//! columns with their generic SQL types, and the ordered primary key.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use super::types::SqlType;
use crate::error::{Error, ParseError, Result};
use crate::query::Predicate;
use crate::row::Value;

/// Column definition in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbColumn {
    /// Column name
    pub name: String,
    /// Generic SQL type
    pub sql_type: SqlType,
    /// Length or precision, 0 when unspecified
    pub size: i32,
    /// Scale, 0 when unspecified
    pub decimal_digits: i32,
    /// Is this column nullable?
    pub nullable: bool,
    /// Is this column filled from a sequence?
    pub auto_increment: bool,
    /// Is this column computed by the database?
    pub auto_generated: bool,
}

impl DbColumn {
    /// Create a new nullable column with minimal required fields
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            size: 0,
            decimal_digits: 0,
            nullable: true,
            auto_increment: false,
            auto_generated: false,
        }
    }

    /// Set the length or precision
    pub fn size(mut self, size: i32) -> Self {
        self.size = size;
        self
    }

    /// Set the scale
    pub fn decimal_digits(mut self, digits: i32) -> Self {
        self.decimal_digits = digits;
        self
    }

    /// Set nullable flag
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set auto-increment flag
    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    /// Set auto-generated flag
    pub fn auto_generated(mut self, auto_generated: bool) -> Self {
        self.auto_generated = auto_generated;
        self
    }

    /// Parse text into a value of this column's type
    pub fn coerce(&self, text: &str) -> std::result::Result<Value, ParseError> {
        self.sql_type
            .parse(text)
            .map_err(|e| e.for_column(&self.name))
    }
}

/// Table definition - full table metadata
#[derive(Debug, Clone, Serialize)]
pub struct DbTable {
    /// Table name
    name: String,
    /// Columns in introspection order
    columns: Vec<DbColumn>,
    /// Primary key column names in key order
    primary_key: Vec<String>,
    /// Column name to index mapping
    #[serde(skip)]
    name_to_index: HashMap<String, usize>,
}

impl DbTable {
    /// Create a table definition.
    ///
    /// Fails if two columns share a name or a primary-key column is missing.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<DbColumn>,
        primary_key: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        let mut name_to_index = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            if name_to_index.insert(col.name.clone(), i).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "duplicate column '{}' in table '{}'",
                    col.name, name
                )));
            }
        }

        if let Some(missing) = primary_key
            .iter()
            .find(|pk| !name_to_index.contains_key(pk.as_str()))
        {
            return Err(Error::ColumnNotFound(missing.clone(), name));
        }

        Ok(Self {
            name,
            columns,
            primary_key,
            name_to_index,
        })
    }

    /// Start building a table definition
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder::new(name)
    }

    /// Get the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get all columns
    pub fn columns(&self) -> &[DbColumn] {
        &self.columns
    }

    /// Get column by name, exact match first, then case-insensitive
    pub fn column(&self, name: &str) -> Option<&DbColumn> {
        match self.name_to_index.get(name) {
            Some(&idx) => Some(&self.columns[idx]),
            None => self
                .columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name)),
        }
    }

    /// Check if column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary key column names in key order
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Primary key columns in key order
    pub fn primary_key_columns(&self) -> Vec<&DbColumn> {
        self.primary_key
            .iter()
            .filter_map(|pk| self.column(pk))
            .collect()
    }

    /// Parse text into a value for the named column
    pub fn coerce(&self, column: &str, text: &str) -> Result<Value> {
        let col = self
            .column(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string(), self.name.clone()))?;
        Ok(col.coerce(text)?)
    }

    /// Coerce every `(column, text)` pair.
    ///
    /// Parse failures are collected and reported together as
    /// [`Error::InvalidFields`]; an unknown column fails immediately.
    pub fn coerce_all<I, K, V>(&self, pairs: I) -> Result<IndexMap<String, Value>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut values = IndexMap::new();
        let mut failures = Vec::new();

        for (column, text) in pairs {
            let col = self.column(column.as_ref()).ok_or_else(|| {
                Error::ColumnNotFound(column.as_ref().to_string(), self.name.clone())
            })?;
            match col.coerce(text.as_ref()) {
                Ok(value) => {
                    values.insert(col.name.clone(), value);
                }
                Err(e) => failures.push(e),
            }
        }

        if failures.is_empty() {
            Ok(values)
        } else {
            Err(Error::InvalidFields(failures))
        }
    }

    /// Build an equality predicate from externally supplied strings
    pub fn conditions_from_strings<I, K, V>(&self, pairs: I) -> Result<Predicate>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(Predicate::conditions(self.coerce_all(pairs)?))
    }
}

impl PartialEq for DbTable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.columns == other.columns
            && self.primary_key == other.primary_key
    }
}

impl fmt::Display for DbTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Table: {}", self.name)?;
        writeln!(f, "Columns:")?;

        for col in &self.columns {
            let mut flags = Vec::new();
            if self.primary_key.contains(&col.name) {
                flags.push("PRIMARY KEY");
            }
            if !col.nullable {
                flags.push("NOT NULL");
            }
            if col.auto_increment {
                flags.push("AUTO INCREMENT");
            }
            if col.auto_generated {
                flags.push("GENERATED");
            }

            let flags_str = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };

            let type_str =
                col.sql_type
                    .ddl_with_digits(col.sql_type.name(), col.size, col.decimal_digits, true);
            writeln!(f, "  {} {}{}", col.name, type_str, flags_str)?;
        }

        if !self.primary_key.is_empty() {
            writeln!(f, "Primary key: ({})", self.primary_key.join(", "))?;
        }

        Ok(())
    }
}

/// Builder for table definitions with a fluent API
pub struct TableBuilder {
    name: String,
    columns: Vec<DbColumn>,
    primary_key: Vec<String>,
}

impl TableBuilder {
    /// Start building a new table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Add a column
    pub fn column(mut self, column: DbColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the primary key columns, in key order
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Validate and build the definition
    pub fn build(self) -> Result<DbTable> {
        DbTable::new(self.name, self.columns, self.primary_key)
    }
}
