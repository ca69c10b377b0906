//! Error types for metacrud
//!
//! This module defines all error types used throughout the data-access layer.

use crate::catalog::SqlType;
use std::fmt;
use thiserror::Error;

/// The main error type for metacrud
#[derive(Error, Debug)]
pub enum Error {
    // ========== Catalog Errors ==========
    #[error("Catalog error: table '{0}' not found")]
    TableNotFound(String),

    #[error("Catalog error: column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Catalog error: invalid key for table '{table}': {reason}")]
    InvalidKey { table: String, reason: String },

    // ========== Type Errors ==========
    #[error("Type error: {0}")]
    Parse(#[from] ParseError),

    #[error("Type error: invalid fields: {}", join_parse_errors(.0))]
    InvalidFields(Vec<ParseError>),

    #[error("Type error: cannot convert {from} to {to}")]
    TypeMismatch { from: String, to: String },

    // ========== Execution Errors ==========
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database error: {0}")]
    Driver(String),

    #[error("Execution error: {0}")]
    InvalidArgument(String),

    // ========== Pool Errors ==========
    #[error("Pool error: no connection available after {0}ms")]
    PoolTimeout(u64),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for metacrud operations
pub type Result<T> = std::result::Result<T, Error>;

/// A string that is not a valid literal for the target SQL type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Column the text was destined for, when known
    pub column: Option<String>,
    /// The offending text
    pub text: String,
    /// Target type
    pub sql_type: SqlType,
}

impl ParseError {
    pub fn new(text: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            column: None,
            text: text.into(),
            sql_type,
        }
    }

    /// Attach the column name the text was supplied for
    pub fn for_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(column) = &self.column {
            write!(f, "column '{}': ", column)?;
        }
        write!(f, "cannot parse '{}' as {}", self.text, self.sql_type)
    }
}

impl std::error::Error for ParseError {}

fn join_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
