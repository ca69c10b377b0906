//! Query description module
//!
//! This module contains everything a caller uses to describe which rows an
//! operation touches: predicates, ordering, pagination and row identifiers.

pub mod order;
pub mod predicate;

pub use order::{order_by_sql, ColumnOrder, SortDirection};
pub use predicate::Predicate;

use indexmap::IndexMap;

use crate::row::Value;

/// Filter, ordering and pagination of a `select`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    /// Row filter
    pub predicate: Predicate,
    /// Rows to skip
    pub offset: usize,
    /// Maximum rows to return, 0 for no limit
    pub count: usize,
    /// Ordering terms
    pub order_by: Vec<ColumnOrder>,
}

impl SelectQuery {
    /// Select everything, unordered
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row filter
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Set the number of rows to skip
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Set the maximum number of rows
    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Append an ordering term
    pub fn order_by(mut self, order: ColumnOrder) -> Self {
        self.order_by.push(order);
        self
    }

    /// Rows the cursor may fetch before skipping, `None` when unbounded
    pub fn fetch_limit(&self) -> Option<usize> {
        (self.count > 0).then(|| self.offset.saturating_add(self.count))
    }
}

/// Identifies the row(s) an `update`, `delete` or `select_by_id` targets
#[derive(Debug, Clone, PartialEq)]
pub enum RowId {
    /// Value of the table's single primary-key column
    Scalar(Value),
    /// Column/value pairs compared for equality
    Composite(IndexMap<String, Value>),
}

impl RowId {
    /// A composite identifier from `(column, value)` pairs
    pub fn composite<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        RowId::Composite(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<T: Into<Value>> From<T> for RowId {
    fn from(value: T) -> Self {
        RowId::Scalar(value.into())
    }
}
