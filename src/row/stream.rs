//! Lazy row streams
//!
//! A [`RowStream`] pulls rows from an open cursor one at a time. It borrows
//! the cursor, so it cannot escape the connection scope it was created in.

use std::sync::Arc;

use super::{QueryData, Row, Value};
use crate::catalog::{DbTable, SqlType};
use crate::driver::RowCursor;
use crate::error::Result;

/// Single-pass iterator over the rows of an open cursor
pub struct RowStream<'c> {
    cursor: &'c mut dyn RowCursor,
    columns: Arc<[String]>,
    /// Declared type of each result column, when the table is known
    types: Vec<Option<SqlType>>,
    /// Rows still allowed by the fetch cap
    remaining: Option<usize>,
    done: bool,
}

impl<'c> RowStream<'c> {
    /// Wrap a cursor, discarding the first `skip` rows and yielding at most
    /// `limit` of the rest.
    pub(crate) fn open(
        cursor: &'c mut dyn RowCursor,
        table: Option<&DbTable>,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Self> {
        let columns: Arc<[String]> = cursor.columns().to_vec().into();
        let types = columns
            .iter()
            .map(|name| table.and_then(|t| t.column(name)).map(|c| c.sql_type))
            .collect();

        let mut stream = Self {
            cursor,
            columns,
            types,
            remaining: limit,
            done: false,
        };

        for _ in 0..skip {
            if stream.cursor.next_row()?.is_none() {
                stream.done = true;
                break;
            }
        }

        Ok(stream)
    }

    /// Column names of the result
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Drain the remaining rows into memory
    pub fn collect_query_data(self) -> Result<QueryData> {
        let columns = self.columns.clone();
        let rows = self.collect::<Result<Vec<_>>>()?;
        Ok(QueryData::new(columns, rows))
    }

    fn convert(&self, values: Vec<Value>) -> Vec<Value> {
        values
            .into_iter()
            .zip(self.types.iter())
            .map(|(value, sql_type)| match sql_type {
                Some(t) => t.from_raw(value),
                None => value,
            })
            .collect()
    }
}

impl Iterator for RowStream<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == Some(0) {
            return None;
        }

        match self.cursor.next_row() {
            Ok(Some(values)) => {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                let values = self.convert(values);
                Some(Ok(Row::new(self.columns.clone(), values)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
