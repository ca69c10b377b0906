//! Result ordering

use serde::Serialize;
use std::fmt;

/// Sort direction of an ORDER BY term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnOrder {
    pub column: String,
    pub direction: SortDirection,
}

impl ColumnOrder {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Ascending order on `column`
    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Asc)
    }

    /// Descending order on `column`
    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Desc)
    }
}

impl fmt::Display for ColumnOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Asc => write!(f, "{} ASC", self.column),
            SortDirection::Desc => write!(f, "{} DESC", self.column),
        }
    }
}

/// ` ORDER BY a ASC, b DESC`, or an empty string
pub fn order_by_sql(order_by: &[ColumnOrder]) -> String {
    if order_by.is_empty() {
        return String::new();
    }
    let terms = order_by
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(" ORDER BY {}", terms)
}
