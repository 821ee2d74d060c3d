//! Sorting types for list and search operations.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::filter::compare_values;
use super::record::Record;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// Return the SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A sort specification consisting of a field name and direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Field name to sort by.
    pub field: String,
    /// Sort direction.
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortField {
    /// Create a new sort field.
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Create an ascending sort on the given field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    /// Create a descending sort on the given field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    /// Parse an ordering term where a leading `-` means descending.
    pub fn parse(term: &str) -> Self {
        match term.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(term.trim_start_matches('+')),
        }
    }

    /// Parse a list of ordering terms, skipping empty ones.
    pub fn parse_all<S: AsRef<str>>(terms: &[S]) -> Vec<Self> {
        terms
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .map(Self::parse)
            .collect()
    }
}

/// Compare two records by a list of sort fields.
pub fn compare_records(a: &Record, b: &Record, ordering: &[SortField]) -> Ordering {
    for sort in ordering {
        let left = a.get(&sort.field).unwrap_or(&serde_json::Value::Null);
        let right = b.get(&sort.field).unwrap_or(&serde_json::Value::Null);
        let ord = compare_values(left, right);
        let ord = match sort.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
