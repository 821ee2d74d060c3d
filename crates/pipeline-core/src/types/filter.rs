//! Filter types for dynamic query building.
//!
//! Filters use double-underscore lookups (`name__icontains`) so that callers can
//! pass the same keyword maps to every store backend.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::{Record, value_to_string};

/// Filter comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Equality. Scalars compare by their string form, so `"5"` equals `5`.
    Exact,
    /// Case-insensitive equality.
    IExact,
    /// Case-insensitive substring match.
    IContains,
    /// Case-insensitive prefix match.
    IStartsWith,
    /// Membership in a list value.
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    /// `true` matches missing or null fields, `false` matches present ones.
    IsNull,
}

impl FilterOp {
    /// Parse a lookup suffix such as `icontains`.
    pub fn from_lookup(lookup: &str) -> Option<Self> {
        match lookup {
            "exact" => Some(Self::Exact),
            "iexact" => Some(Self::IExact),
            "icontains" => Some(Self::IContains),
            "istartswith" => Some(Self::IStartsWith),
            "in" => Some(Self::In),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "isnull" => Some(Self::IsNull),
            _ => None,
        }
    }
}

/// A single filter condition on a named field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterField {
    /// The field name to filter on.
    pub field: String,
    /// The comparison operator.
    pub op: FilterOp,
    /// The value to compare against.
    pub value: Value,
}

impl FilterField {
    /// Create a new filter field.
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Shorthand for an equality filter.
    pub fn exact(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Exact, value)
    }

    /// Shorthand for a case-insensitive substring filter.
    pub fn icontains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOp::IContains, Value::String(value.into()))
    }

    /// Shorthand for a case-insensitive prefix filter.
    pub fn istartswith(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOp::IStartsWith, Value::String(value.into()))
    }

    /// Shorthand for a list membership filter.
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOp::In, Value::Array(values))
    }

    /// Parse a lookup key (`email`, `name__icontains`, `created_at__gte`).
    ///
    /// A suffix that is not a known lookup is treated as part of the field
    /// name with an exact match.
    pub fn parse(key: &str, value: Value) -> Self {
        if let Some((field, lookup)) = key.rsplit_once("__") {
            if let Some(op) = FilterOp::from_lookup(lookup) {
                return Self::new(field, op, value);
            }
        }
        Self::new(key, FilterOp::Exact, value)
    }

    /// Parse every entry of a keyword map into filters.
    pub fn parse_map(filters: &Record) -> Vec<Self> {
        filters
            .iter()
            .map(|(key, value)| Self::parse(key, value.clone()))
            .collect()
    }

    /// Evaluate this filter against a record.
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Exact => loose_eq(actual, &self.value),
            FilterOp::IExact => text_pair(actual, &self.value)
                .is_some_and(|(a, b)| a.to_lowercase() == b.to_lowercase()),
            FilterOp::IContains => text_pair(actual, &self.value)
                .is_some_and(|(a, b)| a.to_lowercase().contains(&b.to_lowercase())),
            FilterOp::IStartsWith => text_pair(actual, &self.value)
                .is_some_and(|(a, b)| a.to_lowercase().starts_with(&b.to_lowercase())),
            FilterOp::In => match &self.value {
                Value::Array(items) => items.iter().any(|item| loose_eq(actual, item)),
                _ => false,
            },
            FilterOp::Gt => ordered(actual, &self.value, |o| o == Ordering::Greater),
            FilterOp::Gte => ordered(actual, &self.value, |o| o != Ordering::Less),
            FilterOp::Lt => ordered(actual, &self.value, |o| o == Ordering::Less),
            FilterOp::Lte => ordered(actual, &self.value, |o| o != Ordering::Greater),
            FilterOp::IsNull => {
                let want_null = self.value.as_bool().unwrap_or(true);
                actual.is_null() == want_null
            }
        }
    }
}

/// Loose scalar equality used by exact lookups.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => false,
        _ => value_to_string(a) == value_to_string(b),
    }
}

/// Total order over JSON values: null first, then booleans, numbers and
/// strings. Containers compare by their serialized form.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn text_pair(actual: &Value, wanted: &Value) -> Option<(String, String)> {
    if actual.is_null() || wanted.is_null() {
        return None;
    }
    Some((value_to_string(actual), value_to_string(wanted)))
}

fn ordered(actual: &Value, wanted: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    if actual.is_null() || wanted.is_null() {
        return false;
    }
    accept(compare_values(actual, wanted))
}
