//! Store-agnostic query description.

use super::filter::FilterField;
use super::record::Record;
use super::sorting::SortField;

/// A read query against an entity store.
///
/// `filters` are AND-ed, `exclude` removes rows matching all of its clauses
/// together, and `any_of` (when non-empty) keeps rows matching at least one
/// of its clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<FilterField>,
    pub exclude: Vec<FilterField>,
    pub any_of: Vec<FilterField>,
    pub ordering: Vec<SortField>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: FilterField) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = FilterField>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn exclude(mut self, filters: impl IntoIterator<Item = FilterField>) -> Self {
        self.exclude.extend(filters);
        self
    }

    pub fn any_of(mut self, filters: impl IntoIterator<Item = FilterField>) -> Self {
        self.any_of.extend(filters);
        self
    }

    pub fn order_by(mut self, ordering: impl IntoIterator<Item = SortField>) -> Self {
        self.ordering.extend(ordering);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Same predicate without ordering or slicing, for counting.
    pub fn unsliced(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            exclude: self.exclude.clone(),
            any_of: self.any_of.clone(),
            ordering: Vec::new(),
            offset: None,
            limit: None,
        }
    }

    /// Evaluate the predicate part of the query against a record.
    pub fn matches(&self, record: &Record) -> bool {
        if !self.filters.iter().all(|f| f.matches(record)) {
            return false;
        }
        if !self.exclude.is_empty() && self.exclude.iter().all(|f| f.matches(record)) {
            return false;
        }
        self.any_of.is_empty() || self.any_of.iter().any(|f| f.matches(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exclude_negates_the_whole_group() {
        let row = json!({"a": 1, "b": 2}).as_object().cloned().unwrap();
        let only_a = Query::new().exclude([FilterField::exact("a", 1), FilterField::exact("b", 3)]);
        assert!(only_a.matches(&row));

        let both = Query::new().exclude([FilterField::exact("a", 1), FilterField::exact("b", 2)]);
        assert!(!both.matches(&row));
    }

    #[test]
    fn test_any_of_requires_one_match() {
        let row = json!({"name": "Ada", "email": "ada@example.com"})
            .as_object()
            .cloned()
            .unwrap();
        let q = Query::new().any_of([
            FilterField::icontains("name", "zzz"),
            FilterField::icontains("email", "EXAMPLE"),
        ]);
        assert!(q.matches(&row));
    }
}
