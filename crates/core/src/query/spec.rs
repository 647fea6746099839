use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{Result, StoredRow};

use super::filter::{compare_values, lookup_field, Filter};
use super::naming::validate_field;

/// Sort key of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// One `field = value` assignment of a set-based update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub field: String,
    pub value: Value,
}

impl Assignment {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A fully composed query against one table.
///
/// Rows are ordered by the requested sort keys and then by row key, so both
/// stores return identical sequences for the same data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub filter: Option<Filter>,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl QuerySpec {
    /// Adds a filter, conjoining it with any existing one.
    pub fn and_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(filter) = &self.filter {
            filter.validate()?;
        }
        self.order_by
            .iter()
            .try_for_each(|order| validate_field(&order.field))
    }

    /// Compares two rows under this spec's ordering.
    pub fn compare_rows(&self, a: &StoredRow, b: &StoredRow) -> Ordering {
        for order in &self.order_by {
            let ordering = compare_values(
                lookup_field(&a.data, &order.field),
                lookup_field(&b.data, &order.field),
            );
            let ordering = if order.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.key.cmp(&b.key)
    }

    /// Evaluates the spec over an in-memory row set.
    pub fn apply<'a, I>(&self, rows: I) -> Vec<StoredRow>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let mut matched: Vec<StoredRow> = rows
            .into_iter()
            .filter(|(key, data)| {
                self.filter
                    .as_ref()
                    .is_none_or(|filter| filter.matches(key, data))
            })
            .map(|(key, data)| StoredRow {
                key: key.clone(),
                data: data.clone(),
            })
            .collect();

        matched.sort_by(|a, b| self.compare_rows(a, b));

        let skip = self.skip.unwrap_or(0) as usize;
        let take = self.take.map(|t| t as usize).unwrap_or(usize::MAX);
        matched.into_iter().skip(skip).take(take).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn rows() -> BTreeMap<String, Value> {
        let mut rows = BTreeMap::new();
        rows.insert("a".to_string(), json!({ "rank": 3, "group": "x" }));
        rows.insert("b".to_string(), json!({ "rank": 1, "group": "y" }));
        rows.insert("c".to_string(), json!({ "rank": 2, "group": "x" }));
        rows.insert("d".to_string(), json!({ "group": "x" }));
        rows
    }

    fn keys(rows: &[StoredRow]) -> Vec<&str> {
        rows.iter().map(|r| r.key.as_str()).collect()
    }

    #[test]
    fn test_default_order_is_by_key() {
        let data = rows();
        let result = QuerySpec::default().apply(&data);

        assert_eq!(keys(&result), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_order_by_puts_nulls_first() {
        let data = rows();
        let spec = QuerySpec {
            order_by: vec![OrderBy {
                field: "rank".to_string(),
                descending: false,
            }],
            ..Default::default()
        };

        assert_eq!(keys(&spec.apply(&data)), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_filter_skip_take() {
        let data = rows();
        let spec = QuerySpec {
            skip: Some(1),
            take: Some(1),
            ..Default::default()
        }
        .and_filter(Filter::eq("group", "x"));

        assert_eq!(keys(&spec.apply(&data)), vec!["c"]);
    }

    #[test]
    fn test_and_filter_conjoins() {
        let spec = QuerySpec::default()
            .and_filter(Filter::eq("a", 1))
            .and_filter(Filter::eq("b", 2));

        assert!(matches!(spec.filter, Some(Filter::And(ref parts)) if parts.len() == 2));
    }

    #[test]
    fn test_validate_checks_order_fields() {
        let spec = QuerySpec {
            order_by: vec![OrderBy {
                field: "bad field".to_string(),
                descending: true,
            }],
            ..Default::default()
        };

        assert!(spec.validate().is_err());
    }
}
