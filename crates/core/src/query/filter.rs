use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::Result;

use super::naming::validate_field;

static NULL: Value = Value::Null;

/// Comparison operator of a [`Filter::Compare`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// SQL spelling of the operator.
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

/// A predicate over stored rows.
///
/// Field names are dotted paths into the entity's JSON document
/// (`"address.city"`). `Key` and `KeyIn` match the row key instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Key(String),
    KeyIn(Vec<String>),
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    IsNull(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn key(key: impl Into<String>) -> Self {
        Filter::Key(key.into())
    }

    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::KeyIn(keys.into_iter().map(Into::into).collect())
    }

    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Filter::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::IsNull(field.into())
    }

    /// Conjunction, flattening nested `And` nodes.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            this => Filter::And(vec![this, other]),
        }
    }

    /// Disjunction, flattening nested `Or` nodes.
    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut filters) => {
                filters.push(other);
                Filter::Or(filters)
            }
            this => Filter::Or(vec![this, other]),
        }
    }

    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Rejects field paths that cannot be safely embedded in a store query.
    pub fn validate(&self) -> Result<()> {
        match self {
            Filter::Key(_) | Filter::KeyIn(_) => Ok(()),
            Filter::Compare { field, .. } | Filter::In { field, .. } | Filter::IsNull(field) => {
                validate_field(field)
            }
            Filter::And(filters) | Filter::Or(filters) => {
                filters.iter().try_for_each(Filter::validate)
            }
            Filter::Not(inner) => inner.validate(),
        }
    }

    /// True when the row satisfies the filter.
    pub fn matches(&self, key: &str, document: &Value) -> bool {
        self.evaluate(key, document) == Some(true)
    }

    /// Three-valued evaluation; `None` is SQL's unknown.
    pub fn evaluate(&self, key: &str, document: &Value) -> Option<bool> {
        match self {
            Filter::Key(expected) => Some(expected == key),
            Filter::KeyIn(keys) => Some(keys.iter().any(|k| k == key)),
            Filter::Compare { field, op, value } => {
                let actual = lookup_field(document, field);
                match op {
                    CompareOp::Eq if value.is_null() => Some(actual.is_null()),
                    CompareOp::Ne if value.is_null() => Some(!actual.is_null()),
                    _ if actual.is_null() || value.is_null() => None,
                    _ => Some(op.holds(compare_values(actual, value))),
                }
            }
            Filter::In { field, values } => {
                let actual = lookup_field(document, field);
                if actual.is_null() {
                    return None;
                }
                let hit = values
                    .iter()
                    .filter(|v| !v.is_null())
                    .any(|v| compare_values(actual, v) == Ordering::Equal);
                if hit {
                    Some(true)
                } else if values.iter().any(Value::is_null) {
                    None
                } else {
                    Some(false)
                }
            }
            Filter::IsNull(field) => Some(lookup_field(document, field).is_null()),
            Filter::And(filters) => {
                let mut unknown = false;
                for filter in filters {
                    match filter.evaluate(key, document) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(true)
                }
            }
            Filter::Or(filters) => {
                let mut unknown = false;
                for filter in filters {
                    match filter.evaluate(key, document) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            Filter::Not(inner) => inner.evaluate(key, document).map(|b| !b),
        }
    }
}

/// Resolves a dotted path in a JSON document. Missing segments yield `Null`.
pub fn lookup_field<'a>(document: &'a Value, field: &str) -> &'a Value {
    let mut current = document;
    for segment in field.split('.') {
        match current.get(segment) {
            Some(value) => current = value,
            None => return &NULL,
        }
    }
    current
}

/// Total order over JSON values matching SQLite's cross-type ordering:
/// null < numbers (booleans as 0/1) < text. Arrays and objects compare as
/// their JSON text, which is what `json_extract` yields for them.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) | Value::Number(_) => 1,
            Value::String(_) | Value::Array(_) | Value::Object(_) => 2,
        }
    }

    fn numeric(value: &Value) -> f64 {
        match value {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => n.as_f64().unwrap_or_default(),
            _ => 0.0,
        }
    }

    fn text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    match rank(a).cmp(&rank(b)) {
        Ordering::Equal => match rank(a) {
            0 => Ordering::Equal,
            1 => numeric(a)
                .partial_cmp(&numeric(b))
                .unwrap_or(Ordering::Equal),
            _ => text(a).cmp(&text(b)),
        },
        other => other,
    }
}
