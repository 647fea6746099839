use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::storage::{RepositoryError, Result};

/// Outcome of projecting one member of the first matching row.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberCheck<T> {
    /// No row matched.
    NoMatch,
    /// A row matched but the member is null or absent.
    Null,
    /// A row matched with this member value.
    Value(T),
}

impl<T: DeserializeOwned> MemberCheck<T> {
    /// Builds the outcome from a raw projection (`None` when no row matched).
    pub fn from_projection(projected: Option<Value>) -> Result<Self> {
        match projected {
            None => Ok(MemberCheck::NoMatch),
            Some(Value::Null) => Ok(MemberCheck::Null),
            Some(value) => serde_json::from_value(value)
                .map(MemberCheck::Value)
                .map_err(|e| RepositoryError::Serialization(e.to_string())),
        }
    }
}

impl<T> MemberCheck<T> {
    pub fn value(self) -> Option<T> {
        match self {
            MemberCheck::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn matched(&self) -> bool {
        !matches!(self, MemberCheck::NoMatch)
    }
}

impl<T: Default + PartialEq> MemberCheck<T> {
    /// True only for a non-default member value. A matching row whose member is
    /// the type's default counts as not found.
    pub fn found(&self) -> bool {
        matches!(self, MemberCheck::Value(value) if *value != T::default())
    }
}

/// Decides a scalar existence check.
///
/// With `expected`, the first result must equal it; otherwise it must differ
/// from the type's default.
pub fn check_scalar<T: Default + PartialEq>(first: Option<T>, expected: Option<&T>) -> bool {
    match (first, expected) {
        (None, _) => false,
        (Some(value), Some(expected)) => value == *expected,
        (Some(value), None) => value != T::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_check_variants() {
        let none: MemberCheck<i64> = MemberCheck::from_projection(None).unwrap();
        let null: MemberCheck<i64> = MemberCheck::from_projection(Some(Value::Null)).unwrap();
        let zero: MemberCheck<i64> = MemberCheck::from_projection(Some(json!(0))).unwrap();
        let five: MemberCheck<i64> = MemberCheck::from_projection(Some(json!(5))).unwrap();

        assert_eq!(none, MemberCheck::NoMatch);
        assert_eq!(null, MemberCheck::Null);
        assert!(zero.matched());
        assert!(!zero.found());
        assert!(five.found());
        assert_eq!(five.value(), Some(5));
    }

    #[test]
    fn test_member_check_type_mismatch_is_serialization_error() {
        let result: Result<MemberCheck<i64>> = MemberCheck::from_projection(Some(json!("five")));

        assert!(matches!(result, Err(RepositoryError::Serialization(_))));
    }

    #[test]
    fn test_check_scalar() {
        assert!(!check_scalar::<i64>(None, None));
        assert!(!check_scalar(Some(0), None));
        assert!(check_scalar(Some(3), None));
        assert!(check_scalar(Some(3), Some(&3)));
        assert!(!check_scalar(Some(3), Some(&4)));
        assert!(check_scalar(Some(0), Some(&0)));
    }
}
