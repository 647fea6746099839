//! Store-agnostic query descriptions.
//!
//! Filters and query specs are plain data. Stores translate them (SQLite into
//! `json_extract` expressions, the in-memory store by evaluating them directly
//! through [`Filter::matches`]); both follow SQL three-valued logic so results
//! agree across backends.

mod check;
mod filter;
mod naming;
mod spec;

pub use check::{check_scalar, MemberCheck};
pub use filter::{compare_values, lookup_field, CompareOp, Filter};
pub use naming::{validate_field, validate_identifier};
pub use spec::{Assignment, OrderBy, QuerySpec};
