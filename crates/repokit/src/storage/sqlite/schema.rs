//! SQLite schema definitions and SQL builders.
//!
//! Every table stores one entity type as `(key, data)` rows where `data` is
//! the entity's JSON document. Filters compile to `json_extract` expressions
//! over that column. Pure functions only; no I/O.

use serde_json::Value;

use repokit_core::query::{Assignment, CompareOp, Filter, OrderBy, QuerySpec};

/// Migration history, created when a store is opened.
pub const CREATE_MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS __repokit_migrations (
    id TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL
)
"#;

pub const SELECT_APPLIED_MIGRATIONS: &str = r#"
SELECT id
FROM __repokit_migrations
ORDER BY rowid ASC
"#;

pub const INSERT_MIGRATION: &str = r#"
INSERT INTO __repokit_migrations (id, applied_at)
VALUES (?1, ?2)
"#;

/// A statement plus its positional parameters, as JSON values.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

/// `json_extract` over a validated dotted field path.
fn field_expr(field: &str) -> String {
    format!("json_extract(data, '$.{field}')")
}

/// The `->` operator keeps JSON types (booleans, objects) intact and yields
/// NULL for absent members.
fn field_json_expr(field: &str) -> String {
    format!("data -> '$.{field}'")
}

pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (key TEXT PRIMARY KEY NOT NULL, data TEXT NOT NULL CHECK (json_valid(data)))",
        quote(table)
    )
}

pub fn create_index_sql(table: &str, name: &str, fields: &[String], unique: bool) -> String {
    let columns: Vec<String> = fields.iter().map(|f| field_expr(f)).collect();
    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        if unique { "UNIQUE " } else { "" },
        quote(name),
        quote(table),
        columns.join(", ")
    )
}

pub fn insert_sql(table: &str) -> String {
    format!("INSERT INTO {} (key, data) VALUES (?1, ?2)", quote(table))
}

pub fn update_sql(table: &str) -> String {
    format!("UPDATE {} SET data = ?2 WHERE key = ?1", quote(table))
}

pub fn delete_sql(table: &str) -> String {
    format!("DELETE FROM {} WHERE key = ?1", quote(table))
}

/// Compiles a filter into a boolean SQL expression, pushing its parameters.
///
/// The expression follows SQL three-valued logic, which is also what the
/// in-memory evaluator implements.
pub fn filter_sql(filter: &Filter, params: &mut Vec<Value>) -> String {
    match filter {
        Filter::Key(key) => {
            params.push(Value::String(key.clone()));
            "key = ?".to_string()
        }
        Filter::KeyIn(keys) if keys.is_empty() => "0".to_string(),
        Filter::KeyIn(keys) => {
            params.extend(keys.iter().cloned().map(Value::String));
            format!("key IN ({})", placeholders(keys.len()))
        }
        Filter::Compare { field, op, value } if value.is_null() => match op {
            CompareOp::Eq => format!("{} IS NULL", field_expr(field)),
            CompareOp::Ne => format!("{} IS NOT NULL", field_expr(field)),
            _ => "NULL".to_string(),
        },
        Filter::Compare { field, op, value } => {
            params.push(value.clone());
            format!("{} {} ?", field_expr(field), op.as_sql())
        }
        Filter::In { field, values } if values.is_empty() => {
            format!("(CASE WHEN {} IS NULL THEN NULL ELSE 0 END)", field_expr(field))
        }
        Filter::In { field, values } => {
            params.extend(values.iter().cloned());
            format!("{} IN ({})", field_expr(field), placeholders(values.len()))
        }
        Filter::IsNull(field) => format!("{} IS NULL", field_expr(field)),
        Filter::And(filters) => join(filters, " AND ", "1", params),
        Filter::Or(filters) => join(filters, " OR ", "0", params),
        Filter::Not(inner) => format!("NOT ({})", filter_sql(inner, params)),
    }
}

fn join(filters: &[Filter], separator: &str, empty: &str, params: &mut Vec<Value>) -> String {
    if filters.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = filters
        .iter()
        .map(|f| format!("({})", filter_sql(f, params)))
        .collect();
    parts.join(separator)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn where_clause(filter: Option<&Filter>, params: &mut Vec<Value>) -> String {
    match filter {
        Some(filter) => format!(" WHERE {}", filter_sql(filter, params)),
        None => String::new(),
    }
}

fn order_clause(order_by: &[OrderBy]) -> String {
    let mut terms: Vec<String> = order_by
        .iter()
        .map(|order| {
            format!(
                "{} {}",
                field_expr(&order.field),
                if order.descending { "DESC" } else { "ASC" }
            )
        })
        .collect();
    terms.push("key ASC".to_string());
    format!(" ORDER BY {}", terms.join(", "))
}

fn limit_clause(spec: &QuerySpec, params: &mut Vec<Value>) -> String {
    match (spec.take, spec.skip) {
        (None, None) => String::new(),
        (take, skip) => {
            // SQLite reads a negative limit as "no limit"
            params.push(take.map_or(Value::from(-1), Value::from));
            params.push(Value::from(skip.unwrap_or(0)));
            " LIMIT ? OFFSET ?".to_string()
        }
    }
}

fn select_sql(columns: &str, table: &str, spec: &QuerySpec) -> SqlQuery {
    let mut params = Vec::new();
    let mut sql = format!("SELECT {columns} FROM {}", quote(table));
    sql.push_str(&where_clause(spec.filter.as_ref(), &mut params));
    sql.push_str(&order_clause(&spec.order_by));
    sql.push_str(&limit_clause(spec, &mut params));
    SqlQuery { sql, params }
}

/// Selects `key, data` of the rows chosen by `spec`.
pub fn select_rows_sql(table: &str, spec: &QuerySpec) -> SqlQuery {
    select_sql("key, data", table, spec)
}

/// Selects the JSON text of one member of the rows chosen by `spec`.
pub fn select_member_sql(table: &str, spec: &QuerySpec, field: &str) -> SqlQuery {
    select_sql(&field_json_expr(field), table, spec)
}

pub fn count_sql(table: &str, filter: Option<&Filter>) -> SqlQuery {
    let mut params = Vec::new();
    let sql = format!(
        "SELECT COUNT(*) FROM {}{}",
        quote(table),
        where_clause(filter, &mut params)
    );
    SqlQuery { sql, params }
}

/// Set-based update through `json_set`. Assigned values are bound as JSON
/// text and parsed back with `json(?)` so they keep their JSON type.
pub fn update_where_sql(
    table: &str,
    filter: Option<&Filter>,
    assignments: &[Assignment],
) -> SqlQuery {
    let mut params = Vec::new();
    let setters: Vec<String> = assignments
        .iter()
        .map(|assignment| {
            params.push(Value::String(assignment.value.to_string()));
            format!("'$.{}', json(?)", assignment.field)
        })
        .collect();

    let mut sql = format!(
        "UPDATE {} SET data = json_set(data, {})",
        quote(table),
        setters.join(", ")
    );
    sql.push_str(&where_clause(filter, &mut params));
    SqlQuery { sql, params }
}

pub fn delete_where_sql(table: &str, filter: Option<&Filter>) -> SqlQuery {
    let mut params = Vec::new();
    let sql = format!(
        "DELETE FROM {}{}",
        quote(table),
        where_clause(filter, &mut params)
    );
    SqlQuery { sql, params }
}
