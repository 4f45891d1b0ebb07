use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::{AppError, AppResult};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

impl SqlUpdate {
    /// Also sets `column` to the current time on the updated row.
    pub fn stamped(mut self, column: &str) -> Self {
        if let Some(at) = self.sql.rfind(" WHERE ") {
            self.sql.insert_str(at, &format!(", {column} = CURRENT_TIMESTAMP"));
        }
        self
    }
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only keys listed in `allowed` may be set; anything else is rejected
/// rather than silently dropped.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> AppResult<SqlUpdate> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::validation("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(AppError::validation("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(AppError::validation(format!("Field '{unknown}' cannot be updated")));
    }

    // Build SET clause
    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);

    // Convert JSON values → SqlValue
    for value in obj.values() {
        match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    values.push(SqlValue::Date(d));
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    values.push(SqlValue::DateTime(dt));
                } else {
                    values.push(SqlValue::String(s.clone()));
                }
            }
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    values.push(SqlValue::U64(u));
                } else if let Some(i) = n.as_i64() {
                    values.push(SqlValue::I64(i));
                } else if let Some(f) = n.as_f64() {
                    values.push(SqlValue::F64(f));
                }
            }
            Value::Bool(b) => values.push(SqlValue::Bool(*b)),
            Value::Null => values.push(SqlValue::Null),
            _ => return Err(AppError::validation("Unsupported JSON value type")),
        }
    }

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALLOWED: &[&str] = &["name", "department", "join_date", "photo_url"];

    #[test]
    fn builds_set_clause_in_payload_order() {
        let payload = json!({"name": "Asha Rao", "join_date": "2024-01-15", "photo_url": null});
        let update = build_update_sql("profiles", &payload, ALLOWED, "id", 3).unwrap();
        assert_eq!(
            update.sql,
            "UPDATE profiles SET name = ?, join_date = ?, photo_url = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Asha Rao".into()),
                SqlValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
                SqlValue::Null,
                SqlValue::U64(3),
            ]
        );
    }

    #[test]
    fn rejects_fields_outside_whitelist() {
        let payload = json!({"role": "admin"});
        let err = build_update_sql("profiles", &payload, ALLOWED, "id", 3).unwrap_err();
        assert!(err.to_string().contains("'role' cannot be updated"));
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("profiles", &json!({}), ALLOWED, "id", 1).is_err());
        assert!(build_update_sql("profiles", &json!([1, 2]), ALLOWED, "id", 1).is_err());
    }

    #[test]
    fn nested_values_are_unsupported() {
        let payload = json!({"department": {"name": "Ops"}});
        assert!(build_update_sql("profiles", &payload, ALLOWED, "id", 1).is_err());
    }

    #[test]
    fn stamped_update_sets_timestamp_without_binding() {
        let payload = json!({"name": "Asha Rao"});
        let update = build_update_sql("profiles", &payload, ALLOWED, "id", 3)
            .unwrap()
            .stamped("updated_at");
        assert_eq!(
            update.sql,
            "UPDATE profiles SET name = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?"
        );
        assert_eq!(update.values.len(), 2);
    }
}
