use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Either, Row, TypeInfo};
use tracing::{debug, info};

use crate::db::DbError;

/// Tabular result of one SQL execution. Transient, never persisted.
#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub affected_rows: u64,
    pub statement_kind: String,
}

/// Leading keyword of the statement, uppercased.
pub fn statement_kind(sql: &str) -> String {
    sql.trim()
        .split_whitespace()
        .next()
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Statements that cannot mutate data, by leading keyword.
pub fn is_read_statement(kind: &str) -> bool {
    matches!(kind, "SELECT" | "WITH" | "SHOW" | "EXPLAIN" | "TABLE" | "VALUES")
}

/// Runs arbitrary SQL over a dedicated connection and collects the result.
///
/// The text is executed exactly as supplied. With `read_only` set, statements
/// whose leading keyword is not a read are rejected before a connection is
/// opened; otherwise the configured credential's privileges are the only limit.
pub async fn execute_sql(
    connection_string: &str,
    sql: &str,
    read_only: bool,
) -> Result<QueryResult, DbError> {
    let kind = statement_kind(sql);

    if read_only && !is_read_statement(&kind) {
        return Err(DbError::ReadOnlyViolation(kind));
    }

    info!("Executing SQL: {}", sql.trim());
    let mut conn = PgConnection::connect(connection_string)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    let mut columns = Vec::new();
    let mut rows = Vec::new();
    let mut affected_rows = 0;

    {
        let mut stream = sqlx::query(sql).fetch_many(&mut conn);

        while let Some(result) = stream.next().await {
            match result.map_err(|e| DbError::QueryError(e.to_string()))? {
                Either::Left(done) => {
                    affected_rows += done.rows_affected();
                }
                Either::Right(row) => {
                    if columns.is_empty() {
                        columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }

                    let values = (0..row.columns().len())
                        .map(|i| decode_value(&row, i))
                        .collect::<Vec<_>>();
                    rows.push(values);
                }
            }
        }
    }

    conn.close().await.ok();

    debug!(
        "Statement {} returned {} rows ({} affected)",
        kind,
        rows.len(),
        affected_rows
    );

    Ok(QueryResult {
        columns,
        rows,
        affected_rows,
        statement_kind: kind,
    })
}

/// Decodes one cell into JSON by its runtime Postgres type.
///
/// Anything without a dedicated arm falls back to text, then to a type-name
/// placeholder, so an exotic column never fails the whole result.
fn decode_value(row: &PgRow, index: usize) -> serde_json::Value {
    use sqlx::ValueRef;

    let value_ref = match row.try_get_raw(index) {
        Ok(v) => v,
        Err(_) => return serde_json::Value::Null,
    };

    if value_ref.is_null() {
        return serde_json::Value::Null;
    }

    let type_name = value_ref.type_info().name().to_string();

    match type_name.as_str() {
        "BOOL" => {
            let v: Option<bool> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "INT2" => {
            let v: Option<i16> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "INT4" => {
            let v: Option<i32> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "INT8" => {
            let v: Option<i64> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "FLOAT4" => {
            let v: Option<f32> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "FLOAT8" => {
            let v: Option<f64> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "BPCHAR" => {
            let v: Option<String> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "UUID" => {
            let v: Option<uuid::Uuid> = row.try_get(index).ok();
            serde_json::json!(v.map(|u| u.to_string()))
        }
        "TIMESTAMPTZ" => {
            let v: Option<DateTime<Utc>> = row.try_get(index).ok();
            serde_json::json!(v.map(|t| t.to_rfc3339()))
        }
        "TIMESTAMP" => {
            let v: Option<NaiveDateTime> = row.try_get(index).ok();
            serde_json::json!(v.map(|t| t.to_string()))
        }
        "DATE" => {
            let v: Option<NaiveDate> = row.try_get(index).ok();
            serde_json::json!(v.map(|d| d.to_string()))
        }
        "NUMERIC" => {
            let v: Option<sqlx::types::BigDecimal> = row.try_get(index).ok();
            serde_json::json!(v.map(|d| d.to_string()))
        }
        "JSON" | "JSONB" => {
            let v: Option<serde_json::Value> = row.try_get(index).ok();
            v.unwrap_or(serde_json::Value::Null)
        }
        _ => {
            if let Ok(s) = row.try_get::<String, _>(index) {
                return serde_json::Value::String(s);
            }
            if let Ok(bytes) = value_ref.as_bytes() {
                if let Ok(s) = std::str::from_utf8(bytes) {
                    return serde_json::Value::String(s.to_string());
                }
            }
            serde_json::Value::String(format!("<{}>", type_name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_kind_is_leading_keyword_uppercased() {
        assert_eq!(statement_kind("select * from users"), "SELECT");
        assert_eq!(statement_kind("  \n  WITH t AS (SELECT 1) SELECT * FROM t"), "WITH");
        assert_eq!(statement_kind("drop table users"), "DROP");
        assert_eq!(statement_kind(""), "UNKNOWN");
    }

    #[test]
    fn read_statements_are_classified() {
        assert!(is_read_statement("SELECT"));
        assert!(is_read_statement("WITH"));
        assert!(is_read_statement("EXPLAIN"));
        assert!(!is_read_statement("DELETE"));
        assert!(!is_read_statement("UPDATE"));
        assert!(!is_read_statement("DROP"));
    }

    #[tokio::test]
    async fn read_only_mode_rejects_writes_before_connecting() {
        // Bogus DSN: the guard must fire before any connection attempt
        let err = execute_sql("postgres://nowhere.invalid/none", "DELETE FROM users", true)
            .await
            .unwrap_err();

        match err {
            DbError::ReadOnlyViolation(kind) => assert_eq!(kind, "DELETE"),
            other => panic!("expected read-only violation, got {}", other),
        }
    }
}
