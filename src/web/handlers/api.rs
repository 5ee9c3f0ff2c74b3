use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::db::executor::{self, QueryResult};
use crate::db::schema::SchemaEntry;
use crate::llm::prompt;
use crate::web::state::{AppState, Generation};

#[derive(Debug, Deserialize)]
pub struct NlQueryRequest {
    pub instruction: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteSqlRequest {
    pub sql: String,
}

/// One response shape for both the generate path and the re-run path.
///
/// Execution errors ride inside the body so the page can keep showing the
/// SQL and its explanation next to the error banner.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub sql: String,
    pub explanation: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    pub affected_rows: u64,
    pub statement_kind: String,
    pub execution_time_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub table_count: usize,
    pub column_count: usize,
    pub read_only: bool,
}

impl QueryResponse {
    fn from_result(
        sql: String,
        explanation: String,
        result: QueryResult,
        elapsed_ms: u64,
    ) -> Self {
        let row_count = result.rows.len();
        Self {
            sql,
            explanation,
            columns: result.columns,
            rows: result.rows,
            row_count,
            affected_rows: result.affected_rows,
            statement_kind: result.statement_kind,
            execution_time_ms: elapsed_ms,
            error: None,
        }
    }

    fn from_error(sql: String, explanation: String, error: String, elapsed_ms: u64) -> Self {
        let statement_kind = executor::statement_kind(&sql);
        Self {
            sql,
            explanation,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            affected_rows: 0,
            statement_kind,
            execution_time_ms: elapsed_ms,
            error: Some(error),
        }
    }
}

/// "Query": instruction -> generated SQL -> execution -> result.
pub async fn nl_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NlQueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    let instruction = payload.instruction.trim();
    if instruction.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Instruction must not be empty".to_string()));
    }

    info!("Generating SQL for instruction: {}", instruction);

    let entries = state.schema_entries().await.map_err(|e| {
        error!("Failed to read database schema: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read database schema: {}", e),
        )
    })?;
    let schema_text = prompt::format_schema(&entries);

    // Two sequential model calls: SQL first, then its explanation. A failed
    // SQL call aborts the action before any execution; a failed explanation
    // call degrades to inline error text.
    let (sql, explanation) = {
        let llm = state.llm_manager.lock().await;

        let sql = llm.generate_sql(&schema_text, instruction).await.map_err(|e| {
            error!("SQL generation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{}", e))
        })?;
        info!("Generated SQL: {}", sql);

        let explanation = match llm.explain_sql(&sql).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Explanation generation failed: {}", e);
                format!("Error generating explanation: {}", e)
            }
        };

        (sql, explanation)
    };

    state.store_generation(sql.clone(), explanation.clone()).await;

    let start_time = Instant::now();
    let outcome = executor::execute_sql(
        &state.config.database.connection_string,
        &sql,
        state.config.database.read_only,
    )
    .await;
    let elapsed_ms = start_time.elapsed().as_millis() as u64;

    let response = match outcome {
        Ok(result) => {
            info!(
                "Query executed successfully. Row count: {}, Execution time: {}ms",
                result.rows.len(),
                elapsed_ms
            );
            QueryResponse::from_result(sql, explanation, result, elapsed_ms)
        }
        Err(e) => {
            error!("Error executing SQL: {}", e);
            QueryResponse::from_error(sql, explanation, e.to_string(), elapsed_ms)
        }
    };

    Ok(Json(response))
}

/// "Query Again": runs exactly the user-edited SQL text and records the edit
/// as the session's SQL.
pub async fn execute_edited(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteSqlRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    if payload.sql.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "SQL must not be empty".to_string()));
    }

    state.update_generated_sql(payload.sql.clone()).await;
    let explanation = state
        .last_generation()
        .await
        .map(|g| g.explanation)
        .unwrap_or_default();

    let start_time = Instant::now();
    let outcome = executor::execute_sql(
        &state.config.database.connection_string,
        &payload.sql,
        state.config.database.read_only,
    )
    .await;
    let elapsed_ms = start_time.elapsed().as_millis() as u64;

    let response = match outcome {
        Ok(result) => {
            info!(
                "Edited query executed successfully. Row count: {}, Execution time: {}ms",
                result.rows.len(),
                elapsed_ms
            );
            QueryResponse::from_result(payload.sql, explanation, result, elapsed_ms)
        }
        Err(e) => {
            error!("Error executing SQL: {}", e);
            QueryResponse::from_error(payload.sql, explanation, e.to_string(), elapsed_ms)
        }
    };

    Ok(Json(response))
}

/// Sidebar schema listing, from the session cache.
pub async fn get_schema(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SchemaEntry>>, (StatusCode, String)> {
    let entries = state.schema_entries().await.map_err(|e| {
        error!("Failed to read database schema: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read database schema: {}", e),
        )
    })?;

    Ok(Json(entries))
}

/// The stored generation, so a reloaded page can restore its editor.
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<Option<Generation>> {
    Json(state.last_generation().await)
}

pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds();

    let cached = state.cached_schema().await.unwrap_or_default();
    let mut tables: Vec<&str> = cached.iter().map(|e| e.table_name.as_str()).collect();
    tables.dedup();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        table_count: tables.len(),
        column_count: cached.len(),
        read_only: state.config.database.read_only,
    })
}
