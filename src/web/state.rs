use crate::config::AppConfig;
use crate::db::DbError;
use crate::db::schema::{self, SchemaEntry};
use crate::llm::LlmManager;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

/// The session's generated SQL and its explanation. At most one exists;
/// a new generation or a user edit overwrites it.
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub sql: String,
    pub explanation: String,
}

/// Shared application state for the web server.
pub struct AppState {
    pub config: AppConfig,
    pub llm_manager: Arc<Mutex<LlmManager>>,
    schema_cache: RwLock<Option<Vec<SchemaEntry>>>,
    last_generation: RwLock<Option<Generation>>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, llm_manager: LlmManager) -> Self {
        Self {
            config,
            llm_manager: Arc::new(Mutex::new(llm_manager)),
            schema_cache: RwLock::new(None),
            last_generation: RwLock::new(None),
            startup_time: chrono::Utc::now(),
        }
    }

    /// Schema entries for this session, reading the catalog on first use.
    ///
    /// Only successful fetches are cached, so a failure is reported to the
    /// caller and retried on the next request that needs the schema.
    pub async fn schema_entries(&self) -> Result<Vec<SchemaEntry>, DbError> {
        if let Some(entries) = self.schema_cache.read().await.as_ref() {
            return Ok(entries.clone());
        }

        let entries = schema::read_schema(&self.config.database.connection_string).await?;
        info!("Schema cache filled with {} entries", entries.len());

        let mut cache = self.schema_cache.write().await;
        *cache = Some(entries.clone());
        Ok(entries)
    }

    /// Eager first fetch at startup. Failure is not fatal; the cache stays
    /// empty and the next request retries.
    pub async fn warm_schema_cache(&self) -> Result<usize, DbError> {
        self.schema_entries().await.map(|entries| entries.len())
    }

    /// Cached entries only; never touches the database.
    pub async fn cached_schema(&self) -> Option<Vec<SchemaEntry>> {
        self.schema_cache.read().await.clone()
    }

    /// Replaces the session generation with a fresh one.
    pub async fn store_generation(&self, sql: String, explanation: String) {
        let mut generation = self.last_generation.write().await;
        *generation = Some(Generation { sql, explanation });
    }

    /// Overwrites the stored SQL with the user's edit, keeping the
    /// explanation of the original generation.
    pub async fn update_generated_sql(&self, sql: String) {
        let mut generation = self.last_generation.write().await;
        match generation.as_mut() {
            Some(current) => current.sql = sql,
            None => {
                *generation = Some(Generation {
                    sql,
                    explanation: String::new(),
                })
            }
        }
    }

    pub async fn last_generation(&self) -> Option<Generation> {
        self.last_generation.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, LlmConfig, WebConfig};

    fn test_state() -> AppState {
        let config = AppConfig {
            database: DatabaseConfig {
                connection_string: "postgres://localhost:5432/postgres".to_string(),
                read_only: false,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            llm: LlmConfig {
                backend: "ollama".to_string(),
                model: "test-model".to_string(),
                api_key: None,
                api_url: None,
            },
        };
        let llm_manager = LlmManager::new(&config.llm).unwrap();
        AppState::new(config, llm_manager)
    }

    #[tokio::test]
    async fn session_starts_without_a_generation() {
        let state = test_state();
        assert!(state.last_generation().await.is_none());
    }

    #[tokio::test]
    async fn new_generation_overwrites_the_previous_one() {
        let state = test_state();

        state
            .store_generation("SELECT 1".to_string(), "first".to_string())
            .await;
        state
            .store_generation("SELECT 2".to_string(), "second".to_string())
            .await;

        let generation = state.last_generation().await.unwrap();
        assert_eq!(generation.sql, "SELECT 2");
        assert_eq!(generation.explanation, "second");
    }

    #[tokio::test]
    async fn user_edit_replaces_sql_but_keeps_explanation() {
        let state = test_state();

        state
            .store_generation("SELECT * FROM users".to_string(), "lists users".to_string())
            .await;
        state
            .update_generated_sql("SELECT name FROM users".to_string())
            .await;

        let generation = state.last_generation().await.unwrap();
        assert_eq!(generation.sql, "SELECT name FROM users");
        assert_eq!(generation.explanation, "lists users");
    }

    #[tokio::test]
    async fn edit_without_prior_generation_creates_one() {
        let state = test_state();

        state.update_generated_sql("SELECT 1".to_string()).await;

        let generation = state.last_generation().await.unwrap();
        assert_eq!(generation.sql, "SELECT 1");
        assert_eq!(generation.explanation, "");
    }
}
