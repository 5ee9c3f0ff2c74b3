pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

/// Output cap for every completion call.
pub const MAX_COMPLETION_TOKENS: usize = 300;
/// Zero temperature keeps generation deterministic for a given prompt.
pub const TEMPERATURE: f32 = 0.0;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// Transport seam: send one prompt, get back the completion text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

pub struct LlmManager {
    provider: Box<dyn LlmProvider>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider: Box<dyn LlmProvider> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )));
            }
        };

        Ok(Self { provider })
    }

    /// Instruction + formatted schema -> SQL text, cleaned of markdown fencing.
    ///
    /// An empty completion is an error so callers never execute empty SQL.
    pub async fn generate_sql(
        &self,
        schema_text: &str,
        instruction: &str,
    ) -> Result<String, LlmError> {
        let request = prompt::sql_generation_prompt(schema_text, instruction);
        let completion = self.provider.complete(&request).await?;

        let sql = prompt::strip_code_fences(&completion);
        if sql.is_empty() {
            return Err(LlmError::ResponseError(
                "model returned no SQL".to_string(),
            ));
        }

        Ok(sql)
    }

    /// Second call of the pair: a short plain-text explanation of the SQL.
    pub async fn explain_sql(&self, sql: &str) -> Result<String, LlmError> {
        let request = prompt::explanation_prompt(sql);
        let explanation = self.provider.complete(&request).await?;
        Ok(explanation.trim().to_string())
    }
}
