//! ABOUTME: Oracle interface: the external reasoning collaborator, a pure text-in/text-out service
//! ABOUTME: A single chat-only surface; provider selection and prompt construction stay on the other side of it

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Default)]
pub struct OracleOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("oracle request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// `oracle.chat(prompt, systemPrompt, options) -> text`.
/// The core treats the reasoning oracle as a black box; this trait is the
/// entire surface it is allowed to depend on.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn chat(
        &self,
        user_prompt: &str,
        system_prompt: Option<&str>,
        options: OracleOptions,
    ) -> Result<String, OracleError>;
}
