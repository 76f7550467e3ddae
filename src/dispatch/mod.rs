pub mod http;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::InferenceError;

/// One chat-style completion request. Built once per call and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model_id: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature in [0, 2].
    pub temperature: f64,
    /// Sent as a separate system message ahead of the user prompt.
    pub system_prompt: Option<String>,
}

/// Completion text plus the timing/usage statistics reported for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub text: String,
    pub tokens_per_second: f64,
    /// Seconds.
    pub time_to_first_token: f64,
    /// Seconds.
    pub generation_time: f64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// The single capability the orchestrator needs from an inference backend.
///
/// Implementations must not retry: a failed call is reported as-is and the
/// caller decides what to do with it.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(&self, req: &GenerationRequest) -> Result<GenerationResult, InferenceError>;
}
