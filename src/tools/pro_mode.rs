use schemars::JsonSchema;
use serde::Deserialize;

use crate::config::GenerationParams;

/// Generate several candidate answers in parallel and synthesize one final answer.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProModeRequest {
    /// The prompt to answer.
    pub prompt: String,
    /// Number of candidate generations (default: 5, max: 32).
    pub num_candidates: Option<usize>,
    /// Model id loaded in the inference server (defaults to the configured model).
    pub model: Option<String>,
    /// Maximum tokens per candidate and for the synthesis pass.
    pub max_tokens: Option<u32>,
    /// Candidate sampling temperature, 0.0 to 2.0 (default: 0.9).
    pub temperature: Option<f64>,
    /// Synthesis sampling temperature, 0.0 to 2.0 (default: 0.2).
    pub synthesis_temperature: Option<f64>,
    /// System prompt applied to every candidate request.
    pub system_prompt: Option<String>,
}

impl ProModeRequest {
    pub const DEFAULT_NUM_CANDIDATES: usize = 5;

    pub fn num_candidates(&self) -> usize {
        self.num_candidates.unwrap_or(Self::DEFAULT_NUM_CANDIDATES)
    }

    /// Overlay the request's optional fields on the configured defaults.
    pub fn params(&self, defaults: GenerationParams) -> GenerationParams {
        GenerationParams {
            model_id: self
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.model_id),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            synthesis_temperature: self
                .synthesis_temperature
                .unwrap_or(defaults.synthesis_temperature),
            max_workers: defaults.max_workers,
            system_prompt: self.system_prompt.clone().or(defaults.system_prompt),
        }
    }
}
