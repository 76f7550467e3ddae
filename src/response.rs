use std::time::Duration;

use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use crate::dispatch::GenerationResult;
use crate::error::ProModeError;

/// Final product of a pro-mode run.
#[derive(Debug, Clone, Serialize)]
pub struct ProModeResult {
    #[serde(rename = "final")]
    pub final_text: String,
    /// Successful candidate texts in request order.
    pub candidates: Vec<String>,
    /// Candidates that failed, in request order. Never fed to synthesis.
    pub failed: Vec<FailedCandidate>,
    pub stats: ProModeStats,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedCandidate {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProModeStats {
    /// One entry per successful candidate, aligned with `ProModeResult::candidates`.
    pub candidates: Vec<GenerationResult>,
    pub synthesis: GenerationResult,
    #[serde(rename = "total_seconds", serialize_with = "serialize_duration_secs")]
    pub total_duration: Duration,
    #[serde(flatten)]
    pub summary: StatsSummary,
}

/// Aggregates derived once when the stats are assembled.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct StatsSummary {
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    #[serde(serialize_with = "serialize_finite_f64")]
    pub mean_candidate_tokens_per_second: f64,
}

impl StatsSummary {
    fn compute(candidates: &[GenerationResult], synthesis: &GenerationResult) -> Self {
        let total_prompt_tokens =
            candidates.iter().map(|c| c.prompt_tokens).sum::<u64>() + synthesis.prompt_tokens;
        let total_completion_tokens = candidates
            .iter()
            .map(|c| c.completion_tokens)
            .sum::<u64>()
            + synthesis.completion_tokens;
        let mean_candidate_tokens_per_second = if candidates.is_empty() {
            0.0
        } else {
            candidates.iter().map(|c| c.tokens_per_second).sum::<f64>() / candidates.len() as f64
        };
        Self {
            total_prompt_tokens,
            total_completion_tokens,
            mean_candidate_tokens_per_second,
        }
    }
}

impl ProModeStats {
    pub fn new(
        candidates: Vec<GenerationResult>,
        synthesis: GenerationResult,
        total_duration: Duration,
    ) -> Self {
        let summary = StatsSummary::compute(&candidates, &synthesis);
        Self {
            candidates,
            synthesis,
            total_duration,
            summary,
        }
    }

    pub fn total_completion_tokens(&self) -> u64 {
        self.summary.total_completion_tokens
    }

    pub fn total_prompt_tokens(&self) -> u64 {
        self.summary.total_prompt_tokens
    }

    pub fn mean_candidate_tokens_per_second(&self) -> f64 {
        self.summary.mean_candidate_tokens_per_second
    }
}

/// Serialize a duration as fractional seconds, clamping non-finite values to 0.0.
pub(crate) fn serialize_duration_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    serialize_finite_f64(&d.as_secs_f64(), s)
}

fn serialize_finite_f64<S: serde::Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(if v.is_finite() { *v } else { 0.0 })
}

/// JSON envelope returned by the MCP `pro_mode` tool.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProModeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

#[derive(Debug, Serialize)]
pub struct ToolError {
    pub kind: &'static str,
    pub message: String,
}

impl ToolResponse {
    pub fn success(result: ProModeResult) -> Self {
        Self {
            status: "success",
            result: Some(result),
            error: None,
        }
    }

    pub fn error(err: &ProModeError) -> Self {
        Self {
            status: "error",
            result: None,
            error: Some(ToolError {
                kind: err.kind(),
                message: err.user_message(),
            }),
        }
    }

    /// Convert to MCP CallToolResult. Always a transport-level success; the
    /// failure, if any, is reported in the JSON payload.
    pub fn into_call_tool_result(self) -> CallToolResult {
        match serde_json::to_string(&self) {
            Ok(json) => CallToolResult::success(vec![Content::text(json)]),
            Err(e) => {
                let escaped = e.to_string().replace('\\', "\\\\").replace('"', "\\\"");
                CallToolResult::success(vec![Content::text(format!(
                    r#"{{"status":"error","error":{{"kind":"serialization","message":"{escaped}"}}}}"#
                ))])
            }
        }
    }
}

/// Map a run outcome onto the MCP tool reply. Bad arguments are a protocol
/// error (`invalid_params`); every other failure is a successful call whose
/// JSON payload has `status: "error"`.
pub fn tool_result(
    outcome: Result<ProModeResult, ProModeError>,
) -> Result<CallToolResult, McpError> {
    let response = match outcome {
        Ok(result) => ToolResponse::success(result),
        Err(ProModeError::InvalidConfiguration(msg)) => {
            return Err(McpError::invalid_params(msg, None));
        }
        Err(e) => {
            tracing::warn!("pro_mode run failed: {e}");
            ToolResponse::error(&e)
        }
    };
    Ok(response.into_call_tool_result())
}
