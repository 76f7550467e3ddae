use std::time::Duration;

use promode::config::Config;
use promode::dispatch::GenerationResult;
use promode::error::{InferenceError, ProModeError};
use promode::response::{FailedCandidate, ProModeResult, ProModeStats, ToolResponse, tool_result};
use rmcp::model::CallToolResult;
use promode::tools::pro_mode::ProModeRequest;

fn result(text: &str) -> GenerationResult {
    GenerationResult {
        text: text.to_string(),
        tokens_per_second: 30.0,
        time_to_first_token: 0.2,
        generation_time: 1.5,
        prompt_tokens: 5,
        completion_tokens: 45,
    }
}

fn sample() -> ProModeResult {
    ProModeResult {
        final_text: "The answer is 4.".to_string(),
        candidates: vec!["4".to_string(), "four".to_string()],
        failed: vec![FailedCandidate {
            index: 1,
            error: "request timed out after 600000ms".to_string(),
        }],
        stats: ProModeStats::new(
            vec![result("4"), result("four")],
            result("The answer is 4."),
            Duration::from_millis(2500),
        ),
    }
}

#[test]
fn tool_response_success_serializes_correctly() {
    let response = ToolResponse::success(sample());
    let json_str = serde_json::to_string(&response).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();

    assert_eq!(parsed["status"], "success");
    assert_eq!(parsed["result"]["final"], "The answer is 4.");
    assert_eq!(parsed["result"]["candidates"][0], "4");
    assert_eq!(parsed["result"]["failed"][0]["index"], 1);
    assert_eq!(parsed["result"]["stats"]["total_seconds"], 2.5);
    assert_eq!(parsed["result"]["stats"]["synthesis"]["completion_tokens"], 45);
    assert_eq!(parsed["result"]["stats"]["total_completion_tokens"], 135);
    assert_eq!(parsed["result"]["stats"]["total_prompt_tokens"], 15);
    assert_eq!(parsed["result"]["stats"]["mean_candidate_tokens_per_second"], 30.0);
    assert!(parsed.get("error").is_none());
}

#[test]
fn tool_response_error_serializes_correctly() {
    let err = ProModeError::SynthesisFailed {
        source: InferenceError::Upstream {
            endpoint: "http://localhost:1234/api/v0/chat/completions".to_string(),
            message: "502: bad gateway".to_string(),
            status: Some(502),
        },
    };
    let response = ToolResponse::error(&err);
    let parsed: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();

    assert_eq!(parsed["status"], "error");
    assert_eq!(parsed["error"]["kind"], "synthesis_failed");
    let message = parsed["error"]["message"].as_str().unwrap();
    assert!(message.contains("502"));
    assert!(!message.contains("localhost"));
    assert!(parsed.get("result").is_none());
}

/// Pull the JSON payload back out of the first text content block.
fn payload(result: &CallToolResult) -> serde_json::Value {
    let wire = serde_json::to_value(result).unwrap();
    let text = wire["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[test]
fn tool_result_success_carries_result_payload() {
    let result = tool_result(Ok(sample())).unwrap();
    assert!(
        result.is_error != Some(true),
        "successful runs must not set is_error"
    );

    let parsed = payload(&result);
    assert_eq!(parsed["status"], "success");
    assert_eq!(parsed["result"]["final"], "The answer is 4.");
    assert_eq!(parsed["result"]["stats"]["total_completion_tokens"], 135);
}

#[test]
fn tool_result_run_failure_is_a_successful_call_with_error_payload() {
    let err = ProModeError::NoCandidatesSucceeded {
        attempted: 2,
        failures: vec![(0, "upstream error (HTTP 500)".to_string()), (1, "timed out".to_string())],
    };
    let result = tool_result(Err(err)).unwrap();
    assert!(
        result.is_error != Some(true),
        "run failures are reported in the payload, not as is_error"
    );

    let parsed = payload(&result);
    assert_eq!(parsed["status"], "error");
    assert_eq!(parsed["error"]["kind"], "no_candidates_succeeded");
    assert!(parsed.get("result").is_none());
}

#[test]
fn tool_result_invalid_configuration_is_invalid_params() {
    let err = ProModeError::InvalidConfiguration("n_runs must be between 1 and 32".to_string());
    let mcp_err = tool_result(Err(err)).unwrap_err();
    assert_eq!(mcp_err.code.0, -32602);
    assert!(mcp_err.message.contains("n_runs"));
}

#[test]
fn request_overlays_config_defaults() {
    let req: ProModeRequest = serde_json::from_value(serde_json::json!({
        "prompt": "Explain quantum computing in simple terms.",
        "model": "llama-3.2-3b-instruct",
        "temperature": 0.7
    }))
    .unwrap();

    let defaults = Config::default().generation_params();
    let params = req.params(defaults.clone());

    assert_eq!(req.num_candidates(), ProModeRequest::DEFAULT_NUM_CANDIDATES);
    assert_eq!(params.model_id, "llama-3.2-3b-instruct");
    assert_eq!(params.temperature, 0.7);
    assert_eq!(params.synthesis_temperature, defaults.synthesis_temperature);
    assert_eq!(params.max_tokens, defaults.max_tokens);
    assert_eq!(params.max_workers, defaults.max_workers);
}

#[test]
fn blank_model_in_request_falls_back_to_default() {
    let req: ProModeRequest = serde_json::from_value(serde_json::json!({
        "prompt": "hi",
        "model": "  ",
        "num_candidates": 7
    }))
    .unwrap();
    let defaults = Config::default().generation_params();
    let params = req.params(defaults.clone());
    assert_eq!(params.model_id, defaults.model_id);
    assert_eq!(req.num_candidates(), 7);
}

#[test]
fn stats_helpers_on_sample() {
    let stats = sample().stats;
    assert_eq!(stats.total_completion_tokens(), 135);
    assert_eq!(stats.total_prompt_tokens(), 15);
    assert_eq!(stats.mean_candidate_tokens_per_second(), 30.0);
}
