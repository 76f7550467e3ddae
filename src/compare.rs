//! Single-shot baseline vs. pro mode on the same prompt.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::candidates::candidate_request;
use crate::config::{self, GenerationParams};
use crate::dispatch::GenerationResult;
use crate::error::ProModeError;
use crate::pro_mode::ProMode;
use crate::response::{ProModeResult, serialize_duration_secs};

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub baseline: GenerationResult,
    #[serde(rename = "baseline_seconds", serialize_with = "serialize_duration_secs")]
    pub baseline_duration: Duration,
    pub pro_mode: ProModeResult,
    #[serde(rename = "pro_mode_seconds", serialize_with = "serialize_duration_secs")]
    pub pro_mode_duration: Duration,
    /// How many times longer pro mode took than the baseline.
    pub time_ratio: f64,
}

/// 0.0 when the baseline took no measurable time.
fn time_ratio(baseline: Duration, pro_mode: Duration) -> f64 {
    let base = baseline.as_secs_f64();
    if base > 0.0 {
        pro_mode.as_secs_f64() / base
    } else {
        0.0
    }
}

impl ProMode {
    /// One plain completion at the candidate settings, then a full `run` on
    /// the same prompt. The baseline goes first so the two never compete
    /// for the endpoint.
    pub async fn compare(
        &self,
        prompt: &str,
        n_runs: usize,
        params: &GenerationParams,
    ) -> Result<Comparison, ProModeError> {
        config::validate_prompt(prompt).map_err(ProModeError::InvalidConfiguration)?;
        config::validate_n_runs(n_runs).map_err(ProModeError::InvalidConfiguration)?;
        params.validate()?;

        let start = Instant::now();
        let baseline = self
            .client()
            .complete(&candidate_request(prompt, params))
            .await
            .map_err(|source| ProModeError::BaselineFailed { source })?;
        let baseline_duration = start.elapsed();
        tracing::info!(
            "baseline finished in {:.2}s",
            baseline_duration.as_secs_f64()
        );

        let start = Instant::now();
        let pro_mode = self.run(prompt, n_runs, params).await?;
        let pro_mode_duration = start.elapsed();

        Ok(Comparison {
            baseline,
            baseline_duration,
            pro_mode,
            pro_mode_duration,
            time_ratio: time_ratio(baseline_duration, pro_mode_duration),
        })
    }
}
