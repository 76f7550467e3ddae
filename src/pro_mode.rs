use std::sync::Arc;
use std::time::Instant;

use crate::candidates::{
    CandidateOutcome, candidate_request, generate_candidates, successful_texts,
};
use crate::config::{self, Config, GenerationParams};
use crate::dispatch::http::HttpDispatch;
use crate::dispatch::InferenceClient;
use crate::error::ProModeError;
use crate::progress::{Phase, ProgressEvent, ProgressObserver, TracingObserver};
use crate::response::{FailedCandidate, ProModeResult, ProModeStats};
use crate::synthesis::{build_synthesis_prompt, synthesize};

/// Generate-then-synthesize pipeline.
///
/// Each `run` walks `Generating -> Synthesizing -> Done`, or ends in `Failed`
/// from either active phase. Runs share nothing but the client, so one
/// `ProMode` can serve concurrent calls.
pub struct ProMode {
    client: Arc<dyn InferenceClient>,
    config: Config,
    observer: Arc<dyn ProgressObserver>,
}

impl ProMode {
    pub fn new(client: Arc<dyn InferenceClient>, config: Config) -> Self {
        Self {
            client,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Build against the HTTP endpoint described by `config`.
    pub fn from_config(config: Config) -> Result<Self, ProModeError> {
        config.validate()?;
        let client =
            HttpDispatch::from_config(&config).map_err(|e| ProModeError::Client(e.to_string()))?;
        tracing::info!(endpoint = client.endpoint(), model = %config.model, "pro-mode client ready");
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn client(&self) -> &dyn InferenceClient {
        self.client.as_ref()
    }

    /// `run` with the parameters derived from the configuration.
    pub async fn run_default(
        &self,
        prompt: &str,
        n_runs: usize,
    ) -> Result<ProModeResult, ProModeError> {
        let params = self.config.generation_params();
        self.run(prompt, n_runs, &params).await
    }

    pub async fn run(
        &self,
        prompt: &str,
        n_runs: usize,
        params: &GenerationParams,
    ) -> Result<ProModeResult, ProModeError> {
        // Reject before any request goes out.
        config::validate_prompt(prompt).map_err(ProModeError::InvalidConfiguration)?;
        config::validate_n_runs(n_runs).map_err(ProModeError::InvalidConfiguration)?;
        params.validate()?;

        let start = Instant::now();

        // --- GENERATING ---
        self.enter(start, Phase::Generating);
        let request = candidate_request(prompt, params);
        let outcomes = generate_candidates(
            self.client.clone(),
            &request,
            n_runs,
            params.max_workers,
            self.observer.as_ref(),
        )
        .await;

        let candidates = successful_texts(&outcomes);
        let failed: Vec<FailedCandidate> = outcomes
            .iter()
            .filter_map(|o| match o {
                CandidateOutcome::Failure(index, error) => Some(FailedCandidate {
                    index: *index,
                    error: error.clone(),
                }),
                CandidateOutcome::Success(..) => None,
            })
            .collect();

        if candidates.is_empty() {
            self.enter(start, Phase::Failed);
            tracing::error!("all {n_runs} candidate generations failed, skipping synthesis");
            return Err(ProModeError::NoCandidatesSucceeded {
                attempted: n_runs,
                failures: failed.into_iter().map(|f| (f.index, f.error)).collect(),
            });
        }

        // --- SYNTHESIZING ---
        self.enter(start, Phase::Synthesizing);
        tracing::info!(
            "synthesizing {} of {} candidates into final answer",
            candidates.len(),
            n_runs
        );
        let synthesis_prompt = build_synthesis_prompt(prompt, &candidates);
        let synthesis_start = Instant::now();
        let synthesis = synthesize(self.client.as_ref(), synthesis_prompt, params).await;
        self.observer.on_event(&ProgressEvent::SynthesisFinished {
            succeeded: synthesis.is_ok(),
            elapsed: synthesis_start.elapsed(),
        });

        let synthesis = match synthesis {
            Ok(result) => result,
            Err(source) => {
                self.enter(start, Phase::Failed);
                tracing::error!("synthesis call failed: {source}");
                return Err(ProModeError::SynthesisFailed { source });
            }
        };
        let total_duration = start.elapsed();

        // --- DONE ---
        self.enter(start, Phase::Done);
        let candidate_stats = outcomes
            .into_iter()
            .filter_map(|o| match o {
                CandidateOutcome::Success(_, result) => Some(result),
                CandidateOutcome::Failure(..) => None,
            })
            .collect();

        Ok(ProModeResult {
            final_text: synthesis.text.clone(),
            candidates,
            failed,
            stats: ProModeStats::new(candidate_stats, synthesis, total_duration),
        })
    }

    fn enter(&self, start: Instant, phase: Phase) {
        self.observer.on_event(&ProgressEvent::PhaseChanged {
            phase,
            elapsed: start.elapsed(),
        });
    }
}
