use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::{Id as TaskId, JoinSet};

use crate::config::GenerationParams;
use crate::dispatch::{GenerationRequest, GenerationResult, InferenceClient};
use crate::error::InferenceError;
use crate::progress::{ProgressEvent, ProgressObserver};

/// Result of one candidate request, tagged with its submission index.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Success(usize, GenerationResult),
    Failure(usize, String),
}

impl CandidateOutcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Success(i, _) | Self::Failure(i, _) => *i,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(..))
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        match self {
            Self::Success(_, r) => Some(r),
            Self::Failure(..) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(..) => None,
            Self::Failure(_, e) => Some(e),
        }
    }
}

/// The request every candidate (and a baseline) is sent: the user prompt at
/// the candidate temperature.
pub fn candidate_request(prompt: &str, params: &GenerationParams) -> GenerationRequest {
    GenerationRequest {
        prompt: prompt.to_string(),
        model_id: params.model_id.clone(),
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        system_prompt: params.system_prompt.clone(),
    }
}

/// Fans `n` copies of `request` out to `client`, at most `max_workers` in flight.
///
/// Every request runs to completion on its own; a failure never cancels a
/// sibling. Returns once all `n` outcomes are known, sorted by index.
pub async fn generate_candidates(
    client: Arc<dyn InferenceClient>,
    request: &GenerationRequest,
    n: usize,
    max_workers: usize,
    observer: &dyn ProgressObserver,
) -> Vec<CandidateOutcome> {
    if n == 0 {
        return Vec::new();
    }

    let workers = max_workers.clamp(1, n);
    let pool = Arc::new(Semaphore::new(workers));
    let mut set = JoinSet::new();
    let mut task_index: HashMap<TaskId, usize> = HashMap::new();

    tracing::debug!(n, workers, model = %request.model_id, "dispatching candidates");

    // Submit everything up front; the semaphore does the queueing.
    for index in 0..n {
        let client = client.clone();
        let pool = pool.clone();
        let req = request.clone();

        let handle = set.spawn(async move {
            match pool.acquire_owned().await {
                Ok(_permit) => {
                    let start = Instant::now();
                    let result = client.complete(&req).await;
                    (index, result, start.elapsed())
                }
                Err(_) => (
                    index,
                    Err(InferenceError::Other("worker pool closed".to_string())),
                    Duration::ZERO,
                ),
            }
        });
        task_index.insert(handle.id(), index);
    }

    // One slot per index; each is written at most once.
    let mut slots: Vec<Option<CandidateOutcome>> = vec![None; n];

    while let Some(joined) = set.join_next().await {
        let (outcome, elapsed) = match joined {
            Ok((index, Ok(result), elapsed)) if result.text.trim().is_empty() => {
                (CandidateOutcome::Failure(index, "empty completion".to_string()), elapsed)
            }
            Ok((index, Ok(result), elapsed)) => (CandidateOutcome::Success(index, result), elapsed),
            Ok((index, Err(e), elapsed)) => {
                tracing::debug!(index, "candidate request failed: {e}");
                (CandidateOutcome::Failure(index, e.user_message()), elapsed)
            }
            Err(join_err) => {
                tracing::error!("candidate task panicked: {join_err}");
                let Some(&index) = task_index.get(&join_err.id()) else {
                    continue;
                };
                (
                    CandidateOutcome::Failure(index, format!("task panicked: {join_err}")),
                    Duration::ZERO,
                )
            }
        };

        observer.on_event(&ProgressEvent::CandidateFinished {
            index: outcome.index(),
            total: n,
            succeeded: outcome.is_success(),
            elapsed,
            error: outcome.error().map(str::to_string),
        });

        let index = outcome.index();
        slots[index] = Some(outcome);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| CandidateOutcome::Failure(index, "task did not complete".into()))
        })
        .collect()
}

/// Texts of the successful outcomes, preserving index order.
pub fn successful_texts(outcomes: &[CandidateOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .filter_map(|o| o.result().map(|r| r.text.clone()))
        .collect()
}
