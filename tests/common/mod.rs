//! Scripted inference clients shared by the integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use promode::config::{Config, GenerationParams};
use promode::dispatch::{GenerationRequest, GenerationResult, InferenceClient};
use promode::error::InferenceError;

/// What the mock does for one call.
#[derive(Clone, Debug)]
pub enum Reply {
    Text(String),
    Status(u16),
    Panic,
}

#[derive(Clone, Debug)]
pub struct Step {
    pub delay: Duration,
    pub reply: Reply,
}

pub fn text(s: &str) -> Step {
    Step {
        delay: Duration::ZERO,
        reply: Reply::Text(s.to_string()),
    }
}

pub fn text_after(s: &str, ms: u64) -> Step {
    Step {
        delay: Duration::from_millis(ms),
        reply: Reply::Text(s.to_string()),
    }
}

pub fn fail(status: u16) -> Step {
    Step {
        delay: Duration::ZERO,
        reply: Reply::Status(status),
    }
}

pub fn result(s: &str) -> GenerationResult {
    GenerationResult {
        text: s.to_string(),
        tokens_per_second: 42.0,
        time_to_first_token: 0.05,
        generation_time: 0.5,
        prompt_tokens: 10,
        completion_tokens: 21,
    }
}

/// Candidate calls consume `candidates` in call order; any request whose
/// prompt carries candidate tags is treated as the synthesis call.
pub struct ScriptedClient {
    candidates: Vec<Step>,
    synthesis: Step,
    candidate_calls: AtomicUsize,
    synthesis_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedClient {
    pub fn new(candidates: Vec<Step>, synthesis: Step) -> Self {
        Self {
            candidates,
            synthesis,
            candidate_calls: AtomicUsize::new(0),
            synthesis_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Candidate `i` answers `cand-{i}` after `delay_ms`.
    pub fn uniform(n: usize, delay_ms: u64, synthesis: &str) -> Self {
        Self::new(
            (0..n).map(|i| text_after(&format!("cand-{i}"), delay_ms)).collect(),
            text(synthesis),
        )
    }

    pub fn total_calls(&self) -> usize {
        self.candidate_calls.load(Ordering::SeqCst) + self.synthesis_calls.load(Ordering::SeqCst)
    }

    pub fn candidate_calls(&self) -> usize {
        self.candidate_calls.load(Ordering::SeqCst)
    }

    pub fn synthesis_calls(&self) -> usize {
        self.synthesis_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn synthesis_prompt(&self) -> Option<String> {
        self.requests()
            .into_iter()
            .find(|r| r.prompt.contains("<cand 1>"))
            .map(|r| r.prompt)
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn complete(&self, req: &GenerationRequest) -> Result<GenerationResult, InferenceError> {
        self.requests.lock().unwrap().push(req.clone());

        let step = if req.prompt.contains("<cand 1>") {
            self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
            self.synthesis.clone()
        } else {
            let i = self.candidate_calls.fetch_add(1, Ordering::SeqCst);
            self.candidates
                .get(i)
                .cloned()
                .unwrap_or_else(|| fail(500))
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match step.reply {
            Reply::Text(s) => Ok(result(&s)),
            Reply::Status(code) => Err(InferenceError::Upstream {
                endpoint: "mock".to_string(),
                message: format!("status {code}"),
                status: Some(code),
            }),
            Reply::Panic => panic!("scripted panic"),
        }
    }
}

pub fn params(max_workers: usize) -> GenerationParams {
    GenerationParams {
        max_workers,
        ..Config::default().generation_params()
    }
}

pub fn candidate_request(prompt: &str) -> GenerationRequest {
    let p = params(16);
    GenerationRequest {
        prompt: prompt.to_string(),
        model_id: p.model_id,
        max_tokens: p.max_tokens,
        temperature: p.temperature,
        system_prompt: None,
    }
}
