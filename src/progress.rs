use std::fmt;
use std::time::Duration;

/// Pipeline state of a single pro-mode run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Generating,
    Synthesizing,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generating => "generating",
            Self::Synthesizing => "synthesizing",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// Informational event emitted while a run progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// `elapsed` is measured from the start of the run.
    PhaseChanged {
        phase: Phase,
        elapsed: Duration,
    },
    CandidateFinished {
        index: usize,
        total: usize,
        succeeded: bool,
        elapsed: Duration,
        error: Option<String>,
    },
    SynthesisFinished {
        succeeded: bool,
        elapsed: Duration,
    },
}

/// Receives progress events. Called inline from the pipeline, so keep it cheap;
/// nothing it does can change the outcome of a run.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Default observer: forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::PhaseChanged { phase, elapsed } => tracing::info!(
                %phase,
                "pro-mode phase at {:.2}s",
                elapsed.as_secs_f64()
            ),
            ProgressEvent::CandidateFinished {
                index,
                total,
                succeeded: true,
                elapsed,
                ..
            } => tracing::info!(
                "candidate {}/{} completed in {:.2}s",
                index + 1,
                total,
                elapsed.as_secs_f64()
            ),
            ProgressEvent::CandidateFinished {
                index,
                total,
                error,
                elapsed,
                ..
            } => tracing::warn!(
                "candidate {}/{} failed after {:.2}s: {}",
                index + 1,
                total,
                elapsed.as_secs_f64(),
                error.as_deref().unwrap_or("unknown error")
            ),
            ProgressEvent::SynthesisFinished { succeeded, elapsed } => tracing::info!(
                succeeded,
                "synthesis finished in {:.2}s",
                elapsed.as_secs_f64()
            ),
        }
    }
}
