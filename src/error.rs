use thiserror::Error;

/// Failure of a single `complete` call against the inference endpoint.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("rate limited by {endpoint}")]
    RateLimited { endpoint: String },

    #[error("auth failed for {endpoint}: {message}")]
    AuthFailed { endpoint: String, message: String },

    #[error("upstream error from {endpoint}: {message}")]
    Upstream {
        endpoint: String,
        message: String,
        status: Option<u16>,
    },

    #[error("schema parse error: {0}")]
    SchemaParse(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl InferenceError {
    /// HTTP status code of the failed exchange, when the endpoint answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Upstream { status, .. } => *status,
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true for transient errors that may succeed on retry.
    /// Nothing in this crate retries; this is for callers layering their own policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Timeout(_) => true,
            // status: None = not from HTTP, treat as permanent
            Self::Upstream { status, .. } => status.is_some_and(|s| s >= 500),
            Self::Request(_) => true,
            _ => false,
        }
    }

    /// Sanitized message that does not leak endpoint URLs or raw response bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout(ms) => format!("request timed out after {ms}ms"),
            Self::RateLimited { .. } => "rate limited by inference endpoint".to_string(),
            Self::AuthFailed { .. } => "authentication with inference endpoint failed".to_string(),
            Self::Upstream {
                status: Some(code), ..
            } => format!("inference endpoint returned status {code}"),
            Self::Upstream { message, .. } => format!("inference endpoint error: {message}"),
            Self::SchemaParse(_) => "failed to parse inference response".to_string(),
            Self::Request(_) => "request to inference endpoint failed".to_string(),
            Self::Other(msg) => msg.clone(),
        }
    }
}

/// Terminal failure of a pro-mode run.
#[derive(Debug, Error)]
pub enum ProModeError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("all {attempted} candidate generations failed")]
    NoCandidatesSucceeded {
        attempted: usize,
        /// (index, error description) per failed candidate, in index order.
        failures: Vec<(usize, String)>,
    },

    #[error("synthesis failed: {source}")]
    SynthesisFailed {
        #[source]
        source: InferenceError,
    },

    #[error("baseline generation failed: {source}")]
    BaselineFailed {
        #[source]
        source: InferenceError,
    },

    #[error("failed to initialize inference client: {0}")]
    Client(String),
}

impl ProModeError {
    /// Short machine-readable tag, used in JSON error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::NoCandidatesSucceeded { .. } => "no_candidates_succeeded",
            Self::SynthesisFailed { .. } => "synthesis_failed",
            Self::BaselineFailed { .. } => "baseline_failed",
            Self::Client(_) => "client",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::SynthesisFailed { source } => format!("synthesis failed: {}", source.user_message()),
            Self::BaselineFailed { source } => {
                format!("baseline generation failed: {}", source.user_message())
            }
            other => other.to_string(),
        }
    }
}
