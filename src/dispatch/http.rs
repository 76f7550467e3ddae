use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::Config;
use crate::dispatch::{GenerationRequest, GenerationResult, InferenceClient};
use crate::error::InferenceError;

pub const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024; // 4MB

/// Error bodies are only kept for logging; cap what we copy into the message.
const MAX_ERROR_PREVIEW_BYTES: usize = 2048;

/// OpenAI-compatible chat completions client (LM Studio `/api/v0` by default).
pub struct HttpDispatch {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl std::fmt::Debug for HttpDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDispatch")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    /// LM Studio v0 extension; absent on plain OpenAI-compatible servers.
    #[serde(default)]
    stats: Option<Stats>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize, Default)]
struct Stats {
    #[serde(default)]
    tokens_per_second: Option<f64>,
    #[serde(default)]
    time_to_first_token: Option<f64>,
    #[serde(default)]
    generation_time: Option<f64>,
}

/// Build `{base_url}/chat/completions`, tolerating a trailing slash.
pub fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Clamp NaN, infinities and negatives to 0.0.
fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}

impl HttpDispatch {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(16)
            .user_agent(format!("promode/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InferenceError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: chat_completions_url(base_url),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            request_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, InferenceError> {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn too_large(&self, len: usize) -> InferenceError {
        InferenceError::Upstream {
            endpoint: self.endpoint.clone(),
            message: format!("response too large: {len} bytes (max {MAX_RESPONSE_BYTES})"),
            status: None,
        }
    }

    /// Read the body chunk by chunk, bailing out as soon as it passes
    /// MAX_RESPONSE_BYTES instead of buffering whatever the server sends.
    async fn read_capped(
        &self,
        mut response: reqwest::Response,
        timeout_ms: u64,
    ) -> Result<Vec<u8>, InferenceError> {
        if let Some(len) = response.content_length()
            && len > MAX_RESPONSE_BYTES as u64
        {
            return Err(self.too_large(len as usize));
        }

        let mut body = Vec::new();
        loop {
            let chunk = response.chunk().await.map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(timeout_ms)
                } else {
                    InferenceError::Upstream {
                        endpoint: self.endpoint.clone(),
                        message: format!("failed to read response body: {e}"),
                        status: None,
                    }
                }
            })?;
            let Some(chunk) = chunk else {
                break;
            };
            if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
                return Err(self.too_large(body.len() + chunk.len()));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn request_body(req: &GenerationRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref sys) = req.system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": sys}));
        }
        messages.push(serde_json::json!({"role": "user", "content": req.prompt}));

        serde_json::json!({
            "model": req.model_id,
            "messages": messages,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
            "top_p": 1,
            "stream": false,
        })
    }

    fn parse_completion(
        &self,
        bytes: &[u8],
        elapsed: Duration,
    ) -> Result<GenerationResult, InferenceError> {
        let completion: ChatCompletion = serde_json::from_slice(bytes)
            .map_err(|e| InferenceError::SchemaParse(format!("failed to parse response: {e}")))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| InferenceError::Upstream {
                endpoint: self.endpoint.clone(),
                message: "empty choices or null content".to_string(),
                status: None,
            })?;

        let usage = completion.usage.unwrap_or_default();
        let stats = completion.stats.unwrap_or_default();

        // Without server-side stats, fall back to what we measured on the wire.
        let generation_time = non_negative(
            stats
                .generation_time
                .unwrap_or_else(|| elapsed.as_secs_f64()),
        );
        let tokens_per_second = non_negative(stats.tokens_per_second.unwrap_or_else(|| {
            if generation_time > 0.0 {
                usage.completion_tokens as f64 / generation_time
            } else {
                0.0
            }
        }));

        Ok(GenerationResult {
            text,
            tokens_per_second,
            time_to_first_token: non_negative(stats.time_to_first_token.unwrap_or(0.0)),
            generation_time,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}

#[async_trait]
impl InferenceClient for HttpDispatch {
    async fn complete(&self, req: &GenerationRequest) -> Result<GenerationResult, InferenceError> {
        let start = Instant::now();
        let timeout_ms = self.request_timeout.as_millis() as u64;

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .timeout(self.request_timeout)
            .json(&Self::request_body(req));
        if let Some(ref key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout(timeout_ms)
            } else {
                InferenceError::Request(e)
            }
        })?;

        let status = response.status();
        tracing::debug!(model = %req.model_id, %status, "completion response headers received");

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(InferenceError::RateLimited {
                endpoint: self.endpoint.clone(),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(InferenceError::AuthFailed {
                endpoint: self.endpoint.clone(),
                message: format!("{status}"),
            });
        }

        if !status.is_success() {
            let error_bytes = response.bytes().await.unwrap_or_default();
            let truncated = &error_bytes[..error_bytes.len().min(MAX_ERROR_PREVIEW_BYTES)];
            let text = String::from_utf8_lossy(truncated);
            return Err(InferenceError::Upstream {
                endpoint: self.endpoint.clone(),
                message: format!("{status}: {text}"),
                status: Some(status.as_u16()),
            });
        }

        let bytes = self.read_capped(response, timeout_ms).await?;

        self.parse_completion(&bytes, start.elapsed())
    }
}
