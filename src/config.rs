use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ProModeError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/api/v0";
pub const DEFAULT_MODEL: &str = "qwen3-4b-thinking-2507";
pub const DEFAULT_MAX_TOKENS: u32 = 30_000;
pub const DEFAULT_CANDIDATE_TEMPERATURE: f64 = 0.9;
pub const DEFAULT_SYNTHESIS_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_MAX_WORKERS: usize = 16;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

/// Upper bound on candidates per run.
pub const MAX_CANDIDATES: usize = 32;

/// Looked up in the working directory when `PROMODE_CONFIG` is not set.
const DEFAULT_CONFIG_FILE: &str = "promode.toml";

/// Immutable runtime configuration. Built once and handed to the orchestrator;
/// nothing reads ambient defaults after construction.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub candidate_temperature: f64,
    pub synthesis_temperature: f64,
    pub max_workers: usize,
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("candidate_temperature", &self.candidate_temperature)
            .field("synthesis_temperature", &self.synthesis_temperature)
            .field("max_workers", &self.max_workers)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            candidate_temperature: DEFAULT_CANDIDATE_TEMPERATURE,
            synthesis_temperature: DEFAULT_SYNTHESIS_TEMPERATURE,
            max_workers: DEFAULT_MAX_WORKERS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// On-disk overrides. Every field is optional; absent fields keep the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub candidate_temperature: Option<f64>,
    pub synthesis_temperature: Option<f64>,
    pub max_workers: Option<usize>,
    pub request_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self, ProModeError> {
        toml::from_str(text)
            .map_err(|e| ProModeError::InvalidConfiguration(format!("config file: {e}")))
    }

    fn apply(self, config: &mut Config) {
        if let Some(v) = self.base_url {
            config.base_url = v;
        }
        if let Some(v) = self.api_key {
            config.api_key = Some(v);
        }
        if let Some(v) = self.model {
            config.model = v;
        }
        if let Some(v) = self.max_tokens {
            config.max_tokens = v;
        }
        if let Some(v) = self.candidate_temperature {
            config.candidate_temperature = v;
        }
        if let Some(v) = self.synthesis_temperature {
            config.synthesis_temperature = v;
        }
        if let Some(v) = self.max_workers {
            config.max_workers = v;
        }
        if let Some(v) = self.request_timeout_secs {
            config.request_timeout_secs = v;
        }
    }
}

impl Config {
    /// Defaults, then the config file (if any), then `PROMODE_*` env vars.
    pub fn load() -> Self {
        Self::load_with(|key| env::var(key).ok())
    }

    /// `load` against an arbitrary variable source instead of the process env.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = config_file_path(&lookup) {
            match std::fs::read_to_string(&path) {
                Ok(text) => match FileConfig::parse(&text) {
                    Ok(file) => {
                        tracing::info!("loaded config from {}", path.display());
                        file.apply(&mut config);
                    }
                    Err(e) => tracing::warn!("ignoring {}: {e}", path.display()),
                },
                Err(e) => tracing::warn!("cannot read {}: {e}", path.display()),
            }
        }

        config.apply_env_with(&lookup);
        config
    }

    /// Apply `PROMODE_*` overrides. Unparseable values are logged and skipped.
    pub fn apply_env(&mut self) {
        self.apply_env_with(&|key| env::var(key).ok());
    }

    fn apply_env_with(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PROMODE_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("PROMODE_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup("PROMODE_MODEL") {
            self.model = v;
        }
        if let Some(v) = parse_var(lookup, "PROMODE_MAX_TOKENS") {
            self.max_tokens = v;
        }
        if let Some(v) = parse_var(lookup, "PROMODE_MAX_WORKERS") {
            self.max_workers = v;
        }
        if let Some(v) = parse_var(lookup, "PROMODE_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
    }

    pub fn validate(&self) -> Result<(), ProModeError> {
        if self.base_url.trim().is_empty() {
            return Err(ProModeError::InvalidConfiguration(
                "base_url must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ProModeError::InvalidConfiguration(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }
        self.generation_params().validate()
    }

    /// Default per-run parameters derived from this config.
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            model_id: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.candidate_temperature,
            synthesis_temperature: self.synthesis_temperature,
            max_workers: self.max_workers,
            system_prompt: None,
        }
    }
}

/// Per-run generation parameters shared by every candidate and the synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model_id: String,
    /// Budget for each candidate and for the synthesis call.
    pub max_tokens: u32,
    /// Candidate sampling temperature.
    pub temperature: f64,
    pub synthesis_temperature: f64,
    /// Bound on in-flight candidate requests.
    pub max_workers: usize,
    /// Optional system message for candidate requests.
    pub system_prompt: Option<String>,
}

impl GenerationParams {
    pub fn validate(&self) -> Result<(), ProModeError> {
        let invalid = |msg: String| Err(ProModeError::InvalidConfiguration(msg));

        if self.model_id.trim().is_empty() {
            return invalid("model id must not be empty".to_string());
        }
        if self.max_tokens == 0 {
            return invalid("max_tokens must be > 0".to_string());
        }
        validate_temperature("temperature", self.temperature)
            .map_err(ProModeError::InvalidConfiguration)?;
        validate_temperature("synthesis_temperature", self.synthesis_temperature)
            .map_err(ProModeError::InvalidConfiguration)?;
        if self.max_workers == 0 {
            return invalid("max_workers must be >= 1".to_string());
        }
        Ok(())
    }
}

pub fn validate_temperature(name: &str, t: f64) -> Result<(), String> {
    if t.is_nan() || t.is_infinite() || !(0.0..=2.0).contains(&t) {
        return Err(format!("{name} must be between 0.0 and 2.0, got {t}"));
    }
    Ok(())
}

/// Validate prompt is non-empty.
pub fn validate_prompt(prompt: &str) -> Result<(), String> {
    if prompt.trim().is_empty() {
        return Err("prompt must not be empty".to_string());
    }
    Ok(())
}

pub fn validate_n_runs(n_runs: usize) -> Result<(), String> {
    if n_runs < 1 {
        return Err("n_runs must be >= 1".to_string());
    }
    if n_runs > MAX_CANDIDATES {
        return Err(format!("n_runs must be <= {MAX_CANDIDATES}, got {n_runs}"));
    }
    Ok(())
}

fn config_file_path(lookup: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    match lookup("PROMODE_CONFIG") {
        Some(p) if !p.trim().is_empty() => Some(PathBuf::from(p)),
        _ => {
            let local = Path::new(DEFAULT_CONFIG_FILE);
            local.exists().then(|| local.to_path_buf())
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("{key}={raw:?} is not a valid value, ignoring");
            None
        }
    }
}
