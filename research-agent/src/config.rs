//! Model client configuration

use std::env;
use std::time::Duration;

use research_core::ResearchError;

pub const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_REASONING_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";
pub const DEFAULT_SEARCH_MODEL: &str = "compound-beta-mini";

/// Which model variant a call should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    /// Fast reasoning model for planning and synthesis
    Reasoning,
    /// Slower tool-augmented model that runs web searches
    Search,
}

/// Configuration for the chat-completion upstream
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    pub api_base: String,
    pub reasoning_model: String,
    pub search_model: String,
    /// Deadline for a single HTTP call to the upstream
    pub request_timeout: Duration,
    /// Extra attempts after the first failure on retryable errors
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further one
    pub retry_delay: Duration,
}

impl ModelConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            reasoning_model: DEFAULT_REASONING_MODEL.to_string(),
            search_model: DEFAULT_SEARCH_MODEL.to_string(),
            request_timeout: Duration::from_secs(default_timeout_secs()),
            max_retries: default_max_retries(),
            retry_delay: Duration::from_millis(default_retry_delay_ms()),
        }
    }

    /// Load model configuration from environment variables
    ///
    /// Expects:
    /// - GROQ_API_KEY: API key for the upstream (required)
    /// - GROQ_API_BASE: OpenAI-compatible base URL
    /// - RESEARCH_REASONING_MODEL / RESEARCH_SEARCH_MODEL: model ids
    /// - RESEARCH_REQUEST_TIMEOUT_SECS, RESEARCH_MAX_RETRIES, RESEARCH_RETRY_DELAY_MS
    pub fn from_env() -> Result<Self, ResearchError> {
        let api_key = env::var("GROQ_API_KEY")
            .map_err(|_| ResearchError::config("GROQ_API_KEY environment variable not set"))?;

        if api_key.trim().is_empty() {
            return Err(ResearchError::config("GROQ_API_KEY is empty"));
        }

        let mut config = Self::new(api_key);

        if let Ok(base) = env::var("GROQ_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Ok(model) = env::var("RESEARCH_REASONING_MODEL") {
            config.reasoning_model = model;
        }
        if let Ok(model) = env::var("RESEARCH_SEARCH_MODEL") {
            config.search_model = model;
        }

        config.request_timeout = Duration::from_secs(parse_var(
            "RESEARCH_REQUEST_TIMEOUT_SECS",
            default_timeout_secs(),
        )?);
        config.max_retries = parse_var("RESEARCH_MAX_RETRIES", default_max_retries())?;
        config.retry_delay = Duration::from_millis(parse_var(
            "RESEARCH_RETRY_DELAY_MS",
            default_retry_delay_ms(),
        )?);

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ResearchError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ResearchError::config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}
