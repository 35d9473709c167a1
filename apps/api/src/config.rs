use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_MAX_RESUME_CHARS: usize = 15_000;

/// Model, sampling temperature and response-size cap for one kind of LLM request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionProfile {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Application configuration loaded from environment variables.
/// Read once at startup and shared read-only between handlers.
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider credential. `None` leaves the service up but every LLM endpoint answers 503.
    pub groq_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_timeout: Duration,
    pub llm_max_attempts: u32,
    /// Low temperature: the analysis must come back as stable JSON.
    pub analysis: CompletionProfile,
    /// Higher temperature for free-form rewriting.
    pub rewrite: CompletionProfile,
    pub improve: CompletionProfile,
    pub max_resume_chars: usize,
    pub max_upload_bytes: usize,
    pub port: u16,
    /// Level for this crate when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            groq_api_key: None,
            llm_base_url: DEFAULT_BASE_URL.to_string(),
            llm_timeout: Duration::from_secs(60),
            llm_max_attempts: 2,
            analysis: CompletionProfile {
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.2,
                max_tokens: 900,
            },
            rewrite: CompletionProfile {
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.7,
                max_tokens: 800,
            },
            improve: CompletionProfile {
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.3,
                max_tokens: 500,
            },
            max_resume_chars: DEFAULT_MAX_RESUME_CHARS,
            max_upload_bytes: 10 * 1024 * 1024,
            port: 8000,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unset keys keep their defaults,
    /// and blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        config.groq_api_key = get("GROQ_API_KEY");
        if let Some(url) = get("LLM_BASE_URL") {
            config.llm_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("ANALYSIS_MODEL") {
            config.analysis.model = model;
        }
        if let Some(model) = get("REWRITE_MODEL") {
            config.rewrite.model = model.clone();
            config.improve.model = model;
        }
        if let Some(secs) = get("LLM_TIMEOUT_SECS") {
            config.llm_timeout = Duration::from_secs(parse_var("LLM_TIMEOUT_SECS", &secs)?);
        }
        if let Some(attempts) = get("LLM_MAX_ATTEMPTS") {
            config.llm_max_attempts = parse_var("LLM_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(chars) = get("MAX_RESUME_CHARS") {
            config.max_resume_chars = parse_var("MAX_RESUME_CHARS", &chars)?;
        }
        if let Some(bytes) = get("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", &bytes)?;
        }
        if let Some(port) = get("PORT") {
            config.port = parse_var("PORT", &port)?;
        }
        if let Some(level) = get("LOG_LEVEL") {
            config.log_level = level;
        }

        if config.max_resume_chars == 0 {
            bail!("MAX_RESUME_CHARS must be greater than zero");
        }
        if config.llm_max_attempts == 0 {
            bail!("LLM_MAX_ATTEMPTS must be at least 1");
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .ok()
        .with_context(|| format!("Environment variable '{key}' has invalid value '{value}'"))
}
