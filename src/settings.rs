use std::env;
use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://api.concentrate.ai/v1";
const DEFAULT_OPENAI_MODELS: &str = "openai/gpt-4o-mini";
const DEFAULT_ANTHROPIC_MODELS: &str = "anthropic/claude-haiku-3";
const DEFAULT_FALLBACK_MODEL: &str = "openai/gpt-4o-mini";

/// Runtime configuration, sourced from the environment (and `.env`) once at
/// startup and passed explicitly into constructors. Nothing here is global
/// state: the client and runner hold their own copies of what they need.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Gateway credential. May be blank here; the client refuses to
    /// construct with a blank key.
    pub api_key: String,
    pub base_url: String,
    pub openai_models: Vec<String>,
    pub anthropic_models: Vec<String>,
    /// Probe model of last resort when the OpenAI list is empty.
    pub fallback_model: String,
    /// Per-attempt HTTP timeout.
    pub request_timeout_secs: u64,
    /// Delay between sequential calls within a phase.
    pub pacing_ms: u64,
    pub output_dir: PathBuf,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        Ok(Settings {
            api_key: env::var("CONCENTRATE_API_KEY").unwrap_or_default(),
            base_url: env::var("CONCENTRATE_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            openai_models: parse_models(
                &env::var("OPENAI_MODELS").unwrap_or_else(|_| DEFAULT_OPENAI_MODELS.to_string()),
                DEFAULT_OPENAI_MODELS,
            ),
            anthropic_models: parse_models(
                &env::var("ANTHROPIC_MODELS")
                    .unwrap_or_else(|_| DEFAULT_ANTHROPIC_MODELS.to_string()),
                DEFAULT_ANTHROPIC_MODELS,
            ),
            fallback_model: env::var("FALLBACK_MODEL")
                .unwrap_or_else(|_| DEFAULT_FALLBACK_MODEL.to_string()),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .map(|v| v.parse().unwrap_or(30))
                .unwrap_or(30),
            pacing_ms: env::var("PACING_MS")
                .map(|v| v.parse().unwrap_or(500))
                .unwrap_or(500),
            output_dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("outputs")),
        })
    }

    /// Model used by the connectivity probe: the first configured OpenAI
    /// model, else the configured fallback.
    pub fn probe_model(&self) -> &str {
        self.openai_models
            .first()
            .map(String::as_str)
            .unwrap_or(&self.fallback_model)
    }
}

/// Splits a comma-separated model list, trimming entries and dropping empty
/// ones. A list that parses to nothing falls back to the provider default so
/// every phase and the probe always have at least one model to use.
pub fn parse_models(raw: &str, default: &str) -> Vec<String> {
    let models: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect();

    if models.is_empty() {
        default
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect()
    } else {
        models
    }
}
