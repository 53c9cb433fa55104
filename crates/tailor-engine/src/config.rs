use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;

use crate::non_empty_env;

const DEFAULT_OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
const MIN_REQUEST_TIMEOUT_S: f64 = 15.0;
const MAX_REQUEST_TIMEOUT_S: f64 = 300.0;

/// Endpoints, credentials and limits for the remote services.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub openrouter_api_base: String,
    pub openrouter_api_key: Option<String>,
    pub gemini_api_base: String,
    pub gemini_api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            openrouter_api_base: DEFAULT_OPENROUTER_API_BASE.to_string(),
            openrouter_api_key: None,
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            gemini_api_key: None,
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_S),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = |key: &str, default: &str| {
            lookup(key)
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let timeout_s = lookup("TAILOR_REQUEST_TIMEOUT")
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S)
            .clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S);

        Self {
            openrouter_api_base: base("OPENROUTER_API_BASE", DEFAULT_OPENROUTER_API_BASE),
            openrouter_api_key: lookup("OPENROUTER_API_KEY").or_else(|| lookup("OPENAI_API_KEY")),
            gemini_api_base: base("GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE),
            gemini_api_key: lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")),
            request_timeout: Duration::from_secs_f64(timeout_s),
        }
    }

    /// Environment variables that would supply the key `provider` needs, when
    /// that key is not configured. Offline providers need none.
    pub fn missing_credential(&self, provider: &str) -> Option<&'static str> {
        match provider {
            "openrouter" if self.openrouter_api_key.is_none() => {
                Some("OPENROUTER_API_KEY or OPENAI_API_KEY")
            }
            "gemini" if self.gemini_api_key.is_none() => Some("GEMINI_API_KEY or GOOGLE_API_KEY"),
            _ => None,
        }
    }

    /// Blocking client whose timeout bounds every remote call, including
    /// reading a streamed body.
    pub fn http_client(&self) -> Result<HttpClient> {
        HttpClient::builder()
            .timeout(self.request_timeout)
            .build()
            .context("failed to build HTTP client")
    }
}
