use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use super::TextProvider;
use crate::response_json_or_error;

/// OpenAI-compatible chat completions served through OpenRouter.
pub struct OpenRouterTextProvider {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl OpenRouterTextProvider {
    pub fn new(api_base: String, api_key: Option<String>, http: HttpClient) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            http,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    pub(crate) fn build_payload(model: &str, system: &str, user: &str) -> Value {
        json!({
            "model": model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        })
    }

    pub(crate) fn extract_message_content(response: &Value) -> Result<String> {
        if let Some(message) = response
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
        {
            bail!("OpenRouter returned an error: {message}");
        }
        let content = response
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if content.is_empty() {
            bail!("OpenRouter response has no message content");
        }
        Ok(content.to_string())
    }
}

impl TextProvider for OpenRouterTextProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn complete_json(&self, model: &str, system: &str, user: &str) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("OPENROUTER_API_KEY or OPENAI_API_KEY not set");
        };
        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&Self::build_payload(model, system, user))
            .send()
            .with_context(|| format!("OpenRouter request failed ({endpoint})"))?;
        let parsed = response_json_or_error("OpenRouter", response)?;
        Self::extract_message_content(&parsed)
    }
}
