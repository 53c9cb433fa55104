use std::io::{BufRead, BufReader};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use super::{
    ChunkPart, ChunkStream, ImageEditRequest, ImageProvider, JudgeProvider, JudgeRequest,
    ResponseChunk,
};
use crate::{response_json_or_error, truncate_text};

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini `generativelanguage` client, used both for streamed image edits and
/// as the judge.
pub struct GeminiProvider {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(api_base: String, api_key: Option<String>, http: HttpClient) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            http,
        }
    }

    fn api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) => Ok(key),
            None => bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set"),
        }
    }

    fn endpoint_for_model(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:{}", self.api_base, model_path, method)
    }

    fn strict_safety_settings() -> Vec<Value> {
        SAFETY_CATEGORIES
            .into_iter()
            .map(|category| {
                json!({
                    "category": category,
                    "threshold": "BLOCK_LOW_AND_ABOVE",
                })
            })
            .collect()
    }

    pub(crate) fn edit_payload(request: &ImageEditRequest<'_>) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    request.source.inline_part(),
                    { "text": request.prompt },
                ],
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE", "TEXT"],
            },
            "safetySettings": Self::strict_safety_settings(),
        })
    }

    pub(crate) fn judge_payload(request: &JudgeRequest<'_>) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    request.reference.inline_part(),
                    request.candidate.inline_part(),
                    { "text": request.rubric },
                ],
            }],
            "generationConfig": {
                "responseModalities": ["TEXT"],
            },
        })
    }

    pub(crate) fn extract_text(response: &Value) -> String {
        response_parts(response)
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<&str>>()
            .join("\n")
    }
}

impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn stream_edit<'a>(&'a self, request: &ImageEditRequest<'_>) -> Result<ChunkStream<'a>> {
        let api_key = self.api_key()?;
        let endpoint = self.endpoint_for_model(request.model, "streamGenerateContent");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("alt", "sse"), ("key", api_key)])
            .json(&Self::edit_payload(request))
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!(
                "Gemini request failed ({}): {}",
                status.as_u16(),
                truncate_text(&body, 512)
            );
        }
        Ok(Box::new(SseChunks::new(BufReader::new(response))))
    }
}

impl JudgeProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn compare(&self, request: &JudgeRequest<'_>) -> Result<String> {
        let api_key = self.api_key()?;
        let endpoint = self.endpoint_for_model(request.model, "generateContent");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(&Self::judge_payload(request))
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let parsed = response_json_or_error("Gemini", response)?;
        let text = Self::extract_text(&parsed);
        if text.is_empty() {
            bail!("Gemini judge returned no text");
        }
        Ok(text)
    }
}

/// Server-sent events reader yielding one [`ResponseChunk`] per event.
///
/// Reads lazily from the underlying body; dropping it stops consumption.
pub struct SseChunks<R> {
    reader: R,
    finished: bool,
}

impl<R: BufRead> SseChunks<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            finished: false,
        }
    }

    fn next_event_data(&mut self) -> Result<Option<String>> {
        let mut data = String::new();
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .context("Gemini stream read failed")?;
            if read == 0 {
                self.finished = true;
                return Ok((!data.is_empty()).then_some(data));
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                if data.is_empty() {
                    continue;
                }
                return Ok(Some(data));
            }
            if let Some(rest) = line.strip_prefix("data:") {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }
    }
}

impl<R: BufRead> Iterator for SseChunks<R> {
    type Item = Result<ResponseChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_event_data() {
            Ok(Some(data)) if data.trim() == "[DONE]" => {
                self.finished = true;
                None
            }
            Ok(Some(data)) => Some(parse_stream_payload(&data)),
            Ok(None) => None,
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

fn response_parts(response: &Value) -> Vec<Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

pub(crate) fn parse_stream_payload(data: &str) -> Result<ResponseChunk> {
    let payload: Value =
        serde_json::from_str(data).context("Gemini stream event is not valid JSON")?;
    if let Some(error) = payload.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        bail!("Gemini stream error: {message}");
    }

    let mut parts = Vec::new();
    for part in response_parts(&payload) {
        let inline = part.get("inlineData").or_else(|| part.get("inline_data"));
        if let Some(inline) = inline {
            let encoded = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png")
                .to_string();
            let data = BASE64
                .decode(encoded.as_bytes())
                .context("Gemini image base64 decode failed")?;
            parts.push(ChunkPart::InlineImage { mime_type, data });
            continue;
        }
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            parts.push(ChunkPart::Text(text.to_string()));
        }
    }
    Ok(ResponseChunk { parts })
}
