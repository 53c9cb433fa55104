mod dryrun;
mod gemini;
mod openrouter;

pub use dryrun::{DryrunImageProvider, DryrunJudgeProvider, DryrunTextProvider};
pub use gemini::{GeminiProvider, SseChunks};
pub use openrouter::OpenRouterTextProvider;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use crate::config::EngineConfig;
use crate::source::SourceImage;

/// One piece of a generation response.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkPart {
    Text(String),
    InlineImage { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseChunk {
    pub parts: Vec<ChunkPart>,
}

impl ResponseChunk {
    pub fn first_image(self) -> Option<(String, Vec<u8>)> {
        self.parts.into_iter().find_map(|part| match part {
            ChunkPart::InlineImage { mime_type, data } if !data.is_empty() => {
                Some((mime_type, data))
            }
            _ => None,
        })
    }
}

/// Finite, single-pass sequence of response chunks for one call.
pub type ChunkStream<'a> = Box<dyn Iterator<Item = Result<ResponseChunk>> + Send + 'a>;

pub struct ImageEditRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub source: &'a SourceImage,
}

pub struct JudgeRequest<'a> {
    pub model: &'a str,
    pub reference: &'a SourceImage,
    pub candidate: &'a SourceImage,
    pub rubric: &'a str,
}

/// Text completion constrained to a single JSON object.
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &str;
    fn complete_json(&self, model: &str, system: &str, user: &str) -> Result<String>;
}

pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;
    fn stream_edit<'a>(&'a self, request: &ImageEditRequest<'_>) -> Result<ChunkStream<'a>>;
}

/// Free-text verdict comparing a candidate against the reference.
pub trait JudgeProvider: Send + Sync {
    fn name(&self) -> &str;
    fn compare(&self, request: &JudgeRequest<'_>) -> Result<String>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    text: BTreeMap<String, Arc<dyn TextProvider>>,
    image: BTreeMap<String, Arc<dyn ImageProvider>>,
    judge: BTreeMap<String, Arc<dyn JudgeProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dry-run providers plus the OpenRouter and Gemini clients. Missing
    /// credentials surface when a remote provider is first called.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let http = config.http_client()?;
        let gemini = Arc::new(GeminiProvider::new(
            config.gemini_api_base.clone(),
            config.gemini_api_key.clone(),
            http.clone(),
        ));
        let mut providers = Self::new();
        providers.register_text(Arc::new(DryrunTextProvider));
        providers.register_image(Arc::new(DryrunImageProvider::default()));
        providers.register_judge(Arc::new(DryrunJudgeProvider));
        providers.register_text(Arc::new(OpenRouterTextProvider::new(
            config.openrouter_api_base.clone(),
            config.openrouter_api_key.clone(),
            http,
        )));
        providers.register_image(gemini.clone());
        providers.register_judge(gemini);
        Ok(providers)
    }

    pub fn register_text(&mut self, provider: Arc<dyn TextProvider>) {
        self.text.insert(provider.name().to_string(), provider);
    }

    pub fn register_image(&mut self, provider: Arc<dyn ImageProvider>) {
        self.image.insert(provider.name().to_string(), provider);
    }

    pub fn register_judge(&mut self, provider: Arc<dyn JudgeProvider>) {
        self.judge.insert(provider.name().to_string(), provider);
    }

    pub fn text(&self, name: &str) -> Option<Arc<dyn TextProvider>> {
        self.text.get(name).cloned()
    }

    pub fn image(&self, name: &str) -> Option<Arc<dyn ImageProvider>> {
        self.image.get(name).cloned()
    }

    pub fn judge(&self, name: &str) -> Option<Arc<dyn JudgeProvider>> {
        self.judge.get(name).cloned()
    }
}
