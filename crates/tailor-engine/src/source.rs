use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::mime_for_path;

/// An image held in memory for the length of a session. The bytes are shared,
/// never written back.
#[derive(Debug, Clone)]
pub struct SourceImage {
    path: PathBuf,
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl SourceImage {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bytes = fs::read(&path).with_context(|| format!("failed reading {}", path.display()))?;
        if bytes.is_empty() {
            bail!("image {} is empty", path.display());
        }
        let mime_type = sniff_mime(&bytes, &path);
        Ok(Self {
            path,
            bytes: bytes.into(),
            mime_type,
        })
    }

    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>, mime_type: &str) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
            mime_type: mime_type.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// `inlineData` request part understood by the Gemini API.
    pub fn inline_part(&self) -> Value {
        json!({
            "inlineData": {
                "mimeType": self.mime_type,
                "data": BASE64.encode(&self.bytes),
            }
        })
    }
}

fn sniff_mime(bytes: &[u8], path: &Path) -> String {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .ok()
        .or_else(|| mime_for_path(path).map(str::to_string))
        .unwrap_or_else(|| "image/png".to_string())
}
