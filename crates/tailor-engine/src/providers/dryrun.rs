use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use sha2::{Digest, Sha256};
use tailor_contracts::chat::{color_prompt, sleeve_prompt, SleeveStyle, OTHER_PROMPT_SENTINEL};

use super::{
    ChunkPart, ChunkStream, ImageEditRequest, ImageProvider, JudgeProvider, JudgeRequest,
    ResponseChunk, TextProvider,
};

const KNOWN_COLORS: &[&str] = &[
    "navy blue",
    "sky blue",
    "emerald green",
    "red",
    "blue",
    "green",
    "yellow",
    "pink",
    "purple",
    "orange",
    "black",
    "white",
    "gold",
    "silver",
    "maroon",
    "teal",
    "beige",
    "lavender",
];

/// Keyword classifier that answers with the same JSON contract as the remote
/// text model.
pub struct DryrunTextProvider;

impl DryrunTextProvider {
    fn decide(user: &str) -> (&'static str, String) {
        let lowered = user.to_ascii_lowercase();
        if lowered.contains("sleeve") {
            let style = if lowered.contains("sleeveless") || lowered.contains("remove") {
                SleeveStyle::Sleeveless
            } else if lowered.contains("full") || lowered.contains("long") {
                SleeveStyle::FullLength
            } else {
                SleeveStyle::Custom(custom_sleeve_name(&lowered))
            };
            return ("sleeve", sleeve_prompt(&style));
        }
        if let Some(color) = KNOWN_COLORS.iter().find(|color| contains_word(&lowered, color)) {
            return ("color", color_prompt(color));
        }
        ("other", OTHER_PROMPT_SENTINEL.to_string())
    }
}

impl TextProvider for DryrunTextProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn complete_json(&self, _model: &str, _system: &str, user: &str) -> Result<String> {
        let (intent, prompt) = Self::decide(user);
        Ok(json!({ "intent": intent, "prompt": prompt }).to_string())
    }
}

/// Streams a text part followed by a flat PNG whose colour is derived from
/// the prompt, so every variation yields a distinct image.
pub struct DryrunImageProvider {
    width: u32,
    height: u32,
}

impl Default for DryrunImageProvider {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
        }
    }
}

impl DryrunImageProvider {
    fn render_png(&self, prompt: &str) -> Result<Vec<u8>> {
        let digest = Sha256::digest(prompt.as_bytes());
        let mut image = RgbImage::new(self.width, self.height);
        for pixel in image.pixels_mut() {
            *pixel = Rgb([digest[0], digest[1], digest[2]]);
        }
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut bytes, ImageFormat::Png)
            .context("dryrun image encode failed")?;
        Ok(bytes.into_inner())
    }
}

impl ImageProvider for DryrunImageProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn stream_edit<'a>(&'a self, request: &ImageEditRequest<'_>) -> Result<ChunkStream<'a>> {
        let data = self.render_png(request.prompt)?;
        let chunks = vec![
            Ok(ResponseChunk {
                parts: vec![ChunkPart::Text("Here is the edited frock.".to_string())],
            }),
            Ok(ResponseChunk {
                parts: vec![ChunkPart::InlineImage {
                    mime_type: "image/png".to_string(),
                    data,
                }],
            }),
        ];
        Ok(Box::new(chunks.into_iter()))
    }
}

/// Deterministic judge: the score is a hash of the candidate bytes.
pub struct DryrunJudgeProvider;

impl JudgeProvider for DryrunJudgeProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn compare(&self, request: &JudgeRequest<'_>) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(request.reference.bytes());
        hasher.update(request.candidate.bytes());
        let digest = hasher.finalize();
        let score = f64::from(digest[0]) * 100.0 / 255.0;
        Ok(format!(
            "FINAL_SCORE: {score:.1} (dryrun {})",
            hex::encode(&digest[..4])
        ))
    }
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn custom_sleeve_name(lowered: &str) -> String {
    let words: Vec<&str> = lowered
        .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '-')
        .filter(|word| !word.is_empty())
        .collect();
    words
        .iter()
        .position(|word| word.starts_with("sleeve"))
        .and_then(|idx| idx.checked_sub(1))
        .map(|idx| words[idx])
        .filter(|word| !matches!(*word, "the" | "my" | "its" | "with" | "to" | "make"))
        .unwrap_or("custom")
        .to_string()
}

#[cfg(test)]
mod tests {
    use tailor_contracts::chat::{parse_decision, EditIntent};

    use super::*;
    use crate::source::SourceImage;

    fn classify(text: &str) -> tailor_contracts::chat::EditDecision {
        let raw = DryrunTextProvider
            .complete_json("dryrun-text-1", "", text)
            .unwrap_or_default();
        parse_decision(&raw).unwrap_or_else(|_| tailor_contracts::chat::EditDecision::unsupported())
    }

    #[test]
    fn sleeve_requests_map_to_templates() {
        let full = classify("make sleeves full");
        assert_eq!(full.intent, EditIntent::Sleeve);
        assert_eq!(full.prompt, sleeve_prompt(&SleeveStyle::FullLength));

        let none = classify("Make it sleeveless please");
        assert_eq!(none.prompt, sleeve_prompt(&SleeveStyle::Sleeveless));

        let bell = classify("give it bell sleeves");
        assert_eq!(
            bell.prompt,
            sleeve_prompt(&SleeveStyle::Custom("bell".to_string()))
        );
    }

    #[test]
    fn color_requests_use_whole_words() {
        let blue = classify("change frock to navy blue");
        assert_eq!(blue.intent, EditIntent::Color);
        assert_eq!(blue.prompt, color_prompt("navy blue"));

        let other = classify("add a bored pocket");
        assert_eq!(other.intent, EditIntent::Other);
    }

    #[test]
    fn image_stream_ends_with_png() -> anyhow::Result<()> {
        let provider = DryrunImageProvider::default();
        let source = SourceImage::from_bytes("frock.png", vec![1], "image/png");
        let chunks: Vec<ResponseChunk> = provider
            .stream_edit(&ImageEditRequest {
                model: "dryrun-image-1",
                prompt: "p (variation 1)",
                source: &source,
            })?
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(chunks.len(), 2);
        let (mime, data) = chunks[1].clone().first_image().unwrap_or_default();
        assert_eq!(mime, "image/png");
        assert_eq!(image::guess_format(&data)?, ImageFormat::Png);
        Ok(())
    }

    #[test]
    fn judge_reply_parses_as_score() -> anyhow::Result<()> {
        let reference = SourceImage::from_bytes("a.png", vec![1], "image/png");
        let candidate = SourceImage::from_bytes("b.png", vec![2], "image/png");
        let reply = DryrunJudgeProvider.compare(&JudgeRequest {
            model: "dryrun-judge-1",
            reference: &reference,
            candidate: &candidate,
            rubric: "",
        })?;
        let score = tailor_contracts::runs::score_text::parse_score(&reply).unwrap_or(-1.0);
        assert!((0.0..=100.0).contains(&score));
        Ok(())
    }
}
