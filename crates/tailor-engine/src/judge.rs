use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::json;
use tailor_contracts::chat::judge_rubric_prompt;
use tailor_contracts::events::{EventWriter, SCORE_FAILED};
use tailor_contracts::runs::score_text::{clamp_score, parse_score};

use crate::providers::{JudgeProvider, JudgeRequest};
use crate::source::SourceImage;
use crate::{error_chain_text, map_object, truncate_text};

/// Scores how well a candidate preserves everything but the sleeves.
#[derive(Clone)]
pub struct SimilarityJudge {
    provider: Arc<dyn JudgeProvider>,
    model: String,
    events: EventWriter,
}

impl SimilarityJudge {
    pub fn new(
        provider: Arc<dyn JudgeProvider>,
        model: impl Into<String>,
        events: EventWriter,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            events,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Score in `[0, 100]`, or `None` when the candidate file is unreadable,
    /// the call fails, or the reply holds no number. The reference is the
    /// in-memory image the candidate was edited from.
    pub fn score(&self, reference: &SourceImage, candidate: &Path) -> Option<f64> {
        match self.try_score(reference, candidate) {
            Ok(score) => Some(score),
            Err(err) => {
                self.events.record(
                    SCORE_FAILED,
                    map_object(json!({
                        "reference": reference.path().display().to_string(),
                        "candidate": candidate.display().to_string(),
                        "model": self.model,
                        "provider": self.provider.name(),
                        "reason": error_chain_text(&err, 512),
                    })),
                );
                None
            }
        }
    }

    fn try_score(&self, reference: &SourceImage, candidate: &Path) -> Result<f64> {
        let candidate = SourceImage::load(candidate)?;
        let reply = self.provider.compare(&JudgeRequest {
            model: &self.model,
            reference,
            candidate: &candidate,
            rubric: judge_rubric_prompt(),
        })?;
        let score = parse_score(&reply).ok_or_else(|| {
            anyhow!(
                "could not extract a numeric score from: {}",
                truncate_text(reply.trim(), 200)
            )
        })?;
        Ok(clamp_score(score))
    }
}
