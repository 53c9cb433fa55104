use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tailor_contracts::events::{EventWriter, GENERATION_FAILED};
use tailor_contracts::runs::candidates::Candidate;

use crate::providers::{ImageEditRequest, ImageProvider};
use crate::source::SourceImage;
use crate::{error_chain_text, extension_for_mime, map_object};

/// One generation attempt: prompt text, artifact tag and batch ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub prompt: String,
    pub tag: String,
    pub ordinal: u32,
}

impl GenerationJob {
    pub fn new(prompt: impl Into<String>, tag: impl Into<String>, ordinal: u32) -> Self {
        Self {
            prompt: prompt.into(),
            tag: tag.into(),
            ordinal,
        }
    }
}

#[derive(Clone)]
pub struct ImageGenerator {
    provider: Arc<dyn ImageProvider>,
    model: String,
    out_dir: PathBuf,
    events: EventWriter,
}

impl ImageGenerator {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        model: impl Into<String>,
        out_dir: impl Into<PathBuf>,
        events: EventWriter,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            out_dir: out_dir.into(),
            events,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn artifact_stem(tag: &str) -> String {
        format!("edited_image_{tag}")
    }

    /// Runs one job. Absence covers refusals, text-only replies and every
    /// transport or IO fault; faults are recorded as `generation_failed`.
    pub fn generate(&self, job: &GenerationJob, source: &SourceImage) -> Option<Candidate> {
        match self.try_generate(job, source) {
            Ok(Some(candidate)) => Some(candidate),
            Ok(None) => {
                self.record_failure(job, "stream ended without image data");
                None
            }
            Err(err) => {
                self.record_failure(job, &error_chain_text(&err, 512));
                None
            }
        }
    }

    fn try_generate(&self, job: &GenerationJob, source: &SourceImage) -> Result<Option<Candidate>> {
        let request = ImageEditRequest {
            model: &self.model,
            prompt: &job.prompt,
            source,
        };
        let mut chunks = self.provider.stream_edit(&request)?;
        let first_image = chunks.find_map(|chunk| match chunk {
            Ok(chunk) => chunk.first_image().map(Ok),
            Err(err) => Some(Err(err)),
        });
        drop(chunks);
        let Some((mime_type, data)) = first_image.transpose()? else {
            return Ok(None);
        };

        let image_path = self.out_dir.join(format!(
            "{}.{}",
            Self::artifact_stem(&job.tag),
            extension_for_mime(&mime_type)
        ));
        if same_file(&image_path, source.path()) {
            bail!(
                "refusing to overwrite source image {}",
                source.path().display()
            );
        }
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("failed to create {}", self.out_dir.display()))?;
        fs::write(&image_path, &data)
            .with_context(|| format!("failed to write {}", image_path.display()))?;

        Ok(Some(Candidate {
            image_path,
            mime_type,
            generation_prompt: job.prompt.clone(),
            ordinal: job.ordinal,
            tag: job.tag.clone(),
        }))
    }

    fn record_failure(&self, job: &GenerationJob, reason: &str) {
        self.events.record(
            GENERATION_FAILED,
            map_object(json!({
                "tag": job.tag,
                "ordinal": job.ordinal,
                "model": self.model,
                "provider": self.provider.name(),
                "reason": reason,
            })),
        );
    }
}

fn same_file(left: &Path, right: &Path) -> bool {
    if left == right {
        return true;
    }
    match (fs::canonicalize(left), fs::canonicalize(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}
