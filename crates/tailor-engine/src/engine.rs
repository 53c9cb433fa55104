use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tailor_contracts::chat::{variation_prompt, ClassificationError, EditDecision, EditIntent};
use tailor_contracts::events::{
    EventWriter, CANDIDATE_CREATED, CANDIDATE_SCORED, CLASSIFICATION_FAILED, EDIT_FINISHED,
    EDIT_REQUESTED, GENERATION_FAILED, GENERATION_STARTED, INTENT_CLASSIFIED, MODEL_CHANGED,
    SELECTION_MADE, SESSION_STARTED,
};
use tailor_contracts::models::{ModelRole, ModelSelection, ModelSelector};
use tailor_contracts::runs::candidates::{select, Candidate, ScoredCandidate, SelectionResult};
use uuid::Uuid;

use crate::classifier::IntentClassifier;
use crate::config::EngineConfig;
use crate::generator::{GenerationJob, ImageGenerator};
use crate::judge::SimilarityJudge;
use crate::map_object;
use crate::providers::ProviderRegistry;
use crate::source::SourceImage;

/// Parallel candidates generated for every sleeve edit; also the worker count.
pub const SLEEVE_VARIANT_COUNT: u32 = 3;

const COLOR_TAG: &str = "color";

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub source_path: PathBuf,
    pub out_dir: PathBuf,
    pub events_path: Option<PathBuf>,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub judge_model: Option<String>,
}

/// What the user is shown for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Unsupported,
    ColorEdited {
        candidate: Candidate,
    },
    ColorFailed,
    SleeveEdited {
        selected: ScoredCandidate,
        scored: Vec<ScoredCandidate>,
    },
    NoSuitableCandidate {
        produced: usize,
        scored: Vec<ScoredCandidate>,
    },
}

impl EditOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::ColorEdited { .. } => "color_edited",
            Self::ColorFailed => "color_failed",
            Self::SleeveEdited { .. } => "sleeve_edited",
            Self::NoSuitableCandidate { .. } => "no_suitable_candidate",
        }
    }

    pub fn image_path(&self) -> Option<&Path> {
        match self {
            Self::ColorEdited { candidate } => Some(candidate.image_path.as_path()),
            Self::SleeveEdited { selected, .. } => Some(selected.candidate.image_path.as_path()),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ColorFailed | Self::NoSuitableCandidate { .. })
    }
}

/// Classify, generate and select for one fixed source image.
pub struct EditEngine {
    out_dir: PathBuf,
    source: SourceImage,
    events: EventWriter,
    model_selector: ModelSelector,
    providers: ProviderRegistry,
    classifier: IntentClassifier,
    generator: ImageGenerator,
    judge: SimilarityJudge,
    fallback_reasons: Vec<String>,
}

impl EditEngine {
    pub fn new(options: EngineOptions, config: &EngineConfig) -> Result<Self> {
        Self::with_providers(
            options,
            ProviderRegistry::from_config(config)?,
            ModelSelector::default(),
        )
    }

    pub fn with_providers(
        options: EngineOptions,
        providers: ProviderRegistry,
        model_selector: ModelSelector,
    ) -> Result<Self> {
        let out_dir = options.out_dir;
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        let source = SourceImage::load(&options.source_path).context("source image unavailable")?;
        let events_path = options
            .events_path
            .unwrap_or_else(|| out_dir.join("events.jsonl"));
        let events = EventWriter::for_new_session(events_path);

        let text = model_selector.select(ModelRole::Text, options.text_model.as_deref())?;
        let image = model_selector.select(ModelRole::Image, options.image_model.as_deref())?;
        let judge = model_selector.select(ModelRole::Judge, options.judge_model.as_deref())?;
        let fallback_reasons: Vec<String> = [&text, &image, &judge]
            .into_iter()
            .filter_map(ModelSelection::fallback_reason)
            .collect();

        let classifier = build_classifier(&providers, &text)?;
        let generator = build_generator(&providers, &image, &out_dir, &events)?;
        let judge = build_judge(&providers, &judge, &events)?;

        events.emit(
            SESSION_STARTED,
            map_object(json!({
                "source": source.path().display().to_string(),
                "source_mime_type": source.mime_type(),
                "out_dir": out_dir.display().to_string(),
                "text_model": classifier.model(),
                "image_model": generator.model(),
                "judge_model": judge.model(),
                "fallback_reasons": fallback_reasons,
            })),
        )?;

        Ok(Self {
            out_dir,
            source,
            events,
            model_selector,
            providers,
            classifier,
            generator,
            judge,
            fallback_reasons,
        })
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn events_path(&self) -> &Path {
        self.events.path()
    }

    pub fn session_id(&self) -> &str {
        self.events.session_id()
    }

    pub fn model(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Text => self.classifier.model(),
            ModelRole::Image => self.generator.model(),
            ModelRole::Judge => self.judge.model(),
        }
    }

    pub fn provider_name(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Text => self.classifier.provider_name(),
            ModelRole::Image => self.generator.provider_name(),
            ModelRole::Judge => self.judge.provider_name(),
        }
    }

    pub fn fallback_reasons(&self) -> &[String] {
        &self.fallback_reasons
    }

    /// One line per role whose provider has no API key in `config`.
    pub fn credential_warnings(&self, config: &EngineConfig) -> Vec<String> {
        ModelRole::ALL
            .into_iter()
            .filter_map(|role| {
                let provider = self.provider_name(role);
                config.missing_credential(provider).map(|keys| {
                    format!(
                        "{role} model '{}' needs {keys} for {provider}; requests will fail.",
                        self.model(role)
                    )
                })
            })
            .collect()
    }

    /// Rebinds one pipeline role. Returns the fallback reason when the
    /// requested model was not usable for that role.
    pub fn set_model(&mut self, role: ModelRole, requested: &str) -> Result<Option<String>> {
        let selection = self.model_selector.select(role, Some(requested))?;
        match role {
            ModelRole::Text => self.classifier = build_classifier(&self.providers, &selection)?,
            ModelRole::Image => {
                self.generator =
                    build_generator(&self.providers, &selection, &self.out_dir, &self.events)?
            }
            ModelRole::Judge => self.judge = build_judge(&self.providers, &selection, &self.events)?,
        }
        let fallback_reason = selection.fallback_reason();
        self.events.record(
            MODEL_CHANGED,
            map_object(json!({
                "role": role.as_str(),
                "requested": requested,
                "model": selection.model.name,
                "provider": selection.model.provider,
                "fallback_reason": fallback_reason,
            })),
        );
        Ok(fallback_reason)
    }

    /// Classification only; nothing is generated.
    pub fn classify(&self, raw_text: &str) -> Result<EditDecision, ClassificationError> {
        self.classifier.classify(raw_text)
    }

    /// Judges an existing image against the source image.
    pub fn score(&self, candidate: &Path) -> Option<f64> {
        self.judge.score(&self.source, candidate)
    }

    /// Runs one edit request end to end. Only classification failures are
    /// errors; generation and scoring problems become failure outcomes.
    pub fn handle(&self, raw_text: &str) -> Result<EditOutcome, ClassificationError> {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        self.events.record(
            EDIT_REQUESTED,
            map_object(json!({
                "request_id": request_id,
                "text": raw_text,
            })),
        );

        let decision = match self.classifier.classify(raw_text) {
            Ok(decision) => decision,
            Err(err) => {
                self.events.record(
                    CLASSIFICATION_FAILED,
                    map_object(json!({
                        "request_id": request_id,
                        "model": self.classifier.model(),
                        "error": err.to_string(),
                    })),
                );
                return Err(err);
            }
        };
        self.events.record(
            INTENT_CLASSIFIED,
            map_object(json!({
                "request_id": request_id,
                "intent": decision.intent.as_str(),
                "prompt": decision.prompt,
                "model": self.classifier.model(),
            })),
        );

        let outcome = match decision.intent {
            EditIntent::Other => EditOutcome::Unsupported,
            EditIntent::Color => self.run_color_edit(&request_id, &decision.prompt),
            EditIntent::Sleeve => self.run_sleeve_edit(&request_id, &decision.prompt),
        };

        self.events.record(
            EDIT_FINISHED,
            map_object(json!({
                "request_id": request_id,
                "intent": decision.intent.as_str(),
                "outcome": outcome.label(),
                "image_path": outcome.image_path().map(|path| path.display().to_string()),
                "latency_s": started.elapsed().as_secs_f64(),
            })),
        );
        Ok(outcome)
    }

    fn run_color_edit(&self, request_id: &str, prompt: &str) -> EditOutcome {
        let job = GenerationJob::new(prompt, COLOR_TAG, 1);
        self.record_generation_started(request_id, &job);
        match self.generator.generate(&job, &self.source) {
            Some(candidate) => {
                self.record_candidate_created(request_id, &candidate);
                EditOutcome::ColorEdited { candidate }
            }
            None => EditOutcome::ColorFailed,
        }
    }

    fn run_sleeve_edit(&self, request_id: &str, base_prompt: &str) -> EditOutcome {
        let jobs: Vec<GenerationJob> = (1..=SLEEVE_VARIANT_COUNT)
            .map(|ordinal| {
                GenerationJob::new(
                    variation_prompt(base_prompt, ordinal),
                    format!("sleeve_{ordinal}"),
                    ordinal,
                )
            })
            .collect();
        for job in &jobs {
            self.record_generation_started(request_id, job);
        }

        let produced = self.generate_concurrently(&jobs);
        let produced_count = produced.len();
        let mut scored = Vec::with_capacity(produced_count);
        for candidate in produced {
            self.record_candidate_created(request_id, &candidate);
            let score = self.judge.score(&self.source, &candidate.image_path);
            self.events.record(
                CANDIDATE_SCORED,
                map_object(json!({
                    "request_id": request_id,
                    "tag": candidate.tag,
                    "ordinal": candidate.ordinal,
                    "score": score,
                    "model": self.judge.model(),
                })),
            );
            scored.push(ScoredCandidate { candidate, score });
        }

        match select(&scored) {
            SelectionResult::Selected(selected) => {
                self.events.record(
                    SELECTION_MADE,
                    map_object(json!({
                        "request_id": request_id,
                        "selected": selected,
                        "scored_count": scored.iter().filter(|entry| entry.score.is_some()).count(),
                    })),
                );
                EditOutcome::SleeveEdited { selected, scored }
            }
            SelectionResult::NoSuitableCandidate => EditOutcome::NoSuitableCandidate {
                produced: produced_count,
                scored,
            },
        }
    }

    /// Fans the jobs out over one scoped worker each and returns the produced
    /// candidates in completion order. A panicking worker counts as absence.
    fn generate_concurrently(&self, jobs: &[GenerationJob]) -> Vec<Candidate> {
        let (sender, receiver) = mpsc::channel();
        let generator = &self.generator;
        let source = &self.source;
        thread::scope(|scope| {
            let workers: Vec<_> = jobs
                .iter()
                .map(|job| {
                    let sender = sender.clone();
                    scope.spawn(move || {
                        let _ = sender.send(generator.generate(job, source));
                    })
                })
                .collect();
            for (job, worker) in jobs.iter().zip(workers) {
                if worker.join().is_err() {
                    self.events.record(
                        GENERATION_FAILED,
                        map_object(json!({
                            "tag": job.tag,
                            "ordinal": job.ordinal,
                            "model": generator.model(),
                            "reason": "generation worker panicked",
                        })),
                    );
                }
            }
        });
        drop(sender);
        receiver.into_iter().flatten().collect()
    }

    fn record_generation_started(&self, request_id: &str, job: &GenerationJob) {
        self.events.record(
            GENERATION_STARTED,
            map_object(json!({
                "request_id": request_id,
                "tag": job.tag,
                "ordinal": job.ordinal,
                "prompt": job.prompt,
                "model": self.generator.model(),
                "provider": self.generator.provider_name(),
            })),
        );
    }

    fn record_candidate_created(&self, request_id: &str, candidate: &Candidate) {
        self.events.record(
            CANDIDATE_CREATED,
            map_object(json!({
                "request_id": request_id,
                "tag": candidate.tag,
                "ordinal": candidate.ordinal,
                "image_path": candidate.image_path.display().to_string(),
                "mime_type": candidate.mime_type,
            })),
        );
    }
}

fn build_classifier(
    providers: &ProviderRegistry,
    selection: &ModelSelection,
) -> Result<IntentClassifier> {
    let Some(provider) = providers.text(&selection.model.provider) else {
        bail!(
            "text provider '{}' not registered for model '{}'",
            selection.model.provider,
            selection.model.name
        );
    };
    Ok(IntentClassifier::new(provider, selection.model.name.clone()))
}

fn build_generator(
    providers: &ProviderRegistry,
    selection: &ModelSelection,
    out_dir: &Path,
    events: &EventWriter,
) -> Result<ImageGenerator> {
    let Some(provider) = providers.image(&selection.model.provider) else {
        bail!(
            "image provider '{}' not registered for model '{}'",
            selection.model.provider,
            selection.model.name
        );
    };
    Ok(ImageGenerator::new(
        provider,
        selection.model.name.clone(),
        out_dir,
        events.clone(),
    ))
}

fn build_judge(
    providers: &ProviderRegistry,
    selection: &ModelSelection,
    events: &EventWriter,
) -> Result<SimilarityJudge> {
    let Some(provider) = providers.judge(&selection.model.provider) else {
        bail!(
            "judge provider '{}' not registered for model '{}'",
            selection.model.provider,
            selection.model.name
        );
    };
    Ok(SimilarityJudge::new(
        provider,
        selection.model.name.clone(),
        events.clone(),
    ))
}
