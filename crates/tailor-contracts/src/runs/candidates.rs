use std::path::PathBuf;

use serde::Serialize;

/// One image produced by a generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub image_path: PathBuf,
    pub mime_type: String,
    pub generation_prompt: String,
    /// 1-based variation number within its batch; color edits use 1.
    pub ordinal: u32,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionResult {
    Selected(ScoredCandidate),
    NoSuitableCandidate,
}

impl SelectionResult {
    pub fn selected(&self) -> Option<&ScoredCandidate> {
        match self {
            Self::Selected(scored) => Some(scored),
            Self::NoSuitableCandidate => None,
        }
    }
}

/// Picks the highest-scored candidate. Unscored entries are ignored and equal
/// scores go to the lowest ordinal, so the result does not depend on the
/// order in which generations completed.
pub fn select(scored: &[ScoredCandidate]) -> SelectionResult {
    let mut best: Option<(&ScoredCandidate, f64)> = None;
    for entry in scored {
        let Some(score) = entry.score else {
            continue;
        };
        let replace = match best {
            None => true,
            Some((current, current_score)) => {
                score > current_score
                    || (score == current_score
                        && entry.candidate.ordinal < current.candidate.ordinal)
            }
        };
        if replace {
            best = Some((entry, score));
        }
    }
    match best {
        Some((entry, _)) => SelectionResult::Selected(entry.clone()),
        None => SelectionResult::NoSuitableCandidate,
    }
}
