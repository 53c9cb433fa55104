use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::prompts::OTHER_PROMPT_SENTINEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditIntent {
    Sleeve,
    Color,
    Other,
}

impl EditIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sleeve => "sleeve",
            Self::Color => "color",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EditIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditIntent {
    type Err = ClassificationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sleeve" => Ok(Self::Sleeve),
            "color" => Ok(Self::Color),
            "other" => Ok(Self::Other),
            _ => Err(ClassificationError::UnknownIntent(raw.to_string())),
        }
    }
}

/// The classifier's verdict for one request. `prompt` is ready to send to the
/// image model, or the `"none"` sentinel when `intent` is `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDecision {
    pub intent: EditIntent,
    pub prompt: String,
}

impl EditDecision {
    pub fn new(intent: EditIntent, prompt: impl Into<String>) -> Self {
        let prompt = match intent {
            EditIntent::Other => OTHER_PROMPT_SENTINEL.to_string(),
            _ => prompt.into(),
        };
        Self { intent, prompt }
    }

    pub fn unsupported() -> Self {
        Self::new(EditIntent::Other, OTHER_PROMPT_SENTINEL)
    }
}

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("edit request text is empty")]
    EmptyInput,
    #[error("classifier request failed: {0}")]
    Transport(String),
    #[error("classifier returned malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("classifier response is missing field '{0}'")]
    MissingField(&'static str),
    #[error("classifier returned unknown intent '{0}'")]
    UnknownIntent(String),
    #[error("classifier returned an empty prompt for intent '{0}'")]
    EmptyPrompt(EditIntent),
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    intent: Option<Value>,
    prompt: Option<Value>,
}

/// Parses the JSON object produced by the text-completion service.
pub fn parse_decision(content: &str) -> Result<EditDecision, ClassificationError> {
    let raw: RawDecision = serde_json::from_str(content.trim())?;
    let intent = raw
        .intent
        .as_ref()
        .and_then(Value::as_str)
        .ok_or(ClassificationError::MissingField("intent"))?
        .parse::<EditIntent>()?;
    if intent == EditIntent::Other {
        return Ok(EditDecision::unsupported());
    }
    let prompt = raw
        .prompt
        .as_ref()
        .and_then(Value::as_str)
        .ok_or(ClassificationError::MissingField("prompt"))?
        .trim()
        .to_string();
    if prompt.is_empty() || prompt == OTHER_PROMPT_SENTINEL {
        return Err(ClassificationError::EmptyPrompt(intent));
    }
    Ok(EditDecision::new(intent, prompt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sleeve_decision() {
        let decision =
            parse_decision(r#"{"intent": "sleeve", "prompt": "Extend the sleeves"}"#).unwrap();
        assert_eq!(decision.intent, EditIntent::Sleeve);
        assert_eq!(decision.prompt, "Extend the sleeves");
    }

    #[test]
    fn intent_is_case_insensitive() {
        let decision = parse_decision(r#"{"intent": " Color ", "prompt": "blue"}"#).unwrap();
        assert_eq!(decision.intent, EditIntent::Color);
    }

    #[test]
    fn other_always_carries_sentinel_prompt() {
        let decision =
            parse_decision(r#"{"intent": "other", "prompt": "add a pocket"}"#).unwrap();
        assert_eq!(decision, EditDecision::unsupported());
        assert_eq!(decision.prompt, "none");
        let bare = parse_decision(r#"{"intent": "other"}"#).unwrap();
        assert_eq!(bare, EditDecision::unsupported());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = parse_decision("intent: sleeve").unwrap_err();
        assert!(matches!(err, ClassificationError::MalformedJson(_)));
    }

    #[test]
    fn unknown_intent_is_an_error() {
        let err = parse_decision(r#"{"intent": "pattern", "prompt": "x"}"#).unwrap_err();
        assert!(matches!(err, ClassificationError::UnknownIntent(ref value) if value == "pattern"));
    }

    #[test]
    fn missing_fields_are_errors() {
        let err = parse_decision(r#"{"prompt": "x"}"#).unwrap_err();
        assert!(matches!(err, ClassificationError::MissingField("intent")));
        let err = parse_decision(r#"{"intent": "color"}"#).unwrap_err();
        assert!(matches!(err, ClassificationError::MissingField("prompt")));
    }

    #[test]
    fn non_string_intent_is_missing() {
        let err = parse_decision(r#"{"intent": 3, "prompt": "x"}"#).unwrap_err();
        assert!(matches!(err, ClassificationError::MissingField("intent")));
    }

    #[test]
    fn supported_intent_needs_real_prompt() {
        let err = parse_decision(r#"{"intent": "sleeve", "prompt": "none"}"#).unwrap_err();
        assert!(matches!(
            err,
            ClassificationError::EmptyPrompt(EditIntent::Sleeve)
        ));
        let err = parse_decision(r#"{"intent": "color", "prompt": "  "}"#).unwrap_err();
        assert!(matches!(err, ClassificationError::EmptyPrompt(EditIntent::Color)));
    }
}
