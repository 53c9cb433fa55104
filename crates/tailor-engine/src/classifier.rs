use std::sync::Arc;

use tailor_contracts::chat::{
    classifier_system_prompt, parse_decision, ClassificationError, EditDecision,
};

use crate::error_chain_text;
use crate::providers::TextProvider;

/// Turns free text into an [`EditDecision`] with one text-completion call.
#[derive(Clone)]
pub struct IntentClassifier {
    provider: Arc<dyn TextProvider>,
    model: String,
    system_prompt: String,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn TextProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: classifier_system_prompt(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Classifies one request. Not retried; any failure is final for the request.
    pub fn classify(&self, raw_text: &str) -> Result<EditDecision, ClassificationError> {
        let text = raw_text.trim();
        if text.is_empty() {
            return Err(ClassificationError::EmptyInput);
        }
        let content = self
            .provider
            .complete_json(&self.model, &self.system_prompt, text)
            .map_err(|err| ClassificationError::Transport(error_chain_text(&err, 512)))?;
        parse_decision(&content)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use tailor_contracts::chat::{ClassificationError, EditIntent};

    use super::IntentClassifier;
    use crate::providers::TextProvider;

    struct ScriptedText {
        reply: Result<String, String>,
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedText {
        fn new(reply: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl TextProvider for ScriptedText {
        fn name(&self) -> &str {
            "scripted"
        }

        fn complete_json(&self, _model: &str, system: &str, user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.seen.lock() {
                seen.push((system.to_string(), user.to_string()));
            }
            self.reply.clone().map_err(|message| anyhow!(message))
        }
    }

    #[test]
    fn sends_system_instruction_and_trimmed_text() {
        let provider = ScriptedText::new(Ok(r#"{"intent":"color","prompt":"Change the color"}"#));
        let classifier = IntentClassifier::new(provider.clone(), "openai/gpt-3.5-turbo-0613");
        let decision = classifier.classify("  change frock to blue ").unwrap();
        assert_eq!(decision.intent, EditIntent::Color);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.contains("intent detection and prompt rephrasing"));
        assert_eq!(seen[0].1, "change frock to blue");
    }

    #[test]
    fn empty_text_never_reaches_provider() {
        let provider = ScriptedText::new(Ok("{}"));
        let classifier = IntentClassifier::new(provider.clone(), "m");
        assert!(matches!(
            classifier.classify("   "),
            Err(ClassificationError::EmptyInput)
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn transport_failure_is_classification_error_without_retry() {
        let provider = ScriptedText::new(Err("connection reset"));
        let classifier = IntentClassifier::new(provider.clone(), "m");
        let err = classifier.classify("make sleeves full").unwrap_err();
        assert!(matches!(err, ClassificationError::Transport(ref msg) if msg.contains("connection reset")));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn malformed_reply_is_classification_error() {
        let provider = ScriptedText::new(Ok("Sure! The intent is sleeve."));
        let classifier = IntentClassifier::new(provider, "m");
        assert!(matches!(
            classifier.classify("make sleeves full"),
            Err(ClassificationError::MalformedJson(_))
        ));
    }
}
