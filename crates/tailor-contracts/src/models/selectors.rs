use thiserror::Error;

use super::registry::{ModelRegistry, ModelSpec};
use super::role::ModelRole;

/// Why a selection did not use the requested model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// The name is unknown or the model does not serve the role.
    Unavailable { requested: String },
    NotRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub role: ModelRole,
    pub model: ModelSpec,
    pub fallback: Option<Fallback>,
}

impl ModelSelection {
    pub fn fallback_reason(&self) -> Option<String> {
        let model = &self.model.name;
        let role = self.role;
        self.fallback.as_ref().map(|fallback| match fallback {
            Fallback::Unavailable { requested } => {
                format!("Requested {role} model '{requested}' unavailable; using '{model}'.")
            }
            Fallback::NotRequested => format!("No {role} model specified; using '{model}'."),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no models registered for the {0} role")]
pub struct NoModelForRole(pub ModelRole);

/// Resolves a requested model name for a role, falling back to the role's
/// registry default.
#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn select(
        &self,
        role: ModelRole,
        requested: Option<&str>,
    ) -> Result<ModelSelection, NoModelForRole> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        if let Some(model) = requested.and_then(|name| self.registry.lookup(name, role)) {
            return Ok(ModelSelection {
                role,
                model: model.clone(),
                fallback: None,
            });
        }
        let model = self
            .registry
            .default_for(role)
            .ok_or(NoModelForRole(role))?;
        let fallback = match requested {
            Some(name) => Fallback::Unavailable {
                requested: name.to_string(),
            },
            None => Fallback::NotRequested,
        };
        Ok(ModelSelection {
            role,
            model: model.clone(),
            fallback: Some(fallback),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judges_only() -> ModelSelector {
        ModelSelector::new(ModelRegistry::from_models([ModelSpec::new(
            "judge-fallback",
            "dryrun",
            &[ModelRole::Judge],
        )]))
    }

    #[test]
    fn requested_model_is_used_when_it_serves_the_role() {
        let selection = ModelSelector::default()
            .select(ModelRole::Judge, Some("dryrun-judge-1"))
            .unwrap();
        assert_eq!(selection.model.name, "dryrun-judge-1");
        assert_eq!(selection.fallback, None);
        assert_eq!(selection.fallback_reason(), None);
    }

    #[test]
    fn wrong_role_falls_back_with_reason() {
        let selection = judges_only()
            .select(ModelRole::Judge, Some("dryrun-image-1"))
            .unwrap();
        assert_eq!(selection.model.name, "judge-fallback");
        assert_eq!(
            selection.fallback,
            Some(Fallback::Unavailable {
                requested: "dryrun-image-1".to_string()
            })
        );
        assert_eq!(
            selection.fallback_reason().as_deref(),
            Some("Requested judge model 'dryrun-image-1' unavailable; using 'judge-fallback'.")
        );
    }

    #[test]
    fn blank_request_uses_default() {
        let selection = ModelSelector::default()
            .select(ModelRole::Text, Some("  "))
            .unwrap();
        assert_eq!(selection.model.name, "openai/gpt-3.5-turbo-0613");
        assert_eq!(selection.fallback, Some(Fallback::NotRequested));
    }

    #[test]
    fn role_without_models_is_an_error() {
        let err = judges_only().select(ModelRole::Image, None).unwrap_err();
        assert_eq!(err, NoModelForRole(ModelRole::Image));
        assert_eq!(err.to_string(), "no models registered for the image role");
    }
}
