use indexmap::IndexMap;

use super::role::ModelRole;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    /// Registry key of the provider that serves this model.
    pub provider: String,
    pub roles: Vec<ModelRole>,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, provider: impl Into<String>, roles: &[ModelRole]) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            roles: roles.to_vec(),
        }
    }

    pub fn serves(&self, role: ModelRole) -> bool {
        self.roles.contains(&role)
    }
}

/// Known models in preference order; the first model serving a role is that
/// role's default.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelRegistry {
    /// Remote models first, then the offline `dryrun-*` models.
    pub fn builtin() -> Self {
        use ModelRole::{Image, Judge, Text};
        Self::from_models([
            ModelSpec::new("openai/gpt-3.5-turbo-0613", "openrouter", &[Text]),
            ModelSpec::new("openai/gpt-4o-mini", "openrouter", &[Text]),
            ModelSpec::new("gemini-2.0-flash-exp-image-generation", "gemini", &[Image, Judge]),
            ModelSpec::new("gemini-2.5-flash-image", "gemini", &[Image, Judge]),
            ModelSpec::new("gemini-2.5-flash", "gemini", &[Judge]),
            ModelSpec::new("dryrun-text-1", "dryrun", &[Text]),
            ModelSpec::new("dryrun-image-1", "dryrun", &[Image]),
            ModelSpec::new("dryrun-judge-1", "dryrun", &[Judge]),
        ])
    }

    /// Later entries with a repeated name replace earlier ones but keep their
    /// position.
    pub fn from_models(models: impl IntoIterator<Item = ModelSpec>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|model| (model.name.clone(), model))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name.trim())
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn for_role(&self, role: ModelRole) -> impl Iterator<Item = &ModelSpec> {
        self.models.values().filter(move |model| model.serves(role))
    }

    pub fn default_for(&self, role: ModelRole) -> Option<&ModelSpec> {
        self.for_role(role).next()
    }

    /// The named model, if it exists and serves `role`.
    pub fn lookup(&self, name: &str, role: ModelRole) -> Option<&ModelSpec> {
        self.get(name).filter(|model| model.serves(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_are_remote_models() {
        let registry = ModelRegistry::builtin();
        let text = registry.default_for(ModelRole::Text);
        assert_eq!(text.map(|model| model.provider.as_str()), Some("openrouter"));
        assert_eq!(
            text.map(|model| model.name.as_str()),
            Some("openai/gpt-3.5-turbo-0613")
        );
        for role in [ModelRole::Image, ModelRole::Judge] {
            assert_eq!(
                registry.default_for(role).map(|model| model.name.as_str()),
                Some("gemini-2.0-flash-exp-image-generation")
            );
        }
    }

    #[test]
    fn lookup_checks_role_and_trims_name() {
        let registry = ModelRegistry::builtin();
        assert!(registry.lookup(" dryrun-judge-1 ", ModelRole::Judge).is_some());
        assert!(registry.lookup("dryrun-judge-1", ModelRole::Image).is_none());
        assert!(registry.lookup("missing", ModelRole::Text).is_none());
    }

    #[test]
    fn every_role_has_an_offline_model() {
        let registry = ModelRegistry::builtin();
        for role in ModelRole::ALL {
            assert!(registry
                .for_role(role)
                .any(|model| model.provider == "dryrun"));
        }
    }

    #[test]
    fn repeated_name_replaces_in_place() {
        let registry = ModelRegistry::from_models([
            ModelSpec::new("a", "dryrun", &[ModelRole::Text]),
            ModelSpec::new("b", "dryrun", &[ModelRole::Text]),
            ModelSpec::new("a", "stub", &[ModelRole::Text]),
        ]);
        let names: Vec<&str> = registry.list().map(|model| model.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.get("a").map(|model| model.provider.as_str()), Some("stub"));
    }
}
