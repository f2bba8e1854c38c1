use super::catalog::{ModelCatalog, ModelSpec};
use super::Provider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub catalog: ModelCatalog,
}

impl ModelSelector {
    pub fn new(catalog: Option<ModelCatalog>) -> Self {
        Self {
            catalog: catalog.unwrap_or_else(|| ModelCatalog::new(None)),
        }
    }

    pub fn select(
        &self,
        provider: Provider,
        requested: Option<&str>,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let fallback_reason = if let Some(requested_value) = requested {
            if let Some(model) = self.catalog.get(provider, requested_value) {
                return Ok(ModelSelection {
                    model: model.clone(),
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            format!("Requested model '{requested_value}' is not offered by the {provider} provider.")
        } else {
            "No model specified; using default.".to_string()
        };

        let Some(model) = self.catalog.default_for(provider).cloned() else {
            return Err(format!("No models available for the {provider} provider."));
        };
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ModelSelector;
    use crate::models::{ModelCatalog, Provider};

    fn selector() -> ModelSelector {
        ModelSelector::new(Some(ModelCatalog::from_value(&json!({
            "local": ["llama3.1", "mistral"],
            "cloud": ["gpt-4o-mini"],
        }))))
    }

    #[test]
    fn requested_model_is_used_when_offered() {
        let selection = selector().select(Provider::Local, Some("mistral")).unwrap();
        assert_eq!(selection.model.name, "mistral");
        assert_eq!(selection.fallback_reason, None);
    }

    #[test]
    fn falls_back_to_provider_default() {
        let selection = selector().select(Provider::Cloud, Some("llama3.1")).unwrap();
        assert_eq!(selection.model.name, "gpt-4o-mini");
        assert_eq!(selection.requested.as_deref(), Some("llama3.1"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'llama3.1' is not offered by the cloud provider.")
        );
    }

    #[test]
    fn no_request_uses_default_with_explanation() {
        let selection = selector().select(Provider::Local, None).unwrap();
        assert_eq!(selection.model.name, "llama3.1");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("No model specified; using default.")
        );
    }

    #[test]
    fn errors_when_provider_has_no_models() {
        let selector = ModelSelector::new(Some(ModelCatalog::from_value(&json!({"cloud": ["x"]}))));
        let err = selector
            .select(Provider::Local, Some("anything"))
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for the local provider.");
    }
}
