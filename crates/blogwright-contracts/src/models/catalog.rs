use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::Provider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: Provider,
    pub label: Option<String>,
}

/// Models offered by the backend, grouped by provider in the order they were listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    models: IndexMap<Provider, Vec<ModelSpec>>,
    defaults: IndexMap<Provider, String>,
}

impl ModelCatalog {
    pub fn new(models: Option<IndexMap<Provider, Vec<ModelSpec>>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
            defaults: IndexMap::new(),
        }
    }

    /// Reads a `GET /models` payload.
    ///
    /// Accepts `{"local": [...], "cloud": [...]}` or the same map nested under `models`;
    /// rows are either model names or objects with `name`/`id` and an optional `label`.
    /// `default_local`/`default_cloud` keys pin the provider default.
    pub fn from_value(payload: &Value) -> Self {
        let root = payload
            .get("models")
            .and_then(Value::as_object)
            .or_else(|| payload.as_object());
        let Some(root) = root else {
            return Self {
                models: IndexMap::new(),
                defaults: IndexMap::new(),
            };
        };

        let mut models = IndexMap::new();
        let mut defaults = IndexMap::new();
        for provider in Provider::ALL.iter().copied() {
            let rows = root
                .get(provider.as_str())
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|row| model_from_row(row, provider))
                        .collect::<Vec<ModelSpec>>()
                })
                .unwrap_or_default();
            if !rows.is_empty() {
                models.insert(provider, rows);
            }
            let default_key = format!("default_{}", provider.as_str());
            if let Some(name) = non_empty_str(root, &default_key) {
                defaults.insert(provider, name);
            }
        }
        Self { models, defaults }
    }

    pub fn get(&self, provider: Provider, name: &str) -> Option<&ModelSpec> {
        self.models
            .get(&provider)?
            .iter()
            .find(|model| model.name == name)
    }

    pub fn list(&self, provider: Provider) -> &[ModelSpec] {
        self.models
            .get(&provider)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.models.keys().copied()
    }

    /// The pinned default when it is actually offered, otherwise the first listed model.
    pub fn default_for(&self, provider: Provider) -> Option<&ModelSpec> {
        self.defaults
            .get(&provider)
            .and_then(|name| self.get(provider, name))
            .or_else(|| self.list(provider).first())
    }

    pub fn is_empty(&self) -> bool {
        self.models.values().all(Vec::is_empty)
    }
}

fn model_from_row(row: &Value, provider: Provider) -> Option<ModelSpec> {
    match row {
        Value::String(name) if !name.trim().is_empty() => Some(ModelSpec {
            name: name.trim().to_string(),
            provider,
            label: None,
        }),
        Value::Object(obj) => {
            let name = non_empty_str(obj, "name").or_else(|| non_empty_str(obj, "id"))?;
            Some(ModelSpec {
                name,
                provider,
                label: non_empty_str(obj, "label").or_else(|| non_empty_str(obj, "display_name")),
            })
        }
        _ => None,
    }
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// Used when the backend cannot be asked (offline CLI runs, tests).
fn default_models() -> IndexMap<Provider, Vec<ModelSpec>> {
    let mut map = IndexMap::new();
    let mut insert = |provider: Provider, names: &[&str]| {
        map.insert(
            provider,
            names
                .iter()
                .map(|name| ModelSpec {
                    name: (*name).to_string(),
                    provider,
                    label: None,
                })
                .collect::<Vec<ModelSpec>>(),
        );
    };
    insert(Provider::Local, &["llama3.1", "mistral"]);
    insert(Provider::Cloud, &["gpt-4o-mini", "gpt-4o"]);
    map
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ModelCatalog;
    use crate::models::Provider;

    #[test]
    fn parses_string_and_object_rows() {
        let catalog = ModelCatalog::from_value(&json!({
            "local": ["llama3.1", "  ", {"name": "qwen2.5", "label": "Qwen"}],
            "cloud": [{"id": "gpt-4o"}, 42],
            "default_cloud": "gpt-4o",
        }));
        let local: Vec<&str> = catalog
            .list(Provider::Local)
            .iter()
            .map(|model| model.name.as_str())
            .collect();
        assert_eq!(local, vec!["llama3.1", "qwen2.5"]);
        assert_eq!(
            catalog
                .get(Provider::Local, "qwen2.5")
                .and_then(|model| model.label.as_deref()),
            Some("Qwen")
        );
        assert_eq!(
            catalog.default_for(Provider::Cloud).map(|model| model.name.as_str()),
            Some("gpt-4o")
        );
    }

    #[test]
    fn accepts_nested_models_key() {
        let catalog = ModelCatalog::from_value(&json!({"models": {"cloud": ["gpt-4o-mini"]}}));
        assert_eq!(catalog.providers().collect::<Vec<_>>(), vec![Provider::Cloud]);
        assert!(catalog.list(Provider::Local).is_empty());
    }

    #[test]
    fn default_pin_must_be_offered() {
        let catalog = ModelCatalog::from_value(&json!({
            "local": ["mistral"],
            "default_local": "missing",
        }));
        assert_eq!(
            catalog.default_for(Provider::Local).map(|model| model.name.as_str()),
            Some("mistral")
        );
    }

    #[test]
    fn builtin_catalog_covers_both_providers() {
        let catalog = ModelCatalog::new(None);
        assert!(!catalog.is_empty());
        assert!(catalog.default_for(Provider::Local).is_some());
        assert!(catalog.default_for(Provider::Cloud).is_some());
        assert!(ModelCatalog::from_value(&json!("nope")).is_empty());
    }
}
