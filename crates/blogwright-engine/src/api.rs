use std::env;
use std::io::Read;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use blogwright_contracts::images::{images_from_payload, GeneratedImage, ImageSource};
use blogwright_contracts::models::{GenerationRequest, ModelCatalog};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response as HttpResponse};
use serde_json::{json, Value};

use crate::sourcing::{SectionBrief, SectionQuery};

pub const API_BASE_ENV: &str = "BLOGWRIGHT_API_BASE";
pub const API_TOKEN_ENV: &str = "BLOGWRIGHT_API_TOKEN";
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
// Generation runs a multi-step agent on the backend; give the stream far longer than a JSON call.
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const READ_CHUNK_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
    pub stream_timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            access_token: None,
            timeout: DEFAULT_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    /// Explicit base url first, then `BLOGWRIGHT_API_BASE`, then the local default.
    pub fn resolve(base_url: Option<&str>) -> Self {
        let base_url = base_url
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| non_empty_env(API_BASE_ENV))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self::new(&base_url)
    }

    /// Session token wins; `BLOGWRIGHT_API_TOKEN` is the fallback for scripted runs.
    pub fn with_access_token(mut self, token: Option<&str>) -> Self {
        self.access_token = token
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| non_empty_env(API_TOKEN_ENV));
        self
    }
}

/// A model-generated placement idea for one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSuggestion {
    pub prompt: String,
    pub description: String,
    pub placement: Option<String>,
}

impl ImageSuggestion {
    fn from_value(row: &Value) -> Option<Self> {
        match row {
            Value::String(prompt) if !prompt.trim().is_empty() => Some(Self {
                prompt: prompt.trim().to_string(),
                description: prompt.trim().to_string(),
                placement: None,
            }),
            Value::Object(obj) => {
                let text = |key: &str| {
                    obj.get(key)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|value| !value.is_empty())
                        .map(str::to_string)
                };
                let prompt = text("prompt").or_else(|| text("description"))?;
                Some(Self {
                    description: text("description").unwrap_or_else(|| prompt.clone()),
                    placement: text("placement"),
                    prompt,
                })
            }
            _ => None,
        }
    }
}

/// Blocking client for the blog generation backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: HttpClient,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let mut builder = HttpClient::builder().timeout(config.timeout);
        if is_loopback(&config.base_url) {
            builder = builder.no_proxy();
        }
        let http = builder.build().context("failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn models(&self) -> Result<ModelCatalog> {
        let response = self
            .authorized(self.http.get(self.url("/models")))
            .send()
            .with_context(|| format!("model list request failed ({})", self.url("/models")))?;
        let payload = response_json_or_error("model list", response)?;
        Ok(ModelCatalog::from_value(&payload))
    }

    /// Streams a generation, handing each chunk of the raw event stream body to `on_chunk`
    /// as it is read. An error from `on_chunk` stops the read and is returned as is.
    pub fn stream_blog<F>(&self, request: &GenerationRequest, mut on_chunk: F) -> Result<u64>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let mut response = self.open_stream(request)?;
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        let mut total = 0u64;
        loop {
            let read = match response.read(&mut buf) {
                Ok(read) => read,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context("blog stream read failed"),
            };
            if read == 0 {
                break;
            }
            total += read as u64;
            on_chunk(&buf[..read])?;
        }
        tracing::debug!(bytes = total, "blog stream closed");
        Ok(total)
    }

    fn open_stream(&self, request: &GenerationRequest) -> Result<HttpResponse> {
        let url = self.url("/blog/stream");
        tracing::info!(
            topic = request.topic(),
            provider = %request.provider(),
            model = request.model_name(),
            "opening blog stream"
        );
        let response = self
            .authorized(self.http.post(&url))
            .timeout(self.config.stream_timeout)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .with_context(|| format!("blog stream request failed ({url})"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!(
                "blog stream request failed ({}): {}",
                status.as_u16(),
                truncate_text(&body, 512)
            );
        }
        Ok(response)
    }

    pub fn suggest_images(&self, brief: &SectionBrief) -> Result<Vec<ImageSuggestion>> {
        let payload = self.post_json(
            "/blog/suggest-images",
            "image suggestion",
            &json!({
                "topic": brief.topic,
                "section_id": brief.section_id,
                "section_title": brief.title,
                "section_content": brief.content,
            }),
        )?;
        let rows: &[Value] = match &payload {
            Value::Array(rows) => rows,
            Value::Object(obj) => obj
                .get("suggestions")
                .or_else(|| obj.get("images"))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            _ => &[],
        };
        Ok(rows.iter().filter_map(ImageSuggestion::from_value).collect())
    }

    pub fn generate_image(
        &self,
        suggestion: &ImageSuggestion,
        section_id: &str,
    ) -> Result<Vec<GeneratedImage>> {
        let payload = self.post_json(
            "/blog/generate-image",
            "image generation",
            &json!({
                "prompt": suggestion.prompt,
                "description": suggestion.description,
                "section_id": section_id,
            }),
        )?;
        let payload = payload.get("image").cloned().unwrap_or(payload);
        Ok(images_from_payload(&payload, ImageSource::Dalle)
            .into_iter()
            .map(|mut image| {
                image.contextual = true;
                if image.placement.is_none() {
                    image.placement = suggestion.placement.clone();
                }
                image.with_section(section_id)
            })
            .collect())
    }

    pub fn search_google_images(&self, query: &str, limit: usize) -> Result<Vec<GeneratedImage>> {
        let payload = self.post_json(
            "/blog/search-google-images",
            "image search",
            &json!({"query": query, "num_results": limit}),
        )?;
        let mut images = images_from_payload(&payload, ImageSource::Google);
        images.truncate(limit);
        Ok(images)
    }

    pub fn search_images_for_sections(&self, queries: &[SectionQuery]) -> Result<Vec<GeneratedImage>> {
        let sections: Vec<Value> = queries
            .iter()
            .map(|query| {
                json!({
                    "section_id": query.section_id,
                    "title": query.title,
                    "query": query.query,
                })
            })
            .collect();
        let payload = self.post_json(
            "/blog/search-images-for-sections",
            "section image search",
            &json!({"sections": sections}),
        )?;
        Ok(section_images_from_payload(&payload))
    }

    fn post_json(&self, path: &str, label: &str, body: &Value) -> Result<Value> {
        let url = self.url(path);
        let response = self
            .authorized(self.http.post(&url))
            .json(body)
            .send()
            .with_context(|| format!("{label} request failed ({url})"))?;
        response_json_or_error(label, response)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.access_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

/// Batch search answers either keyed by section id or as one flat list.
fn section_images_from_payload(payload: &Value) -> Vec<GeneratedImage> {
    let keyed = payload
        .get("results")
        .or_else(|| payload.get("sections"))
        .and_then(Value::as_object);
    let Some(keyed) = keyed else {
        return images_from_payload(payload, ImageSource::Google);
    };
    keyed
        .iter()
        .flat_map(|(section_id, rows)| {
            images_from_payload(rows, ImageSource::Google)
                .into_iter()
                .map(move |image| image.with_section(section_id))
        })
        .collect()
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn is_loopback(base_url: &str) -> bool {
    reqwest::Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .map(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | "::1"))
        .unwrap_or(false)
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn response_json_or_error(label: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{label} response body read failed"))?;
    if !status.is_success() {
        bail!("{label} request failed ({code}): {}", truncate_text(&body, 512));
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{label} returned invalid JSON payload"))?;
    Ok(parsed)
}

/// Flattens an error and its causes into one line, dropping repeated messages.
pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().map(|existing| existing == trimmed).unwrap_or(false) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
