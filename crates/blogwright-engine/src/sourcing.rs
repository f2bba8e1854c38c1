use anyhow::{bail, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use blogwright_contracts::document::Section;
use blogwright_contracts::images::{GeneratedImage, ImageSource};

use crate::api::{error_chain_text, ApiClient};

const SUGGESTIONS_PER_SECTION: usize = 2;

/// What a contextual image request knows about one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBrief {
    pub topic: String,
    pub section_id: String,
    pub title: String,
    pub content: String,
}

impl SectionBrief {
    pub fn from_section(topic: &str, section: &Section) -> Self {
        Self {
            topic: topic.to_string(),
            section_id: section.id.clone(),
            title: section.title.clone(),
            content: section.text_content.clone(),
        }
    }
}

/// One keyword query of a batch search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionQuery {
    pub section_id: String,
    pub title: String,
    pub query: String,
}

impl SectionQuery {
    pub fn from_section(topic: &str, section: &Section) -> Self {
        Self {
            section_id: section.id.clone(),
            title: section.title.clone(),
            query: format!("{} {}", topic.trim(), section.title.trim())
                .trim()
                .to_string(),
        }
    }
}

pub trait ImageSourcing {
    fn name(&self) -> &str;
    /// Suggests and generates images for one section.
    fn contextual_images(&self, brief: &SectionBrief) -> Result<Vec<GeneratedImage>>;
    fn search(&self, query: &str, limit: usize) -> Result<Vec<GeneratedImage>>;
    /// One batched request covering every query.
    fn search_sections(&self, queries: &[SectionQuery]) -> Result<Vec<GeneratedImage>>;
}

/// Sources images through the backend endpoints.
pub struct HttpImageSourcing<'a> {
    api: &'a ApiClient,
}

impl<'a> HttpImageSourcing<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }
}

impl ImageSourcing for HttpImageSourcing<'_> {
    fn name(&self) -> &str {
        "http"
    }

    fn contextual_images(&self, brief: &SectionBrief) -> Result<Vec<GeneratedImage>> {
        let suggestions = self.api.suggest_images(brief)?;
        if suggestions.is_empty() {
            bail!("no image suggestions for {}", brief.section_id);
        }
        let mut images = Vec::new();
        let mut last_error = None;
        for suggestion in suggestions.iter().take(SUGGESTIONS_PER_SECTION) {
            match self.api.generate_image(suggestion, &brief.section_id) {
                Ok(generated) => images.extend(generated),
                Err(err) => {
                    tracing::warn!(
                        section = %brief.section_id,
                        prompt = %suggestion.prompt,
                        error = %error_chain_text(&err, 256),
                        "skipping image suggestion"
                    );
                    last_error = Some(err);
                }
            }
        }
        match last_error {
            Some(err) if images.is_empty() => {
                Err(err.context(format!("no image could be generated for {}", brief.section_id)))
            }
            _ => Ok(images),
        }
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<GeneratedImage>> {
        self.api.search_google_images(query, limit)
    }

    fn search_sections(&self, queries: &[SectionQuery]) -> Result<Vec<GeneratedImage>> {
        self.api.search_images_for_sections(queries)
    }
}

/// Deterministic offline images: inline SVG placeholders labelled with the request.
#[derive(Debug, Clone, Default)]
pub struct DryrunSourcing {
    failing_sections: Vec<String>,
}

impl DryrunSourcing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes contextual requests for these section ids fail.
    pub fn failing_for(sections: &[&str]) -> Self {
        Self {
            failing_sections: sections.iter().map(|id| (*id).to_string()).collect(),
        }
    }

    fn image(&self, id: String, label: &str, source: ImageSource, section_id: Option<&str>) -> GeneratedImage {
        let data = BASE64.encode(placeholder_svg(label));
        GeneratedImage {
            id,
            url: format!("data:image/svg+xml;base64,{data}"),
            base64: Some(data),
            prompt: label.to_string(),
            description: label.to_string(),
            section_id: section_id.map(str::to_string),
            placement: None,
            timestamp: chrono::Utc::now(),
            contextual: source == ImageSource::Dalle,
            source,
        }
    }
}

impl ImageSourcing for DryrunSourcing {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn contextual_images(&self, brief: &SectionBrief) -> Result<Vec<GeneratedImage>> {
        if self.failing_sections.iter().any(|id| id == &brief.section_id) {
            bail!("dryrun failure for {}", brief.section_id);
        }
        Ok(vec![self.image(
            format!("dryrun-{}", brief.section_id),
            &format!("{}: {}", brief.topic, brief.title),
            ImageSource::Dalle,
            Some(&brief.section_id),
        )])
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<GeneratedImage>> {
        let slug = slugify(query);
        Ok((0..limit)
            .map(|idx| {
                self.image(
                    format!("dryrun-search-{slug}-{idx}"),
                    query,
                    ImageSource::Google,
                    None,
                )
            })
            .collect())
    }

    fn search_sections(&self, queries: &[SectionQuery]) -> Result<Vec<GeneratedImage>> {
        Ok(queries
            .iter()
            .map(|query| {
                self.image(
                    format!("dryrun-search-{}", query.section_id),
                    &query.query,
                    ImageSource::Google,
                    Some(&query.section_id),
                )
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFailure {
    pub section_id: String,
    pub error: String,
}

/// Result of a sequential per-section run: whatever succeeded plus what failed.
#[derive(Debug, Default)]
pub struct SourcingReport {
    pub images: Vec<GeneratedImage>,
    pub failures: Vec<SectionFailure>,
}

impl SourcingReport {
    /// Partial success counts as success. Fails only when nothing was produced and at least
    /// one section errored.
    pub fn into_result(self) -> Result<Vec<GeneratedImage>> {
        if self.images.is_empty() && !self.failures.is_empty() {
            let detail = self
                .failures
                .iter()
                .map(|failure| format!("{}: {}", failure.section_id, failure.error))
                .collect::<Vec<String>>()
                .join("; ");
            bail!(
                "image generation failed for {} section(s): {detail}",
                self.failures.len()
            );
        }
        Ok(self.images)
    }
}

/// Requests images for each section in turn. A failing section is logged and skipped.
pub fn source_section_images(sourcing: &dyn ImageSourcing, briefs: &[SectionBrief]) -> SourcingReport {
    let mut report = SourcingReport::default();
    for brief in briefs {
        match sourcing.contextual_images(brief) {
            Ok(images) => {
                tracing::debug!(
                    sourcing = sourcing.name(),
                    section = %brief.section_id,
                    count = images.len(),
                    "section images ready"
                );
                report.images.extend(images);
            }
            Err(err) => {
                let error = error_chain_text(&err, 512);
                tracing::warn!(
                    sourcing = sourcing.name(),
                    section = %brief.section_id,
                    error = %error,
                    "section image generation failed"
                );
                report.failures.push(SectionFailure {
                    section_id: brief.section_id.clone(),
                    error,
                });
            }
        }
    }
    report
}

fn placeholder_svg(label: &str) -> String {
    let label: String = label
        .chars()
        .take(60)
        .map(|ch| match ch {
            '<' | '>' | '&' | '"' => ' ',
            other => other,
        })
        .collect();
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"800\" height=\"450\"><rect width=\"100%\" height=\"100%\" fill=\"#e8e2d6\"/><text x=\"50%\" y=\"50%\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"28\">{label}</text></svg>"
    )
}

fn slugify(value: &str) -> String {
    let mut slug = String::new();
    for ch in value.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
