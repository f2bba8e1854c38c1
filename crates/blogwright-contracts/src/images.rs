use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Dalle,
    Google,
}

impl ImageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dalle => "dalle",
            Self::Google => "google",
        }
    }
}

/// An image produced by a sourcing call. Immutable once built; drags refer to it by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedImage {
    pub id: String,
    pub url: String,
    pub base64: Option<String>,
    pub prompt: String,
    pub description: String,
    pub section_id: Option<String>,
    /// Suggested placement from the backend. Informational only.
    pub placement: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub contextual: bool,
    pub source: ImageSource,
}

impl GeneratedImage {
    /// Reads one backend row. Returns `None` for rows that carry neither a url nor inline data.
    pub fn from_value(row: &Value, source: ImageSource) -> Option<Self> {
        let obj = row.as_object()?;
        let url = first_str(obj, &["url", "image_url", "link"]);
        let base64 = first_str(obj, &["b64_json", "base64"]);
        if url.is_none() && base64.is_none() {
            return None;
        }
        let description = first_str(obj, &["description", "title", "alt"]).unwrap_or_default();
        let prompt = first_str(obj, &["prompt", "revised_prompt"]).unwrap_or_else(|| description.clone());
        let base64 = base64.map(|data| strip_data_url(&data));
        let url = url.unwrap_or_else(|| {
            format!("data:image/png;base64,{}", base64.as_deref().unwrap_or_default())
        });
        Some(Self {
            id: first_str(obj, &["id", "image_id"])
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            url,
            base64,
            prompt,
            description,
            section_id: first_str(obj, &["section_id"]),
            placement: first_str(obj, &["placement"]),
            timestamp: Utc::now(),
            contextual: obj
                .get("contextual")
                .and_then(Value::as_bool)
                .unwrap_or(source == ImageSource::Dalle),
            source,
        })
    }

    pub fn with_section(mut self, section_id: &str) -> Self {
        if self.section_id.is_none() {
            self.section_id = Some(section_id.to_string());
        }
        self
    }
}

/// Collects images from a response body: a bare array, or an array under one of the usual
/// keys (`images`, `results`, `items`), or a single image object.
pub fn images_from_payload(payload: &Value, source: ImageSource) -> Vec<GeneratedImage> {
    let rows = match payload {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(obj) => {
            match ["images", "results", "items"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_array))
            {
                Some(rows) => rows.as_slice(),
                None => return GeneratedImage::from_value(payload, source).into_iter().collect(),
            }
        }
        _ => return Vec::new(),
    };
    rows.iter()
        .filter_map(|row| GeneratedImage::from_value(row, source))
        .collect()
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        obj.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

fn strip_data_url(data: &str) -> String {
    match data.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload.to_string(),
        _ => data.to_string(),
    }
}

/// Images gathered during a session, in arrival order, unique by id.
#[derive(Debug, Clone, Default)]
pub struct ImageGallery {
    images: IndexMap<String, GeneratedImage>,
}

impl ImageGallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds images, skipping ids already present. Returns how many were new.
    pub fn extend(&mut self, images: impl IntoIterator<Item = GeneratedImage>) -> usize {
        let before = self.images.len();
        for image in images {
            self.images.entry(image.id.clone()).or_insert(image);
        }
        self.images.len() - before
    }

    pub fn get(&self, id: &str) -> Option<&GeneratedImage> {
        self.images.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedImage> {
        self.images.values()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// The single image currently being dragged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DragSlot {
    image_id: Option<String>,
}

impl DragSlot {
    /// Starts a drag, replacing any drag already in progress.
    pub fn begin(&mut self, image_id: impl Into<String>) {
        self.image_id = Some(image_id.into());
    }

    pub fn end(&mut self) {
        self.image_id = None;
    }

    pub fn current(&self) -> Option<&str> {
        self.image_id.as_deref()
    }

    pub fn take(&mut self) -> Option<String> {
        self.image_id.take()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{images_from_payload, DragSlot, GeneratedImage, ImageGallery, ImageSource};

    #[test]
    fn reads_lenient_rows() {
        let images = images_from_payload(
            &json!({"images": [
                {"id": "a", "image_url": "https://x/a.png", "title": "A"},
                {"link": "https://x/b.png", "alt": "B", "section_id": "section-1"},
                {"description": "no data"},
                "junk",
            ]}),
            ImageSource::Google,
        );
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].id, "a");
        assert_eq!(images[0].description, "A");
        assert_eq!(images[0].prompt, "A");
        assert!(!images[0].contextual);
        assert_eq!(images[1].url, "https://x/b.png");
        assert_eq!(images[1].section_id.as_deref(), Some("section-1"));
        assert!(!images[1].id.is_empty());
    }

    #[test]
    fn inline_base64_gets_data_url() {
        let image = GeneratedImage::from_value(
            &json!({"b64_json": "data:image/png;base64,QUJD", "prompt": "a fox"}),
            ImageSource::Dalle,
        )
        .unwrap();
        assert_eq!(image.base64.as_deref(), Some("QUJD"));
        assert_eq!(image.url, "data:image/png;base64,QUJD");
        assert_eq!(image.prompt, "a fox");
        assert!(image.contextual);
    }

    #[test]
    fn single_object_and_bare_array_payloads() {
        let one = images_from_payload(&json!({"url": "u.png"}), ImageSource::Dalle);
        assert_eq!(one.len(), 1);
        let many = images_from_payload(&json!([{"url": "a"}, {"url": "b"}]), ImageSource::Dalle);
        assert_eq!(many.len(), 2);
        assert!(images_from_payload(&json!(null), ImageSource::Dalle).is_empty());
    }

    #[test]
    fn gallery_dedupes_by_id_and_keeps_order() {
        let mut gallery = ImageGallery::new();
        let rows = json!([{"id": "1", "url": "a"}, {"id": "2", "url": "b"}]);
        assert_eq!(gallery.extend(images_from_payload(&rows, ImageSource::Google)), 2);
        let again = json!([{"id": "2", "url": "b2"}, {"id": "3", "url": "c"}]);
        assert_eq!(gallery.extend(images_from_payload(&again, ImageSource::Google)), 1);

        let ids: Vec<&str> = gallery.iter().map(|image| image.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(gallery.get("2").map(|image| image.url.as_str()), Some("b"));
    }

    #[test]
    fn drag_slot_holds_at_most_one_image() {
        let mut slot = DragSlot::default();
        slot.begin("a");
        slot.begin("b");
        assert_eq!(slot.current(), Some("b"));
        assert_eq!(slot.take(), Some("b".to_string()));
        assert_eq!(slot.current(), None);
        slot.begin("c");
        slot.end();
        assert_eq!(slot.take(), None);
    }
}
