use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MIN_SECTIONS: u8 = 3;
pub const MAX_SECTIONS: u8 = 7;
pub const DEFAULT_SECTIONS: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("topic must not be empty")]
    EmptyTopic,
    #[error("section count must be between 3 and 7, got {0}")]
    SectionCount(i64),
    #[error("unknown {kind} `{value}` (expected one of: {expected})")]
    UnknownOption {
        kind: &'static str,
        value: String,
        expected: String,
    },
}

macro_rules! option_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = RequestError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
                Self::ALL
                    .iter()
                    .copied()
                    .find(|value| value.as_str() == normalized)
                    .ok_or_else(|| RequestError::UnknownOption {
                        kind: $kind,
                        value: raw.trim().to_string(),
                        expected: Self::ALL
                            .iter()
                            .map(|value| value.as_str())
                            .collect::<Vec<&str>>()
                            .join(", "),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

option_enum!(Provider, "provider", {
    Local => "local",
    Cloud => "cloud",
});

option_enum!(TargetAudience, "audience", {
    General => "general",
    Beginners => "beginners",
    Professionals => "professionals",
    Technical => "technical",
    Students => "students",
});

option_enum!(Tone, "tone", {
    Informative => "informative",
    Conversational => "conversational",
    Professional => "professional",
    Casual => "casual",
    Persuasive => "persuasive",
});

/// Body of `POST /blog/stream`. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    topic: String,
    provider: Provider,
    model_name: String,
    target_audience: TargetAudience,
    tone: Tone,
    num_sections: u8,
}

impl GenerationRequest {
    pub fn new(
        topic: &str,
        provider: Provider,
        model_name: impl Into<String>,
        target_audience: TargetAudience,
        tone: Tone,
        num_sections: i64,
    ) -> Result<Self, RequestError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(RequestError::EmptyTopic);
        }
        let num_sections = u8::try_from(num_sections)
            .ok()
            .filter(|count| (MIN_SECTIONS..=MAX_SECTIONS).contains(count))
            .ok_or(RequestError::SectionCount(num_sections))?;
        Ok(Self {
            topic: topic.to_string(),
            provider,
            model_name: model_name.into(),
            target_audience,
            tone,
            num_sections,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn target_audience(&self) -> TargetAudience {
        self.target_audience
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }

    pub fn num_sections(&self) -> u8 {
        self.num_sections
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{GenerationRequest, Provider, RequestError, TargetAudience, Tone};

    #[test]
    fn request_serializes_to_wire_body() {
        let request = GenerationRequest::new(
            "  Ownership in Rust ",
            Provider::Cloud,
            "gpt-4o-mini",
            TargetAudience::Beginners,
            Tone::Casual,
            4,
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "topic": "Ownership in Rust",
                "provider": "cloud",
                "model_name": "gpt-4o-mini",
                "target_audience": "beginners",
                "tone": "casual",
                "num_sections": 4,
            })
        );
    }

    #[test]
    fn request_validates_topic_and_section_count() {
        let build = |topic: &str, sections: i64| {
            GenerationRequest::new(
                topic,
                Provider::Local,
                "llama3.1",
                TargetAudience::General,
                Tone::Informative,
                sections,
            )
        };
        assert_eq!(build("   ", 5), Err(RequestError::EmptyTopic));
        assert_eq!(build("x", 2), Err(RequestError::SectionCount(2)));
        assert_eq!(build("x", 8), Err(RequestError::SectionCount(8)));
        assert_eq!(build("x", -1), Err(RequestError::SectionCount(-1)));
        assert!(build("x", 3).is_ok());
        assert!(build("x", 7).is_ok());
    }

    #[test]
    fn options_parse_leniently() {
        assert_eq!("Cloud".parse::<Provider>(), Ok(Provider::Cloud));
        assert_eq!(" technical ".parse::<TargetAudience>(), Ok(TargetAudience::Technical));
        let err = "snarky".parse::<Tone>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown tone `snarky` (expected one of: informative, conversational, professional, casual, persuasive)"
        );
    }
}
