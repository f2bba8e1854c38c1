mod decoder;

use serde::Serialize;
use serde_json::{Map, Value};

pub use decoder::{DecodeSummary, Diagnostic, StreamDecoder, DATA_PREFIX};

/// Reasoning status carried by a `step` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Thinking,
    Acting,
    Other(String),
}

impl StepStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "thinking" => Self::Thinking,
            "acting" => Self::Acting,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Thinking => "thinking",
            Self::Acting => "acting",
            Self::Other(value) => value.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepEvent {
    pub step: u64,
    pub status: StepStatus,
    pub thought: String,
    pub action: String,
    pub action_input: String,
    pub observation: String,
}

/// One decoded server-sent event of a blog generation stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Connected { topic: String },
    Step(StepEvent),
    StateUpdate { payload: Map<String, Value> },
    Complete { blog: String, is_complete: bool },
    Error { message: String },
}

impl StreamEvent {
    /// Builds an event from a `data:` payload.
    ///
    /// Payloads with a `type` field dispatch on it; the initial handshake only carries
    /// `status: "connected"`. Anything else is not an event this client understands.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let kind = obj.get("type").and_then(Value::as_str);
        match kind {
            Some("step") => Some(Self::Step(StepEvent {
                step: obj.get("step").and_then(value_as_u64).unwrap_or(0),
                status: StepStatus::parse(str_field(obj, "status")),
                thought: str_field(obj, "thought").to_string(),
                action: str_field(obj, "action").to_string(),
                action_input: text_field(obj, "action_input"),
                observation: text_field(obj, "observation"),
            })),
            Some("state_update") => {
                let mut payload = obj.clone();
                payload.remove("type");
                Some(Self::StateUpdate { payload })
            }
            Some("complete") => Some(Self::Complete {
                blog: str_field(obj, "blog").to_string(),
                is_complete: obj
                    .get("is_complete")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
            }),
            Some("error") => Some(Self::Error {
                message: obj
                    .get("error")
                    .or_else(|| obj.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            }),
            Some(_) => None,
            None => match obj.get("status").and_then(Value::as_str) {
                Some("connected") => Some(Self::Connected {
                    topic: str_field(obj, "topic").to_string(),
                }),
                _ => None,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Step(_) => "step",
            Self::StateUpdate { .. } => "state_update",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Wire-shaped payload, used for the session journal.
    pub fn to_payload(&self) -> Map<String, Value> {
        let value = match self {
            Self::Connected { topic } => serde_json::json!({
                "status": "connected",
                "topic": topic,
            }),
            Self::Step(step) => serde_json::json!({
                "type": "step",
                "step": step.step,
                "status": step.status.as_str(),
                "thought": step.thought,
                "action": step.action,
                "action_input": step.action_input,
                "observation": step.observation,
            }),
            Self::StateUpdate { payload } => {
                let mut map = payload.clone();
                map.insert("type".to_string(), Value::String("state_update".to_string()));
                Value::Object(map)
            }
            Self::Complete { blog, is_complete } => serde_json::json!({
                "type": "complete",
                "blog": blog,
                "is_complete": is_complete,
            }),
            Self::Error { message } => serde_json::json!({
                "type": "error",
                "error": message,
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> &'a str {
    obj.get(key).and_then(Value::as_str).unwrap_or_default()
}

// Tool inputs and observations are sometimes structured; keep them as compact JSON.
fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
