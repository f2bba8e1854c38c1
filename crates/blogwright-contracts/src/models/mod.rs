mod catalog;
mod request;
mod selector;

pub use catalog::{ModelCatalog, ModelSpec};
pub use request::{
    GenerationRequest, Provider, RequestError, TargetAudience, Tone, DEFAULT_SECTIONS,
    MAX_SECTIONS, MIN_SECTIONS,
};
pub use selector::{ModelSelection, ModelSelector};
