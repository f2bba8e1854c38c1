//! Backend client, image sourcing and the session controller that ties the transcript,
//! section analysis and image insertion together.

pub mod api;
pub mod sourcing;
pub mod workbench;

pub use api::{error_chain_text, ApiClient, ApiConfig, ImageSuggestion, API_BASE_ENV, DEFAULT_API_BASE};
pub use sourcing::{
    source_section_images, DryrunSourcing, HttpImageSourcing, ImageSourcing, SectionBrief,
    SectionFailure, SectionQuery, SourcingReport,
};
pub use workbench::{DropOutcome, ImageBatch, Workbench, CONFIRMATION_DELAY, DEFAULT_SEARCH_LIMIT};
