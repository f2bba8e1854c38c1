//! Section analysis and image insertion over generated blog documents.

mod analyzer;
mod mutator;
mod zones;

pub use analyzer::{analyze, analyze_html, Section};
pub use mutator::{mutate, mutate_html, ImageBlock, Mutation};
pub use zones::{drop_zones, DropZone, DropZoneError};
