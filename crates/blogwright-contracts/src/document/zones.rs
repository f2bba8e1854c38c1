use std::fmt;
use std::str::FromStr;

use super::Section;

const BEGINNING: &str = "beginning-of-content";
const END: &str = "end-of-content";
const BEFORE_PREFIX: &str = "before-section-";
const AFTER_PREFIX: &str = "after-section-";

/// Named insertion point in a document, addressed by section index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropZone {
    BeginningOfContent,
    EndOfContent,
    BeforeSection(usize),
    AfterSection(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DropZoneError {
    #[error("unknown drop zone `{0}`")]
    Unknown(String),
    #[error("drop zone `{0}` has an invalid section index")]
    InvalidIndex(String),
}

impl FromStr for DropZone {
    type Err = DropZoneError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let index = |digits: &str| {
            digits
                .parse::<usize>()
                .map_err(|_| DropZoneError::InvalidIndex(trimmed.to_string()))
        };
        match trimmed {
            BEGINNING => Ok(Self::BeginningOfContent),
            END => Ok(Self::EndOfContent),
            _ => {
                if let Some(digits) = trimmed.strip_prefix(BEFORE_PREFIX) {
                    return index(digits).map(Self::BeforeSection);
                }
                if let Some(digits) = trimmed.strip_prefix(AFTER_PREFIX) {
                    return index(digits).map(Self::AfterSection);
                }
                Err(DropZoneError::Unknown(trimmed.to_string()))
            }
        }
    }
}

impl fmt::Display for DropZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeginningOfContent => f.write_str(BEGINNING),
            Self::EndOfContent => f.write_str(END),
            Self::BeforeSection(idx) => write!(f, "{BEFORE_PREFIX}{idx}"),
            Self::AfterSection(idx) => write!(f, "{AFTER_PREFIX}{idx}"),
        }
    }
}

/// Every zone that is addressable for the given section list, in reading order.
pub fn drop_zones(sections: &[Section]) -> Vec<DropZone> {
    let mut zones = Vec::with_capacity(sections.len() * 2 + 2);
    zones.push(DropZone::BeginningOfContent);
    for section in sections {
        zones.push(DropZone::BeforeSection(section.index));
        zones.push(DropZone::AfterSection(section.index));
    }
    zones.push(DropZone::EndOfContent);
    zones
}
