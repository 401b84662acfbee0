//! Error types for style operations.

use thiserror::Error;

use crate::config::Slot;

/// Which end of a range an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEdge {
    Start,
    End,
}

impl std::fmt::Display for RangeEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeEdge::Start => f.write_str("start"),
            RangeEdge::End => f.write_str("end"),
        }
    }
}

/// Errors that abort a style operation before it touches the tree.
///
/// Every operation validates its range up front, so receiving one of these
/// means the document was left exactly as it was.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum StyleError {
    /// A boundary offset is past the end of its container.
    #[error("{edge}Offset {offset} exceeds container length {length}")]
    OutOfBounds {
        edge: RangeEdge,
        offset: usize,
        length: usize,
    },

    /// A range container is missing or no longer attached to the document.
    #[error("range container is missing or detached from the document")]
    InvalidRange,

    /// A slot value outside the configured bounds.
    #[error("{slot} value {value} is outside [{min}, {max}]")]
    ValueOutOfRange {
        slot: Slot,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The slot has no configuration.
    #[error("no configuration for slot {0}")]
    UnknownSlot(Slot),
}

/// Errors from loading or validating [`StyleConfig`](crate::config::StyleConfig).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Settings were not valid JSON or did not match the expected shape.
    #[error("failed to parse style settings: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings parsed but describe an unusable configuration.
    #[error("invalid style settings: {0}")]
    Invalid(String),
}

/// Errors from the in-memory document's markup reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MarkupError {
    #[error("unterminated tag or attribute value")]
    Unterminated,

    #[error("empty tag name")]
    EmptyTag,

    #[error("attribute {0} has an unquoted value")]
    UnquotedAttribute(String),

    #[error("closing tag </{found}> does not match <{expected}>")]
    Mismatched { expected: String, found: String },

    #[error("element <{0}> is never closed")]
    Unclosed(String),
}
