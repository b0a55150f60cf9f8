//! Structural outline extraction for PDF documents.
//!
//! A document's embedded table of contents is used when present; otherwise
//! headings are inferred from font-size tiers and heading patterns over the
//! text spans of every page.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod font_utils;
pub mod functions;
pub mod toc;

pub use batch::{run_batch, BatchConfig, BatchReport};
pub use config::ExtractConfig;
pub use error::{OutlineError, Result};
pub use extract::{extract_outline, extract_outline_from_bytes, extract_outline_from_document};

/// Heading rank, serialized as `"H1"`, `"H2"`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    pub const H1: HeadingLevel = HeadingLevel(1);
    pub const H2: HeadingLevel = HeadingLevel(2);
    pub const H3: HeadingLevel = HeadingLevel(3);

    /// Level for a 1-based rank, `None` for zero or anything past `u8`.
    pub fn new(rank: u32) -> Option<Self> {
        match u8::try_from(rank) {
            Ok(0) | Err(_) => None,
            Ok(n) => Some(HeadingLevel(n)),
        }
    }

    pub fn rank(self) -> u8 {
        self.0
    }
}

impl fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{}", self.0)
    }
}

impl From<HeadingLevel> for String {
    fn from(level: HeadingLevel) -> Self {
        level.to_string()
    }
}

impl TryFrom<String> for HeadingLevel {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value
            .strip_prefix('H')
            .and_then(|n| n.parse::<u32>().ok())
            .and_then(HeadingLevel::new)
            .ok_or_else(|| format!("invalid heading level: {}", value))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: HeadingLevel,
    pub text: String,
    pub page: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Outline {
    pub title: String,
    pub outline: Vec<Heading>,
}
