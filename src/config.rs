use once_cell::sync::Lazy;
use regex::Regex;

pub static JAPANESE_CHARS: Lazy<Regex> = Lazy::new(||
    Regex::new(r"[ぁ-ゔァ-ヴー々〆〤一-龯]").unwrap());

pub static JAPANESE_HEADINGS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["章", "節", "条"]
        .iter()
        .map(|unit| Regex::new(&format!("^第[０-９0-9一二三四五六七八九十百千]+{}$", unit)).unwrap())
        .collect()
});

pub static LATIN_HEADINGS: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    // "1 Introduction", "2.3 Scope", "4.1.2 Limits"
    Regex::new(r"^\d+(\.\d+)*\s+.+$").unwrap(),
    // "A. Background"
    Regex::new(r"^[A-Z]\.\s+.+$").unwrap(),
    // "IV. Results", "ii Method"
    Regex::new(r"(?i)^[IVXLC]+\.?\s+.+$").unwrap(),
]);

/// Regex tables used to recognise numbered and lettered headings.
#[derive(Debug, Clone)]
pub struct HeadingPatterns {
    /// Character class that marks a document as Japanese.
    pub japanese_chars: Regex,
    pub japanese: Vec<Regex>,
    pub latin: Vec<Regex>,
}

impl Default for HeadingPatterns {
    fn default() -> Self {
        Self {
            japanese_chars: JAPANESE_CHARS.clone(),
            japanese: JAPANESE_HEADINGS.clone(),
            latin: LATIN_HEADINGS.clone(),
        }
    }
}

/// Tunables for outline extraction of a single document.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Deepest level emitted from an embedded table of contents.
    pub max_toc_depth: u32,
    /// Number of distinct font sizes that become heading levels.
    pub heading_tiers: usize,
    /// Upper bound on the spans sampled for language detection.
    pub language_sample_limit: usize,
    pub japanese_max_chars: usize,
    pub latin_max_words: usize,
    /// When set, short lines must match a heading pattern to be kept.
    pub require_pattern_match: bool,
    pub patterns: HeadingPatterns,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_toc_depth: 6,
            heading_tiers: 3,
            language_sample_limit: 5000,
            japanese_max_chars: 80,
            latin_max_words: 12,
            require_pattern_match: false,
            patterns: HeadingPatterns::default(),
        }
    }
}

impl ExtractConfig {
    pub fn with_max_toc_depth(mut self, depth: u32) -> Self {
        self.max_toc_depth = depth.max(1);
        self
    }

    pub fn with_require_pattern_match(mut self, strict: bool) -> Self {
        self.require_pattern_match = strict;
        self
    }
}
