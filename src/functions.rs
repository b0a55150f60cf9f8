use std::cmp::Ordering;
use std::collections::HashSet;

use log::debug;
use unicode_normalization::UnicodeNormalization;

use crate::config::{ExtractConfig, HeadingPatterns};
use crate::font_utils::TextSpan;
use crate::{Heading, HeadingLevel, Outline};

/// Script family that selects the heuristic variant for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Latin,
    Japanese,
}

/// NFKC-normalize and trim.
pub fn normalize_text(text: &str) -> String {
    text.nfkc().collect::<String>().trim().to_string()
}

/// Classify a document from the text of its first spans.
pub fn detect_script(spans: &[TextSpan], config: &ExtractConfig) -> Script {
    let sample: String = spans
        .iter()
        .take(config.language_sample_limit)
        .map(|span| span.text.as_str())
        .collect();

    if config.patterns.japanese_chars.is_match(&sample) {
        Script::Japanese
    } else {
        Script::Latin
    }
}

pub fn looks_like_japanese_heading(text: &str, patterns: &HeadingPatterns) -> bool {
    patterns.japanese.iter().any(|pat| pat.is_match(text))
}

pub fn looks_like_latin_heading(text: &str, patterns: &HeadingPatterns) -> bool {
    patterns.latin.iter().any(|pat| pat.is_match(text))
}

/// Length and pattern filter applied before the font-size tiers.
///
/// Text that is too long to be a heading is rejected. Text matching one of
/// the script's heading patterns is accepted. Any other short line is
/// accepted too unless `require_pattern_match` is set; the size tiers do the
/// real rejection in that case.
pub fn is_heading_candidate(text: &str, script: Script, config: &ExtractConfig) -> bool {
    match script {
        Script::Japanese => {
            // no spaces between words, so count characters
            if text.chars().count() > config.japanese_max_chars {
                return false;
            }
            if looks_like_japanese_heading(text, &config.patterns) {
                return true;
            }
        }
        Script::Latin => {
            if text.split_whitespace().count() > config.latin_max_words {
                return false;
            }
            if looks_like_latin_heading(text, &config.patterns) {
                return true;
            }
        }
    }

    !config.require_pattern_match
}

/// Sizes compare at hundredths of a point.
fn size_key(size: f64) -> i64 {
    (size * 100.0).round() as i64
}

/// The largest distinct font sizes of a document, in descending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeLevels {
    tiers: Vec<i64>,
}

impl SizeLevels {
    /// `H1` for the largest tier, `H2` for the next, ...; `None` for any
    /// size outside the tiers.
    pub fn level_for(&self, size: f64) -> Option<HeadingLevel> {
        let key = size_key(size);
        self.tiers
            .iter()
            .position(|&tier| tier == key)
            .and_then(|i| HeadingLevel::new(i as u32 + 1))
    }

    pub fn sizes(&self) -> Vec<f64> {
        self.tiers.iter().map(|&key| key as f64 / 100.0).collect()
    }
}

/// Map the `top_n` largest distinct font sizes to `H1..H<top_n>`.
pub fn map_sizes_to_levels<I>(sizes: I, top_n: usize) -> SizeLevels
where
    I: IntoIterator<Item = f64>,
{
    let mut tiers: Vec<i64> = sizes.into_iter().map(size_key).collect();
    tiers.sort_unstable_by(|a, b| b.cmp(a));
    tiers.dedup();
    tiers.truncate(top_n);
    SizeLevels { tiers }
}

fn outranks(a: &TextSpan, b: &TextSpan) -> bool {
    match a.size.partial_cmp(&b.size) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Equal) => a.bold && !b.bold,
        _ => false,
    }
}

/// Largest `(size, bold)` span; the earliest one wins a tie.
fn largest<'a, I>(spans: I) -> Option<&'a TextSpan>
where
    I: IntoIterator<Item = &'a TextSpan>,
{
    spans.into_iter().fold(None, |best, span| match best {
        Some(current) if !outranks(span, current) => Some(current),
        _ => Some(span),
    })
}

/// Pick the document title from the spans of page 1.
pub fn pick_title(spans: &[TextSpan], script: Script, config: &ExtractConfig) -> String {
    let page_one: Vec<&TextSpan> = spans.iter().filter(|span| span.page == 1).collect();

    if script == Script::Japanese {
        let numbered = page_one
            .iter()
            .copied()
            .filter(|span| looks_like_japanese_heading(&span.text, &config.patterns));
        if let Some(best) = largest(numbered) {
            return best.text.clone();
        }
    }

    largest(page_one).map(|span| span.text.clone()).unwrap_or_default()
}

/// Build the outline of a document without an embedded table of contents.
pub fn build_outline(spans: &[TextSpan], config: &ExtractConfig) -> Outline {
    let script = detect_script(spans, config);
    let title = pick_title(spans, script, config);
    let levels = map_sizes_to_levels(spans.iter().map(|span| span.size), config.heading_tiers);
    debug!("Script {:?}, {} spans, heading sizes {:?}", script, spans.len(), levels.sizes());

    let mut seen: HashSet<(HeadingLevel, &str, u32)> = HashSet::new();
    let mut outline = Vec::new();

    for span in spans {
        if !is_heading_candidate(&span.text, script, config) {
            continue;
        }
        let Some(level) = levels.level_for(span.size) else {
            continue;
        };
        if seen.insert((level, span.text.as_str(), span.page)) {
            outline.push(Heading {
                level,
                text: span.text.clone(),
                page: i64::from(span.page),
            });
        }
    }

    Outline { title, outline }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, size: f64, bold: bool, page: u32) -> TextSpan {
        TextSpan {
            size,
            bold,
            text: text.to_string(),
            page,
            x: 72.0,
            y: 700.0,
        }
    }

    const PARAGRAPH: &str =
        "This paragraph is long enough that it can never be mistaken for a heading by the filter";

    #[test]
    fn normalize_text_folds_compatibility_forms() {
        assert_eq!(normalize_text("  Ｃｈａｐｔｅｒ　１\n"), "Chapter 1");
        assert_eq!(normalize_text("ﬁle"), "file");
        assert_eq!(normalize_text(" \t "), "");
    }

    #[test]
    fn script_detection_uses_the_sample() {
        let config = ExtractConfig::default();
        let latin = vec![span("Introduction", 12.0, false, 1)];
        assert_eq!(detect_script(&latin, &config), Script::Latin);

        let mixed = vec![span("Overview", 12.0, false, 1), span("概要", 12.0, false, 2)];
        assert_eq!(detect_script(&mixed, &config), Script::Japanese);
    }

    #[test]
    fn script_detection_ignores_spans_past_the_limit() {
        let mut config = ExtractConfig::default();
        config.language_sample_limit = 1;
        let spans = vec![span("Overview", 12.0, false, 1), span("概要", 12.0, false, 2)];
        assert_eq!(detect_script(&spans, &config), Script::Latin);
    }

    #[test]
    fn latin_candidates_are_limited_by_word_count() {
        let config = ExtractConfig::default();
        assert!(is_heading_candidate("1.2 Scope of Work", Script::Latin, &config));
        assert!(is_heading_candidate("Acknowledgements", Script::Latin, &config));
        assert!(!is_heading_candidate(PARAGRAPH, Script::Latin, &config));
        let twelve = "one two three four five six seven eight nine ten eleven twelve";
        assert!(is_heading_candidate(twelve, Script::Latin, &config));
        assert!(!is_heading_candidate(&format!("{} thirteen", twelve), Script::Latin, &config));
    }

    #[test]
    fn japanese_candidates_are_limited_by_character_count() {
        let config = ExtractConfig::default();
        assert!(is_heading_candidate("第1章", Script::Japanese, &config));
        assert!(is_heading_candidate(&"あ".repeat(80), Script::Japanese, &config));
        assert!(!is_heading_candidate(&"あ".repeat(81), Script::Japanese, &config));
    }

    #[test]
    fn strict_mode_requires_a_pattern() {
        let config = ExtractConfig::default().with_require_pattern_match(true);
        assert!(is_heading_candidate("A. Background", Script::Latin, &config));
        assert!(is_heading_candidate("IV. Results", Script::Latin, &config));
        assert!(!is_heading_candidate("Background", Script::Latin, &config));
        assert!(is_heading_candidate("第十二条", Script::Japanese, &config));
        assert!(!is_heading_candidate("はじめに", Script::Japanese, &config));
    }

    #[test]
    fn latin_patterns() {
        let patterns = HeadingPatterns::default();
        assert!(looks_like_latin_heading("1 Introduction", &patterns));
        assert!(looks_like_latin_heading("3.1.4 Details", &patterns));
        assert!(looks_like_latin_heading("B. Method", &patterns));
        assert!(looks_like_latin_heading("xii appendix", &patterns));
        assert!(!looks_like_latin_heading("Introduction", &patterns));
        assert!(!looks_like_latin_heading("1.", &patterns));
    }

    #[test]
    fn three_largest_distinct_sizes_become_levels() {
        let levels = map_sizes_to_levels(vec![10.0, 24.0, 12.0, 24.0, 18.0, 9.0], 3);
        assert_eq!(levels.sizes(), vec![24.0, 18.0, 12.0]);
        assert_eq!(levels.level_for(24.0), Some(HeadingLevel::H1));
        assert_eq!(levels.level_for(18.0), Some(HeadingLevel::H2));
        assert_eq!(levels.level_for(12.0), Some(HeadingLevel::H3));
        assert_eq!(levels.level_for(10.0), None);
    }

    #[test]
    fn sizes_within_rounding_noise_share_a_tier() {
        let levels = map_sizes_to_levels(vec![14.000001, 13.999999, 11.0], 3);
        assert_eq!(levels.sizes(), vec![14.0, 11.0]);
        assert_eq!(levels.level_for(14.0000004), Some(HeadingLevel::H1));
    }

    #[test]
    fn no_sizes_means_no_levels() {
        let levels = map_sizes_to_levels(Vec::new(), 3);
        assert_eq!(levels.level_for(12.0), None);
    }

    #[test]
    fn title_is_largest_then_boldest_on_page_one() {
        let config = ExtractConfig::default();
        let spans = vec![
            span("Plain", 20.0, false, 1),
            span("Strong", 20.0, true, 1),
            span("Later", 20.0, true, 1),
            span("Bigger elsewhere", 30.0, true, 2),
        ];
        assert_eq!(pick_title(&spans, Script::Latin, &config), "Strong");
    }

    #[test]
    fn title_is_empty_without_page_one_text() {
        let config = ExtractConfig::default();
        let spans = vec![span("Only on two", 20.0, false, 2)];
        assert_eq!(pick_title(&spans, Script::Latin, &config), "");
        assert_eq!(pick_title(&[], Script::Japanese, &config), "");
    }

    #[test]
    fn japanese_title_prefers_numbered_headings() {
        let config = ExtractConfig::default();
        let spans = vec![
            span("会社概要", 28.0, true, 1),
            span("第1章", 16.0, false, 1),
            span("第2章", 16.0, true, 1),
        ];
        assert_eq!(pick_title(&spans, Script::Japanese, &config), "第2章");
        // Latin documents never apply the Japanese preference.
        assert_eq!(pick_title(&spans, Script::Latin, &config), "会社概要");
    }

    #[test]
    fn single_chapter_with_body_text() {
        let config = ExtractConfig::default();
        let spans = vec![span("Chapter 1", 24.0, true, 1), span(PARAGRAPH, 12.0, false, 1)];
        let outline = build_outline(&spans, &config);
        assert_eq!(outline.title, "Chapter 1");
        assert_eq!(
            outline.outline,
            vec![Heading {
                level: HeadingLevel::H1,
                text: "Chapter 1".to_string(),
                page: 1,
            }]
        );
    }

    #[test]
    fn outline_keeps_scan_order_and_drops_duplicates() {
        let config = ExtractConfig::default();
        let spans = vec![
            span("Report", 30.0, true, 1),
            span("1 Introduction", 20.0, true, 1),
            span("Footer", 8.0, false, 1),
            span("1.1 Motivation", 14.0, false, 1),
            span("1 Introduction", 20.0, true, 1),
            span("Report", 30.0, true, 2),
            span("2 Method", 20.0, true, 2),
        ];
        let outline = build_outline(&spans, &config);
        let got: Vec<(String, &str, i64)> = outline
            .outline
            .iter()
            .map(|h| (h.level.to_string(), h.text.as_str(), h.page))
            .collect();
        assert_eq!(
            got,
            vec![
                ("H1".to_string(), "Report", 1),
                ("H2".to_string(), "1 Introduction", 1),
                ("H3".to_string(), "1.1 Motivation", 1),
                ("H1".to_string(), "Report", 2),
                ("H2".to_string(), "2 Method", 2),
            ]
        );
    }

    #[test]
    fn every_heading_size_is_within_the_top_tiers() {
        let config = ExtractConfig::default();
        let sizes = [7.0, 9.5, 11.0, 12.0, 14.0, 16.0, 22.0];
        let spans: Vec<TextSpan> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| span(&format!("Line {}", i), size, false, 1))
            .collect();
        let outline = build_outline(&spans, &config);
        let texts: Vec<&str> = outline.outline.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["Line 4", "Line 5", "Line 6"]);
    }

    #[test]
    fn japanese_document_uses_character_limit() {
        let config = ExtractConfig::default();
        let long_line = "これは本文の段落です。".repeat(10);
        let spans = vec![
            span("第1章", 20.0, true, 1),
            span("はじめに", 16.0, false, 1),
            span(&long_line, 16.0, false, 1),
        ];
        let outline = build_outline(&spans, &config);
        let texts: Vec<&str> = outline.outline.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["第1章", "はじめに"]);
        assert_eq!(outline.title, "第1章");
    }
}
