use std::path::Path;

use log::debug;
use lopdf::Document;

use crate::config::ExtractConfig;
use crate::error::Result;
use crate::font_utils::extract_spans;
use crate::functions::build_outline;
use crate::toc::{outline_from_toc, read_toc};
use crate::Outline;

/// Load a PDF from disk and extract its outline.
pub fn extract_outline(pdf_path: &Path, config: &ExtractConfig) -> Result<Outline> {
    let doc = Document::load(pdf_path)?;
    Ok(extract_outline_from_document(&doc, config))
}

pub fn extract_outline_from_bytes(bytes: &[u8], config: &ExtractConfig) -> Result<Outline> {
    let doc = Document::load_mem(bytes)?;
    Ok(extract_outline_from_document(&doc, config))
}

/// The embedded table of contents when there is one, font heuristics otherwise.
pub fn extract_outline_from_document(doc: &Document, config: &ExtractConfig) -> Outline {
    let toc = read_toc(doc);
    if let Some(outline) = outline_from_toc(&toc, config.max_toc_depth) {
        debug!("Using embedded table of contents ({} entries)", toc.len());
        return outline;
    }

    let spans = extract_spans(doc);
    debug!("No table of contents, inferring headings from {} spans", spans.len());
    build_outline(&spans, config)
}
