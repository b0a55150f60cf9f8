//! Reading the document outline (bookmarks) embedded in the catalog.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::font_utils::{resolve, resolve_dict};
use crate::functions::normalize_text;
use crate::{Heading, HeadingLevel, Outline};

/// Named destinations may point at other named destinations; stop after this many hops.
const MAX_DEST_HOPS: u8 = 8;
const MAX_NAME_TREE_DEPTH: u8 = 32;

// PDFDocEncoding where it departs from Latin-1: 0x18..=0x1F and 0x80..=0xA0.
const PDF_DOC_LOW: [char; 8] = ['˘', 'ˇ', 'ˆ', '˙', '˝', '˛', '˚', '˜'];
const PDF_DOC_HIGH: [char; 33] = [
    '•', '†', '‡', '…', '\u{2014}', '\u{2013}', 'ƒ', '⁄', '‹', '›', '−', '‰', '„', '“', '”', '‘',
    '’', '‚', '™', 'ﬁ', 'ﬂ', 'Ł', 'Œ', 'Š', 'Ÿ', 'Ž', 'ı', 'ł', 'œ', 'š', 'ž', '\u{FFFD}', '€',
];

fn pdf_doc_char(byte: u8) -> char {
    match byte {
        0x18..=0x1F => PDF_DOC_LOW[(byte - 0x18) as usize],
        0x80..=0xA0 => PDF_DOC_HIGH[(byte - 0x80) as usize],
        0xAD => '\u{FFFD}',
        _ => byte as char,
    }
}

/// Decode a PDF text string: UTF-16BE or UTF-8 behind their byte order
/// marks, PDFDocEncoding otherwise.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(payload) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = payload
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(payload) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(payload).into_owned();
    }
    bytes.iter().map(|&b| pdf_doc_char(b)).collect()
}

/// One bookmark, flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// 1-based nesting depth.
    pub level: u32,
    pub title: String,
    /// 1-based page number, `-1` when the destination does not resolve to a page.
    pub page: i64,
}

struct TocWalker<'a> {
    doc: &'a Document,
    catalog: &'a Dictionary,
    pages: HashMap<ObjectId, u32>,
    visited: HashSet<ObjectId>,
    entries: Vec<TocEntry>,
}

impl<'a> TocWalker<'a> {
    /// Depth-first, children before the next sibling.
    fn walk(&mut self, first: ObjectId) {
        let doc = self.doc;
        let mut pending: Vec<(ObjectId, u32)> = vec![(first, 1)];

        while let Some((id, depth)) = pending.pop() {
            if !self.visited.insert(id) {
                warn!("Outline item {:?} is reachable twice, stopping that branch", id);
                continue;
            }
            let Some(item) = doc.get_object(id).ok().and_then(|o| o.as_dict().ok()) else {
                continue;
            };

            let title = match item.get(b"Title").ok().and_then(|o| resolve(doc, o)) {
                Some(Object::String(bytes, _)) => decode_text_string(bytes),
                _ => String::new(),
            };
            let page = self.destination_page(item).map_or(-1, i64::from);
            self.entries.push(TocEntry { level: depth, title, page });

            if let Ok(next) = item.get(b"Next").and_then(|o| o.as_reference()) {
                pending.push((next, depth));
            }
            if let Ok(child) = item.get(b"First").and_then(|o| o.as_reference()) {
                pending.push((child, depth + 1));
            }
        }
    }

    fn destination_page(&self, item: &'a Dictionary) -> Option<u32> {
        if let Ok(dest) = item.get(b"Dest") {
            return self.resolve_destination(dest, 0);
        }

        let action = resolve_dict(self.doc, item, b"A")?;
        match action.get(b"S") {
            Ok(Object::Name(kind)) if kind.as_slice() == b"GoTo" => {}
            _ => return None,
        }
        self.resolve_destination(action.get(b"D").ok()?, 0)
    }

    fn resolve_destination(&self, dest: &'a Object, hops: u8) -> Option<u32> {
        if hops > MAX_DEST_HOPS {
            return None;
        }
        match resolve(self.doc, dest)? {
            Object::Array(parts) => match parts.first()? {
                Object::Reference(page_id) => self.pages.get(page_id).copied(),
                _ => None,
            },
            Object::Name(name) | Object::String(name, _) => {
                let target = self.named_destination(name)?;
                self.resolve_destination(target, hops + 1)
            }
            // Named destinations may be wrapped as << /D [...] >>.
            Object::Dictionary(dict) => self.resolve_destination(dict.get(b"D").ok()?, hops + 1),
            _ => None,
        }
    }

    fn named_destination(&self, name: &[u8]) -> Option<&'a Object> {
        let doc = self.doc;
        if let Some(found) = resolve_dict(doc, self.catalog, b"Dests").and_then(|dests| dests.get(name).ok()) {
            return Some(found);
        }
        let tree = resolve_dict(doc, self.catalog, b"Names").and_then(|names| resolve_dict(doc, names, b"Dests"))?;
        self.lookup_name_tree(tree, name, 0)
    }

    fn lookup_name_tree(&self, node: &'a Dictionary, key: &[u8], depth: u8) -> Option<&'a Object> {
        if depth > MAX_NAME_TREE_DEPTH {
            return None;
        }
        let doc = self.doc;

        let names = node
            .get(b"Names")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok());
        if let Some(names) = names {
            for pair in names.chunks(2) {
                if let [Object::String(name, _), value] = pair {
                    if name.as_slice() == key {
                        return Some(value);
                    }
                }
            }
        }

        let kids = node
            .get(b"Kids")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())?;
        kids.iter()
            .filter_map(|kid| resolve(doc, kid).and_then(|k| k.as_dict().ok()))
            .find_map(|kid| self.lookup_name_tree(kid, key, depth + 1))
    }
}

/// Flatten the catalog's `/Outlines` tree depth-first, in document order.
/// Empty when the document carries no bookmarks.
pub fn read_toc(doc: &Document) -> Vec<TocEntry> {
    let Some(catalog) = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|root| resolve(doc, root))
        .and_then(|root| root.as_dict().ok())
    else {
        warn!("Document has no catalog");
        return Vec::new();
    };
    let Some(first) = resolve_dict(doc, catalog, b"Outlines")
        .and_then(|outlines| outlines.get(b"First").ok())
        .and_then(|first| first.as_reference().ok())
    else {
        return Vec::new();
    };

    let pages = doc
        .get_pages()
        .into_iter()
        .map(|(number, id)| (id, number))
        .collect();
    let mut walker = TocWalker {
        doc,
        catalog,
        pages,
        visited: HashSet::new(),
        entries: Vec::new(),
    };
    walker.walk(first);
    debug!("Embedded outline has {} entries", walker.entries.len());
    walker.entries
}

/// Turn TOC entries into an outline: levels clamped to `max_depth`, text
/// normalized, title taken from the first entry. `None` for an empty TOC.
pub fn outline_from_toc(entries: &[TocEntry], max_depth: u32) -> Option<Outline> {
    let first = entries.first()?;
    let outline = entries
        .iter()
        .map(|entry| Heading {
            level: HeadingLevel::new(entry.level.min(max_depth)).unwrap_or(HeadingLevel::H1),
            text: normalize_text(&entry.title),
            page: entry.page,
        })
        .collect();

    Some(Outline {
        title: normalize_text(&first.title),
        outline,
    })
}
