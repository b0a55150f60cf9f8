use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};
use lopdf::{content::Content, Dictionary, Document, Object, ObjectId};

use crate::functions::normalize_text;

/// Nesting bound for Form XObjects invoked from content streams.
const MAX_FORM_DEPTH: usize = 8;

/// `TJ` adjustments (thousandths of an em) wider than this read as a word gap.
const KERNING_SPACE_THRESHOLD: f64 = 200.0;

/// FontDescriptor flag bit 19.
const FORCE_BOLD_FLAG: i64 = 1 << 18;

/// Baselines closer than this (user-space units) count as the same line.
const BASELINE_TOLERANCE: f64 = 0.5;

/// A run of text drawn in one font and size on one baseline, with its font metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// Effective font size in user space, rounded to hundredths of a point.
    pub size: f64,
    pub bold: bool,
    /// Normalized, never empty.
    pub text: String,
    /// 1-based page number.
    pub page: u32,
    pub x: f64,
    pub y: f64,
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix(pub [f64; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn translate(tx: f64, ty: f64) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    /// Length of the transformed unit y-vector.
    pub fn vertical_scale(&self) -> f64 {
        let [_, _, c, d, _, _] = self.0;
        (c * c + d * d).sqrt()
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.0[4], self.0[5])
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() != 6 {
            return None;
        }
        let mut m = [0.0; 6];
        for (slot, operand) in m.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        Some(Matrix(m))
    }
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Follow one level of indirection.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    let obj = dict.get(key).ok()?;
    resolve(doc, obj)?.as_dict().ok()
}

fn name_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

// WinAnsiEncoding 0x80..=0x9F; the rest of the code page coincides with Latin-1.
const WIN_ANSI_HIGH: [char; 32] = [
    '€', '\u{FFFD}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{FFFD}', 'Ž', '\u{FFFD}',
    '\u{FFFD}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{FFFD}', 'ž', 'Ÿ',
];

fn win_ansi_char(byte: u8) -> char {
    match byte {
        0x80..=0x9F => WIN_ANSI_HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}

fn utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Best-effort decoding of string bytes with no font-specific mapping:
/// UTF-16BE with BOM, then UTF-8 (BOM stripped), then WinAnsi.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if let Some(payload) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return utf16_be(payload);
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    bytes.iter().map(|&b| win_ansi_char(b)).collect()
}

/// Whether a font name advertises a heavy weight.
pub fn is_bold_font_name(font_name: &str) -> bool {
    let font_lower = font_name.to_lowercase();

    font_lower.contains("bold")
        || font_lower.contains("black")
        || font_lower.contains("heavy")
        || font_lower.contains("semibold")
        || font_lower.contains("demi")
}

fn parse_to_unicode(doc: &Document, font: &Dictionary) -> Option<HashMap<u32, String>> {
    let stream = match resolve(doc, font.get(b"ToUnicode").ok()?)? {
        Object::Stream(stream) => stream,
        _ => return None,
    };
    let contents = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    // The CMap parser panics on some malformed input.
    let parsed = std::panic::catch_unwind(|| adobe_cmap_parser::get_unicode_map(&contents));
    let cmap = match parsed {
        Ok(Ok(cmap)) => cmap,
        Ok(Err(e)) => {
            warn!("Failed to parse ToUnicode CMap: {:?}", e);
            return None;
        }
        Err(_) => {
            warn!("ToUnicode CMap parser panicked, ignoring the CMap");
            return None;
        }
    };

    let map = cmap
        .into_iter()
        .filter(|(_, utf16)| utf16.len() % 2 == 0)
        .map(|(code, utf16)| (code, utf16_be(&utf16)))
        .collect();
    Some(map)
}

/// What the span extractor needs to know about one font resource.
#[derive(Debug, Clone, Default)]
pub struct FontInfo {
    pub base_font: String,
    pub bold: bool,
    /// Type0 font with two-byte character codes.
    pub composite: bool,
    /// Composite font using the `Identity-H`/`Identity-V` CMap.
    pub identity: bool,
    pub to_unicode: Option<HashMap<u32, String>>,
}

impl FontInfo {
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let base_font = name_string(font, b"BaseFont").unwrap_or_default();
        let composite = name_string(font, b"Subtype").as_deref() == Some("Type0");
        let identity = composite
            && name_string(font, b"Encoding").map_or(false, |enc| enc.starts_with("Identity"));

        // Composite fonts keep their descriptor on the first descendant.
        let descriptor_owner = if composite {
            font.get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|kids| kids.first())
                .and_then(|kid| resolve(doc, kid))
                .and_then(|kid| kid.as_dict().ok())
        } else {
            Some(font)
        };
        let descriptor = descriptor_owner.and_then(|owner| resolve_dict(doc, owner, b"FontDescriptor"));

        let heavy_descriptor = descriptor.map_or(false, |d| {
            let weight = d.get(b"FontWeight").ok().and_then(number).unwrap_or(0.0);
            let flags = d.get(b"Flags").ok().and_then(number).unwrap_or(0.0) as i64;
            weight >= 600.0 || flags & FORCE_BOLD_FLAG != 0
        });

        Self {
            bold: heavy_descriptor || is_bold_font_name(&base_font),
            base_font,
            composite,
            identity,
            to_unicode: parse_to_unicode(doc, font),
        }
    }

    /// Decode the bytes of a shown string into Unicode text.
    pub fn decode(&self, bytes: &[u8]) -> String {
        if let Some(map) = &self.to_unicode {
            let width = if self.composite { 2 } else { 1 };
            let mut out = String::new();
            for code in bytes.chunks(width) {
                let key = code.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                match map.get(&key) {
                    Some(s) => out.push_str(s),
                    None if !self.composite => out.push(win_ansi_char(code[0])),
                    None => {}
                }
            }
            return out;
        }

        if self.identity && bytes.len() >= 2 && bytes.len() % 2 == 0 {
            let decoded = utf16_be(bytes);
            if !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
                return decoded;
            }
        }

        decode_text_simple(bytes)
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Rc<FontInfo>>,
    font_size: f64,
    leading: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: None,
            font_size: 12.0,
            leading: 0.0,
        }
    }
}

/// Append a piece of the same line to a run. Words are separated by a space
/// unless either side of the joint is a CJK-range character.
fn join_run(run: &mut String, piece: &str) {
    let wide = |c: char| c >= '\u{2E80}';
    if let (Some(last), Some(first)) = (run.chars().last(), piece.chars().next()) {
        if !wide(last) && !wide(first) {
            run.push(' ');
        }
    }
    run.push_str(piece);
}

/// Walks content streams and records text spans.
struct SpanCollector<'a> {
    doc: &'a Document,
    page: u32,
    fonts: HashMap<ObjectId, Rc<FontInfo>>,
    fallback_font: Rc<FontInfo>,
    spans: Vec<TextSpan>,
    /// Font of the last span while later operators of the same text object may extend it.
    open_run: Option<Rc<FontInfo>>,
}

impl<'a> SpanCollector<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            page: 0,
            fonts: HashMap::new(),
            fallback_font: Rc::new(FontInfo::default()),
            spans: Vec::new(),
            open_run: None,
        }
    }

    fn font(&mut self, resources: Option<&'a Dictionary>, name: &[u8]) -> Option<Rc<FontInfo>> {
        let doc = self.doc;
        let fonts = resolve_dict(doc, resources?, b"Font")?;
        let entry = fonts.get(name).ok()?;
        if let Object::Reference(id) = entry {
            if let Some(cached) = self.fonts.get(id) {
                return Some(Rc::clone(cached));
            }
        }

        let dict = resolve(doc, entry)?.as_dict().ok()?;
        let info = Rc::new(FontInfo::from_dict(doc, dict));
        debug!("Page {}: font /{} is {:?} (bold: {})", self.page, String::from_utf8_lossy(name), info.base_font, info.bold);
        if let Object::Reference(id) = entry {
            self.fonts.insert(*id, Rc::clone(&info));
        }
        Some(info)
    }

    fn push_span(&mut self, text: &str, state: &GraphicsState, text_matrix: &Matrix) {
        let text = normalize_text(text);
        if text.is_empty() {
            return;
        }
        let rendering = text_matrix.multiply(&state.ctm);
        let size = state.font_size.abs() * rendering.vertical_scale();
        let size = (size * 100.0).round() / 100.0;
        let (x, y) = rendering.origin();
        let font = state
            .font
            .clone()
            .unwrap_or_else(|| Rc::clone(&self.fallback_font));

        if let (Some(run_font), Some(last)) = (&self.open_run, self.spans.last_mut()) {
            if Rc::ptr_eq(run_font, &font)
                && last.page == self.page
                && last.size == size
                && (last.y - y).abs() < BASELINE_TOLERANCE
            {
                join_run(&mut last.text, &text);
                return;
            }
        }

        self.spans.push(TextSpan {
            size,
            bold: font.bold,
            text,
            page: self.page,
            x,
            y,
        });
        self.open_run = Some(font);
    }

    fn show_string(&self, state: &GraphicsState, operand: Option<&Object>) -> String {
        let font = state.font.as_ref().unwrap_or(&self.fallback_font);
        match operand {
            Some(Object::String(bytes, _)) => font.decode(bytes),
            _ => String::new(),
        }
    }

    fn show_array(&self, state: &GraphicsState, operand: Option<&Object>) -> String {
        let font = state.font.as_ref().unwrap_or(&self.fallback_font);
        let items = match operand {
            Some(Object::Array(items)) => items,
            _ => return String::new(),
        };
        let mut combined = String::new();
        for item in items {
            match item {
                Object::String(bytes, _) => combined.push_str(&font.decode(bytes)),
                other => {
                    let adjustment = number(other).unwrap_or(0.0);
                    if adjustment < -KERNING_SPACE_THRESHOLD
                        && !combined.is_empty()
                        && !combined.ends_with(' ')
                    {
                        combined.push(' ');
                    }
                }
            }
        }
        combined
    }

    fn run(&mut self, data: &[u8], resources: Option<&'a Dictionary>, initial: GraphicsState, depth: usize) {
        let content = match Content::decode(data) {
            Ok(content) => content,
            Err(e) => {
                warn!("Page {}: could not decode content stream: {}", self.page, e);
                return;
            }
        };

        let mut state = initial;
        let mut saved: Vec<GraphicsState> = Vec::new();
        let mut text_matrix = Matrix::IDENTITY;
        let mut line_matrix = Matrix::IDENTITY;

        for op in &content.operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => saved.push(state.clone()),
                "Q" => {
                    if let Some(restored) = saved.pop() {
                        state = restored;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        state.ctm = m.multiply(&state.ctm);
                    }
                }
                "BT" => {
                    text_matrix = Matrix::IDENTITY;
                    line_matrix = Matrix::IDENTITY;
                    self.open_run = None;
                }
                "ET" => self.open_run = None,
                "Tf" => {
                    // "Tf" has operands: font-name, font-size
                    if let [Object::Name(name), size] = operands {
                        state.font = self.font(resources, name);
                        if state.font.is_none() {
                            debug!("Page {}: font /{} not found in resources", self.page, String::from_utf8_lossy(name));
                        }
                        if let Some(size) = number(size) {
                            state.font_size = size;
                        }
                    }
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(number) {
                        state.leading = leading;
                    }
                }
                "Td" | "TD" => {
                    if let [tx, ty] = operands {
                        if let (Some(tx), Some(ty)) = (number(tx), number(ty)) {
                            if op.operator == "TD" {
                                state.leading = -ty;
                            }
                            line_matrix = Matrix::translate(tx, ty).multiply(&line_matrix);
                            text_matrix = line_matrix;
                        }
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        line_matrix = m;
                        text_matrix = m;
                    }
                }
                "T*" => {
                    line_matrix = Matrix::translate(0.0, -state.leading).multiply(&line_matrix);
                    text_matrix = line_matrix;
                }
                "Tj" => {
                    let text = self.show_string(&state, operands.first());
                    self.push_span(&text, &state, &text_matrix);
                }
                "TJ" => {
                    let text = self.show_array(&state, operands.first());
                    self.push_span(&text, &state, &text_matrix);
                }
                "'" | "\"" => {
                    line_matrix = Matrix::translate(0.0, -state.leading).multiply(&line_matrix);
                    text_matrix = line_matrix;
                    let text = self.show_string(&state, operands.last());
                    self.push_span(&text, &state, &text_matrix);
                }
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.run_form(resources, name, &state, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn run_form(&mut self, resources: Option<&'a Dictionary>, name: &[u8], state: &GraphicsState, depth: usize) {
        if depth >= MAX_FORM_DEPTH {
            warn!("Page {}: Form XObjects nested deeper than {}, skipping /{}", self.page, MAX_FORM_DEPTH, String::from_utf8_lossy(name));
            return;
        }
        let doc = self.doc;
        let stream = match resources
            .and_then(|res| resolve_dict(doc, res, b"XObject"))
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|obj| resolve(doc, obj))
        {
            Some(Object::Stream(stream)) => stream,
            _ => return,
        };
        if name_string(&stream.dict, b"Subtype").as_deref() != Some("Form") {
            return;
        }

        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| Matrix::from_operands(arr))
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = resolve_dict(doc, &stream.dict, b"Resources").or(resources);
        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let mut form_state = state.clone();
        form_state.ctm = form_matrix.multiply(&state.ctm);
        self.open_run = None;
        self.run(&data, form_resources, form_state, depth + 1);
        self.open_run = None;
    }
}

/// Resources of a page, inherited from the page tree when not set directly.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    // Page trees are shallow; the bound only stops malformed parent loops.
    for _ in 0..64 {
        if let Some(resources) = resolve_dict(doc, node, b"Resources") {
            return Some(resources);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

/// Extract text spans with their font size and style from every page, in
/// page order and then content-stream order.
///
/// Consecutive text-showing operators of one `BT`/`ET` object that share font,
/// size and baseline form one span, so a heading drawn word by word (`(1) Tj
/// 20 0 Td (Introduction) Tj`) comes out as `1 Introduction`. Glyph widths are
/// not consulted: a word split across operators on one line gains a space.
pub fn extract_spans(doc: &Document) -> Vec<TextSpan> {
    let mut collector = SpanCollector::new(doc);

    for (page_no, page_id) in doc.get_pages() {
        collector.page = page_no;
        collector.open_run = None;
        let content = match doc.get_page_content(page_id) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read content of page {}: {}", page_no, e);
                continue;
            }
        };
        let resources = page_resources(doc, page_id);
        collector.run(&content, resources, GraphicsState::default(), 0);
    }

    collector.spans
}
