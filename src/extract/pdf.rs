use lopdf::{Dictionary, Document, Object};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::ocr::PageOcr;
use super::{ExtractionResult, Extractor};
use crate::error::ExtractError;
use crate::source::SourceFile;

/// Info dictionary keys and the metadata names they are reported under
const INFO_FIELDS: [(&[u8], &str); 6] = [
    (b"Title", "title"),
    (b"Author", "author"),
    (b"Creator", "creator"),
    (b"Producer", "producer"),
    (b"CreationDate", "creation_date"),
    (b"ModDate", "modification_date"),
];

/// PDF text extraction with per-page OCR fallback.
///
/// Pages are read in order from the text layer. A page whose text is shorter than
/// `min_page_chars` is assumed to be a scan and is sent to the OCR engine instead.
pub struct PdfExtractor {
    min_page_chars: usize,
    ocr: Option<Arc<dyn PageOcr>>,
}

impl PdfExtractor {
    pub fn new(min_page_chars: usize, ocr: Option<Arc<dyn PageOcr>>) -> Self {
        Self { min_page_chars, ocr }
    }

    fn has_enough_text(&self, text: &str) -> bool {
        let trimmed = text.trim();
        !trimmed.is_empty() && trimmed.chars().count() >= self.min_page_chars
    }
}

impl Extractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn try_extract(&self, source: &SourceFile) -> Result<ExtractionResult, ExtractError> {
        info!("Extracting text from PDF: {}", source.name());

        let doc = Document::load_mem(source.content())
            .map_err(|e| ExtractError::Pdf(format!("cannot parse document: {}", e)))?;

        let metadata = extract_document_info(&doc);
        let pages = doc.get_pages();

        let mut parts = Vec::with_capacity(pages.len());
        let mut skipped = 0;
        let mut ocr_used = false;

        for &page_number in pages.keys() {
            match doc.extract_text(&[page_number]) {
                Ok(text) if self.has_enough_text(&text) => {
                    parts.push(text);
                    continue;
                }
                Ok(_) => debug!("Page {} of {} has no usable text layer", page_number, source.name()),
                Err(e) => debug!("Text layer of page {} of {} unreadable: {}", page_number, source.name(), e),
            }

            let Some(ocr) = &self.ocr else {
                warn!("Page {} of {} needs OCR but OCR is disabled", page_number, source.name());
                skipped += 1;
                continue;
            };

            info!("Using OCR for page {} of {}", page_number, source.name());
            match ocr.recognize_page(source, page_number) {
                Ok(text) if text.trim().is_empty() => {
                    warn!("OCR found no text on page {} of {}", page_number, source.name());
                }
                Ok(text) => {
                    ocr_used = true;
                    parts.push(text);
                }
                Err(e) => {
                    warn!("Page {} of {} extraction failed: {}", page_number, source.name(), e);
                    skipped += 1;
                }
            }
        }

        info!("Extracted {} of {} pages from {}", parts.len(), pages.len(), source.name());

        let mut result = ExtractionResult::from_units(parts, "\n", skipped).with_metadata(metadata);
        result.ocr_used = ocr_used;
        Ok(result)
    }
}

/// Read the document Info dictionary; unreadable or empty fields are left out individually.
fn extract_document_info(doc: &Document) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();

    let info = match info_dictionary(doc) {
        Some(info) => info,
        None => return meta,
    };

    for (key, name) in INFO_FIELDS {
        let Ok(obj) = info.get(key) else {
            continue;
        };
        match resolve(doc, obj).as_str() {
            Ok(bytes) => {
                let value = decode_pdf_string(bytes);
                let value = value.trim();
                if !value.is_empty() {
                    meta.insert(name.to_string(), value.to_string());
                }
            }
            Err(e) => warn!("Metadata field {} unreadable: {}", name, e),
        }
    }

    meta
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    match resolve(doc, info).as_dict() {
        Ok(dict) => Some(dict),
        Err(e) => {
            warn!("Document info dictionary unreadable: {}", e);
            None
        }
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Decode a PDF text string: UTF-16BE when it carries a BOM, Latin-1 otherwise.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
