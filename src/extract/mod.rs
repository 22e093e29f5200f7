//! Per-format text extraction.
//!
//! Every strategy implements [`Extractor`]. Strategy faults are folded into the
//! returned [`ExtractionResult`] so that one bad document can never abort a batch;
//! the [`ExtractionStatus`] tells an empty-because-faulty result apart from a
//! document that simply had no text.

mod docx;
mod epub;
mod html;
mod ocr;
mod pdf;
mod text;

pub use docx::DocxExtractor;
pub use epub::EpubExtractor;
pub use html::{html_to_text, HtmlExtractor};
pub use ocr::{PageOcr, TesseractOcr};
pub use pdf::PdfExtractor;
pub use text::TextExtractor;

#[cfg(test)]
pub(crate) use self::{epub::tests as epub_fixtures, pdf::tests as pdf_fixtures};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::error::ExtractError;
use crate::source::{Format, SourceFile};

/// How an extraction ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// Every unit (page, content item) was read
    Complete,
    /// Some units failed; the text holds whatever was recovered
    Partial { skipped_units: usize },
    /// The document was read without fault but carries no text
    NoContent,
    /// The document could not be read at all
    Failed(String),
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Complete => "complete",
            ExtractionStatus::Partial { .. } => "partial",
            ExtractionStatus::NoContent => "no_content",
            ExtractionStatus::Failed(_) => "failed",
        }
    }
}

/// Raw text pulled out of one source file
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub text: String,
    pub ocr_used: bool,
    /// Document-level metadata (title, author, ...), empty for formats without any
    pub metadata: BTreeMap<String, String>,
    pub status: ExtractionStatus,
}

impl ExtractionResult {
    /// Build a result from text, choosing `Complete` or `NoContent`
    pub fn from_text(text: String) -> Self {
        let status = if text.trim().is_empty() {
            ExtractionStatus::NoContent
        } else {
            ExtractionStatus::Complete
        };

        Self {
            text,
            ocr_used: false,
            metadata: BTreeMap::new(),
            status,
        }
    }

    /// Build a result from the units that could be read, given how many could not
    pub fn from_units(parts: Vec<String>, separator: &str, skipped_units: usize) -> Self {
        let total = parts.len() + skipped_units;
        let text = parts.join(separator);

        let status = if skipped_units == 0 {
            if text.trim().is_empty() {
                ExtractionStatus::NoContent
            } else {
                ExtractionStatus::Complete
            }
        } else if skipped_units == total {
            ExtractionStatus::Failed(format!("all {} units failed", total))
        } else {
            ExtractionStatus::Partial { skipped_units }
        };

        Self {
            text,
            ocr_used: false,
            metadata: BTreeMap::new(),
            status,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            ocr_used: false,
            metadata: BTreeMap::new(),
            status: ExtractionStatus::Failed(reason.into()),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ExtractionStatus::Failed(_))
    }
}

/// One extraction strategy
pub trait Extractor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Extract text, surfacing document-level faults as errors
    fn try_extract(&self, source: &SourceFile) -> Result<ExtractionResult, ExtractError>;

    /// Extract text; faults become a `Failed` result instead of an error
    fn extract(&self, source: &SourceFile) -> ExtractionResult {
        match self.try_extract(source) {
            Ok(result) => result,
            Err(e) => {
                warn!("{} extraction failed for {}: {}", self.name(), source.name(), e);
                ExtractionResult::failed(e.to_string())
            }
        }
    }
}

/// Strategy table indexed by format, built once at startup
#[derive(Clone)]
pub struct Extractors {
    strategies: HashMap<Format, Arc<dyn Extractor>>,
}

impl Extractors {
    /// Registry with the built-in strategy for every known format.
    ///
    /// OCR is left out when it is disabled or tesseract cannot be launched.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let ocr: Option<Arc<dyn PageOcr>> = if config.pdf.ocr.enabled {
            let engine = TesseractOcr::new(config.pdf.ocr.clone());
            if engine.is_available() {
                Some(Arc::new(engine))
            } else {
                warn!(
                    "OCR enabled but {:?} is not runnable; scanned PDF pages will be skipped",
                    config.pdf.ocr.tesseract_cmd
                );
                None
            }
        } else {
            None
        };

        Self::empty()
            .with_strategy(Format::Pdf, Arc::new(PdfExtractor::new(config.pdf.min_page_chars, ocr)))
            .with_strategy(Format::Epub, Arc::new(EpubExtractor))
            .with_strategy(Format::Txt, Arc::new(TextExtractor))
            .with_strategy(Format::Docx, Arc::new(DocxExtractor))
            .with_strategy(Format::Html, Arc::new(HtmlExtractor))
    }

    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register or replace the strategy for a format. `Format::Unknown` is never registered.
    pub fn with_strategy(mut self, format: Format, extractor: Arc<dyn Extractor>) -> Self {
        if format != Format::Unknown {
            self.strategies.insert(format, extractor);
        }
        self
    }

    pub fn get(&self, format: Format) -> Option<&dyn Extractor> {
        self.strategies.get(&format).map(|e| e.as_ref())
    }
}
