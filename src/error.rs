use std::path::PathBuf;
use thiserror::Error;

/// Faults raised inside an extraction strategy.
///
/// These never cross the `Extractor::extract` boundary; they are folded into
/// an `ExtractionResult` with a `Failed` status.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("EPUB error: {0}")]
    Epub(String),

    #[error("DOCX error: {0}")]
    Docx(String),

    #[error("markup error: {0}")]
    Markup(String),

    #[error("OCR error: {0}")]
    Ocr(String),
}

/// Why a single file did not make it through the pipeline.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("unsupported format")]
    UnsupportedFormat,

    #[error("failed to read source file: {0}")]
    Read(#[source] std::io::Error),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("failed to persist output: {0:#}")]
    Persist(anyhow::Error),

    #[error("stem {stem:?} already claimed by {claimed_by:?}")]
    DuplicateStem { stem: String, claimed_by: PathBuf },

    #[error("worker panicked: {0}")]
    Panicked(String),
}
