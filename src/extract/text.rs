use tracing::{info, warn};

use super::{ExtractionResult, Extractor};
use crate::error::ExtractError;
use crate::source::SourceFile;

/// Decode bytes as UTF-8, retrying once with Windows-1252 (a Latin-1 superset) on failure.
pub(crate) fn decode_text(bytes: &[u8], name: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!("Unicode decode error in {}: {}; retrying as Windows-1252", name, e);
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

/// Plain-text strategy
pub struct TextExtractor;

impl Extractor for TextExtractor {
    fn name(&self) -> &'static str {
        "txt"
    }

    fn try_extract(&self, source: &SourceFile) -> Result<ExtractionResult, ExtractError> {
        info!("Reading text file: {}", source.name());

        if source.content().is_empty() {
            warn!("Empty file: {}", source.name());
            return Ok(ExtractionResult::from_text(String::new()));
        }

        let text = decode_text(source.content(), source.name());
        if text.trim().is_empty() {
            warn!("File contains only whitespace: {}", source.name());
            return Ok(ExtractionResult::from_text(String::new()));
        }

        Ok(ExtractionResult::from_text(text))
    }
}
