use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use tracing::info;

use super::{ExtractionResult, Extractor};
use crate::error::ExtractError;
use crate::source::SourceFile;

const DOCUMENT_XML: &str = "word/document.xml";
/// Maximum decompressed bytes read from the document part (zip-bomb protection)
const MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;

/// DOCX strategy: paragraph text from `word/document.xml`
pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn try_extract(&self, source: &SourceFile) -> Result<ExtractionResult, ExtractError> {
        info!("Extracting text from DOCX: {}", source.name());

        let mut archive = zip::ZipArchive::new(Cursor::new(source.content()))
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        let entry = archive
            .by_name(DOCUMENT_XML)
            .map_err(|e| ExtractError::Docx(format!("{}: {}", DOCUMENT_XML, e)))?;

        let mut xml = Vec::new();
        entry.take(MAX_DOCUMENT_BYTES).read_to_end(&mut xml)?;
        if xml.len() as u64 >= MAX_DOCUMENT_BYTES {
            return Err(ExtractError::Docx(format!("{} exceeds size limit", DOCUMENT_XML)));
        }

        let paragraphs = document_paragraphs(&xml)?;
        Ok(ExtractionResult::from_text(paragraphs.join("\n\n")))
    }
}

/// Text of every non-empty `w:p`, in document order
fn document_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push(' '),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let tail = current.trim();
    if !tail.is_empty() {
        paragraphs.push(tail.to_string());
    }

    Ok(paragraphs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extract::ExtractionStatus;
    use crate::source::Format;
    use std::io::Write;
    use std::path::Path;

    pub(crate) fn build_docx(body: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file(DOCUMENT_XML, zip::write::SimpleFileOptions::default())
                .unwrap();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
                body
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    fn docx(bytes: Vec<u8>) -> SourceFile {
        SourceFile::from_bytes(Path::new("report.docx"), bytes, Format::Docx)
    }

    #[test]
    fn test_paragraphs_and_runs() {
        let bytes = build_docx(
            "<w:p><w:r><w:t>First </w:t></w:r><w:r><w:t>paragraph</w:t></w:r></w:p>\
             <w:p></w:p>\
             <w:p><w:r><w:t>Tom &amp; Jerry</w:t><w:tab/><w:t>tabbed</w:t></w:r></w:p>",
        );
        let result = DocxExtractor.extract(&docx(bytes));

        assert_eq!(result.text, "First paragraph\n\nTom & Jerry tabbed");
        assert_eq!(result.status, ExtractionStatus::Complete);
    }

    #[test]
    fn test_not_a_zip_fails() {
        let result = DocxExtractor.extract(&docx(b"plain bytes".to_vec()));
        assert!(result.is_failed());
    }

    #[test]
    fn test_missing_document_part_fails() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let result = DocxExtractor.extract(&docx(buf));
        assert!(result.is_failed());
    }
}
