use epub::doc::EpubDoc;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::{info, warn};

use super::html::{decode_entities, is_block_element, TextSink, SKIPPED_ELEMENTS};
use super::{ExtractionResult, Extractor};
use crate::error::ExtractError;
use crate::source::SourceFile;

/// EPUB strategy: every content document of the spine, in reading order
pub struct EpubExtractor;

impl Extractor for EpubExtractor {
    fn name(&self) -> &'static str {
        "epub"
    }

    fn try_extract(&self, source: &SourceFile) -> Result<ExtractionResult, ExtractError> {
        info!("Extracting text from EPUB: {}", source.name());

        let mut doc = EpubDoc::from_reader(Cursor::new(source.content().to_vec()))
            .map_err(|e| ExtractError::Epub(e.to_string()))?;

        let mut metadata = BTreeMap::new();
        for (key, name) in [("title", "title"), ("creator", "author"), ("language", "language")] {
            if let Some(item) = doc.mdata(key) {
                let value = item.value.trim();
                if !value.is_empty() {
                    metadata.insert(name.to_string(), value.to_string());
                }
            }
        }

        let mut parts = Vec::new();
        let mut skipped = 0;
        let spine_len = doc.spine.len();

        for i in 0..spine_len {
            doc.set_current_chapter(i);

            let Some((content, mime)) = doc.get_current_str() else {
                warn!("EPUB item {} of {} could not be read", i + 1, source.name());
                skipped += 1;
                continue;
            };

            if !(mime.contains("html") || mime.contains("xml")) {
                continue;
            }

            match xhtml_to_text(&content) {
                Ok(text) if !text.trim().is_empty() => parts.push(text),
                Ok(_) => {}
                Err(e) => {
                    warn!("EPUB item {} of {} processing error: {}", i + 1, source.name(), e);
                    skipped += 1;
                }
            }
        }

        info!("Extracted {} of {} items from {}", parts.len(), spine_len, source.name());

        Ok(ExtractionResult::from_units(parts, "\n\n", skipped).with_metadata(metadata))
    }
}

/// Visible text of a well-formed XHTML content document.
///
/// Unlike `html_to_text` this is strict: mismatched or malformed markup is an error.
pub(crate) fn xhtml_to_text(xhtml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xhtml);
    let mut sink = TextSink::default();
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                if skip_depth > 0 || SKIPPED_ELEMENTS.contains(&name.as_str()) {
                    skip_depth += 1;
                } else if is_block_element(&name) {
                    sink.break_line();
                }
            }
            Ok(Event::End(e)) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                } else {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                    if is_block_element(&name) {
                        sink.break_line();
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                if skip_depth == 0 && is_block_element(&name) {
                    sink.break_line();
                }
            }
            Ok(Event::Text(te)) if skip_depth == 0 => {
                // XHTML content often uses HTML entities that XML unescaping rejects
                sink.push_inline(&decode_entities(&String::from_utf8_lossy(&te)));
            }
            Ok(Event::CData(cdata)) if skip_depth == 0 => {
                sink.push_inline(&String::from_utf8_lossy(&cdata));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::Markup(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(sink.finish())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extract::ExtractionStatus;
    use crate::source::Format;
    use std::io::Write;
    use std::path::Path;
    use zip::write::SimpleFileOptions;

    /// Build an EPUB whose spine holds the given XHTML documents in order
    pub(crate) fn build_epub(chapters: &[&str]) -> Vec<u8> {
        let mut manifest = String::new();
        let mut spine = String::new();
        for i in 0..chapters.len() {
            manifest.push_str(&format!(
                "<item id=\"ch{i}\" href=\"ch{i}.xhtml\" media-type=\"application/xhtml+xml\"/>"
            ));
            spine.push_str(&format!("<itemref idref=\"ch{i}\"/>"));
        }

        let opf = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"2.0\" unique-identifier=\"id\">\
             <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\
             <dc:title>Test Book</dc:title><dc:creator>Jane Author</dc:creator>\
             <dc:language>en</dc:language><dc:identifier id=\"id\">test-book</dc:identifier>\
             </metadata>\
             <manifest><item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>{manifest}</manifest>\
             <spine toc=\"ncx\">{spine}</spine></package>"
        );
        let ncx = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                   <ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\
                   <head/><docTitle><text>Test Book</text></docTitle><navMap/></ncx>";
        let container = "<?xml version=\"1.0\"?>\
                         <container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\
                         <rootfiles><rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/></rootfiles>\
                         </container>";

        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            zip.start_file("mimetype", stored).unwrap();
            zip.write_all(b"application/epub+zip").unwrap();

            let options = SimpleFileOptions::default();
            zip.start_file("META-INF/container.xml", options).unwrap();
            zip.write_all(container.as_bytes()).unwrap();
            zip.start_file("OEBPS/content.opf", options).unwrap();
            zip.write_all(opf.as_bytes()).unwrap();
            zip.start_file("OEBPS/toc.ncx", options).unwrap();
            zip.write_all(ncx.as_bytes()).unwrap();
            for (i, chapter) in chapters.iter().enumerate() {
                zip.start_file(format!("OEBPS/ch{i}.xhtml"), options).unwrap();
                zip.write_all(chapter.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    pub(crate) fn xhtml(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>Chapter</title>\
             <style>p {{ margin: 0; }}</style></head><body>{}</body></html>",
            body
        )
    }

    fn epub(bytes: Vec<u8>) -> SourceFile {
        SourceFile::from_bytes(Path::new("novel.epub"), bytes, Format::Epub)
    }

    #[test]
    fn test_items_joined_in_spine_order() {
        let bytes = build_epub(&[
            &xhtml("<h1>Chapter One</h1><p>It was a bright cold day in April.</p>"),
            &xhtml("<p>The clocks were striking thirteen.</p><script>var x = 1;</script>"),
        ]);
        let result = EpubExtractor.extract(&epub(bytes));

        assert_eq!(
            result.text,
            "Chapter One\nIt was a bright cold day in April.\n\nThe clocks were striking thirteen."
        );
        assert_eq!(result.status, ExtractionStatus::Complete);
        assert_eq!(result.metadata.get("title").map(String::as_str), Some("Test Book"));
        assert_eq!(result.metadata.get("author").map(String::as_str), Some("Jane Author"));
    }

    #[test]
    fn test_malformed_item_is_skipped() {
        let bytes = build_epub(&[
            &xhtml("<p>A perfectly valid chapter of the book.</p>"),
            &xhtml("<p>Broken <b>markup</p>"),
        ]);
        let result = EpubExtractor.extract(&epub(bytes));

        assert_eq!(result.text, "A perfectly valid chapter of the book.");
        assert_eq!(result.status, ExtractionStatus::Partial { skipped_units: 1 });
        assert!(!result.is_failed());
    }

    #[test]
    fn test_empty_file_fails_without_panic() {
        let result = EpubExtractor.extract(&epub(Vec::new()));
        assert!(result.is_failed());
        assert!(result.text.is_empty());
    }

    #[test]
    fn test_xhtml_entities() {
        let text = xhtml_to_text(&xhtml("<p>&lsquo;Caf&#233;&rsquo; &amp; bar&nbsp;&mdash; open</p>")).unwrap();
        assert_eq!(text, "\u{2018}Caf\u{e9}\u{2019} & bar \u{2014} open");

        let text = xhtml_to_text(&xhtml("<p>Cr&egrave;me br&ucirc;l&eacute;e &euro;4</p>")).unwrap();
        assert_eq!(text, "Cr\u{e8}me br\u{fb}l\u{e9}e \u{20ac}4");
    }
}
