use once_cell::sync::Lazy;
use quick_xml::escape::resolve_html5_entity;
use regex::{Captures, Regex};
use tracing::info;

use super::text::decode_text;
use super::{ExtractionResult, Extractor};
use crate::error::ExtractError;
use crate::source::SourceFile;

/// Elements whose content is never visible text
pub(crate) const SKIPPED_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "template", "head"];

const BLOCK_ELEMENTS: [&str; 30] = [
    "address", "article", "aside", "blockquote", "br", "caption", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tr",
];

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z][a-zA-Z0-9]*);").expect("entity pattern is valid")
});

pub(crate) fn is_block_element(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name) || name == "td" || name == "th" || name == "ul"
}

/// Decode HTML5 named entities and numeric ones; unknown entities are kept verbatim
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded: Option<String> = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32).map(String::from)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32).map(String::from)
            } else {
                named_entity(entity).map(String::from)
            };
            decoded.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Named entity from the HTML5 table; `&nbsp;` becomes a plain space
fn named_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some(" "),
        _ => resolve_html5_entity(name),
    }
}

/// Accumulates visible text, collapsing inline whitespace and breaking lines at block boundaries
#[derive(Debug, Default)]
pub(crate) struct TextSink {
    out: String,
}

impl TextSink {
    pub fn push_inline(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        let needs_gap = !self.out.is_empty() && !self.out.ends_with(char::is_whitespace);
        let words: Vec<&str> = text.split_whitespace().collect();

        if words.is_empty() {
            if needs_gap {
                self.out.push(' ');
            }
            return;
        }

        if needs_gap && text.starts_with(char::is_whitespace) {
            self.out.push(' ');
        }
        self.out.push_str(&words.join(" "));
        if text.ends_with(char::is_whitespace) {
            self.out.push(' ');
        }
    }

    pub fn break_line(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    pub fn finish(self) -> String {
        self.out
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Visible text of an HTML document, one line per block element.
///
/// Tolerant of unclosed and mismatched tags; script, style and head content is dropped.
pub fn html_to_text(html: &str) -> String {
    let mut sink = TextSink::default();
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        sink.push_inline(&decode_entities(&rest[..lt]));
        rest = &rest[lt..];

        // A bare '<' in running text is not a tag
        let starts_tag = rest[1..]
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?')
            .unwrap_or(false);
        if !starts_tag {
            sink.push_inline("<");
            rest = &rest[1..];
            continue;
        }

        if rest.starts_with("<!--") {
            rest = match rest.find("-->") {
                Some(end) => &rest[end + 3..],
                None => "",
            };
            continue;
        }

        let Some(gt) = rest.find('>') else {
            rest = "";
            break;
        };
        let tag = &rest[1..gt];
        rest = &rest[gt + 1..];

        let closing = tag.starts_with('/');
        let name = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if !closing && !tag.ends_with('/') && SKIPPED_ELEMENTS.contains(&name.as_str()) {
            rest = skip_past_close_tag(rest, &name);
            continue;
        }

        if is_block_element(&name) {
            sink.break_line();
        }
    }

    sink.push_inline(&decode_entities(rest));
    sink.finish()
}

fn skip_past_close_tag<'a>(rest: &'a str, name: &str) -> &'a str {
    let close = format!("</{}", name);
    // ASCII lowercasing keeps byte offsets intact
    match rest.to_ascii_lowercase().find(&close) {
        Some(pos) => match rest[pos..].find('>') {
            Some(gt) => &rest[pos + gt + 1..],
            None => "",
        },
        None => "",
    }
}

/// Single-pass HTML strategy
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn try_extract(&self, source: &SourceFile) -> Result<ExtractionResult, ExtractError> {
        info!("Extracting text from HTML: {}", source.name());
        let html = decode_text(source.content(), source.name());
        Ok(ExtractionResult::from_text(html_to_text(&html)))
    }
}
