use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Document type driving strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Epub,
    Txt,
    Docx,
    Html,
    Unknown,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Epub => "epub",
            Format::Txt => "txt",
            Format::Docx => "docx",
            Format::Html => "html",
            Format::Unknown => "unknown",
        }
    }

    fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Format::Pdf),
            "epub" => Some(Format::Epub),
            "txt" => Some(Format::Txt),
            "docx" => Some(Format::Docx),
            "html" | "htm" | "xhtml" => Some(Format::Html),
            _ => None,
        }
    }

    fn from_mime(essence: &str) -> Option<Format> {
        if essence.contains("pdf") {
            Some(Format::Pdf)
        } else if essence.contains("epub") {
            Some(Format::Epub)
        } else if essence.contains("html") {
            Some(Format::Html)
        } else if essence.contains("wordprocessingml") || essence.contains("msword") {
            Some(Format::Docx)
        } else if essence.starts_with("text/") {
            Some(Format::Txt)
        } else {
            None
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a path by extension, falling back to a MIME guess.
///
/// Never fails: a missing file or an unrecognised type both yield `Format::Unknown`.
pub fn detect_format(path: &Path) -> Format {
    if !path.is_file() {
        warn!("File not found, cannot detect format: {:?}", path);
        return Format::Unknown;
    }

    if let Some(format) = path
        .extension()
        .and_then(|s| s.to_str())
        .and_then(Format::from_extension)
    {
        return format;
    }

    let format = mime_guess::from_path(path)
        .first()
        .and_then(|mime| Format::from_mime(mime.essence_str()))
        .unwrap_or(Format::Unknown);

    debug!("Format of {:?} guessed from MIME: {}", path, format);
    format
}

/// A document read into memory, ready for extraction.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    name: String,
    stem: String,
    content: Vec<u8>,
    format: Format,
}

impl SourceFile {
    pub fn from_bytes(path: &Path, content: Vec<u8>, format: Format) -> Self {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path: path.to_path_buf(),
            name,
            stem: file_stem(path),
            content,
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

/// Stem used to key every artifact derived from a source file
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}
