use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::OutputFormat;

/// Write the cleaned paragraphs of one file in the chosen encoding
pub fn save_cleaned_text(path: &Path, paragraphs: &[String], format: OutputFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }

    let body = match format {
        OutputFormat::Txt => paragraphs.join("\n"),
        OutputFormat::Json => serde_json::to_string_pretty(paragraphs)
            .with_context(|| "Failed to serialize paragraphs")?,
        OutputFormat::Csv => paragraphs
            .iter()
            .map(|p| format!("{}\r\n", csv_field(p)))
            .collect(),
    };

    fs::write(path, body).with_context(|| format!("Failed to write cleaned text: {:?}", path))
}

/// Quote a single CSV field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paragraphs() -> Vec<String> {
        vec![
            "First paragraph here.".to_string(),
            "He said \"hi\", then left.".to_string(),
        ]
    }

    #[test]
    fn test_txt_is_line_delimited() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cleaned_texts/book_cleaned.txt");
        save_cleaned_text(&path, &paragraphs(), OutputFormat::Txt).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "First paragraph here.\nHe said \"hi\", then left.");
    }

    #[test]
    fn test_json_is_string_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book_cleaned.json");
        save_cleaned_text(&path, &paragraphs(), OutputFormat::Json).unwrap();

        let parsed: Vec<String> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, paragraphs());
    }

    #[test]
    fn test_csv_is_single_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book_cleaned.csv");
        save_cleaned_text(&path, &paragraphs(), OutputFormat::Csv).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "First paragraph here.\r\n\"He said \"\"hi\"\", then left.\"\r\n"
        );
    }
}
