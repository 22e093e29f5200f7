use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::extract::{ExtractionResult, ExtractionStatus};
use crate::source::Format;

const METADATA_SUFFIX: &str = "_metadata.json";

/// Processing record persisted for every successfully processed source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub source_file: String,
    pub source_format: Format,
    pub paragraph_count: usize,
    pub character_count: usize,
    /// Kept over cleaned paragraph count, as `"kept/total"`
    pub english_ratio: String,
    pub ocr_used: bool,
    /// Extraction-specific fields (document info, extraction status)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl FileMetadata {
    /// Record for `kept` paragraphs retained out of `cleaned_total`
    pub fn new(
        source_file: &str,
        source_format: Format,
        kept: &[String],
        cleaned_total: usize,
        extraction: &ExtractionResult,
    ) -> Self {
        let mut extra: BTreeMap<String, Value> = extraction
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        extra.insert(
            "extraction_status".to_string(),
            Value::String(extraction.status.as_str().to_string()),
        );
        if let ExtractionStatus::Partial { skipped_units } = extraction.status {
            extra.insert("skipped_units".to_string(), Value::from(skipped_units));
        }

        Self {
            source_file: source_file.to_string(),
            source_format,
            paragraph_count: kept.len(),
            character_count: kept.iter().map(|p| p.chars().count()).sum(),
            english_ratio: format!("{}/{}", kept.len(), cleaned_total),
            ocr_used: extraction.ocr_used,
            extra,
        }
    }

    /// Numeric form of `english_ratio`; `None` when nothing was cleaned or the field is malformed
    pub fn english_ratio_value(&self) -> Option<f64> {
        let (kept, total) = self.english_ratio.split_once('/')?;
        let kept: f64 = kept.trim().parse().ok()?;
        let total: f64 = total.trim().parse().ok()?;
        if total == 0.0 {
            return None;
        }
        Some(kept / total)
    }
}

pub fn metadata_path(metadata_dir: &Path, stem: &str) -> PathBuf {
    metadata_dir.join(format!("{}{}", stem, METADATA_SUFFIX))
}

/// Write the record for `stem`, replacing any earlier one
pub fn save_metadata(metadata_dir: &Path, stem: &str, metadata: &FileMetadata) -> Result<PathBuf> {
    fs::create_dir_all(metadata_dir)
        .with_context(|| format!("Failed to create metadata directory: {:?}", metadata_dir))?;

    let path = metadata_path(metadata_dir, stem);
    let json = serde_json::to_string_pretty(metadata)
        .with_context(|| "Failed to serialize file metadata")?;

    fs::write(&path, json).with_context(|| format!("Failed to write metadata: {:?}", path))?;
    info!("Metadata saved: {:?}", path);

    Ok(path)
}

pub fn load_metadata(path: &Path) -> Result<FileMetadata> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read metadata: {:?}", path))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse metadata: {:?}", path))
}

/// Run-level aggregate over every persisted metadata record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: Vec<String>,
    pub total_paragraphs: usize,
    pub total_characters: usize,
}

/// Rebuild the summary from scratch by scanning `metadata_dir`.
///
/// Unparsable records are listed in `failed_files`; a missing directory yields all-zero counters.
pub fn build_summary(metadata_dir: &Path) -> SummaryReport {
    let mut report = SummaryReport::default();

    if !metadata_dir.is_dir() {
        warn!("Metadata directory does not exist: {:?}", metadata_dir);
        return report;
    }

    let mut records: Vec<PathBuf> = WalkDir::new(metadata_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            path.file_name()
                .and_then(|s| s.to_str())
                .map(|name| name.ends_with(METADATA_SUFFIX))
                .unwrap_or(false)
        })
        .collect();
    records.sort();

    for path in records {
        report.total_files += 1;
        match load_metadata(&path) {
            Ok(meta) => {
                report.processed_files += 1;
                report.total_paragraphs += meta.paragraph_count;
                report.total_characters += meta.character_count;
            }
            Err(e) => {
                let name = path
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                warn!("Summary read error: {} - {:#}", name, e);
                report.failed_files.push(name);
            }
        }
    }

    report
}

/// Build the summary and persist it to `summary_path`
pub fn generate_summary_report(metadata_dir: &Path, summary_path: &Path) -> Result<SummaryReport> {
    let report = build_summary(metadata_dir);

    if let Some(parent) = summary_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(&report).with_context(|| "Failed to serialize summary")?;
    fs::write(summary_path, json)
        .with_context(|| format!("Failed to write summary report: {:?}", summary_path))?;

    info!(
        "Summary report saved: {:?} ({} of {} records readable)",
        summary_path, report.processed_files, report.total_files
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, kept: &[&str], total: usize) -> FileMetadata {
        let kept: Vec<String> = kept.iter().map(|s| s.to_string()).collect();
        let mut extraction = ExtractionResult::from_text(kept.join("\n"));
        extraction.metadata.insert("title".to_string(), "A Title".to_string());
        FileMetadata::new(name, Format::Pdf, &kept, total, &extraction)
    }

    #[test]
    fn test_metadata_json_shape() {
        let meta = record("book.pdf", &["First kept paragraph", "Second"], 3);
        let json: Value = serde_json::to_value(&meta).unwrap();

        assert_eq!(json["source_file"], "book.pdf");
        assert_eq!(json["source_format"], "pdf");
        assert_eq!(json["paragraph_count"], 2);
        assert_eq!(json["character_count"], 26);
        assert_eq!(json["english_ratio"], "2/3");
        assert_eq!(json["ocr_used"], false);
        assert_eq!(json["title"], "A Title");
        assert_eq!(json["extraction_status"], "complete");
    }

    #[test]
    fn test_ratio_value() {
        assert_eq!(record("a", &["x", "y"], 4).english_ratio_value(), Some(0.5));
        assert_eq!(record("a", &[], 0).english_ratio_value(), None);
    }

    #[test]
    fn test_save_overwrites_and_round_trips() {
        let dir = TempDir::new().unwrap();
        save_metadata(dir.path(), "book", &record("book.pdf", &["one"], 1)).unwrap();
        let path = save_metadata(dir.path(), "book", &record("book.pdf", &["one", "two"], 2)).unwrap();

        assert_eq!(path, dir.path().join("book_metadata.json"));
        let loaded = load_metadata(&path).unwrap();
        assert_eq!(loaded.paragraph_count, 2);
        assert_eq!(loaded.extra.get("title"), Some(&Value::String("A Title".to_string())));
    }

    #[test]
    fn test_summary_sums_and_lists_bad_records() {
        let dir = TempDir::new().unwrap();
        let a = record("a.pdf", &["alpha paragraph", "beta"], 2);
        let b = record("b.epub", &["gamma"], 5);
        save_metadata(dir.path(), "a", &a).unwrap();
        save_metadata(dir.path(), "b", &b).unwrap();
        fs::write(dir.path().join("broken_metadata.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let summary_path = dir.path().join("summary_report.json");
        let report = generate_summary_report(dir.path(), &summary_path).unwrap();

        assert_eq!(report.total_files, 3);
        assert_eq!(report.processed_files, 2);
        assert_eq!(report.failed_files, vec!["broken_metadata.json".to_string()]);
        assert_eq!(report.total_paragraphs, a.paragraph_count + b.paragraph_count);
        assert_eq!(report.total_characters, a.character_count + b.character_count);

        let persisted: SummaryReport =
            serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
        assert_eq!(persisted, report);
    }

    #[test]
    fn test_summary_of_missing_directory_is_zero() {
        let dir = TempDir::new().unwrap();
        let report = build_summary(&dir.path().join("metadata"));
        assert_eq!(report, SummaryReport::default());
    }
}
