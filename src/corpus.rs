use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

const CLEANED_SUFFIX: &str = "_cleaned.txt";

/// One paragraph of the packaged corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub id: String,
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub documents: usize,
    pub records: usize,
}

/// Plain-text cleaned artifacts in `cleaned_dir`, sorted by path
pub fn cleaned_artifacts(cleaned_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(cleaned_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.file_name()
                .and_then(|s| s.to_str())
                .map(|name| name.ends_with(CLEANED_SUFFIX))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Collect every `*_cleaned.txt` artifact into a JSON Lines corpus, one record per paragraph
pub fn build_corpus(cleaned_dir: &Path, output_path: &Path) -> Result<CorpusStats> {
    let artifacts = cleaned_artifacts(cleaned_dir);
    if artifacts.is_empty() {
        anyhow::bail!("No cleaned text files found in {:?}", cleaned_dir);
    }
    info!("Found {} cleaned text files", artifacts.len());

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create corpus file: {:?}", output_path))?;
    let mut writer = BufWriter::new(file);

    let mut stats = CorpusStats::default();
    for path in &artifacts {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping unreadable artifact {:?}: {}", path, e);
                continue;
            }
        };

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let stem = name.strip_suffix(CLEANED_SUFFIX).unwrap_or(name);

        for (idx, line) in text.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            let record = CorpusRecord {
                id: format!("{}-{:06}", stem, idx),
                source: stem.to_string(),
                text: line.to_string(),
            };
            serde_json::to_writer(&mut writer, &record).with_context(|| "Failed to serialize corpus record")?;
            writer.write_all(b"\n")?;
            stats.records += 1;
        }
        stats.documents += 1;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write corpus file: {:?}", output_path))?;
    info!(
        "Corpus saved: {:?} ({} records from {} documents)",
        output_path, stats.records, stats.documents
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_corpus_has_one_record_per_line() {
        let dir = TempDir::new().unwrap();
        let cleaned = dir.path().join("cleaned_texts");
        fs::create_dir_all(&cleaned).unwrap();
        fs::write(cleaned.join("beta_cleaned.txt"), "Second book line.").unwrap();
        fs::write(cleaned.join("alpha_cleaned.txt"), "First line.\n\nSecond line.").unwrap();
        fs::write(cleaned.join("alpha_cleaned.json"), "[\"ignored\"]").unwrap();

        let out = dir.path().join("dataset/corpus.jsonl");
        let stats = build_corpus(&cleaned, &out).unwrap();
        assert_eq!(stats, CorpusStats { documents: 2, records: 3 });

        let records: Vec<CorpusRecord> = fs::read_to_string(&out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records[0].id, "alpha-000000");
        assert_eq!(records[1].text, "Second line.");
        assert_eq!(records[2].source, "beta");
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(build_corpus(dir.path(), &dir.path().join("corpus.jsonl")).is_err());
    }
}
