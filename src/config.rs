use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Encoding used for cleaned-text artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Txt,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Txt
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Lines shorter than this (in characters, after whitespace collapsing) are dropped
    pub min_paragraph_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_paragraph_chars: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageFilterConfig {
    pub enabled: bool,
    /// ISO 639-3 code of the language to keep
    pub target_language: String,
    /// Minimum confidence that a paragraph is in the target language
    pub min_confidence: f64,
}

impl Default for LanguageFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_language: "eng".to_string(),
            min_confidence: 0.5,
        }
    }
}

impl LanguageFilterConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.min_confidence),
            "min_confidence must be within [0,1], got {}",
            self.min_confidence
        );
        ensure!(
            whatlang::Lang::from_code(&self.target_language).is_some(),
            "unknown target_language code: {:?}",
            self.target_language
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,
    /// Tesseract language pack
    pub language: String,
    pub dpi: u32,
    pub tesseract_cmd: String,
    pub pdftoppm_cmd: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "eng".to_string(),
            dpi: 300,
            tesseract_cmd: "tesseract".to_string(),
            pdftoppm_cmd: "pdftoppm".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Pages whose text layer is shorter than this are treated as scanned images
    pub min_page_chars: usize,
    pub ocr: OcrConfig,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_page_chars: 20,
            ocr: OcrConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Descend into subdirectories of `input_dir`
    pub recursive: bool,
    /// Worker threads; `None` means one per available CPU
    pub workers: Option<usize>,
    pub output_format: OutputFormat,
    pub normalizer: NormalizerConfig,
    pub language: LanguageFilterConfig,
    pub pdf: PdfConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            recursive: false,
            workers: None,
            output_format: OutputFormat::default(),
            normalizer: NormalizerConfig::default(),
            language: LanguageFilterConfig::default(),
            pdf: PdfConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing sections take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_json::from_str(&config_str)
            .with_context(|| format!("Failed to parse config JSON: {:?}", path))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.workers {
            ensure!(workers > 0, "workers must be > 0");
        }
        ensure!(self.pdf.ocr.dpi > 0, "ocr dpi must be > 0");
        self.language.validate()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn cleaned_dir(&self) -> PathBuf {
        self.output_dir.join("cleaned_texts")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.output_dir.join("metadata")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join("summary_report.json")
    }

    pub fn cleaned_path(&self, stem: &str) -> PathBuf {
        self.cleaned_dir()
            .join(format!("{}_cleaned.{}", stem, self.output_format.extension()))
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "input={:?} output={:?} workers={} format={} min_paragraph_chars={} language={}@{} min_page_chars={} ocr={}",
            self.input_dir,
            self.output_dir,
            self.worker_count(),
            self.output_format.extension(),
            self.normalizer.min_paragraph_chars,
            self.language.target_language,
            self.language.min_confidence,
            self.pdf.min_page_chars,
            self.pdf.ocr.enabled,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"output_format": "csv", "pdf": {"min_page_chars": 5}}"#)
                .unwrap();

        assert_eq!(config.output_format, OutputFormat::Csv);
        assert_eq!(config.pdf.min_page_chars, 5);
        assert_eq!(config.pdf.ocr.dpi, 300);
        assert_eq!(config.normalizer.min_paragraph_chars, 10);
        assert_eq!(config.language.target_language, "eng");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.workers = Some(0);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.language.min_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.language.target_language = "klingon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_paths() {
        let mut config = PipelineConfig::default();
        config.output_dir = PathBuf::from("out");
        config.output_format = OutputFormat::Json;

        assert_eq!(config.metadata_dir(), PathBuf::from("out/metadata"));
        assert_eq!(
            config.cleaned_path("book"),
            PathBuf::from("out/cleaned_texts/book_cleaned.json")
        );
        assert_eq!(config.worker_count(), num_cpus::get().max(1));
    }
}
