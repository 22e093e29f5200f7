//! Batch orchestration: discover inputs, then run every file through
//! detection, extraction, normalization, language filtering and persistence
//! on a fixed-size worker pool.

pub mod metadata;
pub mod output;

pub use metadata::{build_summary, generate_summary_report, FileMetadata, SummaryReport};
pub use output::save_cleaned_text;

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::error::ProcessError;
use crate::extract::{ExtractionStatus, Extractors};
use crate::source::{detect_format, file_stem, Format, SourceFile};
use crate::utils::{normalize_paragraphs, LanguageFilter};

/// Outcome of one file in a batch
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<FileMetadata, ProcessError>,
}

/// Per-file outcomes of a whole batch, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &ProcessError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.path.as_path(), e)))
    }

    /// A batch succeeds when at least one file did
    pub fn is_success(&self) -> bool {
        self.succeeded() > 0
    }
}

/// Runs the extraction-and-cleaning pipeline over a directory of documents
pub struct BatchProcessor {
    config: PipelineConfig,
    extractors: Extractors,
    filter: LanguageFilter,
    pool: rayon::ThreadPool,
}

impl BatchProcessor {
    /// Processor with the built-in strategies and the `whatlang` filter
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let extractors = Extractors::from_config(&config);
        let filter = LanguageFilter::new(&config.language)?;
        Self::with_components(config, extractors, filter)
    }

    /// Processor with explicit strategies and filter.
    ///
    /// Fails only on startup faults: invalid configuration, uncreatable output
    /// directories or a worker pool that cannot be built.
    pub fn with_components(config: PipelineConfig, extractors: Extractors, filter: LanguageFilter) -> Result<Self> {
        config.validate()?;

        for dir in [config.cleaned_dir(), config.metadata_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count())
            .thread_name(|i| format!("prep-worker-{}", i))
            .build()
            .with_context(|| "Failed to build worker pool")?;

        Ok(Self {
            config,
            extractors,
            filter,
            pool,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Regular files of the input directory, sorted by path
    pub fn discover_inputs(&self) -> Vec<PathBuf> {
        let input_dir = &self.config.input_dir;
        if !input_dir.is_dir() {
            warn!("Input directory does not exist: {:?}", input_dir);
            return Vec::new();
        }

        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let mut files: Vec<PathBuf> = WalkDir::new(input_dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Skipping unreadable directory entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();

        files.sort();
        files
    }

    /// Run one file through the pipeline and persist its artifacts.
    ///
    /// Nothing is written unless extraction succeeded.
    pub fn process_file(&self, path: &Path) -> Result<FileMetadata, ProcessError> {
        let format = detect_format(path);
        if format == Format::Unknown {
            return Err(ProcessError::UnsupportedFormat);
        }
        let extractor = self.extractors.get(format).ok_or(ProcessError::UnsupportedFormat)?;

        let content = fs::read(path).map_err(ProcessError::Read)?;
        let source = SourceFile::from_bytes(path, content, format);

        let extraction = extractor.extract(&source);
        match &extraction.status {
            ExtractionStatus::Failed(reason) => return Err(ProcessError::Extraction(reason.clone())),
            ExtractionStatus::Partial { skipped_units } => {
                warn!("{}: {} units could not be extracted", source.name(), skipped_units)
            }
            ExtractionStatus::NoContent => warn!("{}: no text content", source.name()),
            ExtractionStatus::Complete => {}
        }

        let cleaned = normalize_paragraphs(&extraction.text, self.config.normalizer.min_paragraph_chars);
        let kept = self.filter.filter(&cleaned);
        info!(
            "{}: kept {}/{} paragraphs as {}",
            source.name(),
            kept.len(),
            cleaned.len(),
            self.filter.target()
        );

        let cleaned_path = self.config.cleaned_path(source.stem());
        save_cleaned_text(&cleaned_path, &kept, self.config.output_format).map_err(ProcessError::Persist)?;
        info!("Cleaned text saved: {:?}", cleaned_path);

        let metadata = FileMetadata::new(source.name(), format, &kept, cleaned.len(), &extraction);
        if let Err(e) = metadata::save_metadata(&self.config.metadata_dir(), source.stem(), &metadata) {
            // A cleaned artifact without its record must not reach the corpus
            if let Err(remove_err) = fs::remove_file(&cleaned_path) {
                warn!("Failed to remove orphaned cleaned text {:?}: {}", cleaned_path, remove_err);
            }
            return Err(ProcessError::Persist(e));
        }

        Ok(metadata)
    }

    /// Process a single file; `true` on success. Faults and panics are logged, never raised.
    pub fn process_one(&self, path: &Path) -> bool {
        self.run_isolated(path).is_ok()
    }

    /// Process every input file on the worker pool.
    ///
    /// Returns only after every file has finished; one file's failure never affects another.
    pub fn process_all(&self) -> BatchReport {
        let files = self.discover_inputs();
        if files.is_empty() {
            warn!("No files found in input directory {:?}", self.config.input_dir);
            return BatchReport::default();
        }

        let (owners, duplicates) = partition_by_stem(files);
        info!(
            "Processing {} files with {} workers",
            owners.len() + duplicates.len(),
            self.config.worker_count()
        );

        let mut outcomes: Vec<FileOutcome> = self.pool.install(|| {
            owners
                .into_par_iter()
                .map(|path| {
                    let result = self.run_isolated(&path);
                    FileOutcome { path, result }
                })
                .collect()
        });

        for (path, claimed_by) in duplicates {
            warn!("Skipping {:?}: output stem already used by {:?}", path, claimed_by);
            let stem = file_stem(&path);
            outcomes.push(FileOutcome {
                path,
                result: Err(ProcessError::DuplicateStem { stem, claimed_by }),
            });
        }
        outcomes.sort_by(|a, b| a.path.cmp(&b.path));

        let report = BatchReport { outcomes };
        info!("Completed {}/{} files successfully", report.succeeded(), report.total());
        report
    }

    /// Rebuild the summary from every persisted record and write it
    pub fn generate_summary(&self) -> Result<SummaryReport> {
        generate_summary_report(&self.config.metadata_dir(), &self.config.summary_path())
    }

    /// Process the batch, then summarize once every worker has finished
    pub fn run(&self) -> Result<(BatchReport, SummaryReport)> {
        let report = self.process_all();
        let summary = self.generate_summary()?;
        Ok((report, summary))
    }

    fn run_isolated(&self, path: &Path) -> Result<FileMetadata, ProcessError> {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Processing: {}", name);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.process_file(path)))
            .unwrap_or_else(|payload| Err(ProcessError::Panicked(panic_message(payload.as_ref()))));

        match &result {
            Ok(_) => {}
            Err(ProcessError::UnsupportedFormat) => warn!("Unsupported format, skipped: {}", name),
            Err(e) => error!("Processing failed for {}: {}", name, e),
        }
        result
    }
}

/// Split sorted files into stem owners and later files colliding with an owner
fn partition_by_stem(files: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<(PathBuf, PathBuf)>) {
    let mut owners: HashMap<String, PathBuf> = HashMap::new();
    let mut unique = Vec::new();
    let mut duplicates = Vec::new();

    for path in files {
        let stem = file_stem(&path);
        match owners.get(&stem) {
            Some(owner) => duplicates.push((path, owner.clone())),
            None => {
                owners.insert(stem, path.clone());
                unique.push(path);
            }
        }
    }

    (unique, duplicates)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
