use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dataset_prep::config::{OutputFormat, PipelineConfig};
use dataset_prep::pipeline::{generate_summary_report, BatchProcessor};

#[derive(Debug, Parser)]
#[command(author, version, about = "Extract, clean and language-filter documents for dataset building")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Process every document in the input directory, then write the summary
    Process(ProcessArgs),
    /// Rebuild the summary report from persisted metadata
    Summary(SummaryArgs),
}

#[derive(Debug, Args)]
struct ProcessArgs {
    /// Path to configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Input directory containing documents
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Output directory for cleaned texts, metadata and the summary
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Number of worker threads (defaults to the CPU count)
    #[arg(long, env = "MAX_WORKERS")]
    workers: Option<usize>,
    /// Encoding of the cleaned-text artifacts
    #[arg(long, value_enum)]
    output_format: Option<OutputFormat>,
    /// Minimum language-detection confidence for a paragraph to be kept
    #[arg(long)]
    min_confidence: Option<f64>,
    /// Descend into subdirectories of the input directory
    #[arg(long)]
    recursive: bool,
    /// Never fall back to OCR for scanned PDF pages
    #[arg(long)]
    no_ocr: bool,
}

#[derive(Debug, Args)]
struct SummaryArgs {
    /// Path to configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output directory holding the metadata records
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process(args) => process_command(args),
        Commands::Summary(args) => summary_command(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            info!("Loading config from: {:?}", path);
            PipelineConfig::load(path)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn process_command(args: ProcessArgs) -> Result<ExitCode> {
    let mut config = load_config(args.config.as_ref())?;

    if let Some(input) = args.input {
        config.input_dir = input;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    if let Some(format) = args.output_format {
        config.output_format = format;
    }
    if let Some(min_confidence) = args.min_confidence {
        config.language.min_confidence = min_confidence;
    }
    if args.recursive {
        config.recursive = true;
    }
    if args.no_ocr {
        config.pdf.ocr.enabled = false;
    }

    info!("Configuration:\n{}", config);

    let processor = BatchProcessor::new(config)?;
    let (report, summary) = processor.run()?;

    for (path, error) in report.failures() {
        warn!("Failed: {:?} ({})", path, error);
    }
    info!(
        "Summary: {} records, {} paragraphs, {} characters",
        summary.processed_files, summary.total_paragraphs, summary.total_characters
    );

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("No file was processed successfully");
        Ok(ExitCode::FAILURE)
    }
}

fn summary_command(args: SummaryArgs) -> Result<ExitCode> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(output) = args.output {
        config.output_dir = output;
    }

    let summary = generate_summary_report(&config.metadata_dir(), &config.summary_path())?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(ExitCode::SUCCESS)
}
