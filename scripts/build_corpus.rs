use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dataset_prep::corpus::build_corpus;

#[derive(Debug, Parser)]
#[command(author, version, about = "Package cleaned texts into a JSON Lines corpus")]
struct Args {
    /// Directory holding the `*_cleaned.txt` artifacts
    #[arg(short, long, default_value = "output/cleaned_texts")]
    input: PathBuf,

    /// Corpus file to write
    #[arg(short, long, default_value = "output/corpus.jsonl")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Input directory: {:?}", args.input);
    info!("Output file: {:?}", args.output);

    let stats = build_corpus(&args.input, &args.output)?;
    info!("Packaged {} paragraphs from {} documents", stats.records, stats.documents);

    Ok(())
}
