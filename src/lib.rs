// Library exports for use in scripts and other binaries

pub mod config;
pub mod corpus;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod source;
pub mod utils;

// Re-export commonly used types
pub use config::{OutputFormat, PipelineConfig};
pub use error::{ExtractError, ProcessError};
pub use extract::{ExtractionResult, ExtractionStatus, Extractor, Extractors};
pub use pipeline::{BatchProcessor, BatchReport, FileMetadata, SummaryReport};
pub use source::{detect_format, Format, SourceFile};
