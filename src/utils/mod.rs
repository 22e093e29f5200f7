pub mod language;
pub mod text_processor;

pub use language::{Detection, LanguageDetector, LanguageError, LanguageFilter, WhatlangDetector};
pub use text_processor::{collapse_whitespace, normalize_paragraphs};
