use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use whatlang::{Detector, Lang};

use crate::config::LanguageFilterConfig;

#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("language could not be determined")]
    Undetermined,

    #[error("language detector failed: {0}")]
    Detector(String),

    #[error("unsupported language code: {0:?}")]
    UnsupportedLanguage(String),
}

/// Outcome of a single language identification
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// ISO 639-3 code
    pub language: String,
    pub confidence: f64,
}

/// Trait for language identification
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<Detection, LanguageError>;
}

/// Target-versus-rest decision on top of `whatlang` trigram scores.
///
/// Text with no letters of the target's script is undetermined. Otherwise the
/// detection names the winning side with its confidence: the target when
/// whatlang ranks it first (`0.5 + c / 2`) or when another language wins with
/// `c <= 0.5` (`1 - c`), that other language when it wins with `c > 0.5`.
/// Whatlang confidence stays near zero on line-length English, so such lines
/// are kept instead of being handed to whichever language scored highest.
pub struct WhatlangDetector {
    target: Lang,
    script_gate: Detector,
    open: Detector,
}

impl WhatlangDetector {
    pub fn new(target: Lang) -> Self {
        Self {
            target,
            script_gate: Detector::with_allowlist(vec![target]),
            open: Detector::new(),
        }
    }

    /// Detector for an ISO 639-3 code such as `"eng"`
    pub fn for_code(code: &str) -> Result<Self, LanguageError> {
        Lang::from_code(code)
            .map(Self::new)
            .ok_or_else(|| LanguageError::UnsupportedLanguage(code.to_string()))
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<Detection, LanguageError> {
        self.script_gate.detect(text).ok_or(LanguageError::Undetermined)?;

        let target = self.target.code().to_string();
        let Some(info) = self.open.detect(text) else {
            return Ok(Detection {
                language: target,
                confidence: 0.5,
            });
        };

        let c = info.confidence();
        let detection = if info.lang() == self.target {
            Detection {
                language: target,
                confidence: 0.5 + c / 2.0,
            }
        } else if c <= 0.5 {
            Detection {
                language: target,
                confidence: 1.0 - c,
            }
        } else {
            Detection {
                language: info.lang().code().to_string(),
                confidence: c,
            }
        };
        Ok(detection)
    }
}

/// Keeps only paragraphs identified as the target language with enough confidence
#[derive(Clone)]
pub struct LanguageFilter {
    detector: Arc<dyn LanguageDetector>,
    target: String,
    min_confidence: f64,
    enabled: bool,
}

impl LanguageFilter {
    /// Filter backed by [`WhatlangDetector`] for the configured target language
    pub fn new(config: &LanguageFilterConfig) -> Result<Self, LanguageError> {
        let detector = WhatlangDetector::for_code(&config.target_language.to_lowercase())?;
        Ok(Self::with_detector(config, Arc::new(detector)))
    }

    pub fn with_detector(config: &LanguageFilterConfig, detector: Arc<dyn LanguageDetector>) -> Self {
        Self {
            detector,
            target: config.target_language.to_lowercase(),
            min_confidence: config.min_confidence,
            enabled: config.enabled,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether a single paragraph passes; detector failures reject the paragraph
    pub fn accepts(&self, paragraph: &str) -> bool {
        if paragraph.trim().is_empty() {
            return false;
        }
        if !self.enabled {
            return true;
        }

        match self.detector.detect(paragraph) {
            Ok(detection) => detection.language == self.target && detection.confidence >= self.min_confidence,
            Err(LanguageError::Undetermined) => {
                debug!("Language undetermined, rejecting: {:?}", paragraph);
                false
            }
            Err(e) => {
                warn!("Language detection error: {}", e);
                false
            }
        }
    }

    /// Filter paragraphs, keeping their order
    pub fn filter(&self, paragraphs: &[String]) -> Vec<String> {
        paragraphs
            .iter()
            .filter(|p| self.accepts(p))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::normalize_paragraphs;

    /// Detector that answers from a fixed table and errors on anything containing "boom"
    struct ScriptedDetector;

    impl LanguageDetector for ScriptedDetector {
        fn detect(&self, text: &str) -> Result<Detection, LanguageError> {
            if text.contains("boom") {
                return Err(LanguageError::Detector("model crashed".to_string()));
            }
            let (language, confidence) = if text.starts_with("en:") {
                ("eng", 0.9)
            } else if text.starts_with("weak:") {
                ("eng", 0.2)
            } else {
                ("spa", 0.95)
            };
            Ok(Detection {
                language: language.to_string(),
                confidence,
            })
        }
    }

    fn scripted_filter() -> LanguageFilter {
        LanguageFilter::with_detector(&LanguageFilterConfig::default(), Arc::new(ScriptedDetector))
    }

    #[test]
    fn test_confidence_threshold() {
        let filter = scripted_filter();
        assert!(filter.accepts("en: confident english"));
        assert!(!filter.accepts("weak: unsure english"));
        assert!(!filter.accepts("es: texto en castellano"));
    }

    #[test]
    fn test_detector_failure_rejects_only_that_paragraph() {
        let filter = scripted_filter();
        let input: Vec<String> = vec![
            "en: first".into(),
            "en: boom goes the classifier".into(),
            "en: third".into(),
        ];
        let kept = filter.filter(&input);
        assert_eq!(kept, vec!["en: first".to_string(), "en: third".to_string()]);
    }

    #[test]
    fn test_blank_always_rejected() {
        let mut config = LanguageFilterConfig::default();
        config.enabled = false;
        let filter = LanguageFilter::with_detector(&config, Arc::new(ScriptedDetector));

        assert!(!filter.accepts("   "));
        assert!(filter.accepts("es: anything passes when disabled"));
    }

    #[test]
    fn test_filter_is_a_subset_in_order() {
        let filter = scripted_filter();
        let input: Vec<String> = vec!["es: uno".into(), "en: two".into(), "weak: three".into(), "en: four".into()];
        let kept = filter.filter(&input);

        assert!(kept.len() <= input.len());
        assert_eq!(kept, vec!["en: two".to_string(), "en: four".to_string()]);
        assert!(kept.iter().all(|p| filter.accepts(p)));
    }

    #[test]
    fn test_whatlang_keeps_short_english_lines() {
        let filter = LanguageFilter::new(&LanguageFilterConfig::default()).unwrap();

        let paragraphs = normalize_paragraphs("Hello world!\n  \nShort\nThis is a test.   ", 10);
        assert_eq!(filter.filter(&paragraphs), paragraphs);
        assert!(filter.accepts("The clocks were striking thirteen."));
    }

    #[test]
    fn test_whatlang_rejects_other_languages() {
        let filter = LanguageFilter::new(&LanguageFilterConfig::default()).unwrap();
        assert!(filter.accepts("Hello world! This is a test of the language detection system."));
        assert!(!filter.accepts(
            "El perro corre por el parque todos los días porque le gusta mucho jugar con los niños del barrio."
        ));
        assert!(!filter.accepts("这是一个用中文写的句子，用来测试语言检测。"));
    }

    #[test]
    fn test_unknown_target_code() {
        let mut config = LanguageFilterConfig::default();
        config.target_language = "klingon".to_string();
        assert!(matches!(
            LanguageFilter::new(&config),
            Err(LanguageError::UnsupportedLanguage(_))
        ));
    }
}
