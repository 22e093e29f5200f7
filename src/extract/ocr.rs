use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::error::ExtractError;
use crate::source::SourceFile;

/// Recognises the text of a single PDF page rendered as an image.
pub trait PageOcr: Send + Sync {
    /// `page_number` is 1-based, matching PDF page numbering
    fn recognize_page(&self, source: &SourceFile, page_number: u32) -> Result<String, ExtractError>;
}

/// OCR through the external `pdftoppm` and `tesseract` tools.
///
/// Requires both on the PATH (or configured explicitly):
/// - Linux: `apt-get install tesseract-ocr poppler-utils`
/// - Mac: `brew install tesseract poppler`
pub struct TesseractOcr {
    config: OcrConfig,
}

impl TesseractOcr {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Check whether tesseract can be launched at all
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.tesseract_cmd)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn render_page(&self, pdf: &Path, page_number: u32, out_dir: &Path) -> Result<std::path::PathBuf, ExtractError> {
        let prefix = out_dir.join("page");
        let page = page_number.to_string();

        let output = Command::new(&self.config.pdftoppm_cmd)
            .arg("-f")
            .arg(&page)
            .arg("-l")
            .arg(&page)
            .arg("-r")
            .arg(self.config.dpi.to_string())
            .arg("-png")
            .arg("-singlefile")
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|e| ExtractError::Ocr(format!("{} not runnable: {}", self.config.pdftoppm_cmd, e)))?;

        if !output.status.success() {
            return Err(ExtractError::Ocr(format!(
                "{} failed on page {}: {}",
                self.config.pdftoppm_cmd,
                page_number,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(prefix.with_extension("png"))
    }

    /// Grayscale copy of the rendered page; tesseract reads it more reliably than colour scans
    fn to_grayscale(&self, image_path: &Path) -> Result<std::path::PathBuf, ExtractError> {
        let gray_path = image_path.with_file_name("page-gray.png");
        image::open(image_path)
            .map_err(|e| ExtractError::Ocr(format!("cannot decode rendered page: {}", e)))?
            .to_luma8()
            .save(&gray_path)
            .map_err(|e| ExtractError::Ocr(format!("cannot write grayscale page: {}", e)))?;
        Ok(gray_path)
    }

    fn run_tesseract(&self, image_path: &Path) -> Result<String, ExtractError> {
        let output = Command::new(&self.config.tesseract_cmd)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .output()
            .map_err(|e| ExtractError::Ocr(format!("{} not runnable: {}", self.config.tesseract_cmd, e)))?;

        if !output.status.success() {
            return Err(ExtractError::Ocr(format!(
                "{} failed: {}",
                self.config.tesseract_cmd,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl PageOcr for TesseractOcr {
    fn recognize_page(&self, source: &SourceFile, page_number: u32) -> Result<String, ExtractError> {
        info!("OCR processing page {} of {}", page_number, source.name());

        // Removed on drop, including on every error path below
        let work_dir = tempfile::Builder::new().prefix("dataset_prep_ocr").tempdir()?;

        let rendered = self.render_page(source.path(), page_number, work_dir.path())?;
        let image_path = match self.to_grayscale(&rendered) {
            Ok(gray) => gray,
            Err(e) => {
                warn!("Grayscale conversion skipped for {} page {}: {}", source.name(), page_number, e);
                rendered
            }
        };

        let text = self.run_tesseract(&image_path)?;
        debug!("OCR page {} of {}: {} characters", page_number, source.name(), text.len());
        Ok(text)
    }
}
