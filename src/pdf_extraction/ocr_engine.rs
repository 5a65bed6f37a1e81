// OCR engine: recognition capability plus the tesseract CLI adapter
use image::{DynamicImage, ImageFormat};
use std::path::PathBuf;
use std::process::Command;

use crate::error::OcrError;

/// Recognizes text in a rendered page. Shared by all workers.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<String, OcrError>;
}

/// Runs `tesseract <image> stdout -l <lang>`.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    program: PathBuf,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<String, OcrError> {
        let input = tempfile::Builder::new()
            .prefix("pagemark-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(input.path(), ImageFormat::Png)?;

        let output = Command::new(&self.program)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .output()
            .map_err(|source| OcrError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(clean_ocr_text(&String::from_utf8_lossy(&output.stdout)))
    }
}

// Tesseract ends each page with a form feed
fn clean_ocr_text(raw: &str) -> String {
    raw.replace('\x0c', "")
}
