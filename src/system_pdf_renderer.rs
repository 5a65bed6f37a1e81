// System PDF renderer using poppler's pdftoppm
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use crate::error::PageSourceError;

#[derive(Debug, Clone)]
pub struct SystemPdfRenderer {
    program: PathBuf,
}

impl Default for SystemPdfRenderer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl SystemPdfRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Rasterize one page (0-based) at `dpi`.
    pub fn render_page(
        &self,
        pdf_path: &Path,
        page_index: usize,
        dpi: u32,
    ) -> Result<DynamicImage, PageSourceError> {
        let render_err = |message: String| PageSourceError::Render {
            index: page_index,
            message,
        };

        let temp_dir = TempDir::new()?;
        let output_prefix = temp_dir.path().join("page");

        // pdftoppm pages are 1-based
        let page = (page_index + 1).to_string();
        log::debug!(
            "Rendering page {} of {} at {} dpi",
            page,
            pdf_path.display(),
            dpi
        );

        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-singlefile")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(&page)
            .arg("-l")
            .arg(&page)
            .arg(pdf_path)
            .arg(&output_prefix)
            .output()
            .map_err(|e| {
                render_err(format!(
                    "failed to invoke {}: {}; is poppler-utils installed?",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(render_err(format!(
                "{} failed ({}): {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        // -singlefile writes exactly <prefix>.png
        let output_file = output_prefix.with_extension("png");
        if !output_file.exists() {
            return Err(render_err(format!(
                "expected rendered image not found: {}",
                output_file.display()
            )));
        }

        let image = image::open(&output_file).map_err(|e| render_err(e.to_string()))?;
        log::debug!(
            "Page {} rendered: {}x{}",
            page,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}
