// Page source: document access capability plus the lopdf-backed adapter
use image::DynamicImage;
use lopdf::Document;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::PageSourceError;
use crate::system_pdf_renderer::SystemPdfRenderer;

/// An open document handle.
///
/// Methods take `&mut self`: a handle is owned by exactly one worker and is
/// never shared across threads. Dropping the handle releases it.
pub trait PdfDocument: Send {
    fn page_count(&self) -> usize;

    /// Embedded text of a page; may be empty.
    fn native_text(&mut self, index: usize) -> Result<String, PageSourceError>;

    /// Rasterize a page at `dpi`.
    fn render(&mut self, index: usize, dpi: u32) -> Result<DynamicImage, PageSourceError>;
}

/// Opens independent document handles. Shared by all workers.
pub trait PageSource: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, PageSourceError>;
}

/// Production page source: lopdf for structure and text, pdftoppm for pixels.
#[derive(Debug, Clone, Default)]
pub struct LopdfSource {
    renderer: SystemPdfRenderer,
}

impl LopdfSource {
    pub fn new(renderer: SystemPdfRenderer) -> Self {
        Self { renderer }
    }
}

impl PageSource for LopdfSource {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, PageSourceError> {
        Ok(Box::new(LopdfDocument::load(path, self.renderer.clone())?))
    }
}

pub struct LopdfDocument {
    path: PathBuf,
    document: Document,
    // 1-based page number -> object id, as lopdf reports it
    pages: BTreeMap<u32, lopdf::ObjectId>,
    renderer: SystemPdfRenderer,
}

impl LopdfDocument {
    pub fn load(path: &Path, renderer: SystemPdfRenderer) -> Result<Self, PageSourceError> {
        if !path.is_file() {
            return Err(PageSourceError::NotFound(path.to_path_buf()));
        }
        let document = Document::load(path).map_err(|e| PageSourceError::Open(e.to_string()))?;
        let pages = document.get_pages();
        Ok(Self {
            path: path.to_path_buf(),
            document,
            pages,
            renderer,
        })
    }

    fn page_number(&self, index: usize) -> Result<u32, PageSourceError> {
        let count = self.pages.len();
        self.pages
            .keys()
            .nth(index)
            .copied()
            .ok_or(PageSourceError::PageOutOfRange { index, count })
    }
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn native_text(&mut self, index: usize) -> Result<String, PageSourceError> {
        let number = self.page_number(index)?;
        self.document
            .extract_text(&[number])
            .map_err(|e| PageSourceError::Text {
                index,
                message: e.to_string(),
            })
    }

    fn render(&mut self, index: usize, dpi: u32) -> Result<DynamicImage, PageSourceError> {
        self.page_number(index)?;
        self.renderer.render_page(&self.path, index, dpi)
    }
}
