// Test doubles for the document and recognition capabilities
#![allow(dead_code)]

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pagemark::error::{OcrError, PageSourceError};
use pagemark::pdf_extraction::{OcrEngine, PageSource, PdfDocument};

pub const PAGE_WIDTH: u32 = 170;
pub const PAGE_HEIGHT: u32 = 220;

/// Scripted behaviour for one fake page.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub text: String,
    pub ocr_text: String,
    pub text_fails: bool,
    pub render_fails: bool,
    pub render_panics: bool,
    pub ocr_fails: bool,
    pub delay_ms: u64,
}

impl FakePage {
    pub fn text(text: &str) -> Self {
        Self { text: text.to_string(), ..Self::default() }
    }

    pub fn scanned(ocr_text: &str) -> Self {
        Self { ocr_text: ocr_text.to_string(), ..Self::default() }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn delayed(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub open_fails: AtomicBool,
    /// Opens allowed before every later open fails; 0 means unlimited
    pub max_opens: AtomicUsize,
    pub renders: Vec<AtomicUsize>,
    pub ocr_calls: Vec<AtomicUsize>,
}

impl Stats {
    fn new(pages: usize) -> Self {
        Self {
            renders: (0..pages).map(|_| AtomicUsize::new(0)).collect(),
            ocr_calls: (0..pages).map(|_| AtomicUsize::new(0)).collect(),
            ..Self::default()
        }
    }

    pub fn renders(&self, page: usize) -> usize {
        self.renders[page].load(Ordering::SeqCst)
    }

    pub fn ocr_calls(&self, page: usize) -> usize {
        self.ocr_calls[page].load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct FakeSource {
    pages: Arc<Vec<FakePage>>,
    pub stats: Arc<Stats>,
}

impl FakeSource {
    pub fn new(pages: Vec<FakePage>) -> Self {
        let stats = Arc::new(Stats::new(pages.len()));
        Self {
            pages: Arc::new(pages),
            stats,
        }
    }

    pub fn ocr(&self) -> FakeOcr {
        FakeOcr {
            pages: self.pages.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl PageSource for FakeSource {
    fn open(&self, _path: &Path) -> Result<Box<dyn PdfDocument>, PageSourceError> {
        let limit = self.stats.max_opens.load(Ordering::SeqCst);
        if self.stats.open_fails.load(Ordering::SeqCst) || (limit > 0 && self.stats.opens() >= limit) {
            return Err(PageSourceError::Open("trailer not found".into()));
        }
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDocument {
            pages: self.pages.clone(),
            stats: self.stats.clone(),
        }))
    }
}

struct FakeDocument {
    pages: Arc<Vec<FakePage>>,
    stats: Arc<Stats>,
}

impl Drop for FakeDocument {
    fn drop(&mut self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl PdfDocument for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn native_text(&mut self, index: usize) -> Result<String, PageSourceError> {
        let page = &self.pages[index];
        if page.delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(page.delay_ms));
        }
        if page.text_fails {
            return Err(PageSourceError::Text { index, message: "broken font".into() });
        }
        Ok(page.text.clone())
    }

    fn render(&mut self, index: usize, _dpi: u32) -> Result<DynamicImage, PageSourceError> {
        self.stats.renders[index].fetch_add(1, Ordering::SeqCst);
        let page = &self.pages[index];
        if page.render_panics {
            panic!("renderer crashed on page {}", index);
        }
        if page.render_fails {
            return Err(PageSourceError::Render { index, message: "forced failure".into() });
        }
        Ok(page_image(index))
    }
}

// Page index is stamped into the top-left pixel so the fake OCR can look it up
fn page_image(index: usize) -> DynamicImage {
    let mut image = RgbImage::new(PAGE_WIDTH, PAGE_HEIGHT);
    image.put_pixel(0, 0, Rgb([(index % 256) as u8, (index / 256) as u8, 0]));
    DynamicImage::ImageRgb8(image)
}

fn page_index(image: &DynamicImage) -> usize {
    let pixel = image.get_pixel(0, 0);
    pixel[0] as usize + pixel[1] as usize * 256
}

pub struct FakeOcr {
    pages: Arc<Vec<FakePage>>,
    stats: Arc<Stats>,
}

impl OcrEngine for FakeOcr {
    fn recognize(&self, image: &DynamicImage, _language: &str) -> Result<String, OcrError> {
        let index = page_index(image);
        self.stats.ocr_calls[index].fetch_add(1, Ordering::SeqCst);
        let page = &self.pages[index];
        if page.ocr_fails {
            return Err(OcrError::Failed("tesseract exited with status 1".into()));
        }
        Ok(page.ocr_text.clone())
    }
}

/// A real file for the orchestrator's existence check; contents are never read.
pub fn dummy_document(dir: &Path) -> PathBuf {
    let path = dir.join("batch.pdf");
    std::fs::write(&path, b"%PDF-1.5\n").unwrap();
    path
}

pub fn artifact_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
