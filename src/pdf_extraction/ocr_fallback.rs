// Recognition fallback: render a page and OCR it when native text has no match
use image::DynamicImage;
use std::sync::Arc;

use crate::error::PageError;
use crate::pdf_extraction::ocr_engine::OcrEngine;
use crate::pdf_extraction::page_source::PdfDocument;
use crate::types::PageStage;

/// A rendered page and whatever text recognition produced for it.
pub struct RecognizedPage {
    pub image: DynamicImage,
    pub text: String,
    /// Set when recognition failed and `text` was replaced by an empty string
    pub failure: Option<String>,
}

#[derive(Clone)]
pub struct OcrFallbackExtractor {
    engine: Arc<dyn OcrEngine>,
    language: String,
    dpi: u32,
}

impl OcrFallbackExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, language: impl Into<String>, dpi: u32) -> Self {
        Self {
            engine,
            language: language.into(),
            dpi,
        }
    }

    /// Render only. Used when the identifier already came from native text.
    pub fn render(&self, document: &mut dyn PdfDocument, index: usize) -> Result<DynamicImage, PageError> {
        document
            .render(index, self.dpi)
            .map_err(|e| PageError::from_error(PageStage::Rendering, &e))
    }

    /// Render the page once and run recognition once.
    ///
    /// A render failure is a page error. A recognition failure is not: it is
    /// logged and yields empty text, which simply fails to match upstream.
    pub fn recognize(&self, document: &mut dyn PdfDocument, index: usize) -> Result<RecognizedPage, PageError> {
        let image = self.render(document, index)?;

        match self.engine.recognize(&image, &self.language) {
            Ok(text) => Ok(RecognizedPage {
                image,
                text,
                failure: None,
            }),
            Err(e) => {
                log::warn!("Error extracting text with OCR on page {}: {}", index + 1, e);
                Ok(RecognizedPage {
                    image,
                    text: String::new(),
                    failure: Some(e.to_string()),
                })
            }
        }
    }
}
