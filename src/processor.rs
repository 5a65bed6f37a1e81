// Per-page pipeline: native text -> match, else render -> OCR -> match -> crop -> persist
use image::DynamicImage;

use crate::error::PageError;
use crate::imaging::{CropSpec, OutputWriter, WriteError};
use crate::pdf_extraction::identifier::IdentifierMatcher;
use crate::pdf_extraction::ocr_fallback::OcrFallbackExtractor;
use crate::pdf_extraction::page_source::PdfDocument;
use crate::types::{IdentifierSource, PageStage, ProcessingResult};

/// Runs one page through the identification pipeline.
///
/// Every page renders at most once and is recognized at most once. A failure
/// ends the page as `Error`, except that an identifier read from native text
/// is always kept and a failed image is noted in `detail`. There is no retry.
#[derive(Clone)]
pub struct PageProcessor {
    matcher: IdentifierMatcher,
    fallback: OcrFallbackExtractor,
    crop: CropSpec,
    writer: OutputWriter,
    persist_native_matches: bool,
}

impl PageProcessor {
    pub fn new(
        matcher: IdentifierMatcher,
        fallback: OcrFallbackExtractor,
        crop: CropSpec,
        writer: OutputWriter,
    ) -> Self {
        Self {
            matcher,
            fallback,
            crop,
            writer,
            persist_native_matches: true,
        }
    }

    /// When false, a native-text match ends the page without rendering.
    pub fn persist_native_matches(mut self, persist: bool) -> Self {
        self.persist_native_matches = persist;
        self
    }

    pub fn process(&self, document: &mut dyn PdfDocument, index: usize) -> ProcessingResult {
        self.run(document, index)
            .unwrap_or_else(|err| ProcessingResult::failed(index, err))
    }

    fn run(&self, document: &mut dyn PdfDocument, index: usize) -> Result<ProcessingResult, PageError> {
        let text = document
            .native_text(index)
            .map_err(|e| PageError::from_error(PageStage::TextExtraction, &e))?;

        if let Some(identifier) = self.matcher.find(&text) {
            log::debug!(
                "Series of numbers '{}' found directly on page {}",
                identifier,
                index + 1
            );
            let found = ProcessingResult::found(index, identifier, IdentifierSource::NativeText);
            if !self.persist_native_matches {
                return Ok(found);
            }
            // The identifier stands even if the image cannot be produced
            let saved = self
                .fallback
                .render(document, index)
                .and_then(|image| self.persist(found.clone(), &image));
            return Ok(saved.unwrap_or_else(|err| {
                log::warn!(
                    "Page {}: image for '{}' not saved: {}",
                    index + 1,
                    found.identifier.as_deref().unwrap_or_default(),
                    err
                );
                found.with_detail(format!("image not saved: {}", err))
            }));
        }

        let recognized = self.fallback.recognize(document, index)?;
        match self.matcher.find(&recognized.text) {
            Some(identifier) => {
                log::debug!("Series of numbers '{}' found by OCR on page {}", identifier, index + 1);
                let found = ProcessingResult::found(index, identifier, IdentifierSource::Recognition);
                self.persist(found, &recognized.image)
            }
            None => {
                let result = ProcessingResult::not_found(index);
                Ok(match recognized.failure {
                    Some(failure) => result.with_detail(format!("recognition failed: {}", failure)),
                    None => result,
                })
            }
        }
    }

    fn persist(&self, found: ProcessingResult, image: &DynamicImage) -> Result<ProcessingResult, PageError> {
        let identifier = found.identifier.clone().unwrap_or_default();

        let cropped = self.crop.apply(image);
        if cropped.width() == 0 || cropped.height() == 0 {
            return Err(PageError::new(
                PageStage::Cropping,
                format!(
                    "cropping {}x{} at ratio {} leaves an empty image",
                    image.width(),
                    image.height(),
                    self.crop.ratio()
                ),
            ));
        }

        match self.writer.write(&cropped, &identifier) {
            Ok(path) => Ok(found.with_artifact(path)),
            Err(WriteError::AlreadyExists(path)) => {
                log::warn!(
                    "Page {}: '{}' already written, keeping existing {}",
                    found.page_index + 1,
                    identifier,
                    path.display()
                );
                Ok(found.with_detail(format!("duplicate identifier, kept existing {}", path.display())))
            }
            Err(e) => Err(PageError::from_error(PageStage::Persisting, &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionPolicy;
    use crate::error::{OcrError, PageSourceError};
    use crate::pdf_extraction::ocr_engine::OcrEngine;
    use crate::types::Outcome;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedPage {
        text: Result<&'static str, &'static str>,
        renders: usize,
    }

    impl PdfDocument for ScriptedPage {
        fn page_count(&self) -> usize {
            1
        }

        fn native_text(&mut self, index: usize) -> Result<String, PageSourceError> {
            self.text.map(str::to_string).map_err(|m| PageSourceError::Text {
                index,
                message: m.to_string(),
            })
        }

        fn render(&mut self, _index: usize, _dpi: u32) -> Result<DynamicImage, PageSourceError> {
            self.renders += 1;
            Ok(DynamicImage::new_rgb8(200, 100))
        }
    }

    struct FixedOcr {
        text: &'static str,
        calls: AtomicUsize,
    }

    impl OcrEngine for FixedOcr {
        fn recognize(&self, _image: &DynamicImage, _language: &str) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.to_string())
        }
    }

    fn processor(out: &Path, ocr: Arc<FixedOcr>) -> PageProcessor {
        PageProcessor::new(
            IdentifierMatcher::default(),
            OcrFallbackExtractor::new(ocr, "eng", 200),
            CropSpec::default(),
            OutputWriter::new(out, CollisionPolicy::Overwrite),
        )
    }

    #[test]
    fn test_native_match_skips_ocr_and_writes_crop() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = Arc::new(FixedOcr { text: "", calls: AtomicUsize::new(0) });
        let mut page = ScriptedPage { text: Ok("INV 4815162342 total"), renders: 0 };

        let result = processor(dir.path(), ocr.clone()).process(&mut page, 0);

        assert_eq!(result.outcome, Outcome::Found);
        assert_eq!(result.identifier.as_deref(), Some("4815162342"));
        assert_eq!(result.source, Some(IdentifierSource::NativeText));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
        assert_eq!(page.renders, 1);

        let saved = image::open(dir.path().join("4815162342.png")).unwrap();
        assert_eq!((saved.width(), saved.height()), (190, 95));
    }

    #[test]
    fn test_native_match_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = Arc::new(FixedOcr { text: "", calls: AtomicUsize::new(0) });
        let mut page = ScriptedPage { text: Ok("4815162342"), renders: 0 };

        let result = processor(dir.path(), ocr)
            .persist_native_matches(false)
            .process(&mut page, 0);

        assert!(result.is_found());
        assert!(result.artifact.is_none());
        assert_eq!(page.renders, 0);
        assert!(!dir.path().join("4815162342.png").exists());
    }

    #[test]
    fn test_ocr_fallback_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = Arc::new(FixedOcr {
            text: "PRO 1111111111 and again 2222222222",
            calls: AtomicUsize::new(0),
        });
        let mut page = ScriptedPage { text: Ok(""), renders: 0 };

        let result = processor(dir.path(), ocr.clone()).process(&mut page, 3);

        assert_eq!(result.page_index, 3);
        assert_eq!(result.identifier.as_deref(), Some("1111111111"));
        assert_eq!(result.source, Some(IdentifierSource::Recognition));
        assert_eq!(result.artifact, Some(dir.path().join("1111111111.png")));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
        assert_eq!(page.renders, 1);
    }

    #[test]
    fn test_no_match_anywhere_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = Arc::new(FixedOcr { text: "blurry scan", calls: AtomicUsize::new(0) });
        let mut page = ScriptedPage { text: Ok("nothing"), renders: 0 };

        let result = processor(dir.path(), ocr).process(&mut page, 0);

        assert_eq!(result.outcome, Outcome::NotFoundNoOcrMatch);
        assert!(result.artifact.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_text_failure_is_page_error() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = Arc::new(FixedOcr { text: "1234567890", calls: AtomicUsize::new(0) });
        let mut page = ScriptedPage { text: Err("bad font"), renders: 0 };

        let result = processor(dir.path(), ocr.clone()).process(&mut page, 0);

        assert_eq!(result.outcome, Outcome::Error);
        assert_eq!(result.error.unwrap().stage, PageStage::TextExtraction);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unusable_identifier_is_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = Arc::new(FixedOcr { text: "ship to a/b", calls: AtomicUsize::new(0) });
        let mut page = ScriptedPage { text: Ok(""), renders: 0 };
        let processor = PageProcessor::new(
            IdentifierMatcher::new(r"\w/\w").unwrap(),
            OcrFallbackExtractor::new(ocr, "eng", 200),
            CropSpec::default(),
            OutputWriter::new(dir.path(), CollisionPolicy::Overwrite),
        );

        let result = processor.process(&mut page, 0);
        assert_eq!(result.outcome, Outcome::Error);
        assert_eq!(result.error.unwrap().stage, PageStage::Persisting);
    }

    #[test]
    fn test_native_identifier_kept_when_persist_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = Arc::new(FixedOcr { text: "", calls: AtomicUsize::new(0) });
        let mut page = ScriptedPage { text: Ok("ship to a/b"), renders: 0 };
        let processor = PageProcessor::new(
            IdentifierMatcher::new(r"\w/\w").unwrap(),
            OcrFallbackExtractor::new(ocr, "eng", 200),
            CropSpec::default(),
            OutputWriter::new(dir.path(), CollisionPolicy::Overwrite),
        );

        let result = processor.process(&mut page, 0);
        assert_eq!(result.outcome, Outcome::Found);
        assert_eq!(result.identifier.as_deref(), Some("a/b"));
        assert_eq!(result.source, Some(IdentifierSource::NativeText));
        assert!(result.artifact.is_none());
        assert!(result.error.is_none());
        assert!(result.detail.unwrap().contains("not a usable file name"));
    }

    struct BrokenRaster;

    impl PdfDocument for BrokenRaster {
        fn page_count(&self) -> usize {
            1
        }

        fn native_text(&mut self, _index: usize) -> Result<String, PageSourceError> {
            Ok("INV 4815162342 total".to_string())
        }

        fn render(&mut self, index: usize, _dpi: u32) -> Result<DynamicImage, PageSourceError> {
            Err(PageSourceError::Render { index, message: "pdftoppm exited with status 99".into() })
        }
    }

    #[test]
    fn test_native_identifier_kept_when_render_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = Arc::new(FixedOcr { text: "", calls: AtomicUsize::new(0) });

        let result = processor(dir.path(), ocr.clone()).process(&mut BrokenRaster, 0);

        assert_eq!(result.outcome, Outcome::Found);
        assert_eq!(result.identifier.as_deref(), Some("4815162342"));
        assert_eq!(result.source, Some(IdentifierSource::NativeText));
        assert!(result.artifact.is_none());
        assert!(result.detail.unwrap().contains("rendering failed"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
