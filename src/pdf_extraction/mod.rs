// PDF extraction module: page access, identifier matching, OCR fallback
pub mod identifier;
pub mod ocr_engine;
pub mod ocr_fallback;
pub mod page_source;

pub use identifier::IdentifierMatcher;
pub use ocr_engine::{OcrEngine, TesseractEngine};
pub use ocr_fallback::{OcrFallbackExtractor, RecognizedPage};
pub use page_source::{LopdfDocument, LopdfSource, PageSource, PdfDocument};
