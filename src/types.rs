// Core types for per-page identifier extraction
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::PageError;

/// Terminal outcome of one page pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Found,
    NotFoundNoOcrMatch,
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Found => write!(f, "found"),
            Outcome::NotFoundNoOcrMatch => write!(f, "not found"),
            Outcome::Error => write!(f, "error"),
        }
    }
}

// Where the identifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierSource {
    NativeText,
    Recognition,
}

/// Pipeline stages a page moves through. Used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStage {
    Opening,
    TextExtraction,
    Rendering,
    Recognizing,
    Cropping,
    Persisting,
    Panicked,
}

impl fmt::Display for PageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageStage::Opening => "document open",
            PageStage::TextExtraction => "text extraction",
            PageStage::Rendering => "rendering",
            PageStage::Recognizing => "recognition",
            PageStage::Cropping => "cropping",
            PageStage::Persisting => "persisting",
            PageStage::Panicked => "pipeline panic",
        };
        f.write_str(name)
    }
}

/// Result of processing a single page. The index is carried explicitly so
/// the report can be rebuilt in page order whatever the completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub page_index: usize,
    pub outcome: Outcome,
    pub identifier: Option<String>,
    pub source: Option<IdentifierSource>,
    pub artifact: Option<PathBuf>,
    pub error: Option<PageError>,
    /// Non-fatal note, e.g. a swallowed recognition failure
    pub detail: Option<String>,
}

impl ProcessingResult {
    pub fn found(page_index: usize, identifier: String, source: IdentifierSource) -> Self {
        Self {
            page_index,
            outcome: Outcome::Found,
            identifier: Some(identifier),
            source: Some(source),
            artifact: None,
            error: None,
            detail: None,
        }
    }

    pub fn not_found(page_index: usize) -> Self {
        Self {
            page_index,
            outcome: Outcome::NotFoundNoOcrMatch,
            identifier: None,
            source: None,
            artifact: None,
            error: None,
            detail: None,
        }
    }

    pub fn failed(page_index: usize, error: PageError) -> Self {
        Self {
            page_index,
            outcome: Outcome::Error,
            identifier: None,
            source: None,
            artifact: None,
            error: Some(error),
            detail: None,
        }
    }

    pub fn with_artifact(mut self, artifact: PathBuf) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_found(&self) -> bool {
        self.outcome == Outcome::Found
    }

    /// One-line status, numbered from 1 like the page labels users see.
    pub fn status_line(&self) -> String {
        let page = self.page_index + 1;
        match (self.outcome, &self.artifact, &self.error) {
            (Outcome::Found, Some(path), _) => {
                format!("Page {}: Image saved as {}", page, path.display())
            }
            (Outcome::Found, None, _) => format!(
                "Page {}: Series '{}' found, no image saved",
                page,
                self.identifier.as_deref().unwrap_or_default()
            ),
            (Outcome::NotFoundNoOcrMatch, _, _) => format!("Page {}: No series found", page),
            (Outcome::Error, _, Some(err)) => format!("Error processing page {}: {}", page, err),
            (Outcome::Error, _, None) => format!("Error processing page {}", page),
        }
    }
}

/// Per-run report covering every page index exactly once, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub document: PathBuf,
    pub output_dir: PathBuf,
    pub page_count: usize,
    pub results: Vec<ProcessingResult>,
}

impl RunReport {
    pub fn new(document: PathBuf, output_dir: PathBuf, mut results: Vec<ProcessingResult>) -> Self {
        results.sort_by_key(|r| r.page_index);
        Self {
            document,
            output_dir,
            page_count: results.len(),
            results,
        }
    }

    pub fn get(&self, page_index: usize) -> Option<&ProcessingResult> {
        self.results.get(page_index).filter(|r| r.page_index == page_index)
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn artifacts(&self) -> Vec<&PathBuf> {
        self.results.iter().filter_map(|r| r.artifact.as_ref()).collect()
    }

    /// Page-indexed outcome triples; stable across strategies and worker counts.
    pub fn outcomes(&self) -> Vec<(usize, Outcome, Option<String>)> {
        self.results
            .iter()
            .map(|r| (r.page_index, r.outcome, r.identifier.clone()))
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} pages: {} found, {} not found, {} errors, {} images written",
            self.page_count,
            self.count(Outcome::Found),
            self.count(Outcome::NotFoundNoOcrMatch),
            self.count(Outcome::Error),
            self.artifacts().len()
        )
    }
}
