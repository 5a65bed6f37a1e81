// Error types: fatal run errors, per-page errors and capability errors
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::types::PageStage;

/// Whole-run failures. Raised before any page is dispatched.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("the PDF file does not exist: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("failed to open {}: {source}", path.display())]
    DocumentOpen {
        path: PathBuf,
        #[source]
        source: PageSourceError,
    },

    #[error("failed to create output folder {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start worker runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// Errors raised by a page source or one of its document handles.
#[derive(Debug, thiserror::Error)]
pub enum PageSourceError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot open document: {0}")]
    Open(String),

    #[error("page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("text extraction failed on page {index}: {message}")]
    Text { index: usize, message: String },

    #[error("render failed on page {index}: {message}")]
    Render { index: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised by a recognition engine. Always recovered by the caller.
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("recognition failed: {0}")]
    Failed(String),

    #[error("could not encode page image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failure captured inside a page's result. Never propagates past the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    pub stage: PageStage,
    pub message: String,
}

impl PageError {
    pub fn new(stage: PageStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    pub fn from_error(stage: PageStage, err: &dyn std::error::Error) -> Self {
        Self::new(stage, err.to_string())
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

impl std::error::Error for PageError {}

pub type Result<T> = std::result::Result<T, RunError>;
