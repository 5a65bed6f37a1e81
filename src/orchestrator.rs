// Orchestrator: validates a run, fans pages out to workers, aggregates results
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::config::Config;
use crate::error::{PageError, PageSourceError, RunError};
use crate::imaging::{CropSpec, OutputWriter};
use crate::pdf_extraction::identifier::IdentifierMatcher;
use crate::pdf_extraction::ocr_engine::{OcrEngine, TesseractEngine};
use crate::pdf_extraction::ocr_fallback::OcrFallbackExtractor;
use crate::pdf_extraction::page_source::{LopdfSource, PageSource, PdfDocument};
use crate::processor::PageProcessor;
use crate::progress::ProgressSink;
use crate::system_pdf_renderer::SystemPdfRenderer;
use crate::types::{Outcome, PageStage, ProcessingResult, RunReport};

/// Runs the page pipeline over a whole document.
///
/// Fatal conditions (bad configuration, unreadable document, output folder
/// that cannot be created) are reported before any page is dispatched. After
/// dispatch every page index ends up in the report exactly once.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn PageSource>,
    ocr: Arc<dyn OcrEngine>,
}

impl Orchestrator {
    pub fn new(config: Config, source: Arc<dyn PageSource>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self { config, source, ocr }
    }

    /// Production wiring: lopdf + pdftoppm for pages, tesseract for OCR.
    pub fn from_config(config: Config) -> Self {
        let source = LopdfSource::new(SystemPdfRenderer::new(&config.pdftoppm_path));
        let ocr = TesseractEngine::new(&config.tesseract_path);
        Self::new(config, Arc::new(source), Arc::new(ocr))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Synchronous entry point for callers without a runtime.
    pub fn run_blocking(
        &self,
        document: &Path,
        output_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<RunReport, RunError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(RunError::Runtime)?;
        runtime.block_on(self.run(document, output_dir, progress))
    }

    pub async fn run(
        &self,
        document: &Path,
        output_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<RunReport, RunError> {
        let result = self.prepare_and_run(document, output_dir, progress).await;
        if let Err(e) = &result {
            log::error!("An error occurred: {}", e);
        }
        result
    }

    async fn prepare_and_run(
        &self,
        document: &Path,
        output_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<RunReport, RunError> {
        self.config.validate()?;
        let matcher = IdentifierMatcher::new(&self.config.identifier_pattern)
            .map_err(|e| RunError::Config(e.to_string()))?;
        let crop = CropSpec::new(self.config.crop_ratio).ok_or_else(|| {
            RunError::Config(format!("crop ratio must be in (0, 1], got {}", self.config.crop_ratio))
        })?;

        let document = normalize_path(document);
        if !document.is_file() {
            return Err(RunError::DocumentNotFound(document));
        }
        let page_count = self.count_pages(&document).await?;

        let output_dir = normalize_path(output_dir);
        let writer = OutputWriter::new(&output_dir, self.config.collision_policy);
        writer.ensure_dir().map_err(|source| RunError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let fallback = OcrFallbackExtractor::new(
            self.ocr.clone(),
            self.config.recognition_language.clone(),
            self.config.dpi,
        );
        let processor = PageProcessor::new(matcher, fallback, crop, writer)
            .persist_native_matches(self.config.persist_native_matches);

        let workers = self.config.effective_workers(page_count);
        log::info!(
            "Processing {} ({} pages) into {} with {} worker(s)",
            document.display(),
            page_count,
            output_dir.display(),
            workers
        );

        let results = self
            .dispatch(&document, page_count, workers, Arc::new(processor), progress)
            .await;
        let report = RunReport::new(document, output_dir, results);
        log::info!("All pages processed: {}", report.summary());
        Ok(report)
    }

    // Open once to learn the page count; the handle is dropped before dispatch
    async fn count_pages(&self, document: &Path) -> Result<usize, RunError> {
        let source = self.source.clone();
        let path = document.to_path_buf();
        let opened = tokio::task::spawn_blocking(move || source.open(&path).map(|doc| doc.page_count()))
            .await
            .unwrap_or_else(|e| Err(PageSourceError::Open(format!("open panicked: {}", e))));

        match opened {
            Ok(count) => Ok(count),
            Err(PageSourceError::NotFound(path)) => Err(RunError::DocumentNotFound(path)),
            Err(source) => Err(RunError::DocumentOpen {
                path: document.to_path_buf(),
                source,
            }),
        }
    }

    async fn dispatch(
        &self,
        document: &Path,
        page_count: usize,
        workers: usize,
        processor: Arc<PageProcessor>,
        progress: &dyn ProgressSink,
    ) -> Vec<ProcessingResult> {
        if page_count == 0 {
            return Vec::new();
        }

        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(workers);

        for worker in 0..workers {
            let job = WorkerJob {
                worker,
                source: self.source.clone(),
                document: document.to_path_buf(),
                page_count,
                cursor: cursor.clone(),
                processor: processor.clone(),
                results: tx.clone(),
            };
            handles.push(tokio::task::spawn_blocking(move || job.run()));
        }
        drop(tx);

        let mut slots: Vec<Option<ProcessingResult>> = vec![None; page_count];
        let mut done = 0;
        while let Some(result) = rx.recv().await {
            let index = result.page_index;
            if index >= page_count || slots[index].is_some() {
                log::warn!("Discarding unexpected result for page {}", index + 1);
                continue;
            }
            log_outcome(&result);
            slots[index] = Some(result);
            done += 1;
            progress.completed(done, page_count);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("Worker terminated abnormally: {}", e);
            }
        }

        // Pages a dead worker claimed but never finished
        let mut results = Vec::with_capacity(page_count);
        for (index, slot) in slots.into_iter().enumerate() {
            let result = match slot {
                Some(result) => result,
                None => {
                    let result = ProcessingResult::failed(
                        index,
                        PageError::new(PageStage::Panicked, "worker stopped before finishing this page"),
                    );
                    log_outcome(&result);
                    done += 1;
                    progress.completed(done, page_count);
                    result
                }
            };
            results.push(result);
        }
        results
    }
}

/// Everything one worker needs; moved onto a blocking thread.
struct WorkerJob {
    worker: usize,
    source: Arc<dyn PageSource>,
    document: PathBuf,
    page_count: usize,
    cursor: Arc<AtomicUsize>,
    processor: Arc<PageProcessor>,
    results: UnboundedSender<ProcessingResult>,
}

impl WorkerJob {
    fn run(self) {
        // One handle per worker, never shared
        let mut handle = self.open();
        let mut processed = 0;

        loop {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            if index >= self.page_count {
                break;
            }

            let result = match handle.as_mut() {
                Ok(document) => panic::catch_unwind(AssertUnwindSafe(|| {
                    self.processor.process(document.as_mut(), index)
                }))
                .unwrap_or_else(|payload| {
                    ProcessingResult::failed(
                        index,
                        PageError::new(PageStage::Panicked, panic_message(payload.as_ref())),
                    )
                }),
                Err(message) => ProcessingResult::failed(
                    index,
                    PageError::new(PageStage::Opening, message.clone()),
                ),
            };

            // The handle may have been left mid-operation
            if result.error.as_ref().is_some_and(|e| e.stage == PageStage::Panicked) {
                handle = self.open();
            }

            processed += 1;
            if self.results.send(result).is_err() {
                break;
            }
        }
        log::debug!("Worker {} finished after {} page(s)", self.worker, processed);
    }

    fn open(&self) -> Result<Box<dyn PdfDocument>, String> {
        self.source.open(&self.document).map_err(|e| {
            log::error!("Worker {} could not open {}: {}", self.worker, self.document.display(), e);
            format!("could not open document: {}", e)
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("page pipeline panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("page pipeline panicked: {}", s)
    } else {
        "page pipeline panicked".to_string()
    }
}

fn log_outcome(result: &ProcessingResult) {
    match result.outcome {
        Outcome::Found | Outcome::NotFoundNoOcrMatch => match &result.detail {
            Some(detail) => log::warn!("{} ({})", result.status_line(), detail),
            None => log::info!("{}", result.status_line()),
        },
        Outcome::Error => log::error!("{}", result.status_line()),
    }
}

/// Trim stray whitespace and resolve against the working directory.
pub fn normalize_path(path: &Path) -> PathBuf {
    let trimmed = match path.to_str() {
        Some(s) => PathBuf::from(s.trim()),
        None => path.to_path_buf(),
    };
    if trimmed.is_absolute() {
        trimmed
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&trimmed))
            .unwrap_or(trimmed)
    }
}
