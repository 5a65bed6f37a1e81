// pagemark: find a page identifier on every page of a PDF and save a cropped image named after it
pub mod config;
pub mod error;
pub mod imaging;
pub mod logging;
pub mod orchestrator;
pub mod pdf_extraction;
pub mod processor;
pub mod progress;
pub mod system_pdf_renderer;
pub mod types;

pub use config::{CollisionPolicy, Config, ExecutionStrategy};
pub use error::{OcrError, PageError, PageSourceError, RunError};
pub use orchestrator::Orchestrator;
pub use progress::{NoProgress, ProgressSink, StderrProgress};
pub use types::{IdentifierSource, Outcome, PageStage, ProcessingResult, RunReport};
