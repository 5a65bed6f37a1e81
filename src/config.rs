// Run configuration for pagemark
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RunError;

pub const DEFAULT_PATTERN: &str = r"\d{10}";
pub const DEFAULT_CROP_RATIO: f64 = 0.95;
pub const DEFAULT_LANGUAGE: &str = "eng";
pub const DEFAULT_DPI: u32 = 200;
pub const DEFAULT_LOG_FILE: &str = "pdf_processing.log";
pub const CONFIG_FILE_NAME: &str = "pagemark.toml";

/// How page pipelines are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStrategy {
    /// One worker, pages complete in index order
    Sequential,
    /// `concurrency` workers, completion order unspecified
    #[default]
    Pooled,
}

/// What to do when two pages resolve to the same identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Rewrite `<id>.png`; the last writer's image is kept
    #[default]
    Overwrite,
    /// Create `<id>.png` only if absent; later pages get no artifact
    KeepFirst,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub identifier_pattern: String,
    pub crop_ratio: f64,
    pub recognition_language: String,
    pub concurrency: usize,
    pub strategy: ExecutionStrategy,
    pub dpi: u32,
    pub persist_native_matches: bool,
    pub collision_policy: CollisionPolicy,
    pub pdftoppm_path: PathBuf,
    pub tesseract_path: PathBuf,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identifier_pattern: DEFAULT_PATTERN.to_string(),
            crop_ratio: DEFAULT_CROP_RATIO,
            recognition_language: DEFAULT_LANGUAGE.to_string(),
            concurrency: default_concurrency(),
            strategy: ExecutionStrategy::default(),
            dpi: DEFAULT_DPI,
            persist_native_matches: true,
            collision_policy: CollisionPolicy::default(),
            pdftoppm_path: tool_path("PAGEMARK_PDFTOPPM", "pdftoppm"),
            tesseract_path: tool_path("PAGEMARK_TESSERACT", "tesseract"),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// Tool location from environment or fall back to PATH lookup
fn tool_path(var: &str, fallback: &str) -> PathBuf {
    env::var(var)
        .unwrap_or_else(|_| fallback.to_string())
        .into()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// `./pagemark.toml`, then `<config dir>/pagemark/config.toml`, else defaults.
    pub fn discover() -> Result<Self> {
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("pagemark").join("config.toml"));
        }
        paths
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Worker count actually used for `page_count` pages.
    pub fn effective_workers(&self, page_count: usize) -> usize {
        let wanted = match self.strategy {
            ExecutionStrategy::Sequential => 1,
            ExecutionStrategy::Pooled => self.concurrency,
        };
        wanted.clamp(1, page_count.max(1))
    }

    pub fn validate(&self) -> std::result::Result<(), RunError> {
        if let Err(e) = regex::Regex::new(&self.identifier_pattern) {
            return Err(RunError::Config(format!(
                "identifier pattern {:?} does not compile: {}",
                self.identifier_pattern, e
            )));
        }
        if !(self.crop_ratio > 0.0 && self.crop_ratio <= 1.0) {
            return Err(RunError::Config(format!(
                "crop ratio must be in (0, 1], got {}",
                self.crop_ratio
            )));
        }
        if self.concurrency == 0 {
            return Err(RunError::Config("concurrency must be at least 1".into()));
        }
        if self.dpi == 0 {
            return Err(RunError::Config("dpi must be positive".into()));
        }
        if self.recognition_language.trim().is_empty() {
            return Err(RunError::Config("recognition language is empty".into()));
        }
        Ok(())
    }
}
