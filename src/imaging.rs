// Cropping and persisting page images
use image::{DynamicImage, ImageFormat};
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::CollisionPolicy;

/// Top-left anchored crop keeping `ratio` of each dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSpec {
    ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CropSpec {
    fn default() -> Self {
        Self { ratio: crate::config::DEFAULT_CROP_RATIO }
    }
}

impl CropSpec {
    /// `None` unless `ratio` is in (0, 1].
    pub fn new(ratio: f64) -> Option<Self> {
        (ratio > 0.0 && ratio <= 1.0).then_some(Self { ratio })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// `(0, 0, floor(width * ratio), floor(height * ratio))`
    pub fn rect(&self, width: u32, height: u32) -> CropRect {
        CropRect {
            x: 0,
            y: 0,
            width: (width as f64 * self.ratio).floor() as u32,
            height: (height as f64 * self.ratio).floor() as u32,
        }
    }

    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        let rect = self.rect(image.width(), image.height());
        image.crop_imm(rect.x, rect.y, rect.width, rect.height)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("cannot write an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },

    #[error("identifier {0:?} is not a usable file name")]
    InvalidName(String),

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Writes `<output_dir>/<identifier>.png`. The folder must already exist;
/// `ensure_dir` creates it once before any page is written.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    output_dir: PathBuf,
    policy: CollisionPolicy,
}

impl OutputWriter {
    pub fn new(output_dir: impl Into<PathBuf>, policy: CollisionPolicy) -> Self {
        Self {
            output_dir: output_dir.into(),
            policy,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the output folder if absent. Idempotent and safe to race.
    pub fn ensure_dir(&self) -> io::Result<()> {
        let existed = self.output_dir.is_dir();
        fs::create_dir_all(&self.output_dir)?;
        if !existed {
            log::info!("Output folder '{}' created successfully.", self.output_dir.display());
        }
        Ok(())
    }

    pub fn artifact_path(&self, identifier: &str) -> PathBuf {
        self.output_dir.join(format!("{}.png", identifier))
    }

    pub fn write(&self, image: &DynamicImage, identifier: &str) -> Result<PathBuf, WriteError> {
        if !is_plain_file_name(identifier) {
            return Err(WriteError::InvalidName(identifier.to_string()));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(WriteError::EmptyImage {
                width: image.width(),
                height: image.height(),
            });
        }

        let path = self.artifact_path(identifier);
        let mut options = OpenOptions::new();
        options.write(true);
        match self.policy {
            CollisionPolicy::Overwrite => options.create(true).truncate(true),
            CollisionPolicy::KeepFirst => options.create_new(true),
        };

        let file = match options.open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(WriteError::AlreadyExists(path));
            }
            Err(source) => return Err(WriteError::Io { path, source }),
        };

        let mut writer = BufWriter::new(file);
        image
            .write_to(&mut writer, ImageFormat::Png)
            .map_err(|source| WriteError::Encode {
                path: path.clone(),
                source,
            })?;
        writer.flush().map_err(|source| WriteError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }
}

// The identifier must name a file directly inside the output folder
fn is_plain_file_name(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier != "."
        && identifier != ".."
        && !identifier.contains(['/', '\\', '\0'])
}
