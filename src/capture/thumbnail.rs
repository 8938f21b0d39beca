use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::errors::ThumbnailError;
use crate::shared::paths::{ensure_dir, get_component_dir};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub path: PathBuf,
}

/// Produces a preview image for a finished recording.
pub trait ThumbnailGenerator: Send {
    fn generate(&self, video_path: &Path) -> Result<Thumbnail, ThumbnailError>;
}

/// Grabs the first frame with `ffmpeg`, scaled to 320px wide.
#[derive(Debug, Clone)]
pub struct FfmpegThumbnailer {
    program: String,
    output_dir: PathBuf,
}

impl FfmpegThumbnailer {
    pub fn new() -> Self {
        Self::in_dir(get_component_dir("thumbnails"))
    }

    pub fn in_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: "ffmpeg".to_string(),
            output_dir: output_dir.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn thumbnail_path(&self, video_path: &Path) -> PathBuf {
        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "capture".to_string());
        self.output_dir.join(format!("{}.png", stem))
    }
}

impl Default for FfmpegThumbnailer {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailGenerator for FfmpegThumbnailer {
    fn generate(&self, video_path: &Path) -> Result<Thumbnail, ThumbnailError> {
        if !video_path.exists() {
            return Err(ThumbnailError::SourceMissing(video_path.display().to_string()));
        }

        ensure_dir(&self.output_dir).map_err(|e| ThumbnailError::Generation(e.to_string()))?;
        let thumbnail_path = self.thumbnail_path(video_path);

        let output = Command::new(&self.program)
            .args([
                "-y",
                "-i",
                &video_path.to_string_lossy(),
                "-ss",
                "00:00:00",
                "-vframes",
                "1",
                "-vf",
                "scale=320:-1",
                &thumbnail_path.to_string_lossy(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ThumbnailError::Generation(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(target: "capture", "[THUMBNAIL] ffmpeg failed: {}", stderr);
            return Err(ThumbnailError::Generation(stderr.to_string()));
        }

        tracing::debug!(target: "capture", "[THUMBNAIL] Wrote {:?}", thumbnail_path);
        Ok(Thumbnail {
            path: thumbnail_path,
        })
    }
}
