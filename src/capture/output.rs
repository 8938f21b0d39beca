//! Output target resolution for the capture artifact.

use super::errors::{CaptureError, CaptureResult};
use super::types::OutputFormat;
use crate::shared::paths::{ensure_dir, get_movies_dir};
use std::path::PathBuf;

/// Resolves the artifact path once and caches it for the session.
#[derive(Debug, Clone)]
pub struct OutputTarget {
    movies_dir: Option<PathBuf>,
    format: OutputFormat,
    resolved: Option<String>,
}

impl OutputTarget {
    /// Resolver using the conventional movies directory.
    pub fn new(format: OutputFormat) -> Self {
        Self::with_movies_dir(get_movies_dir(), format)
    }

    pub fn with_movies_dir(movies_dir: Option<PathBuf>, format: OutputFormat) -> Self {
        Self {
            movies_dir,
            format,
            resolved: None,
        }
    }

    /// Seeds the cache with a path restored from saved state.
    pub fn restored(path: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            movies_dir: None,
            format,
            resolved: Some(path.into()),
        }
    }

    pub fn resolved(&self) -> Option<&str> {
        self.resolved.as_deref()
    }

    /// Returns the cached path, or resolves `caller_path` / a generated default.
    pub fn resolve(&mut self, caller_path: Option<&str>) -> CaptureResult<String> {
        if let Some(path) = &self.resolved {
            return Ok(path.clone());
        }

        let path = match caller_path {
            Some(path) if path.is_empty() => {
                return Err(CaptureError::PathGeneration(
                    "output path is empty".to_string(),
                ))
            }
            Some(path) => path.to_string(),
            None => self.generate_default()?,
        };

        tracing::debug!(target: "capture", "[OUTPUT] Resolved output file: {}", path);
        self.resolved = Some(path.clone());
        Ok(path)
    }

    fn generate_default(&self) -> CaptureResult<String> {
        let Some(dir) = self.movies_dir.as_ref() else {
            tracing::warn!(target: "capture", "[OUTPUT] No movies directory available");
            return Err(CaptureError::PathGeneration(
                "movies directory unavailable".to_string(),
            ));
        };

        ensure_dir(dir).map_err(|e| {
            tracing::warn!(target: "capture", "[OUTPUT] Cannot create {:?}: {}", dir, e);
            CaptureError::PathGeneration(e.to_string())
        })?;

        let file = dir.join(default_file_name(self.format));
        tracing::info!(target: "capture", "[OUTPUT] Generated new filename: {}", file.display());
        Ok(file.to_string_lossy().to_string())
    }
}

/// `Video_<yyyyMMdd_HHmmss>.<ext>` in local time.
pub fn default_file_name(format: OutputFormat) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("Video_{}.{}", timestamp, format.extension())
}
