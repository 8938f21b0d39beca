use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors shared by settings and session persistence.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to create directory {0:?}")]
    Directory(PathBuf),
}

impl StorageError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn parse(path: &Path, source: serde_json::Error) -> Self {
        StorageError::Parse {
            path: path.to_path_buf(),
            source,
        }
    }
}
