use crate::shared::errors::StorageError;
use crate::shared::paths::{ensure_dir, get_component_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// State a host saves when its capture screen is torn down, and hands back on
/// recreation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    pub has_recorded_artifact: bool,
    #[serde(default)]
    pub output_path: String,
}

fn get_capture_dir() -> PathBuf {
    get_component_dir("capture")
}

pub fn get_session_path() -> Result<PathBuf, StorageError> {
    let dir = get_capture_dir();
    ensure_dir(&dir).map_err(|_| StorageError::Directory(dir.clone()))?;
    Ok(dir.join("session.json"))
}

pub fn save_session(session: &SavedSession) -> Result<(), StorageError> {
    save_session_to(&get_session_path()?, session)
}

pub fn load_session() -> Result<Option<SavedSession>, StorageError> {
    load_session_from(&get_session_path()?)
}

/// Removes the saved state once the session it describes has terminated.
pub fn clear_session() -> Result<(), StorageError> {
    clear_session_at(&get_session_path()?)
}

pub fn save_session_to(path: &Path, session: &SavedSession) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).map_err(|_| StorageError::Directory(parent.to_path_buf()))?;
    }

    let content = serde_json::to_string_pretty(session)?;
    fs::write(path, content).map_err(|e| StorageError::io(path, e))?;

    tracing::debug!(target: "capture", "[CONTROLLER] Saved session state to {:?}", path);
    Ok(())
}

pub fn clear_session_at(path: &Path) -> Result<(), StorageError> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| StorageError::io(path, e))?;
    }
    Ok(())
}

/// Returns `None` when nothing has been saved yet.
pub fn load_session_from(path: &Path) -> Result<Option<SavedSession>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    let session = serde_json::from_str(&content).map_err(|e| StorageError::parse(path, e))?;
    Ok(Some(session))
}
