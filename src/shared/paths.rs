use std::path::{Path, PathBuf};

const APP_DIR: &str = "landscape-capture";

/// Get the base storage directory following XDG Base Directory Specification.
/// Returns `$XDG_DATA_HOME/landscape-capture` or `~/.local/share/landscape-capture`.
pub fn get_storage_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data).join(APP_DIR);
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".local")
        .join("share")
        .join(APP_DIR)
}

/// Get the logs directory path.
/// Returns `{storage_dir}/logs`.
pub fn get_log_dir() -> PathBuf {
    get_storage_dir().join("logs")
}

/// Get a component-specific storage directory.
/// Returns `{storage_dir}/{component}`.
pub fn get_component_dir(component: &str) -> PathBuf {
    get_storage_dir().join(component)
}

/// Conventional directory for recorded movies (`XDG_VIDEOS_DIR`, usually `~/Videos`).
pub fn get_movies_dir() -> Option<PathBuf> {
    dirs::video_dir()
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
