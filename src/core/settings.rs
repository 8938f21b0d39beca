use crate::capture::types::{
    AudioEncoder, AudioSource, EncoderKind, OutputFormat, RecorderConfig, BITRATE_PER_SECOND,
    CAPTURE_VIDEO_HEIGHT, CAPTURE_VIDEO_WIDTH, FRAMES_PER_SECOND, MAX_CAPTURE_DURATION_MS,
    MAX_CAPTURE_FILESIZE_BYTES,
};
use crate::shared::paths::{ensure_dir, get_movies_dir, get_storage_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// User-editable capture defaults, stored at `<storage>/settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSettings {
    #[serde(default = "default_width")]
    pub video_width: u32,
    #[serde(default = "default_height")]
    pub video_height: u32,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default = "default_bitrate")]
    pub bitrate_bps: u32,
    #[serde(default = "default_max_duration")]
    pub max_duration_ms: u32,
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    #[serde(default)]
    pub encoder: EncoderKind,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub audio_source: AudioSource,
    #[serde(default)]
    pub audio_encoder: AudioEncoder,
    /// Overrides the conventional movies directory.
    #[serde(default)]
    pub movies_dir: Option<PathBuf>,
}

fn default_width() -> u32 {
    CAPTURE_VIDEO_WIDTH
}

fn default_height() -> u32 {
    CAPTURE_VIDEO_HEIGHT
}

fn default_frame_rate() -> u32 {
    FRAMES_PER_SECOND
}

fn default_bitrate() -> u32 {
    BITRATE_PER_SECOND
}

fn default_max_duration() -> u32 {
    MAX_CAPTURE_DURATION_MS
}

fn default_max_file_size() -> u64 {
    MAX_CAPTURE_FILESIZE_BYTES
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            video_width: default_width(),
            video_height: default_height(),
            frame_rate: default_frame_rate(),
            bitrate_bps: default_bitrate(),
            max_duration_ms: default_max_duration(),
            max_file_size_bytes: default_max_file_size(),
            encoder: EncoderKind::default(),
            output_format: OutputFormat::default(),
            audio_source: AudioSource::default(),
            audio_encoder: AudioEncoder::default(),
            movies_dir: None,
        }
    }
}

impl CaptureSettings {
    pub fn to_recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            video_width: self.video_width,
            video_height: self.video_height,
            frame_rate: self.frame_rate,
            bitrate_bps: self.bitrate_bps,
            max_duration_ms: self.max_duration_ms,
            max_file_size_bytes: self.max_file_size_bytes,
            encoder_kind: self.encoder,
            output_format: self.output_format,
            audio_source: self.audio_source,
            audio_encoder: self.audio_encoder,
            ..RecorderConfig::default()
        }
    }

    pub fn movies_dir(&self) -> Option<PathBuf> {
        self.movies_dir.clone().or_else(get_movies_dir)
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    ParseError(#[from] serde_json::Error),
}

fn get_settings_path() -> PathBuf {
    get_storage_dir().join("settings.json")
}

pub fn load_settings() -> CaptureSettings {
    load_settings_from(&get_settings_path())
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings_from(path: &Path) -> CaptureSettings {
    if !path.exists() {
        return CaptureSettings::default();
    }

    match load_settings_from_file(path) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(target: "system", "Ignoring settings at {:?}: {}", path, e);
            CaptureSettings::default()
        }
    }
}

fn load_settings_from_file(path: &Path) -> Result<CaptureSettings, SettingsError> {
    let contents = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str(&contents)?;
    Ok(settings)
}

pub fn save_settings(settings: &CaptureSettings) -> Result<(), SettingsError> {
    ensure_dir(&get_storage_dir())?;
    save_settings_to(&get_settings_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &CaptureSettings) -> Result<(), SettingsError> {
    let contents = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, contents)?;
    Ok(())
}
