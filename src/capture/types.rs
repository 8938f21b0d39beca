use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub const PREVIEW_VIDEO_WIDTH: u32 = 640;
pub const PREVIEW_VIDEO_HEIGHT: u32 = 480;
pub const CAPTURE_VIDEO_WIDTH: u32 = 640;
pub const CAPTURE_VIDEO_HEIGHT: u32 = 480;
pub const FRAMES_PER_SECOND: u32 = 25;
/// Bits per second.
pub const BITRATE_PER_SECOND: u32 = 750_000;
pub const MAX_CAPTURE_DURATION_MS: u32 = 30_000;
pub const MAX_CAPTURE_FILESIZE_BYTES: u64 = 20 * 1024 * 1024;

/// Result codes handed back to the launching host.
pub const RESULT_OK: i32 = -1;
pub const RESULT_CANCELED: i32 = 0;
pub const RESULT_ERROR: i32 = 753_245;

/// Discrete stage of a capture session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    PreviewActive,
    Recording,
    Finished,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::PreviewActive => "previewing",
            Phase::Recording => "recording",
            Phase::Finished => "finished",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    #[default]
    H264,
    Mpeg4,
    H263,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mpeg4,
    ThreeGpp,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mpeg4 => "mp4",
            OutputFormat::ThreeGpp => "3gp",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioSource {
    #[default]
    Default,
    Mic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoSource {
    #[default]
    Camera,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoder {
    #[default]
    Default,
    Aac,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Nv21,
    Yv12,
    Rgba8888,
}

/// Immutable recorder configuration, built once per session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderConfig {
    pub video_width: u32,
    pub video_height: u32,
    pub frame_rate: u32,
    pub bitrate_bps: u32,
    pub max_duration_ms: u32,
    pub max_file_size_bytes: u64,
    pub encoder_kind: EncoderKind,
    pub output_format: OutputFormat,
    pub audio_source: AudioSource,
    pub audio_encoder: AudioEncoder,
    pub video_source: VideoSource,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            video_width: CAPTURE_VIDEO_WIDTH,
            video_height: CAPTURE_VIDEO_HEIGHT,
            frame_rate: FRAMES_PER_SECOND,
            bitrate_bps: BITRATE_PER_SECOND,
            max_duration_ms: MAX_CAPTURE_DURATION_MS,
            max_file_size_bytes: MAX_CAPTURE_FILESIZE_BYTES,
            encoder_kind: EncoderKind::H264,
            output_format: OutputFormat::Mpeg4,
            audio_source: AudioSource::Default,
            audio_encoder: AudioEncoder::Default,
            video_source: VideoSource::Camera,
        }
    }
}

/// Preview stream parameters applied to the camera before streaming.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviewParams {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl Default for PreviewParams {
    fn default() -> Self {
        Self {
            width: PREVIEW_VIDEO_WIDTH,
            height: PREVIEW_VIDEO_HEIGHT,
            pixel_format: PixelFormat::Nv21,
        }
    }
}

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// A renderable surface owned by the host's preview provider.
///
/// The host keeps the `Arc<Surface>`; the capture stack only ever holds `Weak`
/// references, so dropping the host's handle invalidates every preview binding.
#[derive(Debug, PartialEq, Eq)]
pub struct Surface {
    id: u64,
    label: String,
}

impl Surface {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Terminal result of a capture session, delivered exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "payload", rename_all = "lowercase")]
pub enum Outcome {
    Completed(String),
    Cancelled,
    Error(String),
}

impl Outcome {
    pub fn result_code(&self) -> i32 {
        match self {
            Outcome::Completed(_) => RESULT_OK,
            Outcome::Cancelled => RESULT_CANCELED,
            Outcome::Error(_) => RESULT_ERROR,
        }
    }

    pub fn output_path(&self) -> Option<&str> {
        match self {
            Outcome::Completed(path) => Some(path),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Outcome::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// UI states the host renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UiUpdate {
    ShowIdle,
    ShowRecording,
    ShowFinished,
}

/// Launch contract: an optional destination for the artifact.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub output_path: Option<String>,
}

impl LaunchRequest {
    pub fn with_output(path: impl Into<String>) -> Self {
        Self {
            output_path: Some(path.into()),
        }
    }
}
