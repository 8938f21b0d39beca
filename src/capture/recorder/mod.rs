//! Hardware recorder seam and the session that drives it.

pub mod ffmpeg;
pub mod sequence;
pub mod session;
pub mod simulated;

use super::errors::RecorderError;
use super::types::{AudioEncoder, AudioSource, EncoderKind, OutputFormat, Surface, VideoSource};

pub use ffmpeg::{FfmpegRecorder, FfmpegRecorderBackend};
pub use sequence::{ConfigSequence, ConfigStage};
pub use session::{RecorderSession, RecorderState};
pub use simulated::{RecorderProbe, RecorderScript, SimulatedRecorder};

/// Creates recorder instances, one per recording attempt.
pub trait RecorderBackend: Send {
    fn create(&self) -> Result<Box<dyn MediaRecorder>, RecorderError>;
}

/// A hardware recorder.
///
/// Setters must be called in configuration order: camera, sources, output format,
/// caps and output file, encoder parameters, preview display. Implementations
/// reject calls that go backwards with [`RecorderError::IllegalState`].
pub trait MediaRecorder: Send {
    fn set_camera(&mut self, device_id: &str) -> Result<(), RecorderError>;
    fn set_audio_source(&mut self, source: AudioSource) -> Result<(), RecorderError>;
    fn set_video_source(&mut self, source: VideoSource) -> Result<(), RecorderError>;
    fn set_output_format(&mut self, format: OutputFormat) -> Result<(), RecorderError>;
    fn set_max_duration(&mut self, millis: u32) -> Result<(), RecorderError>;
    fn set_max_file_size(&mut self, bytes: u64) -> Result<(), RecorderError>;
    fn set_output_file(&mut self, path: &str) -> Result<(), RecorderError>;
    fn set_video_frame_rate(&mut self, fps: u32) -> Result<(), RecorderError>;
    fn set_video_size(&mut self, width: u32, height: u32) -> Result<(), RecorderError>;
    fn set_video_encoding_bit_rate(&mut self, bps: u32) -> Result<(), RecorderError>;
    fn set_audio_encoder(&mut self, encoder: AudioEncoder) -> Result<(), RecorderError>;
    fn set_video_encoder(&mut self, encoder: EncoderKind) -> Result<(), RecorderError>;
    fn set_preview_display(&mut self, surface: &Surface) -> Result<(), RecorderError>;

    fn prepare(&mut self) -> Result<(), RecorderError>;
    fn start(&mut self) -> Result<(), RecorderError>;
    fn stop(&mut self) -> Result<(), RecorderError>;
    fn release(&mut self);
}
