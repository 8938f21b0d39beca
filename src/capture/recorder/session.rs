use super::{MediaRecorder, RecorderBackend};
use crate::capture::errors::{CaptureError, CaptureResult, RecorderError};
use crate::capture::hardware::HardwareSession;
use crate::capture::types::{RecorderConfig, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Unconfigured,
    Configured,
    Prepared,
    Recording,
    Stopped,
    Released,
}

/// Owns one hardware recorder through configure, prepare, start, stop and release.
pub struct RecorderSession {
    backend: Box<dyn RecorderBackend>,
    recorder: Option<Box<dyn MediaRecorder>>,
    state: RecorderState,
}

impl RecorderSession {
    pub fn new(backend: Box<dyn RecorderBackend>) -> Self {
        Self {
            backend,
            recorder: None,
            state: RecorderState::Unconfigured,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Builds a fresh recorder against the unlocked camera.
    pub fn configure(
        &mut self,
        config: &RecorderConfig,
        hardware: &HardwareSession,
        output_path: &str,
        preview: &Surface,
    ) -> CaptureResult<()> {
        if !matches!(self.state, RecorderState::Unconfigured | RecorderState::Released) {
            return Err(CaptureError::ConfigureFailed(format!(
                "recorder already {:?}",
                self.state
            )));
        }

        let device_id = hardware.device_id().ok_or(CaptureError::NoDevice)?;
        if !hardware.is_unlocked() {
            return Err(CaptureError::ConfigureFailed(
                "camera not unlocked for recording".to_string(),
            ));
        }

        let mut recorder = self.backend.create().map_err(|e| {
            tracing::warn!(target: "capture", "[RECORDER] Failed to create recorder: {}", e);
            CaptureError::ConfigureFailed(e.to_string())
        })?;

        if let Err(e) = apply_config(recorder.as_mut(), config, device_id, output_path, preview) {
            tracing::warn!(target: "capture", "[RECORDER] Configuration rejected: {}", e);
            recorder.release();
            return Err(CaptureError::ConfigureFailed(e.to_string()));
        }

        tracing::debug!(target: "capture", "[RECORDER] Recorder initialized for {}", output_path);
        self.recorder = Some(recorder);
        self.state = RecorderState::Configured;
        Ok(())
    }

    pub fn prepare(&mut self) -> CaptureResult<()> {
        let recorder = match (self.state, self.recorder.as_mut()) {
            (RecorderState::Configured, Some(recorder)) => recorder,
            _ => {
                return Err(CaptureError::PrepareFailed(format!(
                    "cannot prepare while {:?}",
                    self.state
                )))
            }
        };

        recorder.prepare().map_err(|e| {
            tracing::warn!(target: "capture", "[RECORDER] Preparation failed: {}", e);
            match e {
                RecorderError::Io(msg) => CaptureError::PrepareIOFailed(msg),
                RecorderError::IllegalState(msg) | RecorderError::Runtime(msg) => {
                    CaptureError::PrepareFailed(msg)
                }
            }
        })?;

        tracing::debug!(target: "capture", "[RECORDER] Recorder prepared");
        self.state = RecorderState::Prepared;
        Ok(())
    }

    pub fn start(&mut self) -> CaptureResult<()> {
        let recorder = match (self.state, self.recorder.as_mut()) {
            (RecorderState::Prepared, Some(recorder)) => recorder,
            _ => {
                return Err(CaptureError::StartFailed(format!(
                    "cannot start while {:?}",
                    self.state
                )))
            }
        };

        recorder.start().map_err(|e| {
            tracing::warn!(target: "capture", "[RECORDER] Start failed: {}", e);
            CaptureError::StartFailed(e.to_string())
        })?;

        tracing::info!(target: "capture", "[RECORDER] Recording started");
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Best-effort stop. Always ends in `Stopped`; returns whether the recorder
    /// stopped cleanly.
    pub fn stop(&mut self) -> bool {
        if self.state != RecorderState::Recording {
            tracing::debug!(target: "capture", "[RECORDER] Stop ignored while {:?}", self.state);
            return false;
        }

        let clean = match self.recorder.as_mut().map(|r| r.stop()) {
            Some(Ok(())) => {
                tracing::info!(target: "capture", "[RECORDER] Successfully stopped recording");
                true
            }
            Some(Err(e)) => {
                tracing::warn!(target: "capture", "[RECORDER] Failed to stop recording: {}", e);
                false
            }
            None => false,
        };

        self.state = RecorderState::Stopped;
        clean
    }

    /// Frees the recorder. Safe from any state; returns whether anything was freed.
    pub fn release(&mut self) -> bool {
        let Some(mut recorder) = self.recorder.take() else {
            return false;
        };

        recorder.release();
        self.state = RecorderState::Released;
        tracing::debug!(target: "capture", "[RECORDER] Recorder released");
        true
    }
}

impl Drop for RecorderSession {
    fn drop(&mut self) {
        self.release();
    }
}

// Order is significant: the recorder rejects calls that go back a stage.
fn apply_config(
    recorder: &mut dyn MediaRecorder,
    config: &RecorderConfig,
    device_id: &str,
    output_path: &str,
    preview: &Surface,
) -> Result<(), RecorderError> {
    recorder.set_camera(device_id)?;
    recorder.set_audio_source(config.audio_source)?;
    recorder.set_video_source(config.video_source)?;

    recorder.set_output_format(config.output_format)?;
    recorder.set_max_duration(config.max_duration_ms)?;
    recorder.set_max_file_size(config.max_file_size_bytes)?;
    recorder.set_output_file(output_path)?;

    recorder.set_video_frame_rate(config.frame_rate)?;
    recorder.set_video_size(config.video_width, config.video_height)?;
    recorder.set_video_encoding_bit_rate(config.bitrate_bps)?;
    recorder.set_audio_encoder(config.audio_encoder)?;
    recorder.set_video_encoder(config.encoder_kind)?;

    recorder.set_preview_display(preview)
}
