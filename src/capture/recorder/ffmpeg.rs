use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use super::sequence::{ConfigSequence, ConfigStage};
use super::{MediaRecorder, RecorderBackend};
use crate::capture::errors::RecorderError;
use crate::capture::types::{
    AudioEncoder, AudioSource, EncoderKind, OutputFormat, RecorderConfig, Surface, VideoSource,
};

pub fn check_ffmpeg(program: &str) -> Result<(), RecorderError> {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| RecorderError::Runtime(format!("{} not available: {}", program, e)))?;
    Ok(())
}

/// Gets the default PulseAudio/PipeWire input source for microphone capture.
fn get_default_input_source() -> Option<String> {
    let output = Command::new("pactl")
        .args(["get-default-source"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let source_name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if source_name.is_empty() {
        return None;
    }

    Some(source_name)
}

/// RAII guard that kills a running encoder process and deletes its partial
/// output if it is dropped before the recording was asked to stop.
pub struct ProcessGuard {
    child: Option<Child>,
    output_path: PathBuf,
    completed: bool,
}

impl ProcessGuard {
    pub fn new(child: Child, output_path: PathBuf) -> Self {
        Self {
            child: Some(child),
            output_path,
            completed: false,
        }
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    pub fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if self.completed {
            return;
        }

        tracing::warn!(target: "capture", "[RECORDER] Encoder dropped while running, cleaning up");

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::warn!(target: "capture", "[RECORDER] Failed to kill encoder: {}", e);
            }
            let _ = child.wait();
        }

        if self.output_path.exists() {
            tracing::info!(
                target: "capture",
                "[RECORDER] Deleting partial file: {:?}",
                self.output_path
            );
            if let Err(e) = std::fs::remove_file(&self.output_path) {
                tracing::warn!(
                    target: "capture",
                    "[RECORDER] Failed to delete partial file: {}",
                    e
                );
            }
        }
    }
}

/// Everything the setters collect before the encoder process is spawned.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegJob {
    pub device: Option<String>,
    pub audio_input: Option<String>,
    pub format: OutputFormat,
    pub max_duration_ms: u32,
    pub max_file_size_bytes: u64,
    pub output_file: Option<String>,
    pub frame_rate: u32,
    pub video_width: u32,
    pub video_height: u32,
    pub bitrate_bps: u32,
    pub audio_encoder: AudioEncoder,
    pub video_encoder: EncoderKind,
}

impl Default for FfmpegJob {
    fn default() -> Self {
        let config = RecorderConfig::default();
        Self {
            device: None,
            audio_input: None,
            format: config.output_format,
            max_duration_ms: config.max_duration_ms,
            max_file_size_bytes: config.max_file_size_bytes,
            output_file: None,
            frame_rate: config.frame_rate,
            video_width: config.video_width,
            video_height: config.video_height,
            bitrate_bps: config.bitrate_bps,
            audio_encoder: config.audio_encoder,
            video_encoder: config.encoder_kind,
        }
    }
}

fn video_codec(encoder: EncoderKind) -> &'static str {
    match encoder {
        EncoderKind::H264 => "libx264",
        EncoderKind::Mpeg4 => "mpeg4",
        EncoderKind::H263 => "h263",
    }
}

fn container(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Mpeg4 => "mp4",
        OutputFormat::ThreeGpp => "3gp",
    }
}

impl FfmpegJob {
    pub fn build_args(&self) -> Result<Vec<String>, RecorderError> {
        let device = self
            .device
            .as_deref()
            .ok_or_else(|| RecorderError::IllegalState("camera not set".to_string()))?;
        let output = self
            .output_file
            .as_deref()
            .ok_or_else(|| RecorderError::IllegalState("output file not set".to_string()))?;

        let mut args: Vec<String> = vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "v4l2".to_string(),
            "-framerate".to_string(),
            self.frame_rate.to_string(),
            "-video_size".to_string(),
            format!("{}x{}", self.video_width, self.video_height),
            "-i".to_string(),
            device.to_string(),
        ];

        if let Some(source) = &self.audio_input {
            args.extend([
                "-f".to_string(),
                "pulse".to_string(),
                "-i".to_string(),
                source.clone(),
            ]);
        }

        args.extend([
            "-c:v".to_string(),
            video_codec(self.video_encoder).to_string(),
            "-b:v".to_string(),
            self.bitrate_bps.to_string(),
        ]);

        if self.audio_input.is_some() {
            let codec = match self.audio_encoder {
                AudioEncoder::Default | AudioEncoder::Aac => "aac",
            };
            args.extend(["-c:a".to_string(), codec.to_string()]);
        }

        if self.max_duration_ms > 0 {
            args.extend([
                "-t".to_string(),
                format!("{:.3}", self.max_duration_ms as f64 / 1000.0),
            ]);
        }
        if self.max_file_size_bytes > 0 {
            args.extend(["-fs".to_string(), self.max_file_size_bytes.to_string()]);
        }

        args.extend([
            "-f".to_string(),
            container(self.format).to_string(),
            output.to_string(),
        ]);

        Ok(args)
    }
}

/// Spawns one `ffmpeg` process per recording, reading the V4L2 node the camera
/// session unlocked.
#[derive(Debug, Clone)]
pub struct FfmpegRecorderBackend {
    program: String,
}

impl FfmpegRecorderBackend {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegRecorderBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderBackend for FfmpegRecorderBackend {
    fn create(&self) -> Result<Box<dyn MediaRecorder>, RecorderError> {
        Ok(Box::new(FfmpegRecorder::new(self.program.clone())))
    }
}

pub struct FfmpegRecorder {
    program: String,
    sequence: ConfigSequence,
    job: FfmpegJob,
    args: Option<Vec<String>>,
    guard: Option<ProcessGuard>,
    released: bool,
}

impl FfmpegRecorder {
    pub fn new(program: String) -> Self {
        Self {
            program,
            sequence: ConfigSequence::new(),
            job: FfmpegJob::default(),
            args: None,
            guard: None,
            released: false,
        }
    }

    pub fn job(&self) -> &FfmpegJob {
        &self.job
    }

    fn configure(&mut self, stage: ConfigStage, call: &str) -> Result<(), RecorderError> {
        if self.released || self.args.is_some() {
            return Err(RecorderError::IllegalState(format!(
                "{} called after prepare",
                call
            )));
        }
        self.sequence.advance(stage, call)
    }
}

impl MediaRecorder for FfmpegRecorder {
    fn set_camera(&mut self, device_id: &str) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Camera, "set_camera")?;
        self.job.device = Some(device_id.to_string());
        Ok(())
    }

    fn set_audio_source(&mut self, source: AudioSource) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Sources, "set_audio_source")?;
        self.job.audio_input = match source {
            AudioSource::Default => Some("default".to_string()),
            AudioSource::Mic => {
                Some(get_default_input_source().unwrap_or_else(|| "default".to_string()))
            }
        };
        Ok(())
    }

    fn set_video_source(&mut self, _source: VideoSource) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Sources, "set_video_source")
    }

    fn set_output_format(&mut self, format: OutputFormat) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Format, "set_output_format")?;
        self.job.format = format;
        Ok(())
    }

    fn set_max_duration(&mut self, millis: u32) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Output, "set_max_duration")?;
        self.job.max_duration_ms = millis;
        Ok(())
    }

    fn set_max_file_size(&mut self, bytes: u64) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Output, "set_max_file_size")?;
        self.job.max_file_size_bytes = bytes;
        Ok(())
    }

    fn set_output_file(&mut self, path: &str) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Output, "set_output_file")?;
        self.sequence.mark_output_file();
        self.job.output_file = Some(path.to_string());
        Ok(())
    }

    fn set_video_frame_rate(&mut self, fps: u32) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Encoding, "set_video_frame_rate")?;
        self.job.frame_rate = fps;
        Ok(())
    }

    fn set_video_size(&mut self, width: u32, height: u32) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Encoding, "set_video_size")?;
        self.job.video_width = width;
        self.job.video_height = height;
        Ok(())
    }

    fn set_video_encoding_bit_rate(&mut self, bps: u32) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Encoding, "set_video_encoding_bit_rate")?;
        self.job.bitrate_bps = bps;
        Ok(())
    }

    fn set_audio_encoder(&mut self, encoder: AudioEncoder) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Encoding, "set_audio_encoder")?;
        self.job.audio_encoder = encoder;
        Ok(())
    }

    fn set_video_encoder(&mut self, encoder: EncoderKind) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Encoding, "set_video_encoder")?;
        self.job.video_encoder = encoder;
        Ok(())
    }

    // Frames go straight from the device node to the encoder; the host keeps
    // compositing the surface it already has.
    fn set_preview_display(&mut self, _surface: &Surface) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Preview, "set_preview_display")
    }

    fn prepare(&mut self) -> Result<(), RecorderError> {
        if self.released || self.args.is_some() {
            return Err(RecorderError::IllegalState("prepare called twice".to_string()));
        }
        self.sequence.check_ready()?;
        let args = self.job.build_args()?;

        check_ffmpeg(&self.program)?;

        if let Some(path) = &self.job.output_file {
            OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(path)
                .map_err(|e| RecorderError::Io(format!("{}: {}", path, e)))?;
        }

        tracing::debug!(target: "capture", "[RECORDER] ffmpeg args: {:?}", args);
        self.args = Some(args);
        Ok(())
    }

    fn start(&mut self) -> Result<(), RecorderError> {
        if self.guard.is_some() {
            return Err(RecorderError::IllegalState("already recording".to_string()));
        }
        let args = self
            .args
            .as_ref()
            .ok_or_else(|| RecorderError::IllegalState("start called before prepare".to_string()))?;
        let output_path = PathBuf::from(self.job.output_file.clone().unwrap_or_default());

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                RecorderError::Runtime(format!("Failed to spawn {}: {}", self.program, e))
            })?;

        let mut guard = ProcessGuard::new(child, output_path);

        if let Some(child) = guard.child_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Err(RecorderError::Runtime(format!(
                        "encoder exited immediately: {}",
                        status
                    )));
                }
                Ok(None) => {}
                Err(e) => return Err(RecorderError::Runtime(e.to_string())),
            }
        }

        tracing::info!(target: "capture", "[RECORDER] Encoder started");
        self.guard = Some(guard);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        let mut guard = self.guard.take().ok_or_else(|| {
            RecorderError::IllegalState("stop called while not recording".to_string())
        })?;

        let child = guard
            .child_mut()
            .ok_or_else(|| RecorderError::Runtime("encoder process missing".to_string()))?;

        // ffmpeg finalizes the container when it reads 'q'.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(b"q") {
                tracing::warn!(target: "capture", "[RECORDER] Failed to signal encoder: {}", e);
            }
        }

        let waited = child.wait();

        // Once the encoder has been asked to finish, whatever it wrote is the
        // recording, even if it exits badly.
        guard.mark_completed();

        let status = waited
            .map_err(|e| RecorderError::Runtime(format!("Failed to wait for encoder: {}", e)))?;
        if !status.success() {
            return Err(RecorderError::Runtime(format!("encoder exited with {}", status)));
        }

        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
        self.guard = None;
    }
}
