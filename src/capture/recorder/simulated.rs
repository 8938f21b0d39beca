//! In-process recorder that enforces configuration order and records every call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::sequence::{ConfigSequence, ConfigStage};
use super::{MediaRecorder, RecorderBackend};
use crate::capture::errors::RecorderError;
use crate::capture::types::{
    AudioEncoder, AudioSource, EncoderKind, OutputFormat, Surface, VideoSource,
};

#[derive(Debug, Clone, Default)]
pub struct RecorderScript {
    pub fail_create: bool,
    pub fail_prepare: Option<RecorderError>,
    pub fail_start: bool,
    pub fail_stop: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecorderProbe {
    pub created: u32,
    pub prepares: u32,
    pub starts: u32,
    pub stops: u32,
    pub releases: u32,
    pub calls: Vec<&'static str>,
    pub camera: Option<String>,
    pub output_file: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedRecorder {
    script: Arc<Mutex<RecorderScript>>,
    probe: Arc<Mutex<RecorderProbe>>,
}

impl SimulatedRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, edit: impl FnOnce(&mut RecorderScript)) {
        edit(&mut lock(&self.script));
    }

    pub fn probe(&self) -> RecorderProbe {
        lock(&self.probe).clone()
    }
}

impl RecorderBackend for SimulatedRecorder {
    fn create(&self) -> Result<Box<dyn MediaRecorder>, RecorderError> {
        if lock(&self.script).fail_create {
            return Err(RecorderError::Runtime("recorder unavailable".to_string()));
        }
        lock(&self.probe).created += 1;
        Ok(Box::new(SimulatedMediaRecorder {
            script: self.script.clone(),
            probe: self.probe.clone(),
            sequence: ConfigSequence::new(),
            phase: SimPhase::Configuring,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimPhase {
    Configuring,
    Prepared,
    Recording,
    Stopped,
    Released,
}

struct SimulatedMediaRecorder {
    script: Arc<Mutex<RecorderScript>>,
    probe: Arc<Mutex<RecorderProbe>>,
    sequence: ConfigSequence,
    phase: SimPhase,
}

impl SimulatedMediaRecorder {
    fn configure(&mut self, stage: ConfigStage, call: &'static str) -> Result<(), RecorderError> {
        if self.phase != SimPhase::Configuring {
            return Err(RecorderError::IllegalState(format!(
                "{} called while {:?}",
                call, self.phase
            )));
        }
        self.sequence.advance(stage, call)?;
        lock(&self.probe).calls.push(call);
        Ok(())
    }
}

impl MediaRecorder for SimulatedMediaRecorder {
    fn set_camera(&mut self, device_id: &str) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Camera, "set_camera")?;
        lock(&self.probe).camera = Some(device_id.to_string());
        Ok(())
    }

    fn set_audio_source(&mut self, _source: AudioSource) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Sources, "set_audio_source")
    }

    fn set_video_source(&mut self, _source: VideoSource) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Sources, "set_video_source")
    }

    fn set_output_format(&mut self, _format: OutputFormat) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Format, "set_output_format")
    }

    fn set_max_duration(&mut self, _millis: u32) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Output, "set_max_duration")
    }

    fn set_max_file_size(&mut self, _bytes: u64) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Output, "set_max_file_size")
    }

    fn set_output_file(&mut self, path: &str) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Output, "set_output_file")?;
        self.sequence.mark_output_file();
        lock(&self.probe).output_file = Some(path.to_string());
        Ok(())
    }

    fn set_video_frame_rate(&mut self, _fps: u32) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Encoding, "set_video_frame_rate")
    }

    fn set_video_size(&mut self, _width: u32, _height: u32) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Encoding, "set_video_size")
    }

    fn set_video_encoding_bit_rate(&mut self, _bps: u32) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Encoding, "set_video_encoding_bit_rate")
    }

    fn set_audio_encoder(&mut self, _encoder: AudioEncoder) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Encoding, "set_audio_encoder")
    }

    fn set_video_encoder(&mut self, _encoder: EncoderKind) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Encoding, "set_video_encoder")
    }

    fn set_preview_display(&mut self, _surface: &Surface) -> Result<(), RecorderError> {
        self.configure(ConfigStage::Preview, "set_preview_display")
    }

    fn prepare(&mut self) -> Result<(), RecorderError> {
        if self.phase != SimPhase::Configuring {
            return Err(RecorderError::IllegalState(format!("prepare while {:?}", self.phase)));
        }
        self.sequence.check_ready()?;
        if let Some(error) = lock(&self.script).fail_prepare.clone() {
            return Err(error);
        }
        lock(&self.probe).prepares += 1;
        self.phase = SimPhase::Prepared;
        Ok(())
    }

    fn start(&mut self) -> Result<(), RecorderError> {
        if self.phase != SimPhase::Prepared {
            return Err(RecorderError::IllegalState(format!("start while {:?}", self.phase)));
        }
        if lock(&self.script).fail_start {
            return Err(RecorderError::Runtime("encoder failed to start".to_string()));
        }
        lock(&self.probe).starts += 1;
        self.phase = SimPhase::Recording;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        if self.phase != SimPhase::Recording {
            return Err(RecorderError::IllegalState(format!("stop while {:?}", self.phase)));
        }
        lock(&self.probe).stops += 1;
        self.phase = SimPhase::Stopped;
        if lock(&self.script).fail_stop {
            return Err(RecorderError::Runtime("no valid frames captured".to_string()));
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.phase == SimPhase::Released {
            return;
        }
        self.phase = SimPhase::Released;
        lock(&self.probe).releases += 1;
    }
}
