//! In-process camera for hosts without capture hardware.
//!
//! Failures are scripted through [`CameraScript`] and every device call is
//! counted in a shared [`CameraProbe`], so a clone of the backend can be
//! inspected after the backend itself has been handed to a session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{CameraBackend, CameraDevice};
use crate::capture::errors::HardwareError;
use crate::capture::types::{PixelFormat, PreviewParams, Surface};

#[derive(Debug, Clone, Default)]
pub struct CameraScript {
    pub absent: bool,
    pub busy: bool,
    pub reject_preview_params: bool,
    pub fail_preview_attach: bool,
    pub fail_unlock: Option<HardwareError>,
    pub fail_stop_preview: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraProbe {
    pub opens: u32,
    pub releases: u32,
    pub preview_starts: u32,
    pub preview_stops: u32,
    pub unlocks: u32,
    pub params: Vec<PreviewParams>,
    pub surfaces: Vec<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    id: String,
    script: Arc<Mutex<CameraScript>>,
    probe: Arc<Mutex<CameraProbe>>,
}

impl SimulatedCamera {
    /// A present, idle camera with a process-unique id.
    pub fn new() -> Self {
        Self::with_id(format!("sim-camera-{}", uuid::Uuid::new_v4()))
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            script: Arc::new(Mutex::new(CameraScript::default())),
            probe: Arc::new(Mutex::new(CameraProbe::default())),
        }
    }

    pub fn absent() -> Self {
        let camera = Self::new();
        camera.script(|s| s.absent = true);
        camera
    }

    /// A camera some other process holds.
    pub fn busy() -> Self {
        let camera = Self::new();
        camera.script(|s| s.busy = true);
        camera
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Edits the failure script. Takes effect on the next device call.
    pub fn script(&self, edit: impl FnOnce(&mut CameraScript)) {
        edit(&mut lock(&self.script));
    }

    pub fn probe(&self) -> CameraProbe {
        lock(&self.probe).clone()
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for SimulatedCamera {
    fn device_id(&self) -> Option<String> {
        if lock(&self.script).absent {
            None
        } else {
            Some(self.id.clone())
        }
    }

    fn open(&self) -> Result<Box<dyn CameraDevice>, HardwareError> {
        let script = lock(&self.script);
        if script.absent {
            return Err(HardwareError::NotFound);
        }
        if script.busy {
            return Err(HardwareError::Busy);
        }
        drop(script);

        lock(&self.probe).opens += 1;
        Ok(Box::new(SimulatedDevice {
            id: self.id.clone(),
            script: self.script.clone(),
            probe: self.probe.clone(),
            params: None,
            surface: None,
            streaming: false,
            released: false,
        }))
    }
}

struct SimulatedDevice {
    id: String,
    script: Arc<Mutex<CameraScript>>,
    probe: Arc<Mutex<CameraProbe>>,
    params: Option<PreviewParams>,
    surface: Option<u64>,
    streaming: bool,
    released: bool,
}

impl SimulatedDevice {
    fn ensure_open(&self) -> Result<(), HardwareError> {
        if self.released {
            return Err(HardwareError::Rejected("camera already released".to_string()));
        }
        Ok(())
    }
}

impl CameraDevice for SimulatedDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_preview_params(&mut self, params: &PreviewParams) -> Result<(), HardwareError> {
        self.ensure_open()?;
        if self.streaming {
            return Err(HardwareError::Rejected(
                "preview parameters changed while streaming".to_string(),
            ));
        }
        if lock(&self.script).reject_preview_params
            || params.pixel_format == PixelFormat::Rgba8888
        {
            return Err(HardwareError::Rejected(format!(
                "unsupported preview {}x{} {:?}",
                params.width, params.height, params.pixel_format
            )));
        }
        lock(&self.probe).params.push(*params);
        self.params = Some(*params);
        Ok(())
    }

    fn set_preview_display(&mut self, surface: &Surface) -> Result<(), HardwareError> {
        self.ensure_open()?;
        if lock(&self.script).fail_preview_attach {
            return Err(HardwareError::Io("surface not attachable".to_string()));
        }
        lock(&self.probe).surfaces.push(surface.id());
        self.surface = Some(surface.id());
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), HardwareError> {
        self.ensure_open()?;
        if self.params.is_none() || self.surface.is_none() {
            return Err(HardwareError::Rejected("preview not configured".to_string()));
        }
        lock(&self.probe).preview_starts += 1;
        self.streaming = true;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), HardwareError> {
        lock(&self.probe).preview_stops += 1;
        self.streaming = false;
        if lock(&self.script).fail_stop_preview {
            return Err(HardwareError::Io("stop preview failed".to_string()));
        }
        Ok(())
    }

    fn unlock(&mut self) -> Result<(), HardwareError> {
        self.ensure_open()?;
        if let Some(error) = lock(&self.script).fail_unlock.clone() {
            return Err(error);
        }
        lock(&self.probe).unlocks += 1;
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.streaming = false;
        lock(&self.probe).releases += 1;
    }
}
