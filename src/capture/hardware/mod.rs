//! Camera hardware seam and the session that owns the device handle.

pub mod lease;
pub mod session;
pub mod simulated;
pub mod v4l2;

use std::sync::{Arc, Weak};

use super::errors::HardwareError;
use super::types::{PreviewParams, Surface};

pub use lease::DeviceLease;
pub use session::{HardwareSession, HardwareState};
pub use simulated::{CameraProbe, CameraScript, SimulatedCamera};
pub use v4l2::V4l2Camera;

/// Source of camera devices on the host.
pub trait CameraBackend: Send {
    /// Stable id of the physical device, `None` when the host has no camera.
    fn device_id(&self) -> Option<String>;

    /// Opens the device for exclusive use.
    fn open(&self) -> Result<Box<dyn CameraDevice>, HardwareError>;
}

/// An opened camera. Calls are synchronous and may block.
pub trait CameraDevice: Send {
    fn id(&self) -> &str;
    fn set_preview_params(&mut self, params: &PreviewParams) -> Result<(), HardwareError>;
    fn set_preview_display(&mut self, surface: &Surface) -> Result<(), HardwareError>;
    fn start_preview(&mut self) -> Result<(), HardwareError>;
    fn stop_preview(&mut self) -> Result<(), HardwareError>;
    /// Gives up the exclusive lock so a recorder can take the stream.
    fn unlock(&mut self) -> Result<(), HardwareError>;
    fn release(&mut self);
}

/// Relation between a hardware stream and a host surface. Holds no ownership.
#[derive(Debug, Clone)]
pub struct PreviewBinding {
    surface: Weak<Surface>,
    surface_id: u64,
}

impl PreviewBinding {
    pub fn new(surface: &Arc<Surface>) -> Self {
        Self {
            surface: Arc::downgrade(surface),
            surface_id: surface.id(),
        }
    }

    pub fn surface_id(&self) -> u64 {
        self.surface_id
    }

    /// The bound surface, if the host still holds it.
    pub fn surface(&self) -> Option<Arc<Surface>> {
        self.surface.upgrade()
    }

    pub fn is_valid(&self) -> bool {
        self.surface.strong_count() > 0
    }
}
