use std::sync::Arc;

use super::lease::DeviceLease;
use super::{CameraBackend, CameraDevice, PreviewBinding};
use crate::capture::errors::{CaptureError, CaptureResult};
use crate::capture::types::{PixelFormat, PreviewParams, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareState {
    Unacquired,
    Acquired,
    Bound,
    Released,
}

/// Owns the camera handle from acquisition to release.
///
/// Dropping the session stops preview and releases the device, so every early
/// return in the caller still frees the hardware.
pub struct HardwareSession {
    backend: Box<dyn CameraBackend>,
    state: HardwareState,
    device: Option<Box<dyn CameraDevice>>,
    lease: Option<DeviceLease>,
    binding: Option<PreviewBinding>,
    preview_params: PreviewParams,
    preview_running: bool,
    unlocked: bool,
}

impl HardwareSession {
    pub fn new(backend: Box<dyn CameraBackend>) -> Self {
        Self::with_preview_params(backend, PreviewParams::default())
    }

    pub fn with_preview_params(
        backend: Box<dyn CameraBackend>,
        preview_params: PreviewParams,
    ) -> Self {
        Self {
            backend,
            state: HardwareState::Unacquired,
            device: None,
            lease: None,
            binding: None,
            preview_params,
            preview_running: false,
            unlocked: false,
        }
    }

    pub fn state(&self) -> HardwareState {
        self.state
    }

    pub fn is_acquired(&self) -> bool {
        matches!(self.state, HardwareState::Acquired | HardwareState::Bound)
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn is_previewing(&self) -> bool {
        self.preview_running
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.id())
    }

    pub fn binding(&self) -> Option<&PreviewBinding> {
        self.binding.as_ref()
    }

    pub fn acquire(&mut self) -> CaptureResult<()> {
        if self.is_acquired() {
            return Ok(());
        }

        let Some(device_id) = self.backend.device_id() else {
            tracing::warn!(
                target: "capture",
                "[HARDWARE] Failed to acquire - device doesn't have a camera"
            );
            return Err(CaptureError::NoDevice);
        };

        let Some(lease) = DeviceLease::claim(&device_id) else {
            tracing::warn!(
                target: "capture",
                "[HARDWARE] Failed to acquire - {} already held",
                device_id
            );
            return Err(CaptureError::DeviceBusy);
        };

        let device = self.backend.open().map_err(|e| {
            tracing::warn!(target: "capture", "[HARDWARE] Failed to open {}: {}", device_id, e);
            CaptureError::from(e)
        })?;

        tracing::info!(target: "capture", "[HARDWARE] Acquired camera {}", device_id);
        self.device = Some(device);
        self.lease = Some(lease);
        self.unlocked = false;
        self.state = HardwareState::Acquired;
        Ok(())
    }

    /// Applies the fixed preview parameters, attaches `surface` and starts streaming.
    pub fn bind(&mut self, surface: &Arc<Surface>) -> CaptureResult<()> {
        self.start_streaming(surface)?;
        self.binding = Some(PreviewBinding::new(surface));
        self.state = HardwareState::Bound;
        Ok(())
    }

    /// Restarts preview on the bound surface after a geometry change.
    pub fn reconfigure_preview(
        &mut self,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
    ) -> CaptureResult<()> {
        tracing::debug!(
            target: "capture",
            "[HARDWARE] Surface changed to {}x{} ({:?}), reapplying preview",
            width,
            height,
            pixel_format
        );

        let surface = self
            .binding
            .as_ref()
            .and_then(PreviewBinding::surface)
            .ok_or(CaptureError::PreviewAttachFailed)?;

        self.start_streaming(&surface)
    }

    fn start_streaming(&mut self, surface: &Surface) -> CaptureResult<()> {
        let params = self.preview_params;
        let device = self.device.as_mut().ok_or(CaptureError::NoDevice)?;

        if self.preview_running {
            if let Err(e) = device.stop_preview() {
                tracing::warn!(
                    target: "capture",
                    "[HARDWARE] Failed to stop running preview: {}",
                    e
                );
            }
            self.preview_running = false;
        }

        device.set_preview_params(&params).map_err(|e| {
            tracing::warn!(
                target: "capture",
                "[HARDWARE] Invalid parameters set to camera preview: {}",
                e
            );
            CaptureError::InvalidPreviewParams
        })?;

        device.set_preview_display(surface).map_err(|e| {
            tracing::warn!(
                target: "capture",
                "[HARDWARE] Unable to connect camera to preview: {}",
                e
            );
            CaptureError::PreviewAttachFailed
        })?;

        device.start_preview().map_err(|e| {
            tracing::warn!(target: "capture", "[HARDWARE] Unable to start preview: {}", e);
            CaptureError::PreviewAttachFailed
        })?;

        self.preview_running = true;
        tracing::debug!(
            target: "capture",
            "[HARDWARE] Preview running on surface {}",
            surface.id()
        );
        Ok(())
    }

    /// Hands the stream over to a recorder. Repeated calls are no-ops.
    pub fn unlock_for_recording(&mut self) -> CaptureResult<()> {
        if self.unlocked {
            return Ok(());
        }

        let device = self.device.as_mut().ok_or_else(|| {
            tracing::warn!(target: "capture", "[HARDWARE] Unlock failed - no camera acquired");
            CaptureError::NoDevice
        })?;

        device.unlock().map_err(|e| {
            tracing::warn!(target: "capture", "[HARDWARE] Unlock failed: {}", e);
            CaptureError::from(e)
        })?;

        self.unlocked = true;
        Ok(())
    }

    /// Stops preview and releases the device. Never fails; returns whether a
    /// device was actually released by this call.
    pub fn stop_preview_and_release(&mut self) -> bool {
        self.binding = None;

        let Some(mut device) = self.device.take() else {
            return false;
        };

        if self.preview_running {
            if let Err(e) = device.stop_preview() {
                tracing::warn!(
                    target: "capture",
                    "[HARDWARE] Failed to stop preview during release: {}",
                    e
                );
            }
            self.preview_running = false;
        }

        device.release();
        self.lease = None;
        self.unlocked = false;
        self.state = HardwareState::Released;

        tracing::info!(target: "capture", "[HARDWARE] Released camera");
        true
    }
}

impl Drop for HardwareSession {
    fn drop(&mut self) {
        self.stop_preview_and_release();
    }
}
