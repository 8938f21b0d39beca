//! Camera backend over V4L2 device nodes (`/dev/videoN`).
//!
//! Holding the node open is the exclusive lock. Preview runs a memory-mapped
//! capture stream; the host composites the surface from the same device.

use std::io;
use std::path::{Path, PathBuf};

use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::traits::Stream as _;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use super::{CameraBackend, CameraDevice};
use crate::capture::errors::HardwareError;
use crate::capture::types::{PixelFormat, PreviewParams, Surface};

const PREVIEW_BUFFERS: u32 = 4;

#[derive(Debug, Clone)]
pub struct V4l2Camera {
    device_dir: Option<PathBuf>,
    preferred: Option<PathBuf>,
}

impl V4l2Camera {
    /// Uses the lowest-numbered capture node the kernel reports.
    pub fn new() -> Self {
        Self {
            device_dir: None,
            preferred: None,
        }
    }

    pub fn in_dir(device_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: Some(device_dir.into()),
            preferred: None,
        }
    }

    pub fn with_device(path: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: None,
            preferred: Some(path.into()),
        }
    }

    fn find_device(&self) -> Option<PathBuf> {
        if let Some(path) = &self.preferred {
            return path.exists().then(|| path.clone());
        }

        let mut nodes: Vec<(usize, PathBuf)> = match &self.device_dir {
            None => v4l::context::enum_devices()
                .into_iter()
                .map(|node| (node.index(), node.path().to_path_buf()))
                .collect(),
            Some(dir) => std::fs::read_dir(dir)
                .ok()?
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| {
                    let name = entry.file_name().to_string_lossy().to_string();
                    let index = name.strip_prefix("video")?.parse::<usize>().ok()?;
                    Some((index, entry.path()))
                })
                .collect(),
        };

        nodes.sort_by_key(|(index, _)| *index);
        nodes.into_iter().next().map(|(_, path)| path)
    }
}

impl Default for V4l2Camera {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_io_error(error: io::Error) -> HardwareError {
    match error.raw_os_error() {
        Some(libc::EBUSY) => HardwareError::Busy,
        Some(libc::ENOENT) | Some(libc::ENODEV) | Some(libc::ENXIO) => HardwareError::NotFound,
        Some(libc::EINVAL) | Some(libc::ENOTTY) | Some(libc::EACCES) | Some(libc::EPERM) => {
            HardwareError::Rejected(error.to_string())
        }
        _ => HardwareError::Io(error.to_string()),
    }
}

fn fourcc_for(format: PixelFormat) -> FourCC {
    match format {
        PixelFormat::Nv21 => FourCC::new(b"NV21"),
        PixelFormat::Yv12 => FourCC::new(b"YV12"),
        PixelFormat::Rgba8888 => FourCC::new(b"AB24"),
    }
}

fn open_node(path: &Path) -> Result<Device, HardwareError> {
    let device = Device::with_path(path).map_err(classify_io_error)?;
    let caps = device.query_caps().map_err(classify_io_error)?;

    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        return Err(HardwareError::Rejected(format!(
            "{} ({}) cannot capture video",
            caps.card,
            path.display()
        )));
    }

    tracing::debug!(target: "capture", "[HARDWARE] Opened V4L2 node {:?} ({})", path, caps.card);
    Ok(device)
}

impl CameraBackend for V4l2Camera {
    fn device_id(&self) -> Option<String> {
        self.find_device()
            .map(|path| path.to_string_lossy().to_string())
    }

    fn open(&self) -> Result<Box<dyn CameraDevice>, HardwareError> {
        let path = self.find_device().ok_or(HardwareError::NotFound)?;
        let device = open_node(&path)?;

        Ok(Box::new(V4l2Device {
            id: path.to_string_lossy().to_string(),
            device: Some(device),
            stream: None,
            params: None,
            surface: None,
        }))
    }
}

struct V4l2Device {
    id: String,
    device: Option<Device>,
    stream: Option<MmapStream<'static>>,
    params: Option<PreviewParams>,
    surface: Option<u64>,
}

impl V4l2Device {
    fn node(&self) -> Result<&Device, HardwareError> {
        self.device
            .as_ref()
            .ok_or_else(|| HardwareError::Rejected("device node not held".to_string()))
    }

    fn end_stream(&mut self) -> Result<(), HardwareError> {
        match self.stream.take() {
            Some(mut stream) => stream.stop().map_err(classify_io_error),
            None => Ok(()),
        }
    }
}

impl CameraDevice for V4l2Device {
    fn id(&self) -> &str {
        &self.id
    }

    /// Negotiates the format with the driver. A driver that answers with
    /// different geometry or pixel layout rejects the request.
    fn set_preview_params(&mut self, params: &PreviewParams) -> Result<(), HardwareError> {
        let device = self.node()?;
        let wanted = fourcc_for(params.pixel_format);

        let mut format = device.format().map_err(classify_io_error)?;
        format.width = params.width;
        format.height = params.height;
        format.fourcc = wanted;

        let applied = device.set_format(&format).map_err(classify_io_error)?;
        if applied.width != params.width
            || applied.height != params.height
            || applied.fourcc != wanted
        {
            return Err(HardwareError::Rejected(format!(
                "asked for {}x{} {}, driver offered {}x{} {}",
                params.width, params.height, wanted, applied.width, applied.height, applied.fourcc
            )));
        }

        self.params = Some(*params);
        Ok(())
    }

    fn set_preview_display(&mut self, surface: &Surface) -> Result<(), HardwareError> {
        self.surface = Some(surface.id());
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), HardwareError> {
        if self.params.is_none() || self.surface.is_none() {
            return Err(HardwareError::Rejected("preview not configured".to_string()));
        }
        if self.stream.is_some() {
            return Ok(());
        }

        let device = self.node()?;
        let mut stream = MmapStream::with_buffers(device, Type::VideoCapture, PREVIEW_BUFFERS)
            .map_err(classify_io_error)?;
        stream.start().map_err(classify_io_error)?;

        self.stream = Some(stream);
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), HardwareError> {
        self.end_stream()
    }

    /// Closes the node so the recorder process can open it.
    fn unlock(&mut self) -> Result<(), HardwareError> {
        if self.device.is_none() {
            return Err(HardwareError::Rejected("device node not held".to_string()));
        }
        if let Err(e) = self.end_stream() {
            tracing::warn!(target: "capture", "[HARDWARE] Stream stop before unlock failed: {}", e);
        }
        self.device = None;
        Ok(())
    }

    fn release(&mut self) {
        self.stream = None;
        self.surface = None;
        self.device = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_empty_dir_has_no_device() {
        let temp = tempfile::tempdir().unwrap();
        let camera = V4l2Camera::in_dir(temp.path());

        assert!(camera.device_id().is_none());
        assert!(matches!(camera.open(), Err(HardwareError::NotFound)));
    }

    #[test]
    fn test_lowest_video_node_is_chosen() {
        let temp = tempfile::tempdir().unwrap();
        File::create(temp.path().join("video2")).unwrap();
        File::create(temp.path().join("video0")).unwrap();
        File::create(temp.path().join("vbi0")).unwrap();

        let camera = V4l2Camera::in_dir(temp.path());
        let id = camera.device_id().unwrap();
        assert!(id.ends_with("video0"));
    }

    #[test]
    fn test_regular_file_is_not_a_capture_device() {
        let temp = tempfile::tempdir().unwrap();
        let node = temp.path().join("video0");
        File::create(&node).unwrap();

        let camera = V4l2Camera::with_device(&node);
        assert!(camera.device_id().is_some());
        assert!(matches!(camera.open(), Err(HardwareError::Rejected(_))));
    }

    #[test]
    fn test_missing_preferred_device() {
        let temp = tempfile::tempdir().unwrap();
        let camera = V4l2Camera::with_device(temp.path().join("video9"));
        assert!(camera.device_id().is_none());
        assert!(matches!(camera.open(), Err(HardwareError::NotFound)));
    }

    #[test]
    fn test_driver_errors_are_classified() {
        let busy = io::Error::from_raw_os_error(libc::EBUSY);
        let gone = io::Error::from_raw_os_error(libc::ENODEV);
        let invalid = io::Error::from_raw_os_error(libc::EINVAL);
        let other = io::Error::from_raw_os_error(libc::EIO);

        assert_eq!(classify_io_error(busy), HardwareError::Busy);
        assert_eq!(classify_io_error(gone), HardwareError::NotFound);
        assert!(matches!(classify_io_error(invalid), HardwareError::Rejected(_)));
        assert!(matches!(classify_io_error(other), HardwareError::Io(_)));
    }

    #[test]
    fn test_pixel_formats_map_to_fourcc() {
        assert_eq!(fourcc_for(PixelFormat::Nv21), FourCC::new(b"NV21"));
        assert_eq!(fourcc_for(PixelFormat::Yv12), FourCC::new(b"YV12"));
        assert_eq!(fourcc_for(PixelFormat::Rgba8888), FourCC::new(b"AB24"));
    }
}
