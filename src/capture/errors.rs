use thiserror::Error;

/// Errors reported by a camera backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HardwareError {
    #[error("No camera device present")]
    NotFound,
    #[error("Camera is held by another process")]
    Busy,
    #[error("Camera rejected the request: {0}")]
    Rejected(String),
    #[error("Camera I/O failed: {0}")]
    Io(String),
}

/// Errors reported by a recorder backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecorderError {
    /// Call made in the wrong recorder state or out of configuration order.
    #[error("Recorder in illegal state: {0}")]
    IllegalState(String),
    #[error("Recorder I/O failed: {0}")]
    Io(String),
    #[error("Recorder runtime failure: {0}")]
    Runtime(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThumbnailError {
    #[error("Video not found: {0}")]
    SourceMissing(String),
    #[error("Thumbnail generation failed: {0}")]
    Generation(String),
}

/// Session-level failures. The `Display` text is what an `Outcome::Error` carries,
/// so every message is short enough to show to the user directly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Device does not have a camera")]
    NoDevice,
    #[error("Camera is used by another process")]
    DeviceBusy,
    #[error("Invalid parameters set to camera preview")]
    InvalidPreviewParams,
    #[error("Unable to connect camera to preview")]
    PreviewAttachFailed,
    #[error("Failed to generate output file: {0}")]
    PathGeneration(String),
    #[error("Failed to configure recorder: {0}")]
    ConfigureFailed(String),
    #[error("Recorder preparation failed: {0}")]
    PrepareFailed(String),
    #[error("Recorder cannot open output file: {0}")]
    PrepareIOFailed(String),
    #[error("Recorder start failed: {0}")]
    StartFailed(String),
    #[error("{command} is not allowed while {state}")]
    CommandRejected {
        command: &'static str,
        state: &'static str,
    },
    #[error("Capture controller is not running")]
    ControllerStopped,
}

impl CaptureError {
    /// True for failures that leave the session usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CaptureError::ConfigureFailed(_)
                | CaptureError::PrepareFailed(_)
                | CaptureError::PrepareIOFailed(_)
                | CaptureError::StartFailed(_)
                | CaptureError::CommandRejected { .. }
        )
    }
}

/// Maps device contention onto the acquisition taxonomy shared by acquire and unlock.
impl From<HardwareError> for CaptureError {
    fn from(error: HardwareError) -> Self {
        match error {
            HardwareError::NotFound => CaptureError::NoDevice,
            HardwareError::Busy => CaptureError::DeviceBusy,
            HardwareError::Rejected(_) | HardwareError::Io(_) => CaptureError::DeviceBusy,
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_errors_have_display_messages() {
        assert_eq!(CaptureError::NoDevice.to_string(), "Device does not have a camera");
        assert_eq!(
            CaptureError::DeviceBusy.to_string(),
            "Camera is used by another process"
        );
    }

    #[test]
    fn test_hardware_contention_maps_to_capture_error() {
        assert_eq!(CaptureError::from(HardwareError::NotFound), CaptureError::NoDevice);
        assert_eq!(CaptureError::from(HardwareError::Busy), CaptureError::DeviceBusy);
        assert_eq!(
            CaptureError::from(HardwareError::Io("EIO".to_string())),
            CaptureError::DeviceBusy
        );
    }

    #[test]
    fn test_recording_failures_are_recoverable() {
        assert!(CaptureError::StartFailed("x".to_string()).is_recoverable());
        assert!(CaptureError::PrepareIOFailed("x".to_string()).is_recoverable());
        assert!(!CaptureError::NoDevice.is_recoverable());
        assert!(!CaptureError::InvalidPreviewParams.is_recoverable());
    }

    #[test]
    fn test_command_rejected_message() {
        let error = CaptureError::CommandRejected {
            command: "record",
            state: "recording",
        };
        assert_eq!(error.to_string(), "record is not allowed while recording");
    }
}
