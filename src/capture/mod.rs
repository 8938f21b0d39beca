//! Video capture session: output resolution, camera and recorder sessions, and
//! the controller that drives them from surface events and user commands.

pub mod controller;
pub mod errors;
pub mod hardware;
pub mod output;
pub mod persistence;
pub mod recorder;
pub mod thumbnail;
pub mod types;

pub use controller::{
    CaptureController, CaptureDeps, CaptureEvent, ControllerHandle, ControllerStatus,
};
pub use errors::{CaptureError, CaptureResult};
pub use persistence::SavedSession;
pub use thumbnail::{Thumbnail, ThumbnailGenerator};
pub use types::{LaunchRequest, Outcome, Phase, RecorderConfig, Surface, UiUpdate};

/// Receives UI state changes from the controller.
pub trait UiSink: Send {
    fn show(&self, update: UiUpdate);

    fn thumbnail_ready(&self, _thumbnail: &Thumbnail) {}
}

/// Sink for hosts that render nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUi;

impl UiSink for NoopUi {
    fn show(&self, _update: UiUpdate) {}
}
