pub mod capture;
pub mod core;
pub mod shared;

pub use capture::{
    CaptureController, CaptureDeps, CaptureError, CaptureEvent, CaptureResult, ControllerHandle,
    LaunchRequest, Outcome, Phase, SavedSession, Surface, UiSink, UiUpdate,
};
