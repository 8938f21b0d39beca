pub mod coordinator;
pub mod handle;
pub mod state;

pub use coordinator::{CaptureController, CaptureDeps, CaptureEvent, ControllerStatus};
pub use handle::ControllerHandle;
pub use state::{transition, CaptureState, ControlEvent, Session, SideEffect};
