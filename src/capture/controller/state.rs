//! Pure state machine for a capture session.
//!
//! `(CaptureState, ControlEvent, &Session) -> (CaptureState, Vec<SideEffect>)`
//!
//! Hardware work happens in the coordinator, which executes the returned
//! effects and feeds their results back in as events. An event that is not
//! valid in the current state returns the current state with no effects.

use std::time::Instant;

use crate::capture::types::{Outcome, Phase, UiUpdate};

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    /// Output resolved, waiting for a preview surface.
    Idle,

    /// Camera acquired and streaming into the surface.
    PreviewActive,

    Recording { started_at: Instant },

    /// Artifact written and all hardware released.
    Finished,

    /// Outcome produced. Nothing leaves this state.
    Terminated(Outcome),
}

impl CaptureState {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            CaptureState::Idle => Some(Phase::Idle),
            CaptureState::PreviewActive => Some(Phase::PreviewActive),
            CaptureState::Recording { .. } => Some(Phase::Recording),
            CaptureState::Finished => Some(Phase::Finished),
            CaptureState::Terminated(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.phase().map(|p| p.as_str()).unwrap_or("terminated")
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, CaptureState::Terminated(_))
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            CaptureState::Terminated(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn elapsed(&self) -> Option<std::time::Duration> {
        match self {
            CaptureState::Recording { started_at } => Some(started_at.elapsed()),
            _ => None,
        }
    }
}

/// Session data owned by the controller. `output_path` never changes once set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub output_path: String,
    pub phase: Phase,
    pub has_recorded_artifact: bool,
    /// Set once the preview has streamed at least once.
    pub preview_has_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    // Surface lifecycle.
    SurfaceReady,
    SurfaceChanged,
    SurfaceDestroyed,

    // User commands.
    RecordRequested,
    StopRequested,
    Accepted,
    Declined,

    /// The hosting context is going to the background.
    Suspended,

    // Results of effects executed by the coordinator.
    PreviewStarted,
    PreviewFailed { message: String },
    PreviewReconfigureFailed,
    RecordingStarted,
    RecordingFailed,
}

impl ControlEvent {
    pub fn is_user_command(&self) -> bool {
        matches!(
            self,
            ControlEvent::RecordRequested
                | ControlEvent::StopRequested
                | ControlEvent::Accepted
                | ControlEvent::Declined
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ControlEvent::SurfaceReady => "surface ready",
            ControlEvent::SurfaceChanged => "surface change",
            ControlEvent::SurfaceDestroyed => "surface destroyed",
            ControlEvent::RecordRequested => "record",
            ControlEvent::StopRequested => "stop",
            ControlEvent::Accepted => "accept",
            ControlEvent::Declined => "decline",
            ControlEvent::Suspended => "suspend",
            ControlEvent::PreviewStarted => "preview started",
            ControlEvent::PreviewFailed { .. } => "preview failed",
            ControlEvent::PreviewReconfigureFailed => "preview reconfigure failed",
            ControlEvent::RecordingStarted => "recording started",
            ControlEvent::RecordingFailed => "recording failed",
        }
    }
}

/// Work the coordinator performs after a transition, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Acquire the camera and bind it to the current surface.
    StartPreview,
    ReconfigurePreview,
    /// Unlock, configure, prepare and start the recorder.
    StartRecording,
    StopRecording,
    MarkRecorded,
    ReleaseRecorder,
    /// Release recorder and camera. Idempotent.
    ReleaseAll,
    EmitUi(UiUpdate),
    GenerateThumbnail,
    DeliverOutcome,
}

fn finish_recording() -> (CaptureState, Vec<SideEffect>) {
    (
        CaptureState::Finished,
        vec![
            SideEffect::StopRecording,
            SideEffect::MarkRecorded,
            SideEffect::ReleaseAll,
            SideEffect::EmitUi(UiUpdate::ShowFinished),
            SideEffect::GenerateThumbnail,
        ],
    )
}

fn terminate(outcome: Outcome, stop_first: bool) -> (CaptureState, Vec<SideEffect>) {
    let mut effects = Vec::with_capacity(3);
    if stop_first {
        effects.push(SideEffect::StopRecording);
    }
    effects.push(SideEffect::ReleaseAll);
    effects.push(SideEffect::DeliverOutcome);
    (CaptureState::Terminated(outcome), effects)
}

pub fn transition(
    state: CaptureState,
    event: ControlEvent,
    session: &Session,
) -> (CaptureState, Vec<SideEffect>) {
    match (&state, event) {
        (CaptureState::Terminated(_), _) => (state, vec![]),

        // Decline is valid from every live state and always releases first.
        (CaptureState::Recording { .. }, ControlEvent::Declined) => {
            terminate(Outcome::Cancelled, true)
        }
        (_, ControlEvent::Declined) => terminate(Outcome::Cancelled, false),

        // Idle/PreviewActive + SurfaceReady -> acquire and bind
        (CaptureState::Idle | CaptureState::PreviewActive, ControlEvent::SurfaceReady) => {
            (state, vec![SideEffect::StartPreview])
        }

        // Geometry before any preview ran doubles as the first bind; after a
        // suspend we wait for the surface to be recreated instead.
        (CaptureState::Idle, ControlEvent::SurfaceChanged) if !session.preview_has_run => {
            (state, vec![SideEffect::StartPreview])
        }

        (CaptureState::Idle, ControlEvent::PreviewStarted) => (
            CaptureState::PreviewActive,
            vec![SideEffect::EmitUi(UiUpdate::ShowIdle)],
        ),
        (CaptureState::PreviewActive, ControlEvent::PreviewStarted) => (state, vec![]),

        (
            CaptureState::Idle | CaptureState::PreviewActive,
            ControlEvent::PreviewFailed { message },
        ) => terminate(Outcome::Error(message), false),

        (CaptureState::PreviewActive, ControlEvent::SurfaceChanged) => {
            (state, vec![SideEffect::ReconfigurePreview])
        }
        // Preview already ran; a failed restart leaves the session usable.
        (CaptureState::PreviewActive, ControlEvent::PreviewReconfigureFailed) => (state, vec![]),

        // Hardware is never held across a suspend or without a surface.
        (
            CaptureState::Idle | CaptureState::PreviewActive,
            ControlEvent::SurfaceDestroyed | ControlEvent::Suspended,
        ) => (
            CaptureState::Idle,
            vec![SideEffect::ReleaseAll, SideEffect::EmitUi(UiUpdate::ShowIdle)],
        ),

        (CaptureState::PreviewActive, ControlEvent::RecordRequested) => {
            (state, vec![SideEffect::StartRecording])
        }
        (CaptureState::PreviewActive, ControlEvent::RecordingStarted) => (
            CaptureState::Recording {
                started_at: Instant::now(),
            },
            vec![SideEffect::EmitUi(UiUpdate::ShowRecording)],
        ),
        // Stay in preview so the user can retry.
        (CaptureState::PreviewActive, ControlEvent::RecordingFailed) => {
            (state, vec![SideEffect::ReleaseRecorder])
        }

        (
            CaptureState::Recording { .. },
            ControlEvent::StopRequested | ControlEvent::SurfaceDestroyed | ControlEvent::Suspended,
        ) => finish_recording(),

        (CaptureState::Finished, ControlEvent::Accepted) => {
            terminate(Outcome::Completed(session.output_path.clone()), false)
        }

        _ => (state, vec![]),
    }
}
