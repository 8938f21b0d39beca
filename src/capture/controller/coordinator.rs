//! CaptureController - single owner of a capture session.
//!
//! The controller owns the output target, the camera session and the recorder
//! session, and is the only code that touches them. Every host event goes
//! through `dispatch`, which runs the pure state machine and executes the
//! resulting side effects before returning. Effects that talk to hardware
//! report back as follow-up events, processed in the same call.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use serde::Serialize;
use tokio::sync::oneshot;

use super::state::{transition, CaptureState, ControlEvent, Session, SideEffect};
use crate::capture::errors::{CaptureError, CaptureResult};
use crate::capture::hardware::{CameraBackend, HardwareSession, HardwareState};
use crate::capture::output::OutputTarget;
use crate::capture::persistence::SavedSession;
use crate::capture::recorder::{RecorderBackend, RecorderSession, RecorderState};
use crate::capture::thumbnail::ThumbnailGenerator;
use crate::capture::types::{
    LaunchRequest, Outcome, Phase, PixelFormat, PreviewParams, RecorderConfig, Surface, UiUpdate,
};
use crate::capture::UiSink;
use crate::core::settings::CaptureSettings;
use crate::shared::paths::get_movies_dir;

/// Events a host delivers to the controller.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// The preview surface exists. The host keeps the `Arc`; the controller
    /// only holds a weak reference.
    SurfaceCreated(Arc<Surface>),
    SurfaceChanged {
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
    },
    SurfaceDestroyed,
    Record,
    Stop,
    Accept,
    Decline,
    Suspend,
}

/// Collaborators a controller is built from.
pub struct CaptureDeps {
    pub camera: Box<dyn CameraBackend>,
    pub recorder: Box<dyn RecorderBackend>,
    pub ui: Box<dyn UiSink>,
    pub thumbnailer: Option<Box<dyn ThumbnailGenerator>>,
    pub config: RecorderConfig,
    pub preview_params: PreviewParams,
    pub movies_dir: Option<PathBuf>,
}

impl CaptureDeps {
    pub fn new(
        camera: Box<dyn CameraBackend>,
        recorder: Box<dyn RecorderBackend>,
        ui: Box<dyn UiSink>,
    ) -> Self {
        Self {
            camera,
            recorder,
            ui,
            thumbnailer: None,
            config: RecorderConfig::default(),
            preview_params: PreviewParams::default(),
            movies_dir: get_movies_dir(),
        }
    }

    /// Takes the recorder configuration and movies directory from user
    /// settings.
    pub fn with_settings(mut self, settings: &CaptureSettings) -> Self {
        self.config = settings.to_recorder_config();
        self.movies_dir = settings.movies_dir();
        self
    }

    pub fn with_config(mut self, config: RecorderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_thumbnailer(mut self, thumbnailer: Box<dyn ThumbnailGenerator>) -> Self {
        self.thumbnailer = Some(thumbnailer);
        self
    }

    pub fn with_movies_dir(mut self, movies_dir: Option<PathBuf>) -> Self {
        self.movies_dir = movies_dir;
        self
    }

    pub fn with_preview_params(mut self, preview_params: PreviewParams) -> Self {
        self.preview_params = preview_params;
        self
    }
}

/// Snapshot of a controller for hosts and status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub state: String,
    pub phase: Option<Phase>,
    pub output_path: String,
    pub has_recorded_artifact: bool,
    pub elapsed_seconds: Option<f64>,
    pub outcome: Option<Outcome>,
}

pub struct CaptureController {
    state: CaptureState,
    session: Session,
    output: OutputTarget,
    recorder: RecorderSession,
    hardware: HardwareSession,
    config: RecorderConfig,
    surface: Option<Weak<Surface>>,
    geometry: Option<(u32, u32, PixelFormat)>,
    ui: Box<dyn UiSink>,
    thumbnailer: Option<Box<dyn ThumbnailGenerator>>,
    outcome_tx: Option<oneshot::Sender<Outcome>>,
}

impl CaptureController {
    /// Starts a session. The receiver yields the session's single outcome.
    ///
    /// If the output path cannot be resolved the controller is returned
    /// already terminated with an error outcome.
    pub fn launch(
        request: LaunchRequest,
        mut deps: CaptureDeps,
    ) -> (Self, oneshot::Receiver<Outcome>) {
        let output =
            OutputTarget::with_movies_dir(deps.movies_dir.take(), deps.config.output_format);
        let (mut controller, outcome_rx) = Self::assemble(deps, output);

        match controller.output.resolve(request.output_path.as_deref()) {
            Ok(path) => {
                tracing::info!(target: "capture", "[CONTROLLER] Session launched, output {}", path);
                controller.session.output_path = path;
            }
            Err(e) => {
                tracing::error!(target: "capture", "[CONTROLLER] Failed to resolve output: {}", e);
                controller.state = CaptureState::Terminated(Outcome::Error(e.to_string()));
                controller.deliver_outcome();
            }
        }

        (controller, outcome_rx)
    }

    /// Recreates a session from saved state. A session that had already
    /// recorded resumes in `Finished` without touching the camera.
    pub fn restore(saved: &SavedSession, deps: CaptureDeps) -> (Self, oneshot::Receiver<Outcome>) {
        if !saved.has_recorded_artifact {
            let output_path = (!saved.output_path.is_empty()).then(|| saved.output_path.clone());
            return Self::launch(LaunchRequest { output_path }, deps);
        }

        let output = OutputTarget::restored(saved.output_path.clone(), deps.config.output_format);
        let (mut controller, outcome_rx) = Self::assemble(deps, output);

        if saved.output_path.is_empty() {
            let error =
                CaptureError::PathGeneration("restored session has no output path".to_string());
            tracing::error!(target: "capture", "[CONTROLLER] {}", error);
            controller.state = CaptureState::Terminated(Outcome::Error(error.to_string()));
            controller.deliver_outcome();
            return (controller, outcome_rx);
        }

        tracing::info!(
            target: "capture",
            "[CONTROLLER] Restored finished session for {}",
            saved.output_path
        );
        controller.session.output_path = saved.output_path.clone();
        controller.session.has_recorded_artifact = true;
        controller.session.phase = Phase::Finished;
        controller.state = CaptureState::Finished;
        controller.ui.show(UiUpdate::ShowFinished);

        (controller, outcome_rx)
    }

    fn assemble(deps: CaptureDeps, output: OutputTarget) -> (Self, oneshot::Receiver<Outcome>) {
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let controller = Self {
            state: CaptureState::Idle,
            session: Session::default(),
            output,
            recorder: RecorderSession::new(deps.recorder),
            hardware: HardwareSession::with_preview_params(deps.camera, deps.preview_params),
            config: deps.config,
            surface: None,
            geometry: None,
            ui: deps.ui,
            thumbnailer: deps.thumbnailer,
            outcome_tx: Some(outcome_tx),
        };

        (controller, outcome_rx)
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn phase(&self) -> Option<Phase> {
        self.state.phase()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.state.outcome()
    }

    pub fn output_target(&self) -> &OutputTarget {
        &self.output
    }

    pub fn hardware_state(&self) -> HardwareState {
        self.hardware.state()
    }

    pub fn recorder_state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn saved_state(&self) -> SavedSession {
        SavedSession {
            has_recorded_artifact: self.session.has_recorded_artifact,
            output_path: self.session.output_path.clone(),
        }
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            state: self.state.name().to_string(),
            phase: self.state.phase(),
            output_path: self.session.output_path.clone(),
            has_recorded_artifact: self.session.has_recorded_artifact,
            elapsed_seconds: self.state.elapsed().map(|d| d.as_secs_f64()),
            outcome: self.state.outcome().cloned(),
        }
    }

    /// Processes one host event to completion.
    ///
    /// Commands that are not valid in the current state return
    /// `CommandRejected` and change nothing. A failed record attempt returns
    /// its error and leaves the session in preview.
    pub fn dispatch(&mut self, event: CaptureEvent) -> CaptureResult<()> {
        let control = self.accept(event);
        let command = control.is_user_command().then(|| control.name());

        let mut queue = VecDeque::new();
        let mut failure = None;

        if !self.step(control, &mut queue, &mut failure) {
            if let Some(command) = command {
                let state = self.state.name();
                tracing::warn!(
                    target: "capture",
                    "[CONTROLLER] Rejected {} while {}",
                    command,
                    state
                );
                return Err(CaptureError::CommandRejected { command, state });
            }
        }

        while let Some(follow_up) = queue.pop_front() {
            self.step(follow_up, &mut queue, &mut failure);
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn accept(&mut self, event: CaptureEvent) -> ControlEvent {
        match event {
            CaptureEvent::SurfaceCreated(surface) => {
                self.surface = Some(Arc::downgrade(&surface));
                ControlEvent::SurfaceReady
            }
            CaptureEvent::SurfaceChanged {
                width,
                height,
                pixel_format,
            } => {
                self.geometry = Some((width, height, pixel_format));
                ControlEvent::SurfaceChanged
            }
            CaptureEvent::SurfaceDestroyed => {
                self.surface = None;
                ControlEvent::SurfaceDestroyed
            }
            CaptureEvent::Record => ControlEvent::RecordRequested,
            CaptureEvent::Stop => ControlEvent::StopRequested,
            CaptureEvent::Accept => ControlEvent::Accepted,
            CaptureEvent::Decline => ControlEvent::Declined,
            CaptureEvent::Suspend => ControlEvent::Suspended,
        }
    }

    /// Runs one transition and its effects. Returns false if the event had no effect.
    fn step(
        &mut self,
        event: ControlEvent,
        queue: &mut VecDeque<ControlEvent>,
        failure: &mut Option<CaptureError>,
    ) -> bool {
        let from = self.state.name();
        let name = event.name();
        let (next, effects) = transition(self.state.clone(), event, &self.session);

        if effects.is_empty() {
            tracing::debug!(target: "capture", "[CONTROLLER] Ignored {} while {}", name, from);
            self.state = next;
            return false;
        }

        tracing::debug!(
            target: "capture",
            "[CONTROLLER] {} while {} -> {}",
            name,
            from,
            next.name()
        );
        self.state = next;
        if let Some(phase) = self.state.phase() {
            self.session.phase = phase;
        }

        for effect in effects {
            if let Some(follow_up) = self.execute_effect(effect, failure) {
                queue.push_back(follow_up);
            }
        }
        true
    }

    fn execute_effect(
        &mut self,
        effect: SideEffect,
        failure: &mut Option<CaptureError>,
    ) -> Option<ControlEvent> {
        match effect {
            SideEffect::StartPreview => match self.start_preview() {
                Ok(()) => {
                    self.session.preview_has_run = true;
                    Some(ControlEvent::PreviewStarted)
                }
                Err(e) => {
                    tracing::error!(target: "capture", "[CONTROLLER] Preview failed: {}", e);
                    let message = e.to_string();
                    *failure = Some(e);
                    Some(ControlEvent::PreviewFailed { message })
                }
            },
            SideEffect::ReconfigurePreview => {
                let (width, height, pixel_format) = self.geometry.unwrap_or_else(|| {
                    let params = PreviewParams::default();
                    (params.width, params.height, params.pixel_format)
                });
                match self.hardware.reconfigure_preview(width, height, pixel_format) {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!(
                            target: "capture",
                            "[CONTROLLER] Preview restart failed: {}",
                            e
                        );
                        Some(ControlEvent::PreviewReconfigureFailed)
                    }
                }
            }
            SideEffect::StartRecording => match self.start_recording() {
                Ok(()) => Some(ControlEvent::RecordingStarted),
                Err(e) => {
                    tracing::warn!(target: "capture", "[CONTROLLER] Record failed: {}", e);
                    *failure = Some(e);
                    Some(ControlEvent::RecordingFailed)
                }
            },
            SideEffect::StopRecording => {
                if !self.recorder.stop() {
                    tracing::warn!(
                        target: "capture",
                        "[CONTROLLER] Recorder did not stop cleanly, keeping artifact"
                    );
                }
                None
            }
            SideEffect::MarkRecorded => {
                self.session.has_recorded_artifact = true;
                None
            }
            SideEffect::ReleaseRecorder => {
                self.recorder.release();
                None
            }
            SideEffect::ReleaseAll => {
                self.release_all();
                None
            }
            SideEffect::EmitUi(update) => {
                self.ui.show(update);
                None
            }
            SideEffect::GenerateThumbnail => {
                self.generate_thumbnail();
                None
            }
            SideEffect::DeliverOutcome => {
                self.deliver_outcome();
                None
            }
        }
    }

    fn live_surface(&self) -> CaptureResult<Arc<Surface>> {
        self.surface
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(CaptureError::PreviewAttachFailed)
    }

    fn start_preview(&mut self) -> CaptureResult<()> {
        let surface = self.live_surface()?;
        self.hardware.acquire()?;
        self.hardware.bind(&surface)
    }

    fn start_recording(&mut self) -> CaptureResult<()> {
        let surface = self.live_surface()?;
        self.hardware.unlock_for_recording()?;
        self.recorder
            .configure(&self.config, &self.hardware, &self.session.output_path, &surface)?;
        self.recorder.prepare()?;
        self.recorder.start()
    }

    /// Frees recorder and camera. Later calls are no-ops.
    fn release_all(&mut self) -> bool {
        let recorder = self.recorder.release();
        let camera = self.hardware.stop_preview_and_release();

        if recorder || camera {
            tracing::info!(target: "capture", "[CONTROLLER] Released capture resources");
        }
        recorder || camera
    }

    fn generate_thumbnail(&self) {
        let Some(thumbnailer) = self.thumbnailer.as_ref() else {
            return;
        };

        match thumbnailer.generate(Path::new(&self.session.output_path)) {
            Ok(thumbnail) => {
                tracing::debug!(target: "capture", "[THUMBNAIL] Ready at {:?}", thumbnail.path);
                self.ui.thumbnail_ready(&thumbnail);
            }
            Err(e) => {
                tracing::warn!(
                    target: "capture",
                    "[THUMBNAIL] Failed for {}: {}",
                    self.session.output_path,
                    e
                );
            }
        }
    }

    fn deliver_outcome(&mut self) {
        let Some(outcome) = self.state.outcome().cloned() else {
            return;
        };
        let Some(outcome_tx) = self.outcome_tx.take() else {
            return;
        };

        tracing::info!(target: "capture", "[CONTROLLER] Session ended: {:?}", outcome);
        if outcome_tx.send(outcome).is_err() {
            tracing::debug!(target: "capture", "[CONTROLLER] Outcome receiver dropped");
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if self.state.is_terminated() {
            return;
        }

        tracing::warn!(
            target: "capture",
            "[CONTROLLER] Dropped while {}, cancelling",
            self.state.name()
        );
        if matches!(self.state, CaptureState::Recording { .. }) {
            self.recorder.stop();
        }
        self.release_all();
        self.state = CaptureState::Terminated(Outcome::Cancelled);
        self.deliver_outcome();
    }
}
