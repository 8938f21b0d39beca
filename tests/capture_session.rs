//! End-to-end capture sessions against the simulated camera and recorder.
//!
//! Each test drives a controller through host events and checks the single
//! outcome it produces, the UI updates it emitted and how many times the
//! hardware was opened and released.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use landscape_capture::capture::errors::{CaptureError, RecorderError, ThumbnailError};
use landscape_capture::capture::hardware::{DeviceLease, HardwareState, SimulatedCamera};
use landscape_capture::capture::recorder::{RecorderState, SimulatedRecorder};
use landscape_capture::capture::thumbnail::{Thumbnail, ThumbnailGenerator};
use landscape_capture::capture::types::{
    OutputFormat, PixelFormat, RESULT_CANCELED, RESULT_ERROR, RESULT_OK,
};
use landscape_capture::core::settings::load_settings_from;
use landscape_capture::{
    CaptureController, CaptureDeps, CaptureEvent, ControllerHandle, LaunchRequest, Outcome, Phase,
    SavedSession, Surface, UiSink, UiUpdate,
};
use tokio::sync::oneshot;

#[derive(Clone, Default)]
struct RecordingUi {
    updates: Arc<Mutex<Vec<UiUpdate>>>,
    thumbnails: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingUi {
    fn updates(&self) -> Vec<UiUpdate> {
        self.updates.lock().unwrap().clone()
    }

    fn thumbnails(&self) -> Vec<PathBuf> {
        self.thumbnails.lock().unwrap().clone()
    }
}

impl UiSink for RecordingUi {
    fn show(&self, update: UiUpdate) {
        self.updates.lock().unwrap().push(update);
    }

    fn thumbnail_ready(&self, thumbnail: &Thumbnail) {
        self.thumbnails.lock().unwrap().push(thumbnail.path.clone());
    }
}

#[derive(Clone, Default)]
struct StubThumbnailer {
    fail: bool,
    requests: Arc<Mutex<Vec<PathBuf>>>,
}

impl ThumbnailGenerator for StubThumbnailer {
    fn generate(&self, video_path: &Path) -> Result<Thumbnail, ThumbnailError> {
        self.requests.lock().unwrap().push(video_path.to_path_buf());
        if self.fail {
            return Err(ThumbnailError::Generation("decoder missing".to_string()));
        }
        Ok(Thumbnail {
            path: video_path.with_extension("png"),
        })
    }
}

struct Rig {
    camera: SimulatedCamera,
    recorder: SimulatedRecorder,
    ui: RecordingUi,
    surface: Arc<Surface>,
}

impl Rig {
    fn new() -> Self {
        Self::with_camera(SimulatedCamera::new())
    }

    fn with_camera(camera: SimulatedCamera) -> Self {
        Self {
            camera,
            recorder: SimulatedRecorder::new(),
            ui: RecordingUi::default(),
            surface: Arc::new(Surface::new("preview")),
        }
    }

    fn deps(&self) -> CaptureDeps {
        CaptureDeps::new(
            Box::new(self.camera.clone()),
            Box::new(self.recorder.clone()),
            Box::new(self.ui.clone()),
        )
        .with_movies_dir(None)
    }

    fn launch(&self, path: &str) -> (CaptureController, oneshot::Receiver<Outcome>) {
        CaptureController::launch(LaunchRequest::with_output(path), self.deps())
    }

    fn surface_created(&self) -> CaptureEvent {
        CaptureEvent::SurfaceCreated(self.surface.clone())
    }
}

fn recording_controller(rig: &Rig) -> (CaptureController, oneshot::Receiver<Outcome>) {
    let (mut controller, outcome_rx) = rig.launch("/tmp/out.mp4");
    controller.dispatch(rig.surface_created()).unwrap();
    controller.dispatch(CaptureEvent::Record).unwrap();
    assert_eq!(controller.phase(), Some(Phase::Recording));
    (controller, outcome_rx)
}

// =============================================================================
// Happy path
// =============================================================================

#[test]
fn test_record_stop_accept_completes_with_path() {
    let rig = Rig::new();
    let (mut controller, mut outcome_rx) = recording_controller(&rig);

    controller.dispatch(CaptureEvent::Stop).unwrap();
    assert_eq!(controller.phase(), Some(Phase::Finished));
    assert!(controller.session().has_recorded_artifact);

    controller.dispatch(CaptureEvent::Accept).unwrap();

    let outcome = outcome_rx.try_recv().unwrap();
    assert_eq!(outcome, Outcome::Completed("/tmp/out.mp4".to_string()));
    assert_eq!(outcome.result_code(), RESULT_OK);

    assert_eq!(
        rig.ui.updates(),
        vec![UiUpdate::ShowIdle, UiUpdate::ShowRecording, UiUpdate::ShowFinished]
    );
    assert_eq!(rig.camera.probe().releases, 1);
    assert_eq!(rig.recorder.probe().releases, 1);
    assert_eq!(rig.recorder.probe().output_file.as_deref(), Some("/tmp/out.mp4"));
    assert!(!DeviceLease::is_held(rig.camera.id()));
}

#[test]
fn test_generated_path_lands_in_movies_dir() {
    let movies = tempfile::tempdir().unwrap();
    let rig = Rig::new();
    let deps = rig.deps().with_movies_dir(Some(movies.path().join("Movies")));

    let (controller, _outcome_rx) = CaptureController::launch(LaunchRequest::default(), deps);

    let path = PathBuf::from(&controller.session().output_path);
    assert_eq!(path.parent(), Some(movies.path().join("Movies").as_path()));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("Video_"));
    assert!(name.ends_with(".mp4"));
}

#[test]
fn test_settings_drive_config_and_movies_dir() {
    let movies = tempfile::tempdir().unwrap();
    let settings_path = movies.path().join("settings.json");
    std::fs::write(
        &settings_path,
        format!(
            r#"{{"outputFormat": "threegpp", "maxDurationMs": 5000, "moviesDir": {:?}}}"#,
            movies.path().join("Clips")
        ),
    )
    .unwrap();
    let settings = load_settings_from(&settings_path);

    let rig = Rig::new();
    let deps = rig.deps().with_settings(&settings);
    assert_eq!(deps.config, settings.to_recorder_config());
    assert_eq!(deps.config.output_format, OutputFormat::ThreeGpp);
    assert_eq!(deps.config.max_duration_ms, 5000);

    let (mut controller, _outcome_rx) = CaptureController::launch(LaunchRequest::default(), deps);
    let path = PathBuf::from(&controller.session().output_path);
    assert_eq!(path.parent(), Some(movies.path().join("Clips").as_path()));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("3gp"));

    controller.dispatch(rig.surface_created()).unwrap();
    controller.dispatch(CaptureEvent::Record).unwrap();
    assert_eq!(
        rig.recorder.probe().output_file.as_deref(),
        Some(controller.session().output_path.as_str())
    );
}

// =============================================================================
// Acquisition failures
// =============================================================================

#[test]
fn test_missing_camera_terminates_with_error() {
    let movies = tempfile::tempdir().unwrap();
    let rig = Rig::with_camera(SimulatedCamera::absent());
    let deps = rig.deps().with_movies_dir(Some(movies.path().to_path_buf()));
    let (mut controller, mut outcome_rx) =
        CaptureController::launch(LaunchRequest::default(), deps);

    let result = controller.dispatch(rig.surface_created());
    assert_eq!(result, Err(CaptureError::NoDevice));

    let outcome = outcome_rx.try_recv().unwrap();
    assert!(outcome.error_message().unwrap().contains("camera"));
    assert_eq!(outcome.result_code(), RESULT_ERROR);
    assert_eq!(rig.camera.probe().opens, 0);
    assert!(rig.ui.updates().is_empty());
}

#[test]
fn test_busy_camera_never_reaches_preview() {
    let rig = Rig::with_camera(SimulatedCamera::busy());
    let (mut controller, mut outcome_rx) = rig.launch("/tmp/out.mp4");

    assert_eq!(controller.dispatch(rig.surface_created()), Err(CaptureError::DeviceBusy));
    assert!(controller.state().is_terminated());
    assert_eq!(
        outcome_rx.try_recv().unwrap(),
        Outcome::Error("Camera is used by another process".to_string())
    );
    assert!(!rig.ui.updates().contains(&UiUpdate::ShowIdle));
}

#[test]
fn test_second_controller_on_held_camera_is_busy() {
    let first = Rig::new();
    let second = Rig::with_camera(first.camera.clone());

    let (mut holder, _holder_rx) = first.launch("/tmp/a.mp4");
    holder.dispatch(first.surface_created()).unwrap();

    let (mut contender, mut contender_rx) = second.launch("/tmp/b.mp4");
    assert_eq!(contender.dispatch(second.surface_created()), Err(CaptureError::DeviceBusy));
    assert_eq!(contender_rx.try_recv().unwrap().result_code(), RESULT_ERROR);
    assert_eq!(holder.hardware_state(), HardwareState::Bound);
}

#[test]
fn test_rejected_preview_params_terminate() {
    let rig = Rig::new();
    rig.camera.script(|s| s.reject_preview_params = true);
    let (mut controller, mut outcome_rx) = rig.launch("/tmp/out.mp4");

    assert_eq!(
        controller.dispatch(rig.surface_created()),
        Err(CaptureError::InvalidPreviewParams)
    );
    assert_eq!(
        outcome_rx.try_recv().unwrap(),
        Outcome::Error("Invalid parameters set to camera preview".to_string())
    );
    assert_eq!(rig.camera.probe().releases, 1);
}

// =============================================================================
// Command validity
// =============================================================================

#[test]
fn test_record_while_recording_is_rejected() {
    let rig = Rig::new();
    let (mut controller, _outcome_rx) = recording_controller(&rig);

    let result = controller.dispatch(CaptureEvent::Record);
    assert_eq!(
        result,
        Err(CaptureError::CommandRejected {
            command: "record",
            state: "recording"
        })
    );
    assert_eq!(controller.phase(), Some(Phase::Recording));
    assert_eq!(rig.recorder.probe().created, 1);
}

#[test]
fn test_stop_outside_recording_is_rejected() {
    let rig = Rig::new();
    let (mut controller, _outcome_rx) = rig.launch("/tmp/out.mp4");
    controller.dispatch(rig.surface_created()).unwrap();

    assert!(matches!(
        controller.dispatch(CaptureEvent::Stop),
        Err(CaptureError::CommandRejected { command: "stop", .. })
    ));
    assert_eq!(controller.phase(), Some(Phase::PreviewActive));
}

#[test]
fn test_commands_after_termination_are_rejected() {
    let rig = Rig::new();
    let (mut controller, mut outcome_rx) = rig.launch("/tmp/out.mp4");

    controller.dispatch(CaptureEvent::Decline).unwrap();
    assert_eq!(outcome_rx.try_recv().unwrap(), Outcome::Cancelled);

    assert!(controller.dispatch(CaptureEvent::Decline).is_err());
    assert!(controller.dispatch(CaptureEvent::Accept).is_err());
    assert_eq!(controller.outcome(), Some(&Outcome::Cancelled));
}

// =============================================================================
// Surface lifecycle and suspend
// =============================================================================

#[test]
fn test_surface_destroyed_while_recording_releases_once() {
    let rig = Rig::new();
    let (mut controller, mut outcome_rx) = recording_controller(&rig);

    controller.dispatch(CaptureEvent::SurfaceDestroyed).unwrap();
    assert_eq!(controller.phase(), Some(Phase::Finished));
    assert_eq!(rig.recorder.probe().stops, 1);

    assert!(controller.dispatch(CaptureEvent::Stop).is_err());
    controller.dispatch(CaptureEvent::SurfaceDestroyed).unwrap();

    controller.dispatch(CaptureEvent::Accept).unwrap();
    assert_eq!(
        outcome_rx.try_recv().unwrap(),
        Outcome::Completed("/tmp/out.mp4".to_string())
    );
    assert_eq!(rig.camera.probe().releases, 1);
    assert_eq!(rig.recorder.probe().releases, 1);
    assert_eq!(rig.recorder.probe().stops, 1);
}

#[test]
fn test_suspend_while_recording_finishes() {
    let rig = Rig::new();
    let (mut controller, _outcome_rx) = recording_controller(&rig);

    controller.dispatch(CaptureEvent::Suspend).unwrap();

    assert_eq!(controller.phase(), Some(Phase::Finished));
    assert_eq!(controller.hardware_state(), HardwareState::Released);
    assert_eq!(controller.recorder_state(), RecorderState::Released);
    assert!(controller.saved_state().has_recorded_artifact);
}

#[test]
fn test_suspend_in_preview_releases_and_resumes() {
    let rig = Rig::new();
    let (mut controller, _outcome_rx) = rig.launch("/tmp/out.mp4");
    controller.dispatch(rig.surface_created()).unwrap();

    controller.dispatch(CaptureEvent::Suspend).unwrap();
    assert_eq!(controller.phase(), Some(Phase::Idle));
    assert_eq!(rig.camera.probe().releases, 1);
    assert!(!DeviceLease::is_held(rig.camera.id()));

    controller.dispatch(rig.surface_created()).unwrap();
    assert_eq!(controller.phase(), Some(Phase::PreviewActive));
    assert_eq!(rig.camera.probe().opens, 2);
    assert_eq!(controller.session().output_path, "/tmp/out.mp4");
}

#[test]
fn test_surface_change_reconfigures_preview() {
    let rig = Rig::new();
    let (mut controller, _outcome_rx) = rig.launch("/tmp/out.mp4");
    controller.dispatch(rig.surface_created()).unwrap();

    controller
        .dispatch(CaptureEvent::SurfaceChanged {
            width: 1280,
            height: 720,
            pixel_format: PixelFormat::Nv21,
        })
        .unwrap();
    assert_eq!(rig.camera.probe().preview_starts, 2);

    // Preview already ran, so a failed restart keeps the session alive.
    rig.camera.script(|s| s.reject_preview_params = true);
    controller
        .dispatch(CaptureEvent::SurfaceChanged {
            width: 800,
            height: 600,
            pixel_format: PixelFormat::Nv21,
        })
        .unwrap();
    assert_eq!(controller.phase(), Some(Phase::PreviewActive));
    assert!(!controller.state().is_terminated());
}

#[test]
fn test_geometry_before_first_preview_failure_terminates() {
    let rig = Rig::new();
    let (mut controller, mut outcome_rx) = rig.launch("/tmp/out.mp4");

    // No surface was ever handed over, so the first bind cannot attach.
    let result = controller.dispatch(CaptureEvent::SurfaceChanged {
        width: 1280,
        height: 720,
        pixel_format: PixelFormat::Nv21,
    });

    assert_eq!(result, Err(CaptureError::PreviewAttachFailed));
    assert!(controller.state().is_terminated());
    assert_eq!(
        outcome_rx.try_recv().unwrap(),
        Outcome::Error("Unable to connect camera to preview".to_string())
    );
    assert_ne!(controller.hardware_state(), HardwareState::Bound);
    assert_ne!(controller.hardware_state(), HardwareState::Acquired);
    assert_eq!(controller.recorder_state(), RecorderState::Unconfigured);
    assert!(!DeviceLease::is_held(rig.camera.id()));
    assert_eq!(rig.camera.probe().preview_starts, 0);
}

// =============================================================================
// Decline
// =============================================================================

#[test]
fn test_decline_while_recording_stops_and_cancels() {
    let rig = Rig::new();
    let (mut controller, mut outcome_rx) = recording_controller(&rig);

    controller.dispatch(CaptureEvent::Decline).unwrap();

    let outcome = outcome_rx.try_recv().unwrap();
    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(outcome.result_code(), RESULT_CANCELED);
    assert_eq!(rig.recorder.probe().stops, 1);
    assert_eq!(rig.recorder.probe().releases, 1);
    assert_eq!(rig.camera.probe().releases, 1);
}

#[test]
fn test_decline_from_finished_cancels() {
    let rig = Rig::new();
    let (mut controller, mut outcome_rx) = recording_controller(&rig);
    controller.dispatch(CaptureEvent::Stop).unwrap();

    controller.dispatch(CaptureEvent::Decline).unwrap();
    assert_eq!(outcome_rx.try_recv().unwrap(), Outcome::Cancelled);
    assert_eq!(rig.camera.probe().releases, 1);
}

#[test]
fn test_dropping_controller_mid_recording_cancels() {
    let rig = Rig::new();
    let (controller, mut outcome_rx) = recording_controller(&rig);

    drop(controller);

    assert_eq!(outcome_rx.try_recv().unwrap(), Outcome::Cancelled);
    assert_eq!(rig.recorder.probe().stops, 1);
    assert_eq!(rig.camera.probe().releases, 1);
    assert!(!DeviceLease::is_held(rig.camera.id()));
}

// =============================================================================
// Record failures
// =============================================================================

#[test]
fn test_start_failure_keeps_preview_and_allows_retry() {
    let rig = Rig::new();
    rig.recorder.script(|s| s.fail_start = true);
    let (mut controller, mut outcome_rx) = rig.launch("/tmp/out.mp4");
    controller.dispatch(rig.surface_created()).unwrap();

    let result = controller.dispatch(CaptureEvent::Record);
    assert!(matches!(result, Err(CaptureError::StartFailed(_))));
    assert_eq!(controller.phase(), Some(Phase::PreviewActive));
    assert!(outcome_rx.try_recv().is_err());

    rig.recorder.script(|s| s.fail_start = false);
    controller.dispatch(CaptureEvent::Record).unwrap();

    assert_eq!(controller.phase(), Some(Phase::Recording));
    assert_eq!(rig.recorder.probe().created, 2);
    assert_eq!(controller.session().output_path, "/tmp/out.mp4");
}

#[test]
fn test_prepare_io_failure_is_reported() {
    let rig = Rig::new();
    rig.recorder
        .script(|s| s.fail_prepare = Some(RecorderError::Io("read-only filesystem".to_string())));
    let (mut controller, _outcome_rx) = rig.launch("/tmp/out.mp4");
    controller.dispatch(rig.surface_created()).unwrap();

    assert!(matches!(
        controller.dispatch(CaptureEvent::Record),
        Err(CaptureError::PrepareIOFailed(_))
    ));
    assert_eq!(controller.recorder_state(), RecorderState::Released);
    assert_eq!(controller.phase(), Some(Phase::PreviewActive));
}

#[test]
fn test_unlock_contention_is_device_busy() {
    let rig = Rig::new();
    rig.camera
        .script(|s| s.fail_unlock = Some(landscape_capture::capture::errors::HardwareError::Busy));
    let (mut controller, _outcome_rx) = rig.launch("/tmp/out.mp4");
    controller.dispatch(rig.surface_created()).unwrap();

    assert_eq!(controller.dispatch(CaptureEvent::Record), Err(CaptureError::DeviceBusy));
    assert_eq!(controller.phase(), Some(Phase::PreviewActive));
    assert_eq!(rig.recorder.probe().created, 0);
}

// =============================================================================
// Thumbnails
// =============================================================================

#[test]
fn test_finished_requests_thumbnail() {
    let rig = Rig::new();
    let thumbnailer = StubThumbnailer::default();
    let deps = rig.deps().with_thumbnailer(Box::new(thumbnailer.clone()));
    let (mut controller, _outcome_rx) =
        CaptureController::launch(LaunchRequest::with_output("/tmp/out.mp4"), deps);

    controller.dispatch(rig.surface_created()).unwrap();
    controller.dispatch(CaptureEvent::Record).unwrap();
    controller.dispatch(CaptureEvent::Stop).unwrap();

    assert_eq!(*thumbnailer.requests.lock().unwrap(), vec![PathBuf::from("/tmp/out.mp4")]);
    assert_eq!(rig.ui.thumbnails(), vec![PathBuf::from("/tmp/out.png")]);
}

#[test]
fn test_thumbnail_failure_does_not_affect_state() {
    let rig = Rig::new();
    let thumbnailer = StubThumbnailer {
        fail: true,
        ..StubThumbnailer::default()
    };
    let deps = rig.deps().with_thumbnailer(Box::new(thumbnailer));
    let (mut controller, _outcome_rx) =
        CaptureController::launch(LaunchRequest::with_output("/tmp/out.mp4"), deps);

    controller.dispatch(rig.surface_created()).unwrap();
    controller.dispatch(CaptureEvent::Record).unwrap();
    assert_eq!(controller.dispatch(CaptureEvent::Stop), Ok(()));

    assert_eq!(controller.phase(), Some(Phase::Finished));
    assert!(rig.ui.thumbnails().is_empty());
}

// =============================================================================
// Saved state
// =============================================================================

#[test]
fn test_restore_finished_session_skips_hardware() {
    let rig = Rig::new();
    let saved = SavedSession {
        has_recorded_artifact: true,
        output_path: "/tmp/restored.mp4".to_string(),
    };

    let (mut controller, mut outcome_rx) = CaptureController::restore(&saved, rig.deps());
    assert_eq!(controller.phase(), Some(Phase::Finished));
    assert_eq!(rig.ui.updates(), vec![UiUpdate::ShowFinished]);

    controller.dispatch(rig.surface_created()).unwrap();
    assert_eq!(rig.camera.probe().opens, 0);

    controller.dispatch(CaptureEvent::Accept).unwrap();
    assert_eq!(
        outcome_rx.try_recv().unwrap(),
        Outcome::Completed("/tmp/restored.mp4".to_string())
    );
}

#[test]
fn test_restore_unrecorded_session_keeps_path() {
    let rig = Rig::new();
    let saved = SavedSession {
        has_recorded_artifact: false,
        output_path: "/tmp/pending.mp4".to_string(),
    };

    let (mut controller, _outcome_rx) = CaptureController::restore(&saved, rig.deps());
    assert_eq!(controller.phase(), Some(Phase::Idle));

    controller.dispatch(rig.surface_created()).unwrap();
    assert_eq!(controller.phase(), Some(Phase::PreviewActive));
    assert_eq!(controller.saved_state(), saved);
}

#[test]
fn test_saved_state_persists_across_restore() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("session.json");
    let rig = Rig::new();
    let (mut controller, _outcome_rx) = recording_controller(&rig);
    controller.dispatch(CaptureEvent::Stop).unwrap();

    landscape_capture::capture::persistence::save_session_to(&path, &controller.saved_state())
        .unwrap();
    drop(controller);

    let saved = landscape_capture::capture::persistence::load_session_from(&path)
        .unwrap()
        .unwrap();
    let (controller, _outcome_rx) = CaptureController::restore(&saved, rig.deps());
    assert_eq!(controller.phase(), Some(Phase::Finished));
    assert_eq!(controller.session().output_path, "/tmp/out.mp4");
}

// =============================================================================
// Controller handle
// =============================================================================

#[tokio::test]
async fn test_handle_runs_full_session() {
    let rig = Rig::new();
    let (controller, outcome_rx) = rig.launch("/tmp/out.mp4");
    let (handle, worker) = ControllerHandle::spawn(controller);

    handle.surface_created(&rig.surface).await.unwrap();
    handle.record().await.unwrap();

    let status = handle.status().await.unwrap();
    assert_eq!(status.phase, Some(Phase::Recording));
    assert!(status.elapsed_seconds.is_some());

    assert!(handle.record().await.is_err());
    handle.stop().await.unwrap();
    handle.accept().await.unwrap();

    assert_eq!(
        outcome_rx.await.unwrap(),
        Outcome::Completed("/tmp/out.mp4".to_string())
    );

    drop(handle);
    worker.join().unwrap();
    assert_eq!(rig.camera.probe().releases, 1);
}

#[tokio::test]
async fn test_dropping_every_handle_cancels_session() {
    let rig = Rig::new();
    let (controller, outcome_rx) = rig.launch("/tmp/out.mp4");
    let (handle, worker) = ControllerHandle::spawn(controller);

    handle.surface_created(&rig.surface).await.unwrap();
    let saved = handle.saved_state().await.unwrap();
    assert!(!saved.has_recorded_artifact);

    drop(handle);
    worker.join().unwrap();

    assert_eq!(outcome_rx.await.unwrap(), Outcome::Cancelled);
    assert_eq!(rig.camera.probe().releases, 1);
}
