use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};

use super::coordinator::{CaptureController, CaptureEvent, ControllerStatus};
use crate::capture::errors::{CaptureError, CaptureResult};
use crate::capture::persistence::SavedSession;
use crate::capture::types::{PixelFormat, Surface};

/// Requests sent from handles to the controller's worker thread.
enum Command {
    Dispatch {
        event: CaptureEvent,
        response_tx: oneshot::Sender<CaptureResult<()>>,
    },
    Status {
        response_tx: oneshot::Sender<ControllerStatus>,
    },
    SavedState {
        response_tx: oneshot::Sender<SavedSession>,
    },
}

/// Handle to a controller running on its own thread.
///
/// Every hardware call happens on that thread, in the order commands arrive.
/// When the last handle is dropped the worker exits and drops the controller,
/// which cancels the session if it has not ended.
#[derive(Clone)]
pub struct ControllerHandle {
    command_tx: mpsc::Sender<Command>,
}

impl ControllerHandle {
    pub fn spawn(controller: CaptureController) -> (Self, JoinHandle<()>) {
        let (command_tx, mut command_rx) = mpsc::channel::<Command>(16);

        let worker = std::thread::spawn(move || {
            let mut controller = controller;
            tracing::info!(target: "capture", "[CONTROLLER] Worker started");

            while let Some(command) = command_rx.blocking_recv() {
                match command {
                    Command::Dispatch { event, response_tx } => {
                        let _ = response_tx.send(controller.dispatch(event));
                    }
                    Command::Status { response_tx } => {
                        let _ = response_tx.send(controller.status());
                    }
                    Command::SavedState { response_tx } => {
                        let _ = response_tx.send(controller.saved_state());
                    }
                }
            }

            tracing::info!(target: "capture", "[CONTROLLER] All handles closed, shutting down");
            drop(controller);
        });

        (Self { command_tx }, worker)
    }

    pub async fn send(&self, event: CaptureEvent) -> CaptureResult<()> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Dispatch { event, response_tx })
            .await
            .map_err(|_| CaptureError::ControllerStopped)?;

        response_rx
            .await
            .map_err(|_| CaptureError::ControllerStopped)?
    }

    pub async fn surface_created(&self, surface: &Arc<Surface>) -> CaptureResult<()> {
        self.send(CaptureEvent::SurfaceCreated(surface.clone())).await
    }

    pub async fn surface_changed(
        &self,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
    ) -> CaptureResult<()> {
        self.send(CaptureEvent::SurfaceChanged {
            width,
            height,
            pixel_format,
        })
        .await
    }

    pub async fn surface_destroyed(&self) -> CaptureResult<()> {
        self.send(CaptureEvent::SurfaceDestroyed).await
    }

    pub async fn record(&self) -> CaptureResult<()> {
        self.send(CaptureEvent::Record).await
    }

    pub async fn stop(&self) -> CaptureResult<()> {
        self.send(CaptureEvent::Stop).await
    }

    pub async fn accept(&self) -> CaptureResult<()> {
        self.send(CaptureEvent::Accept).await
    }

    pub async fn decline(&self) -> CaptureResult<()> {
        self.send(CaptureEvent::Decline).await
    }

    pub async fn suspend(&self) -> CaptureResult<()> {
        self.send(CaptureEvent::Suspend).await
    }

    pub async fn status(&self) -> CaptureResult<ControllerStatus> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Status { response_tx })
            .await
            .map_err(|_| CaptureError::ControllerStopped)?;

        response_rx.await.map_err(|_| CaptureError::ControllerStopped)
    }

    pub async fn saved_state(&self) -> CaptureResult<SavedSession> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::SavedState { response_tx })
            .await
            .map_err(|_| CaptureError::ControllerStopped)?;

        response_rx.await.map_err(|_| CaptureError::ControllerStopped)
    }
}
