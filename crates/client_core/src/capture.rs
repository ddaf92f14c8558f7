use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    camera::{CameraDevice, CameraError, CameraStream},
    preview::{PreviewRegistry, PreviewRef},
    relay::{AnalyzeBackend, AnalyzeOutcome, ImageUpload},
    store::ScanStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Camera,
    Upload,
}

/// Acquires exactly one image per attempt — live capture or file selection
/// — and drives the store through `Processing` into `Result` or `Error`.
///
/// Starting a new attempt while one is in flight supersedes the old
/// preview but does not cancel the outstanding call; its late completion
/// is discarded by the attempt counter.
pub struct CaptureController {
    store: Arc<ScanStore>,
    previews: Arc<PreviewRegistry>,
    backend: Arc<dyn AnalyzeBackend>,
    camera: Arc<dyn CameraDevice>,
    inner: Mutex<ControllerState>,
}

struct ControllerState {
    mode: CaptureMode,
    stream: Option<Box<dyn CameraStream>>,
    camera_error: Option<String>,
    preview: Option<PreviewRef>,
    uploading: bool,
    last_error: Option<String>,
    attempt: u64,
}

impl CaptureController {
    pub fn new(
        store: Arc<ScanStore>,
        previews: Arc<PreviewRegistry>,
        backend: Arc<dyn AnalyzeBackend>,
        camera: Arc<dyn CameraDevice>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            previews,
            backend,
            camera,
            inner: Mutex::new(ControllerState {
                mode: CaptureMode::Camera,
                stream: None,
                camera_error: None,
                preview: None,
                uploading: false,
                last_error: None,
                attempt: 0,
            }),
        })
    }

    /// Enter the scan flow: camera screen, live stream if the device
    /// grants one, upload mode otherwise. Camera failure is not fatal.
    pub async fn enter_camera(&self) {
        self.store.reset_to_camera();
        self.start_camera_or_fallback().await;
    }

    async fn start_camera_or_fallback(&self) {
        let mut inner = self.inner.lock().await;
        inner.camera_error = None;
        inner.mode = CaptureMode::Camera;
        if let Some(stream) = inner.stream.take() {
            stream.stop();
        }
        match self.camera.open().await {
            Ok(stream) => {
                inner.stream = Some(stream);
            }
            Err(error) => {
                warn!(%error, "camera unavailable, falling back to upload");
                inner.camera_error = Some(error.to_string());
                inner.mode = CaptureMode::Upload;
            }
        }
    }

    /// Snapshot the live stream and submit the frame. A stream that has
    /// not buffered yet only produces an inline message; the store is not
    /// touched.
    pub async fn capture_frame(&self) {
        let frame = {
            let mut inner = self.inner.lock().await;
            let Some(stream) = inner.stream.as_ref() else {
                inner.last_error = Some(CameraError::NotReady.to_string());
                return;
            };
            match stream.capture_frame() {
                Ok(frame) => {
                    inner.last_error = None;
                    frame
                }
                Err(error) => {
                    inner.last_error = Some(error.to_string());
                    return;
                }
            }
        };

        let filename = format!("capture_{}.jpg", Utc::now().timestamp_millis());
        self.submit(ImageUpload {
            bytes: frame.bytes,
            filename,
            mime_type: Some(frame.mime_type),
        })
        .await;
    }

    /// Submit a user-chosen file as-is. Format policy belongs to the
    /// relay, not the client; any file is attempted.
    pub async fn select_file(
        &self,
        bytes: Vec<u8>,
        filename: impl Into<String>,
        mime_type: Option<String>,
    ) {
        self.submit(ImageUpload {
            bytes,
            filename: filename.into(),
            mime_type,
        })
        .await;
    }

    async fn submit(&self, image: ImageUpload) {
        let (preview, attempt) = {
            let mut inner = self.inner.lock().await;
            let preview = self.previews.register(image.bytes.clone());
            if let Some(superseded) = inner.preview.replace(preview.clone()) {
                self.previews.release(&superseded);
            }
            inner.attempt += 1;
            inner.uploading = true;
            inner.last_error = None;
            (preview, inner.attempt)
        };
        self.store.processing(preview.clone());

        let outcome = self.backend.analyze(image).await;

        let mut inner = self.inner.lock().await;
        if inner.attempt != attempt {
            debug!(
                attempt,
                current = inner.attempt,
                "discarding stale analysis result"
            );
            return;
        }
        inner.uploading = false;
        match outcome {
            Ok(AnalyzeOutcome::Classified(classification)) => {
                inner.last_error = None;
                self.store.done(preview, classification);
            }
            Ok(AnalyzeOutcome::Rejected { message, details }) => {
                inner.last_error = Some(message.clone());
                self.store.error(message, details, Some(preview));
            }
            Err(error) => {
                let message = error.to_string();
                inner.last_error = Some(message.clone());
                self.store.error(message, None, Some(preview));
            }
        }
    }

    /// Leave the scan flow entirely: stream stopped, preview released,
    /// store back to idle.
    pub async fn leave(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(stream) = inner.stream.take() {
            stream.stop();
        }
        if let Some(preview) = inner.preview.take() {
            self.previews.release(&preview);
        }
        inner.last_error = None;
        inner.camera_error = None;
        self.store.reset();
    }

    pub async fn switch_mode(&self, mode: CaptureMode) {
        match mode {
            CaptureMode::Upload => {
                let mut inner = self.inner.lock().await;
                if let Some(stream) = inner.stream.take() {
                    stream.stop();
                }
                inner.mode = CaptureMode::Upload;
                inner.camera_error = None;
                inner.last_error = None;
            }
            CaptureMode::Camera => {
                {
                    let mut inner = self.inner.lock().await;
                    // returning to the live view drops the stale preview
                    if let Some(preview) = inner.preview.take() {
                        self.previews.release(&preview);
                    }
                    inner.last_error = None;
                }
                self.start_camera_or_fallback().await;
            }
        }
    }

    pub async fn mode(&self) -> CaptureMode {
        self.inner.lock().await.mode
    }

    pub async fn camera_error(&self) -> Option<String> {
        self.inner.lock().await.camera_error.clone()
    }

    /// Inline message for the camera/upload screen, mirroring the latest
    /// failure without leaving the actionable view.
    pub async fn last_error(&self) -> Option<String> {
        self.inner.lock().await.last_error.clone()
    }

    pub async fn is_uploading(&self) -> bool {
        self.inner.lock().await.uploading
    }
}
