use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera not supported on this device.")]
    Unsupported,
    #[error("Camera permission denied. Please upload a photo instead.")]
    PermissionDenied,
    #[error("Camera is not ready yet.")]
    NotReady,
    #[error("Could not access camera: {0}")]
    Device(String),
}

/// A still frame snapshotted from the live stream, already encoded as a
/// compressed image.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Request access and start a live stream. Resolving may wait on a
    /// permission prompt.
    async fn open(&self) -> Result<Box<dyn CameraStream>, CameraError>;
}

pub trait CameraStream: Send + Sync {
    /// Snapshot the current frame at the source's native resolution.
    /// `NotReady` until the source has buffered enough data.
    fn capture_frame(&self) -> Result<CapturedFrame, CameraError>;

    fn stop(&self);
}

/// Stand-in for environments with no camera at all (headless hosts). The
/// scan flow downgrades to file upload.
pub struct UnsupportedCamera;

#[async_trait]
impl CameraDevice for UnsupportedCamera {
    async fn open(&self) -> Result<Box<dyn CameraStream>, CameraError> {
        Err(CameraError::Unsupported)
    }
}
