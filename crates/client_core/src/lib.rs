pub mod camera;
pub mod capture;
pub mod preview;
pub mod relay;
pub mod store;
pub mod view;

pub use camera::{CameraDevice, CameraError, CameraStream, CapturedFrame, UnsupportedCamera};
pub use capture::{CaptureController, CaptureMode};
pub use preview::{PreviewRef, PreviewRegistry};
pub use relay::{AnalyzeBackend, AnalyzeOutcome, ImageUpload, RelayClient, RelayError};
pub use store::{ScanState, ScanStore, Subscription};
pub use view::{derive_view, View};

#[cfg(test)]
mod tests;
