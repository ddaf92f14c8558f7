use crate::store::ScanState;

/// The mutually exclusive screens of the scan flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Landing,
    Camera,
    Processing,
    Result,
}

/// Which screen a state maps to. Total over every state; errors surface
/// inline on the camera screen so the user can retry, never on a dead end.
pub fn derive_view(state: &ScanState) -> View {
    match state {
        ScanState::Idle => View::Landing,
        ScanState::Camera => View::Camera,
        ScanState::Processing { .. } => View::Processing,
        ScanState::Result { .. } => View::Result,
        ScanState::Error { .. } => View::Camera,
    }
}
