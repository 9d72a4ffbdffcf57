//! Camera barcode scanning.

pub mod capture;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod session;
pub mod sheet;
pub mod torch;

pub use capture::{
    CameraBackend, StreamConstraints, TrackCapabilities, VideoInput, VideoStream, VideoTrack,
    AUTO_CAMERA_LABEL,
};
#[cfg(any(test, feature = "test-util"))]
pub use fake::{FakeCamera, FakeCameraState};
pub use session::{Detection, ScanState, ScannerSession};
pub use sheet::{CloseFocus, ScannerSheet};
pub use torch::{track_supports_torch, TorchStatus};
