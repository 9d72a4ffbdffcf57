//! Flashlight support detection and control state.

use super::capture::VideoTrack;
use crate::view::TorchControl;

/// Whether `track` can drive the torch.
///
/// Tracks with a capability API must advertise `torch`. Without one, a track
/// that accepts constraints is assumed to support it.
pub fn track_supports_torch(track: &dyn VideoTrack) -> bool {
    match track.capabilities() {
        Some(caps) => caps.torch,
        None => track.accepts_constraints(),
    }
}

/// Torch knowledge for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TorchStatus {
    /// `None` while the probe is still running.
    pub supported: Option<bool>,
    pub on: bool,
}

impl TorchStatus {
    /// Fresh session: support unknown, torch off.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_supported(&self) -> bool {
        self.supported == Some(true)
    }

    /// Record the probe result. Unsupported forces the torch off.
    pub fn resolve(&mut self, supported: bool) {
        self.supported = Some(supported);
        if !supported {
            self.on = false;
        }
    }

    /// Control state for the view.
    pub fn control(&self, camera_supported: bool, active: bool) -> TorchControl {
        if !camera_supported {
            return TorchControl::Unavailable;
        }
        if !active {
            return TorchControl::CameraOff;
        }
        match self.supported {
            None => TorchControl::Checking,
            Some(false) => TorchControl::NotSupported,
            Some(true) if self.on => TorchControl::On,
            Some(true) => TorchControl::Off,
        }
    }
}
