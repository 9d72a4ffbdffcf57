//! Camera capabilities supplied by the host.
//!
//! A [`CameraBackend`] enumerates devices and opens streams. A
//! [`VideoStream`] may not expose its video track right away (the browser
//! only attaches it once playback starts), which is why torch support is
//! probed rather than read once.

use crate::error::Result;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// A video input device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInput {
    pub device_id: String,
    #[serde(default)]
    pub label: String,
}

impl VideoInput {
    pub fn new(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
        }
    }

    /// Label for the selector. Unlabelled devices become "Camera N".
    pub fn display_label(&self, index: usize) -> String {
        if self.label.is_empty() {
            format!("Camera {}", index + 1)
        } else {
            self.label.clone()
        }
    }
}

/// Label of the selector option that lets the backend pick a camera.
pub const AUTO_CAMERA_LABEL: &str = "Auto (rear preferred)";

/// Which camera to open.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamConstraints {
    /// Exact device; `None` means environment-facing.
    pub device_id: Option<String>,
}

impl StreamConstraints {
    pub fn for_device(device_id: Option<String>) -> Self {
        Self {
            device_id: device_id.filter(|id| !id.is_empty()),
        }
    }

    pub fn prefers_environment(&self) -> bool {
        self.device_id.is_none()
    }
}

/// What a track reports through its capability API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackCapabilities {
    pub torch: bool,
}

/// A live video track.
pub trait VideoTrack {
    /// Capabilities, or `None` when the platform has no capability API.
    fn capabilities(&self) -> Option<TrackCapabilities>;

    /// Whether the track accepts constraint changes at all.
    fn accepts_constraints(&self) -> bool;

    /// Turn the torch on or off. Resolves once the device confirms.
    fn apply_torch(&self, on: bool) -> LocalBoxFuture<'_, Result<()>>;
}

/// An open camera stream.
pub trait VideoStream {
    /// The video track, once attached.
    fn video_track(&self) -> Option<Rc<dyn VideoTrack>>;

    /// Stop and release every track.
    fn stop(&self);
}

/// Camera access and the barcode decoder.
pub trait CameraBackend {
    /// Whether the platform can capture video at all.
    fn is_supported(&self) -> bool;

    /// Whether a barcode decoder is loaded.
    fn decoder_available(&self) -> bool;

    fn list_video_inputs(&self) -> LocalBoxFuture<'_, Result<Vec<VideoInput>>>;

    /// Request a stream. May take arbitrarily long (permission prompts).
    fn open(&self, constraints: StreamConstraints)
        -> LocalBoxFuture<'_, Result<Rc<dyn VideoStream>>>;

    /// Reset the decoder after a session ends.
    fn reset_decoder(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_label_falls_back_to_index() {
        assert_eq!(VideoInput::new("a", "").display_label(1), "Camera 2");
        assert_eq!(VideoInput::new("a", "Front").display_label(0), "Front");
    }

    #[test]
    fn empty_device_id_means_environment() {
        assert!(StreamConstraints::for_device(Some(String::new())).prefers_environment());
        assert!(!StreamConstraints::for_device(Some("x".into())).prefers_environment());
    }
}
