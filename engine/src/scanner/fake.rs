//! Scriptable camera for tests and headless hosts.

use super::capture::{
    CameraBackend, StreamConstraints, TrackCapabilities, VideoInput, VideoStream, VideoTrack,
};
use crate::error::{Error, Result};
use futures::future::{self, FutureExt, LocalBoxFuture};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Shared counters and switches behind [`FakeCamera`].
#[derive(Debug, Default)]
pub struct FakeCameraState {
    pub opened: Cell<u32>,
    pub released: Cell<u32>,
    pub decoder_resets: Cell<u32>,
    /// Every torch value applied successfully, in order
    pub torch_applied: RefCell<Vec<bool>>,
    pub last_constraints: RefCell<Option<StreamConstraints>>,
    /// `video_track()` calls answered with `None` before the track appears
    pub track_delay: Cell<u32>,
    pub torch_fails: Cell<bool>,
}

/// Camera whose devices, failures and track behavior are set up front.
pub struct FakeCamera {
    supported: bool,
    decoder: bool,
    devices: Vec<VideoInput>,
    open_error: Option<String>,
    capabilities: Option<TrackCapabilities>,
    accepts_constraints: bool,
    state: Rc<FakeCameraState>,
}

impl FakeCamera {
    /// A working camera whose track advertises torch support.
    pub fn new() -> Self {
        Self {
            supported: true,
            decoder: true,
            devices: vec![VideoInput::new("rear", "Back Camera")],
            open_error: None,
            capabilities: Some(TrackCapabilities { torch: true }),
            accepts_constraints: true,
            state: Rc::new(FakeCameraState::default()),
        }
    }

    /// A platform with no camera at all.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn without_decoder(mut self) -> Self {
        self.decoder = false;
        self
    }

    pub fn with_devices(mut self, devices: Vec<VideoInput>) -> Self {
        self.devices = devices;
        self
    }

    /// Every `open` fails with `message`.
    pub fn failing_open(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: Option<TrackCapabilities>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn accepting_constraints(mut self, accepts: bool) -> Self {
        self.accepts_constraints = accepts;
        self
    }

    pub fn state(&self) -> Rc<FakeCameraState> {
        self.state.clone()
    }
}

impl Default for FakeCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for FakeCamera {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn decoder_available(&self) -> bool {
        self.decoder
    }

    fn list_video_inputs(&self) -> LocalBoxFuture<'_, Result<Vec<VideoInput>>> {
        future::ready(Ok(self.devices.clone())).boxed_local()
    }

    fn open(
        &self,
        constraints: StreamConstraints,
    ) -> LocalBoxFuture<'_, Result<Rc<dyn VideoStream>>> {
        *self.state.last_constraints.borrow_mut() = Some(constraints);
        let result = match &self.open_error {
            Some(message) => Err(Error::Camera(message.clone())),
            None => {
                self.state.opened.set(self.state.opened.get() + 1);
                let track: Rc<dyn VideoTrack> = Rc::new(FakeTrack {
                    capabilities: self.capabilities,
                    accepts_constraints: self.accepts_constraints,
                    state: self.state.clone(),
                });
                let stream: Rc<dyn VideoStream> = Rc::new(FakeStream {
                    track,
                    state: self.state.clone(),
                    stopped: Cell::new(false),
                });
                Ok(stream)
            }
        };
        future::ready(result).boxed_local()
    }

    fn reset_decoder(&self) {
        self.state
            .decoder_resets
            .set(self.state.decoder_resets.get() + 1);
    }
}

struct FakeStream {
    track: Rc<dyn VideoTrack>,
    state: Rc<FakeCameraState>,
    stopped: Cell<bool>,
}

impl VideoStream for FakeStream {
    fn video_track(&self) -> Option<Rc<dyn VideoTrack>> {
        let delay = self.state.track_delay.get();
        if delay > 0 {
            self.state.track_delay.set(delay - 1);
            return None;
        }
        Some(self.track.clone())
    }

    fn stop(&self) {
        if !self.stopped.replace(true) {
            self.state.released.set(self.state.released.get() + 1);
        }
    }
}

struct FakeTrack {
    capabilities: Option<TrackCapabilities>,
    accepts_constraints: bool,
    state: Rc<FakeCameraState>,
}

impl VideoTrack for FakeTrack {
    fn capabilities(&self) -> Option<TrackCapabilities> {
        self.capabilities
    }

    fn accepts_constraints(&self) -> bool {
        self.accepts_constraints
    }

    fn apply_torch(&self, on: bool) -> LocalBoxFuture<'_, Result<()>> {
        let result = if self.state.torch_fails.get() {
            Err(Error::TorchUnavailable)
        } else {
            self.state.torch_applied.borrow_mut().push(on);
            Ok(())
        };
        future::ready(result).boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn fake_stream_releases_once() {
        let camera = FakeCamera::new();
        let state = camera.state();
        let stream = block_on(camera.open(StreamConstraints::default())).unwrap();
        stream.stop();
        stream.stop();
        assert_eq!(state.opened.get(), 1);
        assert_eq!(state.released.get(), 1);
    }

    #[test]
    fn fake_track_appears_after_delay() {
        let camera = FakeCamera::new();
        camera.state().track_delay.set(2);
        let stream = block_on(camera.open(StreamConstraints::default())).unwrap();
        assert!(stream.video_track().is_none());
        assert!(stream.video_track().is_none());
        assert!(stream.video_track().is_some());
    }
}
