//! Keyboard-wedge scanner backend.
//!
//! A handheld scanner in keyboard mode types each code followed by Enter.
//! The device decodes on its own, so the "stream" is just a marker that the
//! session owns the input, and every line read is a decoded frame.

use futures::future::{self, FutureExt, LocalBoxFuture};
use std::cell::Cell;
use std::rc::Rc;
use tally_engine::{
    CameraBackend, Error, Result, StreamConstraints, TrackCapabilities, VideoInput, VideoStream,
    VideoTrack,
};

pub const WEDGE_DEVICE_ID: &str = "keyboard-wedge";

#[derive(Default)]
pub struct WedgeBackend {
    open_streams: Rc<Cell<usize>>,
}

impl WedgeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams handed out and not yet stopped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.get()
    }
}

impl CameraBackend for WedgeBackend {
    fn is_supported(&self) -> bool {
        true
    }

    fn decoder_available(&self) -> bool {
        true
    }

    fn list_video_inputs(&self) -> LocalBoxFuture<'_, Result<Vec<VideoInput>>> {
        future::ready(Ok(vec![VideoInput::new(WEDGE_DEVICE_ID, "Keyboard wedge")])).boxed_local()
    }

    fn open(
        &self,
        constraints: StreamConstraints,
    ) -> LocalBoxFuture<'_, Result<Rc<dyn VideoStream>>> {
        tracing::debug!(device = ?constraints.device_id, "wedge input claimed");
        self.open_streams.set(self.open_streams.get() + 1);
        let stream: Rc<dyn VideoStream> = Rc::new(WedgeStream {
            open_streams: self.open_streams.clone(),
            stopped: Cell::new(false),
        });
        future::ready(Ok(stream)).boxed_local()
    }

    fn reset_decoder(&self) {}
}

struct WedgeStream {
    open_streams: Rc<Cell<usize>>,
    stopped: Cell<bool>,
}

impl VideoStream for WedgeStream {
    fn video_track(&self) -> Option<Rc<dyn VideoTrack>> {
        Some(Rc::new(WedgeTrack))
    }

    fn stop(&self) {
        if !self.stopped.replace(true) {
            self.open_streams.set(self.open_streams.get().saturating_sub(1));
        }
    }
}

/// A wedge has no light to switch.
struct WedgeTrack;

impl VideoTrack for WedgeTrack {
    fn capabilities(&self) -> Option<TrackCapabilities> {
        Some(TrackCapabilities { torch: false })
    }

    fn accepts_constraints(&self) -> bool {
        false
    }

    fn apply_torch(&self, _on: bool) -> LocalBoxFuture<'_, Result<()>> {
        future::ready(Err(Error::TorchUnavailable)).boxed_local()
    }
}

/// Normalize one line typed by the scanner. Blank lines carry no code.
pub fn decode_line(line: &str) -> Option<&str> {
    let code = line.trim_matches(|c: char| c.is_whitespace() || c.is_control());
    (!code.is_empty()).then_some(code)
}
