//! Scanner session state machine.
//!
//! ```text
//! Idle -> Requesting -> Scanning <-> Detected
//!            |             |
//!            v             v
//!          Error         Idle (stop)
//! ```
//!
//! Every `start` takes a new generation number and `stop` bumps it again.
//! Work that resumes after an `.await` (a stream grant, a torch probe, a
//! torch constraint) checks its generation first and backs out if the
//! session it belonged to is gone.

use super::capture::{CameraBackend, StreamConstraints, VideoInput, VideoStream, VideoTrack};
use super::torch::{track_supports_torch, TorchStatus};
use crate::clock::Clock;
use crate::config::ScannerConfig;
use crate::error::{Error, Result};
use crate::view::{Field, Notice, ScanBadge, View};
use crate::Timestamp;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Lifecycle state of a [`ScannerSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    /// Waiting for the camera grant.
    Requesting,
    Scanning,
    /// A code was just recognized. The next frame returns to `Scanning`.
    Detected,
    Error,
}

impl ScanState {
    /// Whether a camera is requested or running.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ScanState::Requesting | ScanState::Scanning | ScanState::Detected
        )
    }
}

/// Result of feeding one decoded frame to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// No code, or the session is not scanning.
    Ignored,
    /// Same code again within the cooldown window.
    Suppressed,
    Detected {
        code: String,
        /// The hosting sheet should close after its delay.
        auto_close: bool,
    },
}

/// A camera barcode-scanning session.
pub struct ScannerSession {
    backend: Rc<dyn CameraBackend>,
    view: Rc<dyn View>,
    clock: Rc<dyn Clock>,
    config: ScannerConfig,
    state: Cell<ScanState>,
    generation: Cell<u64>,
    stream: RefCell<Option<Rc<dyn VideoStream>>>,
    track: RefCell<Option<Rc<dyn VideoTrack>>>,
    torch: Cell<TorchStatus>,
    continuous: Cell<bool>,
    selected_camera: RefCell<Option<String>>,
    devices: RefCell<Vec<VideoInput>>,
    last_code: RefCell<Option<String>>,
    last_code_at: Cell<Timestamp>,
}

impl ScannerSession {
    pub fn new(
        backend: Rc<dyn CameraBackend>,
        view: Rc<dyn View>,
        clock: Rc<dyn Clock>,
        config: ScannerConfig,
    ) -> Self {
        let continuous = config.continuous;
        Self {
            backend,
            view,
            clock,
            config,
            state: Cell::new(ScanState::Idle),
            generation: Cell::new(0),
            stream: RefCell::new(None),
            track: RefCell::new(None),
            torch: Cell::new(TorchStatus::unknown()),
            continuous: Cell::new(continuous),
            selected_camera: RefCell::new(None),
            devices: RefCell::new(Vec::new()),
            last_code: RefCell::new(None),
            last_code_at: Cell::new(0),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.get().is_active()
    }

    pub fn camera_supported(&self) -> bool {
        self.backend.is_supported()
    }

    pub fn torch(&self) -> TorchStatus {
        self.torch.get()
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous.get()
    }

    pub fn set_continuous(&self, continuous: bool) {
        self.continuous.set(continuous);
    }

    pub fn selected_camera(&self) -> Option<String> {
        self.selected_camera.borrow().clone()
    }

    pub fn devices(&self) -> Vec<VideoInput> {
        self.devices.borrow().clone()
    }

    pub fn last_code(&self) -> Option<String> {
        self.last_code.borrow().clone()
    }

    /// Detect camera support and enumerate devices.
    ///
    /// The camera selector is offered only when there is a choice to make.
    pub async fn init(&self) {
        if !self.backend.is_supported() {
            self.view
                .scan_status("Camera scanning is not supported.", ScanBadge::Idle);
            self.view.camera_options(None);
            self.render_controls();
            return;
        }
        self.render_controls();

        let devices = match self.backend.list_video_inputs().await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!(error = %e, "could not enumerate cameras");
                Vec::new()
            }
        };
        tracing::debug!(count = devices.len(), "cameras enumerated");
        if devices.len() >= 2 {
            self.view.camera_options(Some(&devices));
        } else {
            self.view.camera_options(None);
        }
        *self.devices.borrow_mut() = devices;
        self.view.scan_status("Camera off", ScanBadge::Idle);
    }

    /// Acquire the camera and start decoding.
    ///
    /// A no-op while already active. Resolves once the torch probe is done.
    pub async fn start(&self) -> Result<()> {
        if !self.backend.is_supported() {
            self.view.notify(Notice::error(
                "Camera scanning is not available on this device.",
            ));
            return Err(Error::CameraUnsupported);
        }
        if self.is_active() {
            return Ok(());
        }
        if !self.backend.decoder_available() {
            self.state.set(ScanState::Error);
            self.view
                .scan_status("Scanner library failed to load.", ScanBadge::Error);
            self.view
                .notify(Notice::error("Barcode scanner library not available."));
            return Err(Error::DecoderUnavailable);
        }

        let generation = self.next_generation();
        self.state.set(ScanState::Requesting);
        self.torch.set(TorchStatus::unknown());
        self.render_controls();
        self.view
            .scan_status("Requesting camera\u{2026}", ScanBadge::Scanning);

        let constraints = StreamConstraints::for_device(self.selected_camera());
        tracing::debug!(generation, device = ?constraints.device_id, "requesting camera");
        let opened = self.backend.open(constraints).await;

        if !self.is_current(generation) {
            if let Ok(stream) = opened {
                stream.stop();
                tracing::debug!(generation, "released late stream grant");
            }
            return Ok(());
        }

        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "could not start camera");
                self.state.set(ScanState::Error);
                self.render_controls();
                self.view
                    .scan_status(&format!("Camera error: {}", camera_message(&e)), ScanBadge::Error);
                self.view
                    .notify(Notice::error("Could not start camera. Check permissions."));
                return Err(e);
            }
        };

        *self.stream.borrow_mut() = Some(stream);
        self.state.set(ScanState::Scanning);
        self.view.scan_status("Scanning\u{2026}", ScanBadge::Scanning);
        tracing::info!(generation, "scanner started");

        self.probe_torch(generation).await;
        Ok(())
    }

    /// Release the camera. Safe to call any number of times.
    pub async fn stop(&self) {
        let was_active = self.is_active();
        let torch_was_on = self.torch.get().on;
        let track = self.track.borrow_mut().take();
        let stream = self.stream.borrow_mut().take();

        self.next_generation();
        self.state.set(ScanState::Idle);
        self.torch.set(TorchStatus::unknown());
        self.render_controls();
        self.view.scan_status("Camera off", ScanBadge::Idle);

        if was_active || stream.is_some() {
            self.backend.reset_decoder();
        }

        if torch_was_on {
            if let Some(track) = &track {
                if let Err(e) = track.apply_torch(false).await {
                    tracing::debug!(error = %e, "could not turn torch off");
                }
            }
        }

        if let Some(stream) = stream {
            stream.stop();
            tracing::info!("scanner stopped");
        }
    }

    /// Switch cameras. An active session restarts on the new device.
    pub async fn select_camera(&self, device_id: Option<String>) -> Result<()> {
        *self.selected_camera.borrow_mut() = device_id.filter(|id| !id.is_empty());
        if self.is_active() {
            self.stop().await;
            self.start().await?;
        }
        Ok(())
    }

    /// Flip the torch. Does nothing unless active with a supported torch.
    ///
    /// Returns the torch state afterwards. The state only flips once the
    /// device confirms.
    pub async fn toggle_torch(&self) -> Result<bool> {
        let torch = self.torch.get();
        if !self.is_active() || !torch.is_supported() {
            return Ok(torch.on);
        }
        self.set_torch(!torch.on).await
    }

    /// Feed one decoder result.
    pub fn on_frame(&self, decoded: Option<&str>) -> Detection {
        match self.state.get() {
            ScanState::Scanning => {}
            ScanState::Detected => self.state.set(ScanState::Scanning),
            _ => return Detection::Ignored,
        }
        let Some(code) = decoded.filter(|c| !c.is_empty()) else {
            return Detection::Ignored;
        };

        let now = self.clock.now_ms();
        let repeated = self.last_code.borrow().as_deref() == Some(code)
            && now.saturating_sub(self.last_code_at.get()) < self.config.cooldown_ms;
        if repeated {
            tracing::trace!(code, "suppressed repeated code");
            return Detection::Suppressed;
        }

        *self.last_code.borrow_mut() = Some(code.to_string());
        self.last_code_at.set(now);
        self.state.set(ScanState::Detected);

        self.view.barcode_detected(code);
        self.view
            .scan_status(&format!("Barcode: {code}"), ScanBadge::Detected);
        self.view.success_pulse(self.config.success_pulse());
        self.view.vibrate(self.config.detect_vibration());

        let continuous = self.continuous.get();
        if continuous {
            self.view.focus(Field::Room);
        }
        tracing::info!(code, continuous, "barcode detected");

        Detection::Detected {
            code: code.to_string(),
            auto_close: !continuous,
        }
    }

    async fn probe_torch(&self, generation: u64) {
        for attempt in 1..=self.config.torch_probe_attempts {
            self.clock.sleep(self.config.torch_probe_interval()).await;
            if !self.is_current(generation) {
                return;
            }
            let track = self.stream.borrow().as_ref().and_then(|s| s.video_track());
            if let Some(track) = track {
                let supported = track_supports_torch(track.as_ref());
                *self.track.borrow_mut() = Some(track);
                self.resolve_torch(supported);
                tracing::debug!(attempt, supported, "torch probe finished");
                return;
            }
        }
        tracing::debug!("no video track after probing, torch not supported");
        self.resolve_torch(false);
    }

    async fn set_torch(&self, enabled: bool) -> Result<bool> {
        let track = self.track.borrow().clone();
        let Some(track) = track else {
            return Ok(self.torch.get().on);
        };

        let generation = self.generation.get();
        let result = track.apply_torch(enabled).await;
        if self.generation.get() != generation {
            return Ok(false);
        }

        let mut torch = self.torch.get();
        match result {
            Ok(()) => {
                torch.on = enabled;
                self.torch.set(torch);
                self.render_controls();
                Ok(enabled)
            }
            Err(e) => {
                tracing::warn!(error = %e, enabled, "torch constraint rejected");
                torch.on = false;
                self.torch.set(torch);
                self.render_controls();
                self.view
                    .notify(Notice::error("Flashlight not available on this camera."));
                Err(Error::TorchUnavailable)
            }
        }
    }

    fn resolve_torch(&self, supported: bool) {
        let mut torch = self.torch.get();
        torch.resolve(supported);
        self.torch.set(torch);
        self.render_controls();
    }

    fn render_controls(&self) {
        let supported = self.backend.is_supported();
        let active = self.is_active();
        self.view.scan_button(supported.then_some(active));
        self.view
            .torch_control(self.torch.get().control(supported, active));
    }

    fn next_generation(&self) -> u64 {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        next
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.get() == generation && self.is_active()
    }
}

fn camera_message(error: &Error) -> String {
    match error {
        Error::Camera(message) => message.clone(),
        other => other.to_string(),
    }
}
