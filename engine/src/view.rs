//! The rendering surface the engine pushes state to.
//!
//! Every method has an empty default body so a host only implements the parts
//! of the UI it actually has.

use crate::entries::Entry;
use crate::scanner::VideoInput;
#[cfg(any(test, feature = "test-util"))]
use std::cell::RefCell;
use std::time::Duration;

/// Severity of a one-shot notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A one-shot, user-visible notification (a toast in the browser host).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Short badge shown next to the scanner status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanBadge {
    Idle,
    Scanning,
    Detected,
    Error,
}

/// State of the flashlight control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorchControl {
    /// Device has no camera support at all.
    Unavailable,
    /// Camera is off.
    CameraOff,
    /// Stream is live, capability probe still running.
    Checking,
    /// Active track does not support the torch.
    NotSupported,
    Off,
    On,
}

impl TorchControl {
    /// Whether the control accepts input.
    pub fn is_enabled(self) -> bool {
        matches!(self, TorchControl::Off | TorchControl::On)
    }

    pub fn hint(self) -> &'static str {
        match self {
            TorchControl::Unavailable | TorchControl::NotSupported => "Not supported",
            TorchControl::CameraOff => "Camera off",
            TorchControl::Checking => "Checking...",
            TorchControl::Off => "Off",
            TorchControl::On => "On",
        }
    }
}

/// Form inputs the engine may move focus to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Barcode,
    Room,
}

/// Rendering surface.
pub trait View {
    /// Pending offline entries. Zero hides the badge.
    fn pending_badge(&self, _count: usize) {}

    fn notify(&self, _notice: Notice) {}

    fn scan_status(&self, _text: &str, _badge: ScanBadge) {}

    fn torch_control(&self, _control: TorchControl) {}

    /// Start/stop toggle. `None` when the device has no camera.
    fn scan_button(&self, _scanning: Option<bool>) {}

    /// Camera selector options. `None` hides the selector.
    fn camera_options(&self, _devices: Option<&[VideoInput]>) {}

    /// A barcode was recognized and should fill the barcode input.
    fn barcode_detected(&self, _code: &str) {}

    fn success_pulse(&self, _duration: Duration) {}

    fn vibrate(&self, _duration: Duration) {}

    fn focus(&self, _field: Field) {}

    fn scanner_surface(&self, _open: bool) {}

    fn render_entries(&self, _entries: &[Entry]) {}

    fn rooms(&self, _rooms: &[String]) {}

    /// Sign-in screen visibility, with an optional error line.
    fn auth_screen(&self, _visible: bool, _error: Option<&str>) {}

    fn user_badge(&self, _email: Option<&str>) {}

    /// Reset barcode, notes, quantity and photo inputs after a save.
    fn clear_form(&self) {}
}

/// A view that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl View for NullView {}

#[cfg(any(test, feature = "test-util"))]
/// Everything a [`RecordingView`] saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    PendingBadge(usize),
    Notice(Notice),
    ScanStatus(String, ScanBadge),
    TorchControl(TorchControl),
    ScanButton(Option<bool>),
    CameraOptions(Option<usize>),
    BarcodeDetected(String),
    SuccessPulse,
    Vibrate(Duration),
    Focus(Field),
    ScannerSurface(bool),
    RenderEntries(Vec<String>),
    Rooms(Vec<String>),
    AuthScreen(bool, Option<String>),
    UserBadge(Option<String>),
    ClearForm,
}

#[cfg(any(test, feature = "test-util"))]
/// A view that records every call, for tests and headless hosts.
#[derive(Debug, Default)]
pub struct RecordingView {
    events: RefCell<Vec<ViewEvent>>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Last badge count pushed, if any.
    pub fn last_badge(&self) -> Option<usize> {
        self.events.borrow().iter().rev().find_map(|e| match e {
            ViewEvent::PendingBadge(n) => Some(*n),
            _ => None,
        })
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Notice(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether any notice contains `text`.
    pub fn has_notice(&self, text: &str) -> bool {
        self.notices().iter().any(|n| n.message.contains(text))
    }

    pub fn last_scan_status(&self) -> Option<(String, ScanBadge)> {
        self.events.borrow().iter().rev().find_map(|e| match e {
            ViewEvent::ScanStatus(text, badge) => Some((text.clone(), *badge)),
            _ => None,
        })
    }

    pub fn last_torch_control(&self) -> Option<TorchControl> {
        self.events.borrow().iter().rev().find_map(|e| match e {
            ViewEvent::TorchControl(c) => Some(*c),
            _ => None,
        })
    }

    /// Ids of the entries in the most recent render.
    pub fn last_render(&self) -> Option<Vec<String>> {
        self.events.borrow().iter().rev().find_map(|e| match e {
            ViewEvent::RenderEntries(ids) => Some(ids.clone()),
            _ => None,
        })
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&ViewEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }

    fn push(&self, event: ViewEvent) {
        self.events.borrow_mut().push(event);
    }
}

#[cfg(any(test, feature = "test-util"))]
impl View for RecordingView {
    fn pending_badge(&self, count: usize) {
        self.push(ViewEvent::PendingBadge(count));
    }

    fn notify(&self, notice: Notice) {
        self.push(ViewEvent::Notice(notice));
    }

    fn scan_status(&self, text: &str, badge: ScanBadge) {
        self.push(ViewEvent::ScanStatus(text.to_string(), badge));
    }

    fn torch_control(&self, control: TorchControl) {
        self.push(ViewEvent::TorchControl(control));
    }

    fn scan_button(&self, scanning: Option<bool>) {
        self.push(ViewEvent::ScanButton(scanning));
    }

    fn camera_options(&self, devices: Option<&[VideoInput]>) {
        self.push(ViewEvent::CameraOptions(devices.map(|d| d.len())));
    }

    fn barcode_detected(&self, code: &str) {
        self.push(ViewEvent::BarcodeDetected(code.to_string()));
    }

    fn success_pulse(&self, _duration: Duration) {
        self.push(ViewEvent::SuccessPulse);
    }

    fn vibrate(&self, duration: Duration) {
        self.push(ViewEvent::Vibrate(duration));
    }

    fn focus(&self, field: Field) {
        self.push(ViewEvent::Focus(field));
    }

    fn scanner_surface(&self, open: bool) {
        self.push(ViewEvent::ScannerSurface(open));
    }

    fn render_entries(&self, entries: &[Entry]) {
        self.push(ViewEvent::RenderEntries(
            entries.iter().map(|e| e.id.clone()).collect(),
        ));
    }

    fn rooms(&self, rooms: &[String]) {
        self.push(ViewEvent::Rooms(rooms.to_vec()));
    }

    fn auth_screen(&self, visible: bool, error: Option<&str>) {
        self.push(ViewEvent::AuthScreen(visible, error.map(str::to_string)));
    }

    fn user_badge(&self, email: Option<&str>) {
        self.push(ViewEvent::UserBadge(email.map(str::to_string)));
    }

    fn clear_form(&self) {
        self.push(ViewEvent::ClearForm);
    }
}
