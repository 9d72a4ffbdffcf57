//! Terminal rendering of engine state.

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::time::Duration;
use tally_engine::{Entry, Field, Notice, NoticeLevel, ScanBadge, TorchControl, View};

/// [`View`] that prints to a terminal.
///
/// The entry table and the room list are only printed when requested, since
/// every sign-in pushes them.
pub struct ConsoleView {
    out: RefCell<Box<dyn Write>>,
    show_entries: Cell<bool>,
    last_badge: Cell<Option<usize>>,
}

impl ConsoleView {
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write>) -> Self {
        Self {
            out: RefCell::new(out),
            show_entries: Cell::new(false),
            last_badge: Cell::new(None),
        }
    }

    pub fn show_entries(&self, show: bool) {
        self.show_entries.set(show);
    }

    fn line(&self, text: &str) {
        let mut out = self.out.borrow_mut();
        if let Err(e) = writeln!(out, "{text}") {
            tracing::debug!(error = %e, "console write failed");
        }
    }
}

fn level_tag(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => "ok",
        NoticeLevel::Error => "error",
    }
}

fn badge_tag(badge: ScanBadge) -> &'static str {
    match badge {
        ScanBadge::Idle => "idle",
        ScanBadge::Scanning => "scanning",
        ScanBadge::Detected => "detected",
        ScanBadge::Error => "error",
    }
}

/// One table row per entry.
pub fn format_entry(entry: &Entry) -> String {
    let mut row = format!(
        "{:<14} {:<18} {:<16} x{}",
        entry.id, entry.barcode, entry.room, entry.quantity
    );
    if !entry.notes.is_empty() {
        row.push_str("  ");
        row.push_str(&entry.notes);
    }
    if let Some(email) = &entry.user_email {
        row.push_str(&format!("  ({email})"));
    }
    row
}

impl View for ConsoleView {
    fn pending_badge(&self, count: usize) {
        if self.last_badge.replace(Some(count)) == Some(count) {
            return;
        }
        if count > 0 {
            self.line(&format!("{count} item(s) waiting to sync"));
        }
    }

    fn notify(&self, notice: Notice) {
        self.line(&format!("[{}] {}", level_tag(notice.level), notice.message));
    }

    fn scan_status(&self, text: &str, badge: ScanBadge) {
        self.line(&format!("scanner ({}): {text}", badge_tag(badge)));
    }

    fn torch_control(&self, control: TorchControl) {
        tracing::debug!(torch = control.hint(), enabled = control.is_enabled(), "torch control");
    }

    fn barcode_detected(&self, code: &str) {
        tracing::debug!(code, "barcode filled");
    }

    fn vibrate(&self, duration: Duration) {
        // Terminal bell stands in for the vibration motor.
        tracing::trace!(ms = duration.as_millis() as u64, "vibrate");
        let mut out = self.out.borrow_mut();
        let _ = write!(out, "\x07");
        let _ = out.flush();
    }

    fn focus(&self, field: Field) {
        tracing::trace!(?field, "focus");
    }

    fn render_entries(&self, entries: &[Entry]) {
        if !self.show_entries.get() {
            return;
        }
        if entries.is_empty() {
            self.line("No entries.");
            return;
        }
        for entry in entries {
            self.line(&format_entry(entry));
        }
    }

    fn rooms(&self, rooms: &[String]) {
        if self.show_entries.get() && !rooms.is_empty() {
            self.line(&format!("Rooms: {}", rooms.join(", ")));
        }
    }

    fn auth_screen(&self, visible: bool, error: Option<&str>) {
        if let (true, Some(error)) = (visible, error) {
            self.line(&format!("[error] Sign-in failed: {error}"));
        }
    }

    fn user_badge(&self, email: Option<&str>) {
        tracing::debug!(user = ?email, "user badge");
    }
}
