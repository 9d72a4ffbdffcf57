//! The surface hosting a scanner session.
//!
//! Opening the sheet starts the camera; closing it stops the camera and hands
//! focus back to the form. A detection outside continuous mode closes the
//! sheet after a short delay so the user sees the result first.

use super::session::{Detection, ScannerSession};
use crate::clock::Clock;
use crate::error::Result;
use crate::view::{Field, View};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Where focus goes when the sheet closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseFocus {
    Barcode,
    Room,
    /// Leave focus alone (page hidden).
    Keep,
}

pub struct ScannerSheet {
    session: Rc<ScannerSession>,
    view: Rc<dyn View>,
    clock: Rc<dyn Clock>,
    auto_close_delay: Duration,
    open: Cell<bool>,
    /// Bumped on every close so a pending auto-close can tell it is stale.
    auto_close: Cell<u64>,
}

impl ScannerSheet {
    pub fn new(
        session: Rc<ScannerSession>,
        view: Rc<dyn View>,
        clock: Rc<dyn Clock>,
        auto_close_delay: Duration,
    ) -> Self {
        Self {
            session,
            view,
            clock,
            auto_close_delay,
            open: Cell::new(false),
            auto_close: Cell::new(0),
        }
    }

    pub fn session(&self) -> &Rc<ScannerSession> {
        &self.session
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Show the sheet and start scanning.
    pub async fn open(&self) -> Result<()> {
        self.open.set(true);
        self.view.scanner_surface(true);
        self.session.start().await
    }

    /// Hide the sheet and stop scanning. A no-op when already closed.
    pub async fn close(&self, focus: CloseFocus) {
        if !self.open.replace(false) {
            return;
        }
        self.auto_close.set(self.auto_close.get() + 1);
        self.view.scanner_surface(false);
        self.session.stop().await;

        match focus {
            CloseFocus::Barcode => self.view.focus(Field::Barcode),
            CloseFocus::Room => self.view.focus(Field::Room),
            CloseFocus::Keep => {}
        }
    }

    /// The page went to the background.
    pub async fn page_hidden(&self) {
        self.close(CloseFocus::Keep).await;
    }

    /// Feed one decoder result.
    ///
    /// On a detection that auto-closes, this waits out the delay and then
    /// closes with focus on the room input, unless the sheet was closed in
    /// the meantime. Hosts that keep decoding should spawn this future.
    pub async fn on_frame(&self, decoded: Option<&str>) -> Detection {
        let detection = self.session.on_frame(decoded);
        if let Detection::Detected {
            auto_close: true, ..
        } = &detection
        {
            let token = self.auto_close.get();
            self.clock.sleep(self.auto_close_delay).await;
            if self.auto_close.get() == token && self.open.get() {
                tracing::debug!("auto-closing scanner after detection");
                self.close(CloseFocus::Room).await;
            }
        }
        detection
    }
}
