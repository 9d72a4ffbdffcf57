//! # Tally Client
//!
//! Command-line host for the Tally engine. Wires the engine's capability
//! traits to real implementations:
//!
//! - [`http::HttpGateway`]: the Web App endpoint over `reqwest`
//! - [`storage::FileStore`]: one file per key under the data directory
//! - [`console::ConsoleView`]: notices and tables on the terminal
//! - [`clock::SystemClock`]: system time and tokio timers
//! - [`wedge::WedgeBackend`]: a keyboard-wedge barcode scanner on stdin

pub mod clock;
pub mod config;
pub mod console;
pub mod error;
pub mod http;
pub mod storage;
pub mod wedge;

use crate::clock::SystemClock;
use crate::config::Config;
use crate::console::ConsoleView;
use crate::error::{AppError, Result};
use crate::http::HttpGateway;
use crate::storage::FileStore;
use crate::wedge::{decode_line, WedgeBackend};
use futures::{Stream, StreamExt};
use std::io;
use std::path::Path;
use std::rc::Rc;
use tally_engine::image::{data_url, mime_for_extension};
use tally_engine::{
    CameraBackend, Clock, CloseFocus, Detection, Gateway, Host, Inventory, ItemDraft,
    KeyValueStore, SaveOutcome, ScannerSession, ScannerSheet, View,
};

/// The engine context plus the host pieces commands need directly.
pub struct App {
    pub inventory: Inventory,
    pub view: Rc<ConsoleView>,
    clock: Rc<dyn Clock>,
    camera: Rc<dyn CameraBackend>,
}

impl App {
    /// Build the app from configuration, printing to stdout.
    pub fn new(config: &Config) -> Self {
        let gateway: Rc<dyn Gateway> = Rc::new(HttpGateway::new(config.api_url.clone()));
        let storage: Rc<dyn KeyValueStore> = Rc::new(FileStore::new(&config.data_dir));
        Self::with_parts(config, gateway, storage, Rc::new(ConsoleView::stdout()))
    }

    /// Build the app from explicit parts.
    pub fn with_parts(
        config: &Config,
        gateway: Rc<dyn Gateway>,
        storage: Rc<dyn KeyValueStore>,
        view: Rc<ConsoleView>,
    ) -> Self {
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let engine_view: Rc<dyn View> = view.clone();
        let inventory = Inventory::new(
            config.client_config(),
            Host {
                gateway,
                storage,
                view: engine_view,
                clock: clock.clone(),
            },
        );
        tracing::debug!(
            data_dir = %config.data_dir.display(),
            pending = inventory.pending_count(),
            "app ready"
        );
        Self {
            inventory,
            view,
            clock,
            camera: Rc::new(WedgeBackend::new()),
        }
    }

    /// Sign in with the stored token.
    pub async fn require_session(&self) -> Result<()> {
        if self.inventory.restore_session().await? {
            Ok(())
        } else {
            Err(AppError::SignedOut)
        }
    }

    /// Scan codes from `lines` and save each detection under `room`.
    ///
    /// Stops at the first blank line or at end of input. Outside continuous
    /// mode the first detection closes the scanner.
    pub async fn scan<S>(&self, room: &str, continuous: bool, mut lines: S) -> Result<Vec<SaveOutcome>>
    where
        S: Stream<Item = io::Result<String>> + Unpin,
    {
        let sheet = self.scanner_sheet(continuous);
        sheet.session().init().await;

        let result = self.scan_lines(&sheet, room, &mut lines).await;
        sheet.close(CloseFocus::Keep).await;
        result
    }

    async fn scan_lines<S>(
        &self,
        sheet: &ScannerSheet,
        room: &str,
        lines: &mut S,
    ) -> Result<Vec<SaveOutcome>>
    where
        S: Stream<Item = io::Result<String>> + Unpin,
    {
        sheet.open().await?;

        let mut outcomes = Vec::new();
        while sheet.is_open() {
            let Some(line) = lines.next().await else {
                break;
            };
            let line = line?;
            let Some(code) = decode_line(&line) else {
                break;
            };
            if let Detection::Detected { code, .. } = sheet.on_frame(Some(code)).await {
                let outcome = self.inventory.save_item(ItemDraft::new(code, room)).await?;
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }

    fn scanner_sheet(&self, continuous: bool) -> ScannerSheet {
        let config = self.inventory.config().scanner.clone();
        let view: Rc<dyn View> = self.view.clone();
        let session = Rc::new(ScannerSession::new(
            self.camera.clone(),
            view.clone(),
            self.clock.clone(),
            config.clone(),
        ));
        session.set_continuous(continuous);
        ScannerSheet::new(session, view, self.clock.clone(), config.auto_close_delay())
    }
}

/// Read a photo and encode it as a data URL.
pub fn photo_data_url(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let mime = mime_for_extension(ext);
    if !mime.starts_with("image/") {
        return Err(AppError::UnsupportedPhoto(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    Ok(data_url(mime, &bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn photo_becomes_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.PNG");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"\x89PNG")
            .unwrap();

        let url = photo_data_url(&path).unwrap();
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn non_image_photo_rejected() {
        let err = photo_data_url(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedPhoto(_)));
    }
}
