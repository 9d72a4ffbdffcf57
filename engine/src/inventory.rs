//! The inventory client context.
//!
//! [`Inventory`] owns every piece of client state (session, offline queue,
//! entry list, sync flags) together with the host collaborators it talks to.
//! All state sits behind `Cell`/`RefCell` and no borrow is held across an
//! `.await`, so operations may interleave on a single-threaded executor.

use crate::auth::{Session, TokenStore};
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::entries::{Entry, EntryBook, EntryUpdate};
use crate::entry::{NewEntry, PendingEntry};
use crate::error::{Error, Result};
use crate::gateway::{Gateway, InitialData, RemoteApi};
use crate::queue::QueueStore;
use crate::storage::KeyValueStore;
use crate::sync::{SyncEngine, SyncOutcome, SyncReport};
use crate::view::{Field, Notice, View};
use crate::LocalId;
use std::cell::RefCell;
use std::rc::Rc;

/// Unvalidated form values for a save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    pub barcode: String,
    pub room: String,
    pub notes: String,
    pub quantity: u32,
    pub image_data_url: Option<String>,
}

impl ItemDraft {
    pub fn new(barcode: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            barcode: barcode.into(),
            room: room.into(),
            quantity: 1,
            ..Self::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_image(mut self, data_url: impl Into<String>) -> Self {
        self.image_data_url = Some(data_url.into());
        self
    }
}

/// How a save ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Stored on the server. Carries the entry when the server echoed one.
    Saved(Option<Entry>),
    /// Kept in the offline queue under this identity.
    Queued(LocalId),
}

/// Collaborators supplied by the host.
pub struct Host {
    pub gateway: Rc<dyn Gateway>,
    pub storage: Rc<dyn KeyValueStore>,
    pub view: Rc<dyn View>,
    pub clock: Rc<dyn Clock>,
}

pub struct Inventory {
    config: ClientConfig,
    api: RemoteApi,
    view: Rc<dyn View>,
    clock: Rc<dyn Clock>,
    tokens: TokenStore,
    session: RefCell<Session>,
    queue: RefCell<QueueStore>,
    entries: RefCell<EntryBook>,
    sync: SyncEngine,
}

impl Inventory {
    /// Build the context and load the persisted offline queue.
    pub fn new(config: ClientConfig, host: Host) -> Self {
        let mut queue = QueueStore::new(host.storage.clone(), host.view.clone())
            .with_capacity(config.queue_capacity);
        queue.load(host.clock.now_utc());
        tracing::debug!(pending = queue.len(), "offline queue loaded");

        Self {
            config,
            api: RemoteApi::new(host.gateway),
            view: host.view,
            clock: host.clock,
            tokens: TokenStore::new(host.storage),
            session: RefCell::new(Session::default()),
            queue: RefCell::new(queue),
            entries: RefCell::new(EntryBook::new()),
            sync: SyncEngine::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.borrow().is_authenticated()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn pending_entries(&self) -> Vec<PendingEntry> {
        self.queue.borrow().snapshot()
    }

    /// Entries the current user may see, filtered.
    pub fn visible_entries(&self) -> Vec<Entry> {
        self.entries.borrow().visible()
    }

    pub fn is_syncing(&self) -> bool {
        self.sync.is_running()
    }

    /// Token for an API call, if an endpoint is configured and a user is
    /// signed in.
    pub fn api_token(&self) -> Option<String> {
        if !self.api.is_configured() {
            return None;
        }
        self.session.borrow().token().map(str::to_string)
    }

    /// Current token, or prompt for sign-in.
    pub fn ensure_auth(&self) -> Result<String> {
        let token = self.session.borrow().token().map(str::to_string);
        match token {
            Some(token) => Ok(token),
            None => {
                self.view.auth_screen(true, None);
                self.view.notify(Notice::error("Please sign in to continue."));
                Err(Error::NotAuthenticated)
            }
        }
    }

    /// Validate and submit the form. Any gateway failure queues the entry.
    pub async fn save_item(&self, draft: ItemDraft) -> Result<SaveOutcome> {
        let token = self.ensure_auth()?;

        let barcode = draft.barcode.trim().to_string();
        let room = draft.room.trim().to_string();
        if barcode.is_empty() {
            self.view
                .notify(Notice::error("Please scan or type a barcode."));
            self.view.focus(Field::Barcode);
            return Err(Error::MissingBarcode);
        }
        if room.is_empty() {
            self.view
                .notify(Notice::error("Please choose a room / location."));
            self.view.focus(Field::Room);
            return Err(Error::MissingRoom);
        }
        if !self.api.is_configured() {
            self.view
                .notify(Notice::error("Cannot save without API access."));
            return Err(Error::MissingApiUrl);
        }

        let mut entry = NewEntry::new(barcode, room)
            .with_notes(draft.notes.trim())
            .with_quantity(draft.quantity);
        if let Some(image) = draft.image_data_url.filter(|url| !url.is_empty()) {
            entry = entry.with_image(image);
        }

        let outcome = match self.api.save_entry(&token, &entry).await {
            Ok(saved) => {
                tracing::info!(barcode = %entry.barcode, room = %entry.room, "item saved");
                self.view.notify(Notice::success("Item saved."));
                self.view.vibrate(self.config.save_vibration());
                if let Some(saved) = &saved {
                    self.entries.borrow_mut().prepend(saved.clone());
                    self.render_entries();
                }
                SaveOutcome::Saved(saved)
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "save failed, queueing entry");
                let local_id = self.enqueue_offline_entry(entry);
                self.view.notify(Notice::info(
                    "Saved locally; will sync when back online.",
                ));
                SaveOutcome::Queued(local_id)
            }
        };
        self.view.clear_form();
        Ok(outcome)
    }

    /// Queue an entry for a later sync.
    pub fn enqueue_offline_entry(&self, entry: NewEntry) -> LocalId {
        let pending = PendingEntry::from_new(entry, self.clock.now_utc());
        let local_id = pending.local_id.clone();
        self.queue.borrow_mut().append(pending);
        tracing::info!(local_id = %local_id, pending = self.pending_count(), "entry queued offline");
        local_id
    }

    /// Drain the offline queue.
    ///
    /// A call made while a run is active is coalesced into a single rerun.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        let Some(mut token) = self.api_token() else {
            if self.api.is_configured() {
                let _ = self.ensure_auth();
            }
            self.view.notify(Notice::error(
                "Cannot sync queued items without API access.",
            ));
            return Err(Error::NoApiAccess);
        };
        if self.queue.borrow().is_empty() {
            self.view.notify(Notice::info("No queued items to sync."));
            return Ok(SyncOutcome::NothingToSync);
        }
        let Some(guard) = self.sync.try_begin() else {
            return Ok(SyncOutcome::Coalesced);
        };

        let mut report = SyncReport::default();
        loop {
            let pass = self
                .sync
                .run_pass(&self.queue, &self.api, &token, self.view.as_ref())
                .await;
            report.absorb(pass);

            if pass.synced > 0 {
                self.view
                    .notify(Notice::success(format!("Synced {} item(s).", pass.synced)));
                if let Err(e) = self.refresh_entries().await {
                    tracing::debug!(error = %e, "refresh after sync failed");
                }
            }

            let rerun = guard.take_rerun() && !self.queue.borrow().is_empty();
            if !rerun {
                break;
            }
            match self.api_token() {
                Some(current) => token = current,
                None => break,
            }
            tracing::debug!("running coalesced sync");
        }
        drop(guard);
        Ok(SyncOutcome::Completed(report))
    }

    /// Reload the entry list from the server.
    pub async fn refresh_entries(&self) -> Result<()> {
        let token = self.require_api("Cannot refresh entries without API access.")?;
        match self.api.list_entries(&token).await {
            Ok(entries) => {
                tracing::debug!(count = entries.len(), "entries refreshed");
                self.entries.borrow_mut().replace(entries);
                self.render_entries();
                self.view.notify(Notice::success("Entries refreshed."));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not refresh entries");
                self.view.notify(Notice::error("Could not refresh entries."));
                Err(e)
            }
        }
    }

    /// Change room, notes or quantity of an entry. Admin only.
    pub async fn update_entry(&self, update: EntryUpdate) -> Result<Entry> {
        let token = self.require_api("Cannot update entries without API access.")?;
        if !self.session.borrow().is_admin {
            return Err(Error::NotAdmin);
        }
        match self.api.update_entry(&token, &update).await {
            Ok(entry) => {
                if !self.entries.borrow_mut().update(entry.clone()) {
                    tracing::debug!(id = %update.id, "updated entry not in local list");
                }
                self.render_entries();
                self.view.notify(Notice::success("Entry updated."));
                Ok(entry)
            }
            Err(e) => {
                self.view
                    .notify(Notice::error(format!("Could not update entry: {e}")));
                Err(e)
            }
        }
    }

    /// Delete an entry. Admin only.
    pub async fn delete_entry(&self, id: &str) -> Result<()> {
        let token = self.require_api("Cannot delete entries without API access.")?;
        if !self.session.borrow().is_admin {
            return Err(Error::NotAdmin);
        }
        match self.api.delete_entry(&token, id).await {
            Ok(()) => {
                self.entries.borrow_mut().remove(id);
                self.render_entries();
                self.view.notify(Notice::success("Entry deleted."));
                Ok(())
            }
            Err(e) => {
                self.view
                    .notify(Notice::error(format!("Could not delete entry: {e}")));
                Err(e)
            }
        }
    }

    pub fn set_filter(&self, text: &str) {
        self.entries.borrow_mut().set_filter(text);
        self.render_entries();
    }

    /// Validate `token` against the server and adopt the user's data.
    ///
    /// Syncs right away when entries are waiting in the queue.
    pub async fn sign_in(&self, token: &str) -> Result<InitialData> {
        if !self.api.is_configured() {
            self.view
                .auth_screen(true, Some("Authentication requires the API URL."));
            return Err(Error::MissingApiUrl);
        }
        self.view.auth_screen(false, None);

        let data = match self.api.initial_data(token).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "sign-in failed");
                self.tokens.clear();
                self.session.borrow_mut().clear();
                self.view.auth_screen(true, Some(e.to_string().as_str()));
                return Err(e);
            }
        };

        self.tokens.store(token);
        {
            let mut session = self.session.borrow_mut();
            session.token = Some(token.to_string());
            session.apply(&data);
        }
        self.apply_initial_data(&data);
        self.view.auth_screen(false, None);
        tracing::info!(user = ?data.user_email, admin = data.is_admin, "signed in");

        if self.pending_count() > 0 {
            if let Err(e) = self.sync().await {
                tracing::debug!(error = %e, "sync after sign-in failed");
            }
        }
        Ok(data)
    }

    /// Sign in with the stored token. Returns false when there is none.
    pub async fn restore_session(&self) -> Result<bool> {
        match self.tokens.load() {
            Some(token) => self.sign_in(&token).await.map(|_| true),
            None => {
                self.view.auth_screen(true, None);
                Ok(false)
            }
        }
    }

    pub fn sign_out(&self) {
        self.tokens.clear();
        self.session.borrow_mut().clear();
        self.entries.borrow_mut().set_viewer(None, false);
        self.view.user_badge(None);
        self.view.auth_screen(true, None);
        tracing::info!("signed out");
    }

    fn apply_initial_data(&self, data: &InitialData) {
        {
            let mut entries = self.entries.borrow_mut();
            entries.replace(data.entries.clone());
            entries.set_filter("");
            entries.set_viewer(data.user_email.clone(), data.is_admin);
        }
        self.view.rooms(&data.rooms);
        self.view.user_badge(data.user_email.as_deref());
        self.render_entries();
    }

    fn require_api(&self, message: &str) -> Result<String> {
        if let Some(token) = self.api_token() {
            return Ok(token);
        }
        if self.api.is_configured() {
            let _ = self.ensure_auth();
        }
        self.view.notify(Notice::error(message));
        Err(Error::NoApiAccess)
    }

    fn render_entries(&self) {
        let visible = self.entries.borrow().visible();
        self.view.render_entries(&visible);
    }
}
