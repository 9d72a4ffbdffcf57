//! # Tally Engine
//!
//! Core of an inventory capture client: scan a barcode, pick a room, save the
//! item to a remote API, and keep it locally when the API is out of reach.
//!
//! ## Design Principles
//!
//! - **No IO**: storage, transport, camera, clock and view are traits the host supplies
//! - **Single-threaded**: state lives in `Cell`/`RefCell`; async seams are `LocalBoxFuture`
//! - **Nothing lost**: a failed save is queued, a failed sync keeps the entry
//! - **Testable**: every collaborator has an in-memory double behind the `test-util` feature
//!
//! ## Core Concepts
//!
//! ### Offline Queue
//!
//! [`QueueStore`] is a bounded (50 by default) FIFO of [`PendingEntry`],
//! mirrored to one key of a [`KeyValueStore`]. Each entry carries a local
//! identity assigned once at creation, the only key used to reconcile it.
//!
//! ### Sync
//!
//! [`Inventory::sync`] submits a snapshot of the queue entry by entry.
//! Failures stay queued in order; entries appended mid-run are kept after
//! them. Concurrent requests coalesce into a single rerun.
//!
//! ### Scanner
//!
//! [`ScannerSession`] drives a camera through
//! `Idle -> Requesting -> Scanning <-> Detected -> Idle`, suppressing repeats
//! within a cooldown and probing the active track for torch support.
//! [`ScannerSheet`] hosts a session and closes it after a detection.
//!
//! ### Gateway
//!
//! All server traffic is `call(action, token, payload)` answered with an
//! `{ok, data | error}` envelope. See [`Gateway`] and [`RemoteApi`].
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use serde_json::json;
//! use futures::executor::block_on;
//! use tally_engine::{
//!     Action, ClientConfig, Error, Host, Inventory, ItemDraft, ManualClock, MemoryStore,
//!     RecordingView, SaveOutcome, ScriptedGateway, SyncOutcome,
//! };
//!
//! let online = Rc::new(std::cell::Cell::new(false));
//! let gateway = {
//!     let online = online.clone();
//!     ScriptedGateway::new(move |action, _payload| match action {
//!         Action::GetInitialData => Ok(json!({"userEmail": "ann@example.com", "rooms": ["Office"]})),
//!         Action::SaveEntry if online.get() => Ok(json!({"id": "srv-1"})),
//!         Action::SaveEntry => Err(Error::Network("offline".into())),
//!         _ => Ok(json!([])),
//!     })
//! };
//!
//! let view = Rc::new(RecordingView::new());
//! let inventory = Inventory::new(
//!     ClientConfig::default(),
//!     Host {
//!         gateway: Rc::new(gateway),
//!         storage: Rc::new(MemoryStore::new()),
//!         view: view.clone(),
//!         clock: Rc::new(ManualClock::new(1706788800000)),
//!     },
//! );
//!
//! block_on(async {
//!     inventory.sign_in("token").await.unwrap();
//!
//!     // Offline: the save lands in the queue.
//!     let outcome = inventory.save_item(ItemDraft::new("123", "Office")).await.unwrap();
//!     assert!(matches!(outcome, SaveOutcome::Queued(_)));
//!     assert_eq!(inventory.pending_count(), 1);
//!
//!     // Back online: sync drains it.
//!     online.set(true);
//!     let outcome = inventory.sync().await.unwrap();
//!     assert!(matches!(outcome, SyncOutcome::Completed(report) if report.synced == 1));
//!     assert_eq!(inventory.pending_count(), 0);
//!     assert_eq!(view.last_badge(), Some(0));
//! });
//! ```

pub mod auth;
pub mod clock;
pub mod config;
pub mod entries;
pub mod entry;
pub mod error;
pub mod gateway;
pub mod image;
pub mod inventory;
pub mod queue;
pub mod scanner;
pub mod storage;
pub mod sync;
pub mod view;

// Re-export main types at crate root
pub use auth::{Session, TokenStore};
pub use clock::Clock;
pub use config::{ClientConfig, ScannerConfig};
pub use entries::{Entry, EntryBook, EntryUpdate};
pub use entry::{NewEntry, PendingEntry, LOCAL_ID_PREFIX};
pub use error::{Error, ErrorKind, Result};
pub use gateway::{Action, ApiRequest, Gateway, InitialData, RemoteApi};
pub use inventory::{Host, Inventory, ItemDraft, SaveOutcome};
pub use queue::{QueueStore, DEFAULT_QUEUE_CAPACITY};
pub use scanner::{
    CameraBackend, CloseFocus, Detection, ScanState, ScannerSession, ScannerSheet,
    StreamConstraints, TorchStatus, TrackCapabilities, VideoInput, VideoStream, VideoTrack,
};
pub use storage::{KeyValueStore, AUTH_TOKEN_KEY, OFFLINE_QUEUE_KEY};
pub use sync::{SyncEngine, SyncOutcome, SyncReport, SyncRun};
pub use view::{Field, Notice, NoticeLevel, NullView, ScanBadge, TorchControl, View};

// In-memory doubles for every collaborator
#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
#[cfg(any(test, feature = "test-util"))]
pub use gateway::ScriptedGateway;
#[cfg(any(test, feature = "test-util"))]
pub use scanner::FakeCamera;
#[cfg(any(test, feature = "test-util"))]
pub use storage::MemoryStore;
#[cfg(any(test, feature = "test-util"))]
pub use view::RecordingView;

/// Type aliases for clarity
pub type LocalId = String;
pub type Timestamp = u64;
