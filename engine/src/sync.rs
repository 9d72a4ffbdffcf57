//! Offline sync engine.
//!
//! A sync run drains a snapshot of the offline queue, submitting entries one
//! at a time. Entries that fail stay queued in their original order. Entries
//! appended to the live queue while the run was in flight are kept after the
//! survivors, so nothing captured during a sync is lost.
//!
//! Only one run is active at a time. A sync requested mid-run sets a single
//! rerun flag; however many requests arrive, the run repeats at most once.

use crate::entry::PendingEntry;
use crate::gateway::RemoteApi;
use crate::queue::QueueStore;
use crate::view::{Notice, View};
use crate::LocalId;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;

/// State of one pass over the queue snapshot.
#[derive(Debug, Clone, Default)]
pub struct SyncRun {
    /// Queue contents when the pass began
    pub items: Vec<PendingEntry>,
    pub snapshot_ids: HashSet<LocalId>,
    /// Entries that failed, in submission order
    pub remaining: Vec<PendingEntry>,
    pub success_count: usize,
}

impl SyncRun {
    pub fn new(items: Vec<PendingEntry>) -> Self {
        let snapshot_ids = items.iter().map(|e| e.local_id.clone()).collect();
        Self {
            items,
            snapshot_ids,
            remaining: Vec::new(),
            success_count: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_failure(&mut self, entry: PendingEntry) {
        self.remaining.push(entry);
    }

    /// The queue after this pass: survivors, then whatever was appended to
    /// `live` since the snapshot.
    pub fn merge(&self, live: &[PendingEntry]) -> Vec<PendingEntry> {
        reconcile(&self.remaining, &self.snapshot_ids, live)
    }
}

/// `remaining ++ [e in live | e.localId not in snapshot_ids]`.
pub fn reconcile(
    remaining: &[PendingEntry],
    snapshot_ids: &HashSet<LocalId>,
    live: &[PendingEntry],
) -> Vec<PendingEntry> {
    remaining
        .iter()
        .chain(live.iter().filter(|e| !snapshot_ids.contains(&e.local_id)))
        .cloned()
        .collect()
}

/// Counts from a completed sync, summed over reruns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    /// Entries appended while a pass was running
    pub appended: usize,
    pub passes: usize,
}

impl SyncReport {
    pub fn absorb(&mut self, other: SyncReport) {
        self.attempted += other.attempted;
        self.synced += other.synced;
        self.failed += other.failed;
        self.appended += other.appended;
        self.passes += other.passes;
    }
}

/// What a call to sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// A run was already active; it will repeat once it finishes.
    Coalesced,
    /// The queue was empty.
    NothingToSync,
}

/// Run exclusivity and the rerun flag.
#[derive(Debug, Default)]
pub struct SyncEngine {
    in_progress: Cell<bool>,
    rerun_requested: Cell<bool>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.get()
    }

    pub fn rerun_requested(&self) -> bool {
        self.rerun_requested.get()
    }

    /// Claim the engine for a run.
    ///
    /// Returns `None` and records a rerun when a run is already active. The
    /// guard releases the engine when dropped, even if the run is abandoned.
    pub fn try_begin(&self) -> Option<SyncGuard<'_>> {
        if self.in_progress.get() {
            self.rerun_requested.set(true);
            tracing::debug!("sync already running, rerun requested");
            return None;
        }
        self.in_progress.set(true);
        self.rerun_requested.set(false);
        Some(SyncGuard { engine: self })
    }

    /// Submit one snapshot of `queue` and reconcile the live queue.
    pub async fn run_pass(
        &self,
        queue: &RefCell<QueueStore>,
        api: &RemoteApi,
        token: &str,
        view: &dyn View,
    ) -> SyncReport {
        let mut run = SyncRun::new(queue.borrow().snapshot());
        view.notify(Notice::info(format!(
            "Syncing {} queued item(s)\u{2026}",
            run.items.len()
        )));

        let items = run.items.clone();
        for item in items {
            match api.save_entry(token, &item).await {
                Ok(_) => run.record_success(),
                Err(e) => {
                    tracing::warn!(local_id = %item.local_id, error = %e, "failed to sync queued item");
                    run.record_failure(item);
                }
            }
        }

        let live = queue.borrow().snapshot();
        let merged = run.merge(&live);
        let appended = merged.len() - run.remaining.len();
        queue.borrow_mut().save(merged);

        let report = SyncReport {
            attempted: run.items.len(),
            synced: run.success_count,
            failed: run.remaining.len(),
            appended,
            passes: 1,
        };
        tracing::info!(
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed,
            appended = report.appended,
            "sync pass finished"
        );
        report
    }
}

/// Holds the engine while a run is active.
pub struct SyncGuard<'a> {
    engine: &'a SyncEngine,
}

impl SyncGuard<'_> {
    /// Consume a pending rerun request.
    pub fn take_rerun(&self) -> bool {
        self.engine.rerun_requested.replace(false)
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.engine.in_progress.set(false);
        self.engine.rerun_requested.set(false);
    }
}
