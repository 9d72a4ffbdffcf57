//! Local queue store - the persisted list of pending entries.
//!
//! The queue lives in memory and is mirrored to a single key of the host's
//! key-value store after every mutation. Storage failures never reach the
//! caller: the queue keeps working in memory for the rest of the session.

use crate::clock::iso8601;
use crate::entry::{
    generate_local_id, quantity_from_value, repaired_local_id, text_from_value, PendingEntry,
};
use crate::storage::{KeyValueStore, OFFLINE_QUEUE_KEY};
use crate::view::View;
use crate::LocalId;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::rc::Rc;

/// Maximum number of pending entries kept.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Bounded, persisted FIFO of [`PendingEntry`].
pub struct QueueStore {
    storage: Rc<dyn KeyValueStore>,
    view: Rc<dyn View>,
    key: String,
    capacity: usize,
    entries: Vec<PendingEntry>,
}

impl QueueStore {
    /// Create an empty queue backed by `storage`. Call [`QueueStore::load`]
    /// to read what was persisted.
    pub fn new(storage: Rc<dyn KeyValueStore>, view: Rc<dyn View>) -> Self {
        Self {
            storage,
            view,
            key: OFFLINE_QUEUE_KEY.to_string(),
            capacity: DEFAULT_QUEUE_CAPACITY,
            entries: Vec::new(),
        }
    }

    /// Override the capacity. Values below 1 are raised to 1.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Override the storage key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> &[PendingEntry] {
        &self.entries
    }

    /// Ordered copy of the current queue.
    pub fn snapshot(&self) -> Vec<PendingEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, local_id: &str) -> bool {
        self.entries.iter().any(|e| e.local_id == local_id)
    }

    /// Read the persisted queue, repairing entries as needed.
    ///
    /// Any storage or parse failure yields an empty queue. If any entry was
    /// repaired or dropped, the repaired list is written back.
    pub fn load(&mut self, now: DateTime<Utc>) -> &[PendingEntry] {
        let (entries, repaired) = match self.storage.get(&self.key) {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(items)) => repair_entries(items, now),
                Ok(_) => {
                    tracing::warn!(key = %self.key, "offline queue is not a list, ignoring");
                    (Vec::new(), false)
                }
                Err(e) => {
                    tracing::warn!(key = %self.key, error = %e, "offline queue is not valid JSON");
                    (Vec::new(), false)
                }
            },
            Ok(None) => (Vec::new(), false),
            Err(e) => {
                tracing::warn!(error = %e, "offline queue storage unavailable");
                (Vec::new(), false)
            }
        };

        self.entries = entries;
        if repaired {
            tracing::debug!(count = self.entries.len(), "repaired offline queue");
            self.persist();
        }
        self.notify_badge();
        &self.entries
    }

    /// Replace the queue with `entries` and persist.
    pub fn save(&mut self, entries: Vec<PendingEntry>) {
        self.entries = entries;
        self.persist();
        self.notify_badge();
    }

    /// Append an entry, evicting the oldest while the queue is full.
    pub fn append(&mut self, entry: PendingEntry) {
        while self.entries.len() >= self.capacity {
            let evicted = self.entries.remove(0);
            tracing::info!(local_id = %evicted.local_id, "offline queue full, evicting oldest entry");
        }
        self.entries.push(entry);
        self.persist();
        self.notify_badge();
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.entries) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize offline queue");
                return;
            }
        };
        if let Err(e) = self.storage.set(&self.key, &json) {
            tracing::warn!(error = %e, "failed to persist offline queue, keeping it in memory");
        }
    }

    fn notify_badge(&self) {
        self.view.pending_badge(self.entries.len());
    }
}

/// Repair raw stored entries.
///
/// Returns the decoded entries and whether anything had to change. Fixes
/// missing or duplicate `localId`, missing or malformed `quantity` and
/// `createdAt`, numeric or missing text fields and empty `imageDataUrl`.
/// Only elements that are not objects are dropped.
pub fn repair_entries(items: Vec<Value>, now: DateTime<Utc>) -> (Vec<PendingEntry>, bool) {
    let mut repaired = false;
    let mut seen: HashSet<LocalId> = HashSet::new();

    // Ids already present win over synthesized ones.
    let existing: HashSet<LocalId> = items
        .iter()
        .filter_map(|v| v.get("localId").and_then(text_from_value))
        .filter(|id| !id.is_empty())
        .collect();

    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(mut obj) = item else {
            tracing::warn!(index, "dropping non-object offline queue element");
            repaired = true;
            continue;
        };

        if repair_object(&mut obj, index, &now, &existing, &seen) {
            repaired = true;
        }

        match serde_json::from_value::<PendingEntry>(Value::Object(obj)) {
            Ok(entry) => {
                seen.insert(entry.local_id.clone());
                entries.push(entry);
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "dropping undecodable offline queue element");
                repaired = true;
            }
        }
    }

    (entries, repaired)
}

fn repair_object(
    obj: &mut Map<String, Value>,
    index: usize,
    now: &DateTime<Utc>,
    existing: &HashSet<LocalId>,
    seen: &HashSet<LocalId>,
) -> bool {
    let mut repaired = false;
    let now_iso = iso8601(now);

    let created_ok = obj
        .get("createdAt")
        .and_then(Value::as_str)
        .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok());
    if !created_ok {
        obj.insert("createdAt".into(), Value::String(now_iso.to_string()));
        repaired = true;
    }
    let created_at = obj
        .get("createdAt")
        .and_then(Value::as_str)
        .unwrap_or(&now_iso)
        .to_string();

    if obj.get("localId").is_some_and(|v| !v.is_string()) {
        match obj.get("localId").and_then(text_from_value) {
            Some(id) => obj.insert("localId".into(), Value::String(id)),
            None => obj.remove("localId"),
        };
        repaired = true;
    }
    let id = obj
        .get("localId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    let needs_id = match &id {
        Some(id) => seen.contains(id),
        None => true,
    };
    if needs_id {
        let mut candidate = repaired_local_id(&created_at, index);
        if existing.contains(&candidate) || seen.contains(&candidate) {
            let at = DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(*now);
            candidate = generate_local_id(&at);
        }
        obj.insert("localId".into(), Value::String(candidate));
        repaired = true;
    }

    let quantity = obj.get("quantity").cloned().unwrap_or(Value::Null);
    let fixed = quantity_from_value(&quantity).unwrap_or(1);
    if quantity.as_u64() != Some(u64::from(fixed)) {
        obj.insert("quantity".into(), Value::from(fixed));
        repaired = true;
    }

    for field in ["barcode", "room", "notes"] {
        if ensure_text(obj, field) {
            repaired = true;
        }
    }

    let empty_image = obj
        .get("imageDataUrl")
        .is_some_and(|v| !matches!(v, Value::String(s) if !s.is_empty()));
    if empty_image {
        obj.remove("imageDataUrl");
        repaired = true;
    }

    repaired
}

/// Make `field` a string. Numbers and booleans are formatted, anything else
/// becomes empty. Returns whether the value changed.
fn ensure_text(obj: &mut Map<String, Value>, field: &str) -> bool {
    if obj.get(field).is_some_and(Value::is_string) {
        return false;
    }
    let text = obj.get(field).and_then(text_from_value).unwrap_or_default();
    obj.insert(field.into(), Value::String(text));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::millis_to_utc;
    use crate::entry::NewEntry;
    use crate::storage::MemoryStore;
    use crate::view::RecordingView;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        millis_to_utc(1_706_788_800_000)
    }

    fn pending(barcode: &str) -> PendingEntry {
        PendingEntry::from_new(NewEntry::new(barcode, "A"), now())
    }

    fn queue_with(storage: Rc<MemoryStore>, view: Rc<RecordingView>) -> QueueStore {
        QueueStore::new(storage, view)
    }

    #[test]
    fn load_empty_storage() {
        let storage = Rc::new(MemoryStore::new());
        let view = Rc::new(RecordingView::new());
        let mut queue = queue_with(storage.clone(), view.clone());

        assert!(queue.load(now()).is_empty());
        assert_eq!(view.last_badge(), Some(0));
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn append_persists_and_updates_badge() {
        let storage = Rc::new(MemoryStore::new());
        let view = Rc::new(RecordingView::new());
        let mut queue = queue_with(storage.clone(), view.clone());

        queue.append(pending("123"));

        assert_eq!(queue.len(), 1);
        assert_eq!(view.last_badge(), Some(1));
        let raw = storage.raw(OFFLINE_QUEUE_KEY).unwrap();
        let stored: Vec<PendingEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored, queue.snapshot());
    }

    #[test]
    fn append_beyond_capacity_evicts_oldest() {
        let storage = Rc::new(MemoryStore::new());
        let view = Rc::new(RecordingView::new());
        let mut queue = queue_with(storage, view.clone());

        for i in 0..60 {
            queue.append(pending(&format!("code-{i}")));
        }

        assert_eq!(queue.len(), 50);
        assert_eq!(queue.entries()[0].barcode, "code-10");
        assert_eq!(queue.entries()[49].barcode, "code-59");
        assert_eq!(view.last_badge(), Some(50));
    }

    #[test]
    fn append_trims_an_overfull_queue_back_to_capacity() {
        let storage = Rc::new(MemoryStore::new());
        let view = Rc::new(RecordingView::new());
        let mut queue = queue_with(storage, view).with_capacity(3);

        queue.save((0..5).map(|i| pending(&i.to_string())).collect());
        queue.append(pending("new"));

        let barcodes: Vec<_> = queue.entries().iter().map(|e| e.barcode.as_str()).collect();
        assert_eq!(barcodes, vec!["3", "4", "new"]);
    }

    #[test]
    fn load_roundtrips_saved_entries() {
        let storage = Rc::new(MemoryStore::new());
        let view = Rc::new(RecordingView::new());
        let mut queue = queue_with(storage.clone(), view.clone());
        queue.append(pending("a"));
        queue.append(pending("b"));
        let saved = queue.snapshot();
        let writes = storage.write_count();

        let mut reloaded = queue_with(storage.clone(), view);
        assert_eq!(reloaded.load(now()), saved.as_slice());
        assert_eq!(storage.write_count(), writes);
    }

    #[test]
    fn load_repairs_missing_id_and_quantity() {
        let storage = Rc::new(MemoryStore::new());
        let view = Rc::new(RecordingView::new());
        storage.insert_raw(
            OFFLINE_QUEUE_KEY,
            &json!([
                {"barcode": "1", "room": "A", "createdAt": "2024-02-01T12:00:00.000Z"},
                {"localId": "keep-me", "barcode": "2", "room": "B", "quantity": "",
                 "createdAt": "2024-02-01T12:00:00.000Z", "imageDataUrl": ""}
            ])
            .to_string(),
        );

        let mut queue = queue_with(storage.clone(), view.clone());
        let entries = queue.load(now()).to_vec();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].local_id, "offline_20240201120000000_0");
        assert_eq!(entries[0].quantity, 1);
        assert_eq!(entries[1].local_id, "keep-me");
        assert_eq!(entries[1].quantity, 1);
        assert_eq!(entries[1].image_data_url, None);
        assert_eq!(view.last_badge(), Some(2));

        // Repairs were written back.
        let raw = storage.raw(OFFLINE_QUEUE_KEY).unwrap();
        let stored: Vec<PendingEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored, entries);
    }

    #[test]
    fn load_drops_only_non_object_elements() {
        let storage = Rc::new(MemoryStore::new());
        let view = Rc::new(RecordingView::new());
        storage.insert_raw(
            OFFLINE_QUEUE_KEY,
            &json!([42, {"room": "no barcode"}, {"barcode": "ok", "room": "A"}]).to_string(),
        );

        let mut queue = queue_with(storage, view);
        let entries = queue.load(now());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].barcode, "");
        assert_eq!(entries[0].room, "no barcode");
        assert_eq!(entries[1].barcode, "ok");
    }

    #[test]
    fn repair_formats_numeric_fields() {
        let (entries, repaired) = repair_entries(
            vec![json!({"localId": 7, "barcode": 4006381333931u64, "room": null,
                        "notes": 12, "imageDataUrl": false,
                        "createdAt": "2024-02-01T12:00:00.000Z"})],
            now(),
        );

        assert!(repaired);
        assert_eq!(entries[0].local_id, "7");
        assert_eq!(entries[0].barcode, "4006381333931");
        assert_eq!(entries[0].room, "");
        assert_eq!(entries[0].notes, "12");
        assert_eq!(entries[0].image_data_url, None);
    }

    #[test]
    fn load_reassigns_duplicate_ids() {
        let storage = Rc::new(MemoryStore::new());
        let view = Rc::new(RecordingView::new());
        storage.insert_raw(
            OFFLINE_QUEUE_KEY,
            &json!([
                {"localId": "dup", "barcode": "1", "room": "A", "quantity": 1,
                 "createdAt": "2024-02-01T12:00:00.000Z"},
                {"localId": "dup", "barcode": "2", "room": "A", "quantity": 1,
                 "createdAt": "2024-02-01T12:00:00.000Z"}
            ])
            .to_string(),
        );

        let mut queue = queue_with(storage, view);
        let entries = queue.load(now());

        assert_eq!(entries[0].local_id, "dup");
        assert_ne!(entries[1].local_id, "dup");
    }

    #[test]
    fn load_tolerates_garbage_and_unavailable_storage() {
        let view = Rc::new(RecordingView::new());

        let storage = Rc::new(MemoryStore::new());
        storage.insert_raw(OFFLINE_QUEUE_KEY, "{not json");
        let mut queue = queue_with(storage, view.clone());
        assert!(queue.load(now()).is_empty());

        let storage = Rc::new(MemoryStore::new());
        storage.insert_raw(OFFLINE_QUEUE_KEY, r#"{"barcode": "x"}"#);
        let mut queue = queue_with(storage, view.clone());
        assert!(queue.load(now()).is_empty());

        let storage = Rc::new(MemoryStore::unavailable());
        let mut queue = queue_with(storage, view);
        assert!(queue.load(now()).is_empty());
    }

    #[test]
    fn write_failure_keeps_queue_in_memory() {
        let storage = Rc::new(MemoryStore::new());
        storage.set_fail_writes(true);
        let view = Rc::new(RecordingView::new());
        let mut queue = queue_with(storage.clone(), view.clone());

        queue.append(pending("123"));

        assert_eq!(queue.len(), 1);
        assert_eq!(view.last_badge(), Some(1));
        assert_eq!(storage.raw(OFFLINE_QUEUE_KEY), None);
    }

    #[test]
    fn save_replaces_contents() {
        let storage = Rc::new(MemoryStore::new());
        let view = Rc::new(RecordingView::new());
        let mut queue = queue_with(storage, view.clone());
        queue.append(pending("a"));

        queue.save(Vec::new());

        assert!(queue.is_empty());
        assert_eq!(view.last_badge(), Some(0));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_append_respects_capacity(
                capacity in 1usize..20,
                appends in 0usize..60,
            ) {
                let storage = Rc::new(MemoryStore::new());
                let view = Rc::new(RecordingView::new());
                let mut queue = queue_with(storage, view.clone()).with_capacity(capacity);

                for i in 0..appends {
                    queue.append(pending(&i.to_string()));
                    prop_assert!(queue.len() <= capacity);
                }

                // The newest entries survive, oldest first.
                let expected: Vec<String> = (appends.saturating_sub(capacity)..appends)
                    .map(|i| i.to_string())
                    .collect();
                let barcodes: Vec<String> = queue.entries().iter().map(|e| e.barcode.clone()).collect();
                prop_assert_eq!(barcodes, expected);
                prop_assert_eq!(view.last_badge(), if appends == 0 { None } else { Some(queue.len()) });
            }
        }
    }
}
