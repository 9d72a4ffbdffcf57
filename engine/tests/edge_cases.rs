//! Edge case tests for tally-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use serde_json::json;
use std::rc::Rc;
use tally_engine::clock::millis_to_utc;
use tally_engine::gateway::{decode_body, diagnostic_snippet, SNIPPET_LIMIT};
use tally_engine::queue::repair_entries;
use tally_engine::{
    Entry, EntryBook, Error, MemoryStore, NewEntry, NullView, PendingEntry, QueueStore,
    RecordingView, OFFLINE_QUEUE_KEY,
};

fn now() -> chrono::DateTime<chrono::Utc> {
    millis_to_utc(1_706_788_800_000)
}

fn pending(barcode: &str) -> PendingEntry {
    PendingEntry::from_new(NewEntry::new(barcode, "A"), now())
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[test]
fn unicode_barcodes_roundtrip_through_storage() {
    let storage = Rc::new(MemoryStore::new());
    let mut queue = QueueStore::new(storage.clone(), Rc::new(NullView));

    let codes = vec![
        "日本語テスト",
        "Привет мир",
        "🎉🚀💯",
        "Hello\nWorld\tTab",
        "Null\0Test",
    ];
    for code in &codes {
        queue.append(pending(code));
    }

    let mut reloaded = QueueStore::new(storage, Rc::new(NullView));
    let stored: Vec<&str> = reloaded
        .load(now())
        .iter()
        .map(|e| e.barcode.as_str())
        .collect();
    assert_eq!(stored, codes);
}

#[test]
fn snippet_counts_characters_not_bytes() {
    let body = "é".repeat(400);
    let snippet = diagnostic_snippet(&body);
    assert_eq!(snippet.chars().count(), SNIPPET_LIMIT);
}

#[test]
fn snippet_of_whitespace_only_body_is_empty() {
    match decode_body("   \n\t  ") {
        Err(Error::NonJsonResponse { snippet }) => assert_eq!(snippet, ""),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn empty_body_is_not_json() {
    assert!(matches!(
        decode_body(""),
        Err(Error::NonJsonResponse { .. })
    ));
}

#[test]
fn json_without_ok_is_api_error() {
    assert_eq!(
        decode_body(r#"{"data": 1}"#).unwrap_err(),
        Error::Api("API error".into())
    );
    assert_eq!(
        decode_body("[1, 2]").unwrap_err(),
        Error::Api("API error".into())
    );
}

// ============================================================================
// Queue Boundaries
// ============================================================================

#[test]
fn capacity_of_one_keeps_latest() {
    let mut queue = QueueStore::new(Rc::new(MemoryStore::new()), Rc::new(NullView)).with_capacity(1);
    queue.append(pending("a"));
    queue.append(pending("b"));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.entries()[0].barcode, "b");
}

#[test]
fn zero_capacity_is_raised_to_one() {
    let queue = QueueStore::new(Rc::new(MemoryStore::new()), Rc::new(NullView)).with_capacity(0);
    assert_eq!(queue.capacity(), 1);
}

#[test]
fn exactly_full_queue_evicts_one() {
    let mut queue = QueueStore::new(Rc::new(MemoryStore::new()), Rc::new(NullView));
    for i in 0..50 {
        queue.append(pending(&i.to_string()));
    }
    assert_eq!(queue.len(), 50);
    assert_eq!(queue.entries()[0].barcode, "0");

    queue.append(pending("50"));
    assert_eq!(queue.len(), 50);
    assert_eq!(queue.entries()[0].barcode, "1");
}

#[test]
fn empty_stored_list_is_not_rewritten() {
    let storage = Rc::new(MemoryStore::new());
    storage.insert_raw(OFFLINE_QUEUE_KEY, "[]");
    let view = Rc::new(RecordingView::new());
    let mut queue = QueueStore::new(storage.clone(), view.clone());

    assert!(queue.load(now()).is_empty());
    assert_eq!(storage.write_count(), 0);
    assert_eq!(view.last_badge(), Some(0));
}

#[test]
fn oversized_stored_queue_loads_as_is() {
    let storage = Rc::new(MemoryStore::new());
    let entries: Vec<PendingEntry> = (0..70).map(|i| pending(&i.to_string())).collect();
    storage.insert_raw(OFFLINE_QUEUE_KEY, &serde_json::to_string(&entries).unwrap());

    let mut queue = QueueStore::new(storage, Rc::new(NullView));
    assert_eq!(queue.load(now()).len(), 70);

    // The next append trims back to capacity.
    queue.append(pending("new"));
    assert_eq!(queue.len(), 50);
    assert_eq!(queue.entries()[49].barcode, "new");
}

// ============================================================================
// Repair
// ============================================================================

#[test]
fn repair_quantity_variants() {
    let items = vec![
        json!({"localId": "a", "barcode": "1", "room": "A", "createdAt": "2024-02-01T12:00:00.000Z", "quantity": null}),
        json!({"localId": "b", "barcode": "2", "room": "A", "createdAt": "2024-02-01T12:00:00.000Z", "quantity": "7"}),
        json!({"localId": "c", "barcode": "3", "room": "A", "createdAt": "2024-02-01T12:00:00.000Z", "quantity": 0}),
        json!({"localId": "d", "barcode": "4", "room": "A", "createdAt": "2024-02-01T12:00:00.000Z", "quantity": 3}),
    ];
    let (entries, repaired) = repair_entries(items, now());

    assert!(repaired);
    let quantities: Vec<u32> = entries.iter().map(|e| e.quantity).collect();
    assert_eq!(quantities, vec![1, 7, 1, 3]);
}

#[test]
fn repair_fills_missing_created_at() {
    let items = vec![json!({"localId": "a", "barcode": "1", "room": "A", "quantity": 1})];
    let (entries, repaired) = repair_entries(items, now());

    assert!(repaired);
    assert_eq!(entries[0].created_at, now());
}

#[test]
fn repair_null_notes_become_empty() {
    let items = vec![json!({
        "localId": "a", "barcode": "1", "room": "A", "quantity": 1,
        "createdAt": "2024-02-01T12:00:00.000Z", "notes": null
    })];
    let (entries, repaired) = repair_entries(items, now());

    assert!(repaired);
    assert_eq!(entries[0].notes, "");
}

#[test]
fn numeric_barcode_survives_reload() {
    let storage = Rc::new(MemoryStore::new());
    storage.insert_raw(
        OFFLINE_QUEUE_KEY,
        &json!([
            {"localId": "a", "barcode": 4006381333931u64, "room": null, "quantity": 2,
             "createdAt": "2024-02-01T12:00:00.000Z"},
            "junk"
        ])
        .to_string(),
    );
    let mut queue = QueueStore::new(storage.clone(), Rc::new(NullView));

    let entries = queue.load(now());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].barcode, "4006381333931");
    assert_eq!(entries[0].room, "");
    assert_eq!(entries[0].quantity, 2);

    // The repaired form is written back.
    let raw: serde_json::Value =
        serde_json::from_str(&storage.raw(OFFLINE_QUEUE_KEY).unwrap()).unwrap();
    assert_eq!(raw[0]["barcode"], "4006381333931");
    assert_eq!(raw[0]["room"], "");
    assert_eq!(raw.as_array().unwrap().len(), 1);
}

#[test]
fn repaired_id_avoids_existing_collision() {
    // The second element would be assigned "offline_20240201120000000_1",
    // which the first element already uses.
    let items = vec![
        json!({"localId": "offline_20240201120000000_1", "barcode": "1", "room": "A",
               "quantity": 1, "createdAt": "2024-02-01T12:00:00.000Z"}),
        json!({"barcode": "2", "room": "A", "quantity": 1, "createdAt": "2024-02-01T12:00:00.000Z"}),
    ];
    let (entries, _) = repair_entries(items, now());

    assert_eq!(entries.len(), 2);
    assert_ne!(entries[0].local_id, entries[1].local_id);
    assert!(entries[1].local_id.starts_with("offline_20240201120000000_"));
}

#[test]
fn well_formed_entries_need_no_repair() {
    let entries = vec![pending("1"), pending("2")];
    let items = entries
        .iter()
        .map(|e| serde_json::to_value(e).unwrap())
        .collect();
    let (repaired_entries, repaired) = repair_entries(items, now());

    assert!(!repaired);
    assert_eq!(repaired_entries, entries);
}

// ============================================================================
// Entry Visibility
// ============================================================================

#[test]
fn entries_without_email_hidden_from_non_admins() {
    let mut book = EntryBook::new();
    book.replace(vec![
        serde_json::from_value::<Entry>(json!({"id": "1"})).unwrap(),
        serde_json::from_value::<Entry>(json!({"id": "2", "userEmail": "me@x.io"})).unwrap(),
    ]);
    book.set_viewer(Some("me@x.io".into()), false);

    let visible: Vec<String> = book.visible().into_iter().map(|e| e.id).collect();
    assert_eq!(visible, vec!["2"]);
}

#[test]
fn whitespace_filter_matches_everything() {
    let mut book = EntryBook::new();
    book.replace(vec![serde_json::from_value::<Entry>(json!({"id": "1"})).unwrap()]);
    book.set_filter("   ");
    assert_eq!(book.visible().len(), 1);
}
