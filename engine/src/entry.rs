//! Entry types captured on the device.
//!
//! A [`NewEntry`] is what the user submits. When the submission cannot reach
//! the server it becomes a [`PendingEntry`], which gains a local identity and
//! a creation timestamp and waits in the offline queue.

use crate::clock::iso8601;
use crate::LocalId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of every locally generated identity.
pub const LOCAL_ID_PREFIX: &str = "offline_";

/// Payload submitted to `saveEntry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub barcode: String,
    pub room: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data_url: Option<String>,
}

impl NewEntry {
    /// Create an entry with quantity 1, no notes and no photo.
    pub fn new(barcode: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            barcode: barcode.into(),
            room: room.into(),
            notes: String::new(),
            quantity: 1,
            image_data_url: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Set the quantity. Zero is raised to 1.
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity.max(1);
        self
    }

    pub fn with_image(mut self, data_url: impl Into<String>) -> Self {
        self.image_data_url = Some(data_url.into());
        self
    }
}

/// An entry captured while offline or after a failed save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    /// Identity used for reconciliation. Assigned once, never changed.
    pub local_id: LocalId,
    pub barcode: String,
    pub room: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingEntry {
    /// Turn a submission into a pending entry created at `created_at`.
    pub fn from_new(entry: NewEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            local_id: generate_local_id(&created_at),
            barcode: entry.barcode,
            room: entry.room,
            notes: entry.notes,
            quantity: entry.quantity.max(1),
            image_data_url: entry.image_data_url.filter(|url| !url.is_empty()),
            created_at,
        }
    }
}

fn default_quantity() -> u32 {
    1
}

/// Compact form of an ISO timestamp: `2024-02-01T12:00:00.000Z` becomes
/// `20240201120000000`.
fn compact_stamp(iso: &str) -> String {
    iso.chars()
        .filter(|c| !matches!(c, ':' | '.' | 'T' | 'Z' | '-'))
        .collect()
}

/// Build a fresh identity: `offline_<stamp>_<random hex>`.
///
/// The random suffix is a v4 UUID in simple form, so two entries created in
/// the same millisecond never collide.
pub fn generate_local_id(created_at: &DateTime<Utc>) -> LocalId {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}{}_{}",
        LOCAL_ID_PREFIX,
        compact_stamp(&iso8601(created_at)),
        suffix
    )
}

/// Identity for a stored entry that lacks one: `offline_<stamp>_<index>`.
pub fn repaired_local_id(created_at: &str, index: usize) -> LocalId {
    format!("{}{}_{}", LOCAL_ID_PREFIX, compact_stamp(created_at), index)
}

/// Read a quantity from loosely typed JSON.
///
/// Accepts integers, floats and numeric strings. Values below 1 clamp to 1.
/// Returns `None` for null, empty strings and anything unparseable.
pub fn quantity_from_value(value: &Value) -> Option<u32> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }?;
    Some(parsed.clamp(1, i64::from(u32::MAX)) as u32)
}

/// Read a text field from loosely typed JSON.
///
/// Spreadsheet-backed endpoints send numeric barcodes and ids as numbers.
/// Strings pass through, numbers and booleans are formatted. Returns `None`
/// for null, arrays and objects.
pub fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
