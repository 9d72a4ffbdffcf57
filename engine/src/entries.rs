//! Server-side entries and the visible entry list.

use crate::entry::{quantity_from_value, text_from_value};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// An entry persisted by the server.
///
/// Decoding is lenient: text fields accept numbers, and a missing or
/// malformed quantity reads as 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Server-assigned identity
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub barcode: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub room: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub notes: String,
    #[serde(default = "one", deserialize_with = "lenient_quantity")]
    pub quantity: u32,
    #[serde(
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_email: Option<String>,
    /// Server-formatted capture time
    #[serde(
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
}

fn one() -> u32 {
    1
}

fn lenient_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(quantity_from_value(&value).unwrap_or(1))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(text_from_value(&value).unwrap_or_default())
}

fn lenient_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(text_from_value(&value).filter(|s| !s.is_empty()))
}

/// Decode server rows one by one. Rows that are not objects are skipped.
pub(crate) fn decode_rows(items: Vec<Value>) -> Vec<Entry> {
    let total = items.len();
    let entries: Vec<Entry> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if entries.len() < total {
        tracing::warn!(skipped = total - entries.len(), "skipped undecodable entry rows");
    }
    entries
}

/// Deserialize an entry list without letting one bad row fail the whole
/// response. Anything that is not a list reads as empty.
pub(crate) fn lenient_rows<'de, D>(deserializer: D) -> Result<Vec<Entry>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(decode_rows(items)),
        _ => Ok(Vec::new()),
    }
}

/// Changes an admin can make to an existing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryUpdate {
    pub id: String,
    pub room: String,
    pub notes: String,
    pub quantity: u32,
}

impl EntryUpdate {
    /// Build an update. The room is trimmed and the quantity raised to 1.
    pub fn new(
        id: impl Into<String>,
        room: impl Into<String>,
        notes: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            room: room.into().trim().to_string(),
            notes: notes.into(),
            quantity: quantity.max(1),
        }
    }
}

/// The entry set received from the server plus the current filter.
#[derive(Debug, Clone, Default)]
pub struct EntryBook {
    entries: Vec<Entry>,
    filter_text: String,
    user_email: Option<String>,
    is_admin: bool,
}

impl EntryBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    /// Replace the whole set.
    pub fn replace(&mut self, entries: Vec<Entry>) {
        self.entries = entries;
    }

    /// Newest entry goes first.
    pub fn prepend(&mut self, entry: Entry) {
        self.entries.insert(0, entry);
    }

    /// Swap in an updated entry. Returns false if the id is unknown.
    pub fn update(&mut self, entry: Entry) -> bool {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => false,
        }
    }

    /// Remove by id. Returns false if the id is unknown.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn set_filter(&mut self, text: impl Into<String>) {
        self.filter_text = text.into();
    }

    /// Who is looking. Non-admins only see their own entries.
    pub fn set_viewer(&mut self, user_email: Option<String>, is_admin: bool) {
        self.user_email = user_email.filter(|e| !e.is_empty());
        self.is_admin = is_admin;
    }

    /// Entries the current viewer may see that match the filter, in order.
    pub fn visible(&self) -> Vec<Entry> {
        let owner = match (&self.user_email, self.is_admin) {
            (Some(email), false) => Some(email.to_lowercase()),
            _ => None,
        };
        let term = self.filter_text.trim().to_lowercase();

        self.entries
            .iter()
            .filter(|e| match &owner {
                Some(owner) => e
                    .user_email
                    .as_deref()
                    .is_some_and(|email| email.to_lowercase() == *owner),
                None => true,
            })
            .filter(|e| term.is_empty() || matches_term(e, &term))
            .cloned()
            .collect()
    }
}

fn matches_term(entry: &Entry, term: &str) -> bool {
    entry.barcode.to_lowercase().contains(term)
        || entry.room.to_lowercase().contains(term)
        || entry.notes.to_lowercase().contains(term)
        || entry.quantity.to_string().contains(term)
}
