//! Key-value string storage supplied by the host.
//!
//! The engine persists exactly two keys: the offline queue blob and the
//! bearer token. Backends may be unavailable or fail at any time (quota,
//! disabled storage); callers treat every failure as "absent".

use crate::error::Result;
#[cfg(any(test, feature = "test-util"))]
use crate::error::Error;
#[cfg(any(test, feature = "test-util"))]
use std::cell::{Cell, RefCell};
#[cfg(any(test, feature = "test-util"))]
use std::collections::HashMap;

/// Storage key for the JSON-encoded offline queue.
pub const OFFLINE_QUEUE_KEY: &str = "icsInventoryOfflineQueue_v1";

/// Storage key for the bearer token.
pub const AUTH_TOKEN_KEY: &str = "icsInventoryAuthToken_v1";

/// A string-to-string store.
pub trait KeyValueStore {
    /// Read a value. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

#[cfg(any(test, feature = "test-util"))]
/// In-memory store, also able to simulate an unavailable backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
    writes: Cell<usize>,
}

#[cfg(any(test, feature = "test-util"))]
impl MemoryStore {
    /// Create an empty, working store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose every call fails, like disabled browser storage.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.fail_reads.set(true);
        store.fail_writes.set(true);
        store
    }

    /// Make subsequent writes fail (e.g. quota exceeded).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Make subsequent reads fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    /// Seed a raw value, bypassing failure simulation.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    /// Peek at a raw value, bypassing failure simulation.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    /// Number of successful `set` calls.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.get() {
            return Err(Error::Storage("storage disabled".into()));
        }
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.get() {
            return Err(Error::Storage("quota exceeded".into()));
        }
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.fail_writes.get() {
            return Err(Error::Storage("storage disabled".into()));
        }
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn remove_absent_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.remove("missing").is_ok());
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn unavailable_store_fails_everything() {
        let store = MemoryStore::unavailable();
        assert!(store.get("k").is_err());
        assert!(store.set("k", "v").is_err());
        assert!(store.remove("k").is_err());
    }

    #[test]
    fn raw_access_bypasses_failures() {
        let store = MemoryStore::unavailable();
        store.insert_raw("k", "v");
        assert_eq!(store.raw("k"), Some("v".to_string()));
    }
}
