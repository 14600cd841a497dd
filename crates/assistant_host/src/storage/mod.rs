//! Best-effort string key/value storage contract and its host-independent backends.
//!
//! Storage never fails loudly: backends swallow host exceptions, log them, and behave as a no-op
//! (or report `None`) so callers can treat persistence as advisory.

pub mod facade;
pub mod keys;
pub mod settings;

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use leptos::logging;
use serde::{de::DeserializeOwned, Serialize};

/// Discriminant naming the persistence guarantees of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Survives reloads on this device (`localStorage`).
    Durable,
    /// Lost when the page or task pane goes away.
    Memory,
    /// Follows the document or user across devices (host settings).
    Roaming,
}

impl StorageBackend {
    /// Returns a stable string token for diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Durable => "durable",
            Self::Memory => "memory",
            Self::Roaming => "roaming",
        }
    }
}

/// Key/value storage over pre-serialized strings.
pub trait StorageAdapter {
    /// Persistence class of this backend.
    fn backend(&self) -> StorageBackend;

    /// Reads a value, or `None` when absent or unreadable.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Writes a value. Host failures are logged and ignored.
    fn set_item(&self, key: &str, value: &str);

    /// Deletes a value. Host failures are logged and ignored.
    fn remove_item(&self, key: &str);

    /// Deletes every value owned by this backend.
    fn clear(&self);

    /// Lists stored keys in no particular order.
    fn keys(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
/// Process-local storage backend, used directly in tests and as the fallback when durable storage
/// is unavailable.
pub struct MemoryStorage {
    inner: Rc<RefCell<HashMap<String, String>>>,
}

impl StorageAdapter for MemoryStorage {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.inner.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.inner
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.inner.borrow_mut().remove(key);
    }

    fn clear(&self) {
        self.inner.borrow_mut().clear();
    }

    fn keys(&self) -> Vec<String> {
        self.inner.borrow().keys().cloned().collect()
    }
}

/// Loads and deserializes a typed value, treating unreadable JSON as absent.
pub fn load_json_with<S: StorageAdapter + ?Sized, T: DeserializeOwned>(
    storage: &S,
    key: &str,
) -> Option<T> {
    let raw = storage.get_item(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            logging::warn!("stored value for `{key}` is not valid JSON: {err}");
            None
        }
    }
}

/// Serializes and stores a typed value. Serialization failures are logged and skipped.
pub fn save_json_with<S: StorageAdapter + ?Sized, T: Serialize>(storage: &S, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => storage.set_item(key, &raw),
        Err(err) => logging::warn!("could not serialize value for `{key}`: {err}"),
    }
}
