//! In-memory session areas for privileged-context state that must not outlive the browser session.

use std::{cell::RefCell, collections::HashMap, future::Future, pin::Pin, rc::Rc};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Object-safe boxed future used by [`SessionArea`] async methods.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Host key/value area that is cleared when the browser session ends.
pub trait SessionArea {
    /// Reads a raw JSON value by key.
    fn get_json<'a>(&'a self, key: &'a str) -> SessionFuture<'a, Result<Option<Value>, String>>;

    /// Stores a raw JSON value by key.
    fn set_json<'a>(&'a self, key: &'a str, value: Value) -> SessionFuture<'a, Result<(), String>>;
}

#[derive(Debug, Clone, Default)]
/// Process-local [`SessionArea`] used by tests and hosts without a native session area.
pub struct MemorySessionArea {
    inner: Rc<RefCell<HashMap<String, Value>>>,
}

impl MemorySessionArea {
    /// Serializes and stores a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error when `value` cannot be serialized to JSON.
    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<(), String> {
        let json = serde_json::to_value(value).map_err(|e| e.to_string())?;
        self.inner.borrow_mut().insert(key.into(), json);
        Ok(())
    }

    /// Reads and deserializes a typed value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.inner
            .borrow()
            .get(key)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Removes a value by key.
    pub fn remove(&self, key: &str) {
        self.inner.borrow_mut().remove(key);
    }
}

impl SessionArea for MemorySessionArea {
    fn get_json<'a>(&'a self, key: &'a str) -> SessionFuture<'a, Result<Option<Value>, String>> {
        Box::pin(async move { Ok(self.inner.borrow().get(key).cloned()) })
    }

    fn set_json<'a>(&'a self, key: &'a str, value: Value) -> SessionFuture<'a, Result<(), String>> {
        Box::pin(async move {
            self.inner.borrow_mut().insert(key.to_string(), value);
            Ok(())
        })
    }
}
