//! Process-wide registry of live document adapters keyed by string id.
//!
//! Embedded UI mounts receive only primitive props, so a host registers its adapter here under an
//! id and passes that id across the embedding boundary instead of the adapter itself.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::document::DocumentAdapter;

/// Keyed table of live adapters. Cloning shares the same table.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    inner: Rc<RefCell<HashMap<String, Rc<dyn DocumentAdapter>>>>,
}

impl AdapterRegistry {
    /// Registers `adapter` under `id`, replacing any previous entry.
    pub fn register(&self, id: impl Into<String>, adapter: Rc<dyn DocumentAdapter>) {
        self.inner.borrow_mut().insert(id.into(), adapter);
    }

    /// Removes the entry for `id`, returning it if present.
    pub fn unregister(&self, id: &str) -> Option<Rc<dyn DocumentAdapter>> {
        self.inner.borrow_mut().remove(id)
    }

    /// Looks up the adapter registered under `id`.
    pub fn get(&self, id: &str) -> Option<Rc<dyn DocumentAdapter>> {
        self.inner.borrow().get(id).cloned()
    }

    /// Lists registered ids in no particular order.
    pub fn ids(&self) -> Vec<String> {
        self.inner.borrow().keys().cloned().collect()
    }

    /// Removes every entry.
    pub fn reset(&self) {
        self.inner.borrow_mut().clear();
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

thread_local! {
    static GLOBAL_ADAPTER_REGISTRY: AdapterRegistry = AdapterRegistry::default();
}

/// Returns the process-wide adapter registry.
pub fn adapter_registry() -> AdapterRegistry {
    GLOBAL_ADAPTER_REGISTRY.with(|registry| registry.clone())
}
