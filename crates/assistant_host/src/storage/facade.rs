//! Process-wide storage indirection.
//!
//! [`Storage`] holds no backend of its own: every call is forwarded to whichever adapter is
//! installed at call time. A host can therefore swap in a specialised backend before the shared UI
//! mounts and every existing `Storage` handle observes it immediately.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use leptos::logging;

use super::{MemoryStorage, StorageAdapter, StorageBackend};

/// Constructor used when storage is first touched without an explicit install.
pub type StorageFactory = fn() -> Rc<dyn StorageAdapter>;

fn memory_factory() -> Rc<dyn StorageAdapter> {
    Rc::new(MemoryStorage::default())
}

struct StorageSlot {
    active: RefCell<Option<Rc<dyn StorageAdapter>>>,
    factory: Cell<StorageFactory>,
}

thread_local! {
    static STORAGE_SLOT: StorageSlot = StorageSlot {
        active: RefCell::new(None),
        factory: Cell::new(memory_factory),
    };
}

/// Zero-sized handle forwarding to the currently installed [`StorageAdapter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Storage;

impl Storage {
    /// Replaces the active adapter. Key spaces are not merged.
    pub fn install(adapter: Rc<dyn StorageAdapter>) {
        STORAGE_SLOT.with(|slot| *slot.active.borrow_mut() = Some(adapter));
    }

    /// Drops the cached adapter so the next access rebuilds it through the default factory.
    pub fn reset() {
        STORAGE_SLOT.with(|slot| *slot.active.borrow_mut() = None);
    }

    /// Sets the constructor used on first access. Does not affect an already active adapter.
    pub fn set_default_factory(factory: StorageFactory) {
        STORAGE_SLOT.with(|slot| slot.factory.set(factory));
    }

    /// Returns the active adapter, constructing it once through the default factory if needed.
    pub fn active() -> Rc<dyn StorageAdapter> {
        STORAGE_SLOT.with(|slot| {
            if let Some(adapter) = slot.active.borrow().as_ref() {
                return adapter.clone();
            }
            let adapter = (slot.factory.get())();
            *slot.active.borrow_mut() = Some(adapter.clone());
            adapter
        })
    }
}

/// Returns the process-wide storage handle.
pub fn storage() -> Storage {
    Storage
}

/// Returns the durable backend when `probe` succeeds, otherwise an in-memory one.
pub fn best_available(
    probe: impl FnOnce() -> Result<Rc<dyn StorageAdapter>, String>,
) -> Rc<dyn StorageAdapter> {
    match probe() {
        Ok(adapter) => adapter,
        Err(err) => {
            logging::warn!("durable storage unavailable, falling back to memory: {err}");
            Rc::new(MemoryStorage::default())
        }
    }
}

impl StorageAdapter for Storage {
    fn backend(&self) -> StorageBackend {
        Self::active().backend()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        Self::active().get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) {
        Self::active().set_item(key, value);
    }

    fn remove_item(&self, key: &str) {
        Self::active().remove_item(key);
    }

    fn clear(&self) {
        Self::active().clear();
    }

    fn keys(&self) -> Vec<String> {
        Self::active().keys()
    }
}
