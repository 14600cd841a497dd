//! `localStorage`-backed durable storage.
//!
//! The Web Storage API can throw on every call (private browsing, quota, sandboxed frames), so
//! availability is probed once with a sentinel key and later failures are logged and swallowed.

use std::rc::Rc;

use assistant_host::{best_available, Storage, StorageAdapter, StorageBackend};
use leptos::logging;

/// Sentinel key written and removed by [`LocalStorageAdapter::probe`].
pub const PROBE_KEY: &str = "pd.__probe__";

/// Raw Web Storage calls, each of which may throw.
pub trait StorageArea {
    /// Reads a value.
    fn get_item(&self, key: &str) -> Result<Option<String>, String>;
    /// Writes a value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), String>;
    /// Removes a value.
    fn remove_item(&self, key: &str) -> Result<(), String>;
    /// Removes every value.
    fn clear(&self) -> Result<(), String>;
    /// Lists the stored keys.
    fn keys(&self) -> Result<Vec<String>, String>;
}

/// `window.localStorage`.
#[derive(Debug, Clone)]
pub struct BrowserLocalStorage {
    #[cfg(target_arch = "wasm32")]
    storage: web_sys::Storage,
}

impl BrowserLocalStorage {
    /// Opens the page's `localStorage`.
    ///
    /// # Errors
    ///
    /// Returns an error when there is no window or access to `localStorage` is denied.
    pub fn open() -> Result<Self, String> {
        #[cfg(target_arch = "wasm32")]
        {
            let storage = web_sys::window()
                .ok_or_else(|| "window unavailable".to_string())?
                .local_storage()
                .map_err(|e| format!("localStorage access denied: {e:?}"))?
                .ok_or_else(|| "localStorage unavailable".to_string())?;
            Ok(Self { storage })
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            Err("localStorage is only available when compiled for wasm32".to_string())
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl StorageArea for BrowserLocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, String> {
        self.storage
            .get_item(key)
            .map_err(|e| format!("localStorage get_item failed: {e:?}"))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), String> {
        self.storage
            .set_item(key, value)
            .map_err(|e| format!("localStorage set_item failed: {e:?}"))
    }

    fn remove_item(&self, key: &str) -> Result<(), String> {
        self.storage
            .remove_item(key)
            .map_err(|e| format!("localStorage remove_item failed: {e:?}"))
    }

    fn clear(&self) -> Result<(), String> {
        self.storage
            .clear()
            .map_err(|e| format!("localStorage clear failed: {e:?}"))
    }

    fn keys(&self) -> Result<Vec<String>, String> {
        let len = self
            .storage
            .length()
            .map_err(|e| format!("localStorage length failed: {e:?}"))?;
        Ok((0..len)
            .filter_map(|index| self.storage.key(index).ok().flatten())
            .collect())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl StorageArea for BrowserLocalStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, String> {
        Ok(None)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), String> {
        Ok(())
    }

    fn remove_item(&self, _key: &str) -> Result<(), String> {
        Ok(())
    }

    fn clear(&self) -> Result<(), String> {
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, String> {
        Ok(Vec::new())
    }
}

/// Durable backend over a [`StorageArea`], normally `window.localStorage`.
#[derive(Clone)]
pub struct LocalStorageAdapter {
    area: Rc<dyn StorageArea>,
}

impl LocalStorageAdapter {
    /// Probes `window.localStorage`.
    ///
    /// # Errors
    ///
    /// Returns an error when `localStorage` is missing or rejects the round trip.
    pub fn probe() -> Result<Self, String> {
        Self::probe_area(Rc::new(BrowserLocalStorage::open()?))
    }

    /// Returns the adapter after a successful write/read/remove round trip of [`PROBE_KEY`].
    ///
    /// # Errors
    ///
    /// Returns an error when `area` rejects the round trip.
    pub fn probe_area(area: Rc<dyn StorageArea>) -> Result<Self, String> {
        area.set_item(PROBE_KEY, PROBE_KEY)?;
        let read = area.get_item(PROBE_KEY)?;
        area.remove_item(PROBE_KEY)?;
        if read.as_deref() == Some(PROBE_KEY) {
            Ok(Self { area })
        } else {
            Err("localStorage did not return the probe value".to_string())
        }
    }
}

impl StorageAdapter for LocalStorageAdapter {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Durable
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.area.get_item(key).unwrap_or_else(|err| {
            logging::warn!("could not read `{key}`: {err}");
            None
        })
    }

    fn set_item(&self, key: &str, value: &str) {
        if let Err(err) = self.area.set_item(key, value) {
            logging::warn!("could not store `{key}`: {err}");
        }
    }

    fn remove_item(&self, key: &str) {
        if let Err(err) = self.area.remove_item(key) {
            logging::warn!("could not remove `{key}`: {err}");
        }
    }

    fn clear(&self) {
        if let Err(err) = self.area.clear() {
            logging::warn!("could not clear storage: {err}");
        }
    }

    fn keys(&self) -> Vec<String> {
        self.area.keys().unwrap_or_else(|err| {
            logging::warn!("could not list storage keys: {err}");
            Vec::new()
        })
    }
}

/// Durable storage when `localStorage` passes the probe, otherwise in-memory storage.
pub fn best_available_storage() -> Rc<dyn StorageAdapter> {
    best_available(|| LocalStorageAdapter::probe().map(|adapter| Rc::new(adapter) as Rc<dyn StorageAdapter>))
}

/// Makes [`best_available_storage`] the storage facade's default factory.
///
/// Entry points call this so the first facade access without an explicit install probes
/// `localStorage`.
pub fn install_default_storage_factory() {
    Storage::set_default_factory(best_available_storage);
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::BTreeMap,
    };

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct FakeArea {
        items: RefCell<BTreeMap<String, String>>,
        throw_writes: Cell<bool>,
        throw_reads: Cell<bool>,
    }

    impl FakeArea {
        fn write(&self, op: &str) -> Result<(), String> {
            if self.throw_writes.get() {
                Err(format!("QuotaExceededError: {op}"))
            } else {
                Ok(())
            }
        }

        fn read(&self) -> Result<(), String> {
            if self.throw_reads.get() {
                Err("SecurityError: access denied".to_string())
            } else {
                Ok(())
            }
        }
    }

    impl StorageArea for FakeArea {
        fn get_item(&self, key: &str) -> Result<Option<String>, String> {
            self.read()?;
            Ok(self.items.borrow().get(key).cloned())
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), String> {
            self.write("setItem")?;
            self.items
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove_item(&self, key: &str) -> Result<(), String> {
            self.write("removeItem")?;
            self.items.borrow_mut().remove(key);
            Ok(())
        }

        fn clear(&self) -> Result<(), String> {
            self.write("clear")?;
            self.items.borrow_mut().clear();
            Ok(())
        }

        fn keys(&self) -> Result<Vec<String>, String> {
            self.read()?;
            Ok(self.items.borrow().keys().cloned().collect())
        }
    }

    fn adapter() -> (LocalStorageAdapter, Rc<FakeArea>) {
        let area = Rc::new(FakeArea::default());
        let adapter = LocalStorageAdapter::probe_area(area.clone()).expect("probe");
        (adapter, area)
    }

    #[test]
    fn probe_leaves_no_sentinel_behind() {
        let (adapter, area) = adapter();
        assert!(area.items.borrow().is_empty());
        assert_eq!(adapter.backend(), StorageBackend::Durable);
    }

    #[test]
    fn values_round_trip_and_clear_empties_keys() {
        let (adapter, _) = adapter();
        adapter.set_item("pd.projectId", "p-1");
        adapter.set_item("pd.auth.token", "");

        assert_eq!(adapter.get_item("pd.projectId").as_deref(), Some("p-1"));
        assert_eq!(adapter.get_item("pd.auth.token").as_deref(), Some(""));
        assert_eq!(adapter.keys(), vec!["pd.auth.token", "pd.projectId"]);

        adapter.remove_item("pd.projectId");
        assert_eq!(adapter.get_item("pd.projectId"), None);

        adapter.clear();
        assert!(adapter.keys().is_empty());
    }

    #[test]
    fn throwing_host_calls_are_swallowed() {
        let (adapter, area) = adapter();
        adapter.set_item("kept", "1");
        area.throw_writes.set(true);

        adapter.set_item("lost", "2");
        adapter.remove_item("kept");
        adapter.clear();

        assert_eq!(adapter.get_item("kept").as_deref(), Some("1"));
        assert_eq!(adapter.get_item("lost"), None);

        area.throw_reads.set(true);
        assert_eq!(adapter.get_item("kept"), None);
        assert!(adapter.keys().is_empty());
    }

    #[test]
    fn rejected_probe_falls_back_to_memory() {
        let area = Rc::new(FakeArea::default());
        area.throw_writes.set(true);

        let storage = best_available(|| {
            LocalStorageAdapter::probe_area(area.clone())
                .map(|adapter| Rc::new(adapter) as Rc<dyn StorageAdapter>)
        });

        assert_eq!(storage.backend(), StorageBackend::Memory);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn non_wasm_probe_falls_back_to_memory() {
        assert!(LocalStorageAdapter::probe().is_err());
        assert_eq!(best_available_storage().backend(), StorageBackend::Memory);

        Storage::reset();
        install_default_storage_factory();
        assert_eq!(Storage::active().backend(), StorageBackend::Memory);
        Storage::reset();
    }
}
