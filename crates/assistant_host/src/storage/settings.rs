//! Host settings bags and the roaming storage backend built on them.
//!
//! Office exposes per-document settings as a synchronous in-memory bag with an asynchronous
//! `saveAsync` flush and no key enumeration, so the roaming backend keeps its own key index.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    future::Future,
    pin::Pin,
    rc::Rc,
};

use leptos::logging;
use serde_json::Value;

use super::{StorageAdapter, StorageBackend};
use crate::timer::Spawner;

/// Owned boxed future returned by [`SettingsBag::save`].
pub type SettingsFuture<T> = Pin<Box<dyn Future<Output = T>>>;

/// Settings key holding the roaming backend's key index.
pub const KEY_INDEX_SETTING: &str = "pd.storage.__keys";
const ITEM_PREFIX: &str = "pd.storage:";

/// Host-provided per-document settings.
pub trait SettingsBag {
    /// Reads a setting.
    fn get(&self, key: &str) -> Option<Value>;

    /// Writes a setting in memory. Persisted on the next [`SettingsBag::save`].
    fn set(&self, key: &str, value: Value);

    /// Removes a setting in memory.
    fn remove(&self, key: &str);

    /// Flushes in-memory settings to the host.
    fn save(&self) -> SettingsFuture<Result<(), String>>;
}

#[derive(Debug, Clone, Default)]
/// In-memory [`SettingsBag`] for tests and hosts without document settings.
pub struct MemorySettingsBag {
    values: Rc<RefCell<HashMap<String, Value>>>,
    saves: Rc<Cell<usize>>,
    fail_saves: Rc<Cell<bool>>,
}

impl MemorySettingsBag {
    /// Number of completed [`SettingsBag::save`] calls.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    /// Makes later saves fail, simulating a host that rejects `saveAsync`.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }
}

impl SettingsBag for MemorySettingsBag {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.values.borrow_mut().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.values.borrow_mut().remove(key);
    }

    fn save(&self) -> SettingsFuture<Result<(), String>> {
        let saves = self.saves.clone();
        let fail = self.fail_saves.get();
        Box::pin(async move {
            if fail {
                return Err("settings save rejected".to_string());
            }
            saves.set(saves.get() + 1);
            Ok(())
        })
    }
}

/// Roaming [`StorageAdapter`] over a [`SettingsBag`].
///
/// Reads and writes are synchronous against the bag; each mutation schedules a background save
/// whose failure is logged and otherwise ignored.
pub struct SettingsStorage {
    bag: Rc<dyn SettingsBag>,
    spawner: Spawner,
}

impl SettingsStorage {
    /// Creates a backend over `bag`, scheduling saves through `spawner`.
    pub fn new(bag: Rc<dyn SettingsBag>, spawner: Spawner) -> Self {
        Self { bag, spawner }
    }

    fn item_key(key: &str) -> String {
        format!("{ITEM_PREFIX}{key}")
    }

    fn index(&self) -> Vec<String> {
        self.bag
            .get(KEY_INDEX_SETTING)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    fn write_index(&self, keys: Vec<String>) {
        self.bag.set(
            KEY_INDEX_SETTING,
            Value::Array(keys.into_iter().map(Value::String).collect()),
        );
    }

    fn schedule_save(&self) {
        let save = self.bag.save();
        (self.spawner)(Box::pin(async move {
            if let Err(err) = save.await {
                logging::warn!("roaming settings save failed: {err}");
            }
        }));
    }
}

impl StorageAdapter for SettingsStorage {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Roaming
    }

    fn get_item(&self, key: &str) -> Option<String> {
        match self.bag.get(&Self::item_key(key))? {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    fn set_item(&self, key: &str, value: &str) {
        self.bag
            .set(&Self::item_key(key), Value::String(value.to_string()));
        let mut keys = self.index();
        if !keys.iter().any(|existing| existing == key) {
            keys.push(key.to_string());
            self.write_index(keys);
        }
        self.schedule_save();
    }

    fn remove_item(&self, key: &str) {
        self.bag.remove(&Self::item_key(key));
        let mut keys = self.index();
        keys.retain(|existing| existing != key);
        self.write_index(keys);
        self.schedule_save();
    }

    fn clear(&self) {
        for key in self.index() {
            self.bag.remove(&Self::item_key(&key));
        }
        self.write_index(Vec::new());
        self.schedule_save();
    }

    fn keys(&self) -> Vec<String> {
        self.index()
    }
}

#[cfg(test)]
mod tests {
    use futures::{executor::LocalPool, task::LocalSpawnExt};
    use pretty_assertions::assert_eq;

    use super::*;

    fn pool_spawner(pool: &LocalPool) -> Spawner {
        let spawner = pool.spawner();
        Rc::new(move |future| {
            let _ = spawner.spawn_local(future);
        })
    }

    #[test]
    fn roaming_storage_round_trips_and_saves() {
        let mut pool = LocalPool::new();
        let bag = MemorySettingsBag::default();
        let storage = SettingsStorage::new(Rc::new(bag.clone()), pool_spawner(&pool));

        storage.set_item("pd.settings.model", "\"gpt\"");
        storage.set_item("pd.settings.model", "\"claude\"");
        storage.set_item("pd.auth.token", "t");
        pool.run_until_stalled();

        assert_eq!(
            storage.get_item("pd.settings.model").as_deref(),
            Some("\"claude\"")
        );
        assert_eq!(
            storage.keys(),
            vec!["pd.settings.model".to_string(), "pd.auth.token".to_string()]
        );
        assert_eq!(bag.save_count(), 3);
    }

    #[test]
    fn roaming_clear_leaves_foreign_settings() {
        let mut pool = LocalPool::new();
        let bag = MemorySettingsBag::default();
        bag.set("pd.documentId", Value::String("doc".to_string()));
        let storage = SettingsStorage::new(Rc::new(bag.clone()), pool_spawner(&pool));

        storage.set_item("a", "1");
        storage.remove_item("missing");
        storage.clear();
        pool.run_until_stalled();

        assert!(storage.keys().is_empty());
        assert_eq!(storage.get_item("a"), None);
        assert_eq!(
            bag.get("pd.documentId"),
            Some(Value::String("doc".to_string()))
        );
    }

    #[test]
    fn failed_saves_are_swallowed() {
        let mut pool = LocalPool::new();
        let bag = MemorySettingsBag::default();
        bag.set_fail_saves(true);
        let storage = SettingsStorage::new(Rc::new(bag.clone()), pool_spawner(&pool));

        storage.set_item("k", "v");
        pool.run_until_stalled();

        assert_eq!(storage.get_item("k").as_deref(), Some("v"));
        assert_eq!(bag.save_count(), 0);
    }
}
