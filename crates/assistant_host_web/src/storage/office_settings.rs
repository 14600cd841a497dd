//! Office document settings as a [`SettingsBag`].

use std::rc::Rc;

use assistant_host::{SettingsBag, SettingsFuture, SettingsStorage, Spawner};
use leptos::logging;
use serde_json::Value;

use crate::interop;

#[derive(Debug, Clone, Copy, Default)]
/// `Office.context.document.settings`. Values roam with the document.
pub struct OfficeSettingsBag;

impl SettingsBag for OfficeSettingsBag {
    fn get(&self, key: &str) -> Option<Value> {
        match interop::settings_get(key) {
            Ok(value) => value,
            Err(err) => {
                logging::warn!("document setting `{key}` unreadable: {err}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: Value) {
        if let Err(err) = interop::settings_set(key, &value) {
            logging::warn!("document setting `{key}` not written: {err}");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(err) = interop::settings_remove(key) {
            logging::warn!("document setting `{key}` not removed: {err}");
        }
    }

    fn save(&self) -> SettingsFuture<Result<(), String>> {
        Box::pin(interop::settings_save())
    }
}

/// Roaming storage over the current document's settings.
pub fn roaming_storage(spawner: Spawner) -> SettingsStorage {
    SettingsStorage::new(Rc::new(OfficeSettingsBag), spawner)
}

#[cfg(test)]
mod tests {
    use assistant_host::{StorageAdapter, StorageBackend};
    use futures::executor::block_on;

    use super::*;
    use crate::runtime::browser_spawner;

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn non_wasm_settings_degrade_quietly() {
        let bag = OfficeSettingsBag;
        bag.set("pd.documentId", Value::String("x".to_string()));
        assert_eq!(bag.get("pd.documentId"), None);
        bag.remove("pd.documentId");
        assert!(block_on(bag.save()).is_err());

        let storage = roaming_storage(browser_spawner());
        assert_eq!(storage.backend(), StorageBackend::Roaming);
        storage.set_item("pd.settings.model", "m");
        assert_eq!(storage.get_item("pd.settings.model"), None);
    }
}
