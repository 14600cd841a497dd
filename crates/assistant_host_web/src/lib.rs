//! Browser, Office, and Chrome extension (`wasm32`) implementations of the `assistant_host`
//! contracts.
//!
//! Host bindings live in one interop layer with a non-wasm fallback shim that reports every host
//! as absent:
//! - `editor`: CodeMirror and focused-field editor views
//! - `word`: Office.js Word host
//! - `storage`: `localStorage` and Office document settings
//! - `events` / `runtime`: DOM event channel, timers, and task spawning
//! - `extension`: bridge client, relay, and background dispatcher wiring

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

/// Compile-time host-strategy selection and concrete adapter factories for runtime wiring.
pub mod adapters;
pub mod editor;
pub mod events;
pub mod extension;
mod interop;
pub mod runtime;
pub mod storage;
pub mod word;

pub use adapters::{
    document_adapter, host_strategy_name, install_host_services, page_platform,
    selected_host_strategy, storage_adapter, HostStrategy, DEFAULT_ADAPTER_ID,
};
pub use editor::{
    char_to_utf16_offset, utf16_to_char_offset, DomEditorSource, DomEditorView, EditorKind,
};
pub use events::DomEventChannel;
pub use extension::{
    bridge_client, install_background, install_relay, ChromePrivilegedHost, ChromeRuntimeTransport,
    ChromeSessionArea,
};
pub use runtime::{browser_spawner, WebTimers};
pub use storage::local_storage::{
    best_available_storage, install_default_storage_factory, BrowserLocalStorage, LocalStorageAdapter,
    StorageArea, PROBE_KEY,
};
pub use storage::office_settings::{roaming_storage, OfficeSettingsBag};
pub use word::OfficeWordHost;
