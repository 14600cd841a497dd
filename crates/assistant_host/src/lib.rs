//! Host-agnostic document, storage, and bridge contracts for the editing assistant.
//!
//! This crate is the API-first boundary between the shared assistant UI and the hosts it runs in.
//! It owns the polymorphic [`DocumentAdapter`] and [`StorageAdapter`] contracts, the process-wide
//! adapter registry and storage facade, and the correlated request/response bridge used to reach a
//! privileged extension context. Concrete browser/Office wiring lives in `assistant_host_web`.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod bridge;
pub mod document;
pub mod registry;
pub mod session;
pub mod storage;
pub mod time;
pub mod timer;

pub use bridge::channel::{EventChannel, EventHandler, ListenerId, LocalEventBus};
pub use bridge::client::{BridgeClient, CallOptions, HostCookies, PermissionOutcome};
pub use bridge::dispatcher::{
    origin_match_pattern, register_content_scripts, ContentScript, ContentScriptConfig,
    PrivilegedDispatcher, PrivilegedFuture, PrivilegedHost, ScriptRunAt, ScriptWorld,
    StoredSession, SESSION_ID_KEY, SESSION_TTL_MS,
};
pub use bridge::relay::{BridgeRelay, PrivilegedTransport, RelayHandle, TransportFuture};
pub use bridge::{
    error_event, error_message, response_event, BridgeAction, BridgeError, BridgeFailure,
    BridgeRequest, BridgeSuccess, PrivilegedReply, PrivilegedRequest, DEFAULT_TIMEOUT_MS,
    REQUEST_EVENT,
};
pub use document::caret::{
    CaretEditorAdapter, EditorSelection, EditorView, EditorViewSource, MemoryEditorView, TextEdit,
    SELECTION_POLL_INTERVAL_MS,
};
pub use document::document_id::{
    hash_document_url, overleaf_project_id, page_document_id, WordDocumentIds,
};
pub use document::selection::{
    surrounding_text, RangeHandle, SelectionInfo, CONTEXT_WINDOW_CHARS, SELECTED_TEXT_END,
    SELECTED_TEXT_START,
};
pub use document::subscription::SelectionSubscription;
pub use document::word::{WordAdapter, WordFuture, WordHost, WordInsert, WordSelection};
pub use document::{
    AdapterError, DocumentAdapter, DocumentFuture, InsertLocation, Platform, SelectionCallback,
};
pub use registry::{adapter_registry, AdapterRegistry};
pub use session::{MemorySessionArea, SessionArea, SessionFuture};
pub use storage::facade::{best_available, storage, Storage, StorageFactory};
pub use storage::keys::{
    is_preserved_on_reset, reset_to_defaults, AUTH_PREFIX, AUTH_GCLB_KEY, AUTH_OVERLEAF_SESSION_KEY,
    AUTH_REFRESH_TOKEN_KEY, AUTH_TOKEN_KEY, DEVTOOL_PREFIX, DOCUMENT_ID_KEY, DOCUMENT_URL_KEY,
    PROJECT_ID_KEY,
};
pub use storage::settings::{
    MemorySettingsBag, SettingsBag, SettingsFuture, SettingsStorage, KEY_INDEX_SETTING,
};
pub use storage::{load_json_with, save_json_with, MemoryStorage, StorageAdapter, StorageBackend};
pub use time::unix_time_ms_now;
pub use timer::{IntervalId, ManualTimers, Spawner, TimerHost};
