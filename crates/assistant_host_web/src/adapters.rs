use std::rc::Rc;

use assistant_host::{
    adapter_registry, overleaf_project_id, CaretEditorAdapter, DocumentAdapter, MemoryEditorView,
    MemoryStorage, Platform, Storage, StorageAdapter, WordAdapter,
};

use crate::{
    editor::DomEditorSource,
    interop,
    runtime::{browser_spawner, WebTimers},
    storage::{local_storage::best_available_storage, office_settings::roaming_storage},
    word::OfficeWordHost,
    OfficeSettingsBag,
};

#[cfg(all(feature = "host-word", feature = "host-stub"))]
compile_error!("features `host-word` and `host-stub` are mutually exclusive; enable only one");

/// Registry id under which [`install_host_services`] registers the document adapter.
pub const DEFAULT_ADAPTER_ID: &str = "pd-document";

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Compile-time selected host strategy for `assistant_host_web` adapters.
pub enum HostStrategy {
    /// Browser extension: Overleaf's editor on Overleaf projects, the focused field elsewhere.
    Extension,
    /// Word task pane over Office.js with roaming document settings.
    Word,
    /// In-memory editor and storage for UI work without a host.
    Stub,
}

/// Returns the compile-time selected host strategy for the active build.
pub const fn selected_host_strategy() -> HostStrategy {
    #[cfg(feature = "host-word")]
    {
        HostStrategy::Word
    }

    #[cfg(feature = "host-stub")]
    {
        HostStrategy::Stub
    }

    #[cfg(not(any(feature = "host-word", feature = "host-stub")))]
    {
        HostStrategy::Extension
    }
}

/// Returns the selected host strategy as a stable string token.
pub fn host_strategy_name() -> &'static str {
    match selected_host_strategy() {
        HostStrategy::Extension => "extension",
        HostStrategy::Word => "word",
        HostStrategy::Stub => "stub",
    }
}

/// Picks the caret editor for the current page: CodeMirror on an Overleaf project path, the
/// focused text field anywhere else.
pub fn page_platform(pathname: Option<&str>) -> Platform {
    if pathname.and_then(overleaf_project_id).is_some() {
        Platform::Overleaf
    } else {
        Platform::Browser
    }
}

/// Builds the document adapter for the compile-time selected host strategy.
pub fn document_adapter() -> Rc<dyn DocumentAdapter> {
    match selected_host_strategy() {
        HostStrategy::Extension => {
            let platform = page_platform(interop::location_pathname().as_deref());
            let source = match platform {
                Platform::Overleaf => DomEditorSource::code_mirror(),
                _ => DomEditorSource::focused_field(),
            };
            Rc::new(CaretEditorAdapter::new(
                platform,
                Rc::new(source),
                Rc::new(WebTimers::default()),
            ))
        }
        HostStrategy::Word => Rc::new(WordAdapter::new(
            Rc::new(OfficeWordHost::default()),
            Rc::new(OfficeSettingsBag),
            browser_spawner(),
        )),
        HostStrategy::Stub => Rc::new(CaretEditorAdapter::new(
            Platform::Browser,
            Rc::new(MemoryEditorView::new("").with_document_id("stub-document")),
            Rc::new(WebTimers::default()),
        )),
    }
}

/// Builds the storage backend for the compile-time selected host strategy.
pub fn storage_adapter() -> Rc<dyn StorageAdapter> {
    match selected_host_strategy() {
        HostStrategy::Extension => best_available_storage(),
        HostStrategy::Word => Rc::new(roaming_storage(browser_spawner())),
        HostStrategy::Stub => Rc::new(MemoryStorage::default()),
    }
}

/// Installs the selected storage backend into the facade and registers the selected document
/// adapter under [`DEFAULT_ADAPTER_ID`]. Call once before mounting the UI.
pub fn install_host_services() -> Rc<dyn DocumentAdapter> {
    Storage::install(storage_adapter());
    let adapter = document_adapter();
    adapter_registry().register(DEFAULT_ADAPTER_ID, adapter.clone());
    adapter
}
