//! Leptos provider layer connecting the assistant UI to a host's document adapter.
//!
//! The UI tree consumes the active [`assistant_host::DocumentAdapter`] only through
//! [`use_document_adapter`]; hosts either wrap the tree in [`DocumentAdapterProvider`] directly or,
//! across an embedding boundary, register the adapter by id and mount [`EmbeddedAssistant`].

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

mod embedded;
mod provider;
mod selection;

pub use embedded::{resolve_embedded_adapter, EmbedError, EmbeddedAssistant};
pub use provider::{
    use_document_adapter, use_optional_document_adapter, DocumentAdapterContext,
    DocumentAdapterProvider,
};
pub use selection::{use_selection, watch_selection};

/// Installs host services for the compile-time host strategy and mounts `app` under a
/// [`DocumentAdapterProvider`].
#[cfg(all(feature = "csr", target_arch = "wasm32"))]
pub fn mount<F, V>(app: F)
where
    F: FnOnce() -> V + 'static,
    V: leptos::IntoView,
{
    use leptos::view;

    console_error_panic_hook::set_once();
    let adapter = assistant_host_web::install_host_services();
    leptos::mount_to_body(move || {
        view! { <DocumentAdapterProvider adapter=adapter>{app()}</DocumentAdapterProvider> }
    })
}

/// Mounts `app` under an [`EmbeddedAssistant`] resolving `adapter_id` through the global
/// registry. The host must register its adapter before calling this; storage is left to the host
/// and otherwise probes `localStorage` on first use.
#[cfg(all(feature = "csr", target_arch = "wasm32"))]
pub fn mount_embedded<F, V>(adapter_id: String, app: F)
where
    F: FnOnce() -> V + 'static,
    V: leptos::IntoView,
{
    use leptos::view;

    console_error_panic_hook::set_once();
    assistant_host_web::install_default_storage_factory();
    leptos::mount_to_body(move || {
        view! { <EmbeddedAssistant adapter_id=adapter_id>{app()}</EmbeddedAssistant> }
    })
}
