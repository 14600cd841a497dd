//! Embedded mount: resolves a registered adapter id into a provided adapter.

use std::rc::Rc;

use assistant_host::{adapter_registry, AdapterRegistry, DocumentAdapter};
use leptos::*;
use thiserror::Error;

use crate::provider::DocumentAdapterProvider;

/// Why an embedded mount could not find its adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbedError {
    /// The host passed an empty id.
    #[error("no document adapter id was passed to the embedded assistant")]
    MissingAdapterId,
    /// Nothing is registered under the id.
    #[error(
        "no document adapter registered under `{id}`; register one with \
         adapter_registry().register(\"{id}\", adapter) before mounting (registered: {registered:?})"
    )]
    UnknownAdapter {
        /// Requested id.
        id: String,
        /// Ids currently registered, sorted.
        registered: Vec<String>,
    },
}

/// Looks `adapter_id` up in `registry`.
///
/// # Errors
///
/// Returns [`EmbedError`] when the id is empty or unregistered.
pub fn resolve_embedded_adapter(
    registry: &AdapterRegistry,
    adapter_id: &str,
) -> Result<Rc<dyn DocumentAdapter>, EmbedError> {
    let adapter_id = adapter_id.trim();
    if adapter_id.is_empty() {
        return Err(EmbedError::MissingAdapterId);
    }
    registry.get(adapter_id).ok_or_else(|| {
        let mut registered = registry.ids();
        registered.sort();
        EmbedError::UnknownAdapter {
            id: adapter_id.to_string(),
            registered,
        }
    })
}

#[component]
/// Mount point for hosts that can only pass primitive props across the embedding boundary.
///
/// Renders `children` under a [`DocumentAdapterProvider`] when `adapter_id` resolves through the
/// global registry, otherwise an error message naming the fix.
pub fn EmbeddedAssistant(
    /// Registry id of the document adapter.
    #[prop(into)]
    adapter_id: String,
    children: Children,
) -> impl IntoView {
    match resolve_embedded_adapter(&adapter_registry(), &adapter_id) {
        Ok(adapter) => view! {
            <DocumentAdapterProvider adapter=adapter>{children()}</DocumentAdapterProvider>
        }
        .into_view(),
        Err(err) => {
            logging::warn!("embedded assistant mount failed: {err}");
            view! { <div class="pd-embed-error" role="alert">{err.to_string()}</div> }.into_view()
        }
    }
}
