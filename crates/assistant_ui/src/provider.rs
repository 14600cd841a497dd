//! Dependency injection of the active [`DocumentAdapter`] into the component tree.

use std::rc::Rc;

use assistant_host::DocumentAdapter;
use leptos::*;

#[derive(Clone)]
/// Leptos context carrying the document adapter for descendant components.
pub struct DocumentAdapterContext(pub Rc<dyn DocumentAdapter>);

#[component]
/// Makes `adapter` available to every descendant through [`use_document_adapter`].
pub fn DocumentAdapterProvider(
    /// Adapter selected by the host entry layer.
    adapter: Rc<dyn DocumentAdapter>,
    children: Children,
) -> impl IntoView {
    provide_context(DocumentAdapterContext(adapter));
    children().into_view()
}

/// Returns the document adapter provided by the nearest [`DocumentAdapterProvider`].
///
/// # Panics
///
/// Panics if called outside [`DocumentAdapterProvider`].
pub fn use_document_adapter() -> Rc<dyn DocumentAdapter> {
    use_optional_document_adapter()
        .expect("use_document_adapter must be called inside a DocumentAdapterProvider")
}

/// Returns the provided document adapter, or `None` outside [`DocumentAdapterProvider`].
pub fn use_optional_document_adapter() -> Option<Rc<dyn DocumentAdapter>> {
    use_context::<DocumentAdapterContext>().map(|context| context.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_accessor_is_empty_without_provider() {
        let _ = leptos::create_runtime();
        assert!(use_optional_document_adapter().is_none());
    }

    #[test]
    #[should_panic(expected = "inside a DocumentAdapterProvider")]
    fn strict_accessor_fails_loudly_without_provider() {
        let _ = leptos::create_runtime();
        let _ = use_document_adapter();
    }
}
