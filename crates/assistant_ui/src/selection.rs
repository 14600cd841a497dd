//! Reactive selection tracking for components under a [`crate::DocumentAdapterProvider`].

use std::rc::Rc;

use assistant_host::{DocumentAdapter, SelectionInfo, SelectionSubscription};
use leptos::*;

use crate::provider::use_document_adapter;

/// Subscribes `sink` to selection changes of `adapter`.
///
/// Returns `None` when the adapter cannot watch its selection.
pub fn watch_selection(
    adapter: &dyn DocumentAdapter,
    sink: impl Fn(Option<SelectionInfo>) + 'static,
) -> Option<SelectionSubscription> {
    adapter.on_selection_change(Rc::new(sink))
}

/// Tracks the current selection of the provided adapter.
///
/// The signal starts from a one-off read and then follows change notifications. The subscription
/// is released when the calling component is cleaned up.
///
/// # Panics
///
/// Panics if called outside [`crate::DocumentAdapterProvider`].
pub fn use_selection() -> ReadSignal<Option<SelectionInfo>> {
    let adapter = use_document_adapter();
    let (selection, set_selection) = create_signal(None::<SelectionInfo>);

    let initial = adapter.clone();
    spawn_local(async move {
        match initial.get_selection().await {
            Ok(current) => {
                let _ = set_selection.try_set(current);
            }
            Err(err) => logging::warn!("initial selection read failed: {err}"),
        }
    });

    let subscription = watch_selection(adapter.as_ref(), move |current| {
        let _ = set_selection.try_set(current);
    });
    on_cleanup(move || {
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    });

    selection
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use assistant_host::{CaretEditorAdapter, ManualTimers, MemoryEditorView, Platform};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn watcher_reports_changes_until_dropped() {
        let view = MemoryEditorView::new("alpha beta gamma");
        let timers = ManualTimers::default();
        let adapter = CaretEditorAdapter::new(
            Platform::Browser,
            Rc::new(view.clone()),
            Rc::new(timers.clone()),
        );
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();

        let subscription = watch_selection(&adapter, move |info| {
            sink.borrow_mut().push(info.map(|info| info.text));
        })
        .expect("caret adapters can watch");

        view.select(6, 10);
        timers.fire_intervals();
        timers.fire_intervals();
        drop(subscription);
        view.select(0, 5);
        timers.fire_intervals();

        assert_eq!(*seen.borrow(), vec![Some("beta".to_string())]);
        assert_eq!(timers.active_intervals(), 0);
    }
}
