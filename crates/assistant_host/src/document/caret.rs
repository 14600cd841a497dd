//! Caret-based editor adapter shared by the Overleaf (CodeMirror) and generic browser hosts.
//!
//! The host editor view may not exist yet during early page load, so reads degrade to empty
//! values while writes report the missing view. Selection changes are observed by polling because
//! these hosts expose no selection-change event to page scripts.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use super::{
    selection::{char_slice, RangeHandle},
    AdapterError, DocumentAdapter, DocumentFuture, InsertLocation, Platform, SelectionCallback,
    SelectionInfo, SelectionSubscription,
};
use crate::timer::TimerHost;

/// Poll period for caret-editor selection observation.
pub const SELECTION_POLL_INTERVAL_MS: u32 = 500;

/// Editor selection in Unicode-scalar offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditorSelection {
    /// Fixed end of the selection.
    pub anchor: usize,
    /// Moving end of the selection, where the caret sits.
    pub head: usize,
}

impl EditorSelection {
    /// Collapsed selection at `offset`.
    pub const fn caret(offset: usize) -> Self {
        Self {
            anchor: offset,
            head: offset,
        }
    }

    /// Lower bound of the selected span.
    pub fn from(self) -> usize {
        self.anchor.min(self.head)
    }

    /// Upper bound of the selected span.
    pub fn to(self) -> usize {
        self.anchor.max(self.head)
    }
}

/// Replacement of `[from, to)` with `insert`, leaving the caret at `cursor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Start of the replaced span.
    pub from: usize,
    /// End of the replaced span.
    pub to: usize,
    /// Inserted text.
    pub insert: String,
    /// Caret offset after the edit.
    pub cursor: usize,
}

/// Synchronous surface of a mounted caret-based editor.
pub trait EditorView {
    /// Full document text.
    fn text(&self) -> String;

    /// Current main selection.
    fn selection(&self) -> EditorSelection;

    /// Applies one edit, moves the caret, and focuses the editor.
    fn apply(&self, edit: &TextEdit) -> Result<(), String>;
}

/// Locates the editor view on demand and identifies the hosting document.
pub trait EditorViewSource {
    /// Returns the currently mounted view, if any.
    fn current_view(&self) -> Option<Rc<dyn EditorView>>;

    /// Stable identifier for the hosting document.
    fn document_id(&self) -> String;
}

/// [`DocumentAdapter`] over a caret-based editor.
///
/// `insert_text` with [`InsertLocation::Cursor`] inserts at the caret and leaves any selected text
/// in place.
pub struct CaretEditorAdapter {
    platform: Platform,
    source: Rc<dyn EditorViewSource>,
    timers: Rc<dyn TimerHost>,
}

impl CaretEditorAdapter {
    /// Creates an adapter tagged with `platform`.
    pub fn new(
        platform: Platform,
        source: Rc<dyn EditorViewSource>,
        timers: Rc<dyn TimerHost>,
    ) -> Self {
        Self {
            platform,
            source,
            timers,
        }
    }

    fn host_name(&self) -> &'static str {
        match self.platform {
            Platform::Overleaf => "CodeMirror editor",
            Platform::Word => "Word",
            Platform::Browser => "Text field",
        }
    }

    fn require_view(&self) -> Result<Rc<dyn EditorView>, AdapterError> {
        self.source
            .current_view()
            .ok_or(AdapterError::HostUnavailable {
                host: self.host_name(),
            })
    }

    fn apply(&self, view: &dyn EditorView, edit: TextEdit) -> Result<(), AdapterError> {
        view.apply(&edit)
            .map_err(|message| AdapterError::host("apply edit", message))
    }
}

fn selection_snapshot(view: &dyn EditorView) -> Option<SelectionInfo> {
    let text = view.text();
    let selection = view.selection();
    let (from, to) = (selection.from(), selection.to());
    if from == to {
        return None;
    }
    let len = text.chars().count();
    let selected = char_slice(&text, from, to);
    let info = SelectionInfo::new(selected)?;
    let before = char_slice(&text, 0, from);
    let after = char_slice(&text, to, len);
    Some(
        info.with_context(before, after)
            .with_range_id(RangeHandle { from, to }.encode()),
    )
}

impl DocumentAdapter for CaretEditorAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn is_ready(&self) -> bool {
        self.source.current_view().is_some()
    }

    fn get_full_text(&self) -> DocumentFuture<'_, Result<String, AdapterError>> {
        Box::pin(async move {
            Ok(self
                .source
                .current_view()
                .map(|view| view.text())
                .unwrap_or_default())
        })
    }

    fn get_selection(&self) -> DocumentFuture<'_, Result<Option<SelectionInfo>, AdapterError>> {
        Box::pin(async move {
            Ok(self
                .source
                .current_view()
                .and_then(|view| selection_snapshot(view.as_ref())))
        })
    }

    fn insert_text<'a>(
        &'a self,
        text: &'a str,
        location: InsertLocation,
    ) -> DocumentFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            let view = self.require_view()?;
            let len = view.text().chars().count();
            let at = match location {
                InsertLocation::Cursor => view.selection().head.min(len),
                InsertLocation::Start => 0,
                InsertLocation::End => len,
            };
            let edit = TextEdit {
                from: at,
                to: at,
                insert: text.to_string(),
                cursor: at + text.chars().count(),
            };
            self.apply(view.as_ref(), edit)
        })
    }

    fn replace_selection<'a>(
        &'a self,
        text: &'a str,
        range_id: Option<&'a str>,
    ) -> DocumentFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            let view = self.require_view()?;
            let len = view.text().chars().count();
            let (from, to) = match range_id
                .and_then(RangeHandle::parse)
                .and_then(|handle| handle.within(len))
            {
                Some(handle) => (handle.from, handle.to),
                None => {
                    let selection = view.selection();
                    (selection.from().min(len), selection.to().min(len))
                }
            };
            let edit = TextEdit {
                from,
                to,
                insert: text.to_string(),
                cursor: from + text.chars().count(),
            };
            self.apply(view.as_ref(), edit)
        })
    }

    fn on_selection_change(&self, callback: SelectionCallback) -> Option<SelectionSubscription> {
        let active = Rc::new(Cell::new(true));
        let tick_active = active.clone();
        let source = self.source.clone();
        let mut previous: Option<String> = None;
        let id = self.timers.set_interval(
            SELECTION_POLL_INTERVAL_MS,
            Box::new(move || {
                if !tick_active.get() {
                    return;
                }
                let current = source
                    .current_view()
                    .and_then(|view| selection_snapshot(view.as_ref()));
                let current_text = current.as_ref().map(|info| info.text.clone());
                if current_text != previous {
                    previous = current_text;
                    callback(current);
                }
            }),
        );
        let timers = self.timers.clone();
        Some(SelectionSubscription::new(active, move || {
            timers.clear_interval(id)
        }))
    }

    fn document_id(&self) -> String {
        self.source.document_id()
    }
}

struct MemoryEditorState {
    text: String,
    selection: EditorSelection,
    mounted: bool,
    document_id: String,
    edits: usize,
}

/// In-memory editor view and source for tests and headless embedding.
#[derive(Clone)]
pub struct MemoryEditorView {
    inner: Rc<RefCell<MemoryEditorState>>,
}

impl MemoryEditorView {
    /// Creates a mounted view holding `text` with the caret at the end.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let end = text.chars().count();
        Self {
            inner: Rc::new(RefCell::new(MemoryEditorState {
                text,
                selection: EditorSelection::caret(end),
                mounted: true,
                document_id: "memory".to_string(),
                edits: 0,
            })),
        }
    }

    /// Overrides the identifier reported through [`EditorViewSource::document_id`].
    pub fn with_document_id(self, document_id: impl Into<String>) -> Self {
        self.inner.borrow_mut().document_id = document_id.into();
        self
    }

    /// Moves the selection.
    pub fn select(&self, anchor: usize, head: usize) {
        self.inner.borrow_mut().selection = EditorSelection { anchor, head };
    }

    /// Replaces the whole document, keeping the selection clamped to the new length.
    pub fn set_text(&self, text: impl Into<String>) {
        let mut state = self.inner.borrow_mut();
        state.text = text.into();
        let len = state.text.chars().count();
        state.selection = EditorSelection {
            anchor: state.selection.anchor.min(len),
            head: state.selection.head.min(len),
        };
    }

    /// Toggles whether [`EditorViewSource::current_view`] finds the view.
    pub fn set_mounted(&self, mounted: bool) {
        self.inner.borrow_mut().mounted = mounted;
    }

    /// Number of edits applied so far.
    pub fn edit_count(&self) -> usize {
        self.inner.borrow().edits
    }
}

impl EditorView for MemoryEditorView {
    fn text(&self) -> String {
        self.inner.borrow().text.clone()
    }

    fn selection(&self) -> EditorSelection {
        self.inner.borrow().selection
    }

    fn apply(&self, edit: &TextEdit) -> Result<(), String> {
        let mut state = self.inner.borrow_mut();
        let len = state.text.chars().count();
        if edit.from > edit.to || edit.to > len {
            return Err(format!(
                "edit range {}..{} outside document of length {len}",
                edit.from, edit.to
            ));
        }
        let start = super::selection::byte_offset(&state.text, edit.from);
        let end = super::selection::byte_offset(&state.text, edit.to);
        state.text.replace_range(start..end, &edit.insert);
        state.selection = EditorSelection::caret(edit.cursor);
        state.edits += 1;
        Ok(())
    }
}

impl EditorViewSource for MemoryEditorView {
    fn current_view(&self) -> Option<Rc<dyn EditorView>> {
        if self.inner.borrow().mounted {
            Some(Rc::new(self.clone()))
        } else {
            None
        }
    }

    fn document_id(&self) -> String {
        self.inner.borrow().document_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        document::selection::{SELECTED_TEXT_END, SELECTED_TEXT_START},
        timer::ManualTimers,
    };

    fn adapter(view: &MemoryEditorView, timers: &ManualTimers) -> CaretEditorAdapter {
        CaretEditorAdapter::new(
            Platform::Overleaf,
            Rc::new(view.clone()),
            Rc::new(timers.clone()),
        )
    }

    #[test]
    fn insert_at_end_moves_cursor_after_text() {
        let view = MemoryEditorView::new("A B");
        view.select(0, 0);
        let adapter = adapter(&view, &ManualTimers::default());

        block_on(adapter.insert_text("Hello", InsertLocation::End)).expect("insert");

        assert_eq!(view.text(), "A BHello");
        assert_eq!(view.selection(), EditorSelection::caret(8));
    }

    #[test]
    fn cursor_insert_keeps_selected_text() {
        let view = MemoryEditorView::new("one two");
        view.select(0, 3);
        let adapter = adapter(&view, &ManualTimers::default());

        block_on(adapter.insert_text("!", InsertLocation::Cursor)).expect("insert");

        assert_eq!(view.text(), "one! two");
        assert_eq!(view.selection(), EditorSelection::caret(4));
    }

    #[test]
    fn start_insert_prepends() {
        let view = MemoryEditorView::new("body");
        let adapter = adapter(&view, &ManualTimers::default());
        block_on(adapter.insert_text("> ", InsertLocation::Start)).expect("insert");
        assert_eq!(view.text(), "> body");
        assert_eq!(view.selection(), EditorSelection::caret(2));
    }

    #[test]
    fn unmounted_view_reads_empty_and_rejects_writes() {
        let view = MemoryEditorView::new("text");
        view.set_mounted(false);
        let adapter = adapter(&view, &ManualTimers::default());

        assert!(!adapter.is_ready());
        assert_eq!(block_on(adapter.get_full_text()).expect("text"), "");
        assert_eq!(block_on(adapter.get_selection()).expect("selection"), None);
        assert_eq!(
            block_on(adapter.insert_text("x", InsertLocation::End)),
            Err(AdapterError::HostUnavailable {
                host: "CodeMirror editor"
            })
        );
    }

    #[test]
    fn collapsed_or_blank_selection_is_none() {
        let view = MemoryEditorView::new("a   b");
        let adapter = adapter(&view, &ManualTimers::default());

        view.select(2, 2);
        assert_eq!(block_on(adapter.get_selection()).expect("selection"), None);
        view.select(1, 4);
        assert_eq!(block_on(adapter.get_selection()).expect("selection"), None);
    }

    #[test]
    fn selection_carries_context_and_range_handle() {
        let view = MemoryEditorView::new("alpha beta gamma");
        view.select(10, 6);
        let adapter = adapter(&view, &ManualTimers::default());

        let info = block_on(adapter.get_selection())
            .expect("selection")
            .expect("some selection");

        assert_eq!(info.text, "beta");
        assert_eq!(
            info.surrounding_text.as_deref(),
            Some(
                format!("alpha {SELECTED_TEXT_START}beta{SELECTED_TEXT_END} gamma").as_str()
            )
        );
        assert_eq!(
            info.range_id.as_deref().and_then(RangeHandle::parse),
            Some(RangeHandle { from: 6, to: 10 })
        );
    }

    #[test]
    fn replace_selection_targets_range_handle_after_selection_moves() {
        let view = MemoryEditorView::new("alpha beta gamma");
        view.select(6, 10);
        let adapter = adapter(&view, &ManualTimers::default());
        let info = block_on(adapter.get_selection())
            .expect("selection")
            .expect("some selection");

        view.select(0, 0);
        block_on(adapter.replace_selection("BETA", info.range_id.as_deref())).expect("replace");

        assert_eq!(view.text(), "alpha BETA gamma");
        assert_eq!(view.selection(), EditorSelection::caret(10));
    }

    #[test]
    fn malformed_range_handle_falls_back_to_live_selection() {
        let view = MemoryEditorView::new("alpha beta gamma");
        view.select(0, 5);
        let adapter = adapter(&view, &ManualTimers::default());

        block_on(adapter.replace_selection("ALPHA", Some("{not json"))).expect("replace");
        assert_eq!(view.text(), "ALPHA beta gamma");

        view.select(11, 16);
        block_on(adapter.replace_selection("G", Some(r#"{"from":0,"to":999}"#)))
            .expect("replace stale range");
        assert_eq!(view.text(), "ALPHA beta G");
    }

    #[test]
    fn polling_fires_only_on_change_and_stops_after_unsubscribe() {
        let view = MemoryEditorView::new("alpha beta");
        let timers = ManualTimers::default();
        let adapter = adapter(&view, &timers);
        let seen = Rc::new(RefCell::new(Vec::<Option<String>>::new()));
        let sink = seen.clone();

        let subscription = adapter
            .on_selection_change(Rc::new(move |selection: Option<SelectionInfo>| {
                sink.borrow_mut().push(selection.map(|info| info.text))
            }))
            .expect("polling subscription");

        timers.fire_intervals();
        view.select(0, 5);
        timers.fire_intervals();
        timers.fire_intervals();
        view.select(6, 10);
        timers.fire_intervals();
        view.select(3, 3);
        timers.fire_intervals();

        subscription.unsubscribe();
        subscription.unsubscribe();
        view.select(0, 10);
        timers.fire_intervals();

        assert_eq!(
            *seen.borrow(),
            vec![Some("alpha".to_string()), Some("beta".to_string()), None]
        );
        assert_eq!(timers.active_intervals(), 0);
    }

    #[test]
    fn document_id_comes_from_source() {
        let view = MemoryEditorView::new("").with_document_id("65f0c0ffee");
        let adapter = adapter(&view, &ManualTimers::default());
        assert_eq!(adapter.document_id(), "65f0c0ffee");
        assert_eq!(adapter.platform(), Platform::Overleaf);
    }
}
