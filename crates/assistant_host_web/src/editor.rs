//! DOM editor views: Overleaf's CodeMirror instance and the last focused text field.
//!
//! Both hosts count positions in UTF-16 code units. The core adapter works in Unicode scalars, so
//! every position is converted here.

use std::rc::Rc;

use assistant_host::{
    overleaf_project_id, page_document_id, EditorSelection, EditorView, EditorViewSource, TextEdit,
};

use crate::interop;

/// Which DOM editor a view reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKind {
    /// Overleaf's CodeMirror 6 view.
    CodeMirror,
    /// The focused (or most recently focused) `<textarea>`/`<input>`.
    FocusedField,
}

/// Live [`EditorView`] over a DOM editor. Reads go to the page on every call.
#[derive(Debug, Clone, Copy)]
pub struct DomEditorView {
    kind: EditorKind,
}

impl EditorView for DomEditorView {
    fn text(&self) -> String {
        match self.kind {
            EditorKind::CodeMirror => interop::cm_text(),
            EditorKind::FocusedField => interop::field_text(),
        }
        .unwrap_or_default()
    }

    fn selection(&self) -> EditorSelection {
        let raw = match self.kind {
            EditorKind::CodeMirror => interop::cm_selection(),
            EditorKind::FocusedField => interop::field_selection(),
        };
        let Some((anchor, head)) = raw else {
            return EditorSelection::default();
        };
        let text = self.text();
        EditorSelection {
            anchor: utf16_to_char_offset(&text, anchor),
            head: utf16_to_char_offset(&text, head),
        }
    }

    fn apply(&self, edit: &TextEdit) -> Result<(), String> {
        let (from, to, cursor) = edit_to_utf16(&self.text(), edit);
        match self.kind {
            EditorKind::CodeMirror => interop::cm_apply(from, to, &edit.insert, cursor),
            EditorKind::FocusedField => interop::field_apply(from, to, &edit.insert, cursor),
        }
    }
}

/// [`EditorViewSource`] that looks the DOM editor up on demand.
#[derive(Debug, Clone, Copy)]
pub struct DomEditorSource {
    kind: EditorKind,
}

impl DomEditorSource {
    /// Source for Overleaf's CodeMirror editor.
    pub const fn code_mirror() -> Self {
        Self {
            kind: EditorKind::CodeMirror,
        }
    }

    /// Source for the focused text field of an arbitrary page.
    pub const fn focused_field() -> Self {
        Self {
            kind: EditorKind::FocusedField,
        }
    }

    /// Editor kind this source looks up.
    pub const fn kind(&self) -> EditorKind {
        self.kind
    }
}

impl EditorViewSource for DomEditorSource {
    fn current_view(&self) -> Option<Rc<dyn EditorView>> {
        let mounted = match self.kind {
            EditorKind::CodeMirror => interop::cm_is_mounted(),
            EditorKind::FocusedField => interop::field_is_mounted(),
        };
        mounted.then(|| Rc::new(DomEditorView { kind: self.kind }) as Rc<dyn EditorView>)
    }

    fn document_id(&self) -> String {
        let href = interop::location_href().unwrap_or_default();
        match self.kind {
            EditorKind::CodeMirror => interop::location_pathname()
                .and_then(|path| overleaf_project_id(&path))
                .unwrap_or_else(|| page_document_id(&href)),
            EditorKind::FocusedField => page_document_id(&href),
        }
    }
}

/// Converts a UTF-16 offset into a Unicode-scalar offset, clamping to the end of `text`.
pub fn utf16_to_char_offset(text: &str, utf16: u32) -> usize {
    let mut units = 0u32;
    for (index, ch) in text.chars().enumerate() {
        if units >= utf16 {
            return index;
        }
        units += ch.len_utf16() as u32;
    }
    text.chars().count()
}

/// Converts a Unicode-scalar offset into a UTF-16 offset, clamping to the end of `text`.
pub fn char_to_utf16_offset(text: &str, chars: usize) -> u32 {
    text.chars()
        .take(chars)
        .map(|ch| ch.len_utf16() as u32)
        .sum()
}

/// `(from, to, cursor)` of `edit` in UTF-16 units. `cursor` refers to the text after the edit.
fn edit_to_utf16(text: &str, edit: &TextEdit) -> (u32, u32, u32) {
    let from = char_to_utf16_offset(text, edit.from);
    let to = char_to_utf16_offset(text, edit.to);
    let inserted = edit.insert.chars().count();
    let cursor = if edit.cursor <= edit.from {
        char_to_utf16_offset(text, edit.cursor)
    } else if edit.cursor <= edit.from + inserted {
        from + char_to_utf16_offset(&edit.insert, edit.cursor - edit.from)
    } else {
        let tail = edit.cursor - edit.from - inserted;
        from + char_to_utf16_offset(&edit.insert, inserted)
            + (char_to_utf16_offset(text, edit.to + tail) - to)
    };
    (from, to, cursor)
}
