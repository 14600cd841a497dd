//! Selection snapshots, bounded context windows, and serialized range handles.

use serde::{Deserialize, Serialize};

/// Marker placed immediately before the selected span inside [`SelectionInfo::surrounding_text`].
pub const SELECTED_TEXT_START: &str = "[SELECTED_TEXT_START]";
/// Marker placed immediately after the selected span inside [`SelectionInfo::surrounding_text`].
pub const SELECTED_TEXT_END: &str = "[SELECTED_TEXT_END]";
/// Characters of context kept on each side of a selection.
pub const CONTEXT_WINDOW_CHARS: usize = 100;

/// Snapshot of a non-blank selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionInfo {
    /// Selected text. Never empty or whitespace-only.
    pub text: String,
    /// Selected text bracketed by markers inside a fixed-width context window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surrounding_text: Option<String>,
    /// Adapter-specific serialized range handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_id: Option<String>,
}

impl SelectionInfo {
    /// Builds a snapshot, returning `None` for empty or whitespace-only text.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            text,
            surrounding_text: None,
            range_id: None,
        })
    }

    /// Attaches a context window built from the text before and after the selection.
    pub fn with_context(mut self, before: &str, after: &str) -> Self {
        self.surrounding_text = Some(surrounding_text(before, &self.text, after));
        self
    }

    /// Attaches a serialized range handle.
    pub fn with_range_id(mut self, range_id: impl Into<String>) -> Self {
        self.range_id = Some(range_id.into());
        self
    }
}

/// Brackets `selected` with markers inside at most [`CONTEXT_WINDOW_CHARS`] characters of context
/// on each side.
///
/// Marker strings occurring in the context or in the selection itself are dropped so the result
/// contains exactly one of each.
pub fn surrounding_text(before: &str, selected: &str, after: &str) -> String {
    let before = strip_markers(before);
    let selected = strip_markers(selected);
    let after = strip_markers(after);
    let before = tail_chars(&before, CONTEXT_WINDOW_CHARS);
    let after = head_chars(&after, CONTEXT_WINDOW_CHARS);
    format!("{before}{SELECTED_TEXT_START}{selected}{SELECTED_TEXT_END}{after}")
}

fn strip_markers(text: &str) -> String {
    text.replace(SELECTED_TEXT_START, "")
        .replace(SELECTED_TEXT_END, "")
}

fn tail_chars(text: &str, count: usize) -> &str {
    let total = text.chars().count();
    if total <= count {
        return text;
    }
    let start = byte_offset(text, total - count);
    &text[start..]
}

fn head_chars(text: &str, count: usize) -> &str {
    let end = byte_offset(text, count);
    &text[..end]
}

/// Converts a Unicode-scalar offset into a byte offset, clamping to the end of `text`.
pub(crate) fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map_or(text.len(), |(index, _)| index)
}

/// Returns the characters in `[from, to)` by Unicode-scalar offset.
pub(crate) fn char_slice(text: &str, from: usize, to: usize) -> &str {
    let start = byte_offset(text, from);
    let end = byte_offset(text, to.max(from));
    &text[start..end]
}

/// Serializable handle naming a span in Unicode-scalar offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeHandle {
    /// Inclusive start offset.
    pub from: usize,
    /// Exclusive end offset.
    pub to: usize,
}

impl RangeHandle {
    /// Encodes the handle as the opaque string carried in [`SelectionInfo::range_id`].
    pub fn encode(self) -> String {
        serde_json::json!({ "from": self.from, "to": self.to }).to_string()
    }

    /// Parses a handle, returning `None` for malformed or inverted input.
    pub fn parse(raw: &str) -> Option<Self> {
        let handle: Self = serde_json::from_str(raw).ok()?;
        (handle.from <= handle.to).then_some(handle)
    }

    /// Returns the handle only if it still fits inside a document of `len` characters.
    pub fn within(self, len: usize) -> Option<Self> {
        (self.to <= len).then_some(self)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn blank_text_never_builds_a_selection() {
        assert_eq!(SelectionInfo::new(""), None);
        assert_eq!(SelectionInfo::new(" \n\t "), None);
        assert!(SelectionInfo::new(" x ").is_some());
    }

    #[test]
    fn surrounding_text_brackets_selection_once() {
        let text = surrounding_text("before ", "chosen", " after");
        assert_eq!(
            text,
            "before [SELECTED_TEXT_START]chosen[SELECTED_TEXT_END] after"
        );
        assert_eq!(text.matches(SELECTED_TEXT_START).count(), 1);
        assert_eq!(text.matches(SELECTED_TEXT_END).count(), 1);
    }

    #[test]
    fn surrounding_text_caps_context_per_side() {
        let before = "b".repeat(250);
        let after = "é".repeat(250);
        let text = surrounding_text(&before, "x", &after);
        let expected = format!(
            "{}{SELECTED_TEXT_START}x{SELECTED_TEXT_END}{}",
            "b".repeat(CONTEXT_WINDOW_CHARS),
            "é".repeat(CONTEXT_WINDOW_CHARS)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn surrounding_text_drops_marker_lookalikes_from_context() {
        let text = surrounding_text("[SELECTED_TEXT_END]a", "x", "b[SELECTED_TEXT_START]");
        assert_eq!(text.matches(SELECTED_TEXT_START).count(), 1);
        assert_eq!(text.matches(SELECTED_TEXT_END).count(), 1);
    }

    #[test]
    fn surrounding_text_drops_marker_lookalikes_from_selection() {
        let text = surrounding_text("a", "x[SELECTED_TEXT_END]y", "b");
        assert_eq!(text, "a[SELECTED_TEXT_START]xy[SELECTED_TEXT_END]b");
        assert_eq!(text.matches(SELECTED_TEXT_END).count(), 1);
    }

    #[test]
    fn range_handle_parse_rejects_garbage() {
        let handle = RangeHandle { from: 2, to: 5 };
        assert_eq!(RangeHandle::parse(&handle.encode()), Some(handle));
        assert_eq!(RangeHandle::parse("not json"), None);
        assert_eq!(RangeHandle::parse(r#"{"from":5,"to":2}"#), None);
        assert_eq!(RangeHandle::parse(r#"{"from":-1,"to":2}"#), None);
        assert_eq!(handle.within(4), None);
        assert_eq!(handle.within(5), Some(handle));
    }

    #[test]
    fn char_slice_uses_scalar_offsets() {
        assert_eq!(char_slice("héllo", 1, 3), "él");
        assert_eq!(char_slice("abc", 2, 10), "c");
    }
}
