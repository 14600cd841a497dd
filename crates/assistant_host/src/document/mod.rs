//! Document adapter contract shared by every host the assistant can run in.
//!
//! Each host gets an independent implementation of [`DocumentAdapter`]; there is no shared base
//! state. Every call queries the host afresh, so adapters hold handles to host services rather
//! than cached document content.

pub mod caret;
pub mod document_id;
pub mod selection;
pub mod subscription;
pub mod word;

use std::{future::Future, pin::Pin, rc::Rc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use selection::SelectionInfo;
pub use subscription::SelectionSubscription;

/// Object-safe boxed future used by [`DocumentAdapter`] async methods.
pub type DocumentFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Callback invoked with the new selection (or `None` when it collapsed) after a change.
pub type SelectionCallback = Rc<dyn Fn(Option<SelectionInfo>)>;

/// Discriminant naming the host family an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// Browser-embedded CodeMirror editor (Overleaf-style).
    Overleaf,
    /// Word task pane reached through the Office scripting bridge.
    Word,
    /// Generic browser page with a focused text field.
    Browser,
}

impl Platform {
    /// Returns a stable string token for diagnostics and registry ids.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Overleaf => "overleaf",
            Self::Word => "word",
            Self::Browser => "browser",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where [`DocumentAdapter::insert_text`] places new text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsertLocation {
    /// At the caret. Caret editors insert without consuming the selection; Word replaces it.
    #[default]
    Cursor,
    /// At the start of the document.
    Start,
    /// At the end of the document.
    End,
}

impl InsertLocation {
    /// Parses the string token used by UI props (`cursor`, `start`, `end`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "cursor" => Some(Self::Cursor),
            "start" => Some(Self::Start),
            "end" => Some(Self::End),
            _ => None,
        }
    }

    /// Returns the stable string token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cursor => "cursor",
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

/// Errors surfaced by document adapters for genuine precondition or host failures.
///
/// "No data right now" (no selection, editor not mounted yet on soft-dependency reads) is never an
/// error; those paths return empty values instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// A host API the operation cannot work without is missing.
    #[error("{host} API not available")]
    HostUnavailable {
        /// Human-readable host API name.
        host: &'static str,
    },
    /// The host API is present but the call failed.
    #[error("{operation} failed: {message}")]
    Host {
        /// Adapter operation that failed.
        operation: &'static str,
        /// Host-provided failure detail.
        message: String,
    },
}

impl AdapterError {
    pub(crate) fn host(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Host {
            operation,
            message: message.into(),
        }
    }
}

/// Host-agnostic view of "the user's document".
pub trait DocumentAdapter {
    /// Host family this adapter talks to.
    fn platform(&self) -> Platform;

    /// Returns whether the host API surface is present. Cheap and side-effect free.
    fn is_ready(&self) -> bool;

    /// Reads the whole document text.
    fn get_full_text(&self) -> DocumentFuture<'_, Result<String, AdapterError>>;

    /// Reads the current non-blank selection, or `None` when nothing is selected.
    fn get_selection(&self) -> DocumentFuture<'_, Result<Option<SelectionInfo>, AdapterError>>;

    /// Inserts `text` at `location`.
    fn insert_text<'a>(
        &'a self,
        text: &'a str,
        location: InsertLocation,
    ) -> DocumentFuture<'a, Result<(), AdapterError>>;

    /// Replaces the range named by `range_id`, or the live selection when the handle is absent or
    /// unusable.
    fn replace_selection<'a>(
        &'a self,
        text: &'a str,
        range_id: Option<&'a str>,
    ) -> DocumentFuture<'a, Result<(), AdapterError>>;

    /// Subscribes to selection changes. Hosts without any observation strategy return `None`.
    fn on_selection_change(&self, callback: SelectionCallback) -> Option<SelectionSubscription> {
        let _ = callback;
        None
    }

    /// Stable identifier for the current document.
    fn document_id(&self) -> String;
}
