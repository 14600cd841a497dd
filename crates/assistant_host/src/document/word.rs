//! Word task-pane adapter over the Office scripting bridge.
//!
//! The add-in cannot do anything without the Word API, so a missing host is a hard failure here
//! rather than the empty-value degradation used by caret editors. Word ranges cannot be
//! serialized, so range handles are never produced and `replace_selection` always targets the live
//! selection.

use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    rc::Rc,
};

use leptos::logging;

use super::{
    document_id::WordDocumentIds, AdapterError, DocumentAdapter, DocumentFuture, InsertLocation,
    Platform, SelectionCallback, SelectionInfo, SelectionSubscription,
};
use crate::{storage::settings::SettingsBag, timer::Spawner};

/// Object-safe boxed future used by [`WordHost`] async methods.
pub type WordFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Selected text plus the text around it inside the enclosing paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordSelection {
    /// Selected text; empty for a collapsed selection.
    pub text: String,
    /// Text preceding the selection.
    pub before: String,
    /// Text following the selection.
    pub after: String,
}

/// Insertion target understood by the Word host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordInsert {
    /// Replace the current selection.
    ReplaceSelection,
    /// Insert at the start of the body.
    Start,
    /// Insert at the end of the body.
    End,
}

/// Minimal Word host surface used by [`WordAdapter`].
pub trait WordHost {
    /// Returns whether the Word API is loaded.
    fn is_available(&self) -> bool;

    /// Reads the body text.
    fn body_text(&self) -> WordFuture<'_, Result<String, String>>;

    /// Reads the current selection with its paragraph context.
    fn selection(&self) -> WordFuture<'_, Result<WordSelection, String>>;

    /// Inserts `text` at `at`.
    fn insert<'a>(&'a self, text: &'a str, at: WordInsert) -> WordFuture<'a, Result<(), String>>;

    /// Document URL, or `None` for unsaved/local documents.
    fn document_url(&self) -> Option<String>;

    /// Registers a `DocumentSelectionChanged` handler and returns its id.
    fn add_selection_handler(&self, handler: Rc<dyn Fn()>) -> Result<u64, String>;

    /// Removes a handler registered through [`WordHost::add_selection_handler`].
    fn remove_selection_handler(&self, id: u64);
}

/// [`DocumentAdapter`] for Word.
///
/// `insert_text` with [`InsertLocation::Cursor`] replaces the current selection.
pub struct WordAdapter {
    host: Rc<dyn WordHost>,
    ids: WordDocumentIds,
    spawner: Spawner,
}

impl WordAdapter {
    /// Creates an adapter persisting its document id through `settings`.
    pub fn new(host: Rc<dyn WordHost>, settings: Rc<dyn SettingsBag>, spawner: Spawner) -> Self {
        Self {
            host,
            ids: WordDocumentIds::new(settings, spawner.clone()),
            spawner,
        }
    }

    fn require_host(&self) -> Result<(), AdapterError> {
        if self.host.is_available() {
            Ok(())
        } else {
            Err(AdapterError::HostUnavailable { host: "Word" })
        }
    }
}

fn selection_info(selection: WordSelection) -> Option<SelectionInfo> {
    SelectionInfo::new(selection.text)
        .map(|info| info.with_context(&selection.before, &selection.after))
}

impl DocumentAdapter for WordAdapter {
    fn platform(&self) -> Platform {
        Platform::Word
    }

    fn is_ready(&self) -> bool {
        self.host.is_available()
    }

    fn get_full_text(&self) -> DocumentFuture<'_, Result<String, AdapterError>> {
        Box::pin(async move {
            self.require_host()?;
            self.host
                .body_text()
                .await
                .map_err(|message| AdapterError::host("get full text", message))
        })
    }

    fn get_selection(&self) -> DocumentFuture<'_, Result<Option<SelectionInfo>, AdapterError>> {
        Box::pin(async move {
            self.require_host()?;
            let selection = self
                .host
                .selection()
                .await
                .map_err(|message| AdapterError::host("get selection", message))?;
            Ok(selection_info(selection))
        })
    }

    fn insert_text<'a>(
        &'a self,
        text: &'a str,
        location: InsertLocation,
    ) -> DocumentFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            self.require_host()?;
            let at = match location {
                InsertLocation::Cursor => WordInsert::ReplaceSelection,
                InsertLocation::Start => WordInsert::Start,
                InsertLocation::End => WordInsert::End,
            };
            self.host
                .insert(text, at)
                .await
                .map_err(|message| AdapterError::host("insert text", message))
        })
    }

    fn replace_selection<'a>(
        &'a self,
        text: &'a str,
        _range_id: Option<&'a str>,
    ) -> DocumentFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            self.require_host()?;
            self.host
                .insert(text, WordInsert::ReplaceSelection)
                .await
                .map_err(|message| AdapterError::host("replace selection", message))
        })
    }

    fn on_selection_change(&self, callback: SelectionCallback) -> Option<SelectionSubscription> {
        if !self.host.is_available() {
            return None;
        }
        let active = Rc::new(Cell::new(true));
        let previous = Rc::new(RefCell::new(None::<String>));
        let handler_active = active.clone();
        let host = self.host.clone();
        let spawner = self.spawner.clone();
        let handler: Rc<dyn Fn()> = Rc::new(move || {
            if !handler_active.get() {
                return;
            }
            let active = handler_active.clone();
            let previous = previous.clone();
            let host = host.clone();
            let callback = callback.clone();
            spawner(Box::pin(async move {
                let current = match host.selection().await {
                    Ok(selection) => selection_info(selection),
                    Err(err) => {
                        logging::warn!("word selection refresh failed: {err}");
                        return;
                    }
                };
                if !active.get() {
                    return;
                }
                let current_text = current.as_ref().map(|info| info.text.clone());
                if *previous.borrow() == current_text {
                    return;
                }
                *previous.borrow_mut() = current_text;
                callback(current);
            }));
        });

        let id = match self.host.add_selection_handler(handler) {
            Ok(id) => id,
            Err(err) => {
                logging::warn!("word selection handler registration failed: {err}");
                return None;
            }
        };
        let host = self.host.clone();
        Some(SelectionSubscription::new(active, move || {
            host.remove_selection_handler(id)
        }))
    }

    fn document_id(&self) -> String {
        self.ids.resolve(self.host.document_url().as_deref())
    }
}
