//! Document identity: native project ids, URL-derived hashes, and persisted Word document ids.

use std::{cell::RefCell, rc::Rc};

use leptos::logging;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    storage::{
        keys::{DOCUMENT_ID_KEY, DOCUMENT_URL_KEY},
        settings::SettingsBag,
    },
    timer::Spawner,
};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Derives a stable 16-digit lowercase hex id from a document URL (64-bit FNV-1a).
pub fn hash_document_url(url: &str) -> String {
    let hash = url
        .bytes()
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        });
    format!("{hash:016x}")
}

/// Extracts the project id from an Overleaf path such as `/project/65f0c0ffee/detached`.
pub fn overleaf_project_id(path: &str) -> Option<String> {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    while let Some(segment) = segments.next() {
        if segment == "project" {
            return segments
                .next()
                .filter(|id| id.chars().all(|c| c.is_ascii_alphanumeric()))
                .map(str::to_string);
        }
    }
    None
}

/// Hashes a page URL with its query string and fragment removed.
pub fn page_document_id(href: &str) -> String {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    hash_document_url(&href[..end])
}

struct CachedDocumentId {
    id: String,
    url: Option<String>,
}

/// Persisted document id for hosts without a native one.
///
/// The first lookup prefers an id already saved in per-document settings. Later lookups only
/// compare the document URL against the cached one and re-derive when it moved: a URL hashes to
/// the same id on every device, while an unsaved document gets a random UUID.
pub struct WordDocumentIds {
    settings: Rc<dyn SettingsBag>,
    spawner: Spawner,
    cached: RefCell<Option<CachedDocumentId>>,
}

impl WordDocumentIds {
    /// Creates a resolver persisting through `settings`.
    pub fn new(settings: Rc<dyn SettingsBag>, spawner: Spawner) -> Self {
        Self {
            settings,
            spawner,
            cached: RefCell::new(None),
        }
    }

    /// Returns the id for the document currently at `current_url`.
    pub fn resolve(&self, current_url: Option<&str>) -> String {
        let current_url = current_url.filter(|url| !url.is_empty());
        if let Some(cached) = self.cached.borrow().as_ref() {
            if cached.url.as_deref() == current_url {
                return cached.id.clone();
            }
        }

        if self.cached.borrow().is_none() {
            if let Some(id) = self.stored_string(DOCUMENT_ID_KEY) {
                *self.cached.borrow_mut() = Some(CachedDocumentId {
                    id: id.clone(),
                    url: current_url.map(str::to_string),
                });
                return id;
            }
        }

        let id = match current_url {
            Some(url) => hash_document_url(url),
            None => Uuid::new_v4().to_string(),
        };
        self.persist(&id, current_url);
        *self.cached.borrow_mut() = Some(CachedDocumentId {
            id: id.clone(),
            url: current_url.map(str::to_string),
        });
        id
    }

    fn stored_string(&self, key: &str) -> Option<String> {
        match self.settings.get(key) {
            Some(Value::String(value)) if !value.is_empty() => Some(value),
            _ => None,
        }
    }

    fn persist(&self, id: &str, url: Option<&str>) {
        self.settings
            .set(DOCUMENT_ID_KEY, Value::String(id.to_string()));
        match url {
            Some(url) => self
                .settings
                .set(DOCUMENT_URL_KEY, Value::String(url.to_string())),
            None => self.settings.remove(DOCUMENT_URL_KEY),
        }
        let save = self.settings.save();
        (self.spawner)(Box::pin(async move {
            if let Err(err) = save.await {
                logging::warn!("document id settings save failed: {err}");
            }
        }));
    }
}
