//! Office.js implementation of [`WordHost`].

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
};

use assistant_host::{WordFuture, WordHost, WordInsert, WordSelection};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::closure::Closure;

use crate::interop;

/// Single host registration for `DocumentSelectionChanged`.
trait SelectionEvent {
    fn attach(&self, fan_out: Rc<dyn Fn()>) -> Result<(), String>;
    fn detach(&self);
}

/// Fans one host selection event out to every subscriber.
///
/// The host handler is attached with the first subscriber and detached after the last one leaves.
struct SelectionFanOut<E> {
    event: E,
    next_id: Cell<u64>,
    handlers: RefCell<BTreeMap<u64, Rc<dyn Fn()>>>,
}

impl<E: SelectionEvent + 'static> SelectionFanOut<E> {
    fn new(event: E) -> Rc<Self> {
        Rc::new(Self {
            event,
            next_id: Cell::new(0),
            handlers: RefCell::new(BTreeMap::new()),
        })
    }

    fn add(self: &Rc<Self>, handler: Rc<dyn Fn()>) -> Result<u64, String> {
        if self.handlers.borrow().is_empty() {
            let fan_out = Rc::downgrade(self);
            self.event.attach(Rc::new(move || {
                if let Some(fan_out) = fan_out.upgrade() {
                    fan_out.notify();
                }
            }))?;
        }
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.handlers.borrow_mut().insert(id, handler);
        Ok(id)
    }

    fn remove(&self, id: u64) {
        let emptied = {
            let mut handlers = self.handlers.borrow_mut();
            handlers.remove(&id).is_some() && handlers.is_empty()
        };
        if emptied {
            self.event.detach();
        }
    }

    fn notify(&self) {
        let handlers: Vec<_> = self.handlers.borrow().values().cloned().collect();
        for handler in handlers {
            handler();
        }
    }
}

#[derive(Default)]
struct OfficeSelectionEvent {
    #[cfg(target_arch = "wasm32")]
    closure: RefCell<Option<Closure<dyn FnMut()>>>,
}

impl SelectionEvent for OfficeSelectionEvent {
    fn attach(&self, fan_out: Rc<dyn Fn()>) -> Result<(), String> {
        #[cfg(target_arch = "wasm32")]
        {
            let closure = Closure::wrap(Box::new(move || fan_out()) as Box<dyn FnMut()>);
            interop::word_attach_selection_event(&closure)?;
            *self.closure.borrow_mut() = Some(closure);
            Ok(())
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = fan_out;
            Err("Word API not available".to_string())
        }
    }

    fn detach(&self) {
        interop::word_detach_selection_event();

        // The last subscriber may leave from inside the event callback.
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(closure) = self.closure.borrow_mut().take() {
                wasm_bindgen_futures::spawn_local(async move { drop(closure) });
            }
        }
    }
}

/// Word host backed by `Word.run` and `Office.context.document`.
#[derive(Clone)]
pub struct OfficeWordHost {
    selection: Rc<SelectionFanOut<OfficeSelectionEvent>>,
}

impl Default for OfficeWordHost {
    fn default() -> Self {
        Self {
            selection: SelectionFanOut::new(OfficeSelectionEvent::default()),
        }
    }
}

const fn insert_location(at: WordInsert) -> &'static str {
    match at {
        WordInsert::ReplaceSelection => "Replace",
        WordInsert::Start => "Start",
        WordInsert::End => "End",
    }
}

impl WordHost for OfficeWordHost {
    fn is_available(&self) -> bool {
        interop::word_available()
    }

    fn body_text(&self) -> WordFuture<'_, Result<String, String>> {
        Box::pin(interop::word_body_text())
    }

    fn selection(&self) -> WordFuture<'_, Result<WordSelection, String>> {
        Box::pin(async move {
            let payload = interop::word_selection().await?;
            Ok(WordSelection {
                text: payload.text,
                before: payload.before,
                after: payload.after,
            })
        })
    }

    fn insert<'a>(&'a self, text: &'a str, at: WordInsert) -> WordFuture<'a, Result<(), String>> {
        Box::pin(interop::word_insert(text, insert_location(at)))
    }

    fn document_url(&self) -> Option<String> {
        interop::word_document_url().filter(|url| !url.is_empty())
    }

    fn add_selection_handler(&self, handler: Rc<dyn Fn()>) -> Result<u64, String> {
        self.selection.add(handler)
    }

    fn remove_selection_handler(&self, id: u64) {
        self.selection.remove(id);
    }
}
