//! DOM `CustomEvent` implementation of the bridge event channel.
//!
//! The page script and the isolated relay share `window` but not JavaScript objects, so event
//! details travel as JSON text.

#[cfg(target_arch = "wasm32")]
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use assistant_host::{EventChannel, EventHandler, ListenerId};
#[cfg(not(target_arch = "wasm32"))]
use assistant_host::LocalEventBus;
use serde_json::Value;

#[cfg(target_arch = "wasm32")]
use leptos::logging;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{closure::Closure, JsValue};

#[cfg(target_arch = "wasm32")]
use crate::interop;

#[cfg(target_arch = "wasm32")]
#[derive(Default)]
struct DomListeners {
    next_id: u64,
    entries: HashMap<ListenerId, (String, JsValue, Closure<dyn FnMut(String)>)>,
}

/// [`EventChannel`] dispatching `CustomEvent`s on `window`.
///
/// Outside `wasm32` it is backed by an in-process [`LocalEventBus`].
#[derive(Clone, Default)]
pub struct DomEventChannel {
    #[cfg(target_arch = "wasm32")]
    listeners: Rc<RefCell<DomListeners>>,
    #[cfg(not(target_arch = "wasm32"))]
    bus: LocalEventBus,
}

#[cfg(target_arch = "wasm32")]
impl EventChannel for DomEventChannel {
    fn dispatch(&self, event: &str, detail: Value) {
        interop::event_dispatch(event, &detail);
    }

    fn listen(&self, event: &str, handler: EventHandler) -> ListenerId {
        let name = event.to_string();
        let closure = Closure::wrap(Box::new(move |raw: String| {
            match serde_json::from_str::<Value>(&raw) {
                Ok(detail) => handler(detail),
                Err(err) => logging::warn!("[bridge] undecodable `{name}` detail: {err}"),
            }
        }) as Box<dyn FnMut(String)>);
        let js_listener = interop::event_listen(event, &closure);

        let mut listeners = self.listeners.borrow_mut();
        listeners.next_id += 1;
        let id = ListenerId(listeners.next_id);
        listeners
            .entries
            .insert(id, (event.to_string(), js_listener, closure));
        id
    }

    fn unlisten(&self, event: &str, id: ListenerId) {
        let removed = self.listeners.borrow_mut().entries.remove(&id);
        if let Some((registered, js_listener, closure)) = removed {
            debug_assert_eq!(registered, event);
            interop::event_unlisten(&registered, &js_listener);
            // Bridge listeners unlisten themselves from inside the callback.
            wasm_bindgen_futures::spawn_local(async move { drop(closure) });
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl EventChannel for DomEventChannel {
    fn dispatch(&self, event: &str, detail: Value) {
        self.bus.dispatch(event, detail);
    }

    fn listen(&self, event: &str, handler: EventHandler) -> ListenerId {
        self.bus.listen(event, handler)
    }

    fn unlisten(&self, event: &str, id: ListenerId) {
        self.bus.unlisten(event, id);
    }
}
