//! Shared event channel the bridge client and relay communicate over.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use serde_json::Value;

/// Handle for one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Listener callback receiving the event detail.
pub type EventHandler = Rc<dyn Fn(Value)>;

/// Named-event channel shared by contexts on the same page.
pub trait EventChannel {
    /// Delivers `detail` to every listener of `event`.
    fn dispatch(&self, event: &str, detail: Value);

    /// Registers a listener for `event`.
    fn listen(&self, event: &str, handler: EventHandler) -> ListenerId;

    /// Removes a listener. Unknown ids are ignored.
    fn unlisten(&self, event: &str, id: ListenerId);
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    listeners: HashMap<String, Vec<(ListenerId, EventHandler)>>,
}

/// In-process [`EventChannel`].
///
/// Handlers run outside any interior borrow, so they may dispatch or (un)listen re-entrantly. A
/// listener removed while an event is being delivered is not invoked for that event.
#[derive(Clone, Default)]
pub struct LocalEventBus {
    inner: Rc<RefCell<BusState>>,
}

impl LocalEventBus {
    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .get(event)
            .map_or(0, Vec::len)
    }

    fn is_registered(&self, event: &str, id: ListenerId) -> bool {
        self.inner
            .borrow()
            .listeners
            .get(event)
            .is_some_and(|listeners| listeners.iter().any(|(existing, _)| *existing == id))
    }
}

impl EventChannel for LocalEventBus {
    fn dispatch(&self, event: &str, detail: Value) {
        let handlers: Vec<(ListenerId, EventHandler)> = self
            .inner
            .borrow()
            .listeners
            .get(event)
            .cloned()
            .unwrap_or_default();
        for (id, handler) in handlers {
            if self.is_registered(event, id) {
                handler(detail.clone());
            }
        }
    }

    fn listen(&self, event: &str, handler: EventHandler) -> ListenerId {
        let mut state = self.inner.borrow_mut();
        state.next_id += 1;
        let id = ListenerId(state.next_id);
        state
            .listeners
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    fn unlisten(&self, event: &str, id: ListenerId) {
        let mut state = self.inner.borrow_mut();
        if let Some(listeners) = state.listeners.get_mut(event) {
            listeners.retain(|(existing, _)| *existing != id);
            if listeners.is_empty() {
                state.listeners.remove(event);
            }
        }
    }
}
