//! Cancellation guard returned by [`super::DocumentAdapter::on_selection_change`].

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

/// Live selection-change subscription.
///
/// Dropping the guard unsubscribes. Owners that must keep watching for the lifetime of the page can
/// `std::mem::forget` it.
pub struct SelectionSubscription {
    active: Rc<Cell<bool>>,
    release: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl SelectionSubscription {
    /// Wraps a release action. `active` is shared with the host callback so late host events can be
    /// ignored once the subscription ends.
    pub fn new(active: Rc<Cell<bool>>, release: impl FnOnce() + 'static) -> Self {
        Self {
            active,
            release: RefCell::new(Some(Box::new(release))),
        }
    }

    /// Returns whether the subscription is still delivering callbacks.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Stops delivery and releases the host timer or listener. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        if self.active.replace(false) {
            if let Some(release) = self.release.borrow_mut().take() {
                release();
            }
        }
    }
}

impl Drop for SelectionSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for SelectionSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionSubscription")
            .field("active", &self.active.get())
            .finish()
    }
}
