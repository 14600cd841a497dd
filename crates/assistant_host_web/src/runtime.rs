//! Browser timers and task spawning.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use assistant_host::{IntervalId, Spawner, TimerHost};
use futures::future::LocalBoxFuture;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::closure::Closure;

#[cfg(target_arch = "wasm32")]
use crate::interop;

/// Starts tasks on the browser microtask queue.
///
/// Outside `wasm32` the task is polled once inline and dropped if still pending. Every fallback
/// host call resolves immediately, so that is enough for the shim.
pub fn browser_spawner() -> Spawner {
    Rc::new(|task: LocalBoxFuture<'static, ()>| {
        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(task);
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = futures::FutureExt::now_or_never(task);
        }
    })
}

#[cfg(target_arch = "wasm32")]
type IntervalEntry = (f64, Closure<dyn FnMut()>);
#[cfg(not(target_arch = "wasm32"))]
type IntervalEntry = Box<dyn FnMut()>;

#[derive(Default)]
struct IntervalTable {
    next_id: u64,
    entries: HashMap<IntervalId, IntervalEntry>,
}

/// [`TimerHost`] over `setTimeout`/`setInterval`.
///
/// Outside `wasm32` sleeps never resolve and intervals never tick.
#[derive(Clone, Default)]
pub struct WebTimers {
    intervals: Rc<RefCell<IntervalTable>>,
}

impl WebTimers {
    /// Number of intervals not yet cleared.
    pub fn active_intervals(&self) -> usize {
        self.intervals.borrow().entries.len()
    }
}

impl TimerHost for WebTimers {
    fn sleep(&self, duration_ms: u32) -> LocalBoxFuture<'static, ()> {
        #[cfg(target_arch = "wasm32")]
        {
            Box::pin(interop::sleep(duration_ms))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = duration_ms;
            Box::pin(futures::future::pending())
        }
    }

    fn set_interval(&self, period_ms: u32, tick: Box<dyn FnMut()>) -> IntervalId {
        let mut table = self.intervals.borrow_mut();
        table.next_id += 1;
        let id = IntervalId(table.next_id);

        #[cfg(target_arch = "wasm32")]
        let entry = {
            let closure = Closure::wrap(tick);
            (interop::set_interval(period_ms, &closure), closure)
        };
        #[cfg(not(target_arch = "wasm32"))]
        let entry = {
            let _ = period_ms;
            tick
        };

        table.entries.insert(id, entry);
        id
    }

    fn clear_interval(&self, id: IntervalId) {
        let removed = self.intervals.borrow_mut().entries.remove(&id);

        #[cfg(target_arch = "wasm32")]
        {
            if let Some((handle, closure)) = removed {
                interop::clear_interval(handle);
                // The tick may be the caller; release the closure after it returns.
                wasm_bindgen_futures::spawn_local(async move { drop(closure) });
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            drop(removed);
        }
    }
}
