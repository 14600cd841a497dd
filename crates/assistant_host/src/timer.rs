//! Timer and task-spawning seams used by polling adapters and the bridge timeout race.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use futures::{channel::oneshot, future::LocalBoxFuture};

/// Opaque handle for a repeating timer created through [`TimerHost::set_interval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntervalId(pub u64);

/// Starts a detached local task. Hosts are single-threaded, so futures need not be `Send`.
pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

/// Host timer service.
pub trait TimerHost {
    /// Returns a future that resolves once `duration_ms` has elapsed.
    fn sleep(&self, duration_ms: u32) -> LocalBoxFuture<'static, ()>;

    /// Calls `tick` every `period_ms` until the interval is cleared.
    fn set_interval(&self, period_ms: u32, tick: Box<dyn FnMut()>) -> IntervalId;

    /// Stops a repeating timer. Clearing an unknown or already-cleared id is a no-op.
    fn clear_interval(&self, id: IntervalId);
}

type Tick = Rc<RefCell<Box<dyn FnMut()>>>;

#[derive(Default)]
struct ManualTimersState {
    now_ms: u64,
    next_id: u64,
    intervals: BTreeMap<IntervalId, Tick>,
    sleepers: Vec<(u64, oneshot::Sender<()>)>,
}

/// Deterministic [`TimerHost`] driven explicitly by the caller.
///
/// Sleeps resolve on [`ManualTimers::advance`]; interval callbacks run on
/// [`ManualTimers::fire_intervals`].
#[derive(Clone, Default)]
pub struct ManualTimers {
    inner: Rc<RefCell<ManualTimersState>>,
}

impl ManualTimers {
    /// Returns the virtual clock in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.inner.borrow().now_ms
    }

    /// Moves the virtual clock forward and wakes every sleep whose deadline has passed.
    pub fn advance(&self, duration_ms: u64) {
        let due = {
            let mut state = self.inner.borrow_mut();
            state.now_ms = state.now_ms.saturating_add(duration_ms);
            let now = state.now_ms;
            let (due, pending): (Vec<_>, Vec<_>) = state
                .sleepers
                .drain(..)
                .partition(|(deadline, _)| *deadline <= now);
            state.sleepers = pending;
            due
        };
        for (_, tx) in due {
            let _ = tx.send(());
        }
    }

    /// Runs every registered interval callback once.
    pub fn fire_intervals(&self) {
        let ticks: Vec<(IntervalId, Tick)> = self
            .inner
            .borrow()
            .intervals
            .iter()
            .map(|(id, tick)| (*id, tick.clone()))
            .collect();
        for (id, tick) in ticks {
            // An earlier callback in this round may have cleared this one.
            if !self.inner.borrow().intervals.contains_key(&id) {
                continue;
            }
            (tick.borrow_mut())();
        }
    }

    /// Number of intervals that have not been cleared.
    pub fn active_intervals(&self) -> usize {
        self.inner.borrow().intervals.len()
    }

    /// Number of sleeps still awaited by a live future.
    pub fn pending_sleeps(&self) -> usize {
        self.inner
            .borrow()
            .sleepers
            .iter()
            .filter(|(_, tx)| !tx.is_canceled())
            .count()
    }
}

impl TimerHost for ManualTimers {
    fn sleep(&self, duration_ms: u32) -> LocalBoxFuture<'static, ()> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.borrow_mut();
            let deadline = state.now_ms.saturating_add(u64::from(duration_ms));
            state.sleepers.push((deadline, tx));
        }
        Box::pin(async move {
            let _ = rx.await;
        })
    }

    fn set_interval(&self, _period_ms: u32, tick: Box<dyn FnMut()>) -> IntervalId {
        let mut state = self.inner.borrow_mut();
        state.next_id += 1;
        let id = IntervalId(state.next_id);
        state.intervals.insert(id, Rc::new(RefCell::new(tick)));
        id
    }

    fn clear_interval(&self, id: IntervalId) {
        self.inner.borrow_mut().intervals.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use futures::{executor::LocalPool, task::LocalSpawnExt};

    use super::*;

    #[test]
    fn sleep_resolves_only_after_deadline() {
        let timers = ManualTimers::default();
        let mut pool = LocalPool::new();
        let done = Rc::new(Cell::new(false));
        let done_flag = done.clone();
        let sleep = timers.sleep(100);
        pool.spawner()
            .spawn_local(async move {
                sleep.await;
                done_flag.set(true);
            })
            .expect("spawn");

        timers.advance(99);
        pool.run_until_stalled();
        assert!(!done.get());

        timers.advance(1);
        pool.run_until_stalled();
        assert!(done.get());
        assert_eq!(timers.pending_sleeps(), 0);
    }

    #[test]
    fn cleared_interval_stops_firing() {
        let timers = ManualTimers::default();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let id = timers.set_interval(
            500,
            Box::new(move || counter.set(counter.get() + 1)),
        );

        timers.fire_intervals();
        timers.fire_intervals();
        timers.clear_interval(id);
        timers.clear_interval(id);
        timers.fire_intervals();

        assert_eq!(count.get(), 2);
        assert_eq!(timers.active_intervals(), 0);
    }
}
