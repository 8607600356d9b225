//! Per-`Sound` callback bookkeeping: the on-stop callback stack and the
//! timed-event map, both guarded by one mutex since the producer thread and
//! the `Sound` handle can touch them concurrently.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// A user callback. Boxed so `Sound` can hold a heterogeneous collection of
/// them without a generic parameter leaking into its public API.
pub type Callback = Box<dyn FnMut() + Send>;

#[derive(Default)]
struct Inner {
    on_stop: Vec<Callback>,
    timed_events: BTreeMap<u64, Vec<Callback>>,
    fired: std::collections::BTreeSet<u64>,
}

/// Owned by a `Sound`, shared with its producer thread via `Arc`.
#[derive(Default)]
pub struct Callbacks {
    inner: Mutex<Inner>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a callback to run the next time this sound stops for a reason
    /// other than being paused (LIFO: most recently pushed runs first).
    pub fn push_on_stop(&self, callback: Callback) {
        self.lock().on_stop.push(callback);
    }

    /// Removes and returns the most recently pushed on-stop callback without
    /// running it.
    pub fn pop_on_stop(&self) -> Option<Callback> {
        self.lock().on_stop.pop()
    }

    /// Removes every on-stop callback.
    pub fn clear_on_stop(&self) {
        self.lock().on_stop.clear();
    }

    /// Runs and drains every on-stop callback, most recently pushed first.
    pub fn drain_on_stop(&self) {
        let mut callbacks = {
            let mut inner = self.lock();
            std::mem::take(&mut inner.on_stop)
        };
        while let Some(mut callback) = callbacks.pop() {
            callback();
        }
    }

    /// Registers a callback to fire once playback position first reaches
    /// or passes `position_bytes`.
    pub fn add_timed_event(&self, position_bytes: u64, callback: Callback) {
        self.lock()
            .timed_events
            .entry(position_bytes)
            .or_default()
            .push(callback);
    }

    /// Removes every pending timed event.
    pub fn clear_timed_events(&self) {
        let mut inner = self.lock();
        inner.timed_events.clear();
        inner.fired.clear();
    }

    /// Fires every timed event whose position falls in
    /// `previous_position..=current_position`, in ascending position order,
    /// each at most once. Called by the producer thread after every chunk.
    pub fn fire_due_events(&self, previous_position: u64, current_position: u64) {
        let mut due = Vec::new();
        {
            let mut inner = self.lock();
            let positions: Vec<u64> = inner
                .timed_events
                .range(previous_position..=current_position)
                .map(|(&pos, _)| pos)
                .filter(|pos| !inner.fired.contains(pos))
                .collect();
            for pos in positions {
                inner.fired.insert(pos);
                if let Some(callbacks) = inner.timed_events.remove(&pos) {
                    due.extend(callbacks);
                }
            }
        }
        for mut callback in due {
            callback();
        }
    }

    /// Resets fired-event tracking so timed events can fire again after a
    /// seek back or restart.
    pub fn reset_fired(&self) {
        self.lock().fired.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn on_stop_runs_most_recently_pushed_first() {
        let callbacks = Callbacks::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = order.clone();
            callbacks.push_on_stop(Box::new(move || order.lock().unwrap().push(id)));
        }
        callbacks.drain_on_stop();
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn timed_events_fire_once_in_ascending_order() {
        let callbacks = Callbacks::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for pos in [300u64, 100, 200] {
            let order = order.clone();
            callbacks.add_timed_event(pos, Box::new(move || order.lock().unwrap().push(pos)));
        }

        callbacks.fire_due_events(0, 150);
        callbacks.fire_due_events(150, 1000);
        callbacks.fire_due_events(150, 1000); // must not fire twice

        assert_eq!(*order.lock().unwrap(), vec![100, 200, 300]);
    }

    #[test]
    fn pop_on_stop_drops_without_running() {
        let callbacks = Callbacks::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        callbacks.push_on_stop(Box::new(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        }));
        let popped = callbacks.pop_on_stop();
        assert!(popped.is_some());
        callbacks.drain_on_stop();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(callbacks.pop_on_stop().is_none());
    }
}
