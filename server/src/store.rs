//! Observable value stores.
//!
//! A [`Readable`] holds a value and a list of listeners. Subscribing hands the
//! listener the current value straight away and then every later write until the
//! returned [`Subscription`] goes away.
//!
//! Stores built with a start function are lazy: the start function runs when the
//! first listener arrives and the [`Subscription`] it returns is released when the
//! last listener leaves. This is how upstream resources (auth listeners, document
//! feeds) are only held while somebody is actually watching.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

use crate::subscription::Subscription;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;
type StartFn<T> = Box<dyn Fn(Setter<T>) -> Subscription + Send + Sync>;

struct State<T> {
    value: T,
    listeners: Vec<(u64, Listener<T>)>,
    next_id: u64,
    /// Subscriptions handed out and not yet released
    subscribers: usize,
    /// Writes only notify once the start function has returned
    live: bool,
    stop: Option<Subscription>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    /// Held from a write through its fan-out, so every listener sees writes in the
    /// order they landed. Reentrant so a listener may write to or leave the store.
    notify: ReentrantMutex<()>,
    /// Serializes running the start function with dropping its stop handle
    lifecycle: Mutex<()>,
    start: Option<StartFn<T>>,
}

impl<T: Clone + Send + Sync + 'static> Inner<T> {
    fn write(&self, value: T, guard: impl FnOnce(&T) -> bool) -> bool {
        let _notify = self.notify.lock();

        let listeners: Vec<Listener<T>> = {
            let mut state = self.state.lock();
            if !guard(&state.value) {
                return false;
            }

            state.value = value.clone();
            if !state.live {
                return true;
            }

            state.listeners.iter().map(|(_, l)| l.clone()).collect()
        };

        for listener in listeners {
            listener(&value);
        }

        true
    }

    /// Count a new subscriber, running the start function for the first one
    fn acquire(self: &Arc<Self>) -> u64 {
        let _lifecycle = self.lifecycle.lock();

        let (id, first) = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers += 1;
            (id, state.subscribers == 1)
        };

        if first {
            if let Some(start) = &self.start {
                let stop = start(Setter {
                    inner: Arc::downgrade(self),
                });

                let previous = {
                    let mut state = self.state.lock();
                    state.live = true;
                    state.stop.replace(stop)
                };
                drop(previous);
            }
        }

        id
    }

    fn release(&self, id: u64) {
        {
            // Waits out an in-flight fan-out, nothing reaches the listener afterwards
            let _notify = self.notify.lock();
            self.state
                .lock()
                .listeners
                .retain(|(listener_id, _)| *listener_id != id);
        }

        let _lifecycle = self.lifecycle.lock();
        let stop = {
            let mut state = self.state.lock();
            state.subscribers = state.subscribers.saturating_sub(1);

            if state.subscribers == 0 && self.start.is_some() {
                state.live = false;
                state.stop.take()
            } else {
                None
            }
        };

        // Upstream is fully released before the next subscriber can start it again
        drop(stop);
    }
}

/// Write access handed to a store's start function.
///
/// Holds a weak reference, so a start function capturing its setter does not keep
/// the store alive.
pub struct Setter<T> {
    inner: Weak<Inner<T>>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Setter<T> {
    pub fn set(&self, value: T) {
        self.set_if(value, |_| true);
    }

    /// Write `value` only if `guard` accepts the current value.
    ///
    /// `guard` is evaluated while the store is locked, so no other write can land
    /// between the check and the write. Returns whether the value was written.
    pub fn set_if(&self, value: T, guard: impl FnOnce(&T) -> bool) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.write(value, guard),
            None => false,
        }
    }
}

pub struct Readable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Readable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Readable<T> {
    /// Create a lazy store whose value is driven by `start` while it has listeners
    pub fn new(
        initial: T,
        start: impl Fn(Setter<T>) -> Subscription + Send + Sync + 'static,
    ) -> Self {
        Self::build(initial, Some(Box::new(start)))
    }

    /// A store that always holds `value`
    pub fn constant(value: T) -> Self {
        Self::build(value, None)
    }

    fn build(initial: T, start: Option<StartFn<T>>) -> Self {
        let live = start.is_none();

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    value: initial,
                    listeners: Vec::new(),
                    next_id: 0,
                    subscribers: 0,
                    live,
                    stop: None,
                }),
                notify: ReentrantMutex::new(()),
                lifecycle: Mutex::new(()),
                start,
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.state.lock().value.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let listener: Listener<T> = Arc::new(listener);
        let id = self.inner.acquire();

        {
            // Registered and primed in one step, so no write slips in between
            let _notify = self.inner.notify.lock();
            let current = {
                let mut state = self.inner.state.lock();
                state.listeners.push((id, listener.clone()));
                state.value.clone()
            };
            listener(&current);
        }

        let inner = self.inner.clone();
        Subscription::new(move || inner.release(id))
    }
}

/// A store written to directly by its owner
pub struct Writable<T> {
    readable: Readable<T>,
}

impl<T> Clone for Writable<T> {
    fn clone(&self) -> Self {
        Self {
            readable: self.readable.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Writable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            readable: Readable::constant(initial),
        }
    }

    pub fn set(&self, value: T) {
        self.readable.inner.write(value, |_| true);
    }

    pub fn get(&self) -> T {
        self.readable.get()
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.readable.subscribe(listener)
    }

    pub fn readable(&self) -> Readable<T> {
        self.readable.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |value: &T| sink.lock().push(value.clone()))
    }

    #[test]
    fn test_subscribe_receives_current_value_then_updates() {
        let store = Writable::new(1);
        let (seen, listener) = recorder::<i32>();

        let sub = store.subscribe(listener);
        store.set(2);
        store.set(3);
        sub.unsubscribe();
        store.set(4);

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        assert_eq!(store.get(), 4);
    }

    #[test]
    fn test_start_runs_on_first_listener_and_stops_on_last() {
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));

        let (start_count, stop_count) = (starts.clone(), stops.clone());
        let store = Readable::new(0, move |_set| {
            start_count.fetch_add(1, Ordering::SeqCst);
            let stop_count = stop_count.clone();
            Subscription::new(move || {
                stop_count.fetch_add(1, Ordering::SeqCst);
            })
        });

        let first = store.subscribe(|_| {});
        let second = store.subscribe(|_| {});
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        drop(first);
        assert_eq!(stops.load(Ordering::SeqCst), 0);

        drop(second);
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        let _again = store.subscribe(|_| {});
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_restart_waits_for_stop_to_finish() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let stopping = Arc::new(std::sync::Barrier::new(2));

        let (log, barrier) = (events.clone(), stopping.clone());
        let store = Readable::new(0, move |_set| {
            let first_run = {
                let mut log = log.lock();
                log.push("start");
                log.len() == 1
            };
            let (log, barrier) = (log.clone(), barrier.clone());
            Subscription::new(move || {
                if first_run {
                    barrier.wait();
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
                log.lock().push("stop");
            })
        });

        let first = store.subscribe(|_| {});
        let leaving = std::thread::spawn(move || drop(first));

        stopping.wait();
        let _second = store.subscribe(|_| {});
        leaving.join().unwrap();

        assert_eq!(*events.lock(), vec!["start", "stop", "start"]);
        assert_eq!(store.listener_count(), 1);
    }

    #[test]
    fn test_value_set_during_start_is_delivered_once() {
        let store = Readable::new(0, |set| {
            set.set(42);
            Subscription::empty()
        });
        let (seen, listener) = recorder::<i32>();

        let _sub = store.subscribe(listener);

        assert_eq!(*seen.lock(), vec![42]);
    }

    #[test]
    fn test_set_if_skips_write_when_guard_fails() {
        let setter_slot: Arc<Mutex<Option<Setter<i32>>>> = Arc::new(Mutex::new(None));
        let slot = setter_slot.clone();
        let store = Readable::new(0, move |set| {
            *slot.lock() = Some(set);
            Subscription::empty()
        });
        let (seen, listener) = recorder::<i32>();
        let _sub = store.subscribe(listener);

        let setter = setter_slot.lock().clone().unwrap();
        assert!(!setter.set_if(7, |_| false));
        assert!(setter.set_if(8, |current| *current == 0));
        assert!(!setter.set_if(9, |current| *current == 0));

        assert_eq!(*seen.lock(), vec![0, 8]);
        assert_eq!(store.get(), 8);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself_reentrantly() {
        let store = Writable::new(0);
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let inner_slot = slot.clone();
        let sub = store.subscribe(move |value| {
            if *value == 1 {
                inner_slot.lock().take();
            }
        });
        *slot.lock() = Some(sub);

        store.set(1);

        assert_eq!(store.readable().listener_count(), 0);
    }
}
