//! Broadcaster (observer) system for webact.
//!
//! A [`Broadcaster<E>`] keeps, for every event kind, an ordered list of
//! listeners. Broadcasting an event calls every listener registered for the
//! event's kind, in registration order, synchronously on the calling thread.
//!
//! # Key Types
//!
//! - [`Event`] - Trait implemented by event enums, exposing the event kind
//! - [`Broadcaster<E>`] - Owns listeners and dispatches events
//! - [`ListenerId`] - Identifier returned when registering a listener
//! - [`ListenerGuard`] - RAII guard that removes its listener when dropped
//!
//! # Dispatch Rules
//!
//! - Listeners for one kind run in the order they were added.
//! - The listener list is snapshotted when a broadcast starts. Listeners added
//!   or removed while a broadcast runs take effect from the next broadcast.
//! - No lock is held while listeners run, so a listener may broadcast again.
//!   The nested broadcast runs to completion before the outer one continues.
//! - A panicking listener is not caught: delivery stops and the panic unwinds
//!   to the caller of [`Broadcaster::broadcast`].
//!
//! # Example
//!
//! ```
//! use webact_core::{Broadcaster, Event};
//!
//! #[derive(Clone, Debug)]
//! enum CounterEvent {
//!     Changed(i32),
//!     Reset,
//! }
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! enum CounterEventKind {
//!     Changed,
//!     Reset,
//! }
//!
//! impl Event for CounterEvent {
//!     type Kind = CounterEventKind;
//!
//!     fn kind(&self) -> CounterEventKind {
//!         match self {
//!             CounterEvent::Changed(_) => CounterEventKind::Changed,
//!             CounterEvent::Reset => CounterEventKind::Reset,
//!         }
//!     }
//! }
//!
//! let events = Broadcaster::<CounterEvent>::new();
//! let id = events.add_listener(CounterEventKind::Changed, |event| {
//!     println!("counter event: {:?}", event);
//! });
//!
//! events.broadcast(CounterEvent::Changed(3));
//! assert!(events.remove_listener(CounterEventKind::Changed, id));
//! assert!(!events.remove_listener(CounterEventKind::Changed, id));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// A unique identifier for a registered listener.
    ///
    /// Use this ID to remove a specific listener via
    /// [`Broadcaster::remove_listener`]. The ID stays valid until the listener
    /// is removed or the broadcaster is dropped.
    pub struct ListenerId;
}

/// An event that can be sent through a [`Broadcaster`].
///
/// The kind plays the role of the event name: listeners subscribe to a kind
/// and receive every event of that kind.
pub trait Event: Send + Sync + 'static {
    /// The discriminant listeners subscribe to.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Returns the kind of this event.
    fn kind(&self) -> Self::Kind;
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Internal storage for a single listener.
struct Registration<E: Event> {
    kind: E::Kind,
    listener: Listener<E>,
}

struct ListenerTable<E: Event> {
    registrations: SlotMap<ListenerId, Registration<E>>,
    /// Per-kind call order.
    order: HashMap<E::Kind, Vec<ListenerId>>,
}

impl<E: Event> ListenerTable<E> {
    fn new() -> Self {
        Self {
            registrations: SlotMap::with_key(),
            order: HashMap::new(),
        }
    }

    fn insert(&mut self, kind: E::Kind, listener: Listener<E>) -> ListenerId {
        let id = self.registrations.insert(Registration { kind, listener });
        self.order.entry(kind).or_default().push(id);
        id
    }

    fn remove(&mut self, kind: E::Kind, id: ListenerId) -> bool {
        match self.registrations.get(id) {
            Some(registration) if registration.kind == kind => {}
            _ => return false,
        }
        self.registrations.remove(id);
        if let Some(ids) = self.order.get_mut(&kind) {
            ids.retain(|&existing| existing != id);
            if ids.is_empty() {
                self.order.remove(&kind);
            }
        }
        true
    }

    fn snapshot(&self, kind: E::Kind) -> Vec<Listener<E>> {
        self.order
            .get(&kind)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.registrations.get(*id))
                    .map(|registration| registration.listener.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Dispatches events of type `E` to registered listeners.
///
/// Types that need to notify observers own a `Broadcaster` and expose it
/// (usually through an `events()` accessor) rather than inheriting from a
/// common base.
///
/// # Thread Safety
///
/// `Broadcaster<E>` is `Send + Sync`; the listener table is guarded by a
/// mutex that is never held while a listener runs.
pub struct Broadcaster<E: Event> {
    table: Mutex<ListenerTable<E>>,
    /// Whether broadcasting is temporarily suppressed.
    blocked: AtomicBool,
}

impl<E: Event> Default for Broadcaster<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> Broadcaster<E> {
    /// Create a broadcaster with no listeners.
    pub fn new() -> Self {
        Self {
            table: Mutex::new(ListenerTable::new()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Register a closure for events of `kind`.
    ///
    /// The same closure logic may be registered several times; each
    /// registration is called once per broadcast.
    pub fn add_listener<F>(&self, kind: E::Kind, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.table.lock().insert(kind, Arc::new(listener))
    }

    /// Register a method of a shared receiver for events of `kind`.
    ///
    /// Only a weak reference to `receiver` is kept, so the registration does
    /// not keep the receiver alive. Once the receiver is dropped the listener
    /// does nothing.
    ///
    /// # Example
    ///
    /// ```ignore
    /// struct Logger;
    ///
    /// impl Logger {
    ///     fn on_changed(&self, event: &CounterEvent) {
    ///         println!("{:?}", event);
    ///     }
    /// }
    ///
    /// let logger = Arc::new(Logger);
    /// events.add_receiver(CounterEventKind::Changed, &logger, Logger::on_changed);
    /// ```
    pub fn add_receiver<R, F>(&self, kind: E::Kind, receiver: &Arc<R>, method: F) -> ListenerId
    where
        R: Send + Sync + 'static,
        F: Fn(&R, &E) + Send + Sync + 'static,
    {
        let receiver: Weak<R> = Arc::downgrade(receiver);
        self.add_listener(kind, move |event| {
            if let Some(receiver) = receiver.upgrade() {
                method(&receiver, event);
            }
        })
    }

    /// Forward events of `kind` to another broadcaster.
    ///
    /// The target is held weakly.
    pub fn relay_to(&self, kind: E::Kind, target: &Arc<Broadcaster<E>>) -> ListenerId {
        let target = Arc::downgrade(target);
        self.add_listener(kind, move |event| {
            if let Some(target) = target.upgrade() {
                target.send_broadcast(event);
            }
        })
    }

    /// Remove the listener `id` registered for `kind`.
    ///
    /// Returns `true` if the listener was found and removed, `false` otherwise.
    pub fn remove_listener(&self, kind: E::Kind, id: ListenerId) -> bool {
        self.table.lock().remove(kind, id)
    }

    /// Check whether `id` is registered for `kind`.
    pub fn has_listener(&self, kind: E::Kind, id: ListenerId) -> bool {
        self.table
            .lock()
            .registrations
            .get(id)
            .is_some_and(|registration| registration.kind == kind)
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.table.lock().order.get(&kind).map_or(0, Vec::len)
    }

    /// Number of listeners across all kinds.
    pub fn total_listeners(&self) -> usize {
        self.table.lock().registrations.len()
    }

    /// Remove every listener.
    pub fn remove_all(&self) {
        let mut table = self.table.lock();
        table.registrations.clear();
        table.order.clear();
    }

    /// Block broadcasting temporarily.
    ///
    /// While blocked, broadcasts are dropped. Useful during batch updates to
    /// prevent cascading notifications.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if broadcasting is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Broadcast `event` to every listener registered for its kind.
    ///
    /// Returns the number of listeners that were called.
    pub fn broadcast(&self, event: E) -> usize {
        self.send_broadcast(&event)
    }

    /// Broadcast a borrowed event.
    ///
    /// This is the entry point used when forwarding an event that is owned
    /// elsewhere, such as relays and tree propagation.
    #[tracing::instrument(skip_all, target = "webact_core::broadcast", level = "trace")]
    pub fn send_broadcast(&self, event: &E) -> usize {
        if self.is_blocked() {
            tracing::trace!(target: "webact_core::broadcast", "broadcaster blocked, dropping event");
            return 0;
        }

        let kind = event.kind();
        let listeners = self.table.lock().snapshot(kind);
        tracing::trace!(
            target: "webact_core::broadcast",
            ?kind,
            listener_count = listeners.len(),
            "broadcasting event"
        );

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    /// Register a listener that is removed when the returned guard drops.
    ///
    /// # Example
    ///
    /// ```ignore
    /// {
    ///     let _guard = events.listen_scoped(CounterEventKind::Reset, |_| println!("reset"));
    ///     events.broadcast(CounterEvent::Reset); // prints
    /// }
    /// events.broadcast(CounterEvent::Reset); // nothing
    /// ```
    pub fn listen_scoped<F>(&self, kind: E::Kind, listener: F) -> ListenerGuard<'_, E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.add_listener(kind, listener);
        ListenerGuard {
            broadcaster: self,
            kind,
            id,
        }
    }
}

impl<E: Event> fmt::Debug for Broadcaster<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("listeners", &self.total_listeners())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

/// A listener registration that is removed when dropped.
///
/// Created via [`Broadcaster::listen_scoped`].
pub struct ListenerGuard<'a, E: Event> {
    broadcaster: &'a Broadcaster<E>,
    kind: E::Kind,
    id: ListenerId,
}

impl<E: Event> ListenerGuard<'_, E> {
    /// The id of the guarded listener.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl<E: Event> Drop for ListenerGuard<'_, E> {
    fn drop(&mut self) {
        self.broadcaster.remove_listener(self.kind, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[derive(Clone, Debug, PartialEq)]
    enum TestEvent {
        Ping(i32),
        Pong(&'static str),
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    enum TestKind {
        Ping,
        Pong,
    }

    impl Event for TestEvent {
        type Kind = TestKind;

        fn kind(&self) -> TestKind {
            match self {
                TestEvent::Ping(_) => TestKind::Ping,
                TestEvent::Pong(_) => TestKind::Pong,
            }
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Box<dyn Fn(&TestEvent) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |label: &'static str| {
            let log = log_clone.clone();
            Box::new(move |event: &TestEvent| {
                log.lock().push(format!("{label}:{event:?}"));
            }) as Box<dyn Fn(&TestEvent) + Send + Sync>
        };
        (log, make)
    }

    #[test]
    fn test_broadcast_in_registration_order() {
        let events = Broadcaster::<TestEvent>::new();
        let (log, make) = recorder();

        events.add_listener(TestKind::Ping, make("first"));
        events.add_listener(TestKind::Ping, make("second"));
        events.add_listener(TestKind::Pong, make("other"));

        assert_eq!(events.broadcast(TestEvent::Ping(1)), 2);
        assert_eq!(*log.lock(), vec!["first:Ping(1)", "second:Ping(1)"]);
    }

    #[test]
    fn test_remove_listener() {
        let events = Broadcaster::<TestEvent>::new();
        let (log, make) = recorder();

        let id = events.add_listener(TestKind::Ping, make("a"));
        assert!(events.has_listener(TestKind::Ping, id));
        assert!(!events.has_listener(TestKind::Pong, id));

        // Wrong kind fails silently
        assert!(!events.remove_listener(TestKind::Pong, id));
        assert!(events.remove_listener(TestKind::Ping, id));
        assert!(!events.remove_listener(TestKind::Ping, id));

        events.broadcast(TestEvent::Ping(1));
        assert!(log.lock().is_empty());
        assert_eq!(events.listener_count(TestKind::Ping), 0);
    }

    #[test]
    fn test_duplicate_registrations_are_called_twice() {
        let events = Broadcaster::<TestEvent>::new();
        let count = Arc::new(Mutex::new(0));

        for _ in 0..2 {
            let count = count.clone();
            events.add_listener(TestKind::Ping, move |_| *count.lock() += 1);
        }
        events.broadcast(TestEvent::Ping(0));
        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn test_blocked() {
        let events = Broadcaster::<TestEvent>::new();
        let (log, make) = recorder();
        events.add_listener(TestKind::Ping, make("a"));

        events.set_blocked(true);
        assert_eq!(events.broadcast(TestEvent::Ping(1)), 0);
        events.set_blocked(false);
        events.broadcast(TestEvent::Ping(2));

        assert_eq!(*log.lock(), vec!["a:Ping(2)"]);
    }

    #[test]
    fn test_receiver_dispatch() {
        struct Counter {
            pings: Mutex<Vec<i32>>,
        }

        impl Counter {
            fn on_ping(&self, event: &TestEvent) {
                if let TestEvent::Ping(value) = event {
                    self.pings.lock().push(*value);
                }
            }
        }

        let events = Broadcaster::<TestEvent>::new();
        let counter = Arc::new(Counter {
            pings: Mutex::new(Vec::new()),
        });
        events.add_receiver(TestKind::Ping, &counter, Counter::on_ping);

        events.broadcast(TestEvent::Ping(7));
        assert_eq!(*counter.pings.lock(), vec![7]);

        // Registration does not keep the receiver alive
        let weak = Arc::downgrade(&counter);
        drop(counter);
        assert!(weak.upgrade().is_none());
        assert_eq!(events.broadcast(TestEvent::Ping(8)), 1);
    }

    #[test]
    fn test_relay_to() {
        let inner = Broadcaster::<TestEvent>::new();
        let outer = Arc::new(Broadcaster::<TestEvent>::new());
        let (log, make) = recorder();

        outer.add_listener(TestKind::Pong, make("outer"));
        inner.relay_to(TestKind::Pong, &outer);

        inner.broadcast(TestEvent::Pong("hi"));
        inner.broadcast(TestEvent::Ping(1));
        assert_eq!(*log.lock(), vec!["outer:Pong(\"hi\")"]);
    }

    #[test]
    fn test_listener_added_during_broadcast_waits_for_next_broadcast() {
        let events = Arc::new(Broadcaster::<TestEvent>::new());
        let (log, make) = recorder();
        let make = Arc::new(make);

        let events_clone = events.clone();
        let make_clone = make.clone();
        events.add_listener(TestKind::Ping, move |_| {
            events_clone.add_listener(TestKind::Ping, (*make_clone)("late"));
        });

        assert_eq!(events.broadcast(TestEvent::Ping(1)), 1);
        assert!(log.lock().is_empty());

        assert_eq!(events.broadcast(TestEvent::Ping(2)), 2);
        assert_eq!(*log.lock(), vec!["late:Ping(2)"]);
    }

    #[test]
    fn test_listener_removed_during_broadcast_still_called_once() {
        let events = Arc::new(Broadcaster::<TestEvent>::new());
        let (log, make) = recorder();

        let victim = Arc::new(Mutex::new(None));
        let events_clone = events.clone();
        let victim_clone = victim.clone();
        events.add_listener(TestKind::Ping, move |_| {
            if let Some(id) = victim_clone.lock().take() {
                events_clone.remove_listener(TestKind::Ping, id);
            }
        });
        *victim.lock() = Some(events.add_listener(TestKind::Ping, make("victim")));

        events.broadcast(TestEvent::Ping(1));
        events.broadcast(TestEvent::Ping(2));
        assert_eq!(*log.lock(), vec!["victim:Ping(1)"]);
    }

    #[test]
    fn test_reentrant_broadcast_completes_before_outer_continues() {
        let events = Arc::new(Broadcaster::<TestEvent>::new());
        let (log, make) = recorder();

        let events_clone = events.clone();
        events.add_listener(TestKind::Ping, move |event| {
            if let TestEvent::Ping(1) = event {
                events_clone.broadcast(TestEvent::Pong("nested"));
            }
        });
        events.add_listener(TestKind::Ping, make("after"));
        events.add_listener(TestKind::Pong, make("pong"));

        events.broadcast(TestEvent::Ping(1));
        assert_eq!(
            *log.lock(),
            vec!["pong:Pong(\"nested\")", "after:Ping(1)"]
        );
    }

    #[test]
    fn test_panicking_listener_aborts_delivery() {
        let events = Broadcaster::<TestEvent>::new();
        let (log, make) = recorder();

        events.add_listener(TestKind::Ping, |_| panic!("listener failure"));
        events.add_listener(TestKind::Ping, make("skipped"));

        let result = catch_unwind(AssertUnwindSafe(|| events.broadcast(TestEvent::Ping(1))));
        assert!(result.is_err());
        assert!(log.lock().is_empty());

        // The broadcaster stays usable afterwards
        assert_eq!(events.listener_count(TestKind::Ping), 2);
    }

    #[test]
    fn test_listen_scoped() {
        let events = Broadcaster::<TestEvent>::new();
        let (log, make) = recorder();
        {
            let guard = events.listen_scoped(TestKind::Ping, make("scoped"));
            assert!(events.has_listener(TestKind::Ping, guard.id()));
            events.broadcast(TestEvent::Ping(1));
        }
        events.broadcast(TestEvent::Ping(2));
        assert_eq!(*log.lock(), vec!["scoped:Ping(1)"]);
    }

    #[test]
    fn test_remove_all() {
        let events = Broadcaster::<TestEvent>::new();
        let (_log, make) = recorder();
        events.add_listener(TestKind::Ping, make("a"));
        events.add_listener(TestKind::Pong, make("b"));
        assert_eq!(events.total_listeners(), 2);

        events.remove_all();
        assert_eq!(events.total_listeners(), 0);
        assert_eq!(events.broadcast(TestEvent::Pong("x")), 0);
    }

    #[test]
    fn test_broadcast_from_multiple_threads() {
        let events = Arc::new(Broadcaster::<TestEvent>::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        events.add_listener(TestKind::Ping, move |event| {
            if let TestEvent::Ping(value) = event {
                received_clone.lock().push(*value);
            }
        });

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let events = events.clone();
                std::thread::spawn(move || {
                    events.broadcast(TestEvent::Ping(i));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut values = received.lock().clone();
        values.sort();
        assert_eq!(values, (0..8).collect::<Vec<_>>());
    }
}
