//! Replay-last broadcast: a listener registry with a last-value cache.
//!
//! Every store that several views observe is built on this. Subscribing
//! replays the current value immediately, so a view that mounts after the
//! data was loaded sees correct state without a refetch. Publishing from
//! inside a notification is queued and delivered after the current round
//! completes, which keeps listener-triggered mutations from recursing.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, Weak};

use tracing::trace;

type Listener<T> = Box<dyn FnMut(&T) + Send>;

struct Entry<T> {
    id: u64,
    listener: Listener<T>,
}

struct Inner<T> {
    current: T,
    listeners: Vec<Entry<T>>,
    queue: VecDeque<T>,
    removed: BTreeSet<u64>,
    next_id: u64,
    notifying: bool,
}

/// A broadcast cell holding one value.
///
/// Cheap to clone; all clones share the same listeners and value.
/// Notifications are delivered in the order values were published, and a
/// subscriber always observes a value at least as recent as its last
/// synchronous read.
pub struct Broadcast<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Handle returned by [`Broadcast::subscribe`].
///
/// Dropping the handle leaves the listener attached; call
/// [`Subscription::unsubscribe`] to detach it.
pub struct Subscription<T> {
    id: u64,
    inner: Weak<Mutex<Inner<T>>>,
}

impl<T> Subscription<T> {
    /// Detach the listener. Effective immediately, even when called from
    /// inside a notification round.
    pub fn unsubscribe(self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut inner = inner.lock().unwrap();
        if inner.notifying {
            // The listener vector is on loan to the running round; mark
            // the id and let the round drop it.
            inner.removed.insert(self.id);
        } else {
            inner.listeners.retain(|entry| entry.id != self.id);
        }
    }
}

impl<T: Clone + Send + 'static> Broadcast<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                current: initial,
                listeners: Vec::new(),
                queue: VecDeque::new(),
                removed: BTreeSet::new(),
                next_id: 0,
                notifying: false,
            })),
        }
    }

    /// Synchronous snapshot of the current value.
    pub fn get(&self) -> T {
        self.inner.lock().unwrap().current.clone()
    }

    /// Register a listener. It is called with the current value before
    /// this returns (replay-last), then with every subsequent publish.
    pub fn subscribe(&self, listener: impl FnMut(&T) + Send + 'static) -> Subscription<T> {
        let mut listener: Listener<T> = Box::new(listener);
        let (id, current) = {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_id;
            inner.next_id += 1;
            (id, inner.current.clone())
        };
        // Replay outside the lock so the listener may read or mutate
        // freely.
        listener(&current);
        self.inner.lock().unwrap().listeners.push(Entry { id, listener });
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Publish a new value and notify every listener.
    ///
    /// A publish issued from inside a listener is queued and delivered
    /// after the current notification round, preserving publish order.
    pub fn publish(&self, value: T) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.push_back(value);
        if inner.notifying {
            trace!("publish during notification round; queued");
            return;
        }
        inner.notifying = true;

        while let Some(next) = inner.queue.pop_front() {
            inner.current = next.clone();
            // Take the listeners out so they can be called without the
            // lock; re-entrant subscribe/publish/unsubscribe calls then
            // operate on the (empty) registry and are merged below.
            let mut active = std::mem::take(&mut inner.listeners);
            drop(inner);

            for entry in &mut active {
                let skip = self.inner.lock().unwrap().removed.contains(&entry.id);
                if !skip {
                    (entry.listener)(&next);
                }
            }

            inner = self.inner.lock().unwrap();
            let added = std::mem::replace(&mut inner.listeners, active);
            inner.listeners.extend(added);
            if !inner.removed.is_empty() {
                let removed = std::mem::take(&mut inner.removed);
                inner.listeners.retain(|entry| !removed.contains(&entry.id));
            }
        }
        inner.notifying = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collected() -> (Arc<Mutex<Vec<i32>>>, impl FnMut(&i32) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: &i32| sink.lock().unwrap().push(*value))
    }

    #[test]
    fn subscriber_replays_current_value() {
        let cell = Broadcast::new(7);
        let (seen, listener) = collected();
        let _sub = cell.subscribe(listener);
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn late_subscriber_sees_latest_value() {
        let cell = Broadcast::new(0);
        cell.publish(1);
        cell.publish(2);
        let (seen, listener) = collected();
        let _sub = cell.subscribe(listener);
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn values_delivered_in_publish_order() {
        let cell = Broadcast::new(0);
        let (seen, listener) = collected();
        let _sub = cell.subscribe(listener);
        cell.publish(1);
        cell.publish(2);
        cell.publish(3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn reentrant_publish_is_queued_not_recursive() {
        let cell = Broadcast::new(0);
        let (seen, mut record) = collected();
        let handle = cell.clone();
        let _sub = cell.subscribe(move |value: &i32| {
            record(value);
            if *value == 1 {
                // Triggered mid-notification; must arrive after this round.
                handle.publish(2);
            }
        });
        cell.publish(1);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let cell = Broadcast::new(0);
        let (seen, listener) = collected();
        let sub = cell.subscribe(listener);
        cell.publish(1);
        sub.unsubscribe();
        cell.publish(2);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn unsubscribe_from_inside_a_round_is_immediate() {
        let cell = Broadcast::new(0);
        let slot: Arc<Mutex<Option<Subscription<i32>>>> = Arc::new(Mutex::new(None));

        let (first_seen, mut record_first) = collected();
        let unsub_slot = Arc::clone(&slot);
        let _a = cell.subscribe(move |value: &i32| {
            record_first(value);
            if *value == 1 {
                if let Some(sub) = unsub_slot.lock().unwrap().take() {
                    sub.unsubscribe();
                }
            }
        });

        let (second_seen, record_second) = collected();
        let b = cell.subscribe(record_second);
        *slot.lock().unwrap() = Some(b);

        cell.publish(1);
        cell.publish(2);
        // The first listener removed the second during delivery of 1, so
        // the second never saw 1 or 2.
        assert_eq!(*first_seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(*second_seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn subscribe_from_inside_a_round_joins_next_round() {
        let cell = Broadcast::new(0);
        let late_seen: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
        let late_sink = Arc::clone(&late_seen);
        let handle = cell.clone();
        let subscribed = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&subscribed);
        let _a = cell.subscribe(move |value: &i32| {
            let mut done = flag.lock().unwrap();
            if *value == 1 && !*done {
                *done = true;
                let sink = Arc::clone(&late_sink);
                let _sub = handle.subscribe(move |v: &i32| sink.lock().unwrap().push(*v));
            }
        });
        cell.publish(1);
        cell.publish(2);
        // The late listener replayed 1 at subscribe time, then saw 2.
        assert_eq!(*late_seen.lock().unwrap(), vec![1, 2]);
    }
}
