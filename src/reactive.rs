//! Observable container for structured state.
//!
//! [`Reactive`] wraps a JSON object or array and notifies subscribers after
//! every mutation. It is the explicit replacement for transparent mutation
//! interception: callers read and write through `get` / `set` / `delete`.
//!
//! # Invariants
//!
//! 1. Subscribers are notified after the mutation is applied and the
//!    internal lock released, so a subscriber reading the cell observes
//!    the new value.
//! 2. Subscribers run in subscription order, with zero arguments.
//! 3. No batching: every mutating call notifies exactly once, even when
//!    the written value equals the old one.
//! 4. [`Subscription::unsubscribe`] removes exactly that callback.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;

type SubscriberFn = dyn Fn() + Send + Sync;

struct Cell {
    value: Value,
    subscribers: Vec<(u64, Arc<SubscriberFn>)>,
    next_id: u64,
}

/// Shared, observable JSON value.
///
/// Cloning a `Reactive` creates another handle to the **same** cell.
#[derive(Clone)]
pub struct Reactive {
    inner: Arc<Mutex<Cell>>,
}

impl std::fmt::Debug for Reactive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cell = self.lock();
        f.debug_struct("Reactive")
            .field("value", &cell.value)
            .field("subscribers", &cell.subscribers.len())
            .finish()
    }
}

/// Handle returned by [`Reactive::subscribe`].
///
/// Dropping the handle leaves the subscription in place; call
/// [`Subscription::unsubscribe`] to detach.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    cell: Weak<Mutex<Cell>>,
}

impl Subscription {
    /// Detach the callback this handle was created for.
    ///
    /// No-op if the cell no longer exists.
    pub fn unsubscribe(self) {
        if let Some(cell) = self.cell.upgrade() {
            let mut cell = cell.lock().unwrap_or_else(PoisonError::into_inner);
            cell.subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Weak handle that does not keep the cell alive.
#[derive(Debug, Clone)]
pub struct WeakReactive {
    inner: Weak<Mutex<Cell>>,
}

impl WeakReactive {
    /// Recover a strong handle if the cell is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Reactive> {
        self.inner.upgrade().map(|inner| Reactive { inner })
    }
}

impl Reactive {
    /// Wrap a structured value.
    ///
    /// Scalars are accepted but have no keys to mutate; `set` on them is
    /// ignored with a warning.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Cell {
                value,
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cell> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-owning handle, for subscribers that must not keep the cell alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakReactive {
        WeakReactive {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Clone of the value stored under `key`.
    ///
    /// Array cells take decimal indices as keys.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let cell = self.lock();
        match &cell.value {
            Value::Object(map) => map.get(key).cloned(),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)).cloned(),
            _ => None,
        }
    }

    /// Clone of the whole value.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.lock().value.clone()
    }

    /// Run `f` against the current value without cloning it.
    ///
    /// The cell is locked while `f` runs; `f` must not access this cell.
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.lock().value)
    }

    /// Number of elements (arrays) or entries (objects).
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.lock().value {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            _ => 0,
        }
    }

    /// Whether the cell holds no elements or entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `value` under `key`, then notify.
    ///
    /// Writing an array index past the end pads with `null`.
    pub fn set(&self, key: &str, value: Value) {
        let applied = {
            let mut cell = self.lock();
            match &mut cell.value {
                Value::Object(map) => {
                    map.insert(key.to_string(), value);
                    true
                }
                Value::Array(items) => match key.parse::<usize>() {
                    Ok(index) => {
                        if index >= items.len() {
                            items.resize(index + 1, Value::Null);
                        }
                        items[index] = value;
                        true
                    }
                    Err(_) => false,
                },
                _ => false,
            }
        };
        if applied {
            self.notify();
        } else {
            log::warn!("[Companion] Reactive::set: key '{}' is not writable", key);
        }
    }

    /// Remove `key`, then notify.
    ///
    /// Deleting an array index leaves a `null` hole, so indices of later
    /// elements do not shift. Returns the removed value.
    pub fn delete(&self, key: &str) -> Option<Value> {
        let removed = {
            let mut cell = self.lock();
            match &mut cell.value {
                Value::Object(map) => map.shift_remove(key),
                Value::Array(items) => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .map(Value::take),
                _ => None,
            }
        };
        self.notify();
        removed
    }

    /// Append to an array cell, then notify.
    pub fn push(&self, value: Value) {
        let applied = {
            let mut cell = self.lock();
            if let Value::Array(items) = &mut cell.value {
                items.push(value);
                true
            } else {
                false
            }
        };
        if applied {
            self.notify();
        } else {
            log::warn!("[Companion] Reactive::push on a non-array value");
        }
    }

    /// Apply a compound mutation, then notify once.
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let result = {
            let mut cell = self.lock();
            f(&mut cell.value)
        };
        self.notify();
        result
    }

    /// Attach a zero-argument change callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut cell = self.lock();
        let id = cell.next_id;
        cell.next_id += 1;
        cell.subscribers.push((id, Arc::new(callback)));
        Subscription {
            id,
            cell: Arc::downgrade(&self.inner),
        }
    }

    /// Number of attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn notify(&self) {
        let subscribers: Vec<Arc<SubscriberFn>> = self
            .lock()
            .subscribers
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in subscribers {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                log::warn!("[Companion] Reactive subscriber panicked");
            }
        }
    }
}

impl From<Value> for Reactive {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
