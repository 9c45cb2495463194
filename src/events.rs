//! Publish/subscribe event bus.
//!
//! Maps an event name to an ordered list of listeners. Inbound packets are
//! demultiplexed onto this bus by the connection manager; feature modules
//! and application code subscribe with [`EventBus::on`].
//!
//! # Ordering
//!
//! Listeners run in registration order. Registering the same [`Listener`]
//! twice creates two entries; [`EventBus::off`] removes the first one.
//!
//! # Re-entrancy
//!
//! Listeners are collected under the registry lock, then the lock is
//! released before any listener is invoked. Listeners may therefore call
//! `on`, `off` or `emit` on the same bus. A listener removed by an earlier
//! listener of the same dispatch is skipped.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

/// Callback signature for event listeners.
type ListenerFn = dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync;

/// A shared, reference-counted event callback.
///
/// Two `Listener`s are the same listener when they point at the same
/// callback allocation, so a clone of the handle returned by
/// [`EventBus::on`] can later be passed to [`EventBus::off`].
#[derive(Clone)]
pub struct Listener(Arc<ListenerFn>);

impl Listener {
    /// Wrap a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// Whether both handles refer to the same callback.
    #[must_use]
    pub fn same_as(&self, other: &Listener) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    fn call(&self, data: &Value) -> anyhow::Result<()> {
        (self.0)(data)
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Listener")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    /// Event name -> (entry id, listener) in registration order.
    listeners: HashMap<String, Vec<(u64, Listener)>>,
    next_id: u64,
}

/// Thread-safe listener registry with ordered dispatch.
///
/// Cloning an `EventBus` yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        f.debug_struct("EventBus")
            .field("event_count", &registry.listeners.len())
            .field("next_id", &registry.next_id)
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe a callback to `event`.
    ///
    /// Returns the [`Listener`] handle to pass to [`EventBus::off`].
    pub fn on<F>(&self, event: &str, callback: F) -> Listener
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let listener = Listener::new(callback);
        self.add_listener(event, listener.clone());
        listener
    }

    /// Append an existing listener to `event`'s subscriber list.
    pub fn add_listener(&self, event: &str, listener: Listener) {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .listeners
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        log::trace!("[Companion] Registered listener #{} for '{}'", id, event);
    }

    /// Remove the first registration of `listener` for `event`.
    ///
    /// No-op when the listener is not registered.
    pub fn off(&self, event: &str, listener: &Listener) {
        let mut registry = self.lock();
        if let Some(entries) = registry.listeners.get_mut(event) {
            if let Some(idx) = entries.iter().position(|(_, l)| l.same_as(listener)) {
                let (id, _) = entries.remove(idx);
                log::trace!("[Companion] Removed listener #{} from '{}'", id, event);
            }
            if entries.is_empty() {
                registry.listeners.remove(event);
            }
        }
    }

    /// Remove every listener for `event`.
    pub fn clear(&self, event: &str) {
        self.lock().listeners.remove(event);
    }

    /// Invoke every listener for `event` with `data`, in registration order.
    ///
    /// Listener errors and panics are logged and do not stop the dispatch.
    /// Returns the number of listeners that completed successfully.
    pub fn emit(&self, event: &str, data: &Value) -> usize {
        let snapshot: Vec<(u64, Listener)> = {
            let registry = self.lock();
            match registry.listeners.get(event) {
                Some(entries) => entries.clone(),
                None => return 0,
            }
        };
        // Lock released: listeners may re-enter the bus.

        let mut invoked = 0;
        for (id, listener) in snapshot {
            if !self.is_registered(event, id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| listener.call(data))) {
                Ok(Ok(())) => invoked += 1,
                Ok(Err(e)) => {
                    log::warn!("[Companion] Error in listener for {}: {:#}", event, e);
                }
                Err(panic) => {
                    let msg = panic
                        .downcast_ref::<String>()
                        .map(String::as_str)
                        .or_else(|| panic.downcast_ref::<&str>().copied())
                        .unwrap_or("unknown panic");
                    log::warn!("[Companion] Listener for {} panicked: {}", event, msg);
                }
            }
        }
        invoked
    }

    fn is_registered(&self, event: &str, id: u64) -> bool {
        self.lock()
            .listeners
            .get(event)
            .is_some_and(|entries| entries.iter().any(|(entry_id, _)| *entry_id == id))
    }

    /// Whether any listener is registered for `event`.
    #[must_use]
    pub fn has_listeners(&self, event: &str) -> bool {
        self.lock()
            .listeners
            .get(event)
            .is_some_and(|entries| !entries.is_empty())
    }

    /// Total number of registrations across all events.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.values().map(Vec::len).sum()
    }

    /// Names of all events with at least one listener.
    #[must_use]
    pub fn registered_events(&self) -> Vec<String> {
        self.lock()
            .listeners
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Listener that appends `tag` to a shared log.
    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Listener {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        Listener::new(move |_| {
            log.lock().unwrap().push(tag.clone());
            Ok(())
        })
    }

    #[test]
    fn test_emit_without_listeners_returns_zero() {
        let bus = EventBus::new();
        assert_eq!(bus.emit("nothing", &json!({})), 0);
    }

    #[test]
    fn test_listeners_fire_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.add_listener("evt", recorder(&log, "a"));
        bus.add_listener("evt", recorder(&log, "b"));
        bus.add_listener("evt", recorder(&log, "c"));

        assert_eq!(bus.emit("evt", &Value::Null), 3);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_listener_receives_payload() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        bus.on("tts_status", move |data| {
            *seen_clone.lock().unwrap() = Some(data.clone());
            Ok(())
        });

        bus.emit("tts_status", &json!({"state": "speaking"}));
        assert_eq!(*seen.lock().unwrap(), Some(json!({"state": "speaking"})));
    }

    #[test]
    fn test_off_removes_listener() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = recorder(&log, "a");
        let b = recorder(&log, "b");
        bus.add_listener("evt", a.clone());
        bus.add_listener("evt", b);
        bus.off("evt", &a);

        bus.emit("evt", &Value::Null);
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_off_unknown_is_noop() {
        let bus = EventBus::new();
        let stray = Listener::new(|_| Ok(()));
        bus.off("evt", &stray);
        bus.on("evt", |_| Ok(()));
        bus.off("evt", &stray);
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn test_duplicate_registration_fires_twice_and_off_removes_first() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = recorder(&log, "a");
        let b = recorder(&log, "b");
        bus.add_listener("evt", a.clone());
        bus.add_listener("evt", b);
        bus.add_listener("evt", a.clone());

        bus.emit("evt", &Value::Null);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "a"]);

        log.lock().unwrap().clear();
        bus.off("evt", &a);
        bus.emit("evt", &Value::Null);
        assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_interleaved_on_off_respects_net_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = recorder(&log, "a");
        let b = recorder(&log, "b");
        let c = recorder(&log, "c");
        bus.add_listener("evt", a.clone());
        bus.add_listener("evt", b.clone());
        bus.off("evt", &a);
        bus.add_listener("evt", c);
        bus.add_listener("evt", a);
        bus.off("evt", &b);

        bus.emit("evt", &Value::Null);
        assert_eq!(*log.lock().unwrap(), vec!["c", "a"]);
    }

    #[test]
    fn test_error_does_not_stop_dispatch() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on("evt", |_| anyhow::bail!("intentional error"));
        bus.add_listener("evt", recorder(&log, "second"));

        assert_eq!(bus.emit("evt", &Value::Null), 1);
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn test_panic_does_not_stop_dispatch() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on("evt", |_| panic!("intentional panic"));
        bus.add_listener("evt", recorder(&log, "second"));

        assert_eq!(bus.emit("evt", &Value::Null), 1);
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn test_listener_removed_during_dispatch_is_skipped() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let victim = recorder(&log, "victim");

        let bus_clone = bus.clone();
        let victim_clone = victim.clone();
        bus.on("evt", move |_| {
            bus_clone.off("evt", &victim_clone);
            Ok(())
        });
        bus.add_listener("evt", victim);

        assert_eq!(bus.emit("evt", &Value::Null), 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_listener_added_during_dispatch_runs_next_time() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let late = recorder(&log, "late");

        let bus_clone = bus.clone();
        bus.on("evt", move |_| {
            bus_clone.add_listener("evt", late.clone());
            Ok(())
        });

        bus.emit("evt", &Value::Null);
        assert!(log.lock().unwrap().is_empty());

        bus.emit("evt", &Value::Null);
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn test_introspection() {
        let bus = EventBus::new();
        assert!(!bus.has_listeners("a"));

        bus.on("a", |_| Ok(()));
        bus.on("b", |_| Ok(()));
        bus.on("a", |_| Ok(()));

        assert!(bus.has_listeners("a"));
        assert_eq!(bus.listener_count(), 3);
        let mut events = bus.registered_events();
        events.sort();
        assert_eq!(events, vec!["a", "b"]);

        bus.clear("a");
        assert!(!bus.has_listeners("a"));
        assert_eq!(bus.listener_count(), 1);
    }
}
