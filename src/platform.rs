//! Host connectivity facility.
//!
//! [`ConnectivitySource`] is the seam between the monitor and whatever knows
//! whether the host is online. [`Connectivity`] is the in-process
//! implementation; its flag is driven by [`HttpProbe`](crate::HttpProbe) or
//! set directly by the embedding application.

use std::{
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

/// Connectivity transition reported by a [`ConnectivitySource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

impl ConnectivityEvent {
    pub fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }

    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Handle identifying a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Callback invoked synchronously for each connectivity event.
pub type Listener = Arc<dyn Fn(ConnectivityEvent) + Send + Sync>;

/// Platform connectivity flag plus online/offline event registration.
pub trait ConnectivitySource: Send + Sync {
    /// Current connectivity flag. Never cached by callers.
    fn is_online(&self) -> bool;

    fn add_listener(&self, listener: Listener) -> ListenerId;

    /// Returns `false` if the listener was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;

    fn listener_count(&self) -> usize;
}

/// In-process connectivity state with an ordered listener registry.
pub struct Connectivity {
    online: AtomicBool,
    listeners: Mutex<BTreeMap<ListenerId, Listener>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connectivity")
            .field("online", &self.is_online())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            listeners: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Updates the flag and notifies listeners if it changed.
    ///
    /// Returns `true` when a transition was emitted.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }
        self.emit(ConnectivityEvent::from_online(online));
        true
    }

    fn emit(&self, event: ConnectivityEvent) {
        // Listeners may add or remove listeners while being called.
        let snapshot: Vec<(ListenerId, Listener)> = self
            .registry()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();
        for (_id, listener) in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            if let Err(payload) = outcome {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    listener = _id.0,
                    ?event,
                    panic = panic_message(payload.as_ref()),
                    "connectivity listener panicked"
                );
                #[cfg(not(feature = "tracing"))]
                drop(payload);
            }
        }
    }

    fn registry(&self) -> MutexGuard<'_, BTreeMap<ListenerId, Listener>> {
        // Listeners never run under the lock; a poisoned map is still whole.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConnectivitySource for Connectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn add_listener(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry().insert(id, listener);
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.registry().remove(&id).is_some()
    }

    fn listener_count(&self) -> usize {
        self.registry().len()
    }
}

#[cfg(feature = "tracing")]
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{Connectivity, ConnectivityEvent, ConnectivitySource};

    #[test]
    fn set_online_emits_only_on_transition() {
        let connectivity = Connectivity::new(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        connectivity.add_listener(Arc::new(move |event: ConnectivityEvent| {
            sink.lock().unwrap().push(event)
        }));

        assert!(!connectivity.set_online(true));
        assert!(connectivity.set_online(false));
        assert!(!connectivity.set_online(false));
        assert!(connectivity.set_online(true));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ConnectivityEvent::Offline, ConnectivityEvent::Online]
        );
        assert!(connectivity.is_online());
    }

    #[test]
    fn removed_listener_is_not_called() {
        let connectivity = Connectivity::new(false);
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let id = connectivity.add_listener(Arc::new(move |_: ConnectivityEvent| {
            *sink.lock().unwrap() += 1;
        }));

        assert!(connectivity.remove_listener(id));
        assert!(!connectivity.remove_listener(id));
        connectivity.set_online(true);

        assert_eq!(*seen.lock().unwrap(), 0);
        assert_eq!(connectivity.listener_count(), 0);
    }

    #[test]
    fn panicking_listener_does_not_block_later_listeners() {
        let connectivity = Connectivity::new(false);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        connectivity.add_listener(Arc::new(|_: ConnectivityEvent| panic!("listener failed")));
        connectivity.add_listener(Arc::new(move |event: ConnectivityEvent| {
            sink.lock().unwrap().push(event)
        }));

        assert!(connectivity.set_online(true));
        assert!(connectivity.set_online(false));

        assert_eq!(
            *calls.lock().unwrap(),
            vec![ConnectivityEvent::Online, ConnectivityEvent::Offline]
        );
        assert_eq!(connectivity.listener_count(), 2);
    }

    #[test]
    fn listener_may_remove_itself_during_dispatch() {
        let connectivity = Arc::new(Connectivity::new(false));
        let slot = Arc::new(Mutex::new(None));
        let calls = Arc::new(Mutex::new(0usize));

        let source = Arc::clone(&connectivity);
        let own_id = Arc::clone(&slot);
        let counter = Arc::clone(&calls);
        let id = connectivity.add_listener(Arc::new(move |_: ConnectivityEvent| {
            *counter.lock().unwrap() += 1;
            if let Some(id) = own_id.lock().unwrap().take() {
                source.remove_listener(id);
            }
        }));
        *slot.lock().unwrap() = Some(id);

        connectivity.set_online(true);
        connectivity.set_online(false);

        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(connectivity.listener_count(), 0);
    }
}
