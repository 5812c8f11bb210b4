use std::{
    collections::BTreeMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, Weak,
    },
    time::Duration,
};

use tokio::sync::oneshot;

#[cfg(feature = "tracing")]
use crate::platform::panic_message;
use crate::{
    platform::{ConnectivityEvent, ConnectivitySource, ListenerId},
    NetRetryError, Result,
};

/// Callback receiving `true` when the host comes online, `false` when it drops.
pub type StatusCallback = Arc<dyn Fn(bool) + Send + Sync>;

type SubscriberMap = BTreeMap<u64, StatusCallback>;

/// Observes connectivity transitions of a [`ConnectivitySource`] and fans
/// them out to subscribers.
///
/// Construct one per process and hand clones to whoever needs it; clones
/// share subscribers and listener state. Dropping the last clone detaches
/// from the source.
#[derive(Clone)]
pub struct NetworkMonitor {
    shared: Arc<Shared>,
}

struct Shared {
    source: Arc<dyn ConnectivitySource>,
    subscribers: Mutex<SubscriberMap>,
    next_id: AtomicU64,
    listener: Mutex<Option<ListenerId>>,
}

impl fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("monitoring", &self.is_monitoring())
            .field("subscribers", &self.subscriber_count())
            .field("online", &self.is_online())
            .finish()
    }
}

impl NetworkMonitor {
    pub fn new(source: Arc<dyn ConnectivitySource>) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                subscribers: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(0),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Attaches to the source's online/offline events. No-op when already
    /// monitoring.
    pub fn start(&self) {
        let mut listener = lock(&self.shared.listener);
        if listener.is_some() {
            return;
        }

        let shared = Arc::downgrade(&self.shared);
        let handler = move |event: ConnectivityEvent| {
            if let Some(shared) = shared.upgrade() {
                shared.handle_event(event);
            }
        };
        let id = self.shared.source.add_listener(Arc::new(handler));
        *listener = Some(id);

        #[cfg(feature = "tracing")]
        tracing::info!("network monitor started");
    }

    /// Detaches from the source and drops every subscriber. No-op when not
    /// monitoring.
    pub fn stop(&self) {
        let Some(id) = lock(&self.shared.listener).take() else {
            return;
        };
        self.shared.source.remove_listener(id);
        lock(&self.shared.subscribers).clear();

        #[cfg(feature = "tracing")]
        tracing::info!("network monitor stopped");
    }

    pub fn is_monitoring(&self) -> bool {
        lock(&self.shared.listener).is_some()
    }

    /// Registers a status callback.
    ///
    /// Each call gets its own [`Subscription`]; unsubscribing one leaves the
    /// others in place even when the same closure was registered twice.
    pub fn on_status_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.shared.subscribers).insert(id, Arc::new(callback));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.subscribers).len()
    }

    /// Point-in-time connectivity read from the source.
    pub fn is_online(&self) -> bool {
        self.shared.source.is_online()
    }

    /// Resolves once the source reports online.
    ///
    /// Returns immediately when already online. Fails with
    /// [`NetRetryError::WaitTimeout`] if `timeout` elapses first. The
    /// temporary listener is removed on every exit path, including when the
    /// returned future is dropped.
    pub async fn wait_for_online(&self, timeout: Duration) -> Result<()> {
        let source = self.shared.source.as_ref();
        if source.is_online() {
            return Ok(());
        }

        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let guard = ListenerGuard {
            source,
            id: source.add_listener(Arc::new(move |event: ConnectivityEvent| {
                if event.is_online() {
                    if let Some(tx) = lock(&tx).take() {
                        let _ = tx.send(());
                    }
                }
            })),
        };

        // The flag may have flipped between the first check and registration.
        if source.is_online() {
            drop(guard);
            return Ok(());
        }

        let outcome = tokio::time::timeout(timeout, rx).await;
        drop(guard);

        match outcome {
            Ok(_) => Ok(()),
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                #[cfg(feature = "tracing")]
                tracing::warn!(timeout_ms, "timed out waiting for network connectivity");
                Err(NetRetryError::WaitTimeout { timeout_ms })
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let listener = self
            .listener
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(id) = listener {
            self.source.remove_listener(id);
        }
    }
}

impl Shared {
    fn handle_event(&self, event: ConnectivityEvent) {
        #[cfg(feature = "tracing")]
        match event {
            ConnectivityEvent::Online => tracing::info!("network connected"),
            ConnectivityEvent::Offline => tracing::warn!("network disconnected"),
        }
        self.notify(event.is_online());
    }

    fn notify(&self, online: bool) {
        let snapshot: Vec<(u64, StatusCallback)> = lock(&self.subscribers)
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();

        for (_id, callback) in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(online)));
            if let Err(payload) = outcome {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    subscriber = _id,
                    panic = panic_message(payload.as_ref()),
                    "network status subscriber panicked"
                );
                #[cfg(not(feature = "tracing"))]
                drop(payload);
            }
        }
    }
}

/// Handle returned by [`NetworkMonitor::on_status_change`].
///
/// Dropping the handle does not unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    /// Removes this subscription. Returns `false` if it was already gone
    /// (unsubscribed earlier, or cleared by [`NetworkMonitor::stop`]).
    pub fn unsubscribe(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => lock(&shared.subscribers).remove(&self.id).is_some(),
            None => false,
        }
    }
}

struct ListenerGuard<'a> {
    source: &'a dyn ConnectivitySource,
    id: ListenerId,
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        self.source.remove_listener(self.id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
