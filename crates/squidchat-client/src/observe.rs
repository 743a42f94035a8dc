use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

/// Lifecycle of an aggregator's view state.
///
/// `Error` keeps whatever data was already loaded; a later successful
/// refresh returns the view to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Uninitialized,
    Loading,
    Ready,
    Error,
}

type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Snapshot holder with explicit observer registration.
///
/// Listeners are invoked on every published transition; async consumers can
/// follow the same snapshots through `watch()`.
#[derive(Clone)]
pub struct Observable<S> {
    inner: Arc<ObservableInner<S>>,
}

struct ObservableInner<S> {
    listeners: Mutex<Vec<(Uuid, Listener<S>)>>,
    watch_tx: watch::Sender<S>,
}

impl<S: Clone + Send + Sync + 'static> Observable<S> {
    pub fn new(initial: S) -> Self {
        let (watch_tx, _) = watch::channel(initial);
        Observable {
            inner: Arc::new(ObservableInner {
                listeners: Mutex::new(Vec::new()),
                watch_tx,
            }),
        }
    }

    /// Register a listener. It stays registered until the returned guard is
    /// dropped.
    pub fn subscribe(&self, listener: impl Fn(&S) + Send + Sync + 'static) -> ObserverGuard {
        let id = Uuid::new_v4();
        self.inner
            .listeners
            .lock()
            .expect("listener lock poisoned")
            .push((id, Arc::new(listener)));

        let inner = Arc::downgrade(&self.inner);
        ObserverGuard {
            remove: Some(Box::new(move || {
                if let Some(inner) = inner.upgrade() {
                    inner
                        .listeners
                        .lock()
                        .expect("listener lock poisoned")
                        .retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Receiver mirroring every published snapshot.
    pub fn watch(&self) -> watch::Receiver<S> {
        self.inner.watch_tx.subscribe()
    }

    /// Current snapshot.
    pub fn get(&self) -> S {
        self.inner.watch_tx.borrow().clone()
    }

    /// Publish the next snapshot: updates the watch mirror, then notifies
    /// listeners in registration order.
    pub fn publish(&self, next: S) {
        // Listeners run outside the lock so they may drop their own guards.
        let listeners: Vec<Listener<S>> = self
            .inner
            .listeners
            .lock()
            .expect("listener lock poisoned")
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        self.inner.watch_tx.send_replace(next.clone());

        for listener in listeners {
            listener(&next);
        }
    }
}

/// Keeps one listener registered; dropping it unsubscribes.
pub struct ObserverGuard {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}
