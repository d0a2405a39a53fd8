//! Audio route notifications
//!
//! The host reports output route changes (headphones unplugged, silent
//! switch, ...). Interested parties hold a [`RouteSubscription`], which
//! stops receiving events when dropped.

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Audio output route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioRoute {
    #[default]
    Speaker,
    Headphones,
    /// Output silenced by the host (e.g. ringer switch)
    Muted,
}

struct RouterInner {
    current: Mutex<AudioRoute>,
    subscribers: Mutex<HashMap<u64, Sender<AudioRoute>>>,
    next_id: AtomicU64,
    muted: Arc<AtomicBool>,
}

/// Broadcasts route changes and drives the audio mute switch
#[derive(Clone)]
pub struct AudioRouter {
    inner: Arc<RouterInner>,
}

impl AudioRouter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RouterInner {
                current: Mutex::new(AudioRoute::default()),
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                muted: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Switch shared with audio rings; set while the route is `Muted`
    pub fn mute_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.inner.muted)
    }

    pub fn current(&self) -> AudioRoute {
        *self.inner.current.lock()
    }

    /// Record a route change and notify subscribers
    pub fn publish(&self, route: AudioRoute) {
        {
            let mut current = self.inner.current.lock();
            if *current == route {
                return;
            }
            *current = route;
        }

        self.inner
            .muted
            .store(route == AudioRoute::Muted, Ordering::Relaxed);
        tracing::info!("Audio route changed to {:?}", route);

        let subscribers = self.inner.subscribers.lock();
        for tx in subscribers.values() {
            // Unbounded; only fails if the receiver is already gone.
            let _ = tx.send(route);
        }
    }

    /// Start receiving route changes
    pub fn subscribe(&self) -> RouteSubscription {
        let (tx, rx) = channel::unbounded();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().insert(id, tx);
        tracing::debug!("Audio route subscriber {} added", id);

        RouteSubscription {
            id,
            rx,
            router: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl Default for AudioRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellable subscription to route changes
pub struct RouteSubscription {
    id: u64,
    rx: Receiver<AudioRoute>,
    router: Weak<RouterInner>,
}

impl RouteSubscription {
    /// Next pending route change, if any
    pub fn try_next(&self) -> Option<AudioRoute> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for a route change
    pub fn next_timeout(&self, timeout: Duration) -> Option<AudioRoute> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Stop receiving events; equivalent to dropping
    pub fn cancel(self) {}
}

impl Drop for RouteSubscription {
    fn drop(&mut self) {
        if let Some(router) = self.router.upgrade() {
            router.subscribers.lock().remove(&self.id);
            tracing::debug!("Audio route subscriber {} removed", self.id);
        }
    }
}
