//! Change notification with a coalescing window.
//!
//! The first notification in a quiet period arms a single timer. Everything
//! arriving before it fires is merged: camera scopes are unioned, the
//! latest snapshot wins and the result stays cached only while every merged
//! notification was cached. When the timer fires one combined notification is
//! handed to the sink and the accumulator starts over.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::trace;

use vptz_core::{CameraScope, StateSnapshot};

/// A state change handed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub snapshot: StateSnapshot,
    /// Derived from in-flight predictions rather than persisted state.
    pub cached: bool,
    pub cameras: CameraScope,
}

/// Receiver of coalesced notifications (e.g. a WebSocket fan-out).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Fans notifications out over a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, notification: Notification) {
        // nobody listening is fine
        let _ = self.tx.send(notification);
    }
}

/// Keeps every notification it receives.
#[derive(Debug, Default)]
pub struct CollectingSink {
    received: Mutex<Vec<Notification>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.received.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.lock().is_empty()
    }

    /// Take and clear everything received so far.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.received.lock())
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, notification: Notification) {
        self.received.lock().push(notification);
    }
}

/// Coalesces notifications within a fixed window.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

struct NotifierInner {
    sink: Arc<dyn NotificationSink>,
    window: Duration,
    pending: Mutex<Option<Notification>>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, window: Duration) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                sink,
                window,
                pending: Mutex::new(None),
            }),
        }
    }

    /// Queue a notification. Must be called inside a Tokio runtime.
    pub fn notify(&self, snapshot: StateSnapshot, cached: bool, cameras: CameraScope) {
        let mut pending = self.inner.pending.lock();
        match pending.as_mut() {
            Some(p) => {
                let scope = std::mem::replace(&mut p.cameras, CameraScope::All);
                p.cameras = scope.union(cameras);
                p.snapshot = snapshot;
                // a confirmation in the window must not be reported as cached
                p.cached = p.cached && cached;
                trace!("notification merged into pending window");
            }
            None => {
                *pending = Some(Notification {
                    snapshot,
                    cached,
                    cameras,
                });
                let inner = self.inner.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(inner.window).await;
                    inner.dispatch();
                });
            }
        }
    }

    /// Dispatch whatever is pending right away.
    pub fn flush(&self) {
        self.inner.dispatch();
    }
}

impl NotifierInner {
    fn dispatch(&self) {
        let pending = self.pending.lock().take();
        if let Some(notification) = pending {
            trace!(cached = notification.cached, "dispatching notification");
            self.sink.notify(notification);
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
