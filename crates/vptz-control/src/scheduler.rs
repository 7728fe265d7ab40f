//! Timer primitives: a cancellable tick loop with a guaranteed single
//! finish callback, a per-target animation registry, and a keyed debouncer.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use vptz_core::TimingConfig;

/// How a tick loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Completed,
    Cancelled,
}

/// A fixed number of ticks at a fixed rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickLoop {
    pub interval: Duration,
    pub ticks: usize,
}

impl TickLoop {
    pub fn new(fps: u32, ticks: usize) -> Self {
        Self {
            interval: TimingConfig::tick_interval(fps),
            ticks,
        }
    }

    /// Run the loop on the runtime. The first tick fires immediately.
    ///
    /// When `previous` is given it is cancelled and its finish callback
    /// awaited before the first tick, so finish callbacks of one target
    /// never overlap. `on_finish` runs exactly once, on completion or on
    /// cancellation.
    pub fn spawn<T, F, Fut>(
        self,
        previous: Option<AnimationHandle>,
        on_tick: T,
        on_finish: F,
    ) -> AnimationHandle
    where
        T: FnMut(usize) + Send + 'static,
        F: FnOnce(Finish) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn_after(previous, std::future::ready(()), on_tick, on_finish)
    }

    /// Like [`spawn`](Self::spawn), with `lead_in` run to completion after
    /// the previous loop has finished and before the first tick. The loop
    /// owns its target from the moment it is spawned; a cancel that arrives
    /// during the lead-in skips every tick.
    pub fn spawn_after<L, T, F, Fut>(
        self,
        previous: Option<AnimationHandle>,
        lead_in: L,
        mut on_tick: T,
        on_finish: F,
    ) -> AnimationHandle
    where
        L: Future<Output = ()> + Send + 'static,
        T: FnMut(usize) + Send + 'static,
        F: FnOnce(Finish) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);

        tokio::spawn(async move {
            if let Some(previous) = previous {
                previous.cancel();
                previous.finished().await;
            }
            lead_in.await;

            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut finish = Finish::Completed;
            let mut detached = false;

            'ticks: for i in 0..self.ticks {
                loop {
                    if *cancel_rx.borrow() {
                        finish = Finish::Cancelled;
                        break 'ticks;
                    }
                    tokio::select! {
                        biased;
                        changed = cancel_rx.changed(), if !detached => {
                            // every handle dropped: nobody can cancel any more
                            if changed.is_err() {
                                detached = true;
                            }
                        }
                        _ = interval.tick() => {
                            trace!(tick = i, "animation tick");
                            on_tick(i);
                            break;
                        }
                    }
                }
            }

            debug!(?finish, "animation finished");
            on_finish(finish).await;
            let _ = done_tx.send(true);
        });

        AnimationHandle {
            cancel: Arc::new(cancel_tx),
            done: done_rx,
        }
    }
}

/// Handle to a running tick loop.
#[derive(Debug, Clone)]
pub struct AnimationHandle {
    cancel: Arc<watch::Sender<bool>>,
    done: watch::Receiver<bool>,
}

impl AnimationHandle {
    /// Ask the loop to stop before its next tick.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        *self.done.borrow()
    }

    /// Wait until the finish callback has returned.
    pub async fn finished(&self) {
        let mut done = self.done.clone();
        // an error means the task is gone, which is finished as well
        let _ = done.wait_for(|d| *d).await;
    }
}

/// At most one animation per target.
///
/// Starting a new animation supersedes the one in flight: the old loop is
/// cancelled and its finish callback completes before the new loop ticks.
#[derive(Debug)]
pub struct AnimationRegistry<K: Ord> {
    running: Mutex<BTreeMap<K, AnimationHandle>>,
}

impl<K: Ord + Clone> Default for AnimationRegistry<K> {
    fn default() -> Self {
        Self {
            running: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<K: Ord + Clone> AnimationRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start<T, F, Fut>(&self, key: K, tick: TickLoop, on_tick: T, on_finish: F) -> AnimationHandle
    where
        T: FnMut(usize) + Send + 'static,
        F: FnOnce(Finish) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.start_after(key, tick, std::future::ready(()), on_tick, on_finish)
    }

    /// Start an animation whose ticks follow `lead_in`. See [`TickLoop::spawn_after`].
    pub fn start_after<L, T, F, Fut>(
        &self,
        key: K,
        tick: TickLoop,
        lead_in: L,
        on_tick: T,
        on_finish: F,
    ) -> AnimationHandle
    where
        L: Future<Output = ()> + Send + 'static,
        T: FnMut(usize) + Send + 'static,
        F: FnOnce(Finish) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock();
        running.retain(|_, h| !h.is_finished());
        let previous = running.remove(&key);
        let handle = tick.spawn_after(previous, lead_in, on_tick, on_finish);
        running.insert(key, handle.clone());
        handle
    }

    /// Whether an animation for `key` has not finished yet.
    pub fn in_flight(&self, key: &K) -> bool {
        self.running
            .lock()
            .get(key)
            .is_some_and(|h| !h.is_finished())
    }

    /// Cancel the animation for `key` (if any) and wait for its finish callback.
    pub async fn settle(&self, key: &K) {
        let handle = self.running.lock().get(key).cloned();
        if let Some(handle) = handle {
            handle.cancel();
            handle.finished().await;
        }
    }

    /// Cancel every animation without waiting.
    pub fn cancel_all(&self) {
        for handle in self.running.lock().values() {
            handle.cancel();
        }
    }
}

/// Runs only the last of a burst of scheduled actions per key.
#[derive(Debug)]
pub struct Debouncer<K: Ord> {
    delay: Duration,
    generations: Arc<Mutex<BTreeMap<K, u64>>>,
}

impl<K> Debouncer<K>
where
    K: Ord + Clone + Send + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generations: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Schedule `action` after the delay, replacing anything still pending
    /// for the same key.
    pub fn schedule<Fut>(&self, key: K, action: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = {
            let mut generations = self.generations.lock();
            let g = generations.entry(key.clone()).or_insert(0);
            *g += 1;
            *g
        };
        let generations = self.generations.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let current = generations.lock().get(&key).copied();
            if current == Some(generation) {
                action.await;
            }
        });
    }
}

// ── Tests ───────────────────────────────────────────────────────
