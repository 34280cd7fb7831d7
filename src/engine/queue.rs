//! The deferred condition queue: units of work that run on the frame thread
//! once per simulation tick, but only after their readiness predicate holds.
//! Enqueueing is safe from any thread (the network delivery thread in
//! practice); draining happens from exactly one place, the owning resource's
//! tick.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::engine::resources::ResourceHandle;

/// One deferred unit: an action plus an optional readiness predicate. The
/// closures own everything they need (payload snapshot, cursor offsets,
/// service handles); nothing in a unit borrows shared mutable state.
pub struct DeferredUnit {
    action: Box<dyn FnOnce() + Send>,
    condition: Option<Box<dyn Fn() -> bool + Send>>,
}

impl DeferredUnit {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Box::new(action),
            condition: None,
        }
    }

    pub fn with_condition(
        action: impl FnOnce() + Send + 'static,
        condition: impl Fn() -> bool + Send + 'static,
    ) -> Self {
        Self {
            action: Box::new(action),
            condition: Some(Box::new(condition)),
        }
    }
}

/// Marks the resource active for the duration of a unit's execution, and
/// guarantees deactivation on every exit path, panics included.
struct ActivationScope<'a> {
    resource: &'a dyn ResourceHandle,
}

impl<'a> ActivationScope<'a> {
    fn enter(resource: &'a dyn ResourceHandle) -> Self {
        resource.activate();
        Self { resource }
    }
}

impl Drop for ActivationScope<'_> {
    fn drop(&mut self) {
        self.resource.deactivate();
    }
}

/// Multi-producer, single-consumer work queue drained once per frame.
pub struct TickQueue {
    tx: mpsc::UnboundedSender<DeferredUnit>,
    rx: Mutex<mpsc::UnboundedReceiver<DeferredUnit>>,
    pending: AtomicUsize,
}

impl Default for TickQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TickQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            pending: AtomicUsize::new(0),
        }
    }

    /// Callable from any thread.
    pub fn enqueue(&self, unit: DeferredUnit) {
        self.pending.fetch_add(1, Ordering::Relaxed);
        // The receiver lives as long as the queue, so this cannot fail.
        let _ = self.tx.send(unit);
    }

    /// Units queued but not yet executed (deferred units count).
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the queue once, on the frame thread. Takes a fixed snapshot of
    /// everything queued right now: units enqueued by side effects of this
    /// drain wait for the next frame. Units whose condition is false go to a
    /// side buffer and are re-enqueued afterwards in their original relative
    /// order. Returns how many actions ran.
    pub fn drain(&self, resource: &dyn ResourceHandle) -> usize {
        let mut snapshot = Vec::new();
        {
            let mut rx = self.rx.lock().unwrap();
            while let Ok(unit) = rx.try_recv() {
                snapshot.push(unit);
            }
        }

        let mut deferred = Vec::new();
        let mut executed = 0;

        for unit in snapshot {
            let _scope = ActivationScope::enter(resource);

            if let Some(condition) = &unit.condition {
                if !condition() {
                    deferred.push(unit);
                    continue;
                }
            }

            (unit.action)();
            executed += 1;
            self.pending.fetch_sub(1, Ordering::Relaxed);
        }

        for unit in deferred {
            let _ = self.tx.send(unit);
        }

        executed
    }
}
