//! Tests for the deferred condition queue: snapshot draining, predicate
//! gating, re-queue ordering, and activation scoping.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ricochet::{DeferredUnit, ResourceHandle, TickQueue};

#[derive(Default)]
struct TestResource {
    activations: AtomicUsize,
    deactivations: AtomicUsize,
}

impl ResourceHandle for TestResource {
    fn name(&self) -> &str {
        "test"
    }

    fn activate(&self) {
        self.activations.fetch_add(1, Ordering::SeqCst);
    }

    fn deactivate(&self) {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_ready_units_execute_in_one_drain_in_order() {
    let queue = TickQueue::new();
    let resource = TestResource::default();
    let ran: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    for i in 0..3 {
        let ran = Arc::clone(&ran);
        queue.enqueue(DeferredUnit::new(move || ran.lock().unwrap().push(i)));
    }

    assert_eq!(queue.len(), 3);
    assert_eq!(queue.drain(&resource), 3);
    assert_eq!(*ran.lock().unwrap(), vec![0, 1, 2]);
    assert!(queue.is_empty());
}

#[test]
fn test_unready_unit_is_requeued_every_frame_until_ready() {
    let queue = TickQueue::new();
    let resource = TestResource::default();
    let ready = Arc::new(AtomicBool::new(false));
    let ran = Arc::new(AtomicUsize::new(0));

    {
        let ready = Arc::clone(&ready);
        let ran = Arc::clone(&ran);
        queue.enqueue(DeferredUnit::with_condition(
            move || {
                ran.fetch_add(1, Ordering::SeqCst);
            },
            move || ready.load(Ordering::SeqCst),
        ));
    }

    // Queue length does not shrink while the predicate is false
    for _ in 0..3 {
        assert_eq!(queue.drain(&resource), 0);
        assert_eq!(queue.len(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    ready.store(true, Ordering::SeqCst);
    assert_eq!(queue.drain(&resource), 1);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert!(queue.is_empty());

    // Executed once, never again
    assert_eq!(queue.drain(&resource), 0);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn test_deferred_units_keep_relative_order() {
    let queue = TickQueue::new();
    let resource = TestResource::default();
    let ready = Arc::new(AtomicBool::new(false));
    let ran: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    for label in ["first", "second"] {
        let ready = Arc::clone(&ready);
        let ran = Arc::clone(&ran);
        queue.enqueue(DeferredUnit::with_condition(
            move || ran.lock().unwrap().push(label),
            move || ready.load(Ordering::SeqCst),
        ));
    }

    queue.drain(&resource);
    queue.drain(&resource);
    ready.store(true, Ordering::SeqCst);
    assert_eq!(queue.drain(&resource), 2);
    assert_eq!(*ran.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn test_units_enqueued_mid_drain_wait_for_next_frame() {
    let queue = Arc::new(TickQueue::new());
    let resource = TestResource::default();
    let inner_ran = Arc::new(AtomicUsize::new(0));

    {
        let queue = Arc::clone(&queue);
        let inner_queue = Arc::clone(&queue);
        let inner_ran = Arc::clone(&inner_ran);
        queue.enqueue(DeferredUnit::new(move || {
            let inner_ran = Arc::clone(&inner_ran);
            inner_queue.enqueue(DeferredUnit::new(move || {
                inner_ran.fetch_add(1, Ordering::SeqCst);
            }));
        }));
    }

    // First drain runs only the outer unit; the one it enqueued is not part
    // of this frame's snapshot.
    assert_eq!(queue.drain(&resource), 1);
    assert_eq!(inner_ran.load(Ordering::SeqCst), 0);
    assert_eq!(queue.len(), 1);

    assert_eq!(queue.drain(&resource), 1);
    assert_eq!(inner_ran.load(Ordering::SeqCst), 1);
}

#[test]
fn test_activation_is_balanced_across_units() {
    let queue = TickQueue::new();
    let resource = TestResource::default();

    queue.enqueue(DeferredUnit::new(|| {}));
    queue.enqueue(DeferredUnit::with_condition(|| {}, || false));
    queue.drain(&resource);

    // Both the executed unit and the deferred one were bracketed
    assert_eq!(resource.activations.load(Ordering::SeqCst), 2);
    assert_eq!(resource.deactivations.load(Ordering::SeqCst), 2);
}

#[test]
fn test_activation_released_when_action_panics() {
    let queue = TickQueue::new();
    let resource = TestResource::default();

    queue.enqueue(DeferredUnit::new(|| panic!("unit blew up")));
    let result = catch_unwind(AssertUnwindSafe(|| queue.drain(&resource)));

    assert!(result.is_err());
    assert_eq!(
        resource.activations.load(Ordering::SeqCst),
        resource.deactivations.load(Ordering::SeqCst)
    );
}
