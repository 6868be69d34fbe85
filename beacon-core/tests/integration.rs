//! Integration Tests for the Notification Engine
//!
//! These tests drive beacons and observables through the public API and the
//! micro-task queue, the way a host event loop would.

mod common;

use std::sync::Arc;

use parking_lot::Mutex;

use beacon_core::runtime::{self, finalizer};
use beacon_core::{Beacon, Broadcaster, Observable};
use common::{capture_reports, take_reports, Watcher};

/// Every live subscriber is called once per cycle, with its own observer.
#[test]
fn every_live_subscriber_called_once_with_itself() {
    let beacon = Beacon::new();
    let watchers: Vec<_> = ["a", "b", "c", "d"].into_iter().map(Watcher::new).collect();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for watcher in &watchers {
        let seen = seen.clone();
        beacon.subscribe(watcher, move |p: &Watcher| {
            p.hit();
            seen.lock().push(p as *const Watcher as usize);
        });
    }
    assert!(beacon.unsubscribe(&watchers[1]));

    beacon.request_notification();
    runtime::drain();

    let expected: Vec<usize> = [&watchers[0], &watchers[2], &watchers[3]]
        .iter()
        .map(|p| Arc::as_ptr(p) as usize)
        .collect();
    assert_eq!(*seen.lock(), expected);
    assert_eq!(watchers[1].hits(), 0);
    for watcher in [&watchers[0], &watchers[2], &watchers[3]] {
        assert_eq!(watcher.hits(), 1, "{} should be hit once", watcher.name);
    }
}

/// An observer unsubscribed before the cycle runs is skipped.
#[test]
fn unsubscribe_before_cycle_skips_observer() {
    let beacon = Beacon::new();
    let watcher = Watcher::new("gone");
    beacon.subscribe(&watcher, |p: &Watcher| p.hit());

    beacon.request_notification();
    beacon.unsubscribe(&watcher);
    runtime::drain();

    assert_eq!(watcher.hits(), 0);
}

/// A dropped observer is excluded from the cycle and removed by it.
#[test]
fn dropped_observer_excluded_and_pruned() {
    let beacon = Beacon::new();
    let keep = Watcher::new("keep");
    let dropped = Watcher::new("dropped");
    beacon.subscribe(&keep, |p: &Watcher| p.hit());
    beacon.subscribe(&dropped, |_: &Watcher| panic!("reclaimed observer invoked"));

    drop(dropped);
    beacon.notify_now();

    assert_eq!(keep.hits(), 1);
    assert_eq!(beacon.subscriber_count(), 1);
}

/// Requests in one synchronous span collapse; separate spans do not.
#[test]
fn requests_coalesce_per_span() {
    let beacon = Beacon::new();
    let watcher = Watcher::new("p");
    beacon.subscribe(&watcher, |p: &Watcher| p.hit());

    for _ in 0..10 {
        beacon.request_notification();
    }
    assert_eq!(runtime::drain(), 1);
    assert_eq!(watcher.hits(), 1);

    beacon.request_notification();
    runtime::drain();
    beacon.request_notification();
    runtime::drain();
    assert_eq!(watcher.hits(), 3);
}

/// Equal writes keep the stored value and schedule nothing; distinct writes
/// coalesce into one cycle that sees the final value.
#[test]
fn observable_write_semantics() {
    let cell = Observable::new(String::from("x"));
    let watcher = Watcher::new("view");
    let seen = Arc::new(Mutex::new(Vec::new()));

    let reader = cell.clone();
    let seen_clone = seen.clone();
    cell.subscribe(&watcher, move |p: &Watcher| {
        p.hit();
        seen_clone.lock().push(reader.get());
    });

    cell.set(String::from("x"));
    assert!(!cell.is_pending());
    assert_eq!(runtime::drain(), 0);

    cell.set(String::from("y"));
    cell.set(String::from("z"));
    cell.set(String::from("w"));
    assert_eq!(runtime::drain(), 1);

    assert_eq!(watcher.hits(), 1);
    assert_eq!(*seen.lock(), vec![String::from("w")]);
}

/// Subscribing from inside a cycle takes effect from the next cycle.
#[test]
fn subscription_during_cycle_starts_next_cycle() {
    let beacon = Beacon::new();
    let first = Watcher::new("first");
    let late = Watcher::new("late");

    let beacon_clone = beacon.clone();
    let late_clone = late.clone();
    beacon.subscribe(&first, move |p: &Watcher| {
        p.hit();
        if p.hits() == 1 {
            beacon_clone.subscribe(&late_clone, |l: &Watcher| l.hit());
        }
    });

    beacon.request_notification();
    runtime::drain();
    assert_eq!((first.hits(), late.hits()), (1, 0));

    beacon.request_notification();
    runtime::drain();
    assert_eq!((first.hits(), late.hits()), (2, 1));
}

/// One failing callback out of three: the other two still run and exactly
/// one failure is reported.
#[test]
fn one_failure_among_three() {
    capture_reports();

    let beacon = Beacon::new();
    let a = Watcher::new("a");
    let b = Watcher::new("b");
    let c = Watcher::new("c");
    beacon.subscribe(&a, |p: &Watcher| p.hit());
    let failing = beacon.subscribe_fallible(&b, |p: &Watcher| -> Result<(), String> {
        p.hit();
        Err(format!("{} could not render", p.name))
    });
    beacon.subscribe(&c, |p: &Watcher| p.hit());

    beacon.request_notification();
    runtime::drain();

    assert_eq!((a.hits(), b.hits(), c.hits()), (1, 1, 1));
    let reports = take_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, "observer callback failed: b could not render");
    assert_eq!(reports[0].1.subscriber, failing);
    assert_eq!(reports[0].1.beacon, beacon.id());
}

/// Panicking callbacks are contained the same way.
#[test]
fn panicking_callback_is_contained() {
    capture_reports();

    let beacon = Beacon::new();
    let a = Watcher::new("a");
    let b = Watcher::new("b");
    beacon.subscribe(&a, |_: &Watcher| panic!("layout overflow"));
    beacon.subscribe(&b, |p: &Watcher| p.hit());

    beacon.notify_now();

    assert_eq!(b.hits(), 1);
    let reports = take_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, "observer callback panicked: layout overflow");
}

/// The walkthrough: subscribe A, write 'x', 'x', 'y' on a cell; one cycle,
/// A called once, and it reads 'y'.
#[test]
fn write_x_x_y_scenario() {
    let cell = Observable::new('a');
    let observer = Watcher::new("A");
    let read_at_call = Arc::new(Mutex::new(None));

    let reader = cell.clone();
    let read_clone = read_at_call.clone();
    cell.subscribe(&observer, move |p: &Watcher| {
        p.hit();
        *read_clone.lock() = Some(reader.get());
    });

    cell.set('x');
    cell.set('x');
    cell.set('y');

    assert_eq!(runtime::drain(), 1);
    assert_eq!(observer.hits(), 1);
    assert_eq!(*read_at_call.lock(), Some('y'));
}

/// An immediate delivery does not absorb a pending deferred one.
#[test]
fn notify_now_with_pending_cycle_delivers_twice() {
    let cell = Observable::new(0_u8);
    let watcher = Watcher::new("p");
    cell.subscribe(&watcher, |p: &Watcher| p.hit());

    cell.set(1);
    cell.notify_now();
    assert_eq!(watcher.hits(), 1);

    runtime::drain();
    assert_eq!(watcher.hits(), 2);
}

/// Dropping the only strong reference ends the subscription without any
/// delivery cycle.
#[test]
fn reclamation_cleans_up_without_delivery() {
    let beacon = Beacon::new();
    let watcher = Watcher::new("transient");
    beacon.subscribe(&watcher, |p: &Watcher| p.hit());
    beacon.subscribe(&watcher, |p: &Watcher| p.hit());

    drop(watcher);
    runtime::drain();

    assert_eq!(beacon.subscriber_count(), 0);
}

/// An observer holding its own guard unsubscribes when it is dropped.
#[test]
fn observer_owned_guard_unsubscribes_on_drop() {
    struct Panel {
        _subscription: Mutex<Option<beacon_core::SubscriptionGuard>>,
    }

    let cell = Observable::new(1);
    let panel = Arc::new(Panel {
        _subscription: Mutex::new(None),
    });
    let guard = cell.subscribe_guarded(&panel, |_: &Panel| {});
    *panel._subscription.lock() = Some(guard);
    assert_eq!(cell.subscriber_count(), 1);

    drop(panel);
    assert_eq!(cell.subscriber_count(), 0);
}

/// A beacon shared across threads keeps one registry; each thread drains
/// its own queue.
#[test]
fn beacon_is_shareable_across_threads() {
    let beacon = Beacon::new();
    let watcher = Watcher::new("shared");
    beacon.subscribe(&watcher, |p: &Watcher| p.hit());

    let remote = beacon.clone();
    std::thread::spawn(move || {
        remote.request_notification();
        runtime::drain();
    })
    .join()
    .unwrap();

    assert_eq!(watcher.hits(), 1);
    assert!(!beacon.is_pending());
}

/// A request whose thread exits before draining does not wedge the beacon.
#[test]
fn request_from_exited_thread_does_not_block_later_cycles() {
    let beacon = Beacon::new();
    let watcher = Watcher::new("shared");
    beacon.subscribe(&watcher, |w: &Watcher| w.hit());

    let remote = beacon.clone();
    std::thread::spawn(move || remote.request_notification())
        .join()
        .unwrap();

    beacon.request_notification();
    runtime::drain();

    assert_eq!(watcher.hits(), 1);
    assert!(!beacon.is_pending());
}

/// Short-lived observables leave no reclamation hooks behind for a
/// long-lived observer.
#[test]
fn dropped_observables_release_their_hooks() {
    const CELLS: usize = 1000;

    let watcher = Watcher::new("long-lived");
    let before = finalizer::pending();

    for i in 0..CELLS {
        let cell = Observable::new(i);
        cell.subscribe(&watcher, |w: &Watcher| w.hit());
        drop(cell);
        runtime::drain();
    }

    // Other tests register hooks concurrently; without cleanup the registry
    // would have grown by one record per cell.
    let after = finalizer::pending();
    assert!(after < before + CELLS / 10, "registry grew from {before} to {after}");
    assert_eq!(watcher.hits(), 0);
}

/// A callback that unsubscribes a later observer and itself mid-cycle:
/// both still run this cycle, neither runs the next one.
#[test]
fn unsubscribe_during_cycle_takes_effect_next_cycle() {
    capture_reports();

    let beacon = Beacon::new();
    let first = Watcher::new("first");
    let second = Watcher::new("second");

    let beacon_clone = beacon.clone();
    let second_clone = second.clone();
    let own_id = Arc::new(Mutex::new(None));
    let own_id_clone = own_id.clone();
    let id = beacon.subscribe(&first, move |w: &Watcher| {
        w.hit();
        beacon_clone.unsubscribe(&second_clone);
        if let Some(id) = *own_id_clone.lock() {
            beacon_clone.unsubscribe_id(id);
        }
    });
    *own_id.lock() = Some(id);
    beacon.subscribe(&second, |w: &Watcher| w.hit());

    beacon.request_notification();
    runtime::drain();
    assert_eq!((first.hits(), second.hits()), (1, 1));
    assert_eq!(beacon.subscriber_count(), 0);

    beacon.request_notification();
    runtime::drain();
    assert_eq!((first.hits(), second.hits()), (1, 1));
    assert!(take_reports().is_empty());
}
