use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use beacon_core::{report, CallbackError, ReportContext};

thread_local! {
    static CAPTURED: RefCell<Vec<(String, ReportContext)>> = RefCell::new(Vec::new());
}

static INSTALL: Once = Once::new();

/// Install a reporter that records failures on the thread that delivered
/// them, and clear anything this thread recorded before.
pub fn capture_reports() {
    INSTALL.call_once(|| {
        report::install(|error: &CallbackError, context: &ReportContext| {
            CAPTURED.with(|c| c.borrow_mut().push((error.to_string(), *context)));
        })
        .unwrap();
    });
    take_reports();
}

/// Take everything reported on this thread so far.
pub fn take_reports() -> Vec<(String, ReportContext)> {
    CAPTURED.with(|c| c.borrow_mut().drain(..).collect())
}

/// An observer that counts how often it was notified.
#[derive(Debug, Default)]
pub struct Watcher {
    pub name: &'static str,
    hits: AtomicUsize,
}

impl Watcher {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            hits: AtomicUsize::new(0),
        })
    }

    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}
