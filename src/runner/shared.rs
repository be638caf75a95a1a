use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::runner::progress::Progress;
use crate::state::{StateCounter, Status};

/// Cloneable handle for requesting run cancellation.
///
/// The engine checks it at every method boundary; triggering it lets
/// in-flight callbacks finish while preventing new work from starting.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The single run-wide mutable aggregate, shared by every suite worker.
///
/// Holds the global state counter, the failed-method tally, the progress
/// tracker, and the interrupt flag. One instance per run, passed by
/// reference into workers; there are no module-level globals.
#[derive(Debug)]
pub struct Shared {
    run: Mutex<StateCounter>,
    failed_methods: AtomicU64,
    pub progress: Progress,
    interrupt: Interrupt,
}

impl Shared {
    pub fn new(total_invocations: u64, interrupt: Interrupt) -> Self {
        Self {
            run: Mutex::new(StateCounter::new()),
            failed_methods: AtomicU64::new(0),
            progress: Progress::new(total_invocations),
            interrupt,
        }
    }

    /// Record one test outcome on the global run counter.
    pub fn record(&self, state: Status, reason: &str, description: &str) {
        self.run.lock().inc(state, reason, description);
    }

    /// Snapshot of the run counter, closing its duration window.
    pub fn run_counter(&self) -> StateCounter {
        let mut counter = self.run.lock().clone();
        counter.duration();
        counter
    }

    pub fn add_failed_method(&self) -> u64 {
        self.failed_methods.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn failed_methods(&self) -> u64 {
        self.failed_methods.load(Ordering::SeqCst)
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_triggered()
    }
}
