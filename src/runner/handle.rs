use parking_lot::Mutex;

use crate::model::MethodAttr;
use crate::runner::details::{InfoLevel, SuiteDetails};
use crate::runner::error::MethodError;
use crate::runner::shared::Shared;
use crate::runner::sink::SinkSet;
use crate::state::{StateCounter, Status};

/// Where one method invocation stands with respect to opening tests.
///
/// Tracked explicitly rather than inferred from counting side effects:
/// auto-close decisions hang off this state alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationPhase {
    /// The method has not opened any test yet.
    NotStarted,
    /// At least one test is currently open.
    TestsOpen,
    /// Tests were opened and all of them are closed again.
    TestsClosed,
}

/// The callback handle passed into a method body for one invocation.
///
/// A method may open and close any number of tests, record steps and info
/// entries, all through this handle; the engine finalizes whatever is left
/// when the body returns (see [`TestHandle::finalize`]). Every close
/// propagates the outcome to the suite, package, and run counters exactly
/// once, and notifies the report sinks.
pub struct TestHandle<'a> {
    suite: &'a mut SuiteDetails,
    method: &'a MethodAttr,
    sinks: &'a SinkSet,
    shared: &'a Shared,
    package_counter: &'a Mutex<StateCounter>,
    phase: InvocationPhase,
    cycle_steps: StateCounter,
}

impl<'a> TestHandle<'a> {
    pub(crate) fn new(
        suite: &'a mut SuiteDetails,
        method: &'a MethodAttr,
        sinks: &'a SinkSet,
        shared: &'a Shared,
        package_counter: &'a Mutex<StateCounter>,
    ) -> Self {
        suite.set_active(method.method_id);
        Self {
            suite,
            method,
            sinks,
            shared,
            package_counter,
            phase: InvocationPhase::NotStarted,
            cycle_steps: StateCounter::new(),
        }
    }

    pub fn phase(&self) -> InvocationPhase {
        self.phase
    }

    pub fn method(&self) -> &MethodAttr {
        self.method
    }

    /// Open a new test under the current method.
    pub fn start_test(&mut self, name: &str) {
        if self.suite.open_test(name).is_none() {
            tracing::warn!(method = %self.method.name, "start_test with no active method");
            return;
        }
        self.phase = InvocationPhase::TestsOpen;
        let suite = &*self.suite;
        if let Some(test) = suite.last_open(self.method.method_id) {
            self.sinks.start_test(suite, test);
        }
    }

    /// Record one step. Lands on the most recently opened test when one is
    /// open; always accumulates in the invocation-level step counter that
    /// feeds auto-close.
    pub fn test_step(&mut self, state: Status, reason: &str, description: &str) {
        self.cycle_steps.inc(state, reason, description);
        self.suite
            .step_on_open(self.method.method_id, state, reason, description);
        let test = self.suite.last_open(self.method.method_id);
        self.sinks.test_step(test, state, reason, description);
    }

    /// Append an info entry to the most recently opened test.
    pub fn test_info(&mut self, level: InfoLevel, message: &str) {
        self.test_info_attached(level, message, None);
    }

    /// Append an info entry carrying an attachment reference.
    pub fn test_info_attached(
        &mut self,
        level: InfoLevel,
        message: &str,
        attachment: Option<String>,
    ) {
        let method_id = self.method.method_id;
        if self
            .suite
            .info_on_open(method_id, level, message, attachment)
            .is_none()
        {
            tracing::debug!(method = %self.method.name, message, "test info with no open test");
            return;
        }
        let suite = &*self.suite;
        if let Some(test) = suite.last_open(method_id)
            && let Some(entry) = test.infos().last()
        {
            self.sinks.test_info(test, entry);
        }
    }

    /// Close the most recent open test as PASSED.
    pub fn passed(&mut self, reason: &str) {
        self.finish_one(Status::Passed, reason, None);
    }

    /// Close the most recent open test as SKIPPED.
    pub fn skipped(&mut self, reason: &str) {
        self.finish_one(Status::Skipped, reason, None);
    }

    /// Close the most recent open test as FAILED.
    pub fn failed(&mut self, reason: &str) {
        self.finish_one(Status::Failed, reason, None);
    }

    /// Close the most recent open test as FAILED_KNOWN_BUG.
    pub fn failed_known_bug(&mut self, reason: &str) {
        self.finish_one(Status::FailedKnownBug, reason, None);
    }

    fn finish_one(&mut self, state: Status, reason: &str, error: Option<String>) -> bool {
        let method_id = self.method.method_id;
        let Some(index) = self.suite.close_last_open(method_id, state, reason, error) else {
            tracing::warn!(method = %self.method.name, "end of test with no open test");
            return false;
        };
        let suite = &*self.suite;
        if let Some(test) = suite.tests_for(method_id).get(index) {
            self.package_counter.lock().inc(state, reason, &test.name);
            self.shared.record(state, reason, &test.name);
            self.sinks.end_test(test, state, reason);
        }
        if self.phase == InvocationPhase::TestsOpen && self.suite.open_count(method_id) == 0 {
            self.phase = InvocationPhase::TestsClosed;
        }
        true
    }

    /// Open and immediately close a test on the method's behalf.
    fn auto_test(&mut self, state: Status, reason: &str, error: Option<String>) {
        let name = self.method.name.clone();
        self.start_test(&name);
        self.finish_one(state, reason, error);
    }

    /// Engine-driven auto-closing after the method body returned.
    ///
    /// A body that opened no test gets exactly one auto-created test: from
    /// the error if one was raised, else from the accumulated step state
    /// (PASSED when there were no steps). Any tests still open are
    /// force-closed the same way, or with their own step state when the
    /// body returned normally.
    pub(crate) fn finalize(&mut self, err: Option<&MethodError>) {
        let method_id = self.method.method_id;
        match err {
            None => {
                if self.phase == InvocationPhase::NotStarted {
                    let (state, reason) = self
                        .cycle_steps
                        .state_by_severity()
                        .unwrap_or((Status::Passed, "ok".to_owned()));
                    self.auto_test(state, &reason, None);
                }
                while self.suite.open_count(method_id) > 0 {
                    let (state, reason) = self
                        .suite
                        .last_open(method_id)
                        .and_then(|t| t.step_state())
                        .unwrap_or((Status::Passed, "ok".to_owned()));
                    self.finish_one(state, &reason, None);
                }
            }
            Some(MethodError::Expected(note)) => {
                if self.phase == InvocationPhase::NotStarted {
                    self.auto_test(Status::Passed, note, None);
                }
                while self.suite.open_count(method_id) > 0 {
                    self.finish_one(Status::Passed, note, None);
                }
            }
            Some(MethodError::Skip(reason)) => {
                if self.phase == InvocationPhase::NotStarted {
                    self.auto_test(Status::Skipped, reason, None);
                }
                while self.suite.open_count(method_id) > 0 {
                    self.finish_one(Status::Skipped, reason, None);
                }
            }
            Some(MethodError::Interrupted) => {
                while self.suite.open_count(method_id) > 0 {
                    self.finish_one(Status::Skipped, "user interrupt", None);
                }
            }
            Some(MethodError::Failed { message, detail }) => {
                let error = Some(detail.clone().unwrap_or_else(|| message.clone()));
                if self.phase == InvocationPhase::NotStarted {
                    self.auto_test(Status::Failed, message, error.clone());
                }
                while self.suite.open_count(method_id) > 0 {
                    self.finish_one(Status::Failed, message, error.clone());
                }
            }
        }
    }
}
