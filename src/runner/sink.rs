use parking_lot::Mutex;

use crate::runner::context::PackageContext;
use crate::runner::details::{InfoEntry, SuiteDetails, TestDetails};
use crate::runner::error::SinkError;
use crate::state::{StateCounter, Status};

/// Lifecycle listener for run output.
///
/// The engine invokes the callbacks in a fixed relative order per scope:
/// `start_package → {start_suite → {start_test → {test_step|test_info}* →
/// end_test}* → end_suite}* → end_package`. Implementations only observe;
/// the engine never inspects sink internals.
///
/// Callbacks may fail; see [`SinkSet`] for the isolation policy.
pub trait ReportSink: Send + Sync {
    /// Reporter name used in diagnostics.
    fn name(&self) -> &str;

    fn start_package(&self, ctx: &PackageContext) -> Result<(), SinkError> {
        let _ = ctx;
        Ok(())
    }

    fn end_package(&self, ctx: &PackageContext, counter: &StateCounter) -> Result<(), SinkError> {
        let _ = (ctx, counter);
        Ok(())
    }

    fn start_suite(&self, suite: &SuiteDetails) -> Result<(), SinkError> {
        let _ = suite;
        Ok(())
    }

    fn end_suite(&self, suite: &SuiteDetails) -> Result<(), SinkError> {
        let _ = suite;
        Ok(())
    }

    fn start_test(&self, suite: &SuiteDetails, test: &TestDetails) -> Result<(), SinkError> {
        let _ = (suite, test);
        Ok(())
    }

    fn test_info(&self, test: &TestDetails, entry: &InfoEntry) -> Result<(), SinkError> {
        let _ = (test, entry);
        Ok(())
    }

    /// A step was recorded; `test` is `None` when no test was open and the
    /// step went to the invocation-level aggregate.
    fn test_step(
        &self,
        test: Option<&TestDetails>,
        state: Status,
        reason: &str,
        description: &str,
    ) -> Result<(), SinkError> {
        let _ = (test, state, reason, description);
        Ok(())
    }

    fn end_test(
        &self,
        test: &TestDetails,
        state: Status,
        reason: &str,
    ) -> Result<(), SinkError> {
        let _ = (test, state, reason);
        Ok(())
    }
}

/// Fan-out over every registered report sink.
///
/// Sink failures are isolated per sink: logged and otherwise ignored, so one
/// broken reporter never takes the run down. When propagation is requested
/// (a debug flag), the first failure is retained and the engine aborts the
/// run at the next boundary check.
pub struct SinkSet {
    sinks: Vec<Box<dyn ReportSink>>,
    propagate: bool,
    first_error: Mutex<Option<SinkError>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::with_propagation(false)
    }

    pub fn with_propagation(propagate: bool) -> Self {
        Self {
            sinks: Vec::new(),
            propagate,
            first_error: Mutex::new(None),
        }
    }

    pub fn register(&mut self, sink: Box<dyn ReportSink>) {
        self.sinks.push(sink);
    }

    pub fn list(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Tear the set apart, keeping the registered sinks.
    pub fn into_sinks(self) -> Vec<Box<dyn ReportSink>> {
        self.sinks
    }

    /// The pending propagated error, if any. Engine boundary check.
    pub fn pending_error(&self) -> Option<SinkError> {
        self.first_error.lock().clone()
    }

    fn note<T>(&self, sink_name: &str, result: Result<T, SinkError>) {
        if let Err(err) = result {
            tracing::warn!(sink = sink_name, error = %err, "report sink failed");
            if self.propagate {
                let mut slot = self.first_error.lock();
                if slot.is_none() {
                    *slot = Some(err);
                }
            }
        }
    }

    pub fn start_package(&self, ctx: &PackageContext) {
        for sink in &self.sinks {
            self.note(sink.name(), sink.start_package(ctx));
        }
    }

    pub fn end_package(&self, ctx: &PackageContext, counter: &StateCounter) {
        for sink in &self.sinks {
            self.note(sink.name(), sink.end_package(ctx, counter));
        }
    }

    pub fn start_suite(&self, suite: &SuiteDetails) {
        for sink in &self.sinks {
            self.note(sink.name(), sink.start_suite(suite));
        }
    }

    pub fn end_suite(&self, suite: &SuiteDetails) {
        for sink in &self.sinks {
            self.note(sink.name(), sink.end_suite(suite));
        }
    }

    pub fn start_test(&self, suite: &SuiteDetails, test: &TestDetails) {
        for sink in &self.sinks {
            self.note(sink.name(), sink.start_test(suite, test));
        }
    }

    pub fn test_info(&self, test: &TestDetails, entry: &InfoEntry) {
        for sink in &self.sinks {
            self.note(sink.name(), sink.test_info(test, entry));
        }
    }

    pub fn test_step(
        &self,
        test: Option<&TestDetails>,
        state: Status,
        reason: &str,
        description: &str,
    ) {
        for sink in &self.sinks {
            self.note(sink.name(), sink.test_step(test, state, reason, description));
        }
    }

    pub fn end_test(&self, test: &TestDetails, state: Status, reason: &str) {
        for sink in &self.sinks {
            self.note(sink.name(), sink.end_test(test, state, reason));
        }
    }
}

impl Default for SinkSet {
    fn default() -> Self {
        Self::new()
    }
}
