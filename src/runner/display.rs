use std::time::Duration;

use crate::runner::context::PackageContext;
use crate::runner::details::{SuiteDetails, TestDetails};
use crate::runner::error::SinkError;
use crate::runner::sink::ReportSink;
use crate::state::{StateCounter, Status};

/// Format a status label for terminal output.
fn status_label(status: Status) -> &'static str {
    match status {
        Status::Passed => "PASSED",
        Status::Skipped => "SKIPPED",
        Status::FailedKnownBug => "FAILED_KNOWN_BUG",
        Status::Failed => "FAILED",
    }
}

/// One engine progress line: percent invoked, elapsed time, running
/// failed/total counters, and the qualified method name.
pub fn format_progress(
    percent: f64,
    elapsed: Duration,
    failed: u64,
    total: u64,
    qualified: &str,
) -> String {
    format!(
        "[{percent:3.0}%] {:.1}s  failed {failed}/{total}  {qualified}",
        elapsed.as_secs_f64()
    )
}

/// Format a closed test as it completes.
pub fn format_test_result(test: &TestDetails, state: Status, reason: &str) -> String {
    let duration_secs = test
        .duration()
        .unwrap_or_default()
        .as_secs_f64();
    let mut line = format!(
        "  [{}] {} ({duration_secs:.1}s)",
        status_label(state),
        test.name
    );
    if state != Status::Passed && !reason.is_empty() {
        line.push_str(&format!("\n         → {reason}"));
    }
    line
}

/// Format the final summary for a finished scope.
pub fn format_summary(counter: &StateCounter, duration: Duration) -> String {
    let mut parts = Vec::new();
    if counter.count(Status::Passed) > 0 {
        parts.push(format!("{} passed", counter.count(Status::Passed)));
    }
    if counter.count(Status::Failed) > 0 {
        parts.push(format!("{} failed", counter.count(Status::Failed)));
    }
    if counter.count(Status::FailedKnownBug) > 0 {
        parts.push(format!(
            "{} known bugs",
            counter.count(Status::FailedKnownBug)
        ));
    }
    if counter.count(Status::Skipped) > 0 {
        parts.push(format!("{} skipped", counter.count(Status::Skipped)));
    }
    if parts.is_empty() {
        parts.push("0 tests".into());
    }
    format!(
        "\nResults: {} ({:.1}s)",
        parts.join(", "),
        duration.as_secs_f64()
    )
}

/// Format the header for a starting suite-cycle.
pub fn format_suite_header(suite: &SuiteDetails) -> String {
    format!("Running {}/{} (cycle {})...", suite.package, suite.name, suite.cycle)
}

/// Report sink that prints human-readable lines to stdout.
pub struct ConsoleSink;

impl ReportSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn start_package(&self, ctx: &PackageContext) -> Result<(), SinkError> {
        println!("Package {} (cycle {})", ctx.package, ctx.cycle);
        Ok(())
    }

    fn end_package(&self, _ctx: &PackageContext, counter: &StateCounter) -> Result<(), SinkError> {
        let mut counter = counter.clone();
        let duration = counter.duration();
        println!("{}", format_summary(&counter, duration));
        Ok(())
    }

    fn start_suite(&self, suite: &SuiteDetails) -> Result<(), SinkError> {
        println!("{}", format_suite_header(suite));
        Ok(())
    }

    fn end_test(
        &self,
        test: &TestDetails,
        state: Status,
        reason: &str,
    ) -> Result<(), SinkError> {
        println!("{}", format_test_result(test, state, reason));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{MethodAttr, SuiteAttr, SuiteFactory, SuiteInstance};
    use crate::runner::error::FactoryError;

    struct NullFactory;

    impl SuiteFactory for NullFactory {
        fn construct(&self) -> Result<Box<dyn SuiteInstance>, FactoryError> {
            Err(FactoryError::new("not constructible in display tests"))
        }
    }

    fn closed_test(state: Status, reason: &str) -> TestDetails {
        let attr = SuiteAttr {
            suite_id: 1,
            methods: vec![MethodAttr {
                method_id: 1,
                ..MethodAttr::new("login", 10)
            }],
            ..SuiteAttr::new("auth", 1, Arc::new(NullFactory))
        };
        let mut suite = SuiteDetails::new(&attr, "pkg", 1);
        suite.set_active(1);
        suite.open_test("login");
        suite.close_last_open(1, state, reason, None);
        suite.tests_for(1)[0].clone()
    }

    #[test]
    fn progress_line_format() {
        let line = format_progress(
            50.0,
            Duration::from_millis(12_300),
            1,
            20,
            "pkg/auth/login",
        );
        assert_eq!(line, "[ 50%] 12.3s  failed 1/20  pkg/auth/login");
    }

    #[test]
    fn test_result_passed_has_no_reason_line() {
        let test = closed_test(Status::Passed, "ok");
        let line = format_test_result(&test, Status::Passed, "ok");
        assert!(line.contains("[PASSED]"));
        assert!(line.contains("login"));
        assert!(!line.contains("→"));
    }

    #[test]
    fn test_result_failed_shows_reason() {
        let test = closed_test(Status::Failed, "expected 200 got 401");
        let line = format_test_result(&test, Status::Failed, "expected 200 got 401");
        assert!(line.contains("[FAILED]"));
        assert!(line.contains("→ expected 200 got 401"));
    }

    #[test]
    fn test_result_skipped_shows_reason() {
        let test = closed_test(Status::Skipped, "no PASSED outcome at priority 2");
        let line = format_test_result(&test, Status::Skipped, "no PASSED outcome at priority 2");
        assert!(line.contains("[SKIPPED]"));
        assert!(line.contains("priority 2"));
    }

    #[test]
    fn summary_lists_nonzero_states() {
        let mut counter = StateCounter::new();
        counter.inc_qty(Status::Passed, "ok", "", 3);
        counter.inc(Status::Failed, "boom", "");
        let out = format_summary(&counter, Duration::from_secs(2));
        assert!(out.contains("3 passed"));
        assert!(out.contains("1 failed"));
        assert!(!out.contains("skipped"));
        assert!(out.contains("2.0s"));
    }

    #[test]
    fn summary_empty_counter() {
        let counter = StateCounter::new();
        let out = format_summary(&counter, Duration::from_secs(1));
        assert!(out.contains("0 tests"));
    }

    #[test]
    fn console_sink_is_named() {
        assert_eq!(ConsoleSink.name(), "console");
    }
}
