use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runner::details::{PackageDetails, SuiteDetails, TestDetails};
use crate::runner::executor::RunOutcome;
use crate::state::{Lap, StateCounter};

/// Serializable run result for emitter output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run: RunMetadata,
    pub packages: Vec<PackageReport>,
}

/// Metadata about the run execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub duration_ms: u64,
    pub failed_methods: u64,
    pub states: BTreeMap<String, u64>,
}

/// One package-cycle in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageReport {
    pub name: String,
    pub cycle: u32,
    pub states: BTreeMap<String, u64>,
    pub suites: Vec<SuiteReport>,
}

/// One suite-cycle in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub name: String,
    pub cycle: u32,
    pub states: BTreeMap<String, u64>,
    pub tests: Vec<TestReport>,
}

/// A single test's result in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub test_id: u64,
    pub method_id: u32,
    pub name: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<LapReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub infos: Vec<InfoReport>,
}

/// One recorded lap in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LapReport {
    pub state: String,
    pub qty: u64,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// One info-log entry in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoReport {
    pub at: DateTime<Utc>,
    pub level: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

fn state_map(counter: &StateCounter) -> BTreeMap<String, u64> {
    crate::state::Status::SEVERITY
        .into_iter()
        .filter(|state| counter.count(*state) > 0)
        .map(|state| (state.to_string(), counter.count(state)))
        .collect()
}

fn lap_report(lap: &Lap) -> LapReport {
    LapReport {
        state: lap.state.to_string(),
        qty: lap.qty,
        elapsed_ms: lap.elapsed.as_millis() as u64,
        reason: lap.reason.clone(),
        description: lap.description.clone(),
        error: lap.error.clone(),
        at: lap.at,
    }
}

fn test_report(test: &TestDetails) -> TestReport {
    let (status, reason) = test
        .terminal()
        .map(|(state, reason)| (state.to_string(), reason))
        .unwrap_or_else(|| ("OPEN".to_owned(), String::new()));
    TestReport {
        test_id: test.test_id,
        method_id: test.method_id,
        name: test.name.clone(),
        status,
        reason,
        duration_ms: test.duration().unwrap_or_default().as_millis() as u64,
        steps: test.steps().timed_laps(None).into_iter().map(lap_report).collect(),
        infos: test
            .infos()
            .iter()
            .map(|entry| InfoReport {
                at: entry.at,
                level: entry.level.to_string(),
                message: entry.message.clone(),
                attachment: entry.attachment.clone(),
            })
            .collect(),
    }
}

fn suite_report(suite: &SuiteDetails) -> SuiteReport {
    SuiteReport {
        name: suite.name.clone(),
        cycle: suite.cycle,
        states: state_map(suite.counter()),
        tests: suite
            .methods()
            .flat_map(|(_, tests)| tests.iter().map(test_report))
            .collect(),
    }
}

fn package_report(pkg: &PackageDetails) -> PackageReport {
    PackageReport {
        name: pkg.name.clone(),
        cycle: pkg.cycle,
        states: state_map(&pkg.counter),
        suites: pkg.suites.iter().map(suite_report).collect(),
    }
}

/// Convert a [`RunOutcome`] into a serializable [`RunReport`].
pub fn to_report(outcome: &RunOutcome) -> RunReport {
    RunReport {
        run: RunMetadata {
            duration_ms: outcome.duration.as_millis() as u64,
            failed_methods: outcome.failed_methods,
            states: state_map(&outcome.counter),
        },
        packages: outcome.packages.iter().map(package_report).collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{MethodAttr, PackageAttr, SuiteAttr, SuiteFactory, SuiteInstance, mark};
    use crate::runner::error::{FactoryError, MethodError};
    use crate::runner::executor::{Engine, RunConfig};
    use crate::runner::handle::TestHandle;
    use crate::runner::sink::SinkSet;

    struct MixedSuite;

    impl SuiteInstance for MixedSuite {
        fn invoke(
            &mut self,
            method: &MethodAttr,
            test: &mut TestHandle<'_>,
        ) -> Result<(), MethodError> {
            match method.name.as_str() {
                "ok" => {
                    test.start_test("ok_case");
                    test.test_step(crate::state::Status::Passed, "checked", "assert");
                    test.passed("all good");
                    Ok(())
                }
                _ => Err(MethodError::failed("expected 200 got 500")),
            }
        }
    }

    struct MixedFactory;

    impl SuiteFactory for MixedFactory {
        fn construct(&self) -> Result<Box<dyn SuiteInstance>, FactoryError> {
            Ok(Box::new(MixedSuite))
        }
    }

    fn outcome() -> RunOutcome {
        let mut packages = vec![PackageAttr {
            suites: vec![SuiteAttr {
                methods: vec![MethodAttr::new("ok", 10), MethodAttr::new("broken", 20)],
                ..SuiteAttr::new("checkout", 1, Arc::new(MixedFactory))
            }],
            ..PackageAttr::new("web")
        }];
        mark::sort_and_mark(&mut packages);
        Engine::new(RunConfig::default(), SinkSet::new())
            .execute(&packages)
            .expect("run")
    }

    #[test]
    fn report_carries_run_totals() {
        let report = to_report(&outcome());
        assert_eq!(report.run.states.get("PASSED"), Some(&1));
        assert_eq!(report.run.states.get("FAILED"), Some(&1));
        assert_eq!(report.run.failed_methods, 1);
    }

    #[test]
    fn report_nests_package_suite_test() {
        let report = to_report(&outcome());
        assert_eq!(report.packages.len(), 1);
        assert_eq!(report.packages[0].name, "web");
        assert_eq!(report.packages[0].suites.len(), 1);
        let suite = &report.packages[0].suites[0];
        assert_eq!(suite.name, "checkout");
        assert_eq!(suite.tests.len(), 2);
    }

    #[test]
    fn report_test_entries_carry_status_and_reason() {
        let report = to_report(&outcome());
        let tests = &report.packages[0].suites[0].tests;
        let ok = tests.iter().find(|t| t.name == "ok_case").unwrap();
        assert_eq!(ok.status, "PASSED");
        assert_eq!(ok.reason, "all good");
        assert_eq!(ok.steps.len(), 1);
        assert_eq!(ok.steps[0].state, "PASSED");

        let broken = tests.iter().find(|t| t.name == "broken").unwrap();
        assert_eq!(broken.status, "FAILED");
        assert_eq!(broken.reason, "expected 200 got 500");
    }

    #[test]
    fn report_round_trips_through_serde() {
        let report = to_report(&outcome());
        let json = serde_json::to_string(&report).unwrap();
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.packages.len(), report.packages.len());
        assert_eq!(back.run.failed_methods, report.run.failed_methods);
    }
}
