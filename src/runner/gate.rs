use crate::model::MethodAttr;
use crate::runner::details::SuiteDetails;
use crate::runner::error::{GateMiss, GateMissKind};
use crate::state::Status;

/// Evaluate a method's dependency predicates against what the suite has
/// observed so far.
///
/// Order is fixed: `depends` (attempted at all), then `on_success` (a
/// PASSED outcome exists at the priority), then `on_failure` (a FAILED or
/// FAILED_KNOWN_BUG outcome exists). The first failing predicate names the
/// skip reason. Only state from the same suite is consulted; cross-suite
/// dependencies are not supported.
pub fn check(method: &MethodAttr, suite: &SuiteDetails) -> Result<(), GateMiss> {
    for prio in &method.depends {
        if !suite.attempted(*prio) {
            return Err(GateMiss::new(GateMissKind::NotAttempted, *prio));
        }
    }
    for prio in &method.on_success {
        if !suite.observed(*prio, Status::Passed) {
            return Err(GateMiss::new(GateMissKind::NoPass, *prio));
        }
    }
    for prio in &method.on_failure {
        if !suite.observed(*prio, Status::Failed)
            && !suite.observed(*prio, Status::FailedKnownBug)
        {
            return Err(GateMiss::new(GateMissKind::NoFailure, *prio));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{SuiteAttr, SuiteFactory, SuiteInstance};
    use crate::runner::error::FactoryError;

    struct NullFactory;

    impl SuiteFactory for NullFactory {
        fn construct(&self) -> Result<Box<dyn SuiteInstance>, FactoryError> {
            Err(FactoryError::new("not constructible in gate tests"))
        }
    }

    /// Suite with method 1 at prio 2 and method 2 at prio 3.
    fn suite_details() -> SuiteDetails {
        let attr = SuiteAttr {
            suite_id: 1,
            methods: vec![
                MethodAttr {
                    method_id: 1,
                    ..MethodAttr::new("setup", 2)
                },
                MethodAttr {
                    method_id: 2,
                    ..MethodAttr::new("checkout", 3)
                },
            ],
            ..SuiteAttr::new("s", 1, Arc::new(NullFactory))
        };
        SuiteDetails::new(&attr, "pkg", 1)
    }

    fn close_one(suite: &mut SuiteDetails, method_id: u32, state: Status) {
        suite.set_active(method_id);
        suite.open_test("t");
        suite.close_last_open(method_id, state, "r", None);
    }

    fn gated(on_success: &[u32]) -> MethodAttr {
        MethodAttr {
            on_success: on_success.iter().copied().collect(),
            ..MethodAttr::new("checkout", 3)
        }
    }

    #[test]
    fn on_success_met_by_passed_outcome() {
        let mut suite = suite_details();
        close_one(&mut suite, 1, Status::Passed);
        assert!(check(&gated(&[2]), &suite).is_ok());
    }

    #[test]
    fn on_success_missed_when_only_failed() {
        let mut suite = suite_details();
        close_one(&mut suite, 1, Status::Failed);
        let miss = check(&gated(&[2]), &suite).unwrap_err();
        assert_eq!(miss.kind, GateMissKind::NoPass);
        assert_eq!(miss.prio, 2);
        assert!(miss.to_string().contains("priority 2"));
    }

    #[test]
    fn on_success_missed_when_never_run() {
        let suite = suite_details();
        let miss = check(&gated(&[2]), &suite).unwrap_err();
        assert_eq!(miss.kind, GateMissKind::NoPass);
    }

    #[test]
    fn on_failure_met_by_failed_outcome() {
        let mut suite = suite_details();
        close_one(&mut suite, 1, Status::Failed);
        let method = MethodAttr {
            on_failure: [2].into(),
            ..MethodAttr::new("cleanup", 3)
        };
        assert!(check(&method, &suite).is_ok());
    }

    #[test]
    fn on_failure_met_by_known_bug() {
        let mut suite = suite_details();
        close_one(&mut suite, 1, Status::FailedKnownBug);
        let method = MethodAttr {
            on_failure: [2].into(),
            ..MethodAttr::new("cleanup", 3)
        };
        assert!(check(&method, &suite).is_ok());
    }

    #[test]
    fn on_failure_missed_when_only_passed() {
        let mut suite = suite_details();
        close_one(&mut suite, 1, Status::Passed);
        let method = MethodAttr {
            on_failure: [2].into(),
            ..MethodAttr::new("cleanup", 3)
        };
        let miss = check(&method, &suite).unwrap_err();
        assert_eq!(miss.kind, GateMissKind::NoFailure);
    }

    #[test]
    fn depends_met_by_any_attempt() {
        let mut suite = suite_details();
        close_one(&mut suite, 1, Status::Skipped);
        let method = MethodAttr {
            depends: [2].into(),
            ..MethodAttr::new("later", 3)
        };
        assert!(check(&method, &suite).is_ok());
    }

    #[test]
    fn depends_missed_when_never_attempted() {
        let suite = suite_details();
        let method = MethodAttr {
            depends: [2].into(),
            ..MethodAttr::new("later", 3)
        };
        let miss = check(&method, &suite).unwrap_err();
        assert_eq!(miss.kind, GateMissKind::NotAttempted);
    }

    #[test]
    fn on_success_checked_before_on_failure() {
        let suite = suite_details();
        let method = MethodAttr {
            on_success: [2].into(),
            on_failure: [2].into(),
            ..MethodAttr::new("both", 3)
        };
        let miss = check(&method, &suite).unwrap_err();
        assert_eq!(miss.kind, GateMissKind::NoPass);
    }

    #[test]
    fn first_missing_priority_is_reported() {
        let mut suite = suite_details();
        close_one(&mut suite, 1, Status::Passed); // prio 2 passed
        let method = MethodAttr {
            on_success: [2, 3].into(),
            ..MethodAttr::new("multi", 5)
        };
        let miss = check(&method, &suite).unwrap_err();
        assert_eq!(miss.prio, 3);
    }

    #[test]
    fn no_dependencies_always_passes() {
        let suite = suite_details();
        assert!(check(&MethodAttr::new("free", 1), &suite).is_ok());
    }
}
