use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::model::SuiteAttr;
use crate::state::{StateCounter, Status};

/// Severity of one info-log entry attached to a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for InfoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One append-only info-log entry.
#[derive(Debug, Clone)]
pub struct InfoEntry {
    pub at: DateTime<Utc>,
    pub level: InfoLevel,
    pub message: String,
    pub attachment: Option<String>,
}

/// Live record of one test opened by a method invocation.
///
/// Conceptually destroyed at close, but kept readable for reporting: the
/// terminal state counter, the intra-test step counter, and the info log
/// all survive.
#[derive(Debug, Clone)]
pub struct TestDetails {
    pub test_id: u64,
    pub method_id: u32,
    pub name: String,
    pub begin: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    state: StateCounter,
    steps: StateCounter,
    infos: Vec<InfoEntry>,
    open: bool,
}

impl TestDetails {
    fn new(test_id: u64, method_id: u32, name: &str) -> Self {
        let begin = Utc::now();
        Self {
            test_id,
            method_id,
            name: name.to_owned(),
            begin,
            end: None,
            state: StateCounter::new_at(begin),
            steps: StateCounter::new_at(begin),
            infos: Vec::new(),
            open: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn state(&self) -> &StateCounter {
        &self.state
    }

    pub fn steps(&self) -> &StateCounter {
        &self.steps
    }

    pub fn infos(&self) -> &[InfoEntry] {
        &self.infos
    }

    /// Terminal state and reason, once closed.
    pub fn terminal(&self) -> Option<(Status, String)> {
        self.state.state_by_severity()
    }

    /// Rolled-up state of the recorded steps.
    pub fn step_state(&self) -> Option<(Status, String)> {
        self.steps.state_by_severity()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.end
            .map(|end| (end - self.begin).to_std().unwrap_or_default())
    }

    fn add_step(&mut self, state: Status, reason: &str, description: &str) {
        self.steps.inc(state, reason, description);
    }

    fn add_info(&mut self, level: InfoLevel, message: &str, attachment: Option<String>) {
        self.infos.push(InfoEntry {
            at: Utc::now(),
            level,
            message: message.to_owned(),
            attachment,
        });
    }

    fn close(&mut self, state: Status, reason: &str, error: Option<String>) {
        let at = Utc::now();
        self.state
            .inc_at(state, reason, &self.name, 1, error, at);
        self.end = Some(at);
        self.open = false;
    }
}

/// Live record of one suite-cycle.
///
/// Tracks which method is currently being invoked (a method may open zero,
/// one, or many tests), every test created per method id, the subset still
/// open, and the states observed per priority group for dependency gating.
#[derive(Debug)]
pub struct SuiteDetails {
    pub suite_id: u32,
    pub name: String,
    pub package: String,
    pub cycle: u32,
    prio_by_method: HashMap<u32, u32>,
    active_method: Option<u32>,
    tests: BTreeMap<u32, Vec<TestDetails>>,
    open_by_method: HashMap<u32, Vec<usize>>,
    states_by_prio: BTreeMap<u32, BTreeSet<Status>>,
    counter: StateCounter,
    next_test_id: u64,
}

impl SuiteDetails {
    pub fn new(attr: &SuiteAttr, package: &str, cycle: u32) -> Self {
        Self {
            suite_id: attr.suite_id,
            name: attr.name.clone(),
            package: package.to_owned(),
            cycle,
            prio_by_method: attr
                .methods
                .iter()
                .map(|m| (m.method_id, m.prio))
                .collect(),
            active_method: None,
            tests: BTreeMap::new(),
            open_by_method: HashMap::new(),
            states_by_prio: BTreeMap::new(),
            counter: StateCounter::new(),
            next_test_id: 1,
        }
    }

    pub fn set_active(&mut self, method_id: u32) {
        self.active_method = Some(method_id);
    }

    pub fn clear_active(&mut self) {
        self.active_method = None;
    }

    pub fn active(&self) -> Option<u32> {
        self.active_method
    }

    pub fn counter(&self) -> &StateCounter {
        &self.counter
    }

    /// Close the suite counter's duration window.
    pub(crate) fn finish(&mut self) {
        self.counter.duration();
    }

    /// Open a new test under the active method.
    pub(crate) fn open_test(&mut self, name: &str) -> Option<&TestDetails> {
        let method_id = self.active_method?;
        let test = TestDetails::new(self.next_test_id, method_id, name);
        self.next_test_id += 1;
        let tests = self.tests.entry(method_id).or_default();
        tests.push(test);
        let index = tests.len() - 1;
        self.open_by_method.entry(method_id).or_default().push(index);
        tests.last()
    }

    /// All tests created under `method_id`, open or closed.
    pub fn tests_for(&self, method_id: u32) -> &[TestDetails] {
        self.tests.get(&method_id).map_or(&[], Vec::as_slice)
    }

    /// Iterate `(method_id, tests)` in id order.
    pub fn methods(&self) -> impl Iterator<Item = (u32, &[TestDetails])> {
        self.tests.iter().map(|(id, tests)| (*id, tests.as_slice()))
    }

    pub fn open_count(&self, method_id: u32) -> usize {
        self.open_by_method.get(&method_id).map_or(0, Vec::len)
    }

    /// The most recently opened still-open test under `method_id`.
    pub fn last_open(&self, method_id: u32) -> Option<&TestDetails> {
        let index = *self.open_by_method.get(&method_id)?.last()?;
        self.tests.get(&method_id)?.get(index)
    }

    /// Record a step on the most recently opened test. Returns the test
    /// the step landed on, or `None` when no test is open.
    pub(crate) fn step_on_open(
        &mut self,
        method_id: u32,
        state: Status,
        reason: &str,
        description: &str,
    ) -> Option<&TestDetails> {
        let index = *self.open_by_method.get(&method_id)?.last()?;
        let test = self.tests.get_mut(&method_id)?.get_mut(index)?;
        test.add_step(state, reason, description);
        Some(&*test)
    }

    /// Append an info entry to the most recently opened test.
    pub(crate) fn info_on_open(
        &mut self,
        method_id: u32,
        level: InfoLevel,
        message: &str,
        attachment: Option<String>,
    ) -> Option<&TestDetails> {
        let index = *self.open_by_method.get(&method_id)?.last()?;
        let test = self.tests.get_mut(&method_id)?.get_mut(index)?;
        test.add_info(level, message, attachment);
        Some(&*test)
    }

    /// Close the most recently opened test (LIFO) and roll its outcome
    /// into the suite counter and the per-priority observation map.
    /// Returns the closed test's index within [`Self::tests_for`].
    pub(crate) fn close_last_open(
        &mut self,
        method_id: u32,
        state: Status,
        reason: &str,
        error: Option<String>,
    ) -> Option<usize> {
        let index = self.open_by_method.get_mut(&method_id)?.pop()?;
        let test = self.tests.get_mut(&method_id)?.get_mut(index)?;
        test.close(state, reason, error);
        let name = test.name.clone();
        self.counter.inc(state, reason, &name);
        if let Some(prio) = self.prio_by_method.get(&method_id) {
            self.states_by_prio.entry(*prio).or_default().insert(state);
        }
        Some(index)
    }

    /// Whether any test at `prio` reached any terminal state.
    pub fn attempted(&self, prio: u32) -> bool {
        self.states_by_prio
            .get(&prio)
            .is_some_and(|states| !states.is_empty())
    }

    /// Whether `state` was observed among tests at `prio`.
    pub fn observed(&self, prio: u32, state: Status) -> bool {
        self.states_by_prio
            .get(&prio)
            .is_some_and(|states| states.contains(&state))
    }

    /// Most severe terminal state across every test of `method_id`, with
    /// the reason of the last test that reached it.
    pub fn method_rollup(&self, method_id: u32) -> Option<(Status, String)> {
        let mut worst: Option<(Status, String)> = None;
        for test in self.tests_for(method_id) {
            if let Some((state, reason)) = test.terminal()
                && worst.as_ref().is_none_or(|(w, _)| state >= *w)
            {
                worst = Some((state, reason));
            }
        }
        worst
    }

    /// Whether any test of `method_id` passed.
    pub fn method_has_pass(&self, method_id: u32) -> bool {
        self.tests_for(method_id)
            .iter()
            .any(|t| t.terminal().is_some_and(|(s, _)| s == Status::Passed))
    }
}

/// Collected result of one package-cycle.
#[derive(Debug)]
pub struct PackageDetails {
    pub name: String,
    pub cycle: u32,
    pub counter: StateCounter,
    pub suites: Vec<SuiteDetails>,
}

impl PackageDetails {
    pub fn new(
        name: &str,
        cycle: u32,
        counter: StateCounter,
        suites: Vec<SuiteDetails>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            cycle,
            counter,
            suites,
        }
    }

    pub fn state_by_severity(&self) -> Option<(Status, String)> {
        self.counter.state_by_severity()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{MethodAttr, SuiteFactory, SuiteInstance};
    use crate::runner::error::FactoryError;

    struct NullFactory;

    impl SuiteFactory for NullFactory {
        fn construct(&self) -> Result<Box<dyn SuiteInstance>, FactoryError> {
            Err(FactoryError::new("not constructible in details tests"))
        }
    }

    fn suite_details() -> SuiteDetails {
        let attr = SuiteAttr {
            suite_id: 1,
            methods: vec![
                MethodAttr {
                    method_id: 1,
                    ..MethodAttr::new("first", 10)
                },
                MethodAttr {
                    method_id: 2,
                    ..MethodAttr::new("second", 20)
                },
            ],
            ..SuiteAttr::new("auth", 1, Arc::new(NullFactory))
        };
        SuiteDetails::new(&attr, "pkg", 1)
    }

    #[test]
    fn open_test_requires_active_method() {
        let mut suite = suite_details();
        assert!(suite.open_test("t").is_none());
        suite.set_active(1);
        assert!(suite.open_test("t").is_some());
        assert_eq!(suite.open_count(1), 1);
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut suite = suite_details();
        suite.set_active(1);
        let first = suite.open_test("a").map(|t| t.test_id);
        let second = suite.open_test("b").map(|t| t.test_id);
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
    }

    #[test]
    fn close_rolls_into_suite_counter_and_prio_map() {
        let mut suite = suite_details();
        suite.set_active(1);
        suite.open_test("t");
        let closed = suite.close_last_open(1, Status::Passed, "ok", None);
        assert_eq!(closed, Some(0));
        assert!(!suite.tests_for(1)[0].is_open());
        assert_eq!(suite.counter().count(Status::Passed), 1);
        assert!(suite.attempted(10));
        assert!(suite.observed(10, Status::Passed));
        assert!(!suite.observed(10, Status::Failed));
        assert_eq!(suite.open_count(1), 0);
    }

    #[test]
    fn close_without_open_test_is_none() {
        let mut suite = suite_details();
        suite.set_active(1);
        assert!(suite.close_last_open(1, Status::Passed, "ok", None).is_none());
    }

    #[test]
    fn close_is_lifo_over_open_tests() {
        let mut suite = suite_details();
        suite.set_active(1);
        suite.open_test("outer");
        suite.open_test("inner");
        let closed = suite
            .close_last_open(1, Status::Failed, "boom", None)
            .map(|index| suite.tests_for(1)[index].name.clone());
        assert_eq!(closed.as_deref(), Some("inner"));
        assert_eq!(suite.open_count(1), 1);
        assert_eq!(
            suite.last_open(1).map(|t| t.name.as_str()),
            Some("outer")
        );
    }

    #[test]
    fn steps_land_on_most_recent_open_test() {
        let mut suite = suite_details();
        suite.set_active(1);
        suite.open_test("t1");
        suite.step_on_open(1, Status::Passed, "step ok", "check");
        let test = &suite.tests_for(1)[0];
        assert_eq!(test.steps().count(Status::Passed), 1);
        assert!(test.terminal().is_none());
    }

    #[test]
    fn info_log_appends_in_order() {
        let mut suite = suite_details();
        suite.set_active(1);
        suite.open_test("t1");
        suite.info_on_open(1, InfoLevel::Info, "first", None);
        suite.info_on_open(1, InfoLevel::Warn, "second", Some("trace.txt".into()));
        let infos = suite.tests_for(1)[0].infos();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].message, "first");
        assert_eq!(infos[1].level, InfoLevel::Warn);
        assert_eq!(infos[1].attachment.as_deref(), Some("trace.txt"));
    }

    #[test]
    fn method_rollup_picks_worst_state() {
        let mut suite = suite_details();
        suite.set_active(1);
        suite.open_test("a");
        suite.close_last_open(1, Status::Passed, "ok", None);
        suite.open_test("b");
        suite.close_last_open(1, Status::Failed, "boom", None);

        let (state, reason) = suite.method_rollup(1).unwrap();
        assert_eq!(state, Status::Failed);
        assert_eq!(reason, "boom");
        assert!(suite.method_has_pass(1));
    }

    #[test]
    fn method_rollup_none_without_tests() {
        let suite = suite_details();
        assert!(suite.method_rollup(2).is_none());
        assert!(!suite.method_has_pass(2));
    }

    #[test]
    fn closed_test_remains_readable() {
        let mut suite = suite_details();
        suite.set_active(1);
        suite.open_test("t");
        suite.close_last_open(1, Status::Failed, "boom", Some("stack".into()));
        let test = &suite.tests_for(1)[0];
        assert!(!test.is_open());
        assert_eq!(test.terminal(), Some((Status::Failed, "boom".into())));
        assert!(test.duration().is_some());
        let laps = test.state().timed_laps(None);
        assert_eq!(laps[0].error.as_deref(), Some("stack"));
    }

    #[test]
    fn package_details_rollup() {
        let mut counter = StateCounter::new();
        counter.inc(Status::Passed, "ok", "");
        counter.inc(Status::Skipped, "gate", "");
        let pkg = PackageDetails::new("pkg", 1, counter, Vec::new());
        assert_eq!(
            pkg.state_by_severity().map(|(s, _)| s),
            Some(Status::Skipped)
        );
    }

    #[test]
    fn info_level_display() {
        assert_eq!(InfoLevel::Debug.to_string(), "debug");
        assert_eq!(InfoLevel::Error.to_string(), "error");
    }
}
