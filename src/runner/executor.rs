use std::collections::{BTreeSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::model::{MethodAttr, PackageAttr, SuiteAttr, SuiteInstance, deps, mark};
use crate::runner::context::PackageContext;
use crate::runner::details::{PackageDetails, SuiteDetails};
use crate::runner::display;
use crate::runner::error::{FactoryError, MethodError, RunError};
use crate::runner::gate;
use crate::runner::handle::TestHandle;
use crate::runner::shared::{Interrupt, Shared};
use crate::runner::sink::SinkSet;
use crate::state::{StateCounter, Status};

/// Hard cap on concurrent suite workers.
pub const MAX_SUITE_WORKERS: usize = 8;

/// Configuration for a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Skip every method with reason "DRYRUN"; bodies never run.
    pub dry_run: bool,
    /// Collapse every repetition count to a single pass.
    pub only_once: bool,
    /// Suites per package-cycle running at once (1 = sequential).
    pub suite_concurrency: usize,
    /// Step debugging forces sequential suite execution.
    pub step_debug: bool,
    /// Abort the whole run on the first unexpected method error.
    pub debug_on_error: bool,
    /// Abort the run when a report sink fails instead of logging on.
    pub propagate_sink_errors: bool,
    /// States whose method rollup counts toward the failed tally.
    pub counted_as_failed: BTreeSet<Status>,
    /// A method with no PASSED outcome at all counts as failed.
    pub missing_pass_is_failure: bool,
    /// Root directory for package namespaces.
    pub base_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            only_once: false,
            suite_concurrency: 1,
            step_debug: false,
            debug_on_error: false,
            propagate_sink_errors: false,
            counted_as_failed: [Status::Failed].into(),
            missing_pass_is_failure: true,
            base_dir: PathBuf::from("."),
        }
    }
}

impl RunConfig {
    /// Worker count for one package-cycle, after the cap and step-debug.
    pub fn effective_concurrency(&self, suites: usize) -> usize {
        if self.step_debug {
            return 1;
        }
        self.suite_concurrency
            .clamp(1, MAX_SUITE_WORKERS)
            .min(suites.max(1))
    }
}

/// The complete result of a run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Global state counter across every test of the run.
    pub counter: StateCounter,
    /// Per-package-cycle details, readable for reporting.
    pub packages: Vec<PackageDetails>,
    /// Methods whose rollup counted as failed; the run's exit signal.
    pub failed_methods: u64,
    pub duration: Duration,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.failed_methods == 0
    }

    /// Flat `STATE: count` export for external consumption.
    pub fn counts_lines(&self) -> String {
        self.counter.counts_lines()
    }
}

/// Shared per-package-cycle references handed down to suite work.
struct SuiteScope<'a> {
    ctx: &'a PackageContext,
    package_counter: &'a Mutex<StateCounter>,
    shared: &'a Shared,
}

/// The execution engine. Walks the entity hierarchy, schedules suites
/// sequentially or over a bounded worker pool, gates and invokes methods,
/// auto-closes whatever they leave behind, and rolls outcomes up to the
/// run counter.
pub struct Engine {
    config: RunConfig,
    sinks: SinkSet,
    interrupt: Interrupt,
}

impl Engine {
    pub fn new(config: RunConfig, sinks: SinkSet) -> Self {
        let sinks = if config.propagate_sink_errors {
            let mut replacement = SinkSet::with_propagation(true);
            for sink in sinks.into_sinks() {
                replacement.register(sink);
            }
            replacement
        } else {
            sinks
        };
        Self {
            config,
            sinks,
            interrupt: Interrupt::new(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Cancellation handle; wire it to a signal handler to abort the run
    /// at the next method boundary.
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Execute the selected hierarchy. This is the primary entry point.
    ///
    /// Packages run in list order, each repeated per its cycle count.
    /// Suites within a package-cycle run sequentially or on a worker pool
    /// per [`RunConfig::effective_concurrency`]; every suite fully
    /// completes before the package ends.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] only for a user interrupt or when a debug flag
    /// escalates an error; everything else lands in the outcome's counters.
    pub fn execute(&self, packages: &[PackageAttr]) -> Result<RunOutcome, RunError> {
        deps::validate(packages).map_err(RunError::aborted)?;

        let total = mark::total_invocations(packages, self.config.only_once);
        let shared = Shared::new(total, self.interrupt.clone());
        let started = Instant::now();
        tracing::debug!(
            packages = packages.len(),
            total_invocations = total,
            concurrency = self.config.suite_concurrency,
            "starting run"
        );

        let mut collected = Vec::new();
        for pkg in packages {
            for cycle in 1..=pkg.cycles(self.config.only_once) {
                if shared.is_interrupted() {
                    return Err(RunError::Interrupted);
                }
                collected.push(self.run_package_cycle(pkg, cycle, &shared)?);
            }
        }

        Ok(RunOutcome {
            counter: shared.run_counter(),
            packages: collected,
            failed_methods: shared.failed_methods(),
            duration: started.elapsed(),
        })
    }

    fn run_package_cycle(
        &self,
        pkg: &PackageAttr,
        cycle: u32,
        shared: &Shared,
    ) -> Result<PackageDetails, RunError> {
        // The package context is built exactly once per cycle, before any
        // suite starts; workers only ever see it by reference.
        let ctx = PackageContext::new(&self.config.base_dir, &pkg.name, cycle);
        tracing::debug!(package = %pkg.name, cycle, workdir = %ctx.workdir().display(), "package cycle");
        self.sinks.start_package(&ctx);
        self.check_sinks()?;

        let package_counter = Mutex::new(StateCounter::new());
        let workers = self.config.effective_concurrency(pkg.suites.len());
        let scope = SuiteScope {
            ctx: &ctx,
            package_counter: &package_counter,
            shared,
        };

        let suites = if workers <= 1 {
            let mut out = Vec::new();
            for suite in &pkg.suites {
                out.extend(self.run_suite(suite, &scope)?);
            }
            out
        } else {
            self.run_suites_pooled(pkg, &scope, workers)?
        };

        let mut counter = package_counter.into_inner();
        counter.duration();
        self.sinks.end_package(&ctx, &counter);
        self.check_sinks()?;
        Ok(PackageDetails::new(&pkg.name, cycle, counter, suites))
    }

    fn run_suites_pooled(
        &self,
        pkg: &PackageAttr,
        scope: &SuiteScope<'_>,
        workers: usize,
    ) -> Result<Vec<SuiteDetails>, RunError> {
        let queue: Mutex<VecDeque<&SuiteAttr>> = Mutex::new(pkg.suites.iter().collect());
        let results: Mutex<Vec<SuiteDetails>> = Mutex::new(Vec::new());
        let failures: Mutex<Vec<RunError>> = Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| {
                    loop {
                        if scope.shared.is_interrupted() {
                            break;
                        }
                        let next = queue.lock().pop_front();
                        let Some(suite) = next else { break };
                        match self.run_suite(suite, scope) {
                            Ok(list) => results.lock().extend(list),
                            Err(err) => {
                                // Stop the other workers from picking up
                                // new suites; in-flight ones finish.
                                scope.shared.interrupt().trigger();
                                failures.lock().push(err);
                                break;
                            }
                        }
                    }
                });
            }
        });

        let mut failures = failures.into_inner();
        if !failures.is_empty() {
            let root = failures
                .iter()
                .position(|e| !matches!(e, RunError::Interrupted))
                .unwrap_or(0);
            return Err(failures.swap_remove(root));
        }
        if scope.shared.is_interrupted() {
            return Err(RunError::Interrupted);
        }

        let mut results = results.into_inner();
        results.sort_by_key(|sd| (sd.suite_id, sd.cycle));
        Ok(results)
    }

    fn run_suite(
        &self,
        suite: &SuiteAttr,
        scope: &SuiteScope<'_>,
    ) -> Result<Vec<SuiteDetails>, RunError> {
        let mut out = Vec::new();
        for cycle in 1..=suite.cycles(self.config.only_once) {
            if scope.shared.is_interrupted() {
                return Err(RunError::Interrupted);
            }
            let mut sd = SuiteDetails::new(suite, &scope.ctx.package, cycle);
            self.sinks.start_suite(&sd);
            self.check_sinks()?;

            // The instance lives for exactly one suite-cycle and is owned
            // by this worker alone. Dry-run never constructs it.
            let (mut instance, construct_err) = if self.config.dry_run {
                (None, None)
            } else {
                match suite.factory.construct() {
                    Ok(instance) => (Some(instance), None),
                    Err(err) => {
                        tracing::warn!(suite = %suite.name, error = %err, "suite construction failed");
                        (None, Some(err))
                    }
                }
            };

            for method in &suite.methods {
                if scope.shared.is_interrupted() {
                    return Err(RunError::Interrupted);
                }
                self.run_method(
                    method,
                    &suite.name,
                    &mut sd,
                    instance.as_deref_mut(),
                    construct_err.as_ref(),
                    scope,
                )?;
            }

            drop(instance);
            sd.finish();
            self.sinks.end_suite(&sd);
            self.check_sinks()?;
            out.push(sd);
        }
        Ok(out)
    }

    fn run_method(
        &self,
        method: &MethodAttr,
        suite_name: &str,
        sd: &mut SuiteDetails,
        mut instance: Option<&mut (dyn SuiteInstance + 'static)>,
        construct_err: Option<&FactoryError>,
        scope: &SuiteScope<'_>,
    ) -> Result<(), RunError> {
        sd.set_active(method.method_id);

        if self.config.dry_run {
            let mut handle = self.handle(sd, method, scope);
            handle.start_test("dryrun");
            handle.skipped("DRYRUN");
        } else if let Some(err) = construct_err {
            let mut handle = self.handle(sd, method, scope);
            handle.start_test(&method.name);
            handle.skipped(&err.to_string());
            if self.config.debug_on_error {
                return Err(RunError::Aborted {
                    message: err.to_string(),
                    detail: err.detail.clone(),
                });
            }
        } else if let Err(miss) = gate::check(method, sd) {
            tracing::debug!(method = %method.name, %miss, "dependency gate unmet");
            let mut handle = self.handle(sd, method, scope);
            handle.start_test(&method.name);
            handle.skipped(&miss.to_string());
        } else {
            let mut first_error: Option<MethodError> = None;
            for _ in 0..method.cycles(self.config.only_once) {
                if scope.shared.is_interrupted() {
                    return Err(RunError::Interrupted);
                }
                if let Some(first) = &first_error {
                    // The first unrecovered error force-skips every
                    // still-pending repetition of this method.
                    let mut handle = self.handle(sd, method, scope);
                    handle.start_test(&method.name);
                    handle.skipped(&format!("previous repetition failed: {first}"));
                    continue;
                }

                let mut handle = self.handle(sd, method, scope);
                let result = match instance.as_deref_mut() {
                    Some(inst) => invoke_method(inst, method, &mut handle),
                    None => Err(MethodError::failed("suite instance unavailable")),
                };
                match result {
                    Ok(()) => handle.finalize(None),
                    Err(err) => {
                        handle.finalize(Some(&err));
                        match err {
                            MethodError::Interrupted => {
                                scope.shared.interrupt().trigger();
                                return Err(RunError::Interrupted);
                            }
                            MethodError::Expected(_) | MethodError::Skip(_) => {}
                            MethodError::Failed { message, detail } => {
                                if self.config.debug_on_error {
                                    tracing::error!(
                                        method = %method.name,
                                        error = %message,
                                        "aborting run on first error"
                                    );
                                    return Err(RunError::Aborted { message, detail });
                                }
                                first_error = Some(MethodError::Failed { message, detail });
                            }
                        }
                    }
                }
            }
        }
        sd.clear_active();

        // One progress tick per method invocation unit, plus the failed
        // tally from the rollup across every test the method produced.
        scope.shared.progress.record_invocation();
        let rollup = sd.method_rollup(method.method_id);
        let counted_failed = match &rollup {
            Some((state, _)) if self.config.counted_as_failed.contains(state) => true,
            _ => {
                self.config.missing_pass_is_failure && !sd.method_has_pass(method.method_id)
            }
        };
        let failed_total = if counted_failed {
            scope.shared.add_failed_method()
        } else {
            scope.shared.failed_methods()
        };
        tracing::info!(
            target: "rigor::progress",
            "{}",
            display::format_progress(
                scope.shared.progress.percent(),
                scope.shared.progress.elapsed(),
                failed_total,
                scope.shared.progress.total(),
                &scope.ctx.qualify(suite_name, &method.name),
            )
        );
        self.check_sinks()
    }

    fn handle<'a>(
        &'a self,
        sd: &'a mut SuiteDetails,
        method: &'a MethodAttr,
        scope: &SuiteScope<'a>,
    ) -> TestHandle<'a> {
        TestHandle::new(sd, method, &self.sinks, scope.shared, scope.package_counter)
    }

    fn check_sinks(&self) -> Result<(), RunError> {
        match self.sinks.pending_error() {
            Some(err) => Err(RunError::aborted(err.to_string())),
            None => Ok(()),
        }
    }
}

/// Invoke one method body, converting panics into plain failures.
fn invoke_method(
    instance: &mut dyn SuiteInstance,
    method: &MethodAttr,
    handle: &mut TestHandle<'_>,
) -> Result<(), MethodError> {
    match panic::catch_unwind(AssertUnwindSafe(|| instance.invoke(method, handle))) {
        Ok(result) => result,
        Err(payload) => Err(MethodError::from_panic(payload.as_ref())),
    }
}
