//! rigor — hierarchical test execution engine.
//!
//! Test units are organized as Package → Suite → Method. The engine walks
//! an already-sorted, id-assigned entity hierarchy, executes suites
//! sequentially or over a bounded worker pool, gates methods on dependency
//! predicates, auto-closes whatever tests a method leaves behind, and
//! aggregates outcomes into severity-ranked state counters at every level.
//!
//! Harness binaries provide the suites (implementations of
//! [`model::SuiteFactory`] / [`model::SuiteInstance`]) and consume results
//! through [`runner::sink::ReportSink`] callbacks and the final
//! [`runner::executor::RunOutcome`].

pub mod cli;
pub mod emit;
pub mod model;
pub mod runner;
pub mod state;

pub use model::{MethodAttr, PackageAttr, SuiteAttr, SuiteFactory, SuiteInstance};
pub use runner::details::{InfoLevel, PackageDetails, SuiteDetails, TestDetails};
pub use runner::error::{FactoryError, MethodError, RunError};
pub use runner::executor::{Engine, MAX_SUITE_WORKERS, RunConfig, RunOutcome};
pub use runner::handle::TestHandle;
pub use runner::sink::{ReportSink, SinkSet};
pub use state::{StateCounter, Status};
