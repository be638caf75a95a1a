pub mod deps;
pub mod filter;
pub mod mark;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::runner::error::{FactoryError, MethodError};
use crate::runner::handle::TestHandle;

/// A stateful suite object, constructed once per suite-cycle and owned
/// exclusively by the worker running that cycle.
///
/// The engine dispatches each selected method descriptor through
/// [`SuiteInstance::invoke`]; the body may open and close any number of
/// tests through the handle, including none.
pub trait SuiteInstance: Send {
    fn invoke(
        &mut self,
        method: &MethodAttr,
        test: &mut TestHandle<'_>,
    ) -> Result<(), MethodError>;
}

/// Builds suite instances. Construction arguments live inside the factory,
/// so duplicating a hierarchy shares them instead of copying user state.
pub trait SuiteFactory: Send + Sync {
    fn construct(&self) -> Result<Box<dyn SuiteInstance>, FactoryError>;
}

/// Descriptor of one test method: identity, ordering, repetition, and the
/// dependency predicates gating its execution.
///
/// `method_id` is zero until [`mark::sort_and_mark`] assigns ids over the
/// sorted tree; after that it is unique and reflects execution order.
#[derive(Debug, Clone)]
pub struct MethodAttr {
    pub method_id: u32,
    pub name: String,
    /// Lower runs first; ties broken by name.
    pub prio: u32,
    /// Minimum inclusion threshold for subset selection.
    pub level: u32,
    pub ncycles: u32,
    pub tags: Vec<String>,
    /// Priorities that must have been attempted before this method runs.
    pub depends: BTreeSet<u32>,
    /// Priorities that must have produced at least one PASSED outcome.
    pub on_success: BTreeSet<u32>,
    /// Priorities that must have produced at least one failing outcome.
    pub on_failure: BTreeSet<u32>,
}

impl MethodAttr {
    pub fn new(name: impl Into<String>, prio: u32) -> Self {
        Self {
            method_id: 0,
            name: name.into(),
            prio,
            level: 0,
            ncycles: 1,
            tags: Vec::new(),
            depends: BTreeSet::new(),
            on_success: BTreeSet::new(),
            on_failure: BTreeSet::new(),
        }
    }

    /// Effective repetition count; a zero descriptor still runs once.
    pub fn cycles(&self, only_once: bool) -> u32 {
        if only_once { 1 } else { self.ncycles.max(1) }
    }
}

/// Descriptor of one suite: its methods plus the factory that builds the
/// per-cycle instance.
#[derive(Clone)]
pub struct SuiteAttr {
    pub suite_id: u32,
    pub name: String,
    pub prio: u32,
    pub ncycles: u32,
    pub factory: Arc<dyn SuiteFactory>,
    pub methods: Vec<MethodAttr>,
}

impl SuiteAttr {
    pub fn new(name: impl Into<String>, prio: u32, factory: Arc<dyn SuiteFactory>) -> Self {
        Self {
            suite_id: 0,
            name: name.into(),
            prio,
            ncycles: 1,
            factory,
            methods: Vec::new(),
        }
    }

    pub fn cycles(&self, only_once: bool) -> u32 {
        if only_once { 1 } else { self.ncycles.max(1) }
    }
}

impl fmt::Debug for SuiteAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiteAttr")
            .field("suite_id", &self.suite_id)
            .field("name", &self.name)
            .field("prio", &self.prio)
            .field("ncycles", &self.ncycles)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Descriptor of one package: an ordered list of suites.
#[derive(Debug, Clone)]
pub struct PackageAttr {
    pub name: String,
    pub ncycles: u32,
    pub suites: Vec<SuiteAttr>,
}

impl PackageAttr {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ncycles: 1,
            suites: Vec::new(),
        }
    }

    pub fn cycles(&self, only_once: bool) -> u32 {
        if only_once { 1 } else { self.ncycles.max(1) }
    }
}
