use std::path::{Path, PathBuf};

/// Per-package-cycle execution context.
///
/// Built exactly once per package-cycle before any of its suites start and
/// passed by reference into every suite worker. This replaces any ambient
/// process-wide working-directory state, which would race under concurrent
/// suite execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageContext {
    pub package: String,
    pub cycle: u32,
    /// Namespace directory for the package, under the run's base dir.
    pub workdir: PathBuf,
}

impl PackageContext {
    pub fn new(base_dir: &Path, package: &str, cycle: u32) -> Self {
        Self {
            package: package.to_owned(),
            cycle,
            workdir: base_dir.join(package),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Qualified name for a suite/method under this package.
    pub fn qualify(&self, suite: &str, method: &str) -> String {
        format!("{}/{suite}/{method}", self.package)
    }
}
