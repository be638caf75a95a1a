use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::model::filter::{Selection, parse_filter};
use crate::runner::executor::RunConfig;
use crate::runner::shared::Interrupt;

/// Output format for the final run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Yaml,
}

/// Run options for a downstream test harness binary.
///
/// This crate is a library; harnesses embed these arguments in their own
/// `main` (directly or via `#[command(flatten)]`), then map them onto the
/// engine with [`RunArgs::to_config`] and [`RunArgs::selection`].
#[derive(Debug, Parser)]
#[command(name = "rigor", about = "Hierarchical test execution engine")]
pub struct RunArgs {
    /// Skip every method with reason DRYRUN; bodies never run
    #[arg(long)]
    pub dry_run: bool,

    /// Run every package, suite, and method exactly once
    #[arg(long)]
    pub only_once: bool,

    /// Concurrent suites per package (capped at 8)
    #[arg(long, default_value_t = 1)]
    pub parallel: usize,

    /// Force sequential suites for step debugging
    #[arg(long)]
    pub step_debug: bool,

    /// Abort the whole run on the first unexpected error
    #[arg(long)]
    pub debug_on_error: bool,

    /// Abort the run when a reporter fails instead of logging on
    #[arg(long)]
    pub propagate_reporter_errors: bool,

    /// Tag filter, e.g. "smoke AND NOT slow"
    #[arg(long)]
    pub include: Option<String>,

    /// Minimum method level to include
    #[arg(long, default_value_t = 0)]
    pub level: u32,

    /// Package to run (repeatable; default all)
    #[arg(long = "package")]
    pub packages: Vec<String>,

    /// Emit the run report in this format at the end
    #[arg(long, value_enum)]
    pub report: Option<ReportFormat>,

    /// Root directory for package namespaces
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,

    /// Verbose engine logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunArgs {
    /// Map the parsed flags onto an engine configuration.
    pub fn to_config(&self) -> RunConfig {
        RunConfig {
            dry_run: self.dry_run,
            only_once: self.only_once,
            suite_concurrency: self.parallel,
            step_debug: self.step_debug,
            debug_on_error: self.debug_on_error,
            propagate_sink_errors: self.propagate_reporter_errors,
            base_dir: self.base_dir.clone(),
            ..RunConfig::default()
        }
    }

    /// Build the hierarchy selection from the filter flags.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid `--include` filter string.
    pub fn selection(&self) -> Result<Selection, String> {
        let tags = match &self.include {
            Some(filter) => Some(parse_filter(filter)?),
            None => None,
        };
        Ok(Selection {
            packages: if self.packages.is_empty() {
                None
            } else {
                Some(self.packages.clone())
            },
            min_level: self.level,
            tags,
        })
    }
}

/// Install the global tracing subscriber for engine diagnostics.
///
/// `RUST_LOG` overrides the default level. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Wire Ctrl-C to the engine's interrupt flag.
///
/// # Errors
///
/// Returns an error when the process-wide handler cannot be installed.
pub fn install_interrupt(interrupt: Interrupt) -> Result<(), String> {
    ctrlc::set_handler(move || interrupt.trigger()).map_err(|e| e.to_string())
}
