use crate::runner::report::RunReport;
use crate::state::StateCounter;

/// Emit a run report as YAML.
pub fn emit_run_yaml(report: &RunReport) -> String {
    serde_yaml::to_string(report).unwrap_or_else(|e| format!("# Error serializing report: {e}"))
}

/// Emit a run report as JSON.
pub fn emit_run_json(report: &RunReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|e| format!("{{ \"error\": \"{}\" }}", e))
}

/// Emit the flat per-state count lines from a run counter.
///
/// This is the minimal persisted summary contract: one `STATE: count` line
/// per non-zero state, severity order.
pub fn emit_state_counts(counter: &StateCounter) -> String {
    counter.counts_lines()
}
