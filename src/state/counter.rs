use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::state::status::Status;

/// One recorded state transition: what happened, how many times, and when.
///
/// `elapsed` is measured from the previous lap's end timestamp, or from
/// counter construction for the first lap.
#[derive(Debug, Clone, PartialEq)]
pub struct Lap {
    pub state: Status,
    pub qty: u64,
    pub elapsed: Duration,
    pub reason: String,
    pub description: String,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Per-scope counter of outcome states with a time-ordered lap journal.
///
/// Every level of the run (test, suite, package, run) owns one of these.
/// Counts and reason histograms merge associatively and commutatively, so
/// concurrent suite results can be folded upward in any order.
#[derive(Debug, Clone)]
pub struct StateCounter {
    counts: BTreeMap<Status, u64>,
    reasons: BTreeMap<Status, BTreeMap<String, u64>>,
    laps: Vec<Lap>,
    begin: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    last_state: Option<Status>,
    consecutive: u64,
}

impl StateCounter {
    pub fn new() -> Self {
        Self::new_at(Utc::now())
    }

    /// Construct with an explicit begin timestamp (deterministic journals).
    pub fn new_at(begin: DateTime<Utc>) -> Self {
        Self {
            counts: BTreeMap::new(),
            reasons: BTreeMap::new(),
            laps: Vec::new(),
            begin,
            end: None,
            last_state: None,
            consecutive: 0,
        }
    }

    /// Record one occurrence of `state` now.
    pub fn inc(&mut self, state: Status, reason: &str, description: &str) {
        self.inc_at(state, reason, description, 1, None, Utc::now());
    }

    /// Record `qty` occurrences of `state` now.
    pub fn inc_qty(&mut self, state: Status, reason: &str, description: &str, qty: u64) {
        self.inc_at(state, reason, description, qty, None, Utc::now());
    }

    /// Record a state transition with full detail at an explicit timestamp.
    ///
    /// A `qty` of zero is a no-op, not an error; call sites increment
    /// conditionally and rely on that.
    pub fn inc_at(
        &mut self,
        state: Status,
        reason: &str,
        description: &str,
        qty: u64,
        error: Option<String>,
        at: DateTime<Utc>,
    ) {
        if qty == 0 {
            return;
        }

        let previous = self.laps.last().map_or(self.begin, |lap| lap.at);
        let elapsed = (at - previous).to_std().unwrap_or_default();

        *self.counts.entry(state).or_insert(0) += qty;
        if !reason.is_empty() {
            *self
                .reasons
                .entry(state)
                .or_default()
                .entry(reason.to_owned())
                .or_insert(0) += qty;
        }
        self.laps.push(Lap {
            state,
            qty,
            elapsed,
            reason: reason.to_owned(),
            description: description.to_owned(),
            error,
            at,
        });

        if self.last_state == Some(state) {
            self.consecutive += qty;
        } else {
            self.last_state = Some(state);
            self.consecutive = qty;
        }
    }

    /// Fold another counter into this one.
    ///
    /// Counts and reason histograms add; lap journals merge by end
    /// timestamp; the begin/end window extends to the union of both.
    pub fn merge(&mut self, other: &StateCounter) {
        for (state, qty) in &other.counts {
            *self.counts.entry(*state).or_insert(0) += qty;
        }
        for (state, histogram) in &other.reasons {
            let target = self.reasons.entry(*state).or_default();
            for (reason, qty) in histogram {
                *target.entry(reason.clone()).or_insert(0) += qty;
            }
        }

        // Both journals are already chronological; a stable sort after
        // concatenation keeps equal timestamps in self-then-other order.
        self.laps.extend(other.laps.iter().cloned());
        self.laps.sort_by_key(|lap| lap.at);

        self.begin = self.begin.min(other.begin);
        self.end = match (self.end, other.end) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        // Consecutive tracking restarts from the merged journal's tail.
        self.last_state = self.laps.last().map(|lap| lap.state);
        self.consecutive = match self.last_state {
            Some(state) => self
                .laps
                .iter()
                .rev()
                .take_while(|lap| lap.state == state)
                .map(|lap| lap.qty)
                .sum(),
            None => 0,
        };
    }

    pub fn count(&self, state: Status) -> u64 {
        self.counts.get(&state).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Share of `state` in the total, in percent. Zero when empty.
    pub fn percent(&self, state: Status) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.count(state) as f64 * 100.0 / total as f64
        }
    }

    /// Whether every recorded occurrence is `state` (false when empty).
    pub fn all(&self, state: Status) -> bool {
        let total = self.total();
        total > 0 && self.count(state) == total
    }

    /// Whether at least one occurrence of `state` was recorded.
    pub fn any(&self, state: Status) -> bool {
        self.count(state) > 0
    }

    /// The most severe state with a non-zero count, with its most
    /// informative reason: the last reason recorded for that state,
    /// falling back to the most frequent one. `None` when empty.
    pub fn state_by_severity(&self) -> Option<(Status, String)> {
        let state = Status::SEVERITY
            .into_iter()
            .find(|state| self.count(*state) > 0)?;
        Some((state, self.reason_of(state)))
    }

    /// The representative reason for `state`: last recorded, else most
    /// frequent (ties broken lexicographically), else empty.
    pub fn reason_of(&self, state: Status) -> String {
        if let Some(lap) = self
            .laps
            .iter()
            .rev()
            .find(|lap| lap.state == state && !lap.reason.is_empty())
        {
            return lap.reason.clone();
        }
        self.reasons
            .get(&state)
            .and_then(|histogram| {
                histogram
                    .iter()
                    .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                    .map(|(reason, _)| reason.clone())
            })
            .unwrap_or_default()
    }

    /// Occurrence histogram of reasons recorded for `state`.
    pub fn reasons_of(&self, state: Status) -> BTreeMap<String, u64> {
        self.reasons.get(&state).cloned().unwrap_or_default()
    }

    /// The chronological lap journal, optionally filtered to one state.
    pub fn timed_laps(&self, state: Option<Status>) -> Vec<&Lap> {
        self.laps
            .iter()
            .filter(|lap| state.is_none_or(|s| lap.state == s))
            .collect()
    }

    pub fn last_state(&self) -> Option<Status> {
        self.last_state
    }

    /// Length of the current run of identical trailing states.
    pub fn consecutive(&self) -> u64 {
        self.consecutive
    }

    pub fn begin(&self) -> DateTime<Utc> {
        self.begin
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Total wall time covered by this counter.
    ///
    /// The first call fixes the end timestamp; later calls return the same
    /// value without advancing it.
    pub fn duration(&mut self) -> Duration {
        let end = *self.end.get_or_insert_with(Utc::now);
        (end - self.begin).to_std().unwrap_or_default()
    }

    /// Flat `STATE: count` export, non-zero states in severity order.
    pub fn counts_lines(&self) -> String {
        let mut out = String::new();
        for state in Status::SEVERITY {
            let count = self.count(state);
            if count > 0 {
                let _ = writeln!(out, "{state}: {count}");
            }
        }
        out
    }
}

impl Default for StateCounter {
    fn default() -> Self {
        Self::new()
    }
}
