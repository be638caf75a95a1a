use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Cross-thread tracker of method invocation units completed so far.
///
/// The total is precomputed from the selected hierarchy before the run
/// starts (package cycles × suite cycles × method count). Increments are
/// atomic, so concurrent suite workers never lose or duplicate a tick;
/// percent reads never block.
#[derive(Debug)]
pub struct Progress {
    invoked: AtomicU64,
    total: u64,
    started: Instant,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Self {
            invoked: AtomicU64::new(0),
            total,
            started: Instant::now(),
        }
    }

    /// Record one completed method invocation unit; returns the new count.
    pub fn record_invocation(&self) -> u64 {
        self.invoked.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn invoked(&self) -> u64 {
        self.invoked.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Percent of the total invoked so far; 100 when the total is zero.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.invoked() as f64 * 100.0 / self.total as f64
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let progress = Progress::new(10);
        assert_eq!(progress.invoked(), 0);
        assert_eq!(progress.total(), 10);
        assert_eq!(progress.percent(), 0.0);
    }

    #[test]
    fn records_invocations() {
        let progress = Progress::new(4);
        assert_eq!(progress.record_invocation(), 1);
        assert_eq!(progress.record_invocation(), 2);
        assert_eq!(progress.invoked(), 2);
        assert_eq!(progress.percent(), 50.0);
    }

    #[test]
    fn empty_total_reads_complete() {
        let progress = Progress::new(0);
        assert_eq!(progress.percent(), 100.0);
    }

    #[test]
    fn concurrent_increments_are_exact() {
        let progress = Progress::new(400);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        progress.record_invocation();
                    }
                });
            }
        });
        assert_eq!(progress.invoked(), 400);
        assert_eq!(progress.percent(), 100.0);
    }
}
