//! Daily maintenance: inactive-account cleanup and subscription refresh.
//! The server schedules both; the `lms` CLI runs them on demand.

pub mod cleanup;
pub mod scheduler;
pub mod subscriptions;

use serde::Serialize;

pub use cleanup::purge_inactive_users;
pub use scheduler::{next_run_after, spawn_daily_jobs};
pub use subscriptions::refresh_subscriptions;

/// Outcome of one batch. Per-item failures are counted, never fatal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Candidates that no longer qualified when their turn came
    pub skipped: usize,
}

impl JobReport {
    pub(crate) fn record(&mut self, ok: bool) {
        self.processed += 1;
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub(crate) fn skip(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_outcomes() {
        let mut report = JobReport::default();
        report.record(true);
        report.record(false);
        report.record(true);
        report.skip();
        assert_eq!(report, JobReport { processed: 4, succeeded: 2, failed: 1, skipped: 1 });
    }
}
