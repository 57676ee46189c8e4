//! Periodic run status logging.

use std::time::{Duration, Instant};

use tracing::info;

/// Logs the number of finished events at most once per period.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    total: Option<u64>,
    period: Duration,
    finished: u64,
    started: Instant,
    last_report: Instant,
}

impl ProgressReporter {
    /// Start reporting. Logs the expected total immediately.
    ///
    /// A non-finite or negative period is treated as zero, which reports
    /// after every event.
    pub fn start(total: Option<u64>, period_s: f64) -> Self {
        let period = Duration::try_from_secs_f64(period_s).unwrap_or(Duration::ZERO);
        match total {
            Some(total) => info!(total_events = total, "Run started"),
            None => info!("Run started"),
        }
        let now = Instant::now();
        Self {
            total,
            period,
            finished: 0,
            started: now,
            last_report: now,
        }
    }

    /// Count one finished event, logging if the period has elapsed.
    ///
    /// Returns whether a status line was logged.
    pub fn event_finished(&mut self) -> bool {
        self.finished = self.finished.saturating_add(1);
        let now = Instant::now();
        if now.duration_since(self.last_report) < self.period {
            return false;
        }
        self.last_report = now;
        info!(
            finished = self.finished,
            total = ?self.total,
            elapsed_s = now.duration_since(self.started).as_secs_f64(),
            "Run status"
        );
        true
    }

    /// Events finished so far.
    pub const fn finished(&self) -> u64 {
        self.finished
    }

    /// Reporting period.
    pub const fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_reports_every_event() {
        let mut progress = ProgressReporter::start(Some(2), 0.0);
        assert!(progress.event_finished());
        assert!(progress.event_finished());
        assert_eq!(progress.finished(), 2);
    }

    #[test]
    fn long_period_stays_quiet() {
        let mut progress = ProgressReporter::start(None, 3600.0);
        assert!(!progress.event_finished());
        assert_eq!(progress.finished(), 1);
    }

    #[test]
    fn invalid_period_is_zero() {
        assert_eq!(ProgressReporter::start(None, -1.0).period(), Duration::ZERO);
        assert_eq!(ProgressReporter::start(None, f64::NAN).period(), Duration::ZERO);
    }
}
