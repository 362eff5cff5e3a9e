//! Miner statistics

use crate::utils::{compute_hash_rate, format_hash_rate};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Interval between hash-rate log lines
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Counters accumulated by one mining run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinerStats {
    /// Checksums computed
    pub attempts: u64,
    /// Blocks sent to the coordinator
    pub submissions: u64,
    /// Targets abandoned for a newer one
    pub preemptions: u64,
    /// Further solutions for a target that already had one sent
    pub duplicates: u64,
    /// Wall time spent mining
    pub elapsed: Duration,
}

impl MinerStats {
    /// Average hashes per second
    pub fn hash_rate(&self) -> f64 {
        compute_hash_rate(self.attempts, self.elapsed)
    }
}

impl fmt::Display for MinerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempts, {} submissions, {} duplicates, {} preemptions in {:.1}s ({})",
            self.attempts,
            self.submissions,
            self.duplicates,
            self.preemptions,
            self.elapsed.as_secs_f64(),
            format_hash_rate(self.hash_rate())
        )
    }
}

/// Periodic hash-rate logger
#[derive(Debug)]
pub(crate) struct RateReporter {
    last_report: Instant,
    attempts_at_last_report: u64,
}

impl RateReporter {
    pub(crate) fn new() -> Self {
        Self {
            last_report: Instant::now(),
            attempts_at_last_report: 0,
        }
    }

    /// Log the rate since the previous report once the interval has passed
    pub(crate) fn tick(&mut self, miner: u32, attempts: u64) {
        let elapsed = self.last_report.elapsed();
        if elapsed < REPORT_INTERVAL {
            return;
        }

        let rate = compute_hash_rate(attempts - self.attempts_at_last_report, elapsed);
        debug!(
            "Miner #{} - Hash rate: {}, total attempts: {}",
            miner,
            format_hash_rate(rate),
            attempts
        );
        self.last_report = Instant::now();
        self.attempts_at_last_report = attempts;
    }
}
