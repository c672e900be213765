//! Counters and run-time histogram for an executor.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Executor metrics collector
#[derive(Debug)]
pub struct Metrics {
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_canceled: AtomicU64,

    busy_time_ns: AtomicU64,

    // body run time
    run_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        // 3 significant figures, max value of 1 hour in nanoseconds
        let histogram = Histogram::new_with_max(3_600_000_000_000, 3)
            .expect("Failed to create histogram");

        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_canceled: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
            run_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_canceled(&self) {
        self.tasks_canceled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one body execution
    pub fn record_run(&self, duration: Duration) {
        let duration_ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.busy_time_ns.fetch_add(duration_ns, Ordering::Relaxed);

        if let Some(mut hist) = self.run_histogram.try_write() {
            let _ = hist.record(duration_ns);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.run_histogram.read();

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_canceled: self.tasks_canceled.load(Ordering::Relaxed),
            busy_time_ns: self.busy_time_ns.load(Ordering::Relaxed),
            avg_run_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_run_ns: histogram.value_at_quantile(0.50),
            p99_run_ns: histogram.value_at_quantile(0.99),
            max_run_ns: histogram.max(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_canceled: u64,
    pub busy_time_ns: u64,
    pub avg_run_ns: u64,
    pub p50_run_ns: u64,
    pub p99_run_ns: u64,
    pub max_run_ns: u64,
}

impl MetricsSnapshot {
    /// Tasks whose body ran to an outcome.
    pub fn tasks_executed(&self) -> u64 {
        self.tasks_completed + self.tasks_failed
    }

    pub fn tasks_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.tasks_executed() as f64 / seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new();

        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_completed();
        metrics.record_failed();
        metrics.record_run(Duration::from_micros(1));
        metrics.record_run(Duration::from_micros(2));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_submitted, 2);
        assert_eq!(snapshot.tasks_executed(), 2);
        assert_eq!(snapshot.tasks_canceled, 0);
        assert!(snapshot.avg_run_ns > 0);
        assert_eq!(snapshot.busy_time_ns, 3_000);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.avg_run_ns, 0);
        assert_eq!(snapshot.max_run_ns, 0);
    }
}
