use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

const DURATION_WINDOW: usize = 100;

/// Crawl counters in Prometheus text format.
pub struct MetricsCollector {
    crawls_submitted: AtomicU64,
    crawls_completed: AtomicU64,
    crawls_failed: AtomicU64,
    crawls_running: AtomicU64,
    /// Failures keyed by reason class ("exit", "launch", "validation", ...).
    failure_reasons: DashMap<&'static str, AtomicU64>,
    crawl_durations: std::sync::Mutex<VecDeque<u64>>, // last 100, in ms
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            crawls_submitted: AtomicU64::new(0),
            crawls_completed: AtomicU64::new(0),
            crawls_failed: AtomicU64::new(0),
            crawls_running: AtomicU64::new(0),
            failure_reasons: DashMap::new(),
            crawl_durations: std::sync::Mutex::new(VecDeque::with_capacity(DURATION_WINDOW)),
        }
    }

    pub fn record_submitted(&self) {
        self.crawls_submitted.fetch_add(1, Ordering::Relaxed);
        self.crawls_running.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, duration_ms: u64) {
        self.crawls_completed.fetch_add(1, Ordering::Relaxed);
        self.finish_running();

        let mut durations = self.crawl_durations.lock().unwrap_or_else(|p| p.into_inner());
        if durations.len() == DURATION_WINDOW {
            durations.pop_front();
        }
        durations.push_back(duration_ms);
    }

    pub fn record_failed(&self, reason: &'static str) {
        self.crawls_failed.fetch_add(1, Ordering::Relaxed);
        self.finish_running();
        self.failure_reasons
            .entry(reason)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn running(&self) -> u64 {
        self.crawls_running.load(Ordering::Relaxed)
    }

    fn finish_running(&self) {
        let _ = self
            .crawls_running
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Generate Prometheus-compatible metrics output
    pub fn export(&self) -> String {
        let mut output = String::new();

        counter(&mut output, "sfcrawl_crawls_submitted_total", "Total number of submitted crawls", &self.crawls_submitted);
        counter(&mut output, "sfcrawl_crawls_completed_total", "Total number of crawls that exited successfully", &self.crawls_completed);
        counter(&mut output, "sfcrawl_crawls_failed_total", "Total number of failed crawls", &self.crawls_failed);

        output.push_str("# HELP sfcrawl_crawls_running Crawls currently running\n");
        output.push_str("# TYPE sfcrawl_crawls_running gauge\n");
        output.push_str(&format!("sfcrawl_crawls_running {}\n\n", self.running()));

        output.push_str("# HELP sfcrawl_crawl_failures_total Failed crawls by reason\n");
        output.push_str("# TYPE sfcrawl_crawl_failures_total counter\n");
        let mut reasons: Vec<(&'static str, u64)> = self
            .failure_reasons
            .iter()
            .map(|e| (*e.key(), e.value().load(Ordering::Relaxed)))
            .collect();
        reasons.sort_unstable();
        for (reason, count) in reasons {
            output.push_str(&format!("sfcrawl_crawl_failures_total{{reason=\"{}\"}} {}\n", reason, count));
        }
        output.push('\n');

        let mut durations: Vec<u64> = self
            .crawl_durations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .copied()
            .collect();
        output.push_str("# HELP sfcrawl_crawl_duration_ms Successful crawl duration percentiles\n");
        output.push_str("# TYPE sfcrawl_crawl_duration_ms gauge\n");
        if !durations.is_empty() {
            durations.sort_unstable();
            for (label, p) in [("0.5", 50.0), ("0.95", 95.0), ("0.99", 99.0)] {
                output.push_str(&format!(
                    "sfcrawl_crawl_duration_ms{{quantile=\"{}\"}} {}\n",
                    label,
                    percentile(&durations, p)
                ));
            }
        }

        output
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn counter(output: &mut String, name: &str, help: &str, value: &AtomicU64) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} counter\n", name));
    output.push_str(&format!("{} {}\n\n", name, value.load(Ordering::Relaxed)));
}

fn percentile(sorted_data: &[u64], p: f64) -> u64 {
    if sorted_data.is_empty() {
        return 0;
    }
    let index = ((p / 100.0) * (sorted_data.len() as f64 - 1.0)).round() as usize;
    sorted_data[index.min(sorted_data.len() - 1)]
}
