// Performance monitoring: processing-latency window and the periodic
// metrics sampler consumed by operators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

/// Bounded ring of the most recent processing-latency samples (milliseconds).
/// Oldest sample evicted on overflow.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: std::collections::VecDeque<f64>,
    capacity: usize,
}

pub const LATENCY_WINDOW_CAPACITY: usize = 100;

impl LatencyWindow {
    pub fn new() -> Self {
        Self::with_capacity(LATENCY_WINDOW_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: std::collections::VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, latency_ms: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
    }

    /// Average over the retained window; 0.0 when empty
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics over one metric's retained values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricStats {
    pub last: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p95: f64,
    pub p99: f64,
}

type MetricFn = Box<dyn Fn() -> f64 + Send + Sync>;

struct MetricSeries {
    callback: MetricFn,
    values: Vec<f64>,
}

const MAX_SERIES_LEN: usize = 1000;

/// Polls registered numeric callbacks on a timer and reports rolling
/// statistics through the log.
pub struct MetricsSampler {
    metrics: Arc<Mutex<HashMap<String, MetricSeries>>>,
}

impl MetricsSampler {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a metric to be sampled each cycle
    pub fn register<F>(&self, name: &str, callback: F)
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        let mut metrics = self.metrics.lock().unwrap();
        if metrics.contains_key(name) {
            warn!(metric = name, "Metric already registered, replacing");
        }
        metrics.insert(
            name.to_string(),
            MetricSeries {
                callback: Box::new(callback),
                values: Vec::new(),
            },
        );
    }

    /// Poll every registered callback once
    pub fn sample_once(&self) {
        let mut metrics = self.metrics.lock().unwrap();
        for series in metrics.values_mut() {
            let value = (series.callback)();
            series.values.push(value);
            if series.values.len() > MAX_SERIES_LEN {
                series.values.remove(0);
            }
        }
    }

    /// Statistics for one metric over its retained values
    pub fn stats(&self, name: &str) -> Option<MetricStats> {
        let metrics = self.metrics.lock().unwrap();
        let series = metrics.get(name)?;
        if series.values.is_empty() {
            return None;
        }

        let mut sorted = series.values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let avg = sorted.iter().sum::<f64>() / sorted.len() as f64;

        Some(MetricStats {
            last: *series.values.last().unwrap(),
            min,
            max,
            avg,
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        })
    }

    fn report(&self) {
        let metrics = self.metrics.lock().unwrap();
        let names: Vec<String> = metrics.keys().cloned().collect();
        drop(metrics);

        info!("Performance report:");
        for name in names {
            if let Some(stats) = self.stats(&name) {
                info!(
                    metric = %name,
                    last = stats.last,
                    min = stats.min,
                    max = stats.max,
                    avg = stats.avg,
                    p95 = stats.p95,
                    p99 = stats.p99,
                    "metric stats"
                );
            }
        }
    }

    /// Sampling loop; run as a background task
    pub async fn run(self: Arc<Self>, report_interval: Duration) {
        let mut ticker = interval(report_interval);
        loop {
            ticker.tick().await;
            self.sample_once();
            self.report();
        }
    }
}

impl Default for MetricsSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest-rank percentile over a pre-sorted slice
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
