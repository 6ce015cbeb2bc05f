//! Latency aggregation
//!
//! All samples are elapsed seconds as `f64`. Statistics are only produced
//! for non-empty sample sets, so an operation class with no successful
//! request is simply absent from reports.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Elapsed times of successful requests for one operation class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleSet {
    samples: Vec<f64>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, seconds: f64) {
        self.samples.push(seconds);
    }

    pub fn record_duration(&mut self, elapsed: Duration) {
        self.record(elapsed.as_secs_f64());
    }

    /// Append another set's samples after this one's
    pub fn merge(&mut self, other: SampleSet) {
        self.samples.extend(other.samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    pub fn summary(&self) -> Option<Summary> {
        Summary::from_samples(&self.samples)
    }
}

impl From<Vec<f64>> for SampleSet {
    fn from(samples: Vec<f64>) -> Self {
        Self { samples }
    }
}

/// Summary statistics over a sample set, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
    /// count / sum of elapsed times
    pub ops_per_sec: f64,
}

impl Summary {
    /// Reduce samples to summary statistics; `None` for an empty slice.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let total: f64 = sorted.iter().sum();

        Some(Self {
            count,
            mean: total / count as f64,
            median: median(&sorted),
            p99: p99(&sorted),
            min: sorted[0],
            max: sorted[count - 1],
            ops_per_sec: if total > 0.0 { count as f64 / total } else { 0.0 },
        })
    }
}

/// Middle value of a sorted, non-empty slice; the mean of the two middle
/// values for even lengths.
fn median(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[len / 2]
    }
}

/// `sorted[floor(0.99 * len)]` above 10 samples, otherwise the maximum.
fn p99(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    if len > 10 {
        let index = (len as f64 * 0.99) as usize;
        sorted[index.min(len - 1)]
    } else {
        sorted[len - 1]
    }
}

/// Successful requests per second of wall-clock time
pub fn throughput(successful: u64, total_time: f64) -> f64 {
    if total_time > 0.0 {
        successful as f64 / total_time
    } else {
        0.0
    }
}

/// Which endpoint won a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    First,
    Second,
}

/// What a comparison row measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Lower is better; values in seconds
    MeanLatency,
    /// Higher is better; values in requests per second
    Throughput,
}

/// One row of a cross-endpoint comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub operation: String,
    pub metric: Metric,
    pub first: f64,
    pub second: f64,
    /// How many times better the first endpoint is; 0 when undefined
    pub speedup: f64,
    pub faster: Side,
}

impl Comparison {
    /// Compare mean latencies: speedup = second / first.
    pub fn mean_latency(operation: impl Into<String>, first: f64, second: f64) -> Self {
        let speedup = if first > 0.0 { second / first } else { 0.0 };
        Self::new(operation.into(), Metric::MeanLatency, first, second, speedup)
    }

    /// Compare throughputs: speedup = first / second.
    pub fn throughput(operation: impl Into<String>, first: f64, second: f64) -> Self {
        let speedup = if second > 0.0 { first / second } else { 0.0 };
        Self::new(operation.into(), Metric::Throughput, first, second, speedup)
    }

    fn new(operation: String, metric: Metric, first: f64, second: f64, speedup: f64) -> Self {
        let faster = if speedup > 1.0 { Side::First } else { Side::Second };
        Self {
            operation,
            metric,
            first,
            second,
            speedup,
            faster,
        }
    }
}
