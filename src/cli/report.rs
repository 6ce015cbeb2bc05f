//! Result tables and the serializable report

use crate::bench::concurrent::CONCURRENT_GET;
use crate::bench::{Comparison, ConcurrentSummary, Metric, SequentialResults, Side, Summary};
use serde::Serialize;
use std::fmt;

const RULE_WIDTH: usize = 60;

/// Everything measured for one endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndpointReport {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential: Option<SequentialResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrent: Option<ConcurrentSummary>,
    /// Setup failure that stopped this endpoint's run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EndpointReport {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Full result of one invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BenchReport {
    pub endpoints: Vec<EndpointReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comparisons: Vec<Comparison>,
}

impl BenchReport {
    /// Fill `comparisons` when exactly two endpoints produced results
    pub fn compare(&mut self) {
        self.comparisons.clear();
        let [first, second] = self.endpoints.as_slice() else {
            return;
        };

        if let (Some(a), Some(b)) = (&first.sequential, &second.sequential) {
            self.comparisons.extend(a.compare(b));
        }
        if let (Some(a), Some(b)) = (&first.concurrent, &second.concurrent) {
            self.comparisons
                .push(Comparison::throughput(CONCURRENT_GET, a.throughput, b.throughput));
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn ms(seconds: f64) -> f64 {
    seconds * 1000.0
}

fn rule(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    writeln!(f, "{}", c.to_string().repeat(RULE_WIDTH))
}

fn heading(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    rule(f, '=')?;
    writeln!(f, "{}", title)?;
    rule(f, '=')
}

/// Banner printed before an endpoint's run starts
pub struct Banner<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub iterations: usize,
}

impl fmt::Display for Banner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        rule(f, '=')?;
        writeln!(f, "Benchmarking: {}", self.name)?;
        writeln!(f, "Endpoint: {}", self.url)?;
        writeln!(f, "Iterations: {}", self.iterations)?;
        rule(f, '=')
    }
}

impl fmt::Display for EndpointReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error) = &self.error {
            return writeln!(f, "{} benchmark failed: {}", self.name, error);
        }

        if let Some(sequential) = &self.sequential {
            heading(f, &format!("Results: {}", self.name))?;
            writeln!(
                f,
                "{:<15} {:>10} {:>10} {:>10} {:>10} {:>8}",
                "Operation", "Mean", "Median", "P99", "Ops/sec", "Failed"
            )?;
            rule(f, '-')?;
            for class in &sequential.operations {
                match class.summary() {
                    Some(s) => writeln!(
                        f,
                        "{:<15} {:>8.2}ms {:>8.2}ms {:>8.2}ms {:>10.1} {:>8}",
                        class.operation,
                        ms(s.mean),
                        ms(s.median),
                        ms(s.p99),
                        s.ops_per_sec,
                        class.failures
                    )?,
                    None if class.failures > 0 => writeln!(
                        f,
                        "{:<15} {:>10} {:>10} {:>10} {:>10} {:>8}",
                        class.operation, "-", "-", "-", "-", class.failures
                    )?,
                    None => {}
                }
            }
        }

        if let Some(concurrent) = &self.concurrent {
            heading(f, &format!("Concurrent GET: {}", self.name))?;
            write_concurrent(f, concurrent)?;
        }

        Ok(())
    }
}

fn write_concurrent(f: &mut fmt::Formatter<'_>, c: &ConcurrentSummary) -> fmt::Result {
    writeln!(
        f,
        "Workers: {}  Requests/worker: {}  Object size: {} bytes",
        c.concurrency, c.requests_per_worker, c.object_size
    )?;
    writeln!(
        f,
        "Requests: {} total, {} ok, {} failed",
        c.total_requests, c.successful, c.failed
    )?;
    writeln!(f, "Total time: {:.2}s", c.total_time)?;
    writeln!(f, "Throughput: {:.1} req/s", c.throughput)?;

    let Some(Summary {
        mean,
        median,
        p99,
        min,
        max,
        ..
    }) = c.latency
    else {
        return writeln!(f, "Latency: no successful requests");
    };
    writeln!(
        f,
        "{:>10} {:>10} {:>10} {:>10} {:>10}",
        "Mean", "Median", "P99", "Min", "Max"
    )?;
    rule(f, '-')?;
    writeln!(
        f,
        "{:>8.2}ms {:>8.2}ms {:>8.2}ms {:>8.2}ms {:>8.2}ms",
        ms(mean),
        ms(median),
        ms(p99),
        ms(min),
        ms(max)
    )
}

/// Comparison table between the two endpoints of a report
pub struct ComparisonTable<'a>(pub &'a BenchReport);

impl fmt::Display for ComparisonTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let [first, second] = report.endpoints.as_slice() else {
            return Ok(());
        };
        if report.comparisons.is_empty() {
            return Ok(());
        }

        heading(f, &format!("Comparison ({} vs {})", first.name, second.name))?;
        writeln!(
            f,
            "{:<15} {:>12} {:>12} {:>10}",
            "Operation", first.name, second.name, "Speedup"
        )?;
        rule(f, '-')?;

        for row in &report.comparisons {
            let winner = match row.faster {
                Side::First => &first.name,
                Side::Second => &second.name,
            };
            match row.metric {
                Metric::MeanLatency => writeln!(
                    f,
                    "{:<15} {:>10.2}ms {:>10.2}ms {:>8.2}x ({})",
                    row.operation,
                    ms(row.first),
                    ms(row.second),
                    row.speedup,
                    winner
                )?,
                Metric::Throughput => writeln!(
                    f,
                    "{:<15} {:>10.1}/s {:>10.1}/s {:>8.2}x ({})",
                    row.operation, row.first, row.second, row.speedup, winner
                )?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{OperationSamples, SampleSet};

    fn sequential(put_1kb: Vec<f64>, failures: u64) -> SequentialResults {
        SequentialResults {
            operations: vec![
                OperationSamples {
                    operation: "put_1kb".to_string(),
                    samples: SampleSet::from(put_1kb),
                    failures,
                },
                OperationSamples::new("list"),
            ],
        }
    }

    fn concurrent(throughput: f64) -> ConcurrentSummary {
        ConcurrentSummary {
            concurrency: 2,
            requests_per_worker: 2,
            object_size: 4096,
            total_requests: 4,
            successful: 4,
            failed: 0,
            total_time: 1.0,
            throughput,
            latency: Summary::from_samples(&[0.001, 0.002, 0.003, 0.004]),
        }
    }

    fn endpoint(name: &str, seq: SequentialResults, conc: ConcurrentSummary) -> EndpointReport {
        EndpointReport {
            sequential: Some(seq),
            concurrent: Some(conc),
            ..EndpointReport::new(name, "http://localhost:9000")
        }
    }

    #[test]
    fn test_compare_two_endpoints() {
        let mut report = BenchReport {
            endpoints: vec![
                endpoint("zs3", sequential(vec![0.001], 0), concurrent(400.0)),
                endpoint("rustfs", sequential(vec![0.003], 0), concurrent(100.0)),
            ],
            comparisons: Vec::new(),
        };
        report.compare();

        assert_eq!(report.comparisons.len(), 2);
        assert_eq!(report.comparisons[0].operation, "put_1kb");
        assert!((report.comparisons[0].speedup - 3.0).abs() < 1e-9);
        assert_eq!(report.comparisons[1].operation, CONCURRENT_GET);
        assert_eq!(report.comparisons[1].speedup, 4.0);
        assert_eq!(report.comparisons[1].faster, Side::First);
    }

    #[test]
    fn test_no_comparison_with_failed_endpoint() {
        let mut failed = EndpointReport::new("rustfs", "http://localhost:9001");
        failed.error = Some("status 403".to_string());
        let mut report = BenchReport {
            endpoints: vec![
                endpoint("zs3", sequential(vec![0.001], 0), concurrent(400.0)),
                failed,
            ],
            comparisons: Vec::new(),
        };
        report.compare();
        assert!(report.comparisons.is_empty());
        assert_eq!(ComparisonTable(&report).to_string(), "");
    }

    #[test]
    fn test_results_table() {
        let report = endpoint("zs3", sequential(vec![0.001, 0.003], 1), concurrent(400.0));
        let text = report.to_string();

        assert!(text.contains("Results: zs3"));
        assert!(text.contains("Operation             Mean     Median        P99    Ops/sec   Failed"));
        assert!(text.contains("put_1kb             2.00ms     2.00ms     3.00ms      500.0        1"));
        // Class with neither samples nor failures is left out
        assert!(!text.contains("list"));
        assert!(text.contains("Throughput: 400.0 req/s"));
    }

    #[test]
    fn test_failed_class_row() {
        let report = EndpointReport {
            sequential: Some(sequential(Vec::new(), 3)),
            ..EndpointReport::new("zs3", "http://localhost:9000")
        };
        let text = report.to_string();
        assert!(text.contains("put_1kb                  -          -          -          -        3"));
    }

    #[test]
    fn test_error_report() {
        let mut report = EndpointReport::new("rustfs", "http://localhost:9001");
        report.error = Some("bucket rejected".to_string());
        assert_eq!(report.to_string(), "rustfs benchmark failed: bucket rejected\n");
    }

    #[test]
    fn test_comparison_table() {
        let mut report = BenchReport {
            endpoints: vec![
                endpoint("zs3", sequential(vec![0.001], 0), concurrent(100.0)),
                endpoint("rustfs", sequential(vec![0.002], 0), concurrent(300.0)),
            ],
            comparisons: Vec::new(),
        };
        report.compare();
        let text = ComparisonTable(&report).to_string();

        assert!(text.contains("Comparison (zs3 vs rustfs)"));
        assert!(text.contains("put_1kb               1.00ms       2.00ms     2.00x (zs3)"));
        assert!(text.contains("concurrent_get       100.0/s      300.0/s     0.33x (rustfs)"));
    }

    #[test]
    fn test_json_shape() {
        let mut report = BenchReport {
            endpoints: vec![endpoint("zs3", sequential(vec![0.001], 0), concurrent(100.0))],
            comparisons: Vec::new(),
        };
        report.compare();
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["endpoints"][0]["name"], "zs3");
        assert_eq!(
            value["endpoints"][0]["sequential"]["operations"][0]["samples"],
            serde_json::json!([0.001])
        );
        assert_eq!(value["endpoints"][0]["concurrent"]["throughput"], 100.0);
        assert!(value["endpoints"][0].get("error").is_none());
        assert!(value.get("comparisons").is_none());
    }
}
