//! Command-line front end
//!
//! Runs the selected benchmarks against each selected endpoint in turn and
//! prints per-endpoint tables, then a comparison when both endpoints ran.
//!
//! ```bash
//! # Both endpoints, both modes, defaults from the environment
//! s3bench
//!
//! # Only the sequential run against one endpoint
//! s3bench --only first --mode sequential -n 20
//!
//! # Concurrent run with JSON output
//! s3bench --mode concurrent -c 64 --requests-per-worker 500 --format json
//! ```

pub mod args;
pub mod report;

use crate::bench::{
    BenchError, ConcurrentRunner, ConcurrentSettings, SequentialRunner, SequentialSettings,
};
use crate::config::{Config, EndpointConfig};
use crate::s3::{S3SignerV4, Transport};
use anyhow::{Context, Result};
use tracing::{info, warn};

pub use args::{Cli, OutputFormat};
pub use report::{Banner, BenchReport, ComparisonTable, EndpointReport};

/// Runs configured benchmarks over one shared transport
pub struct Benchmark {
    config: Config,
    transport: Transport,
    show_progress: bool,
}

impl Benchmark {
    /// Validates the configuration and builds the transport
    pub fn new(config: Config, show_progress: bool) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let signer = S3SignerV4::new(config.credentials())
            .with_query_canonicalization(config.query_canonicalization);
        let transport = Transport::new(signer, &config.transport_options())
            .context("Failed to build HTTP transport")?;

        Ok(Self {
            config,
            transport,
            show_progress,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the selected modes against one endpoint.
    ///
    /// A setup failure ends this endpoint's run and is recorded in the report.
    pub async fn run_endpoint(&self, endpoint: &EndpointConfig) -> EndpointReport {
        let mut report = EndpointReport::new(&endpoint.name, &endpoint.url);

        if let Err(e) = self.bench_endpoint(endpoint, &mut report).await {
            warn!(endpoint = %endpoint.name, error = %e, "benchmark aborted");
            report.error = Some(e.to_string());
        }
        report
    }

    async fn bench_endpoint(
        &self,
        endpoint: &EndpointConfig,
        report: &mut EndpointReport,
    ) -> Result<(), BenchError> {
        let target = endpoint
            .to_endpoint()
            .map_err(|e| BenchError::InvalidParameter(format!("{:#}", e)))?;
        let bench = &self.config.bench;

        if self.config.mode.sequential() {
            let settings = SequentialSettings {
                bucket: bench.bucket.clone(),
                iterations: bench.iterations,
                warmup_rounds: bench.warmup_rounds,
                show_progress: self.show_progress,
            };
            let results = SequentialRunner::new(&self.transport, &target, settings)
                .run()
                .await?;
            report.sequential = Some(results);
        }

        if self.config.mode.concurrent() {
            let settings = ConcurrentSettings {
                bucket: bench.bucket.clone(),
                concurrency: bench.concurrency,
                requests_per_worker: bench.requests_per_worker,
                object_size: bench.object_size,
                show_progress: self.show_progress,
            };
            let summary = ConcurrentRunner::new(self.transport.clone(), target, settings)
                .run()
                .await?;
            report.concurrent = Some(summary);
        }

        Ok(())
    }
}

/// Run every selected endpoint, compare, and print in the requested format.
///
/// Text output is printed per endpoint as it finishes; JSON is printed once
/// at the end. Fails before any request on invalid configuration, and after
/// the run when no endpoint could be benchmarked.
pub async fn run(config: Config, format: OutputFormat, show_progress: bool) -> Result<BenchReport> {
    let benchmark = Benchmark::new(config, show_progress)?;
    let text = format == OutputFormat::Text;

    info!(
        mode = ?benchmark.config().mode,
        target = ?benchmark.config().target,
        "starting s3bench"
    );

    let mut report = BenchReport::default();
    for endpoint in benchmark.config().selected_endpoints() {
        if text {
            print!(
                "{}",
                Banner {
                    name: &endpoint.name,
                    url: &endpoint.url,
                    iterations: benchmark.config().bench.iterations,
                }
            );
        }

        let result = benchmark.run_endpoint(endpoint).await;
        if text {
            print!("{}", result);
        }
        report.endpoints.push(result);
    }
    report.compare();

    match format {
        OutputFormat::Text => print!("{}", ComparisonTable(&report)),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    if report.endpoints.iter().all(|e| e.error.is_some()) {
        anyhow::bail!("no endpoint could be benchmarked");
    }
    Ok(report)
}
