//! Concurrent GET benchmark
//!
//! `concurrency` workers each issue `requests_per_worker` GETs against a
//! pre-populated set of `concurrency` objects. Worker `w` sends its i-th
//! request to object `(w + i) % concurrency`, so workers overlap on keys
//! instead of owning one each.
//!
//! Workers keep their latencies and failure counts to themselves and hand
//! them back on join. The only shared state inside the timed window is an
//! atomic request counter that feeds the progress bar.

use crate::bench::stats::{throughput, SampleSet, Summary};
use crate::bench::{create_bucket, delete_bucket, timed_send, BenchError};
use crate::s3::{Endpoint, Transport};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use hyper::Method;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Operation name used in comparisons
pub const CONCURRENT_GET: &str = "concurrent_get";

/// Parallel deletes during teardown
const TEARDOWN_PARALLELISM: usize = 16;

/// Parameters of a concurrent run
#[derive(Debug, Clone)]
pub struct ConcurrentSettings {
    pub bucket: String,
    pub concurrency: usize,
    pub requests_per_worker: usize,
    /// Size in bytes of every provisioned object
    pub object_size: usize,
    /// Draw a progress bar on stderr during the timed phase
    pub show_progress: bool,
}

/// What one worker observed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerOutcome {
    /// Elapsed seconds of each verified GET
    pub latencies: Vec<f64>,
    pub failures: u64,
}

/// Result of a concurrent run; latencies in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrentSummary {
    pub concurrency: usize,
    pub requests_per_worker: usize,
    pub object_size: usize,
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    /// Wall-clock seconds for the whole timed phase
    pub total_time: f64,
    /// successful / total_time
    pub throughput: f64,
    /// Absent when no request succeeded
    pub latency: Option<Summary>,
}

impl ConcurrentSummary {
    /// Merge per-worker outcomes once every worker has finished
    pub fn from_outcomes(
        settings: &ConcurrentSettings,
        outcomes: Vec<WorkerOutcome>,
        total_time: Duration,
    ) -> Self {
        let mut latencies =
            SampleSet::with_capacity(settings.concurrency * settings.requests_per_worker);
        let mut failed = 0;
        for outcome in outcomes {
            latencies.merge(SampleSet::from(outcome.latencies));
            failed += outcome.failures;
        }

        let successful = latencies.len() as u64;
        let total_time = total_time.as_secs_f64();

        Self {
            concurrency: settings.concurrency,
            requests_per_worker: settings.requests_per_worker,
            object_size: settings.object_size,
            total_requests: successful + failed,
            successful,
            failed,
            total_time,
            throughput: throughput(successful, total_time),
            latency: latencies.summary(),
        }
    }
}

/// Object index targeted by `worker`'s `request`-th GET
pub fn target_index(worker: usize, request: usize, concurrency: usize) -> usize {
    (worker + request) % concurrency
}

pub fn object_key(index: usize) -> String {
    format!("concurrent_{}", index)
}

/// Drives the concurrent phase against one endpoint
pub struct ConcurrentRunner {
    transport: Transport,
    endpoint: Endpoint,
    settings: ConcurrentSettings,
}

impl ConcurrentRunner {
    pub fn new(transport: Transport, endpoint: Endpoint, settings: ConcurrentSettings) -> Self {
        Self {
            transport,
            endpoint,
            settings,
        }
    }

    pub async fn run(&self) -> Result<ConcurrentSummary, BenchError> {
        let concurrency = self.settings.concurrency;
        let requests_per_worker = self.settings.requests_per_worker;
        if concurrency == 0 {
            return Err(BenchError::InvalidParameter("concurrency must be at least 1".into()));
        }
        if requests_per_worker == 0 {
            return Err(BenchError::InvalidParameter(
                "requests per worker must be at least 1".into(),
            ));
        }

        info!(
            endpoint = %self.endpoint.name,
            concurrency,
            requests_per_worker,
            object_size = self.settings.object_size,
            "starting concurrent benchmark"
        );

        create_bucket(&self.transport, &self.endpoint, &self.settings.bucket).await?;

        let urls: Arc<Vec<String>> = Arc::new(
            (0..concurrency)
                .map(|i| self.endpoint.object_url(&self.settings.bucket, &object_key(i)))
                .collect(),
        );
        self.populate(&urls).await;

        let total = (concurrency * requests_per_worker) as u64;
        let progress = Arc::new(AtomicU64::new(0));
        let reporter = ProgressReporter::start(progress.clone(), total, self.settings.show_progress);

        // Scatter
        let started = Instant::now();
        let handles: Vec<JoinHandle<WorkerOutcome>> = (0..concurrency)
            .map(|worker| {
                tokio::spawn(run_worker(
                    self.transport.clone(),
                    urls.clone(),
                    self.endpoint.host.clone(),
                    worker,
                    requests_per_worker,
                    self.settings.object_size,
                    progress.clone(),
                ))
            })
            .collect();

        let outcomes = gather(handles, requests_per_worker).await;
        let total_time = started.elapsed();
        reporter.finish().await;

        let summary = ConcurrentSummary::from_outcomes(&self.settings, outcomes, total_time);
        info!(
            endpoint = %self.endpoint.name,
            successful = summary.successful,
            failed = summary.failed,
            throughput = summary.throughput,
            "concurrent phase complete"
        );

        self.teardown(&urls).await;

        Ok(summary)
    }

    /// Write one object per worker index; runs before the timed window
    async fn populate(&self, urls: &[String]) {
        let payload = Bytes::from(vec![b'x'; self.settings.object_size]);
        let mut failed = 0;
        for url in urls {
            let response = self
                .transport
                .send(Method::PUT, url, &self.endpoint.host, payload.clone())
                .await;
            if response.status != 200 {
                debug!(url = %url, status = response.status, "provisioning PUT failed");
                failed += 1;
            }
        }
        if failed > 0 {
            warn!(
                endpoint = %self.endpoint.name,
                failed,
                "some objects could not be provisioned; GETs against them will fail"
            );
        }
    }

    /// Best-effort removal of every provisioned object, then the bucket
    async fn teardown(&self, urls: &[String]) {
        let transport = &self.transport;
        let host = self.endpoint.host.as_str();
        let deleted = stream::iter(urls)
            .map(move |url| async move {
                transport
                    .send(Method::DELETE, url, host, Bytes::new())
                    .await
                    .status
                    == 204
            })
            .buffer_unordered(TEARDOWN_PARALLELISM)
            .filter(|ok| std::future::ready(*ok))
            .count()
            .await;
        debug!(endpoint = %self.endpoint.name, deleted, total = urls.len(), "teardown");

        delete_bucket(&self.transport, &self.endpoint, &self.settings.bucket).await;
    }
}

/// Join every worker in spawn order.
///
/// A worker that panicked or was cancelled is charged all of its requests as
/// failures, so the merged outcome still accounts for every request.
pub async fn gather(
    handles: Vec<JoinHandle<WorkerOutcome>>,
    requests_per_worker: usize,
) -> Vec<WorkerOutcome> {
    let mut outcomes = Vec::with_capacity(handles.len());
    for (worker, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!(worker, error = %e, "worker did not complete; counting its requests as failed");
                outcomes.push(WorkerOutcome {
                    latencies: Vec::new(),
                    failures: requests_per_worker as u64,
                });
            }
        }
    }
    outcomes
}

/// One worker: sequential GETs, private tally
async fn run_worker(
    transport: Transport,
    urls: Arc<Vec<String>>,
    host: String,
    worker: usize,
    requests: usize,
    expected_len: usize,
    progress: Arc<AtomicU64>,
) -> WorkerOutcome {
    let mut outcome = WorkerOutcome {
        latencies: Vec::with_capacity(requests),
        failures: 0,
    };

    for i in 0..requests {
        let url = &urls[target_index(worker, i, urls.len())];
        let (response, elapsed) =
            timed_send(&transport, Method::GET, url, &host, Bytes::new()).await;

        if response.status == 200 && response.body.len() == expected_len {
            outcome.latencies.push(elapsed.as_secs_f64());
        } else {
            debug!(
                worker,
                url = %url,
                status = response.status,
                received = response.body.len(),
                "GET failed"
            );
            outcome.failures += 1;
        }
        progress.fetch_add(1, Ordering::Relaxed);
    }

    outcome
}

/// Samples the shared counter into a progress bar off the hot path
struct ProgressReporter {
    bar: ProgressBar,
    counter: Arc<AtomicU64>,
    ticker: JoinHandle<()>,
}

impl ProgressReporter {
    fn start(counter: Arc<AtomicU64>, total: u64, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} requests")
            {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let ticker = {
            let bar = bar.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_millis(100));
                loop {
                    interval.tick().await;
                    bar.set_position(counter.load(Ordering::Relaxed));
                }
            })
        };

        Self { bar, counter, ticker }
    }

    async fn finish(self) {
        self.ticker.abort();
        let _ = self.ticker.await;
        self.bar.set_position(self.counter.load(Ordering::Relaxed));
        self.bar.finish_and_clear();
    }
}
