//! Sequential benchmark
//!
//! Strictly ordered phases, one request in flight at a time:
//!
//! ```text
//! CreateBucket -> Warmup -> PUT(sizes) -> GET(sizes) -> LIST -> DELETE -> CleanupBucket
//! ```
//!
//! Only verified successes are timed into a class; everything else is
//! counted as a failure for that class.

use crate::bench::stats::{Comparison, SampleSet, Summary};
use crate::bench::{create_bucket, delete_bucket, timed_send, BenchError};
use crate::s3::{Endpoint, Transport};
use bytes::Bytes;
use hyper::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Object size exercised by the PUT/GET phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSize {
    pub label: &'static str,
    pub bytes: usize,
}

impl PayloadSize {
    /// Payload of `bytes` ASCII `x` characters
    pub fn payload(&self) -> Bytes {
        Bytes::from(vec![b'x'; self.bytes])
    }
}

pub const PAYLOAD_SIZES: [PayloadSize; 4] = [
    PayloadSize { label: "1kb", bytes: 1024 },
    PayloadSize { label: "4kb", bytes: 4096 },
    PayloadSize { label: "64kb", bytes: 65536 },
    PayloadSize { label: "1mb", bytes: 1048576 },
];

pub const CREATE_BUCKET: &str = "create_bucket";
pub const LIST: &str = "list";
pub const DELETE: &str = "delete";

/// Key written by the PUT phase for one size and iteration
pub fn bench_key(size: &PayloadSize, index: usize) -> String {
    format!("bench_{}_{}", size.label, index)
}

pub fn put_class(size: &PayloadSize) -> String {
    format!("put_{}", size.label)
}

pub fn get_class(size: &PayloadSize) -> String {
    format!("get_{}", size.label)
}

/// Classes in the order the run produces them
pub fn operation_classes() -> Vec<String> {
    let mut classes = vec![CREATE_BUCKET.to_string()];
    classes.extend(PAYLOAD_SIZES.iter().map(put_class));
    classes.extend(PAYLOAD_SIZES.iter().map(get_class));
    classes.push(LIST.to_string());
    classes.push(DELETE.to_string());
    classes
}

/// Samples and failure count for one operation class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationSamples {
    pub operation: String,
    pub samples: SampleSet,
    pub failures: u64,
}

impl OperationSamples {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn summary(&self) -> Option<Summary> {
        self.samples.summary()
    }
}

/// Sequential result set for one endpoint, in run order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequentialResults {
    pub operations: Vec<OperationSamples>,
}

impl SequentialResults {
    /// Empty result set with every class registered
    pub fn new() -> Self {
        Self {
            operations: operation_classes()
                .into_iter()
                .map(OperationSamples::new)
                .collect(),
        }
    }

    pub fn get(&self, operation: &str) -> Option<&OperationSamples> {
        self.operations.iter().find(|o| o.operation == operation)
    }

    fn class_mut(&mut self, operation: &str) -> &mut OperationSamples {
        match self.operations.iter().position(|o| o.operation == operation) {
            Some(pos) => &mut self.operations[pos],
            None => {
                self.operations.push(OperationSamples::new(operation));
                let last = self.operations.len() - 1;
                &mut self.operations[last]
            }
        }
    }

    /// Mean-latency comparison for classes with samples on both sides
    pub fn compare(&self, second: &SequentialResults) -> Vec<Comparison> {
        self.operations
            .iter()
            .filter_map(|first| {
                let a = first.summary()?;
                let b = second.get(&first.operation)?.summary()?;
                Some(Comparison::mean_latency(&first.operation, a.mean, b.mean))
            })
            .collect()
    }
}

/// Parameters of a sequential run
#[derive(Debug, Clone)]
pub struct SequentialSettings {
    pub bucket: String,
    pub iterations: usize,
    pub warmup_rounds: usize,
    /// Print a line per finished phase to stdout
    pub show_progress: bool,
}

/// Drives the sequential phases against one endpoint
pub struct SequentialRunner<'a> {
    transport: &'a Transport,
    endpoint: &'a Endpoint,
    settings: SequentialSettings,
}

impl<'a> SequentialRunner<'a> {
    pub fn new(transport: &'a Transport, endpoint: &'a Endpoint, settings: SequentialSettings) -> Self {
        Self {
            transport,
            endpoint,
            settings,
        }
    }

    /// Run every phase. Only a rejected bucket creation aborts.
    pub async fn run(&self) -> Result<SequentialResults, BenchError> {
        let bucket = &self.settings.bucket;
        let mut results = SequentialResults::new();

        info!(
            endpoint = %self.endpoint.name,
            url = %self.endpoint.url,
            iterations = self.settings.iterations,
            "starting sequential benchmark"
        );

        let elapsed = create_bucket(self.transport, self.endpoint, bucket).await?;
        results.class_mut(CREATE_BUCKET).samples.record_duration(elapsed);

        self.warmup().await;

        for size in PAYLOAD_SIZES.iter() {
            let class = results.class_mut(&put_class(size));
            self.put_phase(size, class).await;
            self.phase_done("PUT", size.label, class);
        }

        for size in PAYLOAD_SIZES.iter() {
            let class = results.class_mut(&get_class(size));
            self.get_phase(size, class).await;
            self.phase_done("GET", size.label, class);
        }

        let class = results.class_mut(LIST);
        self.list_phase(class).await;
        self.phase_done("LIST", "", class);

        let class = results.class_mut(DELETE);
        self.delete_phase(class).await;
        self.phase_done("DELETE", "", class);

        delete_bucket(self.transport, self.endpoint, bucket).await;

        Ok(results)
    }

    /// Prime connections and server caches; timings are discarded
    async fn warmup(&self) {
        let payload = PAYLOAD_SIZES[0].payload();
        for i in 0..self.settings.warmup_rounds {
            let url = self.object_url(&format!("warmup{}", i));
            let host = &self.endpoint.host;
            self.transport.send(Method::PUT, &url, host, payload.clone()).await;
            self.transport.send(Method::GET, &url, host, Bytes::new()).await;
            self.transport.send(Method::DELETE, &url, host, Bytes::new()).await;
        }
        debug!(endpoint = %self.endpoint.name, rounds = self.settings.warmup_rounds, "warmup done");
    }

    async fn put_phase(&self, size: &PayloadSize, class: &mut OperationSamples) {
        // Bytes::clone is a refcount bump, not a copy
        let payload = size.payload();
        for i in 0..self.settings.iterations {
            let url = self.object_url(&bench_key(size, i));
            let (response, elapsed) = timed_send(
                self.transport,
                Method::PUT,
                &url,
                &self.endpoint.host,
                payload.clone(),
            )
            .await;

            if response.status == 200 {
                class.samples.record_duration(elapsed);
            } else {
                debug!(url = %url, status = response.status, "PUT failed");
                class.failures += 1;
            }
        }
    }

    async fn get_phase(&self, size: &PayloadSize, class: &mut OperationSamples) {
        for i in 0..self.settings.iterations {
            let url = self.object_url(&bench_key(size, i));
            let (response, elapsed) = timed_send(
                self.transport,
                Method::GET,
                &url,
                &self.endpoint.host,
                Bytes::new(),
            )
            .await;

            if response.status == 200 && response.body.len() == size.bytes {
                class.samples.record_duration(elapsed);
            } else {
                debug!(
                    url = %url,
                    status = response.status,
                    received = response.body.len(),
                    expected = size.bytes,
                    "GET failed"
                );
                class.failures += 1;
            }
        }
    }

    async fn list_phase(&self, class: &mut OperationSamples) {
        let url = self.endpoint.list_url(&self.settings.bucket);
        for _ in 0..self.settings.iterations {
            let (response, elapsed) = timed_send(
                self.transport,
                Method::GET,
                &url,
                &self.endpoint.host,
                Bytes::new(),
            )
            .await;

            if response.status == 200 {
                class.samples.record_duration(elapsed);
            } else {
                debug!(url = %url, status = response.status, "LIST failed");
                class.failures += 1;
            }
        }
    }

    async fn delete_phase(&self, class: &mut OperationSamples) {
        for size in PAYLOAD_SIZES.iter() {
            for i in 0..self.settings.iterations {
                let url = self.object_url(&bench_key(size, i));
                let (response, elapsed) = timed_send(
                    self.transport,
                    Method::DELETE,
                    &url,
                    &self.endpoint.host,
                    Bytes::new(),
                )
                .await;

                if response.status == 204 {
                    class.samples.record_duration(elapsed);
                } else {
                    debug!(url = %url, status = response.status, "DELETE failed");
                    class.failures += 1;
                }
            }
        }
    }

    fn object_url(&self, key: &str) -> String {
        self.endpoint.object_url(&self.settings.bucket, key)
    }

    fn phase_done(&self, op: &str, size: &str, class: &OperationSamples) {
        info!(
            endpoint = %self.endpoint.name,
            operation = %class.operation,
            ok = class.samples.len(),
            failed = class.failures,
            "phase complete"
        );
        if self.settings.show_progress {
            let label = if size.is_empty() {
                op.to_string()
            } else {
                format!("{} {}", op, size)
            };
            println!("  {}... {} ok", label, class.samples.len());
        }
    }
}
