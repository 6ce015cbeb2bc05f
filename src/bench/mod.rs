//! Benchmark runners and aggregation
//!
//! - [`sequential`]: one request in flight, scripted phases per payload size
//! - [`concurrent`]: fan-out of GET workers over a shared object set
//! - [`stats`]: reduction of latency samples and endpoint comparison

pub mod concurrent;
pub mod sequential;
pub mod stats;

pub use concurrent::{ConcurrentRunner, ConcurrentSettings, ConcurrentSummary, WorkerOutcome};
pub use sequential::{OperationSamples, SequentialResults, SequentialRunner, SequentialSettings};
pub use stats::{Comparison, Metric, SampleSet, Side, Summary};

use crate::s3::{Endpoint, ErrorBody, Response, Transport};
use bytes::Bytes;
use hyper::Method;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Statuses accepted from bucket creation: created, or already exists
const BUCKET_READY: [u16; 2] = [200, 409];

/// Failures that abort a run for one endpoint
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("failed to create bucket {bucket} on {endpoint}: status {status} ({detail})")]
    BucketCreate {
        endpoint: String,
        bucket: String,
        status: u16,
        detail: String,
    },

    #[error("invalid benchmark parameter: {0}")]
    InvalidParameter(String),
}

/// Send one request and measure it end to end
pub(crate) async fn timed_send(
    transport: &Transport,
    method: Method,
    url: &str,
    host: &str,
    payload: Bytes,
) -> (Response, Duration) {
    let start = Instant::now();
    let response = transport.send(method, url, host, payload).await;
    (response, start.elapsed())
}

/// Create the benchmark bucket, tolerating one that already exists.
///
/// Returns the creation latency.
pub(crate) async fn create_bucket(
    transport: &Transport,
    endpoint: &Endpoint,
    bucket: &str,
) -> Result<Duration, BenchError> {
    let url = endpoint.bucket_url(bucket);
    let (response, elapsed) =
        timed_send(transport, Method::PUT, &url, &endpoint.host, Bytes::new()).await;

    if BUCKET_READY.contains(&response.status) {
        debug!(endpoint = %endpoint.name, bucket, status = response.status, "bucket ready");
        return Ok(elapsed);
    }

    let detail = describe_failure(&response);
    warn!(endpoint = %endpoint.name, bucket, status = response.status, %detail, "bucket creation rejected");
    Err(BenchError::BucketCreate {
        endpoint: endpoint.name.clone(),
        bucket: bucket.to_string(),
        status: response.status,
        detail,
    })
}

/// Delete the benchmark bucket; the outcome is not tracked
pub(crate) async fn delete_bucket(transport: &Transport, endpoint: &Endpoint, bucket: &str) {
    let url = endpoint.bucket_url(bucket);
    let response = transport
        .send(Method::DELETE, &url, &endpoint.host, Bytes::new())
        .await;
    debug!(endpoint = %endpoint.name, bucket, status = response.status, "bucket cleanup");
}

/// Human-readable reason for a failed response
pub(crate) fn describe_failure(response: &Response) -> String {
    if response.is_unreachable() {
        return response.text();
    }
    match ErrorBody::parse(&response.body) {
        Some(body) if body.message.is_empty() => body.code,
        Some(body) => format!("{}: {}", body.code, body.message),
        None if response.body.is_empty() => "empty body".to_string(),
        None => response.text().chars().take(200).collect(),
    }
}
