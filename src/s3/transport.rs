//! Signed single-shot HTTP transport
//!
//! - HTTP/1.1 only, TCP_NODELAY, pooled keep-alive connections
//! - native-tls (OpenSSL) for https endpoints
//! - One attempt per call: no retries, bounded by a request timeout
//! - Every outcome collapses into a status code plus body bytes

use crate::s3::endpoint::split_url;
use crate::s3::signer::S3SignerV4;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default bound on one request, connect through last body byte
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status reported when no HTTP exchange completed
pub const STATUS_UNREACHABLE: u16 = 0;

/// Transport errors.
///
/// Only construction surfaces these to callers; exchange errors are folded
/// into a status-0 [`Response`] by [`Transport::send`].
#[derive(Error, Debug)]
pub enum S3Error {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("Hyper error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("Client error: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status, or [`STATUS_UNREACHABLE`] when the server was never heard from
    pub status: u16,
    /// Response body, or a description of the failure for status 0
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: Bytes) -> Self {
        Self { status, body }
    }

    /// Response standing in for a network-level failure
    pub fn unreachable(reason: impl std::fmt::Display) -> Self {
        Self {
            status: STATUS_UNREACHABLE,
            body: Bytes::from(reason.to_string()),
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.status == STATUS_UNREACHABLE
    }

    /// Body as text, lossy
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport tuning
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    /// Skip certificate and hostname verification
    pub insecure_tls: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            insecure_tls: false,
        }
    }
}

/// Signs and sends requests
///
/// Clone is cheap - the underlying HTTP client uses Arc internally, so
/// clones share one connection pool.
#[derive(Clone)]
pub struct Transport {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
    signer: S3SignerV4,
    timeout: Duration,
}

impl Transport {
    pub fn new(signer: S3SignerV4, options: &TransportOptions) -> Result<Self, S3Error> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(options.timeout));
        http.set_keepalive(Some(Duration::from_secs(90)));

        let tls = if options.insecure_tls {
            tracing::warn!("INSECURE TLS MODE ENABLED: Certificate verification is disabled!");
            TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?
        } else {
            TlsConnector::new()?
        };

        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(1024)
            .build(https);

        Ok(Self {
            client,
            signer,
            timeout: options.timeout,
        })
    }

    /// Sign and send one request.
    ///
    /// Never fails: HTTP error statuses come back as-is with their body, and
    /// anything that prevents a complete exchange (DNS, refused connection,
    /// timeout, protocol error) comes back as status 0 with the error text as
    /// the body.
    pub async fn send(&self, method: Method, url: &str, host: &str, payload: Bytes) -> Response {
        let (_, path, query) = split_url(url);
        let signed = self
            .signer
            .sign(method.as_str(), path, query, host, &payload);

        let mut req = Request::builder().method(method.clone()).uri(url);
        for (key, value) in signed.headers.iter() {
            req = req.header(key, value);
        }

        let request = match req.body(Full::new(payload)) {
            Ok(request) => request,
            Err(e) => return Response::unreachable(S3Error::from(e)),
        };

        let result = match tokio::time::timeout(self.timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(S3Error::Timeout(self.timeout)),
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                debug!(%method, url, error = %e, "request failed");
                Response::unreachable(e)
            }
        }
    }

    async fn exchange(&self, request: Request<Full<Bytes>>) -> Result<Response, S3Error> {
        let response = self.client.request(request).await?;
        let status = response.status().as_u16();
        // Always drain body so the connection returns to the pool
        let body = response.into_body().collect().await?.to_bytes();
        Ok(Response::new(status, body))
    }
}
