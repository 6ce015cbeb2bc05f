use crate::s3::{Credentials, Endpoint, QueryCanonicalization, TransportOptions};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A named endpoint under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Display name used in reports
    pub name: String,

    /// Base URL, e.g. http://localhost:9000
    pub url: String,
}

impl EndpointConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn to_endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(self.name.clone(), &self.url)
            .with_context(|| format!("invalid URL for endpoint '{}'", self.name))
    }
}

fn default_first() -> EndpointConfig {
    EndpointConfig::new("zs3", "http://localhost:9000")
}

fn default_second() -> EndpointConfig {
    EndpointConfig::new("rustfs", "http://localhost:9001")
}

/// Credentials shared by both endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_access_key")]
    pub access_key: String,

    #[serde(default = "default_secret_key")]
    pub secret_key: String,
}

fn default_access_key() -> String {
    "minioadmin".to_string()
}

fn default_secret_key() -> String {
    "minioadmin".to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            access_key: default_access_key(),
            secret_key: default_secret_key(),
        }
    }
}

/// Workload parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Bucket created, filled and removed on each endpoint
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Requests per size class in the sequential run
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Untimed PUT/GET/DELETE rounds before the sequential run
    #[serde(default = "default_warmup_rounds")]
    pub warmup_rounds: usize,

    /// Number of concurrent workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// GETs issued by each worker
    #[serde(default = "default_requests_per_worker")]
    pub requests_per_worker: usize,

    /// Size in bytes of the objects read by the concurrent run
    #[serde(default = "default_object_size")]
    pub object_size: usize,
}

fn default_bucket() -> String {
    "benchbucket".to_string()
}

fn default_iterations() -> usize {
    100
}

fn default_warmup_rounds() -> usize {
    5
}

fn default_concurrency() -> usize {
    10
}

fn default_requests_per_worker() -> usize {
    100
}

fn default_object_size() -> usize {
    4096
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            iterations: default_iterations(),
            warmup_rounds: default_warmup_rounds(),
            concurrency: default_concurrency(),
            requests_per_worker: default_requests_per_worker(),
            object_size: default_object_size(),
        }
    }
}

/// Which endpoints to benchmark
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    First,
    Second,
    #[default]
    Both,
}

/// Which benchmarks to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Sequential,
    Concurrent,
    #[default]
    Both,
}

impl Mode {
    pub fn sequential(self) -> bool {
        matches!(self, Mode::Sequential | Mode::Both)
    }

    pub fn concurrent(self) -> bool {
        matches!(self, Mode::Concurrent | Mode::Both)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_first")]
    pub first: EndpointConfig,

    #[serde(default = "default_second")]
    pub second: EndpointConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub bench: BenchConfig,

    #[serde(default)]
    pub target: Target,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub query_canonicalization: QueryCanonicalization,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept invalid TLS certificates and hostnames
    #[serde(default)]
    pub insecure: bool,
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    pub fn new() -> Self {
        Self {
            first: default_first(),
            second: default_second(),
            credentials: CredentialsConfig::default(),
            bench: BenchConfig::default(),
            target: Target::default(),
            mode: Mode::default(),
            query_canonicalization: QueryCanonicalization::default(),
            timeout: default_timeout(),
            insecure: false,
        }
    }

    /// Endpoints selected by `target`, in report order
    pub fn selected_endpoints(&self) -> Vec<&EndpointConfig> {
        match self.target {
            Target::First => vec![&self.first],
            Target::Second => vec![&self.second],
            Target::Both => vec![&self.first, &self.second],
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.credentials.access_key, &self.credentials.secret_key)
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            timeout: Duration::from_secs(self.timeout),
            insecure_tls: self.insecure,
        }
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.bench.bucket.is_empty() {
            anyhow::bail!("bucket name must not be empty");
        }
        if self.mode.concurrent() {
            if self.bench.concurrency == 0 {
                anyhow::bail!("concurrency must be at least 1");
            }
            if self.bench.requests_per_worker == 0 {
                anyhow::bail!("requests per worker must be at least 1");
            }
        }
        if self.timeout == 0 {
            anyhow::bail!("timeout must be at least 1 second");
        }
        for endpoint in self.selected_endpoints() {
            endpoint.to_endpoint()?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

    Ok(config)
}

/// Load configuration from environment variables
///
/// Every variable is optional; unset ones keep their defaults.
/// - S3BENCH_FIRST_URL / S3BENCH_FIRST_NAME
/// - S3BENCH_SECOND_URL / S3BENCH_SECOND_NAME
/// - AWS_ACCESS_KEY_ID / S3_KEY
/// - AWS_SECRET_ACCESS_KEY / S3_SECRET
/// - S3BENCH_BUCKET, S3BENCH_ITERATIONS, S3BENCH_CONCURRENCY,
///   S3BENCH_REQUESTS_PER_WORKER, S3BENCH_TIMEOUT
pub fn load_from_env() -> Result<Config> {
    // Try to load .env file if it exists (don't fail if it doesn't)
    let _ = dotenvy::dotenv();

    let mut config = Config::new();

    if let Ok(url) = std::env::var("S3BENCH_FIRST_URL") {
        config.first.url = url;
    }
    if let Ok(name) = std::env::var("S3BENCH_FIRST_NAME") {
        config.first.name = name;
    }
    if let Ok(url) = std::env::var("S3BENCH_SECOND_URL") {
        config.second.url = url;
    }
    if let Ok(name) = std::env::var("S3BENCH_SECOND_NAME") {
        config.second.name = name;
    }

    // Support both AWS standard and legacy variable names
    if let Ok(key) = std::env::var("AWS_ACCESS_KEY_ID").or_else(|_| std::env::var("S3_KEY")) {
        config.credentials.access_key = key;
    }
    if let Ok(secret) =
        std::env::var("AWS_SECRET_ACCESS_KEY").or_else(|_| std::env::var("S3_SECRET"))
    {
        config.credentials.secret_key = secret;
    }

    if let Ok(bucket) = std::env::var("S3BENCH_BUCKET") {
        config.bench.bucket = bucket;
    }
    if let Some(val) = env_number("S3BENCH_ITERATIONS")? {
        config.bench.iterations = val;
    }
    if let Some(val) = env_number("S3BENCH_CONCURRENCY")? {
        config.bench.concurrency = val;
    }
    if let Some(val) = env_number("S3BENCH_REQUESTS_PER_WORKER")? {
        config.bench.requests_per_worker = val;
    }
    if let Some(val) = env_number("S3BENCH_TIMEOUT")? {
        config.timeout = val;
    }

    Ok(config)
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} is not a valid number: {:?}", key, raw)),
        Err(_) => Ok(None),
    }
}

/// Load configuration from a YAML file when given, else from the environment
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    match config_path {
        Some(path) => load_from_yaml(path),
        None => load_from_env(),
    }
}
