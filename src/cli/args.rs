use crate::config::{self, Config, Mode, Target};
use anyhow::Result;
use clap::Parser;
use serde::Serialize;

/// s3bench - latency and throughput benchmark for S3-compatible endpoints
#[derive(Parser, Debug)]
#[command(name = "s3bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path (YAML); environment variables are used otherwise
    #[arg(long)]
    pub config: Option<String>,

    /// URL of the first endpoint
    #[arg(long, value_name = "URL")]
    pub first: Option<String>,

    /// URL of the second endpoint
    #[arg(long, value_name = "URL")]
    pub second: Option<String>,

    /// Display name of the first endpoint
    #[arg(long)]
    pub first_name: Option<String>,

    /// Display name of the second endpoint
    #[arg(long)]
    pub second_name: Option<String>,

    /// Access key ID
    #[arg(long)]
    pub access_key: Option<String>,

    /// Secret access key
    #[arg(long)]
    pub secret_key: Option<String>,

    /// Requests per size class in the sequential run
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Concurrent workers
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// GETs issued by each concurrent worker
    #[arg(long)]
    pub requests_per_worker: Option<usize>,

    /// Benchmark only one endpoint
    #[arg(long, value_enum)]
    pub only: Option<Target>,

    /// Which benchmarks to run
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Disable SSL certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Suppress progress lines and bars
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl Cli {
    /// Load the base configuration, then apply flag overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut config = config::load_config(self.config.as_deref())?;
        self.apply(&mut config);
        Ok(config)
    }

    /// Flags win over file and environment values
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.first {
            config.first.url = url.clone();
        }
        if let Some(url) = &self.second {
            config.second.url = url.clone();
        }
        if let Some(name) = &self.first_name {
            config.first.name = name.clone();
        }
        if let Some(name) = &self.second_name {
            config.second.name = name.clone();
        }
        if let Some(key) = &self.access_key {
            config.credentials.access_key = key.clone();
        }
        if let Some(secret) = &self.secret_key {
            config.credentials.secret_key = secret.clone();
        }
        if let Some(iterations) = self.iterations {
            config.bench.iterations = iterations;
        }
        if let Some(concurrency) = self.concurrency {
            config.bench.concurrency = concurrency;
        }
        if let Some(requests) = self.requests_per_worker {
            config.bench.requests_per_worker = requests;
        }
        if let Some(target) = self.only {
            config.target = target;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.insecure {
            config.insecure = true;
        }
    }

    /// Progress output only makes sense for humans
    pub fn show_progress(&self) -> bool {
        !self.no_progress && self.format == OutputFormat::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "s3bench",
            "--first",
            "http://10.0.0.1:9000",
            "--second-name",
            "minio",
            "--access-key",
            "AK",
            "-n",
            "25",
            "-c",
            "64",
            "--only",
            "first",
            "--mode",
            "sequential",
            "--insecure",
        ]);

        let mut config = Config::new();
        cli.apply(&mut config);

        assert_eq!(config.first.url, "http://10.0.0.1:9000");
        assert_eq!(config.first.name, "zs3");
        assert_eq!(config.second.name, "minio");
        assert_eq!(config.credentials.access_key, "AK");
        assert_eq!(config.credentials.secret_key, "minioadmin");
        assert_eq!(config.bench.iterations, 25);
        assert_eq!(config.bench.concurrency, 64);
        assert_eq!(config.bench.requests_per_worker, 100);
        assert_eq!(config.target, Target::First);
        assert_eq!(config.mode, Mode::Sequential);
        assert!(config.insecure);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::parse_from(["s3bench"]);
        let mut config = Config::new();
        config.bench.iterations = 7;
        cli.apply(&mut config);

        assert_eq!(config.bench.iterations, 7);
        assert_eq!(config.target, Target::Both);
        assert!(!config.insecure);
    }

    #[test]
    fn test_show_progress() {
        assert!(Cli::parse_from(["s3bench"]).show_progress());
        assert!(!Cli::parse_from(["s3bench", "--no-progress"]).show_progress());
        assert!(!Cli::parse_from(["s3bench", "--format", "json"]).show_progress());
    }
}
