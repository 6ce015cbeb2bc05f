//! s3bench - latency and throughput benchmark for S3-compatible endpoints
//!
//! - [`s3`]: SigV4 signing and the single-shot HTTP transport
//! - [`bench`]: sequential and concurrent runners, latency statistics
//! - [`config`]: YAML / environment configuration
//! - [`cli`]: argument parsing, orchestration and report output

pub mod bench;
pub mod cli;
pub mod config;
pub mod s3;

pub use config::Config;
