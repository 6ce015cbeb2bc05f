//! S3 wire layer with AWS SigV4 signing
//!
//! This module provides:
//! - AWS Signature Version 4 signing and verification
//! - A single-shot transport that normalizes every outcome to `(status, body)`
//! - Endpoint addressing and S3 error body parsing

pub mod endpoint;
pub mod signer;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use endpoint::Endpoint;
pub use signer::{Credentials, QueryCanonicalization, S3SignerV4, SignedRequest, VerifyError};
pub use transport::{Response, S3Error, Transport, TransportOptions};
pub use types::ErrorBody;
