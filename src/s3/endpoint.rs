//! Benchmark target addressing

use crate::s3::transport::S3Error;

/// A target S3 endpoint: base URL plus the host string that is both dialled
/// and signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Display name used in reports
    pub name: String,
    /// Base URL without trailing slash, e.g. `http://localhost:9000`
    pub url: String,
    /// Authority used as the signed `host` header
    pub host: String,
}

impl Endpoint {
    /// Parse an `http://` or `https://` base URL.
    ///
    /// Default ports (`:80`, `:443`) are stripped from the host, matching
    /// what an HTTP client would send.
    pub fn parse(name: impl Into<String>, url: &str) -> Result<Self, S3Error> {
        let url = url.trim().trim_end_matches('/');
        let (authority, _, _) = split_url(url);
        let is_https = url.starts_with("https://");

        if !is_https && !url.starts_with("http://") {
            return Err(S3Error::InvalidEndpoint(format!(
                "must start with http:// or https://: {}",
                url
            )));
        }
        if authority.is_empty() {
            return Err(S3Error::InvalidEndpoint(format!("no host in {}", url)));
        }

        let host = if is_https {
            authority.strip_suffix(":443").unwrap_or(authority)
        } else {
            authority.strip_suffix(":80").unwrap_or(authority)
        };

        Ok(Self {
            name: name.into(),
            url: url.to_string(),
            host: host.to_string(),
        })
    }

    pub fn bucket_url(&self, bucket: &str) -> String {
        let mut url = String::with_capacity(self.url.len() + 1 + bucket.len());
        url.push_str(&self.url);
        url.push('/');
        url.push_str(bucket);
        url
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        let mut url = self.bucket_url(bucket);
        url.push('/');
        url.push_str(key);
        url
    }

    /// ListObjectsV2 URL for a bucket
    pub fn list_url(&self, bucket: &str) -> String {
        let mut url = self.bucket_url(bucket);
        url.push_str("?list-type=2");
        url
    }
}

/// Split a URL into `(authority, path, query)` without allocating.
///
/// The path is `/` when the URL has none; the query excludes the `?`.
pub fn split_url(url: &str) -> (&str, &str, &str) {
    let after_scheme = if let Some(rest) = url.strip_prefix("https://") {
        rest
    } else if let Some(rest) = url.strip_prefix("http://") {
        rest
    } else {
        url
    };

    let (authority, path_and_query) = match after_scheme.find(['/', '?']) {
        Some(pos) => after_scheme.split_at(pos),
        None => (after_scheme, "/"),
    };

    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, query),
        None => (path_and_query, ""),
    };

    (authority, if path.is_empty() { "/" } else { path }, query)
}
