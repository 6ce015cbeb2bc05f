//! AWS Signature Version 4 signer for benchmark requests
//!
//! Every request is signed for region `us-east-1` and service `s3`, over
//! exactly three headers: `host`, `x-amz-content-sha256` and `x-amz-date`.
//! The same type can verify a received request, which the test harness uses
//! to authenticate traffic against its in-process mock server.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::trace;

type HmacSha256 = Hmac<Sha256>;

/// Hex lookup table for percent encoding
static HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// SHA256 of the empty payload
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const REGION: &str = "us-east-1";
pub const SERVICE: &str = "s3";
const TERMINATOR: &str = "aws4_request";

const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DATE_STAMP_FORMAT: &str = "%Y%m%d";

/// How the raw query string is turned into its canonical form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryCanonicalization {
    /// Split on `&` and sort the whole `key=value` tokens. Names and values
    /// are not decoded or re-encoded.
    #[default]
    Simple,
    /// Decode each parameter, re-encode it per RFC 3986 and sort by name,
    /// then by value. Parameters without `=` become `name=`.
    Full,
}

/// Access key pair, immutable for the lifetime of a run
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// A freshly signed request.
///
/// The embedded timestamp bounds how long the server accepts the signature,
/// so one of these is built per call and dropped after sending.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: String,
    pub path: String,
    pub canonical_query: String,
    pub payload_hash: String,
    pub amz_date: String,
    pub canonical_request: String,
    /// Lowercase header name -> value, including `authorization`
    pub headers: BTreeMap<String, String>,
}

impl SignedRequest {
    /// Value of the `authorization` header
    pub fn authorization(&self) -> &str {
        self.headers
            .get("authorization")
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Hex signature at the tail of the authorization value
    pub fn signature(&self) -> &str {
        self.authorization()
            .rsplit("Signature=")
            .next()
            .unwrap_or_default()
    }
}

/// Reasons a received request fails verification
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("missing header: {0}")]
    MissingHeader(String),

    #[error("malformed authorization: {0}")]
    MalformedAuthorization(String),

    #[error("unknown access key: {0}")]
    UnknownAccessKey(String),

    #[error("payload hash does not match x-amz-content-sha256")]
    PayloadHashMismatch,

    #[error("signature mismatch")]
    SignatureMismatch,
}

/// AWS Signature Version 4 signer
#[derive(Clone)]
pub struct S3SignerV4 {
    credentials: Credentials,
    /// "AWS4" + secret_key, the seed of the signing key chain
    aws4_key: Vec<u8>,
    query_mode: QueryCanonicalization,
}

impl S3SignerV4 {
    pub fn new(credentials: Credentials) -> Self {
        let aws4_key = format!("AWS4{}", credentials.secret_key).into_bytes();
        Self {
            credentials,
            aws4_key,
            query_mode: QueryCanonicalization::default(),
        }
    }

    pub fn with_query_canonicalization(mut self, mode: QueryCanonicalization) -> Self {
        self.query_mode = mode;
        self
    }

    pub fn access_key(&self) -> &str {
        &self.credentials.access_key
    }

    /// Sign a request at the current time
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        query: &str,
        host: &str,
        payload: &[u8],
    ) -> SignedRequest {
        self.sign_at(Utc::now(), method, path, query, host, payload)
    }

    /// Sign a request as if issued at `now`
    pub fn sign_at(
        &self,
        now: DateTime<Utc>,
        method: &str,
        path: &str,
        query: &str,
        host: &str,
        payload: &[u8],
    ) -> SignedRequest {
        let amz_date = now.format(AMZ_DATE_FORMAT).to_string();
        let date_stamp = now.format(DATE_STAMP_FORMAT).to_string();
        let payload_hash = payload_hash(payload);

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), host.to_string());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        headers.insert("x-amz-date".to_string(), amz_date.clone());

        let canonical_query = self.canonical_query(query);
        let pairs: Vec<(&str, &str)> = headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let (canonical_headers, signed_headers) = canonicalize_headers(&pairs);

        let canonical_request = canonical_request(
            method,
            path,
            &canonical_query,
            &canonical_headers,
            &signed_headers,
            &payload_hash,
        );

        let scope = credential_scope(&date_stamp);
        let string_to_sign = string_to_sign(&amz_date, &scope, &canonical_request);
        let signature = hex::encode(hmac_sha256(
            &self.derive_signing_key(&date_stamp),
            string_to_sign.as_bytes(),
        ));

        trace!(
            canonical_request = %canonical_request,
            string_to_sign = %string_to_sign,
            "sigv4"
        );

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credentials.access_key, scope, signed_headers, signature
        );
        headers.insert("authorization".to_string(), authorization);

        SignedRequest {
            method: method.to_string(),
            path: path.to_string(),
            canonical_query,
            payload_hash,
            amz_date,
            canonical_request,
            headers,
        }
    }

    /// Check a received request against this signer's credentials.
    ///
    /// `headers` must use lowercase names. The payload is re-hashed, so any
    /// change to the body after signing is rejected.
    pub fn verify(
        &self,
        method: &str,
        path: &str,
        query: &str,
        headers: &BTreeMap<String, String>,
        payload: &[u8],
    ) -> Result<(), VerifyError> {
        let auth = ParsedAuthorization::parse(required_header(headers, "authorization")?)?;
        if auth.access_key != self.credentials.access_key {
            return Err(VerifyError::UnknownAccessKey(auth.access_key.to_string()));
        }

        let claimed_hash = required_header(headers, "x-amz-content-sha256")?;
        let payload_hash = payload_hash(payload);
        if claimed_hash != payload_hash {
            return Err(VerifyError::PayloadHashMismatch);
        }

        let amz_date = required_header(headers, "x-amz-date")?;
        if !amz_date.starts_with(auth.date_stamp) {
            return Err(VerifyError::MalformedAuthorization(
                "credential date does not match x-amz-date".to_string(),
            ));
        }

        let mut pairs = Vec::new();
        for name in auth.signed_headers.split(';') {
            pairs.push((name, required_header(headers, name)?));
        }
        let (canonical_headers, signed_headers) = canonicalize_headers(&pairs);
        if signed_headers != auth.signed_headers {
            return Err(VerifyError::MalformedAuthorization(
                "signed headers are not in canonical order".to_string(),
            ));
        }

        let canonical_request = canonical_request(
            method,
            path,
            &self.canonical_query(query),
            &canonical_headers,
            &signed_headers,
            &payload_hash,
        );
        let string_to_sign = string_to_sign(
            amz_date,
            &credential_scope(auth.date_stamp),
            &canonical_request,
        );

        let expected = hex::decode(auth.signature).map_err(|_| {
            VerifyError::MalformedAuthorization("signature is not hex".to_string())
        })?;
        let mut mac = HmacSha256::new_from_slice(&self.derive_signing_key(auth.date_stamp))
            .expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| VerifyError::SignatureMismatch)
    }

    /// Canonical query string in this signer's mode
    pub fn canonical_query(&self, query: &str) -> String {
        if query.is_empty() {
            return String::new();
        }
        match self.query_mode {
            QueryCanonicalization::Simple => {
                let mut parts: Vec<&str> = query.split('&').collect();
                parts.sort_unstable();
                parts.join("&")
            }
            QueryCanonicalization::Full => full_canonical_query(query),
        }
    }

    /// Derive signing key from date stamp (4 chained HMAC operations)
    fn derive_signing_key(&self, date_stamp: &str) -> [u8; 32] {
        let k_date = hmac_sha256(&self.aws4_key, date_stamp.as_bytes());
        let k_region = hmac_sha256(&k_date, REGION.as_bytes());
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
        hmac_sha256(&k_service, TERMINATOR.as_bytes())
    }
}

/// Hex SHA256 of a payload
pub fn payload_hash(payload: &[u8]) -> String {
    if payload.is_empty() {
        return EMPTY_SHA256.to_string();
    }
    hex::encode(Sha256::digest(payload))
}

/// Build `(canonical_headers, signed_headers)` from header pairs in any order.
///
/// Names are lowercased and sorted; values are used exactly as given. Each
/// canonical header line ends in `\n`.
pub fn canonicalize_headers(headers: &[(&str, &str)]) -> (String, String) {
    let mut sorted: Vec<(String, &str)> = headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), *v))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut canonical = String::with_capacity(sorted.len() * 64);
    for (k, v) in &sorted {
        canonical.push_str(k);
        canonical.push(':');
        canonical.push_str(v);
        canonical.push('\n');
    }
    let signed = sorted
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");
    (canonical, signed)
}

/// `METHOD\nPATH\nQUERY\nHEADERS\n\nSIGNED\nHASH`; the blank line comes from
/// the trailing newline of the header block.
fn canonical_request(
    method: &str,
    path: &str,
    canonical_query: &str,
    canonical_headers: &str,
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method, path, canonical_query, canonical_headers, signed_headers, payload_hash
    )
}

fn credential_scope(date_stamp: &str) -> String {
    format!("{}/{}/{}/{}", date_stamp, REGION, SERVICE, TERMINATOR)
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    let hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    format!("{}\n{}\n{}\n{}", ALGORITHM, amz_date, scope, hash)
}

fn full_canonical_query(query: &str) -> String {
    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(key).unwrap_or_else(|_| key.into());
            let value = urlencoding::decode(value).unwrap_or_else(|_| value.into());
            (uri_encode(&key), uri_encode(&value))
        })
        .collect();
    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// RFC 3986 encoding, `/` included
fn uri_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 16);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push('%');
                result.push(HEX_UPPER[(byte >> 4) as usize] as char);
                result.push(HEX_UPPER[(byte & 0xf) as usize] as char);
            }
        }
    }
    result
}

/// HMAC-SHA256 returning fixed-size array
fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(msg);
    let result = mac.finalize().into_bytes();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

fn required_header<'a>(
    headers: &'a BTreeMap<String, String>,
    name: &str,
) -> Result<&'a str, VerifyError> {
    headers
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| VerifyError::MissingHeader(name.to_string()))
}

/// Fields of an `AWS4-HMAC-SHA256 Credential=..., SignedHeaders=..., Signature=...` value
struct ParsedAuthorization<'a> {
    access_key: &'a str,
    date_stamp: &'a str,
    signed_headers: &'a str,
    signature: &'a str,
}

impl<'a> ParsedAuthorization<'a> {
    fn parse(value: &'a str) -> Result<Self, VerifyError> {
        let malformed = |msg: &str| VerifyError::MalformedAuthorization(msg.to_string());

        let rest = value
            .strip_prefix(ALGORITHM)
            .ok_or_else(|| malformed("unsupported algorithm"))?;

        let mut credential = None;
        let mut signed_headers = None;
        let mut signature = None;
        for part in rest.split(',') {
            let part = part.trim();
            if let Some(v) = part.strip_prefix("Credential=") {
                credential = Some(v);
            } else if let Some(v) = part.strip_prefix("SignedHeaders=") {
                signed_headers = Some(v);
            } else if let Some(v) = part.strip_prefix("Signature=") {
                signature = Some(v);
            }
        }

        let credential = credential.ok_or_else(|| malformed("missing Credential"))?;
        // access_key/date/region/service/aws4_request
        let scope: Vec<&str> = credential.rsplitn(5, '/').collect();
        let &[terminator, service, region, date_stamp, access_key] = scope.as_slice() else {
            return Err(malformed("credential scope has too few parts"));
        };
        if terminator != TERMINATOR || service != SERVICE || region != REGION {
            return Err(malformed("credential scope does not match region/service"));
        }

        Ok(Self {
            access_key,
            date_stamp,
            signed_headers: signed_headers.ok_or_else(|| malformed("missing SignedHeaders"))?,
            signature: signature.ok_or_else(|| malformed("missing Signature"))?,
        })
    }
}
