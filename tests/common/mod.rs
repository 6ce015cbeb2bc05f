//! In-process S3 stand-in for integration tests
//!
//! Verifies every request's SigV4 signature, keeps buckets and objects in
//! memory, and exposes a few knobs to inject faults.

#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use s3bench::s3::{Credentials, S3SignerV4};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const ACCESS_KEY: &str = "minioadmin";
pub const SECRET_KEY: &str = "minioadmin";

#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// Serve only the first N bytes of every object on GET
    pub truncate_gets_to: Option<usize>,
    /// Answer bucket creation with 403 AccessDenied
    pub reject_bucket_create: bool,
}

pub struct MockState {
    signer: S3SignerV4,
    options: MockOptions,
    buckets: Mutex<HashSet<String>>,
    objects: Mutex<HashMap<(String, String), Bytes>>,
    gets: AtomicU64,
    rejected: AtomicU64,
}

pub struct MockS3 {
    pub url: String,
    pub state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockS3 {
    pub async fn start() -> Self {
        Self::start_with(MockOptions::default()).await
    }

    pub async fn start_with(options: MockOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(MockState {
            signer: S3SignerV4::new(Credentials::new(ACCESS_KEY, SECRET_KEY)),
            options,
            buckets: Mutex::new(HashSet::new()),
            objects: Mutex::new(HashMap::new()),
            gets: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        });

        let server_state = state.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let io = TokioIo::new(stream);
                let state = server_state.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| handle(state.clone(), req));
                    let _ = http1::Builder::new().serve_connection(io, service).await;
                });
            }
        });

        Self {
            url: format!("http://{}", addr),
            state,
            task,
        }
    }

    pub fn gets(&self) -> u64 {
        self.state.gets.load(Ordering::SeqCst)
    }

    pub fn rejected_signatures(&self) -> u64 {
        self.state.rejected.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.state.objects.lock().unwrap().len()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.state.buckets.lock().unwrap().contains(bucket)
    }

    pub fn insert_bucket(&self, bucket: &str) {
        self.state.buckets.lock().unwrap().insert(bucket.to_string());
    }
}

impl Drop for MockS3 {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn reply(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

fn error(status: StatusCode, code: &str, message: &str) -> Response<Full<Bytes>> {
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Error><Code>{}</Code><Message>{}</Message></Error>",
        code, message
    );
    reply(status, xml)
}

async fn handle(
    state: Arc<MockState>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let payload = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Ok(reply(StatusCode::BAD_REQUEST, "")),
    };

    let headers: BTreeMap<String, String> = parts
        .headers
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();

    let path = parts.uri.path();
    let query = parts.uri.query().unwrap_or("");
    if let Err(e) = state
        .signer
        .verify(parts.method.as_str(), path, query, &headers, &payload)
    {
        state.rejected.fetch_add(1, Ordering::SeqCst);
        return Ok(error(
            StatusCode::FORBIDDEN,
            "SignatureDoesNotMatch",
            &e.to_string(),
        ));
    }

    let mut segments = path.trim_start_matches('/').splitn(2, '/');
    let bucket = segments.next().unwrap_or("").to_string();
    let key = segments.next().filter(|k| !k.is_empty()).map(str::to_string);

    let response = match (parts.method, key) {
        (Method::PUT, None) => create_bucket(&state, bucket),
        (Method::DELETE, None) => {
            state.buckets.lock().unwrap().remove(&bucket);
            reply(StatusCode::NO_CONTENT, "")
        }
        (Method::GET, None) => list_objects(&state, &bucket),
        (Method::PUT, Some(key)) => {
            if !state.buckets.lock().unwrap().contains(&bucket) {
                return Ok(error(StatusCode::NOT_FOUND, "NoSuchBucket", "no such bucket"));
            }
            state.objects.lock().unwrap().insert((bucket, key), payload);
            reply(StatusCode::OK, "")
        }
        (Method::GET, Some(key)) => {
            state.gets.fetch_add(1, Ordering::SeqCst);
            match state.objects.lock().unwrap().get(&(bucket, key)) {
                Some(data) => {
                    let data = match state.options.truncate_gets_to {
                        Some(limit) if limit < data.len() => data.slice(..limit),
                        _ => data.clone(),
                    };
                    reply(StatusCode::OK, data)
                }
                None => error(StatusCode::NOT_FOUND, "NoSuchKey", "no such key"),
            }
        }
        (Method::DELETE, Some(key)) => {
            state.objects.lock().unwrap().remove(&(bucket, key));
            reply(StatusCode::NO_CONTENT, "")
        }
        _ => error(StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed", "unsupported"),
    };
    Ok(response)
}

fn create_bucket(state: &MockState, bucket: String) -> Response<Full<Bytes>> {
    if state.options.reject_bucket_create {
        return error(StatusCode::FORBIDDEN, "AccessDenied", "Access Denied.");
    }
    if !state.buckets.lock().unwrap().insert(bucket) {
        return error(
            StatusCode::CONFLICT,
            "BucketAlreadyOwnedByYou",
            "bucket already exists",
        );
    }
    reply(StatusCode::OK, "")
}

fn list_objects(state: &MockState, bucket: &str) -> Response<Full<Bytes>> {
    let objects = state.objects.lock().unwrap();
    let mut xml = format!("<ListBucketResult><Name>{}</Name>", bucket);
    for ((b, key), data) in objects.iter() {
        if b == bucket {
            xml.push_str(&format!(
                "<Contents><Key>{}</Key><Size>{}</Size></Contents>",
                key,
                data.len()
            ));
        }
    }
    xml.push_str("</ListBucketResult>");
    reply(StatusCode::OK, xml)
}
