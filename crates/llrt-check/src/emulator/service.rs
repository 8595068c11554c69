//! Hyper service implementing the Lambda Runtime API routes.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::{API_VERSION, PendingSlot};
use crate::invocation::InvocationRecord;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("lambda-runtime-aws-request-id");
pub const DEADLINE_HEADER: HeaderName = HeaderName::from_static("lambda-runtime-deadline-ms");
pub const FUNCTION_ARN_HEADER: HeaderName =
    HeaderName::from_static("lambda-runtime-invoked-function-arn");
pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("lambda-runtime-trace-id");

const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:test-function";
const TRACE_ID: &str = "Root=1-5e6722a7-cc56xmpl46db7ae02d2fd7a8;Parent=91ed514f1e5c03a2;Sampled=1";

/// A recognized Runtime API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Next,
    Response(String),
    Error(String),
    InitError,
    NotFound,
}

impl Route {
    pub fn parse(method: &Method, path: &str) -> Self {
        let Some(rest) = path
            .strip_prefix('/')
            .and_then(|p| p.strip_prefix(API_VERSION))
            .and_then(|p| p.strip_prefix("/runtime/"))
        else {
            return Route::NotFound;
        };

        match (method, rest) {
            (&Method::GET, "invocation/next") => Route::Next,
            (&Method::POST, "init/error") => Route::InitError,
            (&Method::POST, _) => {
                let Some(tail) = rest.strip_prefix("invocation/") else {
                    return Route::NotFound;
                };
                match tail.split_once('/') {
                    Some((id, "response")) if valid_id(id) => Route::Response(id.to_string()),
                    Some((id, "error")) if valid_id(id) => Route::Error(id.to_string()),
                    _ => Route::NotFound,
                }
            }
            _ => Route::NotFound,
        }
    }
}

fn valid_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('/')
}

/// Per-connection service; all connections share the emulator's pending slot.
#[derive(Clone)]
pub struct RuntimeApiService {
    pending: PendingSlot,
}

impl RuntimeApiService {
    pub fn new(pending: PendingSlot) -> Self {
        Self { pending }
    }
}

impl Service<Request<Incoming>> for RuntimeApiService {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let pending = Arc::clone(&self.pending);

        Box::pin(async move {
            let route = Route::parse(req.method(), req.uri().path());
            tracing::debug!("{} {} -> {:?}", req.method(), req.uri().path(), route);

            let response = match route {
                Route::Next => {
                    // Cleared on serve: a second poll sees 204.
                    let record = pending.lock().take();
                    match record {
                        Some(record) => invocation_response(&record),
                        None => status_only(StatusCode::NO_CONTENT),
                    }
                }
                Route::Response(id) => match drain(req).await {
                    Some(body) => {
                        tracing::info!("Lambda response [{}]: {}", id, body);
                        status_only(StatusCode::OK)
                    }
                    None => status_only(StatusCode::NOT_FOUND),
                },
                Route::Error(id) => match drain(req).await {
                    Some(body) => {
                        tracing::warn!("Lambda error [{}]: {}", id, body);
                        status_only(StatusCode::OK)
                    }
                    None => status_only(StatusCode::NOT_FOUND),
                },
                Route::InitError => match drain(req).await {
                    Some(body) => {
                        tracing::warn!("Lambda init error: {}", body);
                        status_only(StatusCode::OK)
                    }
                    None => status_only(StatusCode::NOT_FOUND),
                },
                Route::NotFound => status_only(StatusCode::NOT_FOUND),
            };

            Ok(response)
        })
    }
}

async fn drain(req: Request<Incoming>) -> Option<String> {
    match req.into_body().collect().await {
        Ok(collected) => Some(String::from_utf8_lossy(&collected.to_bytes()).into_owned()),
        Err(e) => {
            tracing::warn!("failed to read request body: {}", e);
            None
        }
    }
}

fn status_only(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::default());
    *response.status_mut() = status;
    response
}

fn invocation_response(record: &InvocationRecord) -> Response<Full<Bytes>> {
    let body = match serde_json::to_vec(&record.payload) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("failed to serialize invocation {}: {}", record.id, e);
            return status_only(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    let headers = response.headers_mut();
    let values = [
        (REQUEST_ID_HEADER, record.id.clone()),
        (DEADLINE_HEADER, record.deadline_ms.to_string()),
        (FUNCTION_ARN_HEADER, FUNCTION_ARN.to_string()),
        (TRACE_ID_HEADER, TRACE_ID.to_string()),
    ];
    for (name, value) in values {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(e) => tracing::warn!("dropping header {}: {}", name, e),
        }
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
