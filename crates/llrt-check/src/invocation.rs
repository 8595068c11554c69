//! Invocation records and the synthetic API Gateway event.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};

/// How long an invocation is allowed to run, as advertised in
/// `Lambda-Runtime-Deadline-Ms`.
pub const DEADLINE_WINDOW_MS: u64 = 30_000;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// A queued invocation on the Runtime API emulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecord {
    /// Request id handed out in `Lambda-Runtime-Aws-Request-Id`.
    pub id: String,
    pub payload: Value,
    /// Epoch milliseconds.
    pub deadline_ms: u64,
}

impl InvocationRecord {
    /// New record with a fresh id and a deadline fixed now.
    pub fn new(payload: Value) -> Self {
        let now = epoch_millis();
        let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("test-{}-{}", now, seq),
            payload,
            deadline_ms: now + DEADLINE_WINDOW_MS,
        }
    }
}

pub(crate) fn epoch_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Minimal HTTP API (v2) event for `GET /hello?name=Test`.
///
/// The same value is delivered to both runtimes in one comparison.
pub fn synthetic_event() -> Value {
    json!({
        "version": "2.0",
        "routeKey": "GET /hello",
        "rawPath": "/hello",
        "rawQueryString": "name=Test",
        "queryStringParameters": {
            "name": "Test"
        },
        "requestContext": {
            "accountId": "123456789012",
            "apiId": "api-id",
            "domainName": "id.execute-api.us-east-1.amazonaws.com",
            "domainPrefix": "id",
            "http": {
                "method": "GET",
                "path": "/hello",
                "protocol": "HTTP/1.1",
                "sourceIp": "IP",
                "userAgent": "agent"
            },
            "requestId": "id",
            "routeKey": "GET /hello",
            "stage": "$default",
            "time": "12/Mar/2020:19:03:58 +0000",
            "timeEpoch": 1583348638390u64
        },
        "isBase64Encoded": false
    })
}
