//! Request logging middleware with sensitive-field redaction.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::time::Instant;

/// Field names redacted at any nesting level before a JSON body is
/// logged, regardless of case.
static SENSITIVE_FIELDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["signature", "public_key", "invite_token", "authorization", "x-api-key"].into_iter().collect()
});

const REDACTED: &str = "***redacted***";
const MAX_LOGGED_BODY_BYTES: usize = 64 * 1024;

/// Recursively redact sensitive keys in a JSON value.
pub fn sanitize_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if SENSITIVE_FIELDS.contains(key.to_lowercase().as_str()) {
                    *entry = serde_json::Value::String(REDACTED.to_string());
                } else {
                    sanitize_json(entry);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                sanitize_json(item);
            }
        }
        _ => {}
    }
}

pub async fn request_logging(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();

    let req = if tracing::enabled!(tracing::Level::DEBUG) {
        let (parts, body) = req.into_parts();
        let (body, rendered) = redacted_body_for_log(body).await;
        tracing::debug!(%method, %uri, body = %rendered, "request body");
        Request::from_parts(parts, body)
    } else {
        req
    };

    let response = next.run(req).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();
    if status.is_server_error() {
        tracing::error!(%method, %uri, %status, elapsed_ms, "request failed");
    } else if status.is_client_error() {
        tracing::warn!(%method, %uri, %status, elapsed_ms, "request rejected");
    } else {
        tracing::info!(%method, %uri, %status, elapsed_ms, "request completed");
    }
    response
}

/// Render a JSON body for debug logging with sensitive fields redacted.
/// Bodies larger than [`MAX_LOGGED_BODY_BYTES`] are summarized by length
/// instead of being parsed, to avoid buffering unbounded uploads.
pub async fn redacted_body_for_log(body: Body) -> (Body, String) {
    let bytes = match to_bytes(body, MAX_LOGGED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return (Body::empty(), "<body too large to log>".to_string()),
    };
    let rendered = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(mut value) => {
            sanitize_json(&mut value);
            value.to_string()
        }
        Err(_) => format!("<{} non-json bytes>", bytes.len()),
    };
    (Body::from(bytes), rendered)
}
