use crate::error::ApiError;
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;

/// Request body fields whose values must never reach the logs
const REDACTED_FIELDS: &[&str] = &["receipt", "purchaseToken"];
/// Bodies larger than this are rejected before reaching the handler
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
const MAX_LOGGED_CHARS: usize = 2000;

/// Middleware that logs request and response bodies with secrets redacted
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let (parts, body) = request.into_parts();

    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(request_id = %request_id, "Failed to read request body: {}", e);
            return ApiError::BadRequest(format!("unreadable request body: {}", e)).into_response();
        }
    };

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        body = %truncate_body(&redact_body(&bytes), MAX_LOGGED_CHARS),
        "→ Request"
    );

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let status = response.status();
    let (parts, body) = response.into_parts();

    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(request_id = %request_id, "Failed to read response body: {}", e);
            Bytes::new()
        }
    };

    let response_body = String::from_utf8_lossy(&bytes);

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = %start.elapsed().as_millis(),
        body = %truncate_body(&response_body, MAX_LOGGED_CHARS),
        "← Response"
    );

    Response::from_parts(parts, Body::from(bytes))
}

/// Render a request body for logging, masking receipt material
///
/// Non-JSON bodies are not logged verbatim since they cannot be redacted.
fn redact_body(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(mut value) => {
            if let Some(object) = value.as_object_mut() {
                for field in REDACTED_FIELDS {
                    if let Some(entry) = object.get_mut(*field) {
                        let len = entry.as_str().map(str::len).unwrap_or(0);
                        *entry = serde_json::Value::String(format!("<redacted {} bytes>", len));
                    }
                }
            }
            value.to_string()
        }
        Err(_) => format!("<non-JSON body, {} bytes>", bytes.len()),
    }
}

/// Truncate body for logging, adding ellipsis if truncated
fn truncate_body(body: &str, max_chars: usize) -> String {
    let body = body.trim();
    match body.char_indices().nth(max_chars) {
        None => body.to_string(),
        Some((cut, _)) => format!(
            "{}...[truncated, {} bytes total]",
            &body[..cut],
            body.len()
        ),
    }
}
