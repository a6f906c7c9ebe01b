//! Access log middleware
//!
//! Emits one `handler` event per request once the response is complete. The
//! event is emitted from a drop guard, so it is written even when a panic
//! unwinds through this layer on its way to the recovery layer, or when the
//! request is cancelled. No response went through this layer in either case,
//! so the event carries status `0`.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, HeaderName, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use super::recorder::ResponseRecorder;
use super::request_id::RequestId;

/// Request side of an access log entry plus the recorded response.
struct AccessEntry {
    started: Instant,
    method: Method,
    path: String,
    query: String,
    request_bytes: u64,
    address: String,
    user_agent: String,
    id: u64,
    recorder: ResponseRecorder,
}

impl AccessEntry {
    fn start(request: &Request<Body>) -> Self {
        Self {
            started: Instant::now(),
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            query: request.uri().query().unwrap_or_default().to_string(),
            request_bytes: header_str(request, header::CONTENT_LENGTH).parse().unwrap_or(0),
            address: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.to_string())
                .unwrap_or_default(),
            user_agent: header_str(request, header::USER_AGENT).to_string(),
            id: RequestId::of(request),
            recorder: ResponseRecorder::new(),
        }
    }

    fn emit(&self, duration: Duration) {
        let entry = self;
        let rec = &self.recorder;

        macro_rules! access_event {
            ($level:expr $(, $field:ident = $value:expr)*) => {
                tracing::event!(
                    $level,
                    call.method = %entry.method,
                    call.path = %entry.path,
                    call.query = %entry.query,
                    call.bytes = entry.request_bytes,
                    result.status = rec.status_code(),
                    result.duration = ?duration,
                    result.bytes = rec.bytes_written(),
                    $(result.$field = $value,)*
                    client.address = %entry.address,
                    client.user_agent = %entry.user_agent,
                    id = entry.id,
                    "handler"
                )
            };
        }

        if rec.is_error() {
            access_event!(tracing::Level::ERROR, error = rec.error_body().unwrap_or_default());
        } else {
            access_event!(tracing::Level::INFO);
        }
    }
}

impl Drop for AccessEntry {
    fn drop(&mut self) {
        self.emit(self.started.elapsed());
    }
}

fn header_str(request: &Request<Body>, name: HeaderName) -> &str {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub async fn access_log_middleware(request: Request<Body>, next: Next) -> Response {
    let mut entry = AccessEntry::start(&request);

    let response = next.run(request).await;
    let (parts, body) = response.into_parts();

    // Responses are never streamed, so the body is complete once collected.
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "failed to read response body");
            let failed = format!("failed to read response body: {e}");
            entry.recorder.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            entry.recorder.write(failed.as_bytes());
            return (StatusCode::INTERNAL_SERVER_ERROR, failed).into_response();
        }
    };
    entry.recorder.write_header(parts.status);
    entry.recorder.write(&bytes);

    Response::from_parts(parts, Body::from(bytes))
}
