//! Request ID middleware
//!
//! Numbers every request from a shared atomic counter, stores the number in
//! request extensions and echoes it as `X-Request-Id`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Process-wide request counter. Each router gets one injected; tests build
/// their own to stay isolated.
#[derive(Debug, Default)]
pub struct RequestCounter(AtomicU64);

pub type SharedRequestCounter = Arc<RequestCounter>;

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRequestCounter {
        Arc::new(Self::new())
    }

    /// Allocate the next ID. The first ID is `1`.
    pub fn next_id(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Last allocated ID, `0` before the first request.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Request ID stored in request extensions.
///
/// Extract in handlers: `Extension(RequestId(id)): Extension<RequestId>`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestId(pub u64);

impl RequestId {
    /// ID of the request, `0` when the request was not numbered.
    pub fn of<B>(request: &Request<B>) -> u64 {
        request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0)
            .unwrap_or(0)
    }
}

/// Shared slot for the request ID, placed in request extensions by layers
/// outside this one. Lets a response built above the request ID layer (the
/// panic response) carry the ID as well.
#[derive(Clone, Debug, Default)]
pub struct RequestIdSlot(Arc<OnceLock<u64>>);

impl RequestIdSlot {
    pub fn set(&self, id: u64) {
        let _ = self.0.set(id);
    }

    pub fn get(&self) -> Option<u64> {
        self.0.get().copied()
    }
}

pub async fn request_id_middleware(
    State(counter): State<SharedRequestCounter>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let id = counter.next_id();
    request.extensions_mut().insert(RequestId(id));
    if let Some(slot) = request.extensions().get::<RequestIdSlot>() {
        slot.set(id);
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(REQUEST_ID_HEADER, HeaderValue::from(id));

    response
}
