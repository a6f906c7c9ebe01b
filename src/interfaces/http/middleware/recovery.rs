//! Panic recovery
//!
//! Turns a panic anywhere below this layer into a logged error and a bare
//! `500 Internal Server Error`. The panic payload never reaches the client.
//! The response still carries `X-Request-Id` when the request was numbered
//! before the panic.

use std::any::Any;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

use super::request_id::{RequestIdSlot, REQUEST_ID_HEADER};

pub const PANIC_BODY: &str = "Internal Server Error";

type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

/// Layer that contains panics of the wrapped service.
pub fn recovery_layer() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(handle_panic as PanicHandler)
}

/// Wrap `router` with panic recovery.
pub fn recover<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(recovery_layer())
        .layer(middleware::from_fn(request_id_slot_middleware))
}

/// Hands a [`RequestIdSlot`] down the chain and stamps the ID it receives on
/// responses that lack one.
async fn request_id_slot_middleware(mut request: Request<Body>, next: Next) -> Response {
    let slot = RequestIdSlot::default();
    request.extensions_mut().insert(slot.clone());

    let mut response = next.run(request).await;

    if let Some(id) = slot.get() {
        if !response.headers().contains_key(REQUEST_ID_HEADER) {
            response
                .headers_mut()
                .insert(REQUEST_ID_HEADER, HeaderValue::from(id));
        }
    }

    response
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    error!(error = %panic_message(payload.as_ref()), "panic recovered");

    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, PANIC_BODY).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
