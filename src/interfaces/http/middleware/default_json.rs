//! Default JSON content type

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Sets `Content-Type: application/json; charset=utf-8` on responses whose
/// handler did not choose a content type.
pub async fn default_json_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    if !response.headers().contains_key(header::CONTENT_TYPE) {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
    }

    response
}
