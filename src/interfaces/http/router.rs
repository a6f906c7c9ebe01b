//! API router

use std::time::Duration;

use axum::{routing::get, Json, Router};
use tower_http::timeout::RequestBodyTimeoutLayer;
use utoipa::OpenApi;

use super::handlers::{report, SharedReporter};
use super::middleware::{report_chain, SharedRequestCounter};
use crate::domain::GetReportResponse;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(title = "Metal Operations Server", version = "1"),
    paths(report::get_report),
    components(schemas(GetReportResponse)),
    tags((name = "Reports", description = "Operational reports rendered from templates"))
)]
pub struct ApiDoc;

/// Everything the router needs.
#[derive(Clone)]
pub struct RouterOptions {
    pub reporter: SharedReporter,
    pub request_counter: SharedRequestCounter,
    /// Limit on reading an inbound request body.
    pub read_timeout: Duration,
}

/// Build the API router.
///
/// `GET /report/{name}` runs behind the report middleware chain;
/// `GET /openapi.json` does not.
pub fn create_api_router(opts: RouterOptions) -> Router {
    let reports = Router::new().route("/report/{name}", get(report::get_report));
    let reports = report_chain(opts.request_counter).apply(reports);

    Router::new()
        .merge(reports.with_state(opts.reporter))
        .route("/openapi.json", get(openapi))
        .layer(RequestBodyTimeoutLayer::new(opts.read_timeout))
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
