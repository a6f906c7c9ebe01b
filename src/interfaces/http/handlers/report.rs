//! Report handler
//!
//! `GET /report/{name}`: fetch report data from the metal backend for the
//! requested scope and render it through the template `name`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::application::ports::{MetalClient, MetalDialer};
use crate::application::templates::ReportEngine;
use crate::domain::{GetReportResponse, ReadReportDataRequest, ReportData, ReportScope};
use crate::support::errors::ReportError;

/// Report handler state
pub struct Reporter {
    dialer: Arc<dyn MetalDialer>,
    engine: ReportEngine,
}

pub type SharedReporter = Arc<Reporter>;

impl Reporter {
    pub fn new(dialer: Arc<dyn MetalDialer>, engine: ReportEngine) -> Self {
        Self { dialer, engine }
    }

    pub fn engine(&self) -> &ReportEngine {
        &self.engine
    }

    /// Render the template `name` for `scope`. Returns the rendered text.
    pub async fn report(&self, scope: &ReportScope, name: &str) -> Result<String, ReportError> {
        self.engine.registry()?;

        let mut client = self.dialer.dial().await.map_err(ReportError::Dial)?;

        let result = self.render_from(client.as_ref(), scope, name).await;

        if let Err(e) = client.close().await {
            error!(error = %e, "failed to close metal client");
        }

        result
    }

    async fn render_from(
        &self,
        client: &dyn MetalClient,
        scope: &ReportScope,
        name: &str,
    ) -> Result<String, ReportError> {
        let ctx = client.context();
        let request = ReadReportDataRequest::from(scope);
        debug!(template = name, scope = %scope.query(), "reading report data");

        let payload = client
            .read_report_data(&ctx, &request)
            .await
            .map_err(ReportError::Fetch)?;

        let data: ReportData = serde_json::from_slice(&payload).map_err(ReportError::Decode)?;

        self.engine.render(name, &data)
    }
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

#[utoipa::path(
    get,
    path = "/report/{name}",
    tag = "Reports",
    summary = "report template",
    description = "Renders a report from the named template.",
    params(
        ("name" = String, Path, description = "Template name, without extension"),
        ReportScope
    ),
    responses(
        (status = 200, description = "Rendered report", body = GetReportResponse),
        (status = 500, description = "Backend or template failure", body = String, content_type = "text/plain")
    )
)]
pub async fn get_report(
    State(reporter): State<SharedReporter>,
    Path(name): Path<String>,
    scope: ReportScope,
) -> Result<Response, ReportError> {
    let report = reporter.report(&scope, &name).await?;

    // Encoded in full before anything is sent, so a failure here can still
    // become a 500.
    let body = serde_json::to_vec(&GetReportResponse { report }).map_err(ReportError::Encode)?;

    // No content type here: the default JSON middleware sets it.
    Ok(Response::new(Body::from(body)))
}
