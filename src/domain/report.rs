//! Report request and response types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::scope::ReportScope;

/// Report data returned by the metal backend.
///
/// The shape is defined by the backend and consumed only by templates, so it
/// is kept as an untyped JSON document.
pub type ReportData = serde_json::Value;

/// Backend request for report data. Unset filters are omitted from the wire
/// format entirely rather than sent as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReportDataRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl From<&ReportScope> for ReadReportDataRequest {
    fn from(scope: &ReportScope) -> Self {
        let set = |v: &str| (!v.is_empty()).then(|| v.to_string());

        Self {
            zone: set(&scope.zone),
            cluster: set(&scope.cluster),
            host: set(&scope.host),
        }
    }
}

/// Response body of `GET /report/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GetReportResponse {
    /// Rendered report text
    pub report: String,
}
