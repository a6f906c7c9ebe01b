use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors from the REST client helper
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("http error: {0}")]
    Status(String),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the metal backend collaborator
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("authorization failed: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read templates from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no *.tmpl templates found in {0}")]
    NoTemplates(PathBuf),

    #[error("failed to parse template: {0}")]
    Parse(#[from] handlebars::TemplateError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse CIDR {cidr:?}: {reason}")]
pub struct CidrError {
    pub cidr: String,
    pub reason: String,
}

/// Request-scoped failures of the report pipeline. Every variant maps to a
/// `500` with the message as a plain-text body.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0}")]
    Initialization(String),

    #[error("failed to dial metal client: {0}")]
    Dial(#[source] BackendError),

    #[error("failed to read report data: {0}")]
    Fetch(#[source] BackendError),

    #[error("invalid report data: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to execute template {name:?}: {source}")]
    Render {
        name: String,
        #[source]
        source: handlebars::RenderError,
    },

    #[error("failed to encode report: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("Failed to install log subscriber: {0}")]
    Logging(String),
}
