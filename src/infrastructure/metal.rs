//! REST metal backend
//!
//! Dials the metal server over HTTPS: authorizes with username and password
//! (`POST v1/authorize`), then reads report data with the bearer token
//! (`POST v1/report-data`).

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::client::Client;
use crate::application::ports::{AuthContext, MetalClient, MetalDialer};
use crate::config::MetalConfig;
use crate::domain::ReadReportDataRequest;
use crate::support::errors::{BackendError, ClientError};

pub const AUTHORIZE_PATH: &str = "v1/authorize";
pub const REPORT_DATA_PATH: &str = "v1/report-data";

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub token: String,
}

/// Dials a new, authorized [`RestMetalClient`] for every call.
pub struct RestMetalDialer {
    config: MetalConfig,
}

impl RestMetalDialer {
    pub fn new(config: MetalConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MetalDialer for RestMetalDialer {
    async fn dial(&self) -> Result<Box<dyn MetalClient>, BackendError> {
        let client = Client::new(&self.config.url, self.config.insecure_tls)?
            .with_debug(self.config.debug);

        let auth = AuthorizeRequest {
            username: self.config.username.clone(),
            password: self.config.password.clone(),
        };

        let resp: AuthorizeResponse =
            client
                .post(AUTHORIZE_PATH, &auth)
                .await
                .map_err(|e| match e {
                    ClientError::Status(status) => BackendError::Unauthorized(status),
                    ClientError::Transport(e) => BackendError::Connect(e.to_string()),
                    other => other.into(),
                })?;

        debug!(url = %self.config.url, user = %self.config.username, "metal client authorized");

        Ok(Box::new(RestMetalClient {
            client,
            ctx: AuthContext::bearer(resp.token),
            closed: false,
        }))
    }
}

pub struct RestMetalClient {
    client: Client,
    ctx: AuthContext,
    closed: bool,
}

#[async_trait]
impl MetalClient for RestMetalClient {
    fn context(&self) -> AuthContext {
        self.ctx.clone()
    }

    async fn read_report_data(
        &self,
        ctx: &AuthContext,
        request: &ReadReportDataRequest,
    ) -> Result<Vec<u8>, BackendError> {
        if self.closed {
            return Err(BackendError::Connect("client is closed".to_string()));
        }

        let headers: Vec<_> = ctx
            .authorization_header()
            .map(|value| (AUTHORIZATION, value))
            .into_iter()
            .collect();
        let body = serde_json::to_vec(request).map_err(ClientError::from)?;

        let payload = self
            .client
            .request(Method::POST, REPORT_DATA_PATH, &headers, Some(body))
            .await?;

        Ok(payload)
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.closed = true;
        Ok(())
    }
}
