//! Ports to the metal-management backend
//!
//! The report handler only sees these traits. A [`MetalDialer`] is the
//! factory that produces a connected, authorized [`MetalClient`] per request.

use async_trait::async_trait;

use crate::domain::ReadReportDataRequest;
use crate::support::errors::BackendError;

/// Credentials carried alongside every backend call made with a handle.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    token: Option<String>,
}

impl AuthContext {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn authorization_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {t}"))
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A connected, authorized backend handle. Owned by exactly one request.
#[async_trait]
pub trait MetalClient: Send + Sync {
    /// Auth context obtained when the handle was authorized.
    fn context(&self) -> AuthContext;

    /// Read the raw report document for the given filters.
    async fn read_report_data(
        &self,
        ctx: &AuthContext,
        request: &ReadReportDataRequest,
    ) -> Result<Vec<u8>, BackendError>;

    /// Release the handle.
    async fn close(&mut self) -> Result<(), BackendError>;
}

/// Factory for backend handles.
#[async_trait]
pub trait MetalDialer: Send + Sync {
    async fn dial(&self) -> Result<Box<dyn MetalClient>, BackendError>;
}
