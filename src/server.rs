//! Reusable server runtime.
//!
//! Provides [`ServerHandle`] that encapsulates the server lifecycle: wiring
//! the backend dialer and the template engine into the API router, serving
//! it, and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::application::ports::MetalDialer;
use crate::application::templates::{EngineOptions, ReportEngine, TemplateSource};
use crate::config::{AppConfig, LoggingConfig, TemplatesConfig};
use crate::infrastructure::RestMetalDialer;
use crate::interfaces::http::handlers::{Reporter, SharedReporter};
use crate::interfaces::http::middleware::RequestCounter;
use crate::interfaces::http::{create_api_router, RouterOptions};
use crate::support::errors::ServerError;
use crate::support::shutdown::{listen_for_shutdown_signals, ShutdownSignal};

/// Install the global log subscriber.
///
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(cfg: &LoggingConfig) -> Result<(), ServerError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if cfg.json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| ServerError::Logging(e.to_string()))
}

/// Template engine for the configured report directory. Nothing is read
/// until the first render.
pub fn report_engine(cfg: &TemplatesConfig) -> ReportEngine {
    ReportEngine::new(
        TemplateSource::Directory(cfg.dir.clone()),
        EngineOptions {
            strict: cfg.strict,
            max_include_depth: cfg.max_include_depth,
        },
    )
}

/// Handle to a running server.
pub struct ServerHandle {
    /// Address the listener is bound to.
    pub local_addr: SocketAddr,
    /// Report handler state, shared with the router.
    pub reporter: SharedReporter,

    shutdown: ShutdownSignal,
    shutdown_timeout: Duration,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Start serving with the REST backend described by `config.metal`.
    pub async fn start(config: AppConfig) -> Result<Self, ServerError> {
        let dialer = Arc::new(RestMetalDialer::new(config.metal.clone()));
        Self::start_with(&config, dialer).await
    }

    /// Start serving with the given backend dialer.
    pub async fn start_with(
        config: &AppConfig,
        dialer: Arc<dyn MetalDialer>,
    ) -> Result<Self, ServerError> {
        let reporter = Arc::new(Reporter::new(dialer, report_engine(&config.templates)));

        let router = create_api_router(RouterOptions {
            reporter: reporter.clone(),
            request_counter: RequestCounter::shared(),
            read_timeout: config.server.read_timeout(),
        });

        let addr = config.server.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(
            address = %local_addr,
            templates = %config.templates.dir.display(),
            metal = %config.metal.url,
            "listening"
        );

        let shutdown = ShutdownSignal::new();
        let server_shutdown = shutdown.clone();
        let server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            server_shutdown.wait().await;
            info!("server received shutdown signal");
        });

        let task = tokio::spawn(async move { server.await });

        Ok(Self {
            local_addr,
            reporter,
            shutdown,
            shutdown_timeout: config.server.shutdown_timeout(),
            task,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        tokio::spawn(listen_for_shutdown_signals(self.shutdown.clone()));
    }

    /// Wait for the server to stop.
    ///
    /// Once shutdown is triggered, in-flight requests get the configured
    /// grace period before the server task is aborted.
    pub async fn wait(self) -> Result<(), ServerError> {
        let mut task = self.task;

        tokio::select! {
            result = &mut task => return joined(result),
            _ = self.shutdown.wait() => {}
        }

        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(result) => joined(result),
            Err(_) => {
                warn!(
                    timeout_secs = self.shutdown_timeout.as_secs(),
                    "in-flight requests did not finish in time, aborting"
                );
                task.abort();
                Ok(())
            }
        }
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        info!("shutting down");
        self.shutdown.trigger();
        self.wait().await
    }
}

fn joined(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    match result {
        Ok(Ok(())) => {
            info!("server stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "server error");
            Err(ServerError::Serve(e))
        }
        Err(e) => {
            error!(error = %e, "server task panicked");
            Err(ServerError::Serve(std::io::Error::other(e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MetalClient;
    use crate::support::errors::BackendError;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl MetalDialer for Unreachable {
        async fn dial(&self) -> Result<Box<dyn MetalClient>, BackendError> {
            Err(BackendError::Connect("unreachable".to_string()))
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.server.shutdown_timeout_secs = 1;
        config
    }

    #[tokio::test]
    async fn test_start_serve_and_shutdown() {
        let handle = ServerHandle::start_with(&test_config(), Arc::new(Unreachable))
            .await
            .unwrap();
        assert_ne!(handle.local_addr.port(), 0);
        assert!(!handle.reporter.engine().is_initialized());

        let url = format!("http://{}/openapi.json", handle.local_addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("Timeout")
            .unwrap();
    }

    #[tokio::test]
    async fn test_bind_error() {
        let first = ServerHandle::start_with(&test_config(), Arc::new(Unreachable))
            .await
            .unwrap();

        let mut config = test_config();
        config.server.port = first.local_addr.port();
        let err = ServerHandle::start_with(&config, Arc::new(Unreachable))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));

        first.shutdown().await.unwrap();
    }
}
