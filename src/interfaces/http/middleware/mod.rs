//! HTTP middleware
//!
//! - `recovery`: panic containment
//! - `request_id`: numeric `X-Request-Id`
//! - `access_log`: one structured event per request
//! - `default_json`: default `Content-Type`
//! - `recorder`: response capture used by the access log
//!
//! [`Chain`] composes middleware in the order they are listed: the first one
//! is the outermost, it sees the request first and the response last.

pub mod access_log;
pub mod default_json;
pub mod recorder;
pub mod recovery;
pub mod request_id;

use axum::{middleware, Router};

pub use access_log::access_log_middleware;
pub use default_json::{default_json_middleware, JSON_CONTENT_TYPE};
pub use recorder::ResponseRecorder;
pub use recovery::{recover, recovery_layer};
pub use request_id::{
    request_id_middleware, RequestCounter, RequestId, RequestIdSlot, SharedRequestCounter,
    REQUEST_ID_HEADER,
};

/// A middleware is a transform that wraps a handler (a `Router`, a
/// `MethodRouter`, ...) into a new one.
pub type Middleware<T> = Box<dyn Fn(T) -> T + Send + Sync>;

/// Ordered list of middleware.
pub struct Chain<T> {
    middleware: Vec<Middleware<T>>,
}

impl<T> Chain<T> {
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
        }
    }

    /// Append a middleware. It runs inside every middleware added before it.
    pub fn with<F>(mut self, mw: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.middleware.push(Box::new(mw));
        self
    }

    /// Wrap `handler` with every middleware of the chain.
    pub fn apply(&self, handler: T) -> T {
        // Wrap innermost first so the first listed ends up outermost.
        self.middleware
            .iter()
            .rev()
            .fold(handler, |handler, mw| mw(handler))
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The chain wrapped around report routes: recovery, request ID, access
/// log, default JSON content type.
pub fn report_chain<S>(counter: SharedRequestCounter) -> Chain<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    Chain::new()
        .with(|r: Router<S>| recover(r))
        .with(move |r: Router<S>| {
            r.layer(middleware::from_fn_with_state(
                counter.clone(),
                request_id_middleware,
            ))
        })
        .with(|r: Router<S>| r.layer(middleware::from_fn(access_log_middleware)))
        .with(|r: Router<S>| r.layer(middleware::from_fn(default_json_middleware)))
}
