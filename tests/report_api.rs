//! End-to-end tests of `GET /report/{name}` against an in-memory backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use mops::application::ports::{AuthContext, MetalClient, MetalDialer};
use mops::application::templates::{EngineOptions, ReportEngine, TemplateSource};
use mops::domain::ReadReportDataRequest;
use mops::interfaces::http::handlers::Reporter;
use mops::interfaces::http::middleware::{RequestCounter, JSON_CONTENT_TYPE, REQUEST_ID_HEADER};
use mops::interfaces::http::{create_api_router, RouterOptions};
use mops::support::errors::BackendError;

// ── Fake backend ───────────────────────────────────────────────

#[derive(Default)]
struct Backend {
    payload: Vec<u8>,
    fail_dial: bool,
    fail_fetch: bool,
    fail_close: bool,
    dials: AtomicUsize,
    closes: AtomicUsize,
    requests: Mutex<Vec<ReadReportDataRequest>>,
    tokens: Mutex<Vec<Option<String>>>,
}

impl Backend {
    fn serving(payload: Value) -> Self {
        Self {
            payload: payload.to_string().into_bytes(),
            ..Default::default()
        }
    }

    fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct FakeDialer(Arc<Backend>);

#[async_trait]
impl MetalDialer for FakeDialer {
    async fn dial(&self) -> Result<Box<dyn MetalClient>, BackendError> {
        self.0.dials.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_dial {
            return Err(BackendError::Connect("connection refused".to_string()));
        }
        Ok(Box::new(FakeClient(self.0.clone())))
    }
}

struct FakeClient(Arc<Backend>);

#[async_trait]
impl MetalClient for FakeClient {
    fn context(&self) -> AuthContext {
        AuthContext::bearer("t0ken")
    }

    async fn read_report_data(
        &self,
        ctx: &AuthContext,
        request: &ReadReportDataRequest,
    ) -> Result<Vec<u8>, BackendError> {
        self.0.requests.lock().unwrap().push(request.clone());
        self.0
            .tokens
            .lock()
            .unwrap()
            .push(ctx.token().map(str::to_string));
        if self.0.fail_fetch {
            return Err(BackendError::Unauthorized("401 Unauthorized".to_string()));
        }
        Ok(self.0.payload.clone())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_close {
            return Err(BackendError::Connect("already gone".to_string()));
        }
        Ok(())
    }
}

// ── Helpers ────────────────────────────────────────────────────

fn templates() -> TemplateSource {
    TemplateSource::inline([
        (
            "summary",
            "{{#each hosts}}{{name}}={{upper state}};{{/each}}",
        ),
        (
            "hosts",
            "{{#each hosts}}{{include \"host\" this}}\n{{/each}}",
        ),
        (
            "host",
            "{{name}} {{address cidr}}/{{netmask cidr}}",
        ),
        ("markup", "<b>{{title}}</b> & \"quoted\""),
    ])
}

fn app(backend: Arc<Backend>, source: TemplateSource) -> (Router, Arc<Reporter>) {
    let reporter = Arc::new(Reporter::new(
        Arc::new(FakeDialer(backend)),
        ReportEngine::new(source, EngineOptions::default()),
    ));
    let router = create_api_router(RouterOptions {
        reporter: reporter.clone(),
        request_counter: RequestCounter::shared(),
        read_timeout: Duration::from_secs(5),
    });
    (router, reporter)
}

fn hosts() -> Value {
    json!({
        "hosts": [
            {"name": "node-1", "state": "up", "cidr": "10.0.0.5/24"},
            {"name": "node-2", "state": "down", "cidr": "10.0.1.9/16"}
        ]
    })
}

async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

// ── Tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_report_success() {
    let backend = Arc::new(Backend::serving(hosts()));
    let (router, _) = app(backend.clone(), templates());

    let (status, headers, body) = get(router, "/report/summary?zone=z1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), JSON_CONTENT_TYPE);
    assert_eq!(headers.get(&REQUEST_ID_HEADER).unwrap(), "1");

    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, json!({"report": "node-1=UP;node-2=DOWN;"}));

    assert_eq!(backend.dials(), 1);
    assert_eq!(backend.closes(), 1);
}

#[tokio::test]
async fn test_only_set_filters_reach_backend() {
    let backend = Arc::new(Backend::serving(hosts()));
    let (router, _) = app(backend.clone(), templates());

    let (status, _, _) = get(router, "/report/summary?zone=z1&cluster=&rack=r9").await;
    assert_eq!(status, StatusCode::OK);

    let requests = backend.requests.lock().unwrap();
    assert_eq!(
        *requests,
        vec![ReadReportDataRequest {
            zone: Some("z1".to_string()),
            ..Default::default()
        }]
    );
    assert_eq!(
        serde_json::to_value(&requests[0]).unwrap(),
        json!({"zone": "z1"})
    );
    assert_eq!(
        *backend.tokens.lock().unwrap(),
        vec![Some("t0ken".to_string())]
    );
}

#[tokio::test]
async fn test_include_and_cidr_helpers() {
    let backend = Arc::new(Backend::serving(hosts()));
    let (router, _) = app(backend, templates());

    let (status, _, body) = get(router, "/report/hosts").await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        body["report"],
        "node-1 10.0.0.5/255.255.255.0\nnode-2 10.0.1.9/255.255.0.0\n"
    );
}

#[tokio::test]
async fn test_output_is_not_html_escaped() {
    let backend = Arc::new(Backend::serving(json!({"title": "a<b"})));
    let (router, _) = app(backend, templates());

    let (status, _, body) = get(router, "/report/markup").await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["report"], "<b>a<b</b> & \"quoted\"");
}

#[tokio::test]
async fn test_missing_template() {
    let backend = Arc::new(Backend::serving(hosts()));
    let (router, _) = app(backend.clone(), templates());

    let (status, headers, body) = get(router, "/report/missing").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("missing"), "body: {body}");
    assert!(headers
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(backend.closes(), 1);
}

#[tokio::test]
async fn test_dial_failure_never_closes() {
    let backend = Arc::new(Backend {
        fail_dial: true,
        ..Default::default()
    });
    let (router, _) = app(backend.clone(), templates());

    let (status, _, body) = get(router, "/report/summary").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("failed to dial metal client"), "body: {body}");
    assert!(body.contains("connection refused"), "body: {body}");
    assert_eq!(backend.dials(), 1);
    assert_eq!(backend.closes(), 0);
}

#[tokio::test]
async fn test_fetch_failure_still_closes() {
    let backend = Arc::new(Backend {
        fail_fetch: true,
        ..Default::default()
    });
    let (router, _) = app(backend.clone(), templates());

    let (status, _, body) = get(router, "/report/summary").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("401 Unauthorized"), "body: {body}");
    assert_eq!(backend.closes(), 1);
}

#[tokio::test]
async fn test_close_failure_is_not_surfaced() {
    let backend = Arc::new(Backend {
        fail_close: true,
        ..Backend::serving(hosts())
    });
    let (router, _) = app(backend.clone(), templates());

    let (status, _, _) = get(router, "/report/summary").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.closes(), 1);
}

#[tokio::test]
async fn test_malformed_payload() {
    let backend = Arc::new(Backend {
        payload: b"{not json".to_vec(),
        ..Default::default()
    });
    let (router, _) = app(backend.clone(), templates());

    let (status, _, body) = get(router, "/report/summary").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("invalid report data"), "body: {body}");
    assert_eq!(backend.closes(), 1);
}

#[tokio::test]
async fn test_initialization_failure_is_sticky() {
    let backend = Arc::new(Backend::serving(hosts()));
    let broken = TemplateSource::inline([("summary", "{{#each hosts}}")]);
    let (router, reporter) = app(backend.clone(), broken);

    for _ in 0..3 {
        let (status, _, body) = get(router.clone(), "/report/summary").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.is_empty());
    }

    assert!(reporter.engine().is_initialized());
    // Never reaches the backend
    assert_eq!(backend.dials(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_get_unique_ids() {
    const N: usize = 32;

    let backend = Arc::new(Backend::serving(hosts()));
    let (router, _) = app(backend.clone(), templates());

    let calls = (0..N).map(|_| get(router.clone(), "/report/summary"));
    let results = futures_util::future::join_all(calls).await;

    let mut ids: Vec<u64> = results
        .iter()
        .map(|(status, headers, _)| {
            assert_eq!(*status, StatusCode::OK);
            headers
                .get(&REQUEST_ID_HEADER)
                .unwrap()
                .to_str()
                .unwrap()
                .parse()
                .unwrap()
        })
        .collect();
    ids.sort_unstable();

    assert_eq!(ids, (1..=N as u64).collect::<Vec<_>>());
    assert_eq!(backend.dials(), N);
    assert_eq!(backend.closes(), N);
}

#[tokio::test]
async fn test_openapi_outside_chain() {
    let backend = Arc::new(Backend::serving(hosts()));
    let (router, _) = app(backend, templates());

    let (status, headers, body) = get(router, "/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(&REQUEST_ID_HEADER).is_none());

    let doc: Value = serde_json::from_str(&body).unwrap();
    assert!(doc["paths"]["/report/{name}"]["get"].is_object());
}
