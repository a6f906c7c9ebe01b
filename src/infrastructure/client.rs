//! Minimal REST client
//!
//! JSON in, JSON out, with an optional hex dump of the traffic for
//! debugging.

use std::fmt::Write as _;

use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::support::errors::ClientError;

#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    url: String,
    debug: bool,
}

impl Client {
    /// Client for the API rooted at `url`.
    pub fn new(url: impl Into<String>, insecure_tls: bool) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure_tls)
            .build()?;

        Ok(Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
            debug: false,
        })
    }

    /// Log every request and response as a hex dump.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.exchange(Method::GET, path, None::<&()>).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.exchange(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.exchange(Method::PUT, path, Some(body)).await
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.exchange(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.request(Method::DELETE, path, &[], None).await?;
        Ok(())
    }

    async fn exchange<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let body = body.map(serde_json::to_vec).transpose()?;
        let resp = self.request(method, path, &[], body).await?;
        Ok(serde_json::from_slice(&resp)?)
    }

    /// Send a request and return the raw response body. Any status outside
    /// `2xx` is an error.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        headers: &[(HeaderName, String)],
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ClientError> {
        let mut req = self.http.request(method.clone(), self.url(path));

        if body.is_some() {
            req = req.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        for (name, value) in headers {
            req = req.header(name.clone(), value.as_str());
        }
        if let Some(body) = body {
            req = req.body(body);
        }

        let req = req.build()?;
        if self.debug {
            debug!(target: "mops::client", "REQUEST:\n{}", dump_request(&req));
        }

        let resp = self.http.execute(req).await?;
        let status = resp.status();
        let body = resp.bytes().await?.to_vec();

        if self.debug {
            debug!(target: "mops::client", "RESPONSE {status}:\n{}", hex_dump(&body));
        }

        if !status.is_success() {
            return Err(ClientError::Status(status.to_string()));
        }

        Ok(body)
    }

    /// URL for `path`, relative to the API root.
    fn url(&self, path: &str) -> String {
        // prevent accidental double slash
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }
}

fn dump_request(req: &reqwest::Request) -> String {
    let mut head = format!("{} {}\n", req.method(), req.url());
    for (name, value) in req.headers() {
        let _ = writeln!(head, "{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
    let body = req.body().and_then(|b| b.as_bytes()).unwrap_or_default();
    head.push('\n');

    let mut raw = head.into_bytes();
    raw.extend_from_slice(body);
    hex_dump(&raw)
}

/// Classic 16 bytes per line hex dump with an ASCII column.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();

    for (i, chunk) in data.chunks(16).enumerate() {
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        let _ = writeln!(out, "{:08x}  {:<32}  |{}|", i * 16, hex::encode(chunk), ascii);
    }

    out
}
