//! Report scope
//!
//! Optional zone / cluster / host filter parsed from the query string of a
//! report request.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::Uri;
use url::form_urlencoded;
use utoipa::IntoParams;

/// Filter applied to a report. Empty fields mean "not filtered".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportScope {
    /// Zone name
    pub zone: String,
    /// Cluster name
    pub cluster: String,
    /// Host name
    pub host: String,
}

impl ReportScope {
    pub fn new(
        zone: impl Into<String>,
        cluster: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            zone: zone.into(),
            cluster: cluster.into(),
            host: host.into(),
        }
    }

    /// Build a scope from the `zone`, `cluster` and `host` query parameters
    /// of a URI. Other parameters are ignored; for repeated keys the first
    /// value wins.
    pub fn from_uri(uri: &Uri) -> Self {
        Self::from_query(uri.query().unwrap_or_default())
    }

    /// Build a scope from a raw query string (without the leading `?`).
    pub fn from_query(query: &str) -> Self {
        let mut scope = Self::default();
        let (mut zone, mut cluster, mut host) = (false, false, false);

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let (seen, field) = match key.as_ref() {
                "zone" => (&mut zone, &mut scope.zone),
                "cluster" => (&mut cluster, &mut scope.cluster),
                "host" => (&mut host, &mut scope.host),
                _ => continue,
            };
            if !*seen {
                *seen = true;
                *field = value.into_owned();
            }
        }

        scope
    }

    /// Serialize the non-empty fields back into a query string, in the order
    /// zone, cluster, host. Returns an empty string when nothing is set.
    pub fn query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut any = false;

        for (key, value) in self.fields() {
            if !value.is_empty() {
                serializer.append_pair(key, value);
                any = true;
            }
        }

        if !any {
            return String::new();
        }

        format!("?{}", serializer.finish())
    }

    pub fn is_empty(&self) -> bool {
        self.zone.is_empty() && self.cluster.is_empty() && self.host.is_empty()
    }

    fn fields(&self) -> [(&'static str, &str); 3] {
        [
            ("zone", self.zone.as_str()),
            ("cluster", self.cluster.as_str()),
            ("host", self.host.as_str()),
        ]
    }
}

impl<S> FromRequestParts<S> for ReportScope
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_uri(&parts.uri))
    }
}
