//! Forwarding of ordinary relayed events to the downstream service.
//!
//! # Responsibilities
//! - Rewrite the inbound URI onto the downstream base URL
//! - Strip hop-by-hop headers in both directions
//! - Append the peer address to `X-Forwarded-For`, keep the inbound `Host`
//! - Stream request and response bodies through unchanged
//!
//! The downstream path is the base path joined with the inbound path, so a
//! base of `http://svc:3000/webhook` receives `/` as `/webhook/`.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderValue, Request, Response, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use url::{Position, Url};

use crate::config::DownstreamConfig;

/// Error type for downstream forwarding.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid downstream URL '{url}': {reason}")]
    InvalidBase { url: String, reason: String },

    #[error("failed to build downstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("downstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Append `peer` to any `X-Forwarded-For` chain already present.
fn append_forwarded_for(headers: &mut HeaderMap, peer: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let chain = if prior.is_empty() {
        peer.to_string()
    } else {
        format!("{}, {}", prior.join(", "), peer)
    };
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Single-host forwarding client.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    base: Url,
    authority: String,
}

impl Forwarder {
    pub fn new(config: &DownstreamConfig) -> Result<Self, ForwardError> {
        let base = Url::parse(&config.url).map_err(|e| ForwardError::InvalidBase {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;
        if base.scheme() != "http" || base.host_str().is_none() {
            return Err(ForwardError::InvalidBase {
                url: config.url.clone(),
                reason: "expected an http:// URL with a host".to_string(),
            });
        }
        let authority = base[Position::BeforeHost..Position::AfterPort].to_string();

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            base,
            authority,
        })
    }

    /// Downstream URI for an inbound request URI.
    pub fn target_uri(&self, inbound: &Uri) -> Result<Uri, ForwardError> {
        let base_path = self.base.path().trim_end_matches('/');
        let mut path_and_query = format!("{}{}", base_path, inbound.path());

        let query = match (self.base.query().filter(|q| !q.is_empty()), inbound.query()) {
            (Some(base), Some(extra)) => Some(format!("{}&{}", base, extra)),
            (Some(base), None) => Some(base.to_string()),
            (None, extra) => extra.map(str::to_string),
        };
        if let Some(query) = query {
            path_and_query.push('?');
            path_and_query.push_str(&query);
        }

        Ok(Uri::builder()
            .scheme(self.base.scheme())
            .authority(self.authority.as_str())
            .path_and_query(path_and_query)
            .build()?)
    }

    /// Forward `request` downstream and return the downstream response.
    ///
    /// The peer address is read from the `ConnectInfo` extension when the
    /// server was started with connect info.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let (mut parts, body) = request.into_parts();

        parts.uri = self.target_uri(&parts.uri)?;
        strip_hop_by_hop(&mut parts.headers);
        if let Some(ConnectInfo(peer)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut parts.headers, peer.ip());
        }
        if !parts.headers.contains_key(header::HOST) {
            if let Ok(host) = HeaderValue::from_str(&self.authority) {
                parts.headers.insert(header::HOST, host);
            }
        }

        let response = self
            .client
            .request(Request::from_parts(parts, body))
            .await?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
