// ABOUTME: The Transport seam used by the fetch engine and its reqwest implementation.
// ABOUTME: ReqwestTransport builds a client per attempt honoring timeout, TLS toggles, redirect limit and proxy.

use std::error::Error as StdError;
use std::time::Duration;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use url::Url;

use crate::error::TransportError;
use crate::options::ProxyConfig;

/// Everything needed to issue one attempt.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    pub accept_invalid_hostnames: bool,
    pub max_redirects: usize,
    pub proxy: Option<ProxyConfig>,
}

/// A response as received, before status handling and decoding.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    /// Header pairs in arrival order; names may repeat.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Issues GET requests for the fetch engine.
pub trait Transport: Send + Sync {
    fn get<'a>(&'a self, request: &'a OutboundRequest) -> BoxFuture<'a, Result<RawResponse, TransportError>>;
}

/// Transport backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for ReqwestTransport {
    fn get<'a>(&'a self, request: &'a OutboundRequest) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        async move {
            let client = build_client(request)?;

            let mut builder = client.get(&request.url);
            for (key, value) in &request.headers {
                builder = builder.header(key, value);
            }

            let response = builder.send().await.map_err(request_error)?;
            let status = response.status();
            let headers = header_pairs(response.headers());
            let body = response.bytes().await.map_err(request_error)?;

            Ok(RawResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
                headers,
                body,
            })
        }
        .boxed()
    }
}

fn build_client(request: &OutboundRequest) -> Result<reqwest::Client, TransportError> {
    let redirect = if request.max_redirects == 0 {
        Policy::none()
    } else {
        Policy::limited(request.max_redirects)
    };

    let mut builder = reqwest::Client::builder()
        .redirect(redirect)
        .user_agent(&request.user_agent)
        .timeout(request.timeout)
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .danger_accept_invalid_certs(request.accept_invalid_certs)
        .danger_accept_invalid_hostnames(request.accept_invalid_hostnames);

    if let Some(proxy) = &request.proxy {
        builder = builder.proxy(build_proxy(proxy)?);
    }

    builder
        .build()
        .map_err(|e| TransportError::InvalidRequest(error_chain(&e)))
}

/// HTTP(S) proxies authenticate with basic auth; SOCKS proxies carry credentials in the URL.
///
/// Explicit credentials replace any embedded in the proxy URL.
fn build_proxy(config: &ProxyConfig) -> Result<reqwest::Proxy, TransportError> {
    let invalid = |reason: String| {
        TransportError::InvalidRequest(format!("invalid proxy {:?}: {}", config.url, reason))
    };
    let mut url = Url::parse(&config.url).map_err(|e| invalid(e.to_string()))?;
    let username = config.username.as_deref().filter(|u| !u.is_empty());

    match url.scheme() {
        "http" | "https" => match username {
            Some(username) => {
                url.set_username("")
                    .and_then(|_| url.set_password(None))
                    .map_err(|_| invalid("cannot strip credentials".to_string()))?;
                let proxy = reqwest::Proxy::all(url.as_str()).map_err(|e| invalid(error_chain(&e)))?;
                Ok(proxy.basic_auth(username, config.password.as_deref().unwrap_or("")))
            }
            None => reqwest::Proxy::all(url.as_str()).map_err(|e| invalid(error_chain(&e))),
        },
        "socks4" | "socks4a" | "socks5" | "socks5h" => {
            if let Some(username) = username {
                url.set_username(username)
                    .and_then(|_| url.set_password(config.password.as_deref()))
                    .map_err(|_| invalid("cannot set credentials".to_string()))?;
            }
            reqwest::Proxy::all(url.as_str()).map_err(|e| invalid(error_chain(&e)))
        }
        other => Err(invalid(format!("unsupported scheme {:?}", other))),
    }
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn request_error(err: reqwest::Error) -> TransportError {
    if err.is_builder() {
        return TransportError::InvalidRequest(error_chain(&err));
    }
    let timed_out = err.is_timeout();
    let message = error_chain(&err.without_url());
    if timed_out {
        TransportError::Request(format!("timeout: {}", message))
    } else {
        TransportError::Request(message)
    }
}

/// The error and all of its sources joined with ": ".
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}
