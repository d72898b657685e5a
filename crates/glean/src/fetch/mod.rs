// ABOUTME: Fetch retry engine: issues attempts through a Transport, classifies failures and retries per policy.
// ABOUTME: Successful bodies are decoded using the Content-Type charset or chardetng detection.

//! HTML fetching with retries.
//!
//! [`Fetcher::fetch_html`] runs attempts `0..=retries`. A 2xx response ends
//! the loop; anything else is turned into a message, classified into an
//! [`ErrorKind`](crate::error::ErrorKind) and either retried after
//! `retry_delay` or returned as a [`FetchError`].

pub mod agents;
pub mod classify;
pub mod transport;

use std::collections::BTreeMap;

use serde::Serialize;
use url::Url;

use crate::error::{ErrorKind, FetchError, TransportError};
use crate::fetch::agents::user_agent_for;
use crate::fetch::classify::{classify, is_retryable};
use crate::fetch::transport::{OutboundRequest, RawResponse, ReqwestTransport, Transport};
use crate::options::{FetchOptions, FetcherBuilder};

/// A successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchResponse {
    /// Decoded body.
    pub data: String,
    /// Lowercased header names; repeated headers joined with ", ".
    pub headers: BTreeMap<String, String>,
    pub status: u16,
    pub status_text: String,
}

impl FetchResponse {
    fn from_raw(raw: RawResponse) -> Self {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in raw.headers {
            headers
                .entry(name.to_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        let data = decode_body(&raw.body, headers.get("content-type").map(String::as_str));
        Self {
            data,
            headers,
            status: raw.status,
            status_text: raw.status_text,
        }
    }
}

/// Fetches HTML with retries over a [`Transport`].
#[derive(Debug, Clone)]
pub struct Fetcher<T = ReqwestTransport> {
    opts: FetchOptions,
    transport: T,
}

impl Fetcher<ReqwestTransport> {
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::new()
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(opts: FetchOptions, transport: T) -> Self {
        Self { opts, transport }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.opts
    }

    /// Fetch `url`, retrying retryable failures up to `retries` times.
    pub async fn fetch_html(&self, url: &str) -> Result<FetchResponse, FetchError> {
        validate_url(url)?;

        let mut attempt: u32 = 0;
        loop {
            let request = self.request_for(url);
            let failure = match self.transport.get(&request).await {
                Ok(raw) if (200..300).contains(&raw.status) => {
                    if attempt > 0 {
                        tracing::info!(url, attempts = attempt + 1, "fetch succeeded after retries");
                    }
                    return Ok(FetchResponse::from_raw(raw));
                }
                Ok(raw) => format!(
                    "request failed with status code {} ({})",
                    raw.status, raw.status_text
                ),
                Err(TransportError::InvalidRequest(message)) => {
                    return Err(FetchError::new(ErrorKind::InvalidRequest, url, attempt + 1, message));
                }
                Err(TransportError::Request(message)) => message,
            };

            let kind = classify(&failure);
            tracing::warn!(
                url,
                attempt = attempt + 1,
                kind = %kind,
                error = %failure,
                "fetch attempt failed"
            );

            if attempt < self.opts.retries && is_retryable(kind, &self.opts.retry_on_errors) {
                tracing::warn!(
                    url,
                    delay_ms = self.opts.retry_delay.as_millis() as u64,
                    "retrying fetch"
                );
                tokio::time::sleep(self.opts.retry_delay).await;
                attempt += 1;
                continue;
            }

            return Err(FetchError::new(kind, url, attempt + 1, failure));
        }
    }

    fn request_for(&self, url: &str) -> OutboundRequest {
        OutboundRequest {
            url: url.to_string(),
            user_agent: user_agent_for(&self.opts),
            headers: self
                .opts
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            timeout: self.opts.timeout,
            accept_invalid_certs: self.opts.accepts_invalid_certs(),
            accept_invalid_hostnames: self.opts.disable_server_identity_check,
            max_redirects: self.opts.max_redirects,
            proxy: self.opts.proxy.clone(),
        }
    }
}

/// Fetch `url` with a reqwest-backed [`Fetcher`] configured by `opts`.
pub async fn fetch_html(url: &str, opts: FetchOptions) -> Result<FetchResponse, FetchError> {
    FetcherBuilder::from_options(opts).build().fetch_html(url).await
}

fn validate_url(url: &str) -> Result<(), FetchError> {
    if url.is_empty() {
        return Err(FetchError::invalid_request(url, "empty URL"));
    }
    let parsed =
        Url::parse(url).map_err(|e| FetchError::invalid_request(url, format!("invalid URL: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(FetchError::invalid_request(
            url,
            format!("unsupported scheme {:?}, expected http or https", other),
        )),
    }
}

/// Decode body bytes to a String using charset from content-type header or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(encoding) = content_type
        .and_then(extract_charset)
        .and_then(|charset| encoding_rs::Encoding::for_label(charset.as_bytes()))
    {
        let (decoded, _, _) = encoding.decode(body);
        return decoded.into_owned();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .to_lowercase()
        .split(';')
        .find_map(|part| part.trim().strip_prefix("charset=").map(str::to_string))
        .map(|charset| charset.trim_matches(|c| c == '"' || c == '\'').to_string())
}
