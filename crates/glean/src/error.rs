// ABOUTME: Error types for glean: the network failure taxonomy (ErrorKind, FetchError) and local errors.
// ABOUTME: Selector, transform and schema errors stay local to extraction; only FetchError reaches callers.

use std::fmt;

/// Classified network failure kinds produced by the fetch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Ssl,
    Timeout,
    Dns,
    ConnectionRefused,
    ConnectionReset,
    NetworkUnreachable,
    RateLimited,
    Http,
    /// The request could not be built (bad URL, proxy or header); no I/O happened.
    InvalidRequest,
    Unknown,
}

impl ErrorKind {
    /// Stable snake_case code, used in messages and logs.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Ssl => "ssl",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Dns => "dns",
            ErrorKind::ConnectionRefused => "connection_refused",
            ErrorKind::ConnectionReset => "connection_reset",
            ErrorKind::NetworkUnreachable => "network_unreachable",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Http => "http",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Human-readable description of the failure category.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Ssl => "SSL/TLS certificate or handshake failure",
            ErrorKind::Timeout => "request timed out",
            ErrorKind::Dns => "DNS lookup failed",
            ErrorKind::ConnectionRefused => "connection refused by server",
            ErrorKind::ConnectionReset => "connection reset by peer",
            ErrorKind::NetworkUnreachable => "network unreachable",
            ErrorKind::RateLimited => "rate limited by server",
            ErrorKind::Http => "server returned an error status",
            ErrorKind::InvalidRequest => "request could not be built",
            ErrorKind::Unknown => "unknown network error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Terminal failure of a fetch after the retry loop gave up.
#[derive(Debug, thiserror::Error)]
#[error(
    "glean: fetch {url} failed after {attempts} attempts: {kind} ({}): {message}",
    .kind.description()
)]
pub struct FetchError {
    pub kind: ErrorKind,
    pub url: String,
    pub attempts: u32,
    pub message: String,
}

impl FetchError {
    /// Create a FetchError for a classified failure.
    pub fn new(
        kind: ErrorKind,
        url: impl Into<String>,
        attempts: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            url: url.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Create an InvalidRequest error; no attempt was made.
    pub fn invalid_request(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, url, 0, message)
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    /// Returns true if the server answered with a non-2xx status (rate limiting included).
    pub fn is_http(&self) -> bool {
        matches!(self.kind, ErrorKind::Http | ErrorKind::RateLimited)
    }

    /// Returns true if this is a RateLimited error.
    pub fn is_rate_limited(&self) -> bool {
        self.kind == ErrorKind::RateLimited
    }

    /// Returns true if this is a DNS error.
    pub fn is_dns(&self) -> bool {
        self.kind == ErrorKind::Dns
    }

    /// Returns true if this is an InvalidRequest error.
    pub fn is_invalid_request(&self) -> bool {
        self.kind == ErrorKind::InvalidRequest
    }
}

/// Errors raised by a transport before any response arrived.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be built: bad URL, header or proxy.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Request(String),
}

/// Errors raised by a selector backend.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("invalid {kind} selector {selector:?}: {reason}")]
    InvalidSelector {
        kind: &'static str,
        selector: String,
        reason: String,
    },
    #[error("xpath evaluation of {selector:?} failed: {reason}")]
    Evaluation { selector: String, reason: String },
}

/// Errors raised by a transform stage.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("transform expected a string, got {0}")]
    NotAString(String),
    #[error("cannot parse {input:?} as {target}")]
    Parse { input: String, target: &'static str },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised while loading a schema file.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid regex {pattern:?}: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
