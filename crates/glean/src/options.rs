// ABOUTME: Configuration for glean: ExtractOptions for extraction calls, FetchOptions and FetcherBuilder for fetching.
// ABOUTME: FetcherBuilder provides a fluent API for constructing Fetcher instances with custom settings.

use std::collections::HashMap;
use std::time::Duration;

use crate::fetch::transport::{ReqwestTransport, Transport};
use crate::fetch::Fetcher;
use crate::transform::{TransformContext, TransformSpec};

/// Options accepted by every extraction function.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Log swallowed failures at `warn` instead of `debug`.
    pub verbose: bool,
    /// Base URL handed to transform stages (relative URL resolution).
    pub base_url: Option<String>,
    /// Transform applied to values by the single-selector functions.
    pub transform: Option<TransformSpec>,
    /// Return serialized markup instead of text or attribute values.
    pub raw: bool,
    /// Keep empty values in multiple-value results instead of dropping them.
    pub keep_empty: bool,
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_transform(mut self, transform: TransformSpec) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn keep_empty(mut self, keep_empty: bool) -> Self {
        self.keep_empty = keep_empty;
        self
    }

    pub(crate) fn context(&self) -> TransformContext {
        TransformContext::new(self.base_url.as_deref())
    }
}

/// Which retryable-by-choice failure kinds the fetch engine retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOn {
    pub ssl: bool,
    pub timeout: bool,
    pub dns: bool,
    pub connection_refused: bool,
}

impl Default for RetryOn {
    fn default() -> Self {
        Self {
            ssl: false,
            timeout: true,
            dns: true,
            connection_refused: true,
        }
    }
}

/// An outbound proxy.
///
/// `url` may be `http://`, `https://`, `socks4://`, `socks5://` or `socks5h://`
/// and may embed credentials; `username`/`password`, when set, take
/// precedence over the embedded ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Configuration options for fetching.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Per-attempt request timeout.
    pub timeout: Duration,
    pub headers: HashMap<String, String>,
    /// Fixed User-Agent; the built-in default is used when unset.
    pub user_agent: Option<String>,
    /// Pick a User-Agent from the rotating pool on every attempt.
    pub use_random_user_agent: bool,
    pub proxy: Option<ProxyConfig>,
    /// Retries after the first attempt.
    pub retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Verify server certificates.
    pub reject_unauthorized: bool,
    /// Accept any certificate, overriding `reject_unauthorized`.
    pub ignore_ssl_errors: bool,
    /// Skip hostname verification of server certificates.
    pub disable_server_identity_check: bool,
    pub max_redirects: usize,
    pub retry_on_errors: RetryOn,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            headers: HashMap::new(),
            user_agent: None,
            use_random_user_agent: false,
            proxy: None,
            retries: 3,
            retry_delay: Duration::from_millis(1000),
            reject_unauthorized: true,
            ignore_ssl_errors: false,
            disable_server_identity_check: false,
            max_redirects: 5,
            retry_on_errors: RetryOn::default(),
        }
    }
}

impl FetchOptions {
    /// Whether certificate validation is switched off.
    pub fn accepts_invalid_certs(&self) -> bool {
        self.ignore_ssl_errors || !self.reject_unauthorized
    }
}

/// Builder for constructing Fetcher instances with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct FetcherBuilder {
    opts: FetchOptions,
}

impl FetcherBuilder {
    /// Create a new FetcherBuilder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing set of options.
    pub fn from_options(opts: FetchOptions) -> Self {
        Self { opts }
    }

    /// Set the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Add a custom header to all requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Set a fixed User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = Some(user_agent.into());
        self
    }

    /// Rotate User-Agent strings from the built-in pool.
    pub fn random_user_agent(mut self, enabled: bool) -> Self {
        self.opts.use_random_user_agent = enabled;
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.opts.proxy = Some(proxy);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.opts.retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.opts.retry_delay = delay;
        self
    }

    pub fn reject_unauthorized(mut self, reject: bool) -> Self {
        self.opts.reject_unauthorized = reject;
        self
    }

    pub fn ignore_ssl_errors(mut self, ignore: bool) -> Self {
        self.opts.ignore_ssl_errors = ignore;
        self
    }

    pub fn disable_server_identity_check(mut self, disable: bool) -> Self {
        self.opts.disable_server_identity_check = disable;
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.opts.max_redirects = max;
        self
    }

    pub fn retry_on(mut self, retry_on: RetryOn) -> Self {
        self.opts.retry_on_errors = retry_on;
        self
    }

    /// Build a Fetcher backed by reqwest.
    pub fn build(self) -> Fetcher<ReqwestTransport> {
        Fetcher::new(self.opts, ReqwestTransport::new())
    }

    /// Build a Fetcher over a custom transport.
    pub fn build_with<T: Transport>(self, transport: T) -> Fetcher<T> {
        Fetcher::new(self.opts, transport)
    }
}
