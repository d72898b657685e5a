// ABOUTME: Maps failure messages to ErrorKind via an ordered pattern table and decides retryability.
// ABOUTME: Status-code rules run first, then transport rules in table order; no match is Unknown.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ErrorKind;
use crate::options::RetryOn;

static STATUS_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"status code (\d{3})").expect("valid status code regex"));

struct Rule {
    kind: ErrorKind,
    patterns: &'static [&'static str],
}

/// Checked in order; patterns are lowercase substrings.
static RULES: &[Rule] = &[
    Rule {
        kind: ErrorKind::Ssl,
        patterns: &[
            "ssl",
            "tls",
            "certificate",
            "self signed",
            "self-signed",
            "unknownissuer",
            "unable to verify",
            "handshake",
        ],
    },
    Rule {
        kind: ErrorKind::Timeout,
        patterns: &["timeout", "timed out", "etimedout", "deadline has elapsed"],
    },
    Rule {
        kind: ErrorKind::Dns,
        patterns: &[
            "enotfound",
            "getaddrinfo",
            "dns error",
            "failed to lookup address",
            "name or service not known",
            "no such host",
            "temporary failure in name resolution",
            "eai_again",
        ],
    },
    Rule {
        kind: ErrorKind::ConnectionRefused,
        patterns: &["econnrefused", "connection refused"],
    },
    Rule {
        kind: ErrorKind::ConnectionReset,
        patterns: &[
            "econnreset",
            "connection reset",
            "socket hang up",
            "connection closed before message completed",
            "broken pipe",
        ],
    },
    Rule {
        kind: ErrorKind::NetworkUnreachable,
        patterns: &[
            "enetunreach",
            "network is unreachable",
            "ehostunreach",
            "host is unreachable",
            "no route to host",
        ],
    },
];

/// Classify a failure message.
pub fn classify(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    let status = STATUS_CODE_RE.captures(&lower).map(|caps| caps[1].to_string());
    if status.as_deref() == Some("429")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
    {
        return ErrorKind::RateLimited;
    }
    if status.is_some() {
        return ErrorKind::Http;
    }

    RULES
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| lower.contains(p)))
        .map_or(ErrorKind::Unknown, |rule| rule.kind)
}

/// Whether a failure of `kind` is retried under `policy`.
pub fn is_retryable(kind: ErrorKind, policy: &RetryOn) -> bool {
    match kind {
        ErrorKind::Ssl => policy.ssl,
        ErrorKind::Timeout => policy.timeout,
        ErrorKind::Dns => policy.dns,
        ErrorKind::ConnectionRefused => policy.connection_refused,
        ErrorKind::ConnectionReset | ErrorKind::NetworkUnreachable | ErrorKind::Unknown => true,
        ErrorKind::RateLimited | ErrorKind::Http | ErrorKind::InvalidRequest => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_rules_come_first() {
        assert_eq!(
            classify("request failed with status code 429 (Too Many Requests)"),
            ErrorKind::RateLimited
        );
        assert_eq!(
            classify("request failed with status code 404 (Not Found)"),
            ErrorKind::Http
        );
        // "timeout" in the reason must not win over the status code
        assert_eq!(
            classify("request failed with status code 504 (Gateway Timeout)"),
            ErrorKind::Http
        );
        assert_eq!(classify("upstream rate limit exceeded"), ErrorKind::RateLimited);
    }

    #[test]
    fn transport_messages() {
        let cases = [
            ("error sending request: invalid peer certificate: UnknownIssuer", ErrorKind::Ssl),
            ("timeout: error sending request: operation timed out", ErrorKind::Timeout),
            ("getaddrinfo ENOTFOUND example.invalid", ErrorKind::Dns),
            (
                "error sending request: client error (Connect): dns error: failed to lookup address information",
                ErrorKind::Dns,
            ),
            ("connect ECONNREFUSED 127.0.0.1:9", ErrorKind::ConnectionRefused),
            ("tcp connect error: Connection refused (os error 111)", ErrorKind::ConnectionRefused),
            ("socket hang up", ErrorKind::ConnectionReset),
            ("Network is unreachable (os error 101)", ErrorKind::NetworkUnreachable),
            ("something odd happened", ErrorKind::Unknown),
        ];
        for (message, expected) in cases {
            assert_eq!(classify(message), expected, "{}", message);
        }
    }

    #[test]
    fn retry_policy() {
        let policy = RetryOn::default();
        assert!(!is_retryable(ErrorKind::Ssl, &policy));
        assert!(is_retryable(ErrorKind::Dns, &policy));
        assert!(is_retryable(ErrorKind::ConnectionReset, &policy));
        assert!(is_retryable(ErrorKind::Unknown, &policy));
        assert!(!is_retryable(ErrorKind::RateLimited, &policy));
        assert!(!is_retryable(ErrorKind::Http, &policy));

        let no_dns = RetryOn {
            dns: false,
            ..policy
        };
        assert!(!is_retryable(ErrorKind::Dns, &no_dns));
    }
}
