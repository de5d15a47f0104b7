//! Error classification
//!
//! Maps any [`Error`] to exactly one [`ErrorKind`]. Structured kinds set at
//! construction win; everything else goes through an ordered keyword scan
//! of the lower-cased message where the first matching group decides.
//!
//! The group order is load-bearing. Recovery procedures are tuned to it, so
//! compound messages such as "browser session expired" resolve to whatever
//! group is checked first, not to the most specific one.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of failure kinds the recovery engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// DNS, host or connection problems
    NetworkError,
    /// A selector or locator matched nothing
    ElementNotFound,
    /// A wait exceeded its budget
    TimeoutError,
    /// The site asked us to slow down
    RateLimit,
    /// The logged-in session is gone
    SessionExpired,
    /// Credentials were rejected
    AuthenticationError,
    /// The browser process or its CDP link died
    BrowserCrash,
    /// Anything else; never recovered
    UnknownError,
}

impl ErrorKind {
    /// Every kind, in declaration order
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::NetworkError,
        ErrorKind::ElementNotFound,
        ErrorKind::TimeoutError,
        ErrorKind::RateLimit,
        ErrorKind::SessionExpired,
        ErrorKind::AuthenticationError,
        ErrorKind::BrowserCrash,
        ErrorKind::UnknownError,
    ];

    /// Stable snake_case name used in logs and retry keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "network_error",
            ErrorKind::ElementNotFound => "element_not_found",
            ErrorKind::TimeoutError => "timeout_error",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::AuthenticationError => "authentication_error",
            ErrorKind::BrowserCrash => "browser_crash",
            ErrorKind::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const NETWORK_KEYWORDS: &[&str] = &["network", "connection", "dns", "host"];
const RATE_LIMIT_KEYWORDS: &[&str] = &["rate limit", "too many requests", "quota"];
const AUTH_KEYWORDS: &[&str] = &["unauthorized", "forbidden", "login", "auth"];
const SESSION_KEYWORDS: &[&str] = &["session", "expired", "invalid session"];
const CRASH_KEYWORDS: &[&str] = &["browser", "crash", "closed", "disconnected"];
const ELEMENT_KEYWORDS: &[&str] = &["element not found", "selector", "locator"];

/// Classify an error.
///
/// Total and side-effect free. Bootstrap failures are always
/// [`ErrorKind::UnknownError`] so they can never feed the relaunch loop.
pub fn classify(error: &Error) -> ErrorKind {
    match error {
        Error::Classified { kind, .. } => *kind,
        Error::Bootstrap(_) => ErrorKind::UnknownError,
        other => classify_parts(&other.to_string(), other.is_timeout()),
    }
}

/// Classify a bare message with the keyword heuristic
pub fn classify_message(message: &str) -> ErrorKind {
    classify_parts(message, false)
}

fn classify_parts(message: &str, timeout_typed: bool) -> ErrorKind {
    let message = message.to_lowercase();
    let any = |keywords: &[&str]| keywords.iter().any(|k| message.contains(k));

    if any(NETWORK_KEYWORDS) {
        ErrorKind::NetworkError
    } else if timeout_typed || message.contains("timeout") {
        ErrorKind::TimeoutError
    } else if any(RATE_LIMIT_KEYWORDS) {
        ErrorKind::RateLimit
    } else if any(AUTH_KEYWORDS) {
        ErrorKind::AuthenticationError
    } else if any(SESSION_KEYWORDS) {
        ErrorKind::SessionExpired
    } else if any(CRASH_KEYWORDS) {
        ErrorKind::BrowserCrash
    } else if any(ELEMENT_KEYWORDS) {
        ErrorKind::ElementNotFound
    } else {
        ErrorKind::UnknownError
    }
}
