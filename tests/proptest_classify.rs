//! Property-based tests for error classification.
//!
//! The classifier must be total, case-insensitive and resolve compound
//! messages by group order.

use chatgpt_automation::error::{BootstrapError, BrowserError, Error};
use chatgpt_automation::recovery::{classify, classify_message, ErrorKind};
use proptest::prelude::*;

// ============================================================================
// KEYWORD GROUPS, IN PRECEDENCE ORDER
// ============================================================================

const NETWORK: &[&str] = &["network", "connection", "dns", "host"];
const TIMEOUT: &[&str] = &["timeout"];
const RATE_LIMIT: &[&str] = &["rate limit", "too many requests", "quota"];
const AUTH: &[&str] = &["unauthorized", "forbidden", "login", "auth"];
const SESSION: &[&str] = &["session", "expired", "invalid session"];
const CRASH: &[&str] = &["browser", "crash", "closed", "disconnected"];
const ELEMENT: &[&str] = &["element not found", "selector", "locator"];

const GROUPS: [(ErrorKind, &[&str]); 7] = [
    (ErrorKind::NetworkError, NETWORK),
    (ErrorKind::TimeoutError, TIMEOUT),
    (ErrorKind::RateLimit, RATE_LIMIT),
    (ErrorKind::AuthenticationError, AUTH),
    (ErrorKind::SessionExpired, SESSION),
    (ErrorKind::BrowserCrash, CRASH),
    (ErrorKind::ElementNotFound, ELEMENT),
];

fn keyword(group: usize, seed: usize) -> &'static str {
    let keywords = GROUPS[group].1;
    keywords[seed % keywords.len()]
}

/// Text that cannot contain any keyword
fn arb_filler() -> impl Strategy<Value = String> {
    "[0-9 :]{0,12}"
}

fn arb_kind() -> impl Strategy<Value = ErrorKind> {
    (0..ErrorKind::ALL.len()).prop_map(|i| ErrorKind::ALL[i])
}

fn mentions_network(message: &str) -> bool {
    let lower = message.to_lowercase();
    NETWORK.iter().any(|k| lower.contains(k))
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn classify_is_total_and_deterministic(message in ".{0,80}") {
        let first = classify_message(&message);
        prop_assert_eq!(first, classify_message(&message));
        prop_assert_eq!(first, classify(&Error::generic(message.clone())));
    }

    #[test]
    fn classify_ignores_ascii_case(message in "[ -~]{0,80}") {
        prop_assert_eq!(
            classify_message(&message.to_ascii_uppercase()),
            classify_message(&message.to_ascii_lowercase())
        );
    }

    #[test]
    fn single_keyword_selects_its_group(
        group in 0usize..GROUPS.len(),
        seed in any::<usize>(),
        prefix in arb_filler(),
        suffix in arb_filler(),
    ) {
        let message = format!("{prefix} {} {suffix}", keyword(group, seed));
        prop_assert_eq!(classify_message(&message), GROUPS[group].0);
    }

    #[test]
    fn earlier_group_wins(
        (first, second) in (0usize..GROUPS.len(), 0usize..GROUPS.len())
            .prop_filter("distinct groups", |(a, b)| a != b),
        seeds in any::<(usize, usize)>(),
        filler in arb_filler(),
    ) {
        let message = format!(
            "{} {filler} {}",
            keyword(first, seeds.0),
            keyword(second, seeds.1)
        );
        prop_assert_eq!(classify_message(&message), GROUPS[first.min(second)].0);
    }

    #[test]
    fn no_keyword_is_unknown(message in "[0-9 .:_-]{0,40}") {
        prop_assert_eq!(classify_message(&message), ErrorKind::UnknownError);
    }

    #[test]
    fn structured_kind_always_wins(kind in arb_kind(), message in ".{0,60}") {
        prop_assert_eq!(classify(&Error::classified(kind, message)), kind);
    }

    #[test]
    fn bootstrap_errors_are_unknown(reason in ".{0,60}") {
        let err: Error = BootstrapError::LaunchFailed(reason.clone()).into();
        prop_assert_eq!(classify(&err), ErrorKind::UnknownError);

        let err: Error = BootstrapError::AttachFailed {
            endpoint: "http://127.0.0.1:9222".to_string(),
            reason,
        }
        .into();
        prop_assert_eq!(classify(&err), ErrorKind::UnknownError);
    }

    #[test]
    fn typed_timeouts_lose_only_to_network(what in "[a-z#. -]{0,24}", ms in 0u64..120_000) {
        let err: Error = BrowserError::Timeout { what, ms }.into();
        let expected = if mentions_network(&err.to_string()) {
            ErrorKind::NetworkError
        } else {
            ErrorKind::TimeoutError
        };
        prop_assert_eq!(classify(&err), expected);
    }
}
