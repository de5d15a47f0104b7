//! Recovery engine integration tests
//!
//! Backoff is checked on a paused tokio clock, so the waits cost nothing
//! and elapsed times are exact.

mod common;

use chatgpt_automation::browser::BrowserSession;
use chatgpt_automation::error::{BootstrapError, BrowserError, Error};
use chatgpt_automation::recovery::{
    register_default_strategies, retry_bounded, retry_once, ErrorKind, RecoveryAction,
    RecoveryManager, RecoveryRegistry,
};
use chatgpt_automation::timing::Timings;
use common::{test_config, FakeConnector, FakePage};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn counting_action(kind: ErrorKind, succeed: bool) -> (RecoveryAction, Arc<AtomicU32>) {
    let runs = Arc::new(AtomicU32::new(0));
    let counter = runs.clone();
    let action = RecoveryAction::new(kind, move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            if succeed {
                Ok(())
            } else {
                Err(Error::generic("remedy did not help"))
            }
        }
    });
    (action, runs)
}

fn manager_with(action: RecoveryAction) -> RecoveryManager {
    let mut registry = RecoveryRegistry::new();
    registry.register(action);
    RecoveryManager::new(registry)
}

fn network_error() -> Error {
    Error::generic("net::ERR_CONNECTION_RESET")
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_returns_false_then_starts_over() {
    let (action, runs) = counting_action(ErrorKind::NetworkError, false);
    let manager = manager_with(action.max_retries(2).base_delay(Duration::ZERO));

    // Two failed remedies, then the budget is spent
    assert!(!manager.handle_error(&network_error(), "send").await);
    assert!(!manager.handle_error(&network_error(), "send").await);
    assert_eq!(manager.attempts(ErrorKind::NetworkError, "send"), 2);

    assert!(!manager.handle_error(&network_error(), "send").await);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(manager.attempts(ErrorKind::NetworkError, "send"), 0);

    // The next call behaves like the first one
    assert!(!manager.handle_error(&network_error(), "send").await);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(manager.attempts(ErrorKind::NetworkError, "send"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_contexts_have_separate_budgets() {
    let (action, _) = counting_action(ErrorKind::NetworkError, false);
    let manager = manager_with(action.max_retries(1).base_delay(Duration::ZERO));

    assert!(!manager.handle_error(&network_error(), "new_chat").await);
    assert_eq!(manager.attempts(ErrorKind::NetworkError, "new_chat"), 1);
    assert_eq!(manager.attempts(ErrorKind::NetworkError, "send_message"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_doubles() {
    let (action, _) = counting_action(ErrorKind::NetworkError, false);
    let manager = manager_with(action.max_retries(3).base_delay(Duration::from_secs(1)));

    for expected in [1, 2, 4] {
        let start = Instant::now();
        manager.handle_error(&network_error(), "op").await;
        assert_eq!(start.elapsed(), Duration::from_secs(expected));
    }
}

#[tokio::test(start_paused = true)]
async fn test_flat_backoff() {
    let (action, _) = counting_action(ErrorKind::NetworkError, false);
    let manager = manager_with(
        action
            .max_retries(3)
            .base_delay(Duration::from_secs(2))
            .exponential_backoff(false),
    );

    for _ in 0..3 {
        let start = Instant::now();
        manager.handle_error(&network_error(), "op").await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }
}

#[tokio::test(start_paused = true)]
async fn test_unregistered_kind_returns_immediately() {
    let (action, runs) = counting_action(ErrorKind::NetworkError, true);
    let manager = manager_with(action);

    let start = Instant::now();
    let recovered = manager
        .handle_error(&Error::generic("something odd"), "op")
        .await;
    assert!(!recovered);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_then_success() {
    let manager = manager_with(
        RecoveryAction::wait_only(ErrorKind::RateLimit)
            .max_retries(3)
            .base_delay(Duration::from_secs(30)),
    );
    let calls = &AtomicU32::new(0);

    let start = Instant::now();
    let result = retry_once(&manager, "send_message", move || async move {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(Error::generic("429 Too Many Requests"))
        } else {
            Ok("sent")
        }
    })
    .await;

    assert_eq!(result.unwrap(), "sent");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(30));
    assert_eq!(manager.attempts(ErrorKind::RateLimit, "send_message"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_once_runs_at_most_twice() {
    let manager = manager_with(
        RecoveryAction::wait_only(ErrorKind::TimeoutError).base_delay(Duration::ZERO),
    );
    let calls = &AtomicU32::new(0);

    let result: chatgpt_automation::Result<()> = retry_once(&manager, "wait", move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::generic("Timeout 5000ms exceeded"))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_error_aborts_without_retry() {
    let manager = manager_with(RecoveryAction::wait_only(ErrorKind::NetworkError));
    let calls = &AtomicU32::new(0);

    let result: chatgpt_automation::Result<()> =
        retry_once(&manager, "op", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::generic("unexpected token in JSON"))
        })
        .await;

    assert_eq!(result.unwrap_err().to_string(), "unexpected token in JSON");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_stops_when_recovery_gives_up() {
    let (action, _) = counting_action(ErrorKind::NetworkError, false);
    let manager = manager_with(action.base_delay(Duration::ZERO));
    let calls = &AtomicU32::new(0);

    let result: chatgpt_automation::Result<()> =
        retry_bounded(&manager, "op", 5, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(network_error())
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_succeeds_on_last_attempt() {
    let manager = manager_with(
        RecoveryAction::wait_only(ErrorKind::NetworkError)
            .max_retries(5)
            .base_delay(Duration::ZERO),
    );
    let calls = &AtomicU32::new(0);

    let result = retry_bounded(&manager, "op", 3, move || async move {
        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(network_error())
        } else {
            Ok(42)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

fn default_manager(session: Arc<BrowserSession>) -> RecoveryManager {
    let mut registry = RecoveryRegistry::new();
    register_default_strategies(&mut registry, session, Timings::zero());
    RecoveryManager::new(registry)
}

#[test]
fn test_default_strategies_cover_recoverable_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let connector = Arc::new(FakeConnector::with_page(Arc::new(FakePage::chat_ready())));
    let session = Arc::new(BrowserSession::new(connector, test_config(dir.path())));
    let manager = default_manager(session);
    let registry = manager.registry();

    let expect = [
        (ErrorKind::BrowserCrash, 2, 5),
        (ErrorKind::SessionExpired, 2, 2),
        (ErrorKind::RateLimit, 3, 30),
        (ErrorKind::NetworkError, 3, 5),
        (ErrorKind::ElementNotFound, 2, 3),
        (ErrorKind::TimeoutError, 2, 2),
    ];
    for (kind, retries, secs) in expect {
        let action = registry.lookup(kind).unwrap();
        assert_eq!(action.max_retries, retries, "{kind}");
        assert_eq!(action.base_delay, Duration::from_secs(secs), "{kind}");
        assert!(action.exponential_backoff);
    }
    assert!(registry.lookup(ErrorKind::AuthenticationError).is_none());
    assert!(registry.lookup(ErrorKind::UnknownError).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_browser_crash_relaunches_session() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::chat_ready());
    let connector = Arc::new(FakeConnector::with_page(page));
    let session = Arc::new(BrowserSession::new(
        connector.clone(),
        test_config(dir.path()),
    ));
    session.launch().await.unwrap();
    let manager = default_manager(session.clone());

    let start = Instant::now();
    let recovered = manager
        .handle_error(&BrowserError::Disconnected.into(), "send_message")
        .await;

    assert!(recovered);
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(connector.attach_count(), 2);
    // The user's browser is only ever disconnected
    assert_eq!(connector.browser().disconnect_count(), 1);
    assert_eq!(connector.browser().shutdown_count(), 0);
    assert!(session.is_launched().await);
}

#[tokio::test(start_paused = true)]
async fn test_network_recovery_needs_a_page() {
    let dir = tempfile::tempdir().unwrap();
    let connector = Arc::new(FakeConnector::with_page(Arc::new(FakePage::chat_ready())));
    let session = Arc::new(BrowserSession::new(connector, test_config(dir.path())));
    let manager = default_manager(session);

    assert!(!manager.handle_error(&network_error(), "op").await);
    assert_eq!(manager.attempts(ErrorKind::NetworkError, "op"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_network_recovery_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::chat_ready());
    let connector = Arc::new(FakeConnector::with_page(page.clone()));
    let session = Arc::new(BrowserSession::new(connector, test_config(dir.path())));
    session.launch().await.unwrap();
    let manager = default_manager(session);

    assert!(manager.handle_error(&network_error(), "op").await);
    assert_eq!(page.call_count("reload"), 1);
    assert_eq!(page.call_count("goto"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_network_recovery_falls_back_to_navigation() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::chat_ready());
    let connector = Arc::new(FakeConnector::with_page(page.clone()));
    let session = Arc::new(BrowserSession::new(connector, test_config(dir.path())));
    session.launch().await.unwrap();
    let manager = default_manager(session);

    page.fail_next("reload", Error::generic("net::ERR_NAME_NOT_RESOLVED"));
    assert!(manager.handle_error(&network_error(), "op").await);
    assert_eq!(page.call_count("goto:https://chatgpt.com"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_element_recovery_refreshes_page() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::chat_ready());
    let connector = Arc::new(FakeConnector::with_page(page.clone()));
    let session = Arc::new(BrowserSession::new(connector, test_config(dir.path())));
    session.launch().await.unwrap();
    let manager = default_manager(session);

    let start = Instant::now();
    let error: Error = BrowserError::ElementNotFound("#prompt-textarea".into()).into();
    assert!(manager.handle_error(&error, "send_message").await);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    assert_eq!(page.call_count("reload"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_error_is_never_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let connector = Arc::new(FakeConnector::with_page(Arc::new(FakePage::chat_ready())));
    let session = Arc::new(BrowserSession::new(
        connector.clone(),
        test_config(dir.path()),
    ));
    let manager = default_manager(session);

    let error: Error = BootstrapError::AttachFailed {
        endpoint: "http://127.0.0.1:9222".into(),
        reason: "browser connection refused".into(),
    }
    .into();
    assert!(!manager.handle_error(&error, "launch").await);
    assert_eq!(connector.attach_count(), 0);
}
