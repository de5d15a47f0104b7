//! Default recovery strategies for the ChatGPT session

use super::{ErrorKind, RecoveryAction, RecoveryRegistry};
use crate::browser::bootstrap::APP_URL;
use crate::browser::driver::WaitUntil;
use crate::browser::BrowserSession;
use crate::error::{Error, Result};
use crate::timing::Timings;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const RELOAD_TIMEOUT: Duration = Duration::from_secs(10);
const NAVIGATION_FALLBACK_TIMEOUT: Duration = Duration::from_secs(15);
const LOAD_STATE_TIMEOUT: Duration = Duration::from_secs(5);
const SESSION_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Register one action per recoverable kind.
///
/// | Kind | Retries | Base delay |
/// |---|---|---|
/// | browser crash | 2 | 5s |
/// | session expired | 2 | 2s |
/// | rate limit | 3 | 30s |
/// | network error | 3 | 5s |
/// | element not found | 2 | 3s |
/// | timeout | 2 | 2s |
///
/// Authentication and unknown errors get no action and are never retried.
pub fn register_default_strategies(
    registry: &mut RecoveryRegistry,
    session: Arc<BrowserSession>,
    timings: Timings,
) {
    let (s, t) = (session.clone(), timings);
    registry.register(
        RecoveryAction::new(ErrorKind::BrowserCrash, move || {
            restart_browser(s.clone(), t)
        })
        .max_retries(2)
        .base_delay(Duration::from_secs(5))
        .description("Restart browser session"),
    );

    let (s, t) = (session.clone(), timings);
    registry.register(
        RecoveryAction::new(ErrorKind::SessionExpired, move || {
            reauthenticate(s.clone(), t)
        })
        .max_retries(2)
        .base_delay(Duration::from_secs(2))
        .description("Re-authenticate session"),
    );

    registry.register(
        RecoveryAction::wait_only(ErrorKind::RateLimit)
            .max_retries(3)
            .base_delay(Duration::from_secs(30))
            .description("Wait for rate limit reset"),
    );

    let (s, t) = (session.clone(), timings);
    registry.register(
        RecoveryAction::new(ErrorKind::NetworkError, move || {
            recover_network(s.clone(), t)
        })
        .max_retries(3)
        .base_delay(Duration::from_secs(5))
        .description("Retry after network stabilization"),
    );

    let (s, t) = (session.clone(), timings);
    registry.register(
        RecoveryAction::new(ErrorKind::ElementNotFound, move || {
            refresh_page(s.clone(), t)
        })
        .max_retries(2)
        .base_delay(Duration::from_secs(3))
        .description("Refresh page and retry"),
    );

    let (s, t) = (session, timings);
    registry.register(
        RecoveryAction::new(ErrorKind::TimeoutError, move || {
            wait_for_idle(s.clone(), t)
        })
        .max_retries(2)
        .base_delay(Duration::from_secs(2))
        .description("Wait for page to settle"),
    );
}

async fn restart_browser(session: Arc<BrowserSession>, timings: Timings) -> Result<()> {
    info!("Restarting browser session");
    if let Err(e) = session.close().await {
        warn!("Close before restart failed: {}", e);
    }
    timings.pause(timings.browser_close).await;
    session.launch().await?;
    info!("Browser session restarted");
    Ok(())
}

async fn reauthenticate(session: Arc<BrowserSession>, timings: Timings) -> Result<()> {
    let Some(page) = session.current_page().await else {
        return Ok(());
    };
    info!("Re-authenticating session");
    page.goto(APP_URL, WaitUntil::DomContentLoaded, SESSION_NAVIGATION_TIMEOUT)
        .await?;
    timings.pause(timings.page_load).await;
    if session.needs_login(page.as_ref()).await {
        session.login(page.as_ref()).await?;
    }
    Ok(())
}

async fn recover_network(session: Arc<BrowserSession>, timings: Timings) -> Result<()> {
    let page = session
        .current_page()
        .await
        .ok_or_else(|| Error::generic("No page to recover network on"))?;
    timings.pause(timings.network_stabilize).await;
    if let Err(e) = page.reload(RELOAD_TIMEOUT).await {
        warn!("Reload failed ({}), navigating to the app root", e);
        page.goto(APP_URL, WaitUntil::DomContentLoaded, NAVIGATION_FALLBACK_TIMEOUT)
            .await?;
    }
    Ok(())
}

async fn refresh_page(session: Arc<BrowserSession>, timings: Timings) -> Result<()> {
    let Some(page) = session.current_page().await else {
        return Ok(());
    };
    timings.pause(timings.recovery_wait).await;
    if let Err(e) = page.reload(RELOAD_TIMEOUT).await {
        warn!("Reload during element recovery failed: {}", e);
    }
    timings.pause(timings.page_load).await;
    Ok(())
}

async fn wait_for_idle(session: Arc<BrowserSession>, timings: Timings) -> Result<()> {
    let Some(page) = session.current_page().await else {
        return Ok(());
    };
    timings.pause(timings.timeout_recovery).await;
    if let Err(e) = page
        .wait_for_load_state(WaitUntil::DomContentLoaded, LOAD_STATE_TIMEOUT)
        .await
    {
        warn!("Page did not settle after timeout: {}", e);
    }
    Ok(())
}
