//! Connection bootstrap
//!
//! Gets the automation onto a live ChatGPT page. The preferred path attaches
//! to a user's debug-enabled Chrome so the logged-in profile is reused. If
//! nothing answers on the endpoint a debug-enabled Chrome is started and
//! attached exactly once more. The opt-in automated launch exists for
//! non-production testing only.
//!
//! Attach and launch failures are [`BootstrapError`]s: terminal, and classified as
//! unknown so the crash recovery never loops on it.

use super::driver::{
    BrowserConnector, ContextId, ElementState, PageDriver, RemoteBrowser, WaitUntil,
};
use crate::chatgpt::selectors;
use crate::config::{AutomationConfig, ZeroContextPolicy};
use crate::error::{BootstrapError, Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Root of the web app
pub const APP_URL: &str = "https://chatgpt.com";

/// Hosts that count as the web app
pub const APP_HOSTS: [&str; 2] = ["chatgpt.com", "chat.openai.com"];

/// Budget for the post-attach navigation to the app root
pub const APP_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Whether `url` points at the web app
pub fn is_app_url(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .is_some_and(|host| APP_HOSTS.contains(&host.as_str()))
}

/// How the current browser was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Nothing attached yet
    Unattached,
    /// Attached to a debug session that was already running
    AttachedViaExistingSession,
    /// Attached after starting a debug-enabled browser ourselves
    AttachedViaFreshLaunch,
    /// Opt-in automated browser owned by the driver
    LaunchedAutomated,
    /// The last bootstrap failed
    Failed,
}

impl ConnectionState {
    /// Whether the browser belongs to the user's debug session
    pub fn is_cdp(&self) -> bool {
        matches!(
            self,
            ConnectionState::AttachedViaExistingSession | ConnectionState::AttachedViaFreshLaunch
        )
    }
}

/// Bootstrap knobs
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    /// Attach over CDP
    pub use_cdp: bool,
    /// Debug endpoint
    pub cdp_url: String,
    /// Permit the automated launch when `use_cdp` is off
    pub allow_automated_launch: bool,
    /// Behaviour on an endpoint with no contexts
    pub zero_context_policy: ZeroContextPolicy,
    /// Wait between launching and re-attaching
    pub bootstrap_delay: Duration,
    /// Budget for the readiness signal
    pub ready_timeout: Duration,
}

impl From<&AutomationConfig> for BootstrapSettings {
    fn from(config: &AutomationConfig) -> Self {
        Self {
            use_cdp: config.use_cdp,
            cdp_url: config.cdp_url.clone(),
            allow_automated_launch: config.allow_automated_launch,
            zero_context_policy: config.zero_context_policy,
            bootstrap_delay: config.bootstrap_delay,
            ready_timeout: config.browser_timeout(),
        }
    }
}

/// A browser plus the page the automation drives
#[derive(Clone)]
pub struct Attachment {
    /// Browser connection
    pub browser: Arc<dyn RemoteBrowser>,
    /// Page on the app
    pub page: Arc<dyn PageDriver>,
    /// How it was obtained
    pub state: ConnectionState,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Attach, launch-and-reattach, or refuse
pub struct ConnectionBootstrap {
    connector: Arc<dyn BrowserConnector>,
    settings: BootstrapSettings,
    state: Mutex<ConnectionState>,
}

impl ConnectionBootstrap {
    /// Create a bootstrap over a connector
    pub fn new(connector: Arc<dyn BrowserConnector>, settings: BootstrapSettings) -> Self {
        Self {
            connector,
            settings,
            state: Mutex::new(ConnectionState::Unattached),
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Back to [`ConnectionState::Unattached`]
    pub fn reset(&self) {
        *self.state.lock() = ConnectionState::Unattached;
    }

    /// Settings in use
    pub fn settings(&self) -> &BootstrapSettings {
        &self.settings
    }

    /// Obtain a browser and a page on the app
    #[instrument(skip(self))]
    pub async fn attach(&self) -> Result<Attachment> {
        let result = if self.settings.use_cdp {
            self.attach_cdp().await
        } else {
            self.launch_automated().await
        };

        let result = match result {
            Ok(attachment) => match self.ensure_app_page(attachment.page.as_ref()).await {
                Ok(()) => Ok(attachment),
                Err(e) => {
                    release(attachment.browser.as_ref(), attachment.state).await;
                    Err(e)
                }
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(attachment) => {
                *self.state.lock() = attachment.state;
                info!("Browser ready ({:?})", attachment.state);
                Ok(attachment)
            }
            Err(e) => {
                *self.state.lock() = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    async fn attach_cdp(&self) -> Result<Attachment> {
        let endpoint = self.settings.cdp_url.as_str();
        info!("Attaching to debug endpoint {}", endpoint);

        match self.connector.attach(endpoint).await {
            Ok(browser) => {
                let page = self
                    .select_page_or_release(
                        browser.as_ref(),
                        ConnectionState::AttachedViaExistingSession,
                    )
                    .await?;
                Ok(Attachment {
                    browser,
                    page,
                    state: ConnectionState::AttachedViaExistingSession,
                })
            }
            Err(e) => {
                warn!("Attach to {} failed: {}; launching a debug-enabled browser", endpoint, e);
                self.connector
                    .launch_debug_browser()
                    .await
                    .map_err(|e| match e {
                        Error::Bootstrap(b) => b,
                        other => BootstrapError::LaunchFailed(other.to_string()),
                    })?;

                tokio::time::sleep(self.settings.bootstrap_delay).await;

                let browser = self.connector.attach(endpoint).await.map_err(|e| {
                    BootstrapError::AttachFailed {
                        endpoint: endpoint.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                let page = self
                    .select_page_or_release(
                        browser.as_ref(),
                        ConnectionState::AttachedViaFreshLaunch,
                    )
                    .await?;
                Ok(Attachment {
                    browser,
                    page,
                    state: ConnectionState::AttachedViaFreshLaunch,
                })
            }
        }
    }

    async fn launch_automated(&self) -> Result<Attachment> {
        if !self.settings.allow_automated_launch {
            return Err(BootstrapError::CdpRequired.into());
        }
        warn!("Launching an automated browser; this path is for non-production testing");
        let browser = self
            .connector
            .launch_automated()
            .await
            .map_err(|e| BootstrapError::LaunchFailed(e.to_string()))?;
        let page = match browser.new_page(None).await {
            Ok(page) => page,
            Err(e) => {
                release(browser.as_ref(), ConnectionState::LaunchedAutomated).await;
                return Err(BootstrapError::LaunchFailed(e.to_string()).into());
            }
        };
        Ok(Attachment {
            browser,
            page,
            state: ConnectionState::LaunchedAutomated,
        })
    }

    async fn select_page_or_release(
        &self,
        browser: &dyn RemoteBrowser,
        state: ConnectionState,
    ) -> Result<Arc<dyn PageDriver>> {
        match self.select_page(browser).await {
            Ok(page) => Ok(page),
            Err(e) => {
                release(browser, state).await;
                Err(e)
            }
        }
    }

    /// Pick the first context and a page on the app inside it
    async fn select_page(&self, browser: &dyn RemoteBrowser) -> Result<Arc<dyn PageDriver>> {
        let attach_failed = |e: Error| BootstrapError::AttachFailed {
            endpoint: self.settings.cdp_url.clone(),
            reason: e.to_string(),
        };

        let contexts = browser.contexts().await.map_err(attach_failed)?;
        let context: ContextId = match contexts.first() {
            Some(context) => context.clone(),
            None => match self.settings.zero_context_policy {
                ZeroContextPolicy::FailFast => {
                    return Err(BootstrapError::NoBrowserContexts {
                        endpoint: self.settings.cdp_url.clone(),
                    }
                    .into())
                }
                ZeroContextPolicy::CreateContext => {
                    info!("Endpoint has no browsing context, creating one");
                    browser.create_context().await.map_err(attach_failed)?
                }
            },
        };

        for page in browser.pages(&context).await.map_err(attach_failed)? {
            if is_app_url(&page.url().await.unwrap_or_default()) {
                info!("Adopting existing app page");
                return Ok(page);
            }
        }

        info!("No app page open, opening one");
        Ok(browser
            .new_page(Some(&context))
            .await
            .map_err(attach_failed)?)
    }

    async fn ensure_app_page(&self, page: &dyn PageDriver) -> Result<()> {
        let current = page.url().await.unwrap_or_default();
        if !is_app_url(&current) {
            page.goto(APP_URL, WaitUntil::DomContentLoaded, APP_NAVIGATION_TIMEOUT)
                .await?;
        }

        if let Err(e) = page
            .wait_for_selector(
                selectors::READY_SIGNAL,
                ElementState::Attached,
                self.settings.ready_timeout,
            )
            .await
        {
            warn!("App readiness signal not seen: {}", e);
        }
        Ok(())
    }
}

/// Drop a browser that will not be handed out. The user's debug browser is
/// only disconnected; an automated one is closed.
async fn release(browser: &dyn RemoteBrowser, state: ConnectionState) {
    let released = if state.is_cdp() {
        browser.disconnect().await
    } else {
        browser.shutdown().await
    };
    if let Err(e) = released {
        warn!("Releasing browser after failed bootstrap failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_app_url() {
        assert!(is_app_url("https://chatgpt.com"));
        assert!(is_app_url("https://chatgpt.com/c/123"));
        assert!(is_app_url("https://chat.openai.com/"));
        assert!(!is_app_url("https://example.com/chatgpt.com"));
        assert!(!is_app_url("https://evilchatgpt.com"));
        assert!(!is_app_url("about:blank"));
        assert!(!is_app_url(""));
    }

    #[test]
    fn test_connection_state_is_cdp() {
        assert!(ConnectionState::AttachedViaExistingSession.is_cdp());
        assert!(ConnectionState::AttachedViaFreshLaunch.is_cdp());
        assert!(!ConnectionState::LaunchedAutomated.is_cdp());
        assert!(!ConnectionState::Unattached.is_cdp());
    }

    #[test]
    fn test_settings_from_config() {
        let config = AutomationConfig::builder()
            .cdp_url("http://127.0.0.1:9333")
            .zero_context_policy(ZeroContextPolicy::CreateContext)
            .bootstrap_delay(Duration::from_secs(1))
            .build();
        let settings = BootstrapSettings::from(&config);
        assert!(settings.use_cdp);
        assert_eq!(settings.cdp_url, "http://127.0.0.1:9333");
        assert_eq!(settings.zero_context_policy, ZeroContextPolicy::CreateContext);
        assert_eq!(settings.bootstrap_delay, Duration::from_secs(1));
    }
}
