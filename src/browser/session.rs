//! Browser session lifecycle
//!
//! A [`BrowserSession`] owns the current [`Attachment`]. It launches through
//! the [`ConnectionBootstrap`], runs the login flow when the app asks for
//! one, and persists cookies for automated sessions. A session attached to
//! the user's own debug browser is only ever disconnected, never closed.

use super::bootstrap::{
    is_app_url, Attachment, BootstrapSettings, ConnectionBootstrap, ConnectionState,
};
use super::driver::{BrowserConnector, ElementState, PageDriver, WaitUntil};
use crate::chatgpt::selectors;
use crate::config::AutomationConfig;
use crate::error::{BrowserError, Error, Result};
use crate::recovery::ErrorKind;
use crate::session_store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const LOGIN_STEP_TIMEOUT: Duration = Duration::from_secs(10);
const LOGIN_COMPLETE_TIMEOUT: Duration = Duration::from_secs(60);
const MANUAL_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);
const RESTORE_RELOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// The browser and page one controller drives
pub struct BrowserSession {
    config: AutomationConfig,
    bootstrap: ConnectionBootstrap,
    store: SessionStore,
    current: Mutex<Option<Attachment>>,
}

impl BrowserSession {
    /// Create a session; nothing is launched until [`launch`](Self::launch)
    pub fn new(connector: Arc<dyn BrowserConnector>, config: AutomationConfig) -> Self {
        let bootstrap = ConnectionBootstrap::new(connector, BootstrapSettings::from(&config));
        let store = SessionStore::new(config.session_dir.clone());
        Self {
            config,
            bootstrap,
            store,
            current: Mutex::new(None),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// Where cookies are persisted
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// How the current browser was obtained
    pub fn connection_state(&self) -> ConnectionState {
        self.bootstrap.state()
    }

    /// Page in use, if launched
    pub async fn current_page(&self) -> Option<Arc<dyn PageDriver>> {
        self.current.lock().await.as_ref().map(|a| a.page.clone())
    }

    /// Page in use, or [`BrowserError::NotLaunched`]
    pub async fn page(&self) -> Result<Arc<dyn PageDriver>> {
        self.current_page()
            .await
            .ok_or_else(|| BrowserError::NotLaunched.into())
    }

    /// Whether a browser is attached
    pub async fn is_launched(&self) -> bool {
        self.current.lock().await.is_some()
    }

    /// Attach or launch, then log in if needed. A no-op when already launched.
    #[instrument(skip(self))]
    pub async fn launch(&self) -> Result<Arc<dyn PageDriver>> {
        let page = {
            let mut current = self.current.lock().await;
            if let Some(attachment) = current.as_ref() {
                debug!("Browser already launched");
                return Ok(attachment.page.clone());
            }

            info!("Launching browser...");
            let attachment = self.bootstrap.attach().await?;
            if attachment.state == ConnectionState::LaunchedAutomated
                && self.config.persist_session
            {
                self.restore_session(attachment.page.as_ref()).await;
            }
            let page = attachment.page.clone();
            *current = Some(attachment);
            page
        };

        if self.needs_login(page.as_ref()).await {
            if let Err(e) = self.login(page.as_ref()).await {
                warn!("Login failed: {}", e);
                if let Err(close_err) = self.close().await {
                    warn!("Cleanup after failed login failed: {}", close_err);
                }
                return Err(e);
            }
        }

        info!("Browser launched successfully");
        Ok(page)
    }

    /// Release the browser. Automated sessions save their cookies and close
    /// the process; debug sessions only disconnect.
    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<()> {
        let attachment = self.current.lock().await.take();
        let result = match attachment {
            None => Ok(()),
            Some(attachment) if attachment.state.is_cdp() => {
                info!("Keeping the user's browser open, disconnecting only");
                attachment.browser.disconnect().await
            }
            Some(attachment) => {
                if self.config.persist_session {
                    self.save_session(attachment.page.as_ref()).await;
                }
                if let Err(e) = attachment.page.close().await {
                    debug!("Page close failed: {}", e);
                }
                attachment.browser.shutdown().await
            }
        };
        self.bootstrap.reset();
        result
    }

    /// Whether the page shows the login screen instead of a chat
    pub async fn needs_login(&self, page: &dyn PageDriver) -> bool {
        for selector in selectors::LOGIN_INDICATORS {
            if page.count(selector).await.unwrap_or(0) > 0 {
                return true;
            }
        }
        for selector in selectors::CHAT_INDICATORS {
            if page.count(selector).await.unwrap_or(0) > 0 {
                return false;
            }
        }
        true
    }

    /// Log in with configured credentials, or wait for a manual login
    #[instrument(skip(self, page))]
    pub async fn login(&self, page: &dyn PageDriver) -> Result<()> {
        let (Some(email), Some(password)) = (&self.config.email, &self.config.password) else {
            info!(
                "No credentials configured, waiting up to {}s for a manual login",
                MANUAL_LOGIN_TIMEOUT.as_secs()
            );
            return page
                .wait_for_selector(selectors::PROMPT, ElementState::Visible, MANUAL_LOGIN_TIMEOUT)
                .await
                .map_err(|e| {
                    Error::classified(
                        ErrorKind::AuthenticationError,
                        format!("Manual login not completed: {e}"),
                    )
                });
        };

        info!("Logging in...");
        let auth_failed = |e: Error| {
            Error::classified(ErrorKind::AuthenticationError, format!("Login failed: {e}"))
        };

        if page.count(selectors::LOGIN_BUTTON).await.unwrap_or(0) > 0 {
            page.click(selectors::LOGIN_BUTTON, LOGIN_STEP_TIMEOUT)
                .await
                .map_err(auth_failed)?;
        } else if !page.click_text("button", selectors::LOGIN_BUTTON_TEXT).await? {
            debug!("No login button, assuming the form is already showing");
        }
        if let Err(e) = page
            .wait_for_load_state(WaitUntil::NetworkIdle, LOGIN_STEP_TIMEOUT)
            .await
        {
            debug!("Login page did not settle: {}", e);
        }

        page.wait_for_selector(selectors::EMAIL_INPUT, ElementState::Visible, LOGIN_STEP_TIMEOUT)
            .await
            .map_err(auth_failed)?;
        page.fill(selectors::EMAIL_INPUT, email).await.map_err(auth_failed)?;
        page.click(selectors::SUBMIT_BUTTON, LOGIN_STEP_TIMEOUT)
            .await
            .map_err(auth_failed)?;

        page.wait_for_selector(selectors::PASSWORD_INPUT, ElementState::Visible, LOGIN_STEP_TIMEOUT)
            .await
            .map_err(auth_failed)?;
        page.fill(selectors::PASSWORD_INPUT, password)
            .await
            .map_err(auth_failed)?;
        page.click(selectors::SUBMIT_BUTTON, LOGIN_STEP_TIMEOUT)
            .await
            .map_err(auth_failed)?;

        page.wait_for_selector(selectors::PROMPT, ElementState::Visible, LOGIN_COMPLETE_TIMEOUT)
            .await
            .map_err(auth_failed)?;
        if !is_app_url(&page.url().await.unwrap_or_default()) {
            return Err(Error::classified(
                ErrorKind::AuthenticationError,
                "Login did not return to the app",
            ));
        }

        info!("Login successful");
        Ok(())
    }

    async fn restore_session(&self, page: &dyn PageDriver) {
        let name = &self.config.session_name;
        match self.store.load(name) {
            Ok(Some(state)) => {
                info!("Loading session from {}", self.store.path_for(name).display());
                if let Err(e) = page.restore_storage_state(&state).await {
                    warn!("Failed to restore session: {}", e);
                    return;
                }
                if let Err(e) = page.reload(RESTORE_RELOAD_TIMEOUT).await {
                    warn!("Reload after session restore failed: {}", e);
                }
            }
            Ok(None) => debug!("No saved session named {}", name),
            Err(e) => warn!("Failed to read saved session: {}", e),
        }
    }

    async fn save_session(&self, page: &dyn PageDriver) {
        let saved = match page.storage_state().await {
            Ok(state) => self.store.save(&self.config.session_name, &state),
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            warn!("Failed to save session: {}", e);
        }
    }
}
