//! CDP backend
//!
//! chromiumoxide implementation of the [`driver`](super::driver) traits.
//! Waits are evaluated in the page as polling promises and bounded on our
//! side with `tokio::time::timeout`.

use super::driver::{
    BrowserConnector, ContextId, ElementState, PageDriver, RemoteBrowser, WaitUntil,
};
use super::launcher::ChromeLauncher;
use crate::config::AutomationConfig;
use crate::error::{BrowserError, Error, NavigationError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::{
    EventFileChooserOpened, SetInterceptFileChooserDialogParams,
};
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::handler::Handler;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Encode a Rust string as a JS string literal
fn js_str(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn file_list(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect()
}

fn as_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn load_state_script(state: WaitUntil) -> &'static str {
    match state {
        WaitUntil::Load => {
            r#"
                new Promise(resolve => {
                    if (document.readyState === 'complete') {
                        resolve(true);
                    } else {
                        window.addEventListener('load', () => resolve(true));
                    }
                })
            "#
        }
        WaitUntil::DomContentLoaded => {
            r#"
                new Promise(resolve => {
                    if (document.readyState !== 'loading') {
                        resolve(true);
                    } else {
                        document.addEventListener('DOMContentLoaded', () => resolve(true));
                    }
                })
            "#
        }
        WaitUntil::NetworkIdle => {
            r#"
                new Promise(resolve => {
                    const settle = () => {
                        let last = performance.getEntriesByType('resource').length;
                        const tick = () => {
                            const now = performance.getEntriesByType('resource').length;
                            if (now === last) {
                                resolve(true);
                            } else {
                                last = now;
                                setTimeout(tick, 500);
                            }
                        };
                        setTimeout(tick, 500);
                    };
                    if (document.readyState === 'complete') {
                        settle();
                    } else {
                        window.addEventListener('load', settle);
                    }
                })
            "#
        }
    }
}

fn element_check(selector: &str, state: ElementState) -> String {
    let visible = format!(
        "(() => {{ const el = document.querySelector({}); \
         return !!el && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length); }})()",
        js_str(selector)
    );
    match state {
        ElementState::Attached => format!("!!document.querySelector({})", js_str(selector)),
        ElementState::Visible => visible,
        ElementState::Hidden => format!("!{visible}"),
    }
}

/// A chromiumoxide page
#[derive(Clone)]
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    /// Wrap a chromiumoxide page
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Get the underlying chromiumoxide Page
    pub fn inner(&self) -> &Page {
        &self.page
    }

    async fn eval_value(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn eval_bool(&self, script: &str) -> Result<bool> {
        Ok(self.eval_value(script).await?.as_bool().unwrap_or(false))
    }

    async fn stop_intercepting_choosers(&self) {
        if let Err(e) = self
            .page
            .execute(SetInterceptFileChooserDialogParams::new(false))
            .await
        {
            debug!("Restoring the native file chooser failed: {}", e);
        }
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    #[instrument(skip(self))]
    async fn goto(&self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()> {
        let started = tokio::time::Instant::now();
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| NavigationError::Timeout {
                url: url.to_string(),
                ms: as_ms(timeout),
            })?
            .map_err(|e| NavigationError::LoadFailed(e.to_string()))?;

        let remaining = timeout.saturating_sub(started.elapsed());
        self.wait_for_load_state(wait, remaining).await
    }

    async fn reload(&self, timeout: Duration) -> Result<()> {
        let started = tokio::time::Instant::now();
        tokio::time::timeout(timeout, self.page.reload())
            .await
            .map_err(|_| BrowserError::Timeout {
                what: "reload".to_string(),
                ms: as_ms(timeout),
            })??;
        let remaining = timeout.saturating_sub(started.elapsed());
        self.wait_for_load_state(WaitUntil::DomContentLoaded, remaining).await
    }

    async fn url(&self) -> Result<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn wait_for_load_state(&self, state: WaitUntil, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.page.evaluate(load_state_script(state)))
            .await
            .map_err(|_| BrowserError::Timeout {
                what: format!("{state:?}"),
                ms: as_ms(timeout),
            })?
            .map_err(|e| Error::cdp(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()> {
        let timeout_ms = as_ms(timeout);
        let script = format!(
            r#"
                new Promise(resolve => {{
                    const start = Date.now();
                    const check = () => {{
                        if ({check}) {{
                            resolve(true);
                        }} else if (Date.now() - start > {timeout_ms}) {{
                            resolve(false);
                        }} else {{
                            setTimeout(check, 100);
                        }}
                    }};
                    check();
                }})
            "#,
            check = element_check(selector, state),
        );

        let met = tokio::time::timeout(timeout + Duration::from_secs(1), self.eval_bool(&script))
            .await
            .unwrap_or(Ok(false))?;
        if met {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                what: selector.to_string(),
                ms: timeout_ms,
            }
            .into())
        }
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let value = self
            .eval_value(&format!(
                "document.querySelectorAll({}).length",
                js_str(selector)
            ))
            .await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        self.eval_bool(&element_check(selector, ElementState::Visible))
            .await
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.wait_for_selector(selector, ElementState::Visible, timeout)
            .await?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::ActionFailed(e.to_string()))?;
        Ok(())
    }

    async fn click_text(&self, selector: &str, text: &str) -> Result<bool> {
        let elements = self.page.find_elements(selector).await.unwrap_or_default();
        for element in elements {
            let inner = element.inner_text().await.ok().flatten().unwrap_or_default();
            if inner.contains(text) {
                element
                    .click()
                    .await
                    .map_err(|e| BrowserError::ActionFailed(e.to_string()))?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::ActionFailed(e.to_string()))?;

        let clear = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                if ('value' in el) {{ el.value = ''; }} else {{ el.textContent = ''; }}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                return true;
            }})()"#,
            js_str(selector)
        );
        self.eval_value(&clear).await?;

        element
            .type_str(text)
            .await
            .map_err(|e| BrowserError::ActionFailed(e.to_string()))?;
        Ok(())
    }

    async fn press(&self, selector: &str, key: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element
            .press_key(key)
            .await
            .map_err(|e| BrowserError::ActionFailed(e.to_string()))?;
        Ok(())
    }

    async fn inner_texts(&self, selector: &str) -> Result<Vec<String>> {
        let value = self
            .eval_value(&format!(
                "Array.from(document.querySelectorAll({})).map(e => e.innerText || '')",
                js_str(selector)
            ))
            .await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let value = self
            .eval_value(&format!(
                "(() => {{ const el = document.querySelector({}); return el ? el.getAttribute({}) : null; }})()",
                js_str(selector),
                js_str(name)
            ))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn attributes(&self, selector: &str, name: &str) -> Result<Vec<Option<String>>> {
        let value = self
            .eval_value(&format!(
                "Array.from(document.querySelectorAll({})).map(e => e.getAttribute({}))",
                js_str(selector),
                js_str(name)
            ))
            .await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn click_within(&self, container: &str, index: usize, target: &str) -> Result<bool> {
        let containers = self.page.find_elements(container).await.unwrap_or_default();
        let Some(element) = containers.get(index) else {
            return Ok(false);
        };
        if let Err(e) = element.hover().await {
            debug!("Hover over {} failed: {}", container, e);
        }
        let Ok(control) = element.find_element(target).await else {
            return Ok(false);
        };
        control
            .click()
            .await
            .map_err(|e| BrowserError::ActionFailed(e.to_string()))?;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn set_input_files(&self, selector: &str, files: &[PathBuf]) -> Result<()> {
        let input = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        let mut params = SetFileInputFilesParams::new(file_list(files));
        params.backend_node_id = Some(input.backend_node_id);
        self.page.execute(params).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn choose_files(
        &self,
        trigger: &str,
        files: &[PathBuf],
        timeout: Duration,
    ) -> Result<bool> {
        self.page
            .execute(SetInterceptFileChooserDialogParams::new(true))
            .await?;
        let mut opened = self.page.event_listener::<EventFileChooserOpened>().await?;

        let chooser = match self.click(trigger, timeout).await {
            Ok(()) => tokio::time::timeout(timeout, opened.next())
                .await
                .ok()
                .flatten(),
            Err(e) => {
                self.stop_intercepting_choosers().await;
                return Err(e);
            }
        };
        self.stop_intercepting_choosers().await;

        let Some(node) = chooser.and_then(|event| event.backend_node_id.clone()) else {
            debug!("No file chooser opened after clicking {}", trigger);
            return Ok(false);
        };
        let mut params = SetFileInputFilesParams::new(file_list(files));
        params.backend_node_id = Some(node);
        self.page.execute(params).await?;
        Ok(true)
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.eval_value(script).await
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await?;
        Ok(())
    }

    async fn storage_state(&self) -> Result<Value> {
        let cookies = self.page.get_cookies().await?;
        Ok(serde_json::json!({ "cookies": cookies }))
    }

    async fn restore_storage_state(&self, state: &Value) -> Result<()> {
        let cookies: Vec<CookieParam> = match state.get("cookies") {
            Some(raw) => serde_json::from_value(raw.clone())?,
            None => Vec::new(),
        };
        if !cookies.is_empty() {
            debug!("Restoring {} cookies", cookies.len());
            self.page.set_cookies(cookies).await?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.page.clone().close().await?;
        Ok(())
    }
}

fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                warn!("Browser handler event error");
                break;
            }
        }
        debug!("Browser handler finished");
    })
}

/// A chromiumoxide browser connection
pub struct CdpBrowser {
    browser: Mutex<Browser>,
    handler: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl CdpBrowser {
    fn new(browser: Browser, handler: Handler) -> Self {
        Self {
            browser: Mutex::new(browser),
            handler: parking_lot::Mutex::new(Some(spawn_handler(handler))),
        }
    }

    async fn page_targets(&self) -> Result<Vec<(String, Option<String>)>> {
        let targets = self.browser.lock().await.fetch_targets().await?;
        Ok(targets
            .into_iter()
            .filter(|t| t.r#type == "page")
            .map(|t| {
                (
                    t.target_id.inner().clone(),
                    t.browser_context_id.map(|c| c.inner().clone()),
                )
            })
            .collect())
    }
}

#[async_trait]
impl RemoteBrowser for CdpBrowser {
    async fn contexts(&self) -> Result<Vec<ContextId>> {
        let mut seen = HashSet::new();
        let contexts = self
            .page_targets()
            .await?
            .into_iter()
            .filter_map(|(_, context)| context)
            .filter(|c| seen.insert(c.clone()))
            .collect();
        Ok(contexts)
    }

    async fn pages(&self, context: &ContextId) -> Result<Vec<Arc<dyn PageDriver>>> {
        let wanted: HashSet<String> = self
            .page_targets()
            .await?
            .into_iter()
            .filter(|(_, c)| c.as_ref() == Some(context))
            .map(|(id, _)| id)
            .collect();

        // Attached targets show up on the handler shortly after discovery
        let mut pages = Vec::new();
        for _ in 0..10 {
            pages = self.browser.lock().await.pages().await?;
            if pages.iter().any(|p| wanted.contains(p.target_id().inner())) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        Ok(pages
            .into_iter()
            .filter(|p| wanted.contains(p.target_id().inner()))
            .map(|p| Arc::new(CdpPage::new(p)) as Arc<dyn PageDriver>)
            .collect())
    }

    async fn new_page(&self, context: Option<&ContextId>) -> Result<Arc<dyn PageDriver>> {
        let mut params = CreateTargetParams::builder().url("about:blank");
        if let Some(context) = context {
            params = params.browser_context_id(BrowserContextId::new(context.clone()));
        }
        let params = params.build().map_err(BrowserError::PageCreationFailed)?;
        let page = self
            .browser
            .lock()
            .await
            .new_page(params)
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;
        Ok(Arc::new(CdpPage::new(page)))
    }

    async fn create_context(&self) -> Result<ContextId> {
        let id = self
            .browser
            .lock()
            .await
            .create_browser_context(CreateBrowserContextParams::default())
            .await?;
        Ok(id.inner().clone())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(handler) = self.handler.lock().take() {
            handler.abort();
        }
        info!("Disconnected from browser");
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Closing browser");
        self.browser
            .lock()
            .await
            .close()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;

        let handler = self.handler.lock().take();
        if let Some(handler) = handler {
            let _ = tokio::time::timeout(Duration::from_secs(5), handler).await;
        }
        info!("Browser closed");
        Ok(())
    }
}

/// Resolve the browser websocket URL behind an HTTP debug endpoint
pub async fn resolve_ws_url(endpoint: &str) -> Result<String> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        return Ok(endpoint.to_string());
    }
    let version_url = format!("{}/json/version", endpoint.trim_end_matches('/'));
    let version: Value = reqwest::Client::new()
        .get(&version_url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .map_err(|e| Error::cdp(format!("{version_url}: {e}")))?
        .json()
        .await
        .map_err(|e| Error::cdp(format!("{version_url}: {e}")))?;
    version
        .get("webSocketDebuggerUrl")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::cdp(format!("{version_url} has no webSocketDebuggerUrl")))
}

/// chromiumoxide connector
#[derive(Debug, Clone)]
pub struct CdpConnector {
    config: AutomationConfig,
    launcher: ChromeLauncher,
}

impl CdpConnector {
    /// Create a connector for the given configuration
    pub fn new(config: AutomationConfig) -> Self {
        let launcher = ChromeLauncher::from_config(&config);
        Self { config, launcher }
    }
}

#[async_trait]
impl BrowserConnector for CdpConnector {
    #[instrument(skip(self))]
    async fn attach(&self, endpoint: &str) -> Result<Arc<dyn RemoteBrowser>> {
        let ws_url = resolve_ws_url(endpoint).await?;
        let (browser, handler) = Browser::connect(ws_url).await?;
        info!("Connected to browser at {}", endpoint);
        Ok(Arc::new(CdpBrowser::new(browser, handler)))
    }

    async fn launch_debug_browser(&self) -> Result<()> {
        self.launcher.launch().await
    }

    #[instrument(skip(self))]
    async fn launch_automated(&self) -> Result<Arc<dyn RemoteBrowser>> {
        info!(
            "Launching automated browser: headless={}",
            self.config.headless
        );
        let mut builder = CdpBrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .request_timeout(self.config.browser_timeout());
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = self.launcher.find_chrome() {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder.build().map_err(BrowserError::LaunchFailed)?;
        let (browser, handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;
        info!("Browser launched successfully");
        Ok(Arc::new(CdpBrowser::new(browser, handler)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_str_escapes() {
        assert_eq!(js_str("a'b\"c"), r#""a'b\"c""#);
    }

    #[test]
    fn test_element_check_scripts() {
        let attached = element_check("#prompt-textarea", ElementState::Attached);
        assert_eq!(attached, "!!document.querySelector(\"#prompt-textarea\")");
        let hidden = element_check("#x", ElementState::Hidden);
        assert!(hidden.starts_with("!(() =>"));
    }

    #[test]
    fn test_as_ms() {
        assert_eq!(as_ms(Duration::from_secs(2)), 2000);
    }

    #[tokio::test]
    async fn test_resolve_ws_passthrough() {
        let url = resolve_ws_url("ws://127.0.0.1:9222/devtools/browser/x")
            .await
            .unwrap();
        assert_eq!(url, "ws://127.0.0.1:9222/devtools/browser/x");
    }
}
