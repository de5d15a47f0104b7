//! In-memory browser doubles shared by the integration tests
//!
//! A [`FakePage`] models a page as a set of atomic selectors with a match
//! count and a visibility flag. Comma-separated selector lists match when
//! any of their parts does, the way `querySelector` treats them.

#![allow(dead_code)]

use async_trait::async_trait;
use chatgpt_automation::browser::driver::{
    BrowserConnector, ContextId, ElementState, PageDriver, RemoteBrowser, WaitUntil,
};
use chatgpt_automation::chatgpt::selectors;
use chatgpt_automation::error::{BrowserError, Error, Result};
use chatgpt_automation::AutomationConfig;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mutates the page when something is clicked
pub type ClickEffect = Arc<dyn Fn(&mut PageState) + Send + Sync>;

/// Everything a [`FakePage`] knows about its document
#[derive(Default)]
pub struct PageState {
    pub url: String,
    pub title: String,
    pub counts: HashMap<String, usize>,
    pub visible: HashSet<String>,
    pub texts: HashMap<String, Vec<String>>,
    pub clickable_texts: HashMap<String, Vec<String>>,
    pub attributes: HashMap<(String, String), String>,
    pub attribute_lists: HashMap<(String, String), Vec<Option<String>>>,
    /// `(container, control)` pairs `click_within` can hit
    pub nested: HashSet<(String, String)>,
    /// Triggers that open a file chooser
    pub file_choosers: HashSet<String>,
    pub uploaded: Vec<PathBuf>,
    pub cookies: Value,
    pub closed: bool,
}

impl PageState {
    fn parts(selector: &str) -> impl Iterator<Item = &str> {
        selector.split(", ").map(str::trim)
    }

    fn count_of(&self, selector: &str) -> usize {
        Self::parts(selector)
            .map(|part| self.counts.get(part).copied().unwrap_or(0))
            .sum()
    }

    fn is_visible(&self, selector: &str) -> bool {
        Self::parts(selector).any(|part| self.visible.contains(part))
    }

    /// Add a rendered element
    pub fn show(&mut self, selector: &str) {
        *self.counts.entry(selector.to_string()).or_insert(0) += 1;
        self.visible.insert(selector.to_string());
    }

    /// Remove every match of `selector`
    pub fn remove(&mut self, selector: &str) {
        self.counts.remove(selector);
        self.visible.remove(selector);
    }
}

/// Scriptable [`PageDriver`]
pub struct FakePage {
    state: Mutex<PageState>,
    failures: Mutex<HashMap<&'static str, VecDeque<Error>>>,
    effects: Mutex<HashMap<String, ClickEffect>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::blank()
    }
}

impl FakePage {
    /// An `about:blank` page with nothing on it
    pub fn blank() -> Self {
        Self {
            state: Mutex::new(PageState {
                url: "about:blank".to_string(),
                cookies: json!([]),
                ..Default::default()
            }),
            failures: Mutex::new(HashMap::new()),
            effects: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A logged-in app page with the prompt box showing
    pub fn chat_ready() -> Self {
        let page = Self::blank();
        page.with_state(|s| {
            s.url = "https://chatgpt.com/".to_string();
            s.title = "ChatGPT".to_string();
            s.show("html.dark");
            s.show(selectors::PROMPT);
        });
        page
    }

    /// The login screen
    pub fn login_screen() -> Self {
        let page = Self::blank();
        page.with_state(|s| {
            s.url = "https://chatgpt.com/auth/login".to_string();
            s.show("html.dark");
            s.show(selectors::LOGIN_BUTTON);
        });
        page
    }

    /// Page at `url` with nothing on it
    pub fn at(url: &str) -> Self {
        let page = Self::blank();
        page.with_state(|s| s.url = url.to_string());
        page
    }

    /// Inspect or change the document
    pub fn with_state<R>(&self, f: impl FnOnce(&mut PageState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Add a rendered element
    pub fn show(&self, selector: &str) {
        self.with_state(|s| s.show(selector));
    }

    /// Set the inner texts returned for `selector`
    pub fn set_texts(&self, selector: &str, texts: &[&str]) {
        self.with_state(|s| {
            s.texts.insert(
                selector.to_string(),
                texts.iter().map(|t| t.to_string()).collect(),
            );
        });
    }

    /// Text entries `click_text(selector, ..)` can hit
    pub fn set_clickable_texts(&self, selector: &str, texts: &[&str]) {
        self.with_state(|s| {
            s.clickable_texts.insert(
                selector.to_string(),
                texts.iter().map(|t| t.to_string()).collect(),
            );
        });
    }

    /// Attribute values `attributes(selector, name)` returns
    pub fn set_attribute_list(&self, selector: &str, name: &str, values: &[Option<&str>]) {
        self.with_state(|s| {
            s.attribute_lists.insert(
                (selector.to_string(), name.to_string()),
                values.iter().map(|v| v.map(str::to_string)).collect(),
            );
        });
    }

    /// Render `control` inside every match of `container`
    pub fn nest(&self, container: &str, control: &str) {
        self.with_state(|s| {
            s.nested.insert((container.to_string(), control.to_string()));
        });
    }

    /// Make clicking `trigger` open a file chooser
    pub fn open_chooser_on(&self, trigger: &str) {
        self.show(trigger);
        self.with_state(|s| {
            s.file_choosers.insert(trigger.to_string());
        });
    }

    /// Files handed to the page so far
    pub fn uploaded(&self) -> Vec<PathBuf> {
        self.with_state(|s| s.uploaded.clone())
    }

    /// Run `effect` whenever `target` is clicked; `target` is the selector
    /// passed to `click` or the text passed to `click_text`
    pub fn on_click(&self, target: &str, effect: impl Fn(&mut PageState) + Send + Sync + 'static) {
        self.effects
            .lock()
            .insert(target.to_string(), Arc::new(effect));
    }

    /// Make the next call of `method` fail with `error`
    pub fn fail_next(&self, method: &'static str, error: Error) {
        self.failures
            .lock()
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// Every recorded call, oldest first
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls starting with `prefix`
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn current_url(&self) -> String {
        self.with_state(|s| s.url.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.with_state(|s| s.closed)
    }

    fn enter(&self, method: &'static str, detail: &str) -> Result<()> {
        self.calls.lock().push(if detail.is_empty() {
            method.to_string()
        } else {
            format!("{method}:{detail}")
        });
        match self.failures.lock().get_mut(method).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn apply_effect(&self, target: &str) {
        let effect = self.effects.lock().get(target).cloned();
        if let Some(effect) = effect {
            effect(&mut self.state.lock());
        }
    }
}

fn timeout(what: &str, timeout: Duration) -> Error {
    BrowserError::Timeout {
        what: what.to_string(),
        ms: timeout.as_millis() as u64,
    }
    .into()
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str, _wait: WaitUntil, _timeout: Duration) -> Result<()> {
        self.enter("goto", url)?;
        self.with_state(|s| s.url = url.to_string());
        Ok(())
    }

    async fn reload(&self, _timeout: Duration) -> Result<()> {
        self.enter("reload", "")
    }

    async fn url(&self) -> Result<String> {
        self.enter("url", "")?;
        Ok(self.current_url())
    }

    async fn title(&self) -> Result<String> {
        self.enter("title", "")?;
        Ok(self.with_state(|s| s.title.clone()))
    }

    async fn wait_for_load_state(&self, _state: WaitUntil, _timeout: Duration) -> Result<()> {
        self.enter("wait_for_load_state", "")
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        budget: Duration,
    ) -> Result<()> {
        self.enter("wait_for_selector", selector)?;
        let met = self.with_state(|s| match state {
            ElementState::Attached => s.count_of(selector) > 0,
            ElementState::Visible => s.is_visible(selector),
            ElementState::Hidden => !s.is_visible(selector),
        });
        if met {
            Ok(())
        } else {
            Err(timeout(&format!("selector {selector}"), budget))
        }
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        self.enter("count", selector)?;
        Ok(self.with_state(|s| s.count_of(selector)))
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        self.enter("is_visible", selector)?;
        Ok(self.with_state(|s| s.is_visible(selector)))
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> Result<()> {
        self.enter("click", selector)?;
        if self.with_state(|s| s.count_of(selector)) == 0 {
            return Err(BrowserError::ElementNotFound(selector.to_string()).into());
        }
        self.apply_effect(selector);
        Ok(())
    }

    async fn click_text(&self, selector: &str, text: &str) -> Result<bool> {
        self.enter("click_text", &format!("{selector}:{text}"))?;
        let hit = self.with_state(|s| {
            s.clickable_texts
                .get(selector)
                .is_some_and(|texts| texts.iter().any(|t| t.contains(text)))
        });
        if hit {
            self.apply_effect(text);
        }
        Ok(hit)
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.enter("fill", &format!("{selector}:{text}"))?;
        if self.with_state(|s| s.count_of(selector)) == 0 {
            return Err(BrowserError::ElementNotFound(selector.to_string()).into());
        }
        Ok(())
    }

    async fn press(&self, selector: &str, key: &str) -> Result<()> {
        self.enter("press", &format!("{selector}:{key}"))
    }

    async fn inner_texts(&self, selector: &str) -> Result<Vec<String>> {
        self.enter("inner_texts", selector)?;
        Ok(self.with_state(|s| s.texts.get(selector).cloned().unwrap_or_default()))
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        self.enter("attribute", &format!("{selector}:{name}"))?;
        Ok(self.with_state(|s| {
            s.attributes
                .get(&(selector.to_string(), name.to_string()))
                .cloned()
        }))
    }

    async fn attributes(&self, selector: &str, name: &str) -> Result<Vec<Option<String>>> {
        self.enter("attributes", &format!("{selector}:{name}"))?;
        Ok(self.with_state(|s| {
            s.attribute_lists
                .get(&(selector.to_string(), name.to_string()))
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn click_within(&self, container: &str, index: usize, target: &str) -> Result<bool> {
        self.enter("click_within", &format!("{container}[{index}]:{target}"))?;
        let hit = self.with_state(|s| {
            index < s.count_of(container)
                && s.nested
                    .contains(&(container.to_string(), target.to_string()))
        });
        if hit {
            self.apply_effect(target);
        }
        Ok(hit)
    }

    async fn set_input_files(&self, selector: &str, files: &[PathBuf]) -> Result<()> {
        self.enter("set_input_files", selector)?;
        if self.with_state(|s| s.count_of(selector)) == 0 {
            return Err(BrowserError::ElementNotFound(selector.to_string()).into());
        }
        self.with_state(|s| s.uploaded.extend_from_slice(files));
        Ok(())
    }

    async fn choose_files(
        &self,
        trigger: &str,
        files: &[PathBuf],
        _timeout: Duration,
    ) -> Result<bool> {
        self.enter("choose_files", trigger)?;
        let opened = self.with_state(|s| {
            let opened = s.file_choosers.contains(trigger);
            if opened {
                s.uploaded.extend_from_slice(files);
            }
            opened
        });
        Ok(opened)
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.enter("evaluate", script)?;
        Ok(Value::Null)
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.enter("screenshot", &path.display().to_string())?;
        std::fs::write(path, b"\x89PNG\r\n\x1a\nfake")?;
        Ok(())
    }

    async fn storage_state(&self) -> Result<Value> {
        self.enter("storage_state", "")?;
        Ok(json!({ "cookies": self.with_state(|s| s.cookies.clone()) }))
    }

    async fn restore_storage_state(&self, state: &Value) -> Result<()> {
        self.enter("restore_storage_state", "")?;
        let cookies = state.get("cookies").cloned().unwrap_or_else(|| json!([]));
        self.with_state(|s| s.cookies = cookies);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.enter("close", "")?;
        self.with_state(|s| s.closed = true);
        Ok(())
    }
}

/// Scriptable [`RemoteBrowser`]
pub struct FakeBrowser {
    contexts: Mutex<Vec<ContextId>>,
    pages: Mutex<HashMap<ContextId, Vec<Arc<FakePage>>>>,
    next_page: Mutex<Option<Arc<FakePage>>>,
    pub new_pages: AtomicUsize,
    pub created_contexts: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl FakeBrowser {
    /// A browser with no contexts
    pub fn empty() -> Self {
        Self {
            contexts: Mutex::new(Vec::new()),
            pages: Mutex::new(HashMap::new()),
            next_page: Mutex::new(None),
            new_pages: AtomicUsize::new(0),
            created_contexts: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        }
    }

    /// One default context holding `pages`
    pub fn with_pages(pages: Vec<Arc<FakePage>>) -> Self {
        let browser = Self::empty();
        browser.contexts.lock().push("default".to_string());
        browser.pages.lock().insert("default".to_string(), pages);
        browser
    }

    /// Page handed out by the next `new_page`
    pub fn set_next_page(&self, page: Arc<FakePage>) {
        *self.next_page.lock() = Some(page);
    }

    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        Self::count(&self.disconnects)
    }

    pub fn shutdown_count(&self) -> usize {
        Self::count(&self.shutdowns)
    }

    pub fn new_page_count(&self) -> usize {
        Self::count(&self.new_pages)
    }

    pub fn created_context_count(&self) -> usize {
        Self::count(&self.created_contexts)
    }
}

#[async_trait]
impl RemoteBrowser for FakeBrowser {
    async fn contexts(&self) -> Result<Vec<ContextId>> {
        Ok(self.contexts.lock().clone())
    }

    async fn pages(&self, context: &ContextId) -> Result<Vec<Arc<dyn PageDriver>>> {
        Ok(self
            .pages
            .lock()
            .get(context)
            .map(|pages| {
                pages
                    .iter()
                    .map(|p| p.clone() as Arc<dyn PageDriver>)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn new_page(&self, context: Option<&ContextId>) -> Result<Arc<dyn PageDriver>> {
        self.new_pages.fetch_add(1, Ordering::SeqCst);
        let page = self
            .next_page
            .lock()
            .take()
            .unwrap_or_else(|| Arc::new(FakePage::blank()));
        if let Some(context) = context {
            self.pages
                .lock()
                .entry(context.clone())
                .or_default()
                .push(page.clone());
        }
        Ok(page as Arc<dyn PageDriver>)
    }

    async fn create_context(&self) -> Result<ContextId> {
        let n = self.created_contexts.fetch_add(1, Ordering::SeqCst);
        let id = format!("created-{n}");
        self.contexts.lock().push(id.clone());
        Ok(id)
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted result of one `attach`
pub enum AttachOutcome {
    /// Hand out this browser
    Browser(Arc<FakeBrowser>),
    /// Refuse the connection
    Refuse(String),
}

/// Scriptable [`BrowserConnector`]
pub struct FakeConnector {
    browser: Arc<FakeBrowser>,
    attach_script: Mutex<VecDeque<AttachOutcome>>,
    launch_debug_error: Mutex<Option<String>>,
    pub attaches: AtomicUsize,
    pub debug_launches: AtomicUsize,
    pub automated_launches: AtomicUsize,
}

impl FakeConnector {
    /// Every attach succeeds with `browser` unless scripted otherwise
    pub fn new(browser: Arc<FakeBrowser>) -> Self {
        Self {
            browser,
            attach_script: Mutex::new(VecDeque::new()),
            launch_debug_error: Mutex::new(None),
            attaches: AtomicUsize::new(0),
            debug_launches: AtomicUsize::new(0),
            automated_launches: AtomicUsize::new(0),
        }
    }

    /// Connector whose browser already shows `page` on the app
    pub fn with_page(page: Arc<FakePage>) -> Self {
        Self::new(Arc::new(FakeBrowser::with_pages(vec![page])))
    }

    /// Queue the outcome of the next attach
    pub fn script_attach(&self, outcome: AttachOutcome) {
        self.attach_script.lock().push_back(outcome);
    }

    /// Queue a refused attach
    pub fn refuse_next_attach(&self) {
        self.script_attach(AttachOutcome::Refuse(
            "connect ECONNREFUSED 127.0.0.1:9222".to_string(),
        ));
    }

    /// Make `launch_debug_browser` fail
    pub fn fail_debug_launch(&self, reason: &str) {
        *self.launch_debug_error.lock() = Some(reason.to_string());
    }

    pub fn browser(&self) -> &Arc<FakeBrowser> {
        &self.browser
    }

    pub fn attach_count(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn debug_launch_count(&self) -> usize {
        self.debug_launches.load(Ordering::SeqCst)
    }

    pub fn automated_launch_count(&self) -> usize {
        self.automated_launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserConnector for FakeConnector {
    async fn attach(&self, _endpoint: &str) -> Result<Arc<dyn RemoteBrowser>> {
        self.attaches.fetch_add(1, Ordering::SeqCst);
        let outcome = self.attach_script.lock().pop_front();
        match outcome {
            Some(AttachOutcome::Browser(browser)) => Ok(browser as Arc<dyn RemoteBrowser>),
            Some(AttachOutcome::Refuse(reason)) => Err(Error::cdp(reason)),
            None => Ok(self.browser.clone() as Arc<dyn RemoteBrowser>),
        }
    }

    async fn launch_debug_browser(&self) -> Result<()> {
        self.debug_launches.fetch_add(1, Ordering::SeqCst);
        match self.launch_debug_error.lock().clone() {
            Some(reason) => Err(Error::cdp(reason)),
            None => Ok(()),
        }
    }

    async fn launch_automated(&self) -> Result<Arc<dyn RemoteBrowser>> {
        self.automated_launches.fetch_add(1, Ordering::SeqCst);
        Ok(self.browser.clone() as Arc<dyn RemoteBrowser>)
    }
}

/// Config rooted in a temporary directory, with no UI or bootstrap delays
pub fn test_config(root: &Path) -> AutomationConfig {
    AutomationConfig::builder()
        .data_root(root)
        .bootstrap_delay(Duration::ZERO)
        .persist_session(false)
        .build()
}
