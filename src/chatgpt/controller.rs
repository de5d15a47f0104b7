//! High-level ChatGPT operations
//!
//! Every operation launches the browser first. Launch failures are
//! bootstrap errors and always reach the caller; failures after that go
//! through the recovery manager. Operations that only read state report a
//! failure as an empty answer instead of an error.

use super::conversations::{self, ConversationRef, ConversationSummary};
use super::export::{self, ExportFormat};
use super::response::{self, Message};
use super::selectors;
use crate::browser::bootstrap::{APP_NAVIGATION_TIMEOUT, APP_URL};
use crate::browser::driver::{BrowserConnector, ElementState, PageDriver, WaitUntil};
use crate::browser::{BrowserSession, ConnectionState};
use crate::config::AutomationConfig;
use crate::error::{BrowserError, Error, McpError, Result};
use crate::quota::{QuotaTracker, QuotaUsage};
use crate::recovery::{register_default_strategies, RecoveryManager, RecoveryRegistry};
use crate::timing::{format_timeout, response_timeout_for, Timings};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Wait budget for `wait_for_response` when the caller gives none
pub const DEFAULT_RESPONSE_WAIT: Duration = Duration::from_secs(30);

const MENU_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot reported by [`ChatGptController::status`]
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    /// `ready` or `not ready`
    pub status: &'static str,
    /// Whether the prompt box is on screen
    pub ready: bool,
    /// How the browser was obtained
    pub connection: ConnectionState,
    /// Model shown in the UI, when ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_model: Option<String>,
}

/// Drives one ChatGPT page
pub struct ChatGptController {
    session: Arc<BrowserSession>,
    recovery: RecoveryManager,
    config: AutomationConfig,
    timings: Timings,
    quota: Option<QuotaTracker>,
}

impl ChatGptController {
    /// Build a controller with the default recovery strategies
    pub fn new(connector: Arc<dyn BrowserConnector>, config: AutomationConfig) -> Self {
        let timings = Timings::with_multiplier(config.animation_multiplier);
        let quota = match QuotaTracker::open(config.data_dir()) {
            Ok(tracker) => Some(tracker),
            Err(e) => {
                warn!("Quota tracking disabled: {}", e);
                None
            }
        };
        Self::with_parts(connector, config, timings, quota)
    }

    /// Build a controller from explicit parts
    pub fn with_parts(
        connector: Arc<dyn BrowserConnector>,
        config: AutomationConfig,
        timings: Timings,
        quota: Option<QuotaTracker>,
    ) -> Self {
        let session = Arc::new(BrowserSession::new(connector, config.clone()));
        let mut registry = RecoveryRegistry::new();
        register_default_strategies(&mut registry, session.clone(), timings);
        Self {
            session,
            recovery: RecoveryManager::new(registry),
            config,
            timings,
            quota,
        }
    }

    /// Browser session
    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    /// Recovery manager used by the wrapped operations
    pub fn recovery(&self) -> &RecoveryManager {
        &self.recovery
    }

    /// UI delays in use
    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Quota tracker, when enabled
    pub fn quota(&self) -> Option<&QuotaTracker> {
        self.quota.as_ref()
    }

    /// Attach or launch the browser
    #[instrument(skip(self))]
    pub async fn launch(&self) -> Result<()> {
        self.session.launch().await.map(|_| ())
    }

    /// Release the browser
    pub async fn close(&self) -> Result<()> {
        self.session.close().await
    }

    async fn page(&self) -> Result<Arc<dyn PageDriver>> {
        self.session.page().await
    }

    /// Start a new conversation
    #[instrument(skip(self))]
    pub async fn new_chat(&self) -> Result<String> {
        self.launch().await?;
        self.recovery
            .with_recovery("new_chat")
            .once(|| self.new_chat_impl())
            .await
    }

    async fn new_chat_impl(&self) -> Result<String> {
        let page = self.page().await?;

        let mut clicked = false;
        for selector in selectors::NEW_CHAT_BUTTONS {
            if page.count(selector).await? > 0 {
                page.click(selector, self.config.default_wait_timeout()).await?;
                clicked = true;
                break;
            }
        }
        if !clicked {
            debug!("No new chat control, navigating to the app root");
            page.goto(APP_URL, WaitUntil::NetworkIdle, APP_NAVIGATION_TIMEOUT)
                .await?;
        }

        self.timings.pause(self.timings.ui_update).await;
        page.wait_for_selector(
            selectors::PROMPT,
            ElementState::Visible,
            self.config.browser_timeout(),
        )
        .await?;

        info!("New chat started");
        Ok("New chat started".to_string())
    }

    /// Type a message into the prompt and submit it
    #[instrument(skip(self, message))]
    pub async fn send_message(&self, message: &str) -> Result<String> {
        if message.trim().is_empty() {
            return Err(McpError::InvalidParams("message must not be empty".into()).into());
        }
        self.launch().await?;
        self.recovery
            .with_recovery("send_message")
            .once(|| self.send_message_impl(message))
            .await
    }

    async fn send_message_impl(&self, message: &str) -> Result<String> {
        let page = self.page().await?;
        page.wait_for_selector(
            selectors::PROMPT,
            ElementState::Visible,
            self.config.browser_timeout(),
        )
        .await?;
        page.fill(selectors::PROMPT, message).await?;
        self.timings.pause(self.timings.click).await;

        for selector in selectors::SEND_BUTTONS {
            if page.is_visible(selector).await.unwrap_or(false) {
                page.click(selector, self.config.default_wait_timeout()).await?;
                info!("Message sent");
                return Ok("Message sent".to_string());
            }
        }

        page.press(selectors::PROMPT, "Enter").await?;
        info!("Message sent via Enter");
        Ok("Message sent (via Enter)".to_string())
    }

    /// Wait for the response being generated. `Ok(false)` when it did not
    /// complete within `timeout`.
    #[instrument(skip(self))]
    pub async fn wait_for_response(&self, timeout: Duration) -> Result<bool> {
        self.launch().await?;
        let result = self
            .recovery
            .with_recovery("wait_for_response")
            .once(|| async {
                let page = self.page().await?;
                response::wait_for_completion(page.as_ref(), timeout).await
            })
            .await;
        match result {
            Ok(done) => Ok(done),
            Err(e) => {
                warn!("Waiting for response failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Text of the last conversation turn
    pub async fn get_last_response(&self) -> Result<Option<String>> {
        self.launch().await?;
        let page = self.page().await?;
        match page.inner_texts(selectors::CONVERSATION_TURN).await {
            Ok(turns) => Ok(response::last_response_from_turns(&turns)),
            Err(e) => {
                warn!("Failed to read last response: {}", e);
                Ok(None)
            }
        }
    }

    /// Every turn of the current conversation
    pub async fn get_conversation(&self) -> Result<Vec<Message>> {
        self.launch().await?;
        let page = self.page().await?;
        match page.inner_texts(selectors::CONVERSATION_TURN).await {
            Ok(turns) => Ok(response::conversation_from_turns(&turns)),
            Err(e) => {
                warn!("Failed to read conversation: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Model shown in the UI
    #[instrument(skip(self))]
    pub async fn get_current_model(&self) -> Result<Option<String>> {
        self.launch().await?;
        let result = self
            .recovery
            .with_recovery("get_current_model")
            .once(|| async {
                let page = self.page().await?;
                read_current_model(page.as_ref()).await
            })
            .await;
        match result {
            Ok(model) => Ok(model),
            Err(e) => {
                warn!("Failed to read current model: {}", e);
                Ok(None)
            }
        }
    }

    /// Switch the model. `Ok(false)` when the switch could not be made or
    /// verified.
    #[instrument(skip(self))]
    pub async fn select_model(&self, model: &str) -> Result<bool> {
        self.launch().await?;
        let result = self
            .recovery
            .with_recovery("select_model")
            .once(|| self.select_model_impl(model))
            .await;
        match result {
            Ok(selected) => Ok(selected),
            Err(e) => {
                warn!("Failed to select model {}: {}", model, e);
                Ok(false)
            }
        }
    }

    async fn select_model_impl(&self, model: &str) -> Result<bool> {
        let page = self.page().await?;

        if let Some(current) = read_current_model(page.as_ref()).await? {
            if model_matches(&current, model) {
                info!("Model {} already selected", model);
                return Ok(true);
            }
        }

        let mut opened = false;
        for picker in selectors::MODEL_PICKERS {
            if page.count(picker).await? > 0 {
                page.click(picker, self.config.default_wait_timeout()).await?;
                opened = true;
                break;
            }
        }
        if !opened {
            return Err(BrowserError::ElementNotFound("model picker".to_string()).into());
        }

        self.timings.pause(self.timings.menu_open).await;
        page.wait_for_selector(selectors::MENU, ElementState::Visible, MENU_TIMEOUT)
            .await?;

        if !page.click_text(selectors::MENU_ITEMS, model).await? {
            warn!("Model option {} not in menu", model);
            if let Err(e) = page.press("body", "Escape").await {
                debug!("Closing model menu failed: {}", e);
            }
            return Ok(false);
        }

        self.timings.pause(self.timings.model_selection).await;
        let selected = read_current_model(page.as_ref())
            .await?
            .is_some_and(|current| model_matches(&current, model));
        if selected {
            info!("Selected model {}", model);
        } else {
            warn!("Model {} was clicked but not confirmed", model);
        }
        Ok(selected)
    }

    /// Whether the prompt box is on screen. Never launches.
    pub async fn is_ready(&self) -> bool {
        match self.session.current_page().await {
            Some(page) => page.count(selectors::PROMPT).await.unwrap_or(0) > 0,
            None => false,
        }
    }

    /// Readiness, connection state and model
    pub async fn status(&self) -> Status {
        let ready = self.is_ready().await;
        let current_model = if ready {
            match self.page().await {
                Ok(page) => read_current_model(page.as_ref()).await.ok().flatten(),
                Err(_) => None,
            }
        } else {
            None
        };
        Status {
            status: if ready { "ready" } else { "not ready" },
            ready,
            connection: self.session.connection_state(),
            current_model,
        }
    }

    /// Send a message and return the response text.
    ///
    /// `mode` names a limited mode (see [`QUOTAS`](crate::quota::QUOTAS))
    /// whose monthly quota this message uses. It also selects the default
    /// wait budget.
    #[instrument(skip(self, message))]
    pub async fn send_and_get_response(
        &self,
        message: &str,
        timeout: Option<Duration>,
        mode: Option<&str>,
    ) -> Result<Option<String>> {
        if let Some(mode) = mode {
            self.check_quota(mode)?;
        }

        self.send_message(message).await?;
        if let (Some(mode), Some(quota)) = (mode, &self.quota) {
            quota.increment(mode);
        }

        let timeout = match timeout {
            Some(timeout) => timeout,
            None => {
                let model = self.get_current_model().await?;
                Duration::from_secs(response_timeout_for(model.as_deref(), mode))
            }
        };
        info!(
            "Waiting up to {} for the response",
            format_timeout(timeout.as_secs())
        );

        if !self.wait_for_response(timeout).await? {
            warn!("Response did not complete, reading what is there");
        }
        self.get_last_response().await
    }

    fn check_quota(&self, mode: &str) -> Result<()> {
        let Some(quota) = &self.quota else {
            return Ok(());
        };
        let check = quota.check(mode);
        if !check.allowed {
            return Err(Error::generic(check.message));
        }
        if quota.should_warn(mode) {
            warn!("{}", check.message);
        }
        Ok(())
    }

    /// Usage of every limited mode
    pub fn quota_summary(&self) -> BTreeMap<String, QuotaUsage> {
        self.quota
            .as_ref()
            .map(QuotaTracker::summary)
            .unwrap_or_default()
    }

    /// Save a screenshot under the screenshot directory
    #[instrument(skip(self))]
    pub async fn take_screenshot(&self, name: &str) -> Result<PathBuf> {
        self.launch().await?;
        let page = self.page().await?;
        let path = self.config.screenshot_path(name);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        page.screenshot(&path).await?;
        info!("Screenshot saved to {}", path.display());
        Ok(path)
    }

    /// Turn web search on or off. `Ok(false)` when no toggle was found.
    #[instrument(skip(self))]
    pub async fn toggle_search_mode(&self, enable: bool) -> Result<bool> {
        self.launch().await?;
        match self.toggle_search_impl(enable).await {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!("Failed to toggle search: {}", e);
                Ok(false)
            }
        }
    }

    async fn toggle_search_impl(&self, enable: bool) -> Result<bool> {
        let page = self.page().await?;
        for selector in selectors::SEARCH_TOGGLES {
            if page.count(selector).await? == 0 {
                continue;
            }
            let pressed = page.attribute(selector, "aria-pressed").await?;
            let on = pressed.as_deref() == Some("true");
            if on != enable {
                page.click(selector, self.config.default_wait_timeout()).await?;
                self.timings.pause(self.timings.toggle).await;
            }
            info!("Search mode {}", if enable { "enabled" } else { "disabled" });
            return Ok(true);
        }
        warn!("Search toggle not found");
        Ok(false)
    }

    /// Turn web browsing on or off. Browsing and web search are one toggle
    /// in the app.
    pub async fn toggle_browsing_mode(&self, enable: bool) -> Result<bool> {
        self.toggle_search_mode(enable).await
    }

    /// Attach a file to the prompt. `Ok(false)` when no upload control took
    /// it.
    #[instrument(skip(self))]
    pub async fn upload_file(&self, path: &Path) -> Result<bool> {
        if !path.is_file() {
            return Err(
                McpError::InvalidParams(format!("file not found: {}", path.display())).into(),
            );
        }
        self.launch().await?;
        let result = self
            .recovery
            .with_recovery("upload_file")
            .once(|| self.upload_file_impl(path))
            .await;
        match result {
            Ok(uploaded) => Ok(uploaded),
            Err(e) => {
                warn!("Failed to upload {}: {}", path.display(), e);
                Ok(false)
            }
        }
    }

    async fn upload_file_impl(&self, path: &Path) -> Result<bool> {
        let page = self.page().await?;
        let files = [path.to_path_buf()];

        for selector in selectors::FILE_INPUTS {
            if page.count(selector).await? > 0 {
                page.set_input_files(selector, &files).await?;
                self.timings.pause(self.timings.ui_update).await;
                info!("Uploaded {}", path.display());
                return Ok(true);
            }
        }

        for selector in selectors::UPLOAD_BUTTONS {
            if !page.is_visible(selector).await.unwrap_or(false) {
                continue;
            }
            if page
                .choose_files(selector, &files, self.config.default_wait_timeout())
                .await?
            {
                self.timings.pause(self.timings.ui_update).await;
                info!("Uploaded {} through the file chooser", path.display());
                return Ok(true);
            }
        }

        warn!("No file upload control found");
        Ok(false)
    }

    /// Conversations in the history sidebar; empty when none could be read
    #[instrument(skip(self))]
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.launch().await?;
        let result = self
            .recovery
            .with_recovery("list_conversations")
            .once(|| async {
                let page = self.page().await?;
                read_conversations(page.as_ref()).await
            })
            .await;
        match result {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!("Failed to list conversations: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Open another conversation. `Ok(false)` when it could not be found or
    /// opened.
    #[instrument(skip(self))]
    pub async fn switch_conversation(&self, target: &ConversationRef) -> Result<bool> {
        target.validate()?;
        self.launch().await?;
        let result = self
            .recovery
            .with_recovery("switch_conversation")
            .once(|| self.switch_conversation_impl(target))
            .await;
        match result {
            Ok(switched) => Ok(switched),
            Err(e) => {
                warn!("Failed to switch to conversation {}: {}", target, e);
                Ok(false)
            }
        }
    }

    async fn switch_conversation_impl(&self, target: &ConversationRef) -> Result<bool> {
        let page = self.page().await?;

        let entry = match target {
            ConversationRef::Id(id) if !target.needs_listing() => {
                return self.open_conversation(page.as_ref(), id).await;
            }
            ConversationRef::Id(id) => read_conversations(page.as_ref())
                .await?
                .into_iter()
                .find(|c| &c.id == id),
            ConversationRef::Index(index) => {
                read_conversations(page.as_ref()).await?.into_iter().nth(*index)
            }
        };
        let Some(entry) = entry else {
            warn!("Conversation {} is not in the sidebar", target);
            return Ok(false);
        };

        if !entry.has_positional_id() {
            return self.open_conversation(page.as_ref(), &entry.id).await;
        }
        for selector in selectors::CONVERSATION_LINKS {
            if page.click_text(selector, &entry.title).await? {
                self.timings.pause(self.timings.page_load).await;
                info!("Switched to conversation {}", entry.title);
                return Ok(true);
            }
        }
        warn!("Sidebar entry {} could not be clicked", entry.title);
        Ok(false)
    }

    async fn open_conversation(&self, page: &dyn PageDriver, id: &str) -> Result<bool> {
        let url = conversations::conversation_url(id)?;
        page.goto(&url, WaitUntil::DomContentLoaded, APP_NAVIGATION_TIMEOUT)
            .await?;
        self.timings.pause(self.timings.page_load).await;

        let ready = page.count(selectors::PROMPT).await? > 0;
        if ready {
            info!("Switched to conversation {}", id);
        } else {
            warn!("Conversation {} opened without a prompt box", id);
        }
        Ok(ready)
    }

    /// Delete a conversation. `Ok(false)` when it could not be opened or the
    /// deletion was not confirmed.
    #[instrument(skip(self))]
    pub async fn delete_conversation(&self, target: &ConversationRef) -> Result<bool> {
        target.validate()?;
        self.launch().await?;
        let result = self
            .recovery
            .with_recovery("delete_conversation")
            .once(|| self.delete_conversation_impl(target))
            .await;
        match result {
            Ok(deleted) => Ok(deleted),
            Err(e) => {
                warn!("Failed to delete conversation {}: {}", target, e);
                Ok(false)
            }
        }
    }

    async fn delete_conversation_impl(&self, target: &ConversationRef) -> Result<bool> {
        if !self.switch_conversation_impl(target).await? {
            return Ok(false);
        }
        let page = self.page().await?;

        if !self.open_delete_dialog(page.as_ref()).await? {
            warn!("Delete control not found");
            return Ok(false);
        }
        self.timings.pause(self.timings.menu_open).await;

        for selector in selectors::DELETE_CONFIRM_BUTTONS {
            if page.is_visible(selector).await.unwrap_or(false) {
                page.click(selector, self.config.default_wait_timeout()).await?;
                self.timings.pause(self.timings.ui_update).await;
                info!("Deleted conversation {}", target);
                return Ok(true);
            }
        }
        if page
            .click_text(selectors::DIALOG_BUTTONS, selectors::DELETE_TEXT)
            .await?
        {
            self.timings.pause(self.timings.ui_update).await;
            info!("Deleted conversation {}", target);
            return Ok(true);
        }

        warn!("Deletion of {} was not confirmed", target);
        Ok(false)
    }

    /// Click a delete control, directly or through a conversation menu
    async fn open_delete_dialog(&self, page: &dyn PageDriver) -> Result<bool> {
        for selector in selectors::DELETE_BUTTONS {
            if page.is_visible(selector).await.unwrap_or(false) {
                page.click(selector, self.config.default_wait_timeout()).await?;
                return Ok(true);
            }
        }

        for selector in selectors::CONVERSATION_OPTIONS {
            if !page.is_visible(selector).await.unwrap_or(false) {
                continue;
            }
            page.click(selector, self.config.default_wait_timeout()).await?;
            self.timings.pause(self.timings.menu_open).await;
            if page
                .click_text(selectors::MENU_ITEMS, selectors::DELETE_TEXT)
                .await?
            {
                return Ok(true);
            }
            if let Err(e) = page.press("body", "Escape").await {
                debug!("Closing conversation menu failed: {}", e);
            }
        }
        Ok(false)
    }

    /// Replace the text of the `index`-th user message (0-based) and
    /// resubmit it. `Ok(false)` when there is no such message or its editor
    /// could not be opened.
    #[instrument(skip(self, content))]
    pub async fn edit_message(&self, index: usize, content: &str) -> Result<bool> {
        if content.trim().is_empty() {
            return Err(McpError::InvalidParams("content must not be empty".into()).into());
        }
        self.launch().await?;
        let result = self
            .recovery
            .with_recovery("edit_message")
            .once(|| self.edit_message_impl(index, content))
            .await;
        match result {
            Ok(edited) => Ok(edited),
            Err(e) => {
                warn!("Failed to edit message {}: {}", index, e);
                Ok(false)
            }
        }
    }

    async fn edit_message_impl(&self, index: usize, content: &str) -> Result<bool> {
        let page = self.page().await?;

        let count = page.count(selectors::USER_MESSAGE).await?;
        if index >= count {
            warn!("No user message at index {} ({} found)", index, count);
            return Ok(false);
        }

        let mut opened = false;
        for selector in selectors::EDIT_BUTTONS {
            if page
                .click_within(selectors::USER_MESSAGE, index, selector)
                .await?
            {
                opened = true;
                break;
            }
        }
        if !opened {
            warn!("Edit control not found on message {}", index);
            return Ok(false);
        }
        self.timings.pause(self.timings.click).await;

        let mut editor = None;
        for selector in selectors::EDIT_TEXTAREAS {
            if page.count(selector).await? > 0 {
                editor = Some(*selector);
                break;
            }
        }
        let Some(editor) = editor else {
            warn!("Message editor not found");
            return Ok(false);
        };
        page.fill(editor, content).await?;

        for selector in selectors::EDIT_SUBMIT_BUTTONS {
            if page.is_visible(selector).await.unwrap_or(false) {
                page.click(selector, self.config.default_wait_timeout()).await?;
                info!("Edited message {}", index);
                return Ok(true);
            }
        }
        page.press(editor, "Enter").await?;
        info!("Edited message {} (via Enter)", index);
        Ok(true)
    }

    /// Regenerate the last response. `Ok(false)` when no control was found.
    #[instrument(skip(self))]
    pub async fn regenerate_response(&self) -> Result<bool> {
        self.launch().await?;
        match self.regenerate_impl().await {
            Ok(clicked) => Ok(clicked),
            Err(e) => {
                warn!("Failed to regenerate: {}", e);
                Ok(false)
            }
        }
    }

    async fn regenerate_impl(&self) -> Result<bool> {
        let page = self.page().await?;
        for selector in selectors::REGENERATE_BUTTONS {
            if page.count(selector).await? > 0 {
                page.click(selector, self.config.default_wait_timeout()).await?;
                self.timings.pause(self.timings.ui_update).await;
                info!("Regenerating response");
                return Ok(true);
            }
        }
        let clicked = page
            .click_text("button", selectors::REGENERATE_TEXT)
            .await?;
        if clicked {
            self.timings.pause(self.timings.ui_update).await;
        }
        Ok(clicked)
    }

    /// Render the conversation. `None` when there is nothing to export.
    pub async fn export_conversation(&self, format: ExportFormat) -> Result<Option<String>> {
        let messages = self.get_conversation().await?;
        if messages.is_empty() {
            warn!("No conversation to export");
            return Ok(None);
        }
        let model = self.get_current_model().await?;
        export::render(&messages, format, model.as_deref(), chrono::Local::now())
    }

    /// Export into the export directory. `None` when there is nothing to save.
    pub async fn save_conversation(
        &self,
        filename: Option<&str>,
        format: ExportFormat,
    ) -> Result<Option<PathBuf>> {
        let Some(content) = self.export_conversation(format).await? else {
            return Ok(None);
        };
        let stem = match filename {
            Some(name) => name.to_string(),
            None => export::default_file_stem(chrono::Local::now()),
        };
        export::save(&self.config.export_dir, &stem, format, &content).map(Some)
    }
}

/// Read the model name from the first few labels that look like one
async fn read_current_model(page: &dyn PageDriver) -> Result<Option<String>> {
    for selector in selectors::MODEL_LABELS {
        for text in page.inner_texts(selector).await?.iter().take(5) {
            let text = text.trim();
            if !text.is_empty() && selectors::mentions_model(text) {
                return Ok(Some(text.to_string()));
            }
        }
    }
    let title = page.title().await?;
    if selectors::mentions_model(&title) {
        return Ok(Some(title.trim().to_string()));
    }
    Ok(None)
}

/// Sidebar entries from the first link selector that yields any
async fn read_conversations(page: &dyn PageDriver) -> Result<Vec<ConversationSummary>> {
    for selector in selectors::CONVERSATION_LINKS {
        let titles = page.inner_texts(selector).await?;
        if titles.is_empty() {
            continue;
        }
        let hrefs = page.attributes(selector, "href").await?;
        let list = conversations::summaries_from(&titles, &hrefs);
        if !list.is_empty() {
            debug!("Found {} conversations", list.len());
            return Ok(list);
        }
    }
    Ok(Vec::new())
}

fn normalize_model(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Whether the UI label `current` names the requested model
fn model_matches(current: &str, requested: &str) -> bool {
    let requested = normalize_model(requested);
    !requested.is_empty() && normalize_model(current).contains(&requested)
}
