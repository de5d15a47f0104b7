//! Page automation seam
//!
//! Everything above this module talks to the browser through these traits.
//! [`crate::browser::cdp`] implements them over chromiumoxide; tests provide
//! in-memory doubles.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Opaque identifier of a browsing context (a cookie jar and its pages)
pub type ContextId = String;

/// Condition to wait for after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// Wait until load event fires
    Load,
    /// Wait until DOMContentLoaded event fires
    DomContentLoaded,
    /// Wait until the network has been quiet for a moment
    NetworkIdle,
}

/// Element condition for [`PageDriver::wait_for_selector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    /// Present in the DOM
    Attached,
    /// Present and rendered
    Visible,
    /// Absent or not rendered
    Hidden,
}

/// One open page/tab
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for `wait`
    async fn goto(&self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()>;

    /// Reload the current document
    async fn reload(&self, timeout: Duration) -> Result<()>;

    /// Current URL
    async fn url(&self) -> Result<String>;

    /// Document title
    async fn title(&self) -> Result<String>;

    /// Wait for a document load state
    async fn wait_for_load_state(&self, state: WaitUntil, timeout: Duration) -> Result<()>;

    /// Wait until the first match of `selector` reaches `state`
    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Whether the first match of `selector` is rendered
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    /// Click the first match of `selector`, waiting up to `timeout` for it
    async fn click(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Click the first match of `selector` whose text contains `text`;
    /// `false` when nothing matched
    async fn click_text(&self, selector: &str, text: &str) -> Result<bool>;

    /// Replace the content of an input or editable element
    async fn fill(&self, selector: &str, text: &str) -> Result<()>;

    /// Press a key while the first match of `selector` has focus
    async fn press(&self, selector: &str, key: &str) -> Result<()>;

    /// Inner text of every match, in document order
    async fn inner_texts(&self, selector: &str) -> Result<Vec<String>>;

    /// Attribute of the first match; `None` when absent
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;

    /// Attribute `name` of every match, in document order
    async fn attributes(&self, selector: &str, name: &str) -> Result<Vec<Option<String>>>;

    /// Inside the `index`-th match of `container`, click the first match of
    /// `target`; `false` when either is missing. Hovers the container first
    /// so hover-only controls render.
    async fn click_within(&self, container: &str, index: usize, target: &str) -> Result<bool>;

    /// Set the files of the first `<input type=file>` matching `selector`
    async fn set_input_files(&self, selector: &str, files: &[PathBuf]) -> Result<()>;

    /// Click `trigger` with the file chooser intercepted and answer it with
    /// `files`; `false` when no chooser opened within `timeout`
    async fn choose_files(
        &self,
        trigger: &str,
        files: &[PathBuf],
        timeout: Duration,
    ) -> Result<bool>;

    /// Evaluate a script and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Write a PNG screenshot
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Serializable snapshot of cookies for the page's context
    async fn storage_state(&self) -> Result<Value>;

    /// Restore a snapshot taken with [`PageDriver::storage_state`]
    async fn restore_storage_state(&self, state: &Value) -> Result<()>;

    /// Close the page
    async fn close(&self) -> Result<()>;
}

/// A browser reached through the automation driver
#[async_trait]
pub trait RemoteBrowser: Send + Sync {
    /// Browsing contexts that currently hold pages
    async fn contexts(&self) -> Result<Vec<ContextId>>;

    /// Pages of one context
    async fn pages(&self, context: &ContextId) -> Result<Vec<Arc<dyn PageDriver>>>;

    /// Open a blank page, in `context` if given
    async fn new_page(&self, context: Option<&ContextId>) -> Result<Arc<dyn PageDriver>>;

    /// Create an isolated context
    async fn create_context(&self) -> Result<ContextId>;

    /// Drop the connection and leave the browser process running
    async fn disconnect(&self) -> Result<()>;

    /// Close the browser process
    async fn shutdown(&self) -> Result<()>;
}

/// Produces [`RemoteBrowser`] connections
#[async_trait]
pub trait BrowserConnector: Send + Sync {
    /// Attach to a debug endpoint
    async fn attach(&self, endpoint: &str) -> Result<Arc<dyn RemoteBrowser>>;

    /// Start a debug-enabled browser process that [`attach`](Self::attach)
    /// can reach afterwards
    async fn launch_debug_browser(&self) -> Result<()>;

    /// Launch a browser owned by the automation driver
    async fn launch_automated(&self) -> Result<Arc<dyn RemoteBrowser>>;
}
