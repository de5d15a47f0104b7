//! Browser automation module
//!
//! This module gets a page on the ChatGPT web app and keeps it there:
//! the driver seam, its chromiumoxide backend, the debug-browser launcher,
//! the connection bootstrap and the session that owns the result.

pub mod bootstrap;
pub mod cdp;
pub mod driver;
pub mod launcher;
pub mod session;

pub use bootstrap::{
    is_app_url, Attachment, BootstrapSettings, ConnectionBootstrap, ConnectionState, APP_URL,
};
pub use cdp::{CdpBrowser, CdpConnector, CdpPage};
pub use driver::{BrowserConnector, ContextId, ElementState, PageDriver, RemoteBrowser, WaitUntil};
pub use launcher::ChromeLauncher;
pub use session::BrowserSession;
