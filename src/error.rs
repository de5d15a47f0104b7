//! Error types for ChatGPT automation
//!
//! Every failure in the crate is an [`Error`]. The recovery engine reads
//! these through [`crate::recovery::classify`], so display strings matter:
//! sub-error messages are forwarded transparently and carry no extra prefix
//! that could shift a message into a different error kind.

use crate::recovery::ErrorKind;
use thiserror::Error;

/// The main error type for ChatGPT automation operations
#[derive(Error, Debug)]
pub enum Error {
    /// Browser-related errors
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// Navigation errors
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    /// Connection bootstrap failures (fatal, never retried)
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// MCP protocol errors
    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ChromiumOxide errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// An error whose kind was decided where it was raised
    #[error("{message}")]
    Classified {
        /// Kind assigned at construction
        kind: ErrorKind,
        /// Human readable message
        message: String,
    },

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Browser lifecycle and page interaction errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Failed to launch browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// No page is attached yet
    #[error("Browser page is not open")]
    NotLaunched,

    /// CDP connection dropped underneath us
    #[error("Browser disconnected")]
    Disconnected,

    /// Failed to create new page/tab
    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    /// Browser already closed
    #[error("Browser already closed")]
    AlreadyClosed,

    /// Timeout waiting on a page condition
    #[error("Waiting for {what} timed out after {ms}ms")]
    Timeout {
        /// What was being waited for
        what: String,
        /// Timeout budget in milliseconds
        ms: u64,
    },

    /// No element matched the selector
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// JavaScript evaluation failed
    #[error("Script evaluation failed: {0}")]
    Script(String),

    /// Any other page action failure
    #[error("Page action failed: {0}")]
    ActionFailed(String),
}

/// Navigation errors
#[derive(Error, Debug)]
pub enum NavigationError {
    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Navigation timeout
    #[error("Navigation to {url} timed out after {ms}ms")]
    Timeout {
        /// Target URL
        url: String,
        /// Timeout budget in milliseconds
        ms: u64,
    },

    /// Page load failed
    #[error("Page load failed: {0}")]
    LoadFailed(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Failures of the connection bootstrap. All of them are terminal.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Remote debugging is disabled and the automated launch was not opted into
    #[error(
        "Remote debugging attach is disabled; set USE_CDP=true or opt into ALLOW_AUTOMATED_LAUNCH for non-production testing"
    )]
    CdpRequired,

    /// Attached endpoint exposes no browsing context
    #[error("Debug endpoint {endpoint} exposes no browsing contexts")]
    NoBrowserContexts {
        /// Endpoint that was attached
        endpoint: String,
    },

    /// Attach failed even after launching a fresh debug-enabled process
    #[error("Could not attach to {endpoint} after fresh launch: {reason}")]
    AttachFailed {
        /// Endpoint that was attached
        endpoint: String,
        /// Last attach error
        reason: String,
    },

    /// Spawning the debug-enabled process failed
    #[error("Could not start debug-enabled Chrome: {0}")]
    LaunchFailed(String),

    /// No Chrome executable was found
    #[error("Chrome executable not found; set CHROME_PATH")]
    ChromeNotFound,
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Tool not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Parse error
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment variable held a value of the wrong shape
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Result type alias for ChatGPT automation operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }

    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create an error whose kind is fixed at construction
    pub fn classified<S: Into<String>>(kind: ErrorKind, msg: S) -> Self {
        Error::Classified {
            kind,
            message: msg.into(),
        }
    }

    /// Whether this is a timeout-typed failure, regardless of its message
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Browser(BrowserError::Timeout { .. })
                | Error::Navigation(NavigationError::Timeout { .. })
        )
    }

    /// Whether this is a fatal bootstrap failure
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Bootstrap(_))
    }
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_is_transparent() {
        let err = Error::Browser(BrowserError::LaunchFailed("no chrome".to_string()));
        assert_eq!(err.to_string(), "Failed to launch browser: no chrome");
    }

    #[test]
    fn test_timeout_variants_are_typed() {
        let err: Error = BrowserError::Timeout {
            what: "#prompt-textarea".to_string(),
            ms: 5000,
        }
        .into();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out after 5000ms"));

        let err: Error = NavigationError::Timeout {
            url: "https://chatgpt.com".to_string(),
            ms: 60000,
        }
        .into();
        assert!(err.is_timeout());

        assert!(!Error::generic("timeout in text only").is_timeout());
    }

    #[test]
    fn test_bootstrap_errors_are_fatal() {
        let err: Error = BootstrapError::CdpRequired.into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("ALLOW_AUTOMATED_LAUNCH"));
        assert!(!Error::generic("x").is_fatal());
    }

    #[test]
    fn test_classified_error_display() {
        let err = Error::classified(ErrorKind::RateLimit, "slow down");
        assert_eq!(err.to_string(), "slow down");
    }

    #[test]
    fn test_config_error() {
        let err = ConfigError::InvalidValue {
            key: "BROWSER_TIMEOUT".to_string(),
            value: "soon".to_string(),
            reason: "expected an integer".to_string(),
        };
        assert!(err.to_string().contains("BROWSER_TIMEOUT"));
        assert!(err.to_string().contains("\"soon\""));
    }

    #[test]
    fn test_mcp_error() {
        let err = McpError::ToolNotFound("unknown_tool".to_string());
        assert_eq!(err.to_string(), "Tool not found: unknown_tool");
    }
}
