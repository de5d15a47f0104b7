//! ChatGPT Automation MCP - drive the ChatGPT web app from AI agents
//!
//! This crate exposes ChatGPT conversations (send a message, wait for the
//! answer, switch models, export) as MCP tools. It attaches to a
//! debug-enabled Chrome over CDP and wraps every browser interaction in a
//! classified error recovery engine.
//!
//! # Architecture
//!
//! ```text
//! AI Agent ──▶ MCP Server ──▶ ChatGptController ──▶ BrowserSession (CDP)
//!                                   │                     │
//!                                   ▼                     ▼
//!                          ┌─────────────────┐   ┌──────────────────┐
//!                          │ RecoveryManager │   │ ConnectionBootstrap│
//!                          └────────┬────────┘   └──────────────────┘
//!                                   │
//!                                   ▼
//!                    classify ─▶ RecoveryAction ─▶ backoff ─▶ retry
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chatgpt_automation::browser::CdpConnector;
//! use chatgpt_automation::{AutomationConfig, ChatGptController};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AutomationConfig::from_env()?;
//!     let connector = Arc::new(CdpConnector::new(config.clone()));
//!     let controller = ChatGptController::new(connector, config);
//!
//!     controller.new_chat().await?;
//!     let answer = controller
//!         .send_and_get_response("What is the capital of France?", None, None)
//!         .await?;
//!     println!("{}", answer.unwrap_or_default());
//!
//!     controller.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod browser;
pub mod chatgpt;
pub mod config;
pub mod error;
pub mod mcp;
pub mod quota;
pub mod recovery;
pub mod session_store;
pub mod timing;

// Re-exports for convenience
pub use chatgpt::ChatGptController;
pub use config::AutomationConfig;
pub use error::{Error, Result};
pub use mcp::{McpServer, McpTool};
pub use recovery::{classify, ErrorKind, RecoveryManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
