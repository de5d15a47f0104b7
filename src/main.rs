//! ChatGPT Automation MCP Server
//!
//! Serves the ChatGPT tools over MCP on stdio.

use anyhow::Context;
use chatgpt_automation::browser::CdpConnector;
use chatgpt_automation::{AutomationConfig, ChatGptController, McpServer};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// ChatGPT Automation MCP Server
#[derive(Parser, Debug)]
#[command(name = "chatgpt-mcp")]
#[command(version)]
#[command(about = "MCP server that drives the ChatGPT web app through Chrome")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,

    /// Chrome remote debugging endpoint
    #[arg(long)]
    cdp_url: Option<String>,

    /// Do not attach over CDP; requires --allow-automated-launch
    #[arg(long)]
    no_cdp: bool,

    /// Permit a driver-owned browser when CDP is off (testing only)
    #[arg(long)]
    allow_automated_launch: bool,

    /// Path to Chrome/Chromium executable
    #[arg(long)]
    chrome_path: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut AutomationConfig) {
        if self.headless {
            config.headless = true;
        }
        if let Some(url) = &self.cdp_url {
            config.cdp_url = url.clone();
        }
        if self.no_cdp {
            config.use_cdp = false;
        }
        if self.allow_automated_launch {
            config.allow_automated_launch = true;
        }
        if let Some(path) = &self.chrome_path {
            config.chrome_path = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries JSON-RPC
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut config = AutomationConfig::from_env().context("invalid configuration")?;
    args.apply(&mut config);
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }
    config
        .ensure_directories()
        .context("failed to create data directories")?;

    tracing::info!(
        "ChatGPT Automation MCP Server v{} (cdp: {}, endpoint: {})",
        chatgpt_automation::VERSION,
        config.use_cdp,
        config.cdp_url
    );

    let connector = Arc::new(CdpConnector::new(config.clone()));
    let controller = Arc::new(ChatGptController::new(connector, config));
    let server = McpServer::new(controller.clone());

    tokio::select! {
        result = server.run() => result.context("MCP server failed")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Server interrupted");
            if let Err(e) = controller.close().await {
                tracing::error!("Error during cleanup: {}", e);
            }
        }
    }

    Ok(())
}
