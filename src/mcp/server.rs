//! MCP stdio server
//!
//! Reads one JSON-RPC message per line from stdin and writes responses to
//! stdout. Logs go to stderr so they never interleave with the protocol.
//!
//! # Security
//!
//! When `CHATGPT_MCP_TOKEN` is set, every request must carry the same value
//! in `params.auth_token`. Without it the server accepts all requests.

use crate::chatgpt::ChatGptController;
use crate::error::{Error, McpError, Result};
use crate::mcp::tools::ToolRegistry;
use crate::mcp::types::{
    codes, JsonRpcRequest, JsonRpcResponse, McpCapabilities, McpServerInfo, ToolCallParams,
    PROTOCOL_VERSION,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, instrument, warn};

/// Environment variable holding the optional auth token
pub const MCP_TOKEN_ENV_VAR: &str = "CHATGPT_MCP_TOKEN";

/// MCP server state
pub struct McpServer {
    tools: ToolRegistry,
    info: McpServerInfo,
    initialized: RwLock<bool>,
    auth_token: Option<String>,
}

impl McpServer {
    /// Create a server; the auth token is read from `CHATGPT_MCP_TOKEN`
    pub fn new(controller: Arc<ChatGptController>) -> Self {
        let token = std::env::var(MCP_TOKEN_ENV_VAR).unwrap_or_default();
        if token.is_empty() {
            warn!(
                "MCP server running without authentication. Set {} to enable.",
                MCP_TOKEN_ENV_VAR
            );
        } else {
            info!("MCP server authentication enabled via {}", MCP_TOKEN_ENV_VAR);
        }
        Self::with_auth_token(controller, token)
    }

    /// Create a server with an explicit token; empty disables authentication
    pub fn with_auth_token(controller: Arc<ChatGptController>, token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            tools: ToolRegistry::new(controller),
            info: McpServerInfo::default(),
            initialized: RwLock::new(false),
            auth_token: (!token.is_empty()).then_some(token),
        }
    }

    /// Whether requests must carry a token
    pub fn is_auth_enabled(&self) -> bool {
        self.auth_token.is_some()
    }

    /// Whether `initialize` has been received
    pub fn is_initialized(&self) -> bool {
        *self.initialized.read()
    }

    /// Server name and version
    pub fn info(&self) -> &McpServerInfo {
        &self.info
    }

    fn validate_auth(&self, request: &JsonRpcRequest) -> std::result::Result<(), JsonRpcResponse> {
        let Some(expected) = &self.auth_token else {
            return Ok(());
        };

        let provided = request
            .params
            .as_ref()
            .and_then(|p| p.get("auth_token"))
            .and_then(Value::as_str);

        match provided {
            Some(token) if constant_time_eq(token, expected) => Ok(()),
            Some(_) => {
                warn!(method = %request.method, "Authentication failed: invalid token");
                Err(JsonRpcResponse::error(
                    request.id.clone(),
                    codes::AUTH_FAILED,
                    "Authentication failed: invalid token",
                ))
            }
            None => {
                warn!(method = %request.method, "Authentication failed: missing auth_token");
                Err(JsonRpcResponse::error(
                    request.id.clone(),
                    codes::AUTH_FAILED,
                    "Authentication required: missing auth_token in params",
                ))
            }
        }
    }

    /// Serve stdin/stdout until stdin closes
    pub async fn run(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve newline-delimited JSON-RPC over any reader/writer pair
    #[instrument(skip_all)]
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Starting MCP server: {} v{}", self.info.name, self.info.version);

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            debug!("Received: {}", line);

            let Some(response) = self.handle_line(&line).await else {
                continue;
            };
            let json = serde_json::to_string(&response).unwrap_or_else(|e| {
                error!("Failed to serialize response: {}", e);
                r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal error"}}"#
                    .to_string()
            });
            debug!("Sending: {}", json);
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        info!("Input closed, MCP server shutting down");
        self.release_browser().await;
        Ok(())
    }

    /// Handle one line of input
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                Some(JsonRpcResponse::parse_error())
            }
        }
    }

    /// Handle a parsed request; `None` for notifications
    #[instrument(skip(self, request), fields(method = %request.method))]
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if let Err(denied) = self.validate_auth(&request) {
            return Some(denied);
        }

        let id = request.id.clone();
        let notification = request.is_notification();
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params.as_ref()),
            "initialized" | "notifications/initialized" => return None,
            "shutdown" => self.handle_shutdown().await,
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tools.definitions() })),
            "tools/call" => self.handle_tools_call(request.params).await,
            method => {
                warn!("Unknown method: {}", method);
                return Some(JsonRpcResponse::method_not_found(id, method));
            }
        };

        if notification {
            return None;
        }
        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(Error::Mcp(McpError::InvalidParams(msg))) => {
                JsonRpcResponse::invalid_params(id, &msg)
            }
            Err(e) => JsonRpcResponse::internal_error(id, &e.to_string()),
        })
    }

    fn handle_initialize(&self, params: Option<&Value>) -> Result<Value> {
        if let Some(version) = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
        {
            debug!("Client protocol version: {}", version);
        }
        *self.initialized.write() = true;
        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": McpCapabilities::default(),
            "serverInfo": self.info,
        }))
    }

    async fn handle_shutdown(&self) -> Result<Value> {
        info!("Handling shutdown");
        *self.initialized.write() = false;
        self.release_browser().await;
        Ok(Value::Null)
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value> {
        let params = params.ok_or_else(|| McpError::InvalidParams("missing params".into()))?;
        let call: ToolCallParams = serde_json::from_value(params)
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        let result = self.tools.execute(&call.name, call.arguments).await;
        Ok(serde_json::to_value(result)?)
    }

    async fn release_browser(&self) {
        if let Err(e) = self.tools.controller().close().await {
            error!("Error during browser cleanup: {}", e);
        }
    }
}

/// Compare without an early exit on the first differing byte
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret123", "secret123"));
        assert!(constant_time_eq("", ""));
        assert!(!constant_time_eq("secret123", "secret124"));
        assert!(!constant_time_eq("secret123", "Secret123"));
        assert!(!constant_time_eq("short", "shorter"));
        assert!(!constant_time_eq("abc", ""));
        assert!(!constant_time_eq("a\0", "a"));
    }
}
