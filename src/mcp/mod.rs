//! Model Context Protocol (MCP) server module
//!
//! Exposes the ChatGPT controller as MCP tools over JSON-RPC on stdio.

mod server;
mod tools;
/// MCP protocol types
pub mod types;

pub use server::{McpServer, MCP_TOKEN_ENV_VAR};
pub use tools::{McpTool, ToolRegistry, AVAILABLE_TOOLS};
pub use types::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpCapabilities, McpServerInfo,
    McpToolDefinition, ToolCallParams, ToolCallResult, ToolContent,
};
