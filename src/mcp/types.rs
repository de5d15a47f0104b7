//! MCP protocol types
//!
//! JSON-RPC 2.0 envelopes plus the MCP tool shapes the server speaks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol revision implemented by the server
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error codes
pub mod codes {
    /// Malformed JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Unknown method
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Bad method parameters
    pub const INVALID_PARAMS: i32 = -32602;
    /// Server-side failure
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Missing or wrong auth token
    pub const AUTH_FAILED: i32 = -32001;
}

/// JSON-RPC 2.0 request; a missing `id` makes it a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Parameters
    #[serde(default)]
    pub params: Option<Value>,
    /// Request id
    #[serde(default)]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    /// Build a request
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    /// Whether no response is expected
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Id of the request answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Success payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Unparseable input
    pub fn parse_error() -> Self {
        Self::error(None, codes::PARSE_ERROR, "Parse error")
    }

    /// Unknown method
    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(id, codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    /// Bad params
    pub fn invalid_params(id: Option<Value>, msg: &str) -> Self {
        Self::error(id, codes::INVALID_PARAMS, format!("Invalid params: {msg}"))
    }

    /// Server failure
    pub fn internal_error(id: Option<Value>, msg: &str) -> Self {
        Self::error(id, codes::INTERNAL_ERROR, format!("Internal error: {msg}"))
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code, see [`codes`]
    pub code: i32,
    /// Message
    pub message: String,
    /// Extra detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Capabilities announced in `initialize`; only tools are offered
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpCapabilities {
    /// Tools capability
    #[serde(default)]
    pub tools: ToolsCapability,
}

/// Tools capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {
    /// The tool list never changes at runtime
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
}

/// Server name and version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerInfo {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
}

impl Default for McpServerInfo {
    fn default() -> Self {
        Self {
            name: "chatgpt-automation".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Entry of `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDefinition {
    /// Tool name
    pub name: String,
    /// What the tool does
    pub description: String,
    /// JSON schema of the arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Params of `tools/call`
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Tool name
    pub name: String,
    /// Tool arguments
    #[serde(default)]
    pub arguments: Value,
}

/// Result of `tools/call`
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    /// Set when the tool failed
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// Content items
    pub content: Vec<ToolContent>,
}

impl ToolCallResult {
    /// Text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: vec![ToolContent::text(text)],
        }
    }

    /// Pretty-printed JSON result
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::text(text),
            Err(e) => Self::error(format!("Failed to serialize result: {e}")),
        }
    }

    /// Failed tool call
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: vec![ToolContent::text(message)],
        }
    }

    /// Several content items
    pub fn multi(content: Vec<ToolContent>) -> Self {
        Self {
            is_error: false,
            content,
        }
    }
}

/// Content item of a tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text
    Text {
        /// The text
        text: String,
    },
    /// Base64 image
    Image {
        /// Base64 data
        data: String,
        /// MIME type
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ToolContent {
    /// Text item
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Image item
    pub fn image(data: String, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data,
            mime_type: mime_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_has_no_id() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"initialized"}"#).unwrap();
        assert!(req.is_notification());
        assert!(!JsonRpcRequest::new(1, "ping", None).is_notification());
    }

    #[test]
    fn test_error_response_shape() {
        let resp = JsonRpcResponse::method_not_found(Some(json!(7)), "nope");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["error"]["code"], codes::METHOD_NOT_FOUND);
        assert_eq!(value["id"], 7);
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_tool_result_serialization() {
        let ok = serde_json::to_value(ToolCallResult::text("done")).unwrap();
        assert!(ok.get("isError").is_none());
        assert_eq!(ok["content"][0], json!({ "type": "text", "text": "done" }));

        let err = serde_json::to_value(ToolCallResult::error("boom")).unwrap();
        assert_eq!(err["isError"], true);

        let img = serde_json::to_value(ToolContent::image("AAAA".into(), "image/png")).unwrap();
        assert_eq!(img, json!({ "type": "image", "data": "AAAA", "mimeType": "image/png" }));
    }

    #[test]
    fn test_json_result_is_pretty() {
        let result = ToolCallResult::json(&json!({ "ready": true }));
        match &result.content[0] {
            ToolContent::Text { text } => assert_eq!(text, "{\n  \"ready\": true\n}"),
            ToolContent::Image { .. } => panic!("expected text content"),
        }
    }
}
