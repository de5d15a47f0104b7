//! MCP tool definitions and registry
//!
//! Each tool maps onto one [`ChatGptController`] operation. Hard failures
//! come back as `isError` results; the server itself never fails a call.

use crate::chatgpt::{
    BatchOperation, ChatGptController, ConversationRef, ExportFormat, DEFAULT_RESPONSE_WAIT,
};
use crate::error::{McpError, Result};
use crate::mcp::types::{McpToolDefinition, ToolCallResult, ToolContent};
use base64::Engine;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

/// Budget for the implicit wait in `chatgpt_get_last_response`
const LAST_RESPONSE_WAIT: Duration = Duration::from_secs(10);

/// A registered MCP tool
pub trait McpTool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;
    /// Tool description
    fn description(&self) -> &str;
    /// Input schema as JSON
    fn input_schema(&self) -> Value;
    /// Get tool definition
    fn definition(&self) -> McpToolDefinition {
        McpToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A tool described by static data
#[derive(Clone, Copy)]
struct ChatGptTool {
    name: &'static str,
    description: &'static str,
    schema: fn() -> Value,
}

impl McpTool for ChatGptTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn input_schema(&self) -> Value {
        (self.schema)()
    }
}

fn no_args() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn message_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "message": { "type": "string", "description": "Message to send" }
        },
        "required": ["message"]
    })
}

fn timeout_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "timeout": { "type": "integer", "description": "Seconds to wait", "minimum": 1 }
        }
    })
}

fn send_and_get_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "message": { "type": "string", "description": "Message to send" },
            "timeout": {
                "type": "integer",
                "description": "Seconds to wait; defaults to the budget for the current model",
                "minimum": 1
            },
            "mode": {
                "type": "string",
                "enum": ["deep_research", "agent_mode"],
                "description": "Limited mode this message counts against"
            }
        },
        "required": ["message"]
    })
}

fn model_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "model": { "type": "string", "description": "Model name as shown in the picker, e.g. 'o3'" }
        },
        "required": ["model"]
    })
}

fn toggle_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "enable": { "type": "boolean", "description": "Turn web search on or off" }
        },
        "required": ["enable"]
    })
}

fn browsing_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "enable": { "type": "boolean", "description": "Turn web browsing on or off" }
        },
        "required": ["enable"]
    })
}

fn upload_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "file_path": { "type": "string", "description": "Path of the file to attach" }
        },
        "required": ["file_path"]
    })
}

fn conversation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "conversation_id": {
                "type": ["string", "integer"],
                "description": "Conversation id, or its index in chatgpt_list_conversations"
            }
        },
        "required": ["conversation_id"]
    })
}

fn edit_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "message_index": {
                "type": "integer",
                "description": "0-based index among your own messages",
                "minimum": 0
            },
            "new_content": { "type": "string", "description": "Replacement text" }
        },
        "required": ["message_index", "new_content"]
    })
}

fn export_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "format": { "type": "string", "enum": ["markdown", "json"], "default": "markdown" }
        }
    })
}

fn save_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "filename": { "type": "string", "description": "File name without extension" },
            "format": { "type": "string", "enum": ["markdown", "json"], "default": "markdown" }
        }
    })
}

fn screenshot_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "description": "File name prefix", "default": "chatgpt" }
        }
    })
}

fn batch_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "operations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "operation": { "type": "string", "enum": crate::chatgpt::BATCH_OPERATIONS },
                        "args": { "type": "object" },
                        "continue_on_error": { "type": "boolean", "default": false }
                    },
                    "required": ["operation"]
                }
            }
        },
        "required": ["operations"]
    })
}

const TOOLS: &[ChatGptTool] = &[
    ChatGptTool {
        name: "chatgpt_launch",
        description: "Attach to the ChatGPT browser session, launching a debug browser if needed",
        schema: no_args,
    },
    ChatGptTool {
        name: "chatgpt_new_chat",
        description: "Start a new ChatGPT conversation",
        schema: no_args,
    },
    ChatGptTool {
        name: "chatgpt_send_message",
        description: "Send a message to ChatGPT without waiting for the answer",
        schema: message_schema,
    },
    ChatGptTool {
        name: "chatgpt_wait_response",
        description: "Wait for the response being generated to complete",
        schema: timeout_schema,
    },
    ChatGptTool {
        name: "chatgpt_send_and_get_response",
        description: "Send a message and return ChatGPT's complete response",
        schema: send_and_get_schema,
    },
    ChatGptTool {
        name: "chatgpt_get_last_response",
        description: "Get the latest response, waiting briefly if it is still generating",
        schema: timeout_schema,
    },
    ChatGptTool {
        name: "chatgpt_get_conversation",
        description: "Get every message of the current conversation as JSON",
        schema: no_args,
    },
    ChatGptTool {
        name: "chatgpt_get_model",
        description: "Get the model currently selected in the UI",
        schema: no_args,
    },
    ChatGptTool {
        name: "chatgpt_select_model",
        description: "Switch to a different model",
        schema: model_schema,
    },
    ChatGptTool {
        name: "chatgpt_status",
        description: "Report readiness, connection state and current model",
        schema: no_args,
    },
    ChatGptTool {
        name: "chatgpt_toggle_search",
        description: "Turn web search on or off",
        schema: toggle_schema,
    },
    ChatGptTool {
        name: "chatgpt_toggle_browsing",
        description: "Turn web browsing on or off",
        schema: browsing_schema,
    },
    ChatGptTool {
        name: "chatgpt_regenerate",
        description: "Regenerate the last response",
        schema: no_args,
    },
    ChatGptTool {
        name: "chatgpt_upload_file",
        description: "Attach a local file to the current conversation",
        schema: upload_schema,
    },
    ChatGptTool {
        name: "chatgpt_list_conversations",
        description: "List the conversations in the history sidebar",
        schema: no_args,
    },
    ChatGptTool {
        name: "chatgpt_switch_conversation",
        description: "Open another conversation by id or index",
        schema: conversation_schema,
    },
    ChatGptTool {
        name: "chatgpt_delete_conversation",
        description: "Delete a conversation by id or index",
        schema: conversation_schema,
    },
    ChatGptTool {
        name: "chatgpt_edit_message",
        description: "Edit one of your earlier messages and resubmit it",
        schema: edit_schema,
    },
    ChatGptTool {
        name: "chatgpt_export_conversation",
        description: "Export the current conversation as markdown or JSON",
        schema: export_schema,
    },
    ChatGptTool {
        name: "chatgpt_save_conversation",
        description: "Save the current conversation to the export directory",
        schema: save_schema,
    },
    ChatGptTool {
        name: "chatgpt_screenshot",
        description: "Take a full-page screenshot of the ChatGPT tab",
        schema: screenshot_schema,
    },
    ChatGptTool {
        name: "chatgpt_batch_operations",
        description: "Run several operations in order, optionally continuing past failures",
        schema: batch_schema,
    },
    ChatGptTool {
        name: "chatgpt_quota_status",
        description: "Monthly usage of limited modes",
        schema: no_args,
    },
];

/// Names of every built-in tool
pub const AVAILABLE_TOOLS: &[&str] = &[
    "chatgpt_launch",
    "chatgpt_new_chat",
    "chatgpt_send_message",
    "chatgpt_wait_response",
    "chatgpt_send_and_get_response",
    "chatgpt_get_last_response",
    "chatgpt_get_conversation",
    "chatgpt_get_model",
    "chatgpt_select_model",
    "chatgpt_status",
    "chatgpt_toggle_search",
    "chatgpt_toggle_browsing",
    "chatgpt_regenerate",
    "chatgpt_upload_file",
    "chatgpt_list_conversations",
    "chatgpt_switch_conversation",
    "chatgpt_delete_conversation",
    "chatgpt_edit_message",
    "chatgpt_export_conversation",
    "chatgpt_save_conversation",
    "chatgpt_screenshot",
    "chatgpt_batch_operations",
    "chatgpt_quota_status",
];

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    str_arg(args, key)
        .ok_or_else(|| McpError::InvalidParams(format!("missing required parameter: {key}")).into())
}

fn secs_arg(args: &Value, key: &str) -> Option<Duration> {
    args.get(key).and_then(Value::as_u64).map(Duration::from_secs)
}

fn required_bool(args: &Value, key: &str) -> Result<bool> {
    args.get(key)
        .and_then(Value::as_bool)
        .ok_or_else(|| McpError::InvalidParams(format!("missing required parameter: {key}")).into())
}

fn conversation_arg(args: &Value) -> Result<ConversationRef> {
    match args.get("conversation_id") {
        Some(value) => ConversationRef::from_value(value),
        None => Err(McpError::InvalidParams(
            "missing required parameter: conversation_id".into(),
        )
        .into()),
    }
}

fn format_arg(args: &Value) -> Result<ExportFormat> {
    match str_arg(args, "format") {
        Some(format) => Ok(format.parse::<ExportFormat>()?),
        None => Ok(ExportFormat::default()),
    }
}

/// Tool registry holding all available tools
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn McpTool>>,
    controller: Arc<ChatGptController>,
}

impl ToolRegistry {
    /// Create a registry with every built-in tool
    pub fn new(controller: Arc<ChatGptController>) -> Self {
        let mut registry = Self {
            tools: BTreeMap::new(),
            controller,
        };
        for tool in TOOLS {
            registry.register(Box::new(*tool));
        }
        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Box<dyn McpTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Controller the tools act on
    pub fn controller(&self) -> &Arc<ChatGptController> {
        &self.controller
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All tool definitions, sorted by name
    pub fn definitions(&self) -> Vec<McpToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute a tool by name
    #[instrument(skip(self, args))]
    pub async fn execute(&self, name: &str, args: Value) -> ToolCallResult {
        info!("Executing tool: {}", name);

        if !self.tools.contains_key(name) {
            return ToolCallResult::error(format!("Tool not found: {name}"));
        }

        match self.dispatch(name, &args).await {
            Ok(result) => result,
            Err(e) => {
                error!("Tool {} failed: {}", name, e);
                ToolCallResult::error(format!("Tool execution failed: {e}"))
            }
        }
    }

    async fn dispatch(&self, name: &str, args: &Value) -> Result<ToolCallResult> {
        let ctrl = self.controller.as_ref();
        let result = match name {
            "chatgpt_launch" => {
                ctrl.launch().await?;
                ToolCallResult::json(&json!({
                    "launched": true,
                    "connection": ctrl.session().connection_state(),
                }))
            }
            "chatgpt_new_chat" => ToolCallResult::text(ctrl.new_chat().await?),
            "chatgpt_send_message" => {
                ToolCallResult::text(ctrl.send_message(required_str(args, "message")?).await?)
            }
            "chatgpt_wait_response" => {
                let timeout = secs_arg(args, "timeout").unwrap_or(DEFAULT_RESPONSE_WAIT);
                if ctrl.wait_for_response(timeout).await? {
                    ToolCallResult::text("response complete")
                } else {
                    ToolCallResult::text("timeout waiting for response")
                }
            }
            "chatgpt_send_and_get_response" => {
                let response = ctrl
                    .send_and_get_response(
                        required_str(args, "message")?,
                        secs_arg(args, "timeout"),
                        str_arg(args, "mode"),
                    )
                    .await?;
                ToolCallResult::text(response.unwrap_or_else(|| "No response received".into()))
            }
            "chatgpt_get_last_response" => {
                let timeout = secs_arg(args, "timeout").unwrap_or(LAST_RESPONSE_WAIT);
                ctrl.wait_for_response(timeout).await?;
                let response = ctrl.get_last_response().await?;
                ToolCallResult::text(response.unwrap_or_else(|| "No response found".into()))
            }
            "chatgpt_get_conversation" => ToolCallResult::json(&ctrl.get_conversation().await?),
            "chatgpt_get_model" => {
                let model = ctrl.get_current_model().await?;
                ToolCallResult::text(format!(
                    "Current model: {}",
                    model.as_deref().unwrap_or("Unknown")
                ))
            }
            "chatgpt_select_model" => {
                let model = required_str(args, "model")?;
                let status = if ctrl.select_model(model).await? {
                    "selected successfully"
                } else {
                    "selection failed"
                };
                ToolCallResult::text(format!("Model {model}: {status}"))
            }
            "chatgpt_status" => ToolCallResult::json(&ctrl.status().await),
            "chatgpt_toggle_search" => {
                let enable = required_bool(args, "enable")?;
                if ctrl.toggle_search_mode(enable).await? {
                    ToolCallResult::text(format!(
                        "Search mode {}",
                        if enable { "enabled" } else { "disabled" }
                    ))
                } else {
                    ToolCallResult::text("Search toggle not found")
                }
            }
            "chatgpt_regenerate" => {
                if ctrl.regenerate_response().await? {
                    ToolCallResult::text("Response regeneration started")
                } else {
                    ToolCallResult::text("Regenerate control not found")
                }
            }
            "chatgpt_toggle_browsing" => {
                let enable = required_bool(args, "enable")?;
                if ctrl.toggle_browsing_mode(enable).await? {
                    ToolCallResult::text(format!(
                        "Web browsing {}",
                        if enable { "enabled" } else { "disabled" }
                    ))
                } else {
                    ToolCallResult::text("Browsing toggle not found")
                }
            }
            "chatgpt_upload_file" => {
                let path = Path::new(required_str(args, "file_path")?);
                if ctrl.upload_file(path).await? {
                    ToolCallResult::text(format!("File uploaded: {}", path.display()))
                } else {
                    ToolCallResult::error(format!("Could not upload {}", path.display()))
                }
            }
            "chatgpt_list_conversations" => {
                ToolCallResult::json(&ctrl.list_conversations().await?)
            }
            "chatgpt_switch_conversation" => {
                let target = conversation_arg(args)?;
                if ctrl.switch_conversation(&target).await? {
                    ToolCallResult::text(format!("Switched to conversation {target}"))
                } else {
                    ToolCallResult::error(format!("Could not switch to conversation {target}"))
                }
            }
            "chatgpt_delete_conversation" => {
                let target = conversation_arg(args)?;
                if ctrl.delete_conversation(&target).await? {
                    ToolCallResult::text(format!("Deleted conversation {target}"))
                } else {
                    ToolCallResult::error(format!("Could not delete conversation {target}"))
                }
            }
            "chatgpt_edit_message" => {
                let index = args
                    .get("message_index")
                    .and_then(Value::as_u64)
                    .and_then(|i| usize::try_from(i).ok())
                    .ok_or_else(|| {
                        McpError::InvalidParams("missing required parameter: message_index".into())
                    })?;
                let content = required_str(args, "new_content")?;
                if ctrl.edit_message(index, content).await? {
                    ToolCallResult::text(format!("Edited message {index}"))
                } else {
                    ToolCallResult::error(format!("Could not edit message {index}"))
                }
            }
            "chatgpt_export_conversation" => {
                let exported = ctrl.export_conversation(format_arg(args)?).await?;
                ToolCallResult::text(exported.unwrap_or_else(|| "No conversation to export".into()))
            }
            "chatgpt_save_conversation" => {
                let saved = ctrl
                    .save_conversation(str_arg(args, "filename"), format_arg(args)?)
                    .await?;
                match saved {
                    Some(path) => {
                        ToolCallResult::text(format!("Conversation saved to: {}", path.display()))
                    }
                    None => ToolCallResult::text("No conversation to save"),
                }
            }
            "chatgpt_screenshot" => {
                let name = str_arg(args, "name").unwrap_or("chatgpt");
                let path = ctrl.take_screenshot(name).await?;
                let bytes = tokio::fs::read(&path).await?;
                ToolCallResult::multi(vec![
                    ToolContent::text(format!("Screenshot saved to: {}", path.display())),
                    ToolContent::image(
                        base64::engine::general_purpose::STANDARD.encode(bytes),
                        "image/png",
                    ),
                ])
            }
            "chatgpt_batch_operations" => {
                let operations: Vec<BatchOperation> = serde_json::from_value(
                    args.get("operations").cloned().unwrap_or(Value::Null),
                )
                .map_err(|e| McpError::InvalidParams(format!("operations: {e}")))?;
                ToolCallResult::json(&ctrl.execute_batch(&operations).await?)
            }
            "chatgpt_quota_status" => ToolCallResult::json(&ctrl.quota_summary()),
            other => return Err(McpError::ToolNotFound(other.to_string()).into()),
        };
        Ok(result)
    }
}
