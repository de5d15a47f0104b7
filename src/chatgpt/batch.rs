//! Batch operations
//!
//! Runs a list of named controller operations in order. A failing
//! operation stops the batch unless it set `continue_on_error`.

use super::controller::{ChatGptController, DEFAULT_RESPONSE_WAIT};
use super::conversations::ConversationRef;
use super::export::ExportFormat;
use crate::error::{McpError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Operation names a batch accepts
pub const BATCH_OPERATIONS: &[&str] = &[
    "new_chat",
    "send_message",
    "send_and_get_response",
    "wait_for_response",
    "get_last_response",
    "get_conversation",
    "get_current_model",
    "select_model",
    "toggle_search_mode",
    "toggle_browsing_mode",
    "regenerate_response",
    "upload_file",
    "list_conversations",
    "switch_conversation",
    "delete_conversation",
    "edit_message",
    "export_conversation",
    "save_conversation",
    "take_screenshot",
];

/// One entry of a batch
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BatchOperation {
    /// Operation name, one of [`BATCH_OPERATIONS`]
    pub operation: String,
    /// Operation arguments
    #[serde(default)]
    pub args: Value,
    /// Keep going when this operation fails
    #[serde(default)]
    pub continue_on_error: bool,
}

impl BatchOperation {
    /// Operation without arguments
    pub fn new<S: Into<String>>(operation: S) -> Self {
        Self {
            operation: operation.into(),
            args: Value::Null,
            continue_on_error: false,
        }
    }

    /// Set the arguments
    pub fn args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Keep going when this operation fails
    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }

    fn required_str(&self, key: &str) -> Result<&str> {
        self.str_arg(key).ok_or_else(|| {
            McpError::InvalidParams(format!("{} requires '{}'", self.operation, key)).into()
        })
    }

    fn secs_arg(&self, key: &str) -> Option<Duration> {
        self.args.get(key).and_then(Value::as_u64).map(Duration::from_secs)
    }

    fn index_arg(&self, key: &str) -> Result<usize> {
        self.args
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| {
                McpError::InvalidParams(format!(
                    "{} requires a non-negative '{}'",
                    self.operation, key
                ))
                .into()
            })
    }

    fn conversation_arg(&self) -> Result<ConversationRef> {
        match self.args.get("conversation_id") {
            Some(value) => ConversationRef::from_value(value),
            None => Err(McpError::InvalidParams(format!(
                "{} requires 'conversation_id'",
                self.operation
            ))
            .into()),
        }
    }

    fn format_arg(&self) -> Result<ExportFormat> {
        self.str_arg("format")
            .map(str::parse::<ExportFormat>)
            .transpose()
            .map(Option::unwrap_or_default)
            .map_err(Into::into)
    }
}

/// Outcome of one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationOutcome {
    /// Position in the batch
    pub index: usize,
    /// Operation name
    pub operation: String,
    /// Whether it succeeded
    pub success: bool,
    /// Returned value
    pub result: Value,
    /// Error message when it failed with an error
    pub error: Option<String>,
}

/// Outcome of a whole batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// No failure, or every failure was allowed to continue
    pub success: bool,
    /// Outcomes of the operations that ran
    pub operations: Vec<OperationOutcome>,
    /// Operations requested
    pub total_operations: usize,
    /// Operations that succeeded
    pub successful_operations: usize,
    /// Operations that failed
    pub failed_operations: usize,
}

impl ChatGptController {
    /// Run `operations` in order
    #[instrument(skip(self, operations), fields(count = operations.len()))]
    pub async fn execute_batch(&self, operations: &[BatchOperation]) -> Result<BatchReport> {
        self.launch().await?;

        let mut report = BatchReport {
            success: true,
            operations: Vec::with_capacity(operations.len()),
            total_operations: operations.len(),
            successful_operations: 0,
            failed_operations: 0,
        };

        for (index, op) in operations.iter().enumerate() {
            let (success, result, error) = match self.run_operation(op).await {
                Ok((result, success)) => (success, result, None),
                Err(e) => {
                    error!("Operation {} failed: {}", op.operation, e);
                    (false, Value::Null, Some(e.to_string()))
                }
            };

            if success {
                report.successful_operations += 1;
            } else {
                report.failed_operations += 1;
                if !op.continue_on_error {
                    report.success = false;
                }
            }
            report.operations.push(OperationOutcome {
                index,
                operation: op.operation.clone(),
                success,
                result,
                error,
            });

            if !success && !op.continue_on_error {
                warn!("Batch stopped at index {}", index);
                break;
            }
        }

        info!(
            "Batch operations completed: {}/{} successful",
            report.successful_operations, report.total_operations
        );
        Ok(report)
    }

    /// Run one operation; the flag says whether it counts as a success
    async fn run_operation(&self, op: &BatchOperation) -> Result<(Value, bool)> {
        let outcome = match op.operation.as_str() {
            "new_chat" => (json!(self.new_chat().await?), true),
            "send_message" => (json!(self.send_message(op.required_str("message")?).await?), true),
            "send_and_get_response" => {
                let response = self
                    .send_and_get_response(
                        op.required_str("message")?,
                        op.secs_arg("timeout"),
                        op.str_arg("mode"),
                    )
                    .await?;
                let ok = response.is_some();
                (json!(response), ok)
            }
            "wait_for_response" => {
                let timeout = op.secs_arg("timeout").unwrap_or(DEFAULT_RESPONSE_WAIT);
                let done = self.wait_for_response(timeout).await?;
                (json!(done), done)
            }
            "get_last_response" => {
                let response = self.get_last_response().await?;
                let ok = response.is_some();
                (json!(response), ok)
            }
            "get_conversation" => (json!(self.get_conversation().await?), true),
            "get_current_model" => {
                let model = self.get_current_model().await?;
                let ok = model.is_some();
                (json!(model), ok)
            }
            "select_model" => {
                let selected = self.select_model(op.required_str("model")?).await?;
                (json!(selected), selected)
            }
            "toggle_search_mode" => {
                let enable = op.args.get("enable").and_then(Value::as_bool).unwrap_or(true);
                let found = self.toggle_search_mode(enable).await?;
                (json!(found), found)
            }
            "toggle_browsing_mode" => {
                let enable = op.args.get("enable").and_then(Value::as_bool).unwrap_or(true);
                let found = self.toggle_browsing_mode(enable).await?;
                (json!(found), found)
            }
            "upload_file" => {
                let path = Path::new(op.required_str("file_path")?);
                let uploaded = self.upload_file(path).await?;
                (json!(uploaded), uploaded)
            }
            "list_conversations" => (json!(self.list_conversations().await?), true),
            "switch_conversation" => {
                let switched = self.switch_conversation(&op.conversation_arg()?).await?;
                (json!(switched), switched)
            }
            "delete_conversation" => {
                let deleted = self.delete_conversation(&op.conversation_arg()?).await?;
                (json!(deleted), deleted)
            }
            "edit_message" => {
                let edited = self
                    .edit_message(op.index_arg("message_index")?, op.required_str("new_content")?)
                    .await?;
                (json!(edited), edited)
            }
            "regenerate_response" => {
                let clicked = self.regenerate_response().await?;
                (json!(clicked), clicked)
            }
            "export_conversation" => {
                let exported = self.export_conversation(op.format_arg()?).await?;
                let ok = exported.is_some();
                (json!(exported), ok)
            }
            "save_conversation" => {
                let saved = self
                    .save_conversation(op.str_arg("filename"), op.format_arg()?)
                    .await?;
                let ok = saved.is_some();
                (json!(saved), ok)
            }
            "take_screenshot" => {
                let name = op.str_arg("name").unwrap_or("chatgpt");
                (json!(self.take_screenshot(name).await?), true)
            }
            other => {
                return Err(McpError::InvalidParams(format!("Unknown operation: {other}")).into())
            }
        };
        Ok(outcome)
    }
}
