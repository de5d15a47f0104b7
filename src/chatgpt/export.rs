//! Conversation export

use super::response::{Message, Role};
use crate::error::{McpError, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Output format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Readable markdown document
    #[default]
    Markdown,
    /// Pretty-printed JSON list of messages
    Json,
}

impl ExportFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = McpError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            other => Err(McpError::InvalidParams(format!(
                "Unsupported export format: {other}"
            ))),
        }
    }
}

/// Render a conversation.
///
/// `None` for an empty conversation.
pub fn render(
    messages: &[Message],
    format: ExportFormat,
    model: Option<&str>,
    date: DateTime<Local>,
) -> Result<Option<String>> {
    if messages.is_empty() {
        return Ok(None);
    }

    let rendered = match format {
        ExportFormat::Json => serde_json::to_string_pretty(messages)?,
        ExportFormat::Markdown => {
            let mut lines = vec![
                "# ChatGPT Conversation".to_string(),
                format!("\n**Model**: {}", model.unwrap_or("Unknown")),
                format!("**Date**: {}\n", date.format("%Y-%m-%d %H:%M:%S")),
            ];
            for message in messages {
                let heading = match message.role {
                    Role::User => "User",
                    Role::Assistant => "ChatGPT",
                };
                lines.push(format!("## {heading}\n\n{}\n", message.content));
            }
            lines.join("\n")
        }
    };
    Ok(Some(rendered))
}

/// Default file stem for a save at `date`
pub fn default_file_stem(date: DateTime<Local>) -> String {
    format!("chatgpt_conversation_{}", date.format("%Y%m%d_%H%M%S"))
}

/// Write an export into `dir`; only the final component of `stem` is used
pub fn save(dir: &Path, stem: &str, format: ExportFormat, content: &str) -> Result<PathBuf> {
    let stem = Path::new(stem)
        .file_name()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| McpError::InvalidParams(format!("Invalid filename: {stem:?}")))?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.{}", format.extension()));
    std::fs::write(&path, content)?;
    info!("Conversation saved to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<Message> {
        vec![
            Message { role: Role::User, content: "Hi".into() },
            Message { role: Role::Assistant, content: "Hello!".into() },
        ]
    }

    fn date() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap()
    }

    #[test]
    fn test_markdown() {
        let md = render(&sample(), ExportFormat::Markdown, Some("GPT-4o"), date())
            .unwrap()
            .unwrap();
        assert_eq!(
            md,
            "# ChatGPT Conversation\n\n**Model**: GPT-4o\n**Date**: 2025-03-04 05:06:07\n\n## User\n\nHi\n\n## ChatGPT\n\nHello!\n"
        );
    }

    #[test]
    fn test_json() {
        let json = render(&sample(), ExportFormat::Json, None, date()).unwrap().unwrap();
        let parsed: Vec<Message> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample());
        assert!(json.contains("\"role\": \"assistant\""));
    }

    #[test]
    fn test_empty_conversation() {
        assert!(render(&[], ExportFormat::Json, None, date()).unwrap().is_none());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("markdown".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_save() {
        let dir = tempfile::tempdir().unwrap();
        let stem = default_file_stem(date());
        assert_eq!(stem, "chatgpt_conversation_20250304_050607");

        let path = save(dir.path(), "../escape", ExportFormat::Markdown, "# x").unwrap();
        assert_eq!(path, dir.path().join("escape.md"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# x");
    }
}
