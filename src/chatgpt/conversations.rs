//! Conversation history entries

use crate::browser::bootstrap::APP_URL;
use crate::error::{McpError, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Prefix of ids given to sidebar entries that carry no link
const POSITIONAL_PREFIX: &str = "conv_";

/// One entry of the history sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    /// Id from the entry's link, or `conv_<index>` when it has none
    pub id: String,
    /// Title shown in the sidebar
    pub title: String,
    /// Position of the entry in the sidebar markup
    pub index: usize,
}

impl ConversationSummary {
    /// Whether the id was made up from the entry's position
    pub fn has_positional_id(&self) -> bool {
        is_positional_id(&self.id)
    }
}

fn is_positional_id(id: &str) -> bool {
    id.starts_with(POSITIONAL_PREFIX)
}

/// A conversation named by id or by its position in the listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationRef {
    /// Id from the conversation URL, or a positional `conv_<n>` id
    Id(String),
    /// Position in [`list_conversations`](super::ChatGptController::list_conversations)
    Index(usize),
}

impl ConversationRef {
    /// Read an id string or a non-negative index
    pub fn from_value(value: &Value) -> Result<Self> {
        let target = match value {
            Value::String(id) if !id.trim().is_empty() => Self::Id(id.trim().to_string()),
            Value::Number(n) => match n.as_u64().and_then(|i| usize::try_from(i).ok()) {
                Some(index) => Self::Index(index),
                None => return Err(invalid_target()),
            },
            _ => return Err(invalid_target()),
        };
        target.validate()?;
        Ok(target)
    }

    /// Reject ids that cannot be put into a conversation URL
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Id(id) if !is_positional_id(id) => conversation_url(id).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Whether the target has to be looked up in the sidebar
    pub fn needs_listing(&self) -> bool {
        match self {
            Self::Id(id) => is_positional_id(id),
            Self::Index(_) => true,
        }
    }
}

impl fmt::Display for ConversationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

fn invalid_target() -> crate::error::Error {
    McpError::InvalidParams("conversation_id must be an id string or a non-negative index".into())
        .into()
}

/// URL of a conversation
pub fn conversation_url(id: &str) -> Result<String> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(McpError::InvalidParams(format!("invalid conversation id: {id}")).into());
    }
    Ok(format!("{APP_URL}/c/{id}"))
}

/// Last path segment of a conversation link, without query or fragment
pub fn id_from_href(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Pair sidebar titles with their links. Blank entries are dropped but
/// keep their markup position.
pub fn summaries_from(titles: &[String], hrefs: &[Option<String>]) -> Vec<ConversationSummary> {
    titles
        .iter()
        .enumerate()
        .filter_map(|(index, title)| {
            let title = title.trim();
            if title.is_empty() {
                return None;
            }
            let id = hrefs
                .get(index)
                .and_then(Option::as_deref)
                .and_then(id_from_href)
                .unwrap_or_else(|| format!("{POSITIONAL_PREFIX}{index}"));
            Some(ConversationSummary {
                id,
                title: title.to_string(),
                index,
            })
        })
        .collect()
}
