//! Response completion and conversation text
//!
//! ChatGPT streams its answer into the last conversation turn while a
//! thinking indicator or stop button is on screen. Completion is the
//! indicator going away, followed by the network going quiet.

use super::selectors;
use crate::browser::driver::{ElementState, PageDriver, WaitUntil};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// How long a response may take to show a generation indicator
pub const INDICATOR_APPEAR_TIMEOUT: Duration = Duration::from_secs(5);

/// Network settle budget after the indicator disappears
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing
    User,
    /// ChatGPT
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who said it
    pub role: Role,
    /// Text without the speaker label
    pub content: String,
}

/// Drop a leading speaker label line such as `ChatGPT` or `You`
pub fn strip_role_label(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.split_once('\n') {
        Some((first, rest)) if selectors::ROLE_LABELS.contains(&first.trim()) => {
            rest.trim().to_string()
        }
        None if selectors::ROLE_LABELS.contains(&trimmed) => String::new(),
        _ => trimmed.to_string(),
    }
}

/// Turns alternate user, assistant, user, ...
pub fn conversation_from_turns(turns: &[String]) -> Vec<Message> {
    turns
        .iter()
        .enumerate()
        .map(|(i, text)| Message {
            role: if i % 2 == 0 { Role::User } else { Role::Assistant },
            content: strip_role_label(text),
        })
        .collect()
}

/// Cleaned text of the last turn; `None` when there is none or it is blank
pub fn last_response_from_turns(turns: &[String]) -> Option<String> {
    turns
        .last()
        .map(|t| strip_role_label(t))
        .filter(|t| !t.is_empty())
}

/// Wait until the response being generated is complete.
///
/// `Ok(true)` once no generation indicator remains. A response that never
/// showed an indicator counts as already complete. An indicator that
/// outlives `timeout` is a timeout error.
pub async fn wait_for_completion(page: &dyn PageDriver, timeout: Duration) -> Result<bool> {
    let indicators = selectors::THINKING_INDICATORS.join(", ");

    match page
        .wait_for_selector(&indicators, ElementState::Visible, INDICATOR_APPEAR_TIMEOUT)
        .await
    {
        Ok(()) => {
            debug!("Response in progress, waiting up to {}s", timeout.as_secs());
            page.wait_for_selector(&indicators, ElementState::Hidden, timeout)
                .await?;
        }
        Err(e) if e.is_timeout() => debug!("No generation indicator seen"),
        Err(e) => return Err(e),
    }

    if let Err(e) = page
        .wait_for_load_state(WaitUntil::NetworkIdle, SETTLE_TIMEOUT)
        .await
    {
        debug!("Network did not settle after response: {}", e);
    }

    info!("Response complete");
    Ok(true)
}
