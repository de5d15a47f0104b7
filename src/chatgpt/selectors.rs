//! CSS selectors for the ChatGPT web app
//!
//! The app's markup changes without notice. Everything that names a DOM
//! node lives here so a markup change is a one-file patch.

/// Present once the app shell has rendered (theme class or the prompt box)
pub const READY_SIGNAL: &str = "html.dark, html.light, #prompt-textarea";

/// Prompt input
pub const PROMPT: &str = "#prompt-textarea";

/// Send button candidates, tried in order
pub const SEND_BUTTONS: &[&str] = &[
    r#"button[data-testid="send-button"]"#,
    r#"button[aria-label="Send prompt"]"#,
];

/// One message of the conversation, user or assistant
pub const CONVERSATION_TURN: &str = r#"[data-testid^="conversation-turn"]"#;

/// Shown while a response is being generated
pub const THINKING_INDICATORS: &[&str] = &[
    r#"[data-testid="thinking-indicator"]"#,
    ".animate-pulse",
    r#"button[data-testid="stop-button"]"#,
    r#"button[aria-label="Stop generating"]"#,
];

/// New chat controls, tried in order
pub const NEW_CHAT_BUTTONS: &[&str] = &[
    r#"[data-testid="create-new-chat-button"]"#,
    r#"[data-testid="new-chat-button"]"#,
    r#"a[href="/"]"#,
];

/// Elements whose text names the current model
pub const MODEL_LABELS: &[&str] = &[
    r#"[data-testid="model-switcher-dropdown-button"]"#,
    r#"[data-testid="model-picker"] span"#,
    r#"button[aria-haspopup="menu"] span"#,
    "button[data-state] span",
];

/// Buttons opening the model menu
pub const MODEL_PICKERS: &[&str] = &[
    r#"[data-testid="model-switcher-dropdown-button"]"#,
    r#"[data-testid="model-picker"]"#,
    r#"button[aria-haspopup="menu"]"#,
];

/// An open menu or listbox
pub const MENU: &str = r#"[role="menu"], [role="listbox"], [data-radix-menu-content]"#;

/// Entries of an open menu
pub const MENU_ITEMS: &str =
    r#"[role="menuitem"], [role="option"], [data-radix-menu-item]"#;

/// Presence means the login page is showing
pub const LOGIN_INDICATORS: &[&str] = &[
    r#"[data-testid="login-button"]"#,
    r#"input[type="email"]"#,
    r#"a[href*="auth0.openai.com"]"#,
];

/// Presence means a logged-in chat view
pub const CHAT_INDICATORS: &[&str] = &[PROMPT, CONVERSATION_TURN];

/// Login entry point
pub const LOGIN_BUTTON: &str = r#"[data-testid="login-button"]"#;

/// Visible text of the login button when it has no test id
pub const LOGIN_BUTTON_TEXT: &str = "Log in";

/// Login form fields
pub const EMAIL_INPUT: &str = r#"input[type="email"]"#;
/// Password field, shown after the email step
pub const PASSWORD_INPUT: &str = r#"input[type="password"]"#;
/// Login form submit
pub const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;

/// Web search toggle candidates
pub const SEARCH_TOGGLES: &[&str] = &[
    r#"button[aria-label*="Search"]"#,
    r#"[data-testid="search-toggle"]"#,
];

/// Regenerate controls, tried in order
pub const REGENERATE_BUTTONS: &[&str] = &[
    r#"button[aria-label*="Regenerate"]"#,
    r#"[data-testid="regenerate-button"]"#,
];

/// Fallback label for the regenerate control
pub const REGENERATE_TEXT: &str = "Regenerate";

/// Native file inputs; usually hidden, so only presence is checked
pub const FILE_INPUTS: &[&str] = &[
    r#"input[type="file"]"#,
    r#"[data-testid="file-upload"]"#,
];

/// Controls that open the file chooser
pub const UPLOAD_BUTTONS: &[&str] = &[
    r#"button[aria-label*="Attach"]"#,
    r#"button[aria-label*="Upload"]"#,
    r#"[data-testid="file-upload-button"]"#,
];

/// Entries of the history sidebar, tried in order
pub const CONVERSATION_LINKS: &[&str] = &[
    r#"nav[aria-label="Chat history"] a[href^="/c/"]"#,
    r#"[data-testid="conversation-list"] a[href^="/c/"]"#,
    r#"[data-testid="conversation-item"]"#,
];

/// Controls that delete the open conversation directly
pub const DELETE_BUTTONS: &[&str] = &[r#"button[aria-label*="Delete"]"#];

/// Conversation menus that hold a delete entry
pub const CONVERSATION_OPTIONS: &[&str] = &[
    r#"[data-testid="conversation-options-button"]"#,
    r#"button[aria-label*="Options"]"#,
    r#"button[aria-label*="More"]"#,
];

/// Label of the delete menu entry and of the confirm button
pub const DELETE_TEXT: &str = "Delete";

/// Confirm button of the delete dialog
pub const DELETE_CONFIRM_BUTTONS: &[&str] = &[
    r#"[data-testid="delete-conversation-confirm-button"]"#,
    r#"button[aria-label="Confirm deletion"]"#,
];

/// Buttons of an open modal dialog
pub const DIALOG_BUTTONS: &str = r#"[role="dialog"] button"#;

/// One message written by the user
pub const USER_MESSAGE: &str = r#"[data-message-author-role="user"]"#;

/// Edit controls inside a user message
pub const EDIT_BUTTONS: &[&str] = &[
    r#"button[aria-label*="Edit"]"#,
    r#"button:has(svg[class*="pencil"])"#,
];

/// Editor opened by an edit control
pub const EDIT_TEXTAREAS: &[&str] = &[
    r#"textarea[aria-label*="Edit"]"#,
    "textarea.editing",
    "textarea:focus",
];

/// Submit controls of the message editor
pub const EDIT_SUBMIT_BUTTONS: &[&str] = &[
    r#"button[aria-label*="Save"]"#,
    r#"button[aria-label*="Submit"]"#,
];

/// Speaker labels that may lead a turn's text
pub const ROLE_LABELS: &[&str] = &["You", "ChatGPT", "GPT-4", "o1", "o3"];

/// Fragments that identify a model name in UI text
pub const MODEL_KEYWORDS: &[&str] = &["gpt", "o1", "o3", "o4"];

/// Whether `text` looks like a model name
pub fn mentions_model(text: &str) -> bool {
    let lower = text.to_lowercase();
    MODEL_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mentions_model() {
        assert!(mentions_model("ChatGPT 4o"));
        assert!(mentions_model("o3-pro"));
        assert!(mentions_model("GPT-5 Thinking"));
        assert!(!mentions_model("Temporary chat"));
    }

    #[test]
    fn test_conversation_links_are_single_selectors() {
        // Titles and links are paired by position within one selector
        for selector in CONVERSATION_LINKS {
            assert!(!selector.contains(", "), "{selector}");
        }
    }

    #[test]
    fn test_ready_signal_covers_prompt() {
        assert!(READY_SIGNAL.contains(PROMPT));
    }
}
