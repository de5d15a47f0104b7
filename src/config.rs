//! Environment-driven configuration
//!
//! [`AutomationConfig::from_env`] reads every setting from the process
//! environment with documented defaults. Tests and embedders use
//! [`AutomationConfig::builder`] instead.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default remote debugging endpoint
pub const DEFAULT_CDP_URL: &str = "http://127.0.0.1:9222";

/// What to do when the debug endpoint answers but exposes no browsing context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroContextPolicy {
    /// Treat as fatal; the endpoint is held by something unexpected
    #[default]
    FailFast,
    /// Create a fresh context and page on it
    CreateContext,
}

impl FromStr for ZeroContextPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fail_fast" | "fail" => Ok(Self::FailFast),
            "create_context" | "create" => Ok(Self::CreateContext),
            other => Err(format!("expected fail_fast or create_context, got {other}")),
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    /// Login email; None assumes the browser is already logged in
    pub email: Option<String>,
    /// Login password
    pub password: Option<String>,
    /// Headless automated browser
    pub headless: bool,
    /// General browser timeout in milliseconds
    pub browser_timeout_ms: u64,
    /// Default element wait in milliseconds
    pub default_wait_timeout_ms: u64,
    /// Where screenshots go
    pub screenshot_dir: PathBuf,
    /// Where conversation exports go
    pub export_dir: PathBuf,
    /// Where persisted sessions go
    pub session_dir: PathBuf,
    /// Save and restore automated-browser session state
    pub persist_session: bool,
    /// Name of the persisted session
    pub session_name: String,
    /// Attach to a debug-enabled browser
    pub use_cdp: bool,
    /// Remote debugging endpoint
    pub cdp_url: String,
    /// UI delay multiplier
    pub animation_multiplier: f64,
    /// Permit the non-debug automated launch when `use_cdp` is off
    pub allow_automated_launch: bool,
    /// Behaviour on an endpoint with no contexts
    pub zero_context_policy: ZeroContextPolicy,
    /// Gracefully quit a running non-debug Chrome before launching one
    pub terminate_existing_browser: bool,
    /// Chrome executable; None auto-detects
    pub chrome_path: Option<PathBuf>,
    /// Profile directory for the debug-enabled Chrome
    pub chrome_user_data_dir: PathBuf,
    /// Wait between launching Chrome and re-attaching
    pub bootstrap_delay: Duration,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        let temp = PathBuf::from("temp");
        Self {
            email: None,
            password: None,
            headless: false,
            browser_timeout_ms: 30_000,
            default_wait_timeout_ms: 5_000,
            screenshot_dir: temp.join("screenshots"),
            export_dir: temp.join("exports"),
            session_dir: temp.join("sessions"),
            persist_session: true,
            session_name: "default".to_string(),
            use_cdp: true,
            cdp_url: DEFAULT_CDP_URL.to_string(),
            animation_multiplier: 1.0,
            allow_automated_launch: false,
            zero_context_policy: ZeroContextPolicy::FailFast,
            terminate_existing_browser: false,
            chrome_path: None,
            chrome_user_data_dir: default_chrome_profile(),
            bootstrap_delay: Duration::from_secs(5),
        }
    }
}

fn default_chrome_profile() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".chatgpt-automation-mcp")
        .join("chrome-profile")
}

impl AutomationConfig {
    /// Create a new config builder
    pub fn builder() -> AutomationConfigBuilder {
        AutomationConfigBuilder::default()
    }

    /// Read the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        config.email = get("CHATGPT_EMAIL");
        config.password = get("CHATGPT_PASSWORD");
        if let Some(v) = get("HEADLESS") {
            config.headless = parse_bool("HEADLESS", &v)?;
        }
        if let Some(v) = get("BROWSER_TIMEOUT") {
            config.browser_timeout_ms = parse_num("BROWSER_TIMEOUT", &v)?;
        }
        if let Some(v) = get("DEFAULT_WAIT_TIMEOUT") {
            config.default_wait_timeout_ms = parse_num("DEFAULT_WAIT_TIMEOUT", &v)?;
        }
        if let Some(v) = get("SCREENSHOT_DIR") {
            config.screenshot_dir = PathBuf::from(v);
        }
        if let Some(v) = get("EXPORT_DIR") {
            config.export_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SESSION_DIR") {
            config.session_dir = PathBuf::from(v);
        }
        if let Some(v) = get("PERSIST_SESSION") {
            config.persist_session = parse_bool("PERSIST_SESSION", &v)?;
        }
        if let Some(v) = get("SESSION_NAME") {
            config.session_name = v;
        }
        if let Some(v) = get("USE_CDP") {
            config.use_cdp = parse_bool("USE_CDP", &v)?;
        }
        if let Some(v) = get("CDP_URL") {
            config.cdp_url = v;
        }
        if let Some(v) = get("CHATGPT_ANIMATION_MULTIPLIER") {
            config.animation_multiplier = parse_num("CHATGPT_ANIMATION_MULTIPLIER", &v)?;
        }
        if let Some(v) = get("ALLOW_AUTOMATED_LAUNCH") {
            config.allow_automated_launch = parse_bool("ALLOW_AUTOMATED_LAUNCH", &v)?;
        }
        if let Some(v) = get("CDP_ZERO_CONTEXT_POLICY") {
            config.zero_context_policy = v.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "CDP_ZERO_CONTEXT_POLICY".to_string(),
                value: v.clone(),
                reason,
            })?;
        }
        if let Some(v) = get("TERMINATE_EXISTING_BROWSER") {
            config.terminate_existing_browser = parse_bool("TERMINATE_EXISTING_BROWSER", &v)?;
        }
        if let Some(v) = get("CHROME_PATH") {
            config.chrome_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("CHROME_USER_DATA_DIR") {
            config.chrome_user_data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("BOOTSTRAP_DELAY_SECS") {
            config.bootstrap_delay = Duration::from_secs(parse_num("BOOTSTRAP_DELAY_SECS", &v)?);
        }

        Ok(config)
    }

    /// Non-fatal problems worth logging at startup
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.email.is_none() {
            warnings.push(
                "CHATGPT_EMAIL not set - assuming browser is already logged in".to_string(),
            );
        }
        if self.email.is_some() && self.password.is_none() {
            warnings.push(
                "CHATGPT_EMAIL set without CHATGPT_PASSWORD - login will stop at the password step"
                    .to_string(),
            );
        }
        if !self.use_cdp && !self.allow_automated_launch {
            warnings.push(
                "USE_CDP is off and ALLOW_AUTOMATED_LAUNCH is not set - launch will be refused".to_string(),
            );
        }
        if !self.use_cdp && self.allow_automated_launch {
            warnings.push("Automated browser launch enabled - expect bot detection".to_string());
        }
        if url::Url::parse(&self.cdp_url).is_err() {
            warnings.push(format!("CDP_URL {:?} is not a valid URL", self.cdp_url));
        }
        warnings
    }

    /// Create the screenshot, export and session directories
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.screenshot_dir, &self.export_dir, &self.session_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Timestamped screenshot path for a name
    pub fn screenshot_path(&self, name: &str) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.screenshot_dir.join(format!("{name}_{timestamp}.png"))
    }

    /// Where the quota tracker keeps its file
    pub fn data_dir(&self) -> &Path {
        self.session_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(self.session_dir.as_path())
    }

    /// General browser timeout
    pub fn browser_timeout(&self) -> Duration {
        Duration::from_millis(self.browser_timeout_ms)
    }

    /// Default element wait
    pub fn default_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.default_wait_timeout_ms)
    }
}

fn parse_bool(key: &str, value: &str) -> std::result::Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected true/false/1/0/yes/no")),
    }
}

fn parse_num<T: FromStr>(key: &str, value: &str) -> std::result::Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, value, "expected a number"))
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Builder for AutomationConfig
#[derive(Default)]
pub struct AutomationConfigBuilder {
    config: AutomationConfig,
}

impl AutomationConfigBuilder {
    /// Set login credentials
    pub fn credentials<S: Into<String>>(mut self, email: S, password: S) -> Self {
        self.config.email = Some(email.into());
        self.config.password = Some(password.into());
        self
    }

    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Set browser timeout
    pub fn browser_timeout_ms(mut self, ms: u64) -> Self {
        self.config.browser_timeout_ms = ms;
        self
    }

    /// Set the default element wait
    pub fn default_wait_timeout_ms(mut self, ms: u64) -> Self {
        self.config.default_wait_timeout_ms = ms;
        self
    }

    /// Put screenshots, exports and sessions under one directory
    pub fn data_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        self.config.screenshot_dir = root.join("screenshots");
        self.config.export_dir = root.join("exports");
        self.config.session_dir = root.join("sessions");
        self
    }

    /// Enable/disable session persistence
    pub fn persist_session(mut self, persist: bool) -> Self {
        self.config.persist_session = persist;
        self
    }

    /// Set the session name
    pub fn session_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.session_name = name.into();
        self
    }

    /// Enable/disable CDP attach
    pub fn use_cdp(mut self, use_cdp: bool) -> Self {
        self.config.use_cdp = use_cdp;
        self
    }

    /// Set the debug endpoint
    pub fn cdp_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.cdp_url = url.into();
        self
    }

    /// Set the UI delay multiplier
    pub fn animation_multiplier(mut self, multiplier: f64) -> Self {
        self.config.animation_multiplier = multiplier;
        self
    }

    /// Permit the automated launch
    pub fn allow_automated_launch(mut self, allow: bool) -> Self {
        self.config.allow_automated_launch = allow;
        self
    }

    /// Set the zero-context policy
    pub fn zero_context_policy(mut self, policy: ZeroContextPolicy) -> Self {
        self.config.zero_context_policy = policy;
        self
    }

    /// Quit a running non-debug Chrome before launching
    pub fn terminate_existing_browser(mut self, terminate: bool) -> Self {
        self.config.terminate_existing_browser = terminate;
        self
    }

    /// Set Chrome path
    pub fn chrome_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Set the debug Chrome profile directory
    pub fn chrome_user_data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.chrome_user_data_dir = dir.into();
        self
    }

    /// Set the launch-to-reattach wait
    pub fn bootstrap_delay(mut self, delay: Duration) -> Self {
        self.config.bootstrap_delay = delay;
        self
    }

    /// Build the config
    pub fn build(self) -> AutomationConfig {
        self.config
    }
}
