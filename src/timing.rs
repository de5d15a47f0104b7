//! UI timing and response timeouts
//!
//! Animation and settle delays used between browser interactions, scaled by
//! one multiplier so slow machines (or tests) can stretch or shrink them all
//! at once. Also the per-model budget for waiting on a response.

use std::time::Duration;

/// Lowest multiplier the setter accepts
pub const MIN_MULTIPLIER: f64 = 0.1;

/// Named UI delays, in seconds before scaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    /// Chrome startup with remote debugging
    pub browser_startup: f64,
    /// Graceful browser close
    pub browser_close: f64,
    /// Browser ready after attach
    pub browser_ready: f64,
    /// After a click
    pub click: f64,
    /// Menu opening animation
    pub menu_open: f64,
    /// Hover effect
    pub hover: f64,
    /// Model selection confirmation
    pub model_selection: f64,
    /// Tool toggles such as web search
    pub toggle: f64,
    /// General UI update
    pub ui_update: f64,
    /// General recovery wait
    pub recovery_wait: f64,
    /// Wait after a reload or navigation
    pub page_load: f64,
    /// Network error recovery
    pub network_stabilize: f64,
    /// Timeout error recovery
    pub timeout_recovery: f64,
    multiplier: f64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            browser_startup: 5.0,
            browser_close: 2.0,
            browser_ready: 3.0,
            click: 0.5,
            menu_open: 0.5,
            hover: 0.3,
            model_selection: 1.5,
            toggle: 1.0,
            ui_update: 1.0,
            recovery_wait: 2.0,
            page_load: 3.0,
            network_stabilize: 2.0,
            timeout_recovery: 3.0,
            multiplier: 1.0,
        }
    }
}

impl Timings {
    /// Default timings with a multiplier
    pub fn with_multiplier(multiplier: f64) -> Self {
        let mut timings = Self::default();
        timings.set_multiplier(multiplier);
        timings
    }

    /// Every delay is zero
    pub fn zero() -> Self {
        Self {
            browser_startup: 0.0,
            browser_close: 0.0,
            browser_ready: 0.0,
            click: 0.0,
            menu_open: 0.0,
            hover: 0.0,
            model_selection: 0.0,
            toggle: 0.0,
            ui_update: 0.0,
            recovery_wait: 0.0,
            page_load: 0.0,
            network_stabilize: 0.0,
            timeout_recovery: 0.0,
            multiplier: 1.0,
        }
    }

    /// Current multiplier
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Set the multiplier, clamped to [`MIN_MULTIPLIER`]
    pub fn set_multiplier(&mut self, multiplier: f64) {
        self.multiplier = if multiplier.is_finite() {
            multiplier.max(MIN_MULTIPLIER)
        } else {
            1.0
        };
    }

    /// Scale a base delay in seconds
    pub fn scaled(&self, base_secs: f64) -> Duration {
        Duration::from_secs_f64((base_secs * self.multiplier).max(0.0))
    }

    /// Sleep for a scaled base delay
    pub async fn pause(&self, base_secs: f64) {
        let delay = self.scaled(base_secs);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Seconds to wait for a response given the selected model and mode
pub fn response_timeout_for(model: Option<&str>, mode: Option<&str>) -> u64 {
    if mode.is_some_and(|m| m.to_lowercase().contains("deep_research")) {
        return 21_600;
    }

    let Some(model) = model else {
        return 120;
    };
    let model = model.to_lowercase();
    let has = |variants: &[&str]| variants.iter().any(|v| model.contains(v));

    if has(&["gpt-5-pro", "gpt 5 pro"]) {
        1_800
    } else if has(&["gpt-5-thinking", "gpt 5 thinking"]) {
        900
    } else if has(&["gpt-5", "gpt 5"]) || model == "5" {
        300
    } else if has(&["o3-pro", "o3 pro"]) {
        900
    } else if has(&["o3"]) {
        600
    } else if has(&["o4-mini", "o4 mini"]) {
        60
    } else if has(&["gpt-4.5", "gpt 4.5"]) {
        180
    } else if has(&["gpt-4.1-mini", "gpt 4.1 mini"]) {
        60
    } else if has(&["gpt-4.1", "gpt 4.1"]) {
        90
    } else {
        // gpt-4o and unknown models
        120
    }
}

/// Human readable form of a timeout in seconds
pub fn format_timeout(secs: u64) -> String {
    if secs < 60 {
        format!("{secs} seconds")
    } else if secs < 3600 {
        let minutes = secs / 60;
        format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        let hours = secs as f64 / 3600.0;
        format!("{:.1} hour{}", hours, if secs == 3600 { "" } else { "s" })
    }
}
