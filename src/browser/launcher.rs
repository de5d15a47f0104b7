//! Debug-enabled Chrome launcher
//!
//! Starts a real Chrome with `--remote-debugging-port` and a dedicated
//! profile directory so the CDP backend can attach to it. Chrome refuses to
//! open a debug port on a profile that is already in use, which is why a
//! running non-debug instance can optionally be asked to quit first.

use crate::config::AutomationConfig;
use crate::error::{BootstrapError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Port used when the endpoint URL carries none
pub const DEFAULT_DEBUG_PORT: u16 = 9222;

/// URL the fresh browser opens on
pub const START_URL: &str = "https://chatgpt.com";

/// Launches Chrome with remote debugging enabled
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    chrome_path: Option<PathBuf>,
    user_data_dir: PathBuf,
    debug_port: u16,
    headless: bool,
    terminate_existing: bool,
}

impl ChromeLauncher {
    /// Build a launcher from configuration
    pub fn from_config(config: &AutomationConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.clone(),
            user_data_dir: config.chrome_user_data_dir.clone(),
            debug_port: debug_port_of(&config.cdp_url),
            headless: config.headless,
            terminate_existing: config.terminate_existing_browser,
        }
    }

    /// Port the browser will listen on
    pub fn debug_port(&self) -> u16 {
        self.debug_port
    }

    /// Command line arguments for the launch
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.debug_port),
            format!("--user-data-dir={}", self.user_data_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.push(START_URL.to_string());
        args
    }

    /// Find a Chrome executable: configured path first, then per-OS locations
    pub fn find_chrome(&self) -> Option<PathBuf> {
        if let Some(path) = &self.chrome_path {
            return path.exists().then(|| path.clone());
        }
        Self::default_locations()
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    fn default_locations() -> &'static [&'static str] {
        #[cfg(target_os = "macos")]
        {
            &[
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
            ]
        }
        #[cfg(target_os = "windows")]
        {
            &[
                r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            ]
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            &[
                "/usr/bin/google-chrome",
                "/usr/bin/google-chrome-stable",
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
                "/snap/bin/chromium",
            ]
        }
    }

    /// Process names that count as a running browser: the resolved
    /// executable's own name plus the stock Chrome/Chromium names
    pub fn process_names(&self) -> Vec<String> {
        let mut names: Vec<String> = BROWSER_PROCESS_NAMES
            .iter()
            .map(|n| n.to_string())
            .collect();
        if let Some(name) = self
            .find_chrome()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Browser processes currently running, matched on the executable name
    pub async fn running_browsers(&self) -> Vec<String> {
        #[cfg(target_os = "windows")]
        let output = Command::new("tasklist").args(["/FO", "CSV", "/NH"]).output().await;
        #[cfg(not(target_os = "windows"))]
        let output = Command::new("ps").args(["-A", "-o", "comm="]).output().await;

        match output {
            Ok(out) if out.status.success() => {
                browsers_in_listing(&String::from_utf8_lossy(&out.stdout), &self.process_names())
            }
            Ok(out) => {
                debug!("Process listing exited with {}", out.status);
                Vec::new()
            }
            Err(e) => {
                debug!("Process check failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Whether a Chrome process is running at all
    pub async fn is_chrome_running(&self) -> bool {
        !self.running_browsers().await.is_empty()
    }

    /// Ask the running browser processes to quit and give them time to exit
    pub async fn terminate_existing(&self) {
        for name in self.running_browsers().await {
            #[cfg(target_os = "windows")]
            let result = Command::new("taskkill").args(["/IM", name.as_str()]).status().await;
            #[cfg(target_os = "macos")]
            let result = {
                let script = format!("quit app \"{name}\"");
                Command::new("osascript")
                    .args(["-e", script.as_str()])
                    .status()
                    .await
            };
            #[cfg(not(any(target_os = "macos", target_os = "windows")))]
            let result = Command::new("pkill")
                .args(["-TERM", "-x", name.as_str()])
                .status()
                .await;

            match result {
                Ok(status) => debug!("Terminate request for {} exited with {}", name, status),
                Err(e) => warn!("Could not ask {} to quit: {}", name, e),
            }
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    /// Spawn the debug-enabled browser; the process is left running
    #[instrument(skip(self))]
    pub async fn launch(&self) -> Result<()> {
        let chrome = self.find_chrome().ok_or(BootstrapError::ChromeNotFound)?;

        if self.is_chrome_running().await {
            if self.terminate_existing {
                info!("Chrome is running without remote debugging, asking it to quit");
                self.terminate_existing().await;
            } else {
                warn!("Chrome is already running; the debug launch may reuse that process");
            }
        }

        if let Err(e) = std::fs::create_dir_all(&self.user_data_dir) {
            warn!("Failed to create profile directory: {}", e);
        }

        info!(
            "Launching Chrome on port {} with profile at {}",
            self.debug_port,
            self.user_data_dir.display()
        );

        let child = Command::new(&chrome)
            .args(self.args())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BootstrapError::LaunchFailed(e.to_string()))?;

        info!("Chrome launched with PID: {:?}", child.id());
        Ok(())
    }
}

/// Executable names of stock Chrome and Chromium builds. Linux truncates
/// process names to 15 bytes, hence the short forms.
pub const BROWSER_PROCESS_NAMES: &[&str] = &[
    "chrome",
    "google-chrome",
    "google-chrome-stable",
    "google-chrome-s",
    "chromium",
    "chromium-browser",
    "chromium-browse",
    "Google Chrome",
    "Chromium",
    "chrome.exe",
];

/// Names from a process listing that exactly match one of `names`.
///
/// Accepts `ps -o comm=` lines (bare names or full paths) and
/// `tasklist /FO CSV` rows. Helpers such as `chromedriver` or
/// `chrome_crashpad_handler` and processes that merely mention chrome in
/// their arguments never match.
pub fn browsers_in_listing(listing: &str, names: &[String]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for line in listing.lines() {
        let line = line.trim();
        let image = if line.starts_with('"') {
            line.split('"').nth(1).unwrap_or_default()
        } else {
            line
        };
        let name = Path::new(image)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if names.contains(&name) && !found.contains(&name) {
            found.push(name);
        }
    }
    found
}

/// Debug port named by an endpoint URL
pub fn debug_port_of(endpoint: &str) -> u16 {
    url::Url::parse(endpoint)
        .ok()
        .and_then(|u| u.port())
        .unwrap_or(DEFAULT_DEBUG_PORT)
}
