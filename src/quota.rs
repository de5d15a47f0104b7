//! Monthly quota tracking for limited ChatGPT modes
//!
//! Counts uses of modes with a monthly allowance and persists the counters
//! as JSON. Counters roll over when the UTC month changes.

use crate::error::Result;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name inside the data directory
pub const QUOTA_FILE: &str = "quota_usage.json";

/// Allowance for one limited mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaLimit {
    /// Mode name as used by tools
    pub mode: &'static str,
    /// Uses per month
    pub limit: u32,
    /// Fraction of `limit` at which to warn
    pub warning_threshold: f64,
}

/// Modes with a monthly allowance
pub const QUOTAS: [QuotaLimit; 2] = [
    QuotaLimit {
        mode: "deep_research",
        limit: 250,
        warning_threshold: 0.8,
    },
    QuotaLimit {
        mode: "agent_mode",
        limit: 400,
        warning_threshold: 0.9,
    },
];

fn quota_for(mode: &str) -> Option<&'static QuotaLimit> {
    QUOTAS.iter().find(|q| q.mode == mode)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ModeUsage {
    count: u32,
    last_reset: String,
}

/// Outcome of [`QuotaTracker::check`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaCheck {
    /// Whether another use is allowed
    pub allowed: bool,
    /// Human readable status; empty for untracked modes
    pub message: String,
}

/// Usage for one mode in [`QuotaTracker::summary`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    /// Uses this month
    pub current: u32,
    /// Monthly allowance
    pub limit: u32,
    /// Whole percent used
    pub percentage: u32,
    /// Uses left
    pub remaining: u32,
}

/// Tracks monthly usage of limited modes
pub struct QuotaTracker {
    path: PathBuf,
    usage: Mutex<BTreeMap<String, ModeUsage>>,
    month: Box<dyn Fn() -> String + Send + Sync>,
}

impl std::fmt::Debug for QuotaTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaTracker")
            .field("path", &self.path)
            .field("usage", &*self.usage.lock())
            .finish_non_exhaustive()
    }
}

fn current_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}

impl QuotaTracker {
    /// Open (or create) the tracker in `data_dir`
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Self::open_with_clock(data_dir, current_month)
    }

    /// Open with an injected month source
    pub fn open_with_clock<P, F>(data_dir: P, month: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn() -> String + Send + Sync + 'static,
    {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let path = data_dir.as_ref().join(QUOTA_FILE);
        let usage = Self::load(&path, &month());
        Ok(Self {
            path,
            usage: Mutex::new(usage),
            month: Box::new(month),
        })
    }

    fn load(path: &Path, month: &str) -> BTreeMap<String, ModeUsage> {
        let mut usage: BTreeMap<String, ModeUsage> = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Failed to parse quota usage: {}", e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Failed to load quota usage: {}", e);
                BTreeMap::new()
            }
        };
        for quota in &QUOTAS {
            usage.entry(quota.mode.to_string()).or_insert_with(|| ModeUsage {
                count: 0,
                last_reset: month.to_string(),
            });
        }
        usage
    }

    fn save(&self, usage: &BTreeMap<String, ModeUsage>) {
        let result = serde_json::to_string_pretty(usage)
            .map_err(crate::Error::from)
            .and_then(|json| std::fs::write(&self.path, json).map_err(crate::Error::from));
        if let Err(e) = result {
            warn!("Failed to save quota usage: {}", e);
        }
    }

    /// Run `f` on a mode's counter after rolling it over if the month changed
    fn with_mode<T>(&self, mode: &str, f: impl FnOnce(&mut ModeUsage) -> (T, bool)) -> T {
        let month = (self.month)();
        let mut usage = self.usage.lock();
        let entry = usage.entry(mode.to_string()).or_insert_with(|| ModeUsage {
            count: 0,
            last_reset: month.clone(),
        });
        let mut dirty = false;
        if entry.last_reset != month {
            info!("New month detected, resetting {} quota", mode);
            *entry = ModeUsage {
                count: 0,
                last_reset: month,
            };
            dirty = true;
        }
        let (value, changed) = f(entry);
        if dirty || changed {
            self.save(&usage);
        }
        value
    }

    /// Whether another use of `mode` is allowed, with a status message
    pub fn check(&self, mode: &str) -> QuotaCheck {
        let Some(quota) = quota_for(mode) else {
            return QuotaCheck {
                allowed: true,
                message: String::new(),
            };
        };
        let current = self.with_mode(mode, |u| (u.count, false));
        if current >= quota.limit {
            return QuotaCheck {
                allowed: false,
                message: format!(
                    "Monthly quota exceeded for {}: {}/{} used",
                    mode, current, quota.limit
                ),
            };
        }
        let ratio = f64::from(current) / f64::from(quota.limit);
        let message = if ratio >= quota.warning_threshold {
            format!(
                "Warning: {} quota at {}% ({}/{})",
                mode,
                (ratio * 100.0) as u32,
                current,
                quota.limit
            )
        } else {
            format!("{} usage: {}/{}", mode, current, quota.limit)
        };
        QuotaCheck {
            allowed: true,
            message,
        }
    }

    /// Count one use of `mode`; untracked modes are ignored
    pub fn increment(&self, mode: &str) {
        let Some(quota) = quota_for(mode) else {
            return;
        };
        let current = self.with_mode(mode, |u| {
            u.count += 1;
            (u.count, true)
        });
        info!("{} usage incremented: {}/{}", mode, current, quota.limit);
    }

    /// Usage of every tracked mode
    pub fn summary(&self) -> BTreeMap<String, QuotaUsage> {
        QUOTAS
            .iter()
            .map(|quota| {
                let current = self.with_mode(quota.mode, |u| (u.count, false));
                let usage = QuotaUsage {
                    current,
                    limit: quota.limit,
                    percentage: current.saturating_mul(100) / quota.limit,
                    remaining: quota.limit.saturating_sub(current),
                };
                (quota.mode.to_string(), usage)
            })
            .collect()
    }

    /// Whether usage of `mode` has crossed its warning threshold
    pub fn should_warn(&self, mode: &str) -> bool {
        let Some(quota) = quota_for(mode) else {
            return false;
        };
        let current = self.with_mode(mode, |u| (u.count, false));
        f64::from(current) / f64::from(quota.limit) >= quota.warning_threshold
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_untracked_mode_is_free() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = QuotaTracker::open(dir.path()).unwrap();
        let check = tracker.check("web_search");
        assert!(check.allowed);
        assert!(check.message.is_empty());
        tracker.increment("web_search");
        assert!(!tracker.should_warn("web_search"));
    }

    #[test]
    fn test_increment_persists() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = QuotaTracker::open_with_clock(dir.path(), || "2025-01".to_string()).unwrap();
        tracker.increment("deep_research");
        tracker.increment("deep_research");

        let reopened =
            QuotaTracker::open_with_clock(dir.path(), || "2025-01".to_string()).unwrap();
        let summary = reopened.summary();
        assert_eq!(summary["deep_research"].current, 2);
        assert_eq!(summary["deep_research"].remaining, 248);
        assert_eq!(summary["agent_mode"].current, 0);
    }

    #[test]
    fn test_warning_and_exhaustion() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = QuotaTracker::open_with_clock(dir.path(), || "2025-01".to_string()).unwrap();
        for _ in 0..200 {
            tracker.increment("deep_research");
        }
        assert!(tracker.should_warn("deep_research"));
        let check = tracker.check("deep_research");
        assert!(check.allowed);
        assert_eq!(check.message, "Warning: deep_research quota at 80% (200/250)");

        for _ in 0..50 {
            tracker.increment("deep_research");
        }
        let check = tracker.check("deep_research");
        assert!(!check.allowed);
        assert!(check.message.contains("250/250"));
    }

    #[test]
    fn test_month_rollover() {
        let dir = tempfile::tempdir().unwrap();
        let month = Arc::new(parking_lot::Mutex::new("2025-01".to_string()));
        let clock = month.clone();
        let tracker =
            QuotaTracker::open_with_clock(dir.path(), move || clock.lock().clone()).unwrap();
        tracker.increment("agent_mode");
        assert_eq!(tracker.summary()["agent_mode"].current, 1);

        *month.lock() = "2025-02".to_string();
        assert_eq!(tracker.summary()["agent_mode"].current, 0);
        assert_eq!(tracker.check("agent_mode").message, "agent_mode usage: 0/400");
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(QUOTA_FILE), "not json").unwrap();
        let tracker = QuotaTracker::open(dir.path()).unwrap();
        assert_eq!(tracker.summary()["deep_research"].current, 0);
    }
}
