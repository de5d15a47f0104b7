//! Recovery actions and their registry

use crate::error::Result;
use crate::recovery::ErrorKind;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Zero-argument async remediation for one error kind
pub type RecoveryProcedure = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// How one error kind is remediated
#[derive(Clone)]
pub struct RecoveryAction {
    /// Kind this action handles
    pub kind: ErrorKind,
    /// The remediation itself
    pub procedure: RecoveryProcedure,
    /// Recovery attempts allowed per (kind, context) streak
    pub max_retries: u32,
    /// Wait before the first attempt
    pub base_delay: Duration,
    /// Double the wait for every failed attempt in the streak
    pub exponential_backoff: bool,
    /// Shown in logs
    pub description: String,
}

impl RecoveryAction {
    /// Create an action with the defaults: 3 retries, 1s, exponential
    pub fn new<F, Fut>(kind: ErrorKind, procedure: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            kind,
            procedure: Arc::new(move || Box::pin(procedure())),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            exponential_backoff: true,
            description: String::new(),
        }
    }

    /// An action whose procedure does nothing; the backoff wait is the remedy
    pub fn wait_only(kind: ErrorKind) -> Self {
        Self::new(kind, || async { Ok(()) })
    }

    /// Set the retry budget
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the base delay in fractional seconds; negative values clamp to zero
    pub fn base_delay_secs(self, secs: f64) -> Self {
        self.base_delay(Duration::from_secs_f64(secs.max(0.0)))
    }

    /// Enable/disable exponential backoff
    pub fn exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }

    /// Set the description
    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Wait before an attempt, given how many attempts already failed
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        if self.exponential_backoff {
            let factor = 1u32.checked_shl(failed_attempts).unwrap_or(u32::MAX);
            self.base_delay.saturating_mul(factor)
        } else {
            self.base_delay
        }
    }
}

impl fmt::Debug for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryAction")
            .field("kind", &self.kind)
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("exponential_backoff", &self.exponential_backoff)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// One [`RecoveryAction`] per [`ErrorKind`]; the last registration wins
#[derive(Default, Debug)]
pub struct RecoveryRegistry {
    actions: HashMap<ErrorKind, RecoveryAction>,
}

impl RecoveryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action, replacing any previous one for the same kind
    pub fn register(&mut self, action: RecoveryAction) {
        info!(
            "Registered recovery action for {}: {}",
            action.kind, action.description
        );
        self.actions.insert(action.kind, action);
    }

    /// Look up the action for a kind
    pub fn lookup(&self, kind: ErrorKind) -> Option<&RecoveryAction> {
        self.actions.get(&kind)
    }

    /// Number of registered actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<ErrorKind> {
        let mut kinds: Vec<_> = self.actions.keys().copied().collect();
        kinds.sort();
        kinds
    }
}
