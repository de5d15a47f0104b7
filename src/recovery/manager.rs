//! Recovery manager
//!
//! Owns the [`RecoveryRegistry`] and the per `(kind, context)` retry
//! counters. [`RecoveryManager::handle_error`] is the single entry point the
//! operation wrappers use to decide whether an operation is worth retrying.

use crate::error::Error;
use crate::recovery::retry::WithRecovery;
use crate::recovery::{classify, ErrorKind, RecoveryAction, RecoveryRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

type RetryKey = (ErrorKind, String);

/// Classify, back off, remediate, and keep retry bookkeeping
#[derive(Debug, Default)]
pub struct RecoveryManager {
    registry: RecoveryRegistry,
    retry_state: Mutex<HashMap<RetryKey, u32>>,
}

impl RecoveryManager {
    /// Create a manager over an already populated registry
    pub fn new(registry: RecoveryRegistry) -> Self {
        Self {
            registry,
            retry_state: Mutex::new(HashMap::new()),
        }
    }

    /// The registry this manager dispatches to
    pub fn registry(&self) -> &RecoveryRegistry {
        &self.registry
    }

    /// Try to remediate `error` raised while doing `context`.
    ///
    /// Returns `true` when the registered procedure for the error's kind
    /// succeeded and the caller should retry the operation. Never fails;
    /// errors raised by the procedure are logged and count as a failed
    /// attempt.
    #[instrument(skip(self, error))]
    pub async fn handle_error(&self, error: &Error, context: &str) -> bool {
        let kind = classify(error);
        warn!("Handling {} in {}: {}", kind, context, error);

        let Some(action) = self.registry.lookup(kind) else {
            warn!("No recovery action for {}", kind);
            return false;
        };

        let key = (kind, context.to_string());
        let attempts = {
            let mut state = self.retry_state.lock();
            let attempts = state.get(&key).copied().unwrap_or(0);
            if attempts >= action.max_retries {
                state.insert(key, 0);
                error!("Max retries exceeded for {} in {}", kind, context);
                return false;
            }
            attempts
        };

        let delay = Self::delay_for(action, attempts);
        info!(
            "Attempting recovery for {} (attempt {}/{}), waiting {:?}",
            kind,
            attempts + 1,
            action.max_retries,
            delay
        );
        tokio::time::sleep(delay).await;

        match (action.procedure)().await {
            Ok(()) => {
                self.retry_state.lock().insert(key, 0);
                info!("Recovery successful for {}", kind);
                true
            }
            Err(e) => {
                self.retry_state.lock().insert(key, attempts + 1);
                error!("Recovery failed for {}: {}", kind, e);
                false
            }
        }
    }

    /// Backoff before the attempt following `attempts` failures
    pub fn delay_for(action: &RecoveryAction, attempts: u32) -> Duration {
        action.delay_for(attempts)
    }

    /// Current counter for a key; 0 if never seen
    pub fn attempts(&self, kind: ErrorKind, context: &str) -> u32 {
        self.retry_state
            .lock()
            .get(&(kind, context.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Zero every counter, or only the counters of one kind
    pub fn reset_retry_counts(&self, kind: Option<ErrorKind>) {
        let mut state = self.retry_state.lock();
        match kind {
            None => state.clear(),
            Some(kind) => state
                .iter_mut()
                .filter(|((k, _), _)| *k == kind)
                .for_each(|(_, count)| *count = 0),
        }
    }

    /// Bind this manager to a call context for the retry combinators
    pub fn with_recovery<'a>(&'a self, context: &'a str) -> WithRecovery<'a> {
        WithRecovery::new(self, context)
    }
}
