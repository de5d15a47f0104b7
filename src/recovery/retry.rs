//! Operation wrappers
//!
//! Combinators that run an async operation and, on failure, ask a
//! [`RecoveryManager`] whether a retry is worthwhile.

use crate::error::Result;
use crate::recovery::RecoveryManager;
use std::future::Future;
use tracing::debug;

/// Attempt budget for [`retry_bounded`] when callers have no opinion
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Run `op`; on failure consult recovery and, if it succeeded, run `op`
/// exactly once more and return that result as is.
pub async fn retry_once<T, F, Fut>(
    manager: &RecoveryManager,
    context: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(e) => {
            if manager.handle_error(&e, context).await {
                debug!("Retrying {} after recovery", context);
                op().await
            } else {
                Err(e)
            }
        }
    }
}

/// Run `op` up to `max_attempts` times.
///
/// Recovery is consulted after every failed attempt except the last. A
/// `false` from recovery ends the loop with that attempt's error. A budget of
/// zero is treated as one.
pub async fn retry_bounded<T, F, Fut>(
    manager: &RecoveryManager,
    context: &str,
    max_attempts: u32,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                if !manager.handle_error(&e, context).await {
                    return Err(e);
                }
                debug!("Retrying {} (attempt {}/{})", context, attempt + 1, max_attempts);
                attempt += 1;
            }
        }
    }
}

/// A manager bound to a call context
#[derive(Debug, Clone, Copy)]
pub struct WithRecovery<'a> {
    manager: &'a RecoveryManager,
    context: &'a str,
}

impl<'a> WithRecovery<'a> {
    /// Bind a manager to a context
    pub fn new(manager: &'a RecoveryManager, context: &'a str) -> Self {
        Self { manager, context }
    }

    /// The bound context
    pub fn context(&self) -> &str {
        self.context
    }

    /// See [`retry_once`]
    pub async fn once<T, F, Fut>(self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_once(self.manager, self.context, op).await
    }

    /// See [`retry_bounded`]
    pub async fn bounded<T, F, Fut>(self, max_attempts: u32, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_bounded(self.manager, self.context, max_attempts, op).await
    }
}
