//! Error recovery core
//!
//! Failures are classified into an [`ErrorKind`], matched to a registered
//! [`RecoveryAction`], and remediated with backoff by a [`RecoveryManager`].
//! The [`retry_once`] and [`retry_bounded`] combinators tie the manager to
//! individual browser operations.

pub mod classify;
pub mod manager;
pub mod registry;
pub mod retry;
pub mod strategies;

pub use classify::{classify, classify_message, ErrorKind};
pub use manager::RecoveryManager;
pub use registry::{RecoveryAction, RecoveryProcedure, RecoveryRegistry};
pub use retry::{retry_bounded, retry_once, WithRecovery, DEFAULT_MAX_ATTEMPTS};
pub use strategies::register_default_strategies;
