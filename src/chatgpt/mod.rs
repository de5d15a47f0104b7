//! ChatGPT web app automation
//!
//! [`ChatGptController`] drives one page of the app. Its operations are
//! wrapped by the recovery manager and report read failures softly.

pub mod batch;
pub mod controller;
pub mod conversations;
pub mod export;
pub mod response;
pub mod selectors;

pub use batch::{BatchOperation, BatchReport, OperationOutcome, BATCH_OPERATIONS};
pub use controller::{ChatGptController, Status, DEFAULT_RESPONSE_WAIT};
pub use conversations::{ConversationRef, ConversationSummary};
pub use export::ExportFormat;
pub use response::{Message, Role};
