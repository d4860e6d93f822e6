//! Work queue plumbing for the relay agent
//!
//! This crate defines the queue contract a relay worker consumes
//! (`WorkQueue`) and an AWS SQS implementation of it.

#![deny(clippy::all, clippy::pedantic, clippy::nursery, missing_docs)]

/// Error types for queue operations
pub mod error;
/// SQS-backed work queue
pub mod sqs_queue;
/// Common types for queue operations
pub mod types;

pub use error::{QueueError, QueueResult};
pub use sqs_queue::SqsWorkQueue;
pub use types::{BrokerSettings, Delivery, QueueEvent, ReplyRoute, WorkQueue};
