//! MediaHub Worker
//!
//! In-process queue running derivation jobs on a bounded worker pool.

pub mod context;
pub mod queue;

pub use context::JobHandler;
pub use queue::{DerivationQueue, QueueConfig, MAX_RETRY_BACKOFF_SECS};
