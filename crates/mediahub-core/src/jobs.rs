//! Derivation job contract
//!
//! Ingestion enqueues one derivation job per asset through a [`DerivationDispatcher`].
//! The dispatcher implementation (an in-process queue, an external broker...) owns
//! delivery; the core only relies on at-least-once execution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Request to optimize an asset's original and render its conversions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationJob {
    pub asset_id: Uuid,
    /// Name of the queue the job should run on
    pub queue: String,
}

impl DerivationJob {
    pub fn new(asset_id: Uuid, queue: impl Into<String>) -> Self {
        Self {
            asset_id,
            queue: queue.into(),
        }
    }
}

#[async_trait]
pub trait DerivationDispatcher: Send + Sync {
    /// Schedule the job; returns once it is accepted, not when it has run.
    async fn dispatch(&self, job: DerivationJob) -> Result<(), AppError>;
}

/// Dispatcher that drops every job, for hosts that trigger derivation themselves.
pub struct NoOpDispatcher;

#[async_trait]
impl DerivationDispatcher for NoOpDispatcher {
    async fn dispatch(&self, job: DerivationJob) -> Result<(), AppError> {
        tracing::debug!(asset_id = %job.asset_id, queue = %job.queue, "Derivation job dropped");
        Ok(())
    }
}
