//! Job handler trait
//!
//! The queue holds a weak reference to a [`JobHandler`] and calls `handle` for every
//! job it runs. [`DerivationEngine`] is the production implementation.

use async_trait::async_trait;

use mediahub_core::{AppError, DerivationJob};
use mediahub_processing::DerivationEngine;

/// Runs one derivation job to completion.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &DerivationJob) -> Result<(), AppError>;
}

#[async_trait]
impl JobHandler for DerivationEngine {
    async fn handle(&self, job: &DerivationJob) -> Result<(), AppError> {
        let report = self.derive(job.asset_id).await?;
        if report.missing {
            tracing::info!(asset_id = %job.asset_id, "Asset deleted before derivation, skipping");
        } else if report.did_work() {
            tracing::info!(
                asset_id = %job.asset_id,
                optimized = report.optimized,
                conversions = report.conversions_written.len(),
                "Derivation finished"
            );
        }
        Ok(())
    }
}
