use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use rfpkb_core::error::{Error, Result};
use rfpkb_core::traits::AttributeStore;
use rfpkb_core::types::{NewAttribute, TenantId};

use crate::resolver::{ConflictResolver, ResolutionReport, ResolutionStats};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResyncSummary {
    pub removed: usize,
    pub batches_applied: usize,
    pub batches_failed: usize,
    pub stats: ResolutionStats,
}

/// Applies extracted attributes to the fact store.
///
/// Each batch is resolved against a fresh snapshot and written in one
/// transaction guarded by the snapshot's tenant version. Any concurrent write
/// to the tenant invalidates the guard and the batch is recomputed, so
/// batches apply in some serial order while no lock is held during judging.
pub struct KnowledgeWriter {
    store: Arc<dyn AttributeStore>,
    resolver: ConflictResolver,
}

impl KnowledgeWriter {
    pub fn new(store: Arc<dyn AttributeStore>, resolver: ConflictResolver) -> Self {
        Self { store, resolver }
    }

    pub async fn ingest(&self, tenant: &TenantId, batch: &[NewAttribute]) -> Result<ResolutionReport> {
        if batch.is_empty() {
            return Ok(ResolutionReport::default());
        }
        let max_attempts = self.resolver.settings().max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let snapshot = self.store.snapshot(tenant).await?;
            let mut report = self.resolver.resolve(&snapshot.attributes, batch).await;
            report.plan.base_version = Some(snapshot.version);
            match self.store.apply(tenant, &report.plan).await {
                Ok(()) => return Ok(report),
                Err(Error::StaleWrite(what)) if attempt < max_attempts => {
                    warn!(tenant = %tenant, stale = %what, attempt, "tenant changed underneath batch, recomputing");
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::Operation(format!("attribute batch for {} not applied after {} attempts", tenant, max_attempts)))
    }

    /// Rebuild a tenant's attributes from per-document batches, in order.
    /// A batch that fails is logged and skipped.
    pub async fn resync(&self, tenant: &TenantId, batches: &[Vec<NewAttribute>]) -> Result<ResyncSummary> {
        let mut summary = ResyncSummary { removed: self.store.clear(tenant).await?, ..Default::default() };
        for (index, batch) in batches.iter().enumerate() {
            match self.ingest(tenant, batch).await {
                Ok(report) => {
                    summary.batches_applied += 1;
                    let s = &mut summary.stats;
                    s.kept_existing += report.stats.kept_existing;
                    s.kept_new += report.stats.kept_new;
                    s.merged += report.stats.merged;
                    s.total_conflicts += report.stats.total_conflicts;
                    s.inserted += report.stats.inserted;
                }
                Err(e) => {
                    warn!(tenant = %tenant, batch = index, error = %e, "resync batch failed, skipping");
                    summary.batches_failed += 1;
                }
            }
        }
        info!(tenant = %tenant, removed = summary.removed, applied = summary.batches_applied, failed = summary.batches_failed, "resync complete");
        Ok(summary)
    }

    pub async fn clear(&self, tenant: &TenantId) -> Result<usize> {
        self.store.clear(tenant).await
    }
}
