use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use rfpkb_core::error::{Error, Result};
use rfpkb_core::traits::AttributeStore;
use rfpkb_core::types::{Attribute, Snapshot, TenantId, WritePlan};

/// In-process attribute store with the same guard semantics as SQLite.
#[derive(Default)]
pub struct MemoryFactStore {
    tenants: Mutex<HashMap<TenantId, Snapshot>>,
}

impl MemoryFactStore {
    pub fn new() -> Self { Self::default() }

    /// Seed rows as-is, keeping their ids and timestamps.
    pub async fn seed(&self, attributes: Vec<Attribute>) {
        let mut tenants = self.tenants.lock().await;
        for attr in attributes {
            let entry = tenants.entry(attr.tenant_id.clone()).or_default();
            entry.attributes.push(attr);
            entry.version += 1;
        }
    }
}

#[async_trait]
impl AttributeStore for MemoryFactStore {
    async fn snapshot(&self, tenant: &TenantId) -> Result<Snapshot> {
        Ok(self.tenants.lock().await.get(tenant).cloned().unwrap_or_default())
    }

    async fn apply(&self, tenant: &TenantId, plan: &WritePlan) -> Result<()> {
        if plan.is_empty() {
            return Ok(());
        }
        let mut tenants = self.tenants.lock().await;
        let mut staged = tenants.get(tenant).cloned().unwrap_or_default();
        if plan.base_version.is_some_and(|v| v != staged.version) {
            return Err(Error::StaleWrite(format!("tenant {}", tenant)));
        }
        let now = Utc::now();
        for update in &plan.updates {
            let row = staged
                .attributes
                .iter_mut()
                .find(|a| a.id == update.id && a.last_updated == update.observed_last_updated)
                .ok_or_else(|| Error::StaleWrite(format!("attribute {}", update.id)))?;
            row.value = update.value.clone();
            if update.source_document_id.is_some() {
                row.source_document_id = update.source_document_id.clone();
            }
            row.last_updated = now;
        }
        for attr in &plan.inserts {
            staged.attributes.push(Attribute {
                id: uuid::Uuid::new_v4().to_string(),
                tenant_id: tenant.clone(),
                key: attr.key.clone(),
                value: attr.value.clone(),
                category: attr.category.clone(),
                source_document_id: attr.source_document_id.clone(),
                last_updated: now,
            });
        }
        staged.version += 1;
        tenants.insert(tenant.clone(), staged);
        Ok(())
    }

    async fn clear(&self, tenant: &TenantId) -> Result<usize> {
        let mut tenants = self.tenants.lock().await;
        let entry = tenants.entry(tenant.clone()).or_default();
        let removed = std::mem::take(&mut entry.attributes).len();
        entry.version += 1;
        Ok(removed)
    }
}
