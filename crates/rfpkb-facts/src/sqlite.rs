//! SQLite-backed attribute store.
//!
//! One row per attribute, scoped by `tenant_id`. `last_updated` is stored as
//! fixed-precision RFC 3339 text so the optimistic guard compares exactly.
//! `tenant_versions` counts committed writes per tenant.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use rfpkb_core::error::{Error, Result};
use rfpkb_core::traits::AttributeStore;
use rfpkb_core::types::{Attribute, Snapshot, TenantId, WritePlan};

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS attributes (
        id TEXT PRIMARY KEY NOT NULL,
        tenant_id TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        category TEXT NOT NULL,
        source_document_id TEXT,
        last_updated TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attributes_tenant ON attributes(tenant_id)",
    r#"
    CREATE TABLE IF NOT EXISTS tenant_versions (
        tenant_id TEXT PRIMARY KEY NOT NULL,
        version INTEGER NOT NULL
    )
    "#,
];

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct SqliteFactStore {
    pool: SqlitePool,
}

/// Check `expected` against the tenant's version and bump it, inside `tx`.
/// Returns false when another write got there first.
async fn bump_version(tx: &mut Transaction<'_, Sqlite>, tenant: &TenantId, expected: Option<u64>) -> Result<bool> {
    sqlx::query("INSERT INTO tenant_versions (tenant_id, version) VALUES (?, 0) ON CONFLICT(tenant_id) DO NOTHING")
        .bind(tenant.as_str())
        .execute(&mut **tx)
        .await
        .map_err(Error::persistence)?;
    let result = match expected {
        Some(version) => {
            sqlx::query("UPDATE tenant_versions SET version = version + 1 WHERE tenant_id = ? AND version = ?")
                .bind(tenant.as_str())
                .bind(version as i64)
                .execute(&mut **tx)
                .await
        }
        None => {
            sqlx::query("UPDATE tenant_versions SET version = version + 1 WHERE tenant_id = ?")
                .bind(tenant.as_str())
                .execute(&mut **tx)
                .await
        }
    }
    .map_err(Error::persistence)?;
    Ok(result.rows_affected() == 1)
}

impl SqliteFactStore {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(Error::persistence)?;
            }
        }
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(Error::persistence)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(Error::persistence)?;
        info!(path = %path.display(), "opened fact store");
        Self::with_pool(pool).await
    }

    /// Private in-memory database; one connection so every query sees it.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(Error::persistence)?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.map_err(Error::persistence)?;
        }
        Ok(Self { pool })
    }

    fn row_to_attribute(tenant: &TenantId, row: &SqliteRow) -> Result<Attribute> {
        let raw: String = row.try_get("last_updated").map_err(Error::persistence)?;
        let last_updated = DateTime::parse_from_rfc3339(&raw).map_err(Error::persistence)?.with_timezone(&Utc);
        Ok(Attribute {
            id: row.try_get("id").map_err(Error::persistence)?,
            tenant_id: tenant.clone(),
            key: row.try_get("key").map_err(Error::persistence)?,
            value: row.try_get("value").map_err(Error::persistence)?,
            category: row.try_get("category").map_err(Error::persistence)?,
            source_document_id: row.try_get("source_document_id").map_err(Error::persistence)?,
            last_updated,
        })
    }
}

#[async_trait]
impl AttributeStore for SqliteFactStore {
    /// Attributes in insertion order, read in one transaction with the
    /// tenant version.
    async fn snapshot(&self, tenant: &TenantId) -> Result<Snapshot> {
        let mut tx = self.pool.begin().await.map_err(Error::persistence)?;
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM tenant_versions WHERE tenant_id = ?")
            .bind(tenant.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::persistence)?;
        let rows = sqlx::query(
            r#"
            SELECT id, key, value, category, source_document_id, last_updated
            FROM attributes WHERE tenant_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(tenant.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::persistence)?;
        tx.commit().await.map_err(Error::persistence)?;
        let attributes = rows.iter().map(|row| Self::row_to_attribute(tenant, row)).collect::<Result<Vec<_>>>()?;
        Ok(Snapshot { attributes, version: version.unwrap_or(0).max(0) as u64 })
    }

    async fn apply(&self, tenant: &TenantId, plan: &WritePlan) -> Result<()> {
        if plan.is_empty() {
            return Ok(());
        }
        let now = timestamp(&Utc::now());
        let mut tx = self.pool.begin().await.map_err(Error::persistence)?;

        if !bump_version(&mut tx, tenant, plan.base_version).await? {
            tx.rollback().await.map_err(Error::persistence)?;
            return Err(Error::StaleWrite(format!("tenant {}", tenant)));
        }

        for attr in &plan.inserts {
            sqlx::query(
                r#"
                INSERT INTO attributes (id, tenant_id, key, value, category, source_document_id, last_updated)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(tenant.as_str())
            .bind(&attr.key)
            .bind(&attr.value)
            .bind(&attr.category)
            .bind(&attr.source_document_id)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(Error::persistence)?;
        }

        for update in &plan.updates {
            let result = sqlx::query(
                r#"
                UPDATE attributes
                SET value = ?, source_document_id = COALESCE(?, source_document_id), last_updated = ?
                WHERE id = ? AND tenant_id = ? AND last_updated = ?
                "#,
            )
            .bind(&update.value)
            .bind(&update.source_document_id)
            .bind(&now)
            .bind(&update.id)
            .bind(tenant.as_str())
            .bind(timestamp(&update.observed_last_updated))
            .execute(&mut *tx)
            .await
            .map_err(Error::persistence)?;
            if result.rows_affected() == 0 {
                tx.rollback().await.map_err(Error::persistence)?;
                return Err(Error::StaleWrite(format!("attribute {}", update.id)));
            }
        }

        tx.commit().await.map_err(Error::persistence)?;
        debug!(tenant = %tenant, updates = plan.updates.len(), inserts = plan.inserts.len(), "applied write plan");
        Ok(())
    }

    async fn clear(&self, tenant: &TenantId) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(Error::persistence)?;
        let result = sqlx::query("DELETE FROM attributes WHERE tenant_id = ?")
            .bind(tenant.as_str())
            .execute(&mut *tx)
            .await
            .map_err(Error::persistence)?;
        bump_version(&mut tx, tenant, None).await?;
        tx.commit().await.map_err(Error::persistence)?;
        Ok(result.rows_affected() as usize)
    }
}
