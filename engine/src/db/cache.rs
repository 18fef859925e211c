/// Entity cache persistence
///
/// Write-through cache of structured company data keyed by the immutable
/// provider-assigned UUID, plus the alias table mapping normalized names to
/// UUIDs. Records never expire. Concurrent writers may both populate the same
/// UUID; `INSERT OR REPLACE` keeps the last one.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// One cached entity snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedRecord {
    pub uuid: String,
    pub name: String,
    pub entity_type: String,
    /// JSON object whose keys are profile field names
    pub document: serde_json::Value,
    pub fetched_at: i64,
}

#[derive(Clone)]
pub struct EntityCacheRepository {
    pool: SqlitePool,
}

impl EntityCacheRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, uuid: &str) -> Result<Option<CachedRecord>> {
        let row = sqlx::query(
            "SELECT uuid, name, entity_type, document, fetched_at FROM entity_cache WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch cached entity")?;

        row.map(|r| -> Result<CachedRecord> {
            let document: String = r.get("document");
            Ok(CachedRecord {
                uuid: r.get("uuid"),
                name: r.get("name"),
                entity_type: r.get("entity_type"),
                document: serde_json::from_str(&document)
                    .context("Cached entity document is not valid JSON")?,
                fetched_at: r.get("fetched_at"),
            })
        })
        .transpose()
    }

    pub async fn exists(&self, uuid: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entity_cache WHERE uuid = ?")
            .bind(uuid)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check cached entity")?;

        Ok(count > 0)
    }

    pub async fn put(&self, record: &CachedRecord) -> Result<()> {
        let document =
            serde_json::to_string(&record.document).context("Failed to encode entity document")?;

        sqlx::query(
            "INSERT OR REPLACE INTO entity_cache (uuid, name, entity_type, document, fetched_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.uuid)
        .bind(&record.name)
        .bind(&record.entity_type)
        .bind(document)
        .bind(record.fetched_at)
        .execute(&self.pool)
        .await
        .context("Failed to store cached entity")?;

        Ok(())
    }

    /// UUID previously resolved for a normalized entity name.
    pub async fn resolve_alias(&self, normalized_name: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT uuid FROM entity_aliases WHERE normalized_name = ?")
            .bind(normalized_name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to resolve entity alias")
    }

    pub async fn record_alias(&self, normalized_name: &str, uuid: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO entity_aliases (normalized_name, uuid, created_at) VALUES (?, ?, ?)",
        )
        .bind(normalized_name)
        .bind(uuid)
        .bind(super::now_secs())
        .execute(&self.pool)
        .await
        .context("Failed to record entity alias")?;

        Ok(())
    }
}
