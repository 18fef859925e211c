/// Stored profile persistence
///
/// Person/company profiles imported ahead of time and looked up by exact
/// profile URL. The whole record is kept as JSON so list-valued fields
/// (experience, education, skills) keep whatever shape the source export had.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;

/// A stored profile. Accepts both snake_case and the camelCase keys used by
/// common profile exports (`profileUrl`, `extractedSkills`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileRecord {
    #[serde(alias = "profileUrl")]
    pub profile_url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub experience: Option<Value>,
    #[serde(default)]
    pub education: Option<Value>,
    #[serde(default)]
    pub skills: Option<Value>,
    #[serde(default, alias = "certifications")]
    pub certificates: Option<Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "extractedSkills")]
    pub extracted_skills: Option<Value>,
}

#[derive(Clone)]
pub struct ProfileRepository {
    pool: SqlitePool,
}

impl ProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Exact match on the stored profile URL.
    pub async fn find_by_url(&self, profile_url: &str) -> Result<Option<ProfileRecord>> {
        let data: Option<String> =
            sqlx::query_scalar("SELECT data FROM profiles WHERE profile_url = ?")
                .bind(profile_url)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch profile")?;

        data.map(|d| serde_json::from_str(&d).context("Stored profile is not valid JSON"))
            .transpose()
    }

    pub async fn upsert(&self, record: &ProfileRecord) -> Result<()> {
        let data = serde_json::to_string(record).context("Failed to encode profile")?;

        sqlx::query("INSERT OR REPLACE INTO profiles (profile_url, data, imported_at) VALUES (?, ?, ?)")
            .bind(&record.profile_url)
            .bind(data)
            .bind(super::now_secs())
            .execute(&self.pool)
            .await
            .context("Failed to store profile")?;

        Ok(())
    }

    /// Store a batch of profiles in one transaction. Records without a URL are
    /// skipped. Returns the number stored.
    pub async fn import(&self, records: &[ProfileRecord]) -> Result<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin profile import")?;
        let now = super::now_secs();
        let mut stored = 0;

        for record in records.iter().filter(|r| !r.profile_url.trim().is_empty()) {
            let data = serde_json::to_string(record).context("Failed to encode profile")?;
            sqlx::query(
                "INSERT OR REPLACE INTO profiles (profile_url, data, imported_at) VALUES (?, ?, ?)",
            )
            .bind(&record.profile_url)
            .bind(data)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to import profile {}", record.profile_url))?;
            stored += 1;
        }

        tx.commit().await.context("Failed to commit profile import")?;
        Ok(stored)
    }
}
