//! Structured company lookup
//!
//! Per entity: alias table, then name resolution, then the cache by UUID,
//! then the detail endpoint. Fresh profiles are written back to the cache.
//! Every per-entity result is a line of text; the joined results are
//! summarized against the sub-task.

use super::extract::EntityProfile;
use super::summarize::Summarizer;
use super::{normalize_entity_name, CapabilityOutcome};
use crate::db::{CachedRecord, EntityCacheRepository};
use crate::providers::{EntityDirectory, ResolvedEntity};
use std::sync::Arc;
use tracing::{debug, warn};

/// What a single entity lookup produced
#[derive(Debug, Clone, PartialEq)]
pub enum EntityLookup {
    Profile {
        name: String,
        profile: EntityProfile,
        from_cache: bool,
    },
    NoMatch,
    NoData,
}

impl EntityLookup {
    /// `"<requested name>: <data or reason>"`
    pub fn render(&self, requested: &str) -> String {
        match self {
            EntityLookup::Profile { profile, .. } => format!("{}: {}", requested, profile.render()),
            EntityLookup::NoMatch => format!("{}: No match found", requested),
            EntityLookup::NoData => format!("{}: No data found", requested),
        }
    }
}

pub struct CompanyLookup {
    directory: Arc<dyn EntityDirectory>,
    cache: EntityCacheRepository,
    summarizer: Arc<Summarizer>,
    write_back: bool,
}

impl CompanyLookup {
    pub fn new(
        directory: Arc<dyn EntityDirectory>,
        cache: EntityCacheRepository,
        summarizer: Arc<Summarizer>,
        write_back: bool,
    ) -> Self {
        Self {
            directory,
            cache,
            summarizer,
            write_back,
        }
    }

    pub async fn run(&self, company_names: &[String], sub_task: &str) -> CapabilityOutcome {
        let mut sections = Vec::with_capacity(company_names.len());
        let mut any_found = false;

        for name in company_names {
            let lookup = self.lookup_entity(name).await;
            any_found |= matches!(lookup, EntityLookup::Profile { .. });
            sections.push(lookup.render(name));
        }

        let joined = sections.join("\n\n");

        match self.summarizer.summarize(sub_task, &joined).await {
            Ok(summary) if any_found => CapabilityOutcome::Found(summary),
            Ok(summary) => CapabilityOutcome::Missing(summary),
            Err(e) => {
                warn!("Company data summarization failed: {}", e);
                CapabilityOutcome::Degraded(joined)
            }
        }
    }

    /// Look up one company. Never fails: provider and cache errors degrade to
    /// `NoMatch`/`NoData` and are logged.
    pub async fn lookup_entity(&self, name: &str) -> EntityLookup {
        let normalized = normalize_entity_name(name);

        // A known alias with a cached record needs no network at all
        match self.cache.resolve_alias(&normalized).await {
            Ok(Some(uuid)) => {
                if let Some(lookup) = self.cached_profile(&uuid).await {
                    debug!(entity = %normalized, %uuid, "Alias and cache hit");
                    return lookup;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Alias lookup failed for '{}': {:#}", normalized, e),
        }

        let entity = match self.directory.resolve(name).await {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                debug!(entity = %normalized, "No match from entity resolution");
                return EntityLookup::NoMatch;
            }
            Err(e) => {
                warn!("Entity resolution failed for '{}': {}", name, e);
                return EntityLookup::NoMatch;
            }
        };

        if let Some(lookup) = self.cached_profile(&entity.uuid).await {
            debug!(entity = %normalized, uuid = %entity.uuid, "Cache hit");
            self.remember_alias(&normalized, &entity.uuid).await;
            return lookup;
        }

        self.fetch_profile(&normalized, &entity).await
    }

    async fn cached_profile(&self, uuid: &str) -> Option<EntityLookup> {
        let record = match self.cache.get(uuid).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed for {}: {:#}", uuid, e);
                return None;
            }
        };

        match EntityProfile::from_cached(&record.document) {
            Some(profile) => Some(EntityLookup::Profile {
                name: record.name,
                profile,
                from_cache: true,
            }),
            None => {
                warn!("Cached document for {} has an unexpected shape; refetching", uuid);
                None
            }
        }
    }

    async fn fetch_profile(&self, normalized: &str, entity: &ResolvedEntity) -> EntityLookup {
        let detail = match self.directory.fetch_detail(entity).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!("Detail fetch failed for {} ({}): {}", entity.name, entity.uuid, e);
                return EntityLookup::NoData;
            }
        };

        let mut profile = EntityProfile::from_detail(&detail);
        if profile.is_empty() {
            return EntityLookup::NoData;
        }
        if profile.name.is_none() {
            profile.name = Some(entity.name.clone());
        }

        if self.write_back {
            let record = CachedRecord {
                uuid: entity.uuid.clone(),
                name: entity.name.clone(),
                entity_type: entity.entity_type.to_string(),
                document: profile.to_document(),
                fetched_at: chrono::Utc::now().timestamp(),
            };
            if let Err(e) = self.cache.put(&record).await {
                warn!("Cache write-back failed for {}: {:#}", entity.uuid, e);
            } else {
                self.remember_alias(normalized, &entity.uuid).await;
            }
        }

        EntityLookup::Profile {
            name: entity.name.clone(),
            profile,
            from_cache: false,
        }
    }

    async fn remember_alias(&self, normalized: &str, uuid: &str) {
        if let Err(e) = self.cache.record_alias(normalized, uuid).await {
            warn!("Failed to record alias '{}': {:#}", normalized, e);
        }
    }
}
