//! Crunchbase v4 adapter
//!
//! `GET /autocompletes` resolves a company name to its UUID and entity type;
//! `GET /entities/{collection}/{uuid}` returns the detail document with the
//! cards requested for that entity type.

use super::{EntityDirectory, EntityType, ProviderError, ResolvedEntity};
use crate::secrets::{SecretCache, CRUNCHBASE_API_KEY};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: &str = "crunchbase";

const ORGANIZATION_CARDS: &str = "acquiree_acquisitions,acquirer_acquisitions,child_organizations,\
child_ownerships,event_appearances,fields,founders,headquarters_address,investors,ipos,jobs,\
key_employee_changes,layoffs,parent_organization,parent_ownership,participated_funding_rounds,\
participated_funds,participated_investments,press_references,raised_funding_rounds,raised_funds,\
raised_investments";

/// Endpoint and projections used to fetch one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailSpec {
    pub collection: &'static str,
    pub field_ids: Option<&'static str>,
    pub card_ids: Option<&'static str>,
}

impl EntityType {
    /// Detail endpoint for this type, `None` for types without one (e.g. jobs).
    pub fn detail_spec(&self) -> Option<DetailSpec> {
        let spec = match self {
            EntityType::Organization => DetailSpec {
                collection: "organizations",
                field_ids: None,
                card_ids: Some(ORGANIZATION_CARDS),
            },
            EntityType::Investment => DetailSpec {
                collection: "investments",
                field_ids: None,
                card_ids: Some("fields,funding_round,investor,organization,partner"),
            },
            EntityType::FundingRound => DetailSpec {
                collection: "funding_rounds",
                field_ids: Some("money_raised,updated_at,identifier"),
                card_ids: Some(
                    "fields,investments,investors,lead_investors,organization,partners,press_references",
                ),
            },
            EntityType::Fund => DetailSpec {
                collection: "funds",
                field_ids: None,
                card_ids: Some("fields,investors,owner,press_references"),
            },
            EntityType::Ipo => DetailSpec {
                collection: "ipos",
                field_ids: None,
                card_ids: Some("fields,organization,press_references"),
            },
            EntityType::Other(_) => return None,
        };
        Some(spec)
    }
}

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    entities: Vec<AutocompleteEntity>,
}

#[derive(Debug, Deserialize)]
struct AutocompleteEntity {
    identifier: Identifier,
}

#[derive(Debug, Deserialize)]
struct Identifier {
    uuid: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    entity_def_id: String,
}

pub struct CrunchbaseClient {
    base_url: String,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl CrunchbaseClient {
    pub fn new(base_url: impl Into<String>, secret_cache: Arc<SecretCache>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_cache,
            client: super::http_client(timeout),
        }
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, ProviderError> {
        let key = self
            .secret_cache
            .get_secret(CRUNCHBASE_API_KEY)
            .map_err(|_| ProviderError::MissingKey(CRUNCHBASE_API_KEY.to_string()))?;

        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("accept", "application/json")
            .header("X-cb-user-key", key.unsecure())
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                provider: PROVIDER,
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| ProviderError::Parse {
            provider: PROVIDER,
            message: e.without_url().to_string(),
        })
    }
}

#[async_trait]
impl EntityDirectory for CrunchbaseClient {
    async fn resolve(&self, name: &str) -> Result<Option<ResolvedEntity>, ProviderError> {
        let body = self
            .get_json(
                "/autocompletes",
                &[
                    ("query", name),
                    ("limit", "1"),
                    ("collection_ids", "organizations"),
                ],
            )
            .await?;

        let parsed: AutocompleteResponse =
            serde_json::from_value(body).map_err(|e| ProviderError::Parse {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        Ok(parsed.entities.into_iter().next().map(|e| ResolvedEntity {
            uuid: e.identifier.uuid,
            name: if e.identifier.value.is_empty() {
                name.to_string()
            } else {
                e.identifier.value
            },
            entity_type: EntityType::from_def_id(&e.identifier.entity_def_id),
        }))
    }

    async fn fetch_detail(&self, entity: &ResolvedEntity) -> Result<serde_json::Value, ProviderError> {
        let spec = entity
            .entity_type
            .detail_spec()
            .ok_or_else(|| ProviderError::Unsupported(entity.entity_type.to_string()))?;

        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(cards) = spec.card_ids {
            params.push(("card_ids", cards));
        }
        if let Some(fields) = spec.field_ids {
            params.push(("field_ids", fields));
        }

        let path = format!("/entities/{}/{}", spec.collection, entity.uuid);
        tracing::debug!(uuid = %entity.uuid, entity_type = %entity.entity_type, "Fetching entity detail");
        self.get_json(&path, &params).await
    }
}
