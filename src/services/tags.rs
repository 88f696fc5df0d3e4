//! Tags (v2 only).

use std::sync::Arc;

use serde_json::json;

use super::{check_batch_errors, first_in, list_of, require_v2};
use crate::api::{ApiVersion, Endpoints, TickTickClient};
use crate::domain::{NewTag, Tag, TagPatch};
use crate::error::{Result, TickTickError};

const FEATURE: &str = "Tags";

#[derive(Debug, Clone)]
pub struct TagService {
    client: Arc<TickTickClient>,
}

impl TagService {
    pub fn new(client: Arc<TickTickClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Tag>> {
        require_v2(&self.client, FEATURE)?;
        let sync = self.client.sync(0).await?;
        list_of(sync.get("tags").cloned().unwrap_or_default())
    }

    /// Find a tag by name or label, case-insensitively.
    pub async fn find(&self, name: &str) -> Result<Option<Tag>> {
        let wanted = name.trim().trim_start_matches('#');
        Ok(self.list().await?.into_iter().find(|t| {
            t.name.eq_ignore_ascii_case(wanted)
                || t.label.as_deref().is_some_and(|l| l.eq_ignore_ascii_case(wanted))
        }))
    }

    async fn require(&self, name: &str) -> Result<Tag> {
        self.find(name)
            .await?
            .ok_or_else(|| TickTickError::NotFound(format!("Tag '{}' not found", name)))
    }

    pub async fn create(&self, new_tag: &NewTag) -> Result<Tag> {
        require_v2(&self.client, FEATURE)?;
        let payload = new_tag.to_payload()?;
        let response = self
            .client
            .post(ApiVersion::V2, Endpoints::batch_tag(), &json!({ "add": [payload] }))
            .await?;
        check_batch_errors(&response)?;
        match first_in(&response, "add") {
            Some(tag) => Ok(tag),
            None => self.require(&new_tag.name).await,
        }
    }

    pub async fn update(&self, name: &str, patch: &TagPatch) -> Result<Tag> {
        require_v2(&self.client, FEATURE)?;
        if patch.is_empty() {
            return Err(TickTickError::Validation("no fields to update".to_string()));
        }
        let existing = self.require(name).await?;
        let response = self
            .client
            .post(
                ApiVersion::V2,
                Endpoints::batch_tag(),
                &json!({ "update": [patch.to_payload(&existing.name)] }),
            )
            .await?;
        check_batch_errors(&response)?;
        match first_in(&response, "update") {
            Some(tag) => Ok(tag),
            None => self.require(&existing.name).await,
        }
    }

    /// Rename a tag everywhere it is used.
    pub async fn rename(&self, name: &str, new_name: &str) -> Result<Tag> {
        require_v2(&self.client, FEATURE)?;
        let new_name = new_name.trim().trim_start_matches('#');
        if new_name.is_empty() {
            return Err(TickTickError::Validation("new tag name is required".to_string()));
        }
        self.client
            .put(
                ApiVersion::V2,
                Endpoints::tag_rename(),
                &json!({ "name": name.to_lowercase(), "newName": new_name }),
            )
            .await?;
        log::info!("Renamed tag {} to {}", name, new_name);
        self.require(new_name).await
    }

    /// Merge `sources` into `target`, creating the target first if needed.
    pub async fn merge(&self, sources: &[String], target: &str) -> Result<Tag> {
        require_v2(&self.client, FEATURE)?;
        let sources: Vec<String> = sources
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(target))
            .collect();
        if sources.is_empty() {
            return Err(TickTickError::Validation("no source tags to merge".to_string()));
        }
        if self.find(target).await?.is_none() {
            self.create(&NewTag {
                name: target.to_string(),
                ..Default::default()
            })
            .await?;
        }
        self.client
            .put(
                ApiVersion::V2,
                Endpoints::tag_merge(),
                &json!({ "sourceTags": sources, "targetTag": target.to_lowercase() }),
            )
            .await?;
        self.require(target).await
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        require_v2(&self.client, FEATURE)?;
        self.client
            .delete_query(ApiVersion::V2, Endpoints::tag(), &[("name", name.to_lowercase())])
            .await?;
        Ok(())
    }
}
