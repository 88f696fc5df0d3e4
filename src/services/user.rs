//! Account information (v2 only).

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::require_v2;
use crate::api::{ApiVersion, Endpoints, TickTickClient};
use crate::error::{Result, TickTickError};

const FEATURE: &str = "User profile";

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserProfile {
    pub user_id: Option<String>,
    pub inbox_id: Option<String>,
    pub time_zone: Option<String>,
    pub project_count: usize,
    pub tag_count: usize,
}

#[derive(Debug, Clone)]
pub struct UserService {
    client: Arc<TickTickClient>,
}

impl UserService {
    pub fn new(client: Arc<TickTickClient>) -> Self {
        Self { client }
    }

    pub async fn profile(&self) -> Result<UserProfile> {
        require_v2(&self.client, FEATURE)?;
        let sync = self.client.sync(0).await?;
        let count = |key: &str| sync.get(key).and_then(Value::as_array).map_or(0, Vec::len);
        let time_zone = self.timezone().await.unwrap_or_else(|e| {
            log::debug!("No settings for profile: {}", e);
            None
        });
        Ok(UserProfile {
            user_id: self.client.user_id(),
            inbox_id: self.client.inbox_id(),
            time_zone,
            project_count: count("projectProfiles"),
            tag_count: count("tags"),
        })
    }

    /// The inbox project id, from the session or a sync.
    pub async fn inbox_id(&self) -> Result<String> {
        if let Some(inbox) = self.client.inbox_id() {
            return Ok(inbox);
        }
        require_v2(&self.client, "Inbox lookup")?;
        self.client.sync(0).await?;
        self.client
            .inbox_id()
            .ok_or_else(|| TickTickError::NotFound("inbox id not present in sync data".to_string()))
    }

    pub async fn settings(&self) -> Result<Value> {
        require_v2(&self.client, FEATURE)?;
        self.client.get(ApiVersion::V2, Endpoints::user_settings()).await
    }

    /// The account's IANA time zone, when one is set.
    pub async fn timezone(&self) -> Result<Option<String>> {
        Ok(self
            .settings()
            .await?
            .get("timeZone")
            .and_then(Value::as_str)
            .filter(|tz| !tz.is_empty())
            .map(str::to_string))
    }

    /// Post the given keys; TickTick keeps the ones not sent. Returns the
    /// settings as they stand afterwards.
    pub async fn update_settings(&self, changes: &Map<String, Value>) -> Result<Value> {
        require_v2(&self.client, FEATURE)?;
        if changes.is_empty() {
            return Err(TickTickError::Validation("No settings to update".to_string()));
        }
        let response = self
            .client
            .post(ApiVersion::V2, Endpoints::user_settings(), &Value::Object(changes.clone()))
            .await?;
        if response.get("success").is_some() {
            return self.settings().await;
        }
        Ok(response)
    }
}
