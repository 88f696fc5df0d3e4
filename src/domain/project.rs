//! Projects (lists), folders and project data bundles.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::task::Task;
use crate::error::{Result, TickTickError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    pub fn is_archived(&self) -> bool {
        self.closed.unwrap_or(false)
    }
}

/// A project group ("folder") from the v2 sync payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET /project/{id}/data`: the project with its open tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(default)]
    pub project: Option<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub columns: Vec<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub color: Option<String>,
    pub view_mode: Option<String>,
    pub kind: Option<String>,
    pub group_id: Option<String>,
}

impl NewProject {
    pub fn to_payload(&self) -> Result<Value> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TickTickError::Validation("project name is required".to_string()));
        }
        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(name));
        if let Some(color) = &self.color {
            payload.insert("color".to_string(), json!(color));
        }
        payload.insert(
            "viewMode".to_string(),
            json!(self.view_mode.as_deref().unwrap_or("list")),
        );
        payload.insert(
            "kind".to_string(),
            json!(self.kind.as_deref().unwrap_or("TASK")),
        );
        if let Some(group) = &self.group_id {
            payload.insert("groupId".to_string(), json!(group));
        }
        Ok(Value::Object(payload))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub view_mode: Option<String>,
    pub group_id: Option<String>,
    pub sort_order: Option<i64>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.color.is_none()
            && self.view_mode.is_none()
            && self.group_id.is_none()
            && self.sort_order.is_none()
    }

    /// Changed fields in wire form, keyed by `id` for batch updates.
    pub fn to_payload(&self, project_id: &str) -> Result<Value> {
        let mut payload = Map::new();
        payload.insert("id".to_string(), json!(project_id));
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(TickTickError::Validation(
                    "project name cannot be empty".to_string(),
                ));
            }
            payload.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(color) = &self.color {
            payload.insert("color".to_string(), json!(color));
        }
        if let Some(mode) = &self.view_mode {
            payload.insert("viewMode".to_string(), json!(mode));
        }
        if let Some(group) = &self.group_id {
            let value = if group.is_empty() { Value::Null } else { json!(group) };
            payload.insert("groupId".to_string(), value);
        }
        if let Some(order) = self.sort_order {
            payload.insert("sortOrder".to_string(), json!(order));
        }
        Ok(Value::Object(payload))
    }
}
