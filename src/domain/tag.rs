//! Tags. TickTick identifies a tag by its lowercase `name`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Result, TickTickError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tag {
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTag {
    pub name: String,
    pub color: Option<String>,
    pub parent: Option<String>,
}

impl NewTag {
    pub fn to_payload(&self) -> Result<Value> {
        let label = self.name.trim().trim_start_matches('#');
        if label.is_empty() {
            return Err(TickTickError::Validation("tag name is required".to_string()));
        }
        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(label.to_lowercase()));
        payload.insert("label".to_string(), json!(label));
        if let Some(color) = &self.color {
            payload.insert("color".to_string(), json!(color));
        }
        if let Some(parent) = &self.parent {
            payload.insert("parent".to_string(), json!(parent.to_lowercase()));
        }
        Ok(Value::Object(payload))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TagPatch {
    pub label: Option<String>,
    pub color: Option<String>,
    /// Empty string moves the tag to the top level
    pub parent: Option<String>,
    pub sort_order: Option<i64>,
}

impl TagPatch {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.color.is_none() && self.parent.is_none() && self.sort_order.is_none()
    }

    pub fn to_payload(&self, name: &str) -> Value {
        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(name.to_lowercase()));
        if let Some(label) = &self.label {
            payload.insert("label".to_string(), json!(label));
        }
        if let Some(color) = &self.color {
            payload.insert("color".to_string(), json!(color));
        }
        if let Some(parent) = &self.parent {
            let value = if parent.is_empty() {
                Value::Null
            } else {
                json!(parent.to_lowercase())
            };
            payload.insert("parent".to_string(), value);
        }
        if let Some(order) = self.sort_order {
            payload.insert("sortOrder".to_string(), json!(order));
        }
        Value::Object(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tag_payload_lowercases_name() {
        let payload = NewTag {
            name: "#DeepWork".to_string(),
            color: None,
            parent: Some("Work".to_string()),
        }
        .to_payload()
        .unwrap();
        assert_eq!(payload["name"], "deepwork");
        assert_eq!(payload["label"], "DeepWork");
        assert_eq!(payload["parent"], "work");
    }

    #[test]
    fn test_display_name() {
        let tag: Tag = serde_json::from_value(json!({"name": "work", "label": "Work"})).unwrap();
        assert_eq!(tag.display_name(), "Work");
    }

    #[test]
    fn test_tag_patch_clears_parent() {
        let patch = TagPatch {
            parent: Some(String::new()),
            color: Some("#ff0000".to_string()),
            ..Default::default()
        };
        let payload = patch.to_payload("Work");
        assert_eq!(payload["name"], "work");
        assert!(payload["parent"].is_null());
        assert!(payload.get("label").is_none());
    }
}
