//! Focus (pomodoro / stopwatch) records and settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::task::{format_ticktick_date, parse_ticktick_date};
use crate::error::{Result, TickTickError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusRecord {
    #[serde(default)]
    pub id: String,
    /// Seconds of focus
    #[serde(default)]
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FocusRecord {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start_time.as_deref().and_then(parse_ticktick_date)
    }
}

/// Pomodoro timer settings; the whole object round-trips through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomoSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pomo_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_break: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_break: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_break_interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_pomo_target: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A completed focus session to record after the fact.
#[derive(Debug, Clone)]
pub struct NewFocusRecord {
    pub duration_secs: i64,
    pub focus_type: String,
    pub start_time: DateTime<Utc>,
    pub task_id: Option<String>,
    pub project_id: Option<String>,
    pub note: Option<String>,
}

impl NewFocusRecord {
    pub fn to_payload(&self) -> Result<Value> {
        if self.duration_secs <= 0 {
            return Err(TickTickError::Validation(
                "duration must be positive".to_string(),
            ));
        }
        let end = self.start_time + chrono::Duration::seconds(self.duration_secs);
        let mut payload = Map::new();
        payload.insert("duration".to_string(), json!(self.duration_secs));
        payload.insert("focusType".to_string(), json!(self.focus_type));
        payload.insert(
            "startTime".to_string(),
            json!(format_ticktick_date(&self.start_time)),
        );
        payload.insert("endTime".to_string(), json!(format_ticktick_date(&end)));
        if let Some(task) = &self.task_id {
            payload.insert("taskId".to_string(), json!(task));
        }
        if let Some(project) = &self.project_id {
            payload.insert("projectId".to_string(), json!(project));
        }
        if let Some(note) = &self.note {
            payload.insert("note".to_string(), json!(note));
        }
        Ok(Value::Object(payload))
    }
}
