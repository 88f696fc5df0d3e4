//! Tasks, checklist items, priorities and TickTick date handling.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Result, TickTickError};

/// Task priority as TickTick encodes it: 0, 1, 3, 5.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::None, Priority::Low, Priority::Medium, Priority::High];

    pub fn value(self) -> i64 {
        match self {
            Priority::None => 0,
            Priority::Low => 1,
            Priority::Medium => 3,
            Priority::High => 5,
        }
    }

    /// Map a raw wire value; anything between levels rounds down.
    pub fn from_value(value: i64) -> Self {
        match value {
            v if v >= 5 => Priority::High,
            v if v >= 3 => Priority::Medium,
            v if v >= 1 => Priority::Low,
            _ => Priority::None,
        }
    }

    /// Accepts `high`/`medium`/`low`/`none` (any case) or the numeric value.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        match trimmed.to_lowercase().as_str() {
            "none" | "" => Some(Priority::None),
            "low" => Some(Priority::Low),
            "medium" | "med" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            other => other.parse::<i64>().ok().and_then(|v| match v {
                0 => Some(Priority::None),
                1 => Some(Priority::Low),
                3 => Some(Priority::Medium),
                5 => Some(Priority::High),
                _ => None,
            }),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::None => "None",
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

/// Task status values used on the wire.
pub struct TaskStatus;

impl TaskStatus {
    pub const OPEN: i64 = 0;
    pub const COMPLETED: i64 = 2;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A TickTick task. Unknown fields are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_all_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ChecklistItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_flag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    pub fn priority_level(&self) -> Priority {
        Priority::from_value(self.priority)
    }

    pub fn is_completed(&self) -> bool {
        self.status >= TaskStatus::COMPLETED
    }

    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_date.as_deref().and_then(parse_ticktick_date)
    }

    pub fn start_at(&self) -> Option<DateTime<Utc>> {
        self.start_date.as_deref().and_then(parse_ticktick_date)
    }

    /// Due date, falling back to the start date, as a calendar day.
    pub fn due_day(&self) -> Option<NaiveDate> {
        self.due_at().or_else(|| self.start_at()).map(|d| d.date_naive())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Parse the date formats TickTick emits or accepts.
///
/// `2026-01-02T03:04:05.000+0000`, RFC 3339, `2026-01-02T03:04:05` (UTC) and
/// bare `2026-01-02` (midnight UTC).
pub fn parse_ticktick_date(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Render a timestamp in TickTick's wire format.
pub fn format_ticktick_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3f+0000").to_string()
}

/// Validate a user-supplied date and convert it to wire format.
pub fn normalize_date_input(field: &str, input: &str) -> Result<String> {
    parse_ticktick_date(input)
        .map(|dt| format_ticktick_date(&dt))
        .ok_or_else(|| {
            TickTickError::Validation(format!(
                "{} '{}' is not a valid date (use YYYY-MM-DD or ISO 8601)",
                field, input
            ))
        })
}

/// Fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub project_id: Option<String>,
    pub content: Option<String>,
    pub desc: Option<String>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub is_all_day: Option<bool>,
    pub time_zone: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    /// Checklist item titles
    pub items: Vec<String>,
    pub reminders: Vec<String>,
    pub repeat_flag: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn to_payload(&self) -> Result<Value> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(TickTickError::Validation("title is required".to_string()));
        }

        let mut payload = Map::new();
        payload.insert("title".to_string(), json!(title));
        if let Some(project_id) = self.project_id.as_deref().filter(|p| !p.is_empty()) {
            payload.insert("projectId".to_string(), json!(project_id));
        }
        if let Some(content) = &self.content {
            payload.insert("content".to_string(), json!(content));
        }
        if let Some(desc) = &self.desc {
            payload.insert("desc".to_string(), json!(desc));
        }
        if let Some(start) = &self.start_date {
            payload.insert(
                "startDate".to_string(),
                json!(normalize_date_input("start_date", start)?),
            );
        }
        if let Some(due) = &self.due_date {
            payload.insert(
                "dueDate".to_string(),
                json!(normalize_date_input("due_date", due)?),
            );
        }
        if let Some(all_day) = self.is_all_day {
            payload.insert("isAllDay".to_string(), json!(all_day));
        }
        if let Some(tz) = &self.time_zone {
            payload.insert("timeZone".to_string(), json!(tz));
        }
        if let Some(priority) = self.priority {
            payload.insert("priority".to_string(), json!(priority.value()));
        }
        let tags = clean_tags(&self.tags);
        if !tags.is_empty() {
            payload.insert("tags".to_string(), json!(tags));
        }
        if !self.items.is_empty() {
            let items: Vec<Value> = self
                .items
                .iter()
                .filter(|t| !t.trim().is_empty())
                .enumerate()
                .map(|(i, t)| json!({ "title": t.trim(), "status": 0, "sortOrder": i }))
                .collect();
            payload.insert("items".to_string(), Value::Array(items));
        }
        if !self.reminders.is_empty() {
            payload.insert("reminders".to_string(), json!(self.reminders));
        }
        if let Some(repeat) = &self.repeat_flag {
            payload.insert("repeatFlag".to_string(), json!(repeat));
        }
        Ok(Value::Object(payload))
    }
}

/// Partial update for an existing task; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub is_all_day: Option<bool>,
    pub time_zone: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub repeat_flag: Option<String>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.start_date.is_none()
            && self.due_date.is_none()
            && self.is_all_day.is_none()
            && self.time_zone.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
            && self.repeat_flag.is_none()
    }

    /// The changed fields only, in wire form. An empty date string clears the date.
    pub fn to_payload(&self) -> Result<Value> {
        let mut payload = Map::new();
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(TickTickError::Validation("title cannot be empty".to_string()));
            }
            payload.insert("title".to_string(), json!(title.trim()));
        }
        if let Some(content) = &self.content {
            payload.insert("content".to_string(), json!(content));
        }
        for (field, key, value) in [
            ("start_date", "startDate", &self.start_date),
            ("due_date", "dueDate", &self.due_date),
        ] {
            if let Some(raw) = value {
                let wire = if raw.trim().is_empty() {
                    Value::Null
                } else {
                    json!(normalize_date_input(field, raw)?)
                };
                payload.insert(key.to_string(), wire);
            }
        }
        if let Some(all_day) = self.is_all_day {
            payload.insert("isAllDay".to_string(), json!(all_day));
        }
        if let Some(tz) = &self.time_zone {
            payload.insert("timeZone".to_string(), json!(tz));
        }
        if let Some(priority) = self.priority {
            payload.insert("priority".to_string(), json!(priority.value()));
        }
        if let Some(tags) = &self.tags {
            payload.insert("tags".to_string(), json!(clean_tags(tags)));
        }
        if let Some(repeat) = &self.repeat_flag {
            payload.insert("repeatFlag".to_string(), json!(repeat));
        }
        Ok(Value::Object(payload))
    }

    /// Merge the patch into a full task document (read-modify-write).
    pub fn apply_to(&self, task: &Task) -> Result<Value> {
        let mut doc = serde_json::to_value(task)?;
        if let (Value::Object(target), Value::Object(changes)) = (&mut doc, self.to_payload()?) {
            for (key, value) in changes {
                target.insert(key, value);
            }
        }
        Ok(doc)
    }
}

/// Trim, drop blanks and de-duplicate (case-insensitive) while keeping order.
pub fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#');
        if !tag.is_empty() && !out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_priority_values() {
        assert_eq!(Priority::High.value(), 5);
        assert_eq!(Priority::from_value(3), Priority::Medium);
        assert_eq!(Priority::from_value(4), Priority::Medium);
        assert_eq!(Priority::from_value(-1), Priority::None);
        assert!(Priority::High > Priority::Low);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
        assert_eq!(Priority::parse("low"), Some(Priority::Low));
        assert_eq!(Priority::parse("3"), Some(Priority::Medium));
        assert_eq!(Priority::parse("2"), None);
        assert_eq!(Priority::parse("urgent"), None);
    }

    #[test]
    fn test_priority_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Priority::Medium).unwrap(), "\"medium\"");
        let p: Priority = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(p, Priority::High);
    }

    #[test]
    fn test_parse_ticktick_formats() {
        let dt = parse_ticktick_date("2026-01-02T03:04:05.000+0000").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2026, 1, 2, 3));

        let dt = parse_ticktick_date("2026-01-02T10:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 8);

        let dt = parse_ticktick_date("2026-03-04").unwrap();
        assert_eq!((dt.month(), dt.day(), dt.hour()), (3, 4, 0));

        assert!(parse_ticktick_date("next tuesday").is_none());
        assert!(parse_ticktick_date("").is_none());
    }

    #[test]
    fn test_normalize_date_input() {
        assert_eq!(
            normalize_date_input("due_date", "2026-05-01").unwrap(),
            "2026-05-01T00:00:00.000+0000"
        );
        assert!(matches!(
            normalize_date_input("due_date", "soon"),
            Err(TickTickError::Validation(_))
        ));
    }

    #[test]
    fn test_task_preserves_unknown_fields() {
        let raw = r#"{"id":"t1","projectId":"p1","title":"Write","priority":5,
            "etag":"abc","focusSummaries":[{"x":1}]}"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.priority_level(), Priority::High);
        assert_eq!(task.extra["etag"], "abc");

        let back = serde_json::to_value(&task).unwrap();
        assert_eq!(back["etag"], "abc");
        assert_eq!(back["projectId"], "p1");
        assert!(back.get("tags").is_none());
    }

    #[test]
    fn test_task_dates_and_tags() {
        let task = Task {
            id: "t".to_string(),
            start_date: Some("2026-02-01T09:00:00.000+0000".to_string()),
            tags: vec!["Work".to_string()],
            status: TaskStatus::COMPLETED,
            ..Default::default()
        };
        assert!(task.due_at().is_none());
        assert_eq!(task.due_day().unwrap().to_string(), "2026-02-01");
        assert!(task.has_tag("work"));
        assert!(task.is_completed());
    }

    #[test]
    fn test_new_task_payload() {
        let mut new = NewTask::new("  Buy milk ");
        new.project_id = Some("p1".to_string());
        new.due_date = Some("2026-01-10".to_string());
        new.priority = Some(Priority::High);
        new.tags = vec!["errand".to_string(), " #Errand".to_string(), "".to_string()];
        new.items = vec!["2%".to_string(), "whole".to_string()];

        let payload = new.to_payload().unwrap();
        assert_eq!(payload["title"], "Buy milk");
        assert_eq!(payload["projectId"], "p1");
        assert_eq!(payload["dueDate"], "2026-01-10T00:00:00.000+0000");
        assert_eq!(payload["priority"], 5);
        assert_eq!(payload["tags"], json!(["errand"]));
        assert_eq!(payload["items"][1]["title"], "whole");
        assert!(payload.get("content").is_none());
    }

    #[test]
    fn test_new_task_requires_title() {
        assert!(matches!(
            NewTask::new("   ").to_payload(),
            Err(TickTickError::Validation(_))
        ));
    }

    #[test]
    fn test_patch_apply_keeps_other_fields() {
        let task: Task = serde_json::from_value(json!({
            "id": "t1", "projectId": "p1", "title": "Old", "content": "keep",
            "dueDate": "2026-01-01T00:00:00.000+0000", "sortOrder": 42
        }))
        .unwrap();
        let patch = TaskPatch {
            title: Some("New".to_string()),
            due_date: Some(String::new()),
            priority: Some(Priority::Low),
            ..Default::default()
        };
        let doc = patch.apply_to(&task).unwrap();
        assert_eq!(doc["title"], "New");
        assert_eq!(doc["content"], "keep");
        assert_eq!(doc["sortOrder"], 42);
        assert_eq!(doc["priority"], 1);
        assert!(doc["dueDate"].is_null());
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(TaskPatch::default().is_empty());
        let patch = TaskPatch {
            tags: Some(vec![]),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
