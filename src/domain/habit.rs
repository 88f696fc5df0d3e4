//! Habits and their check-in records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Result, TickTickError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HabitStatus {
    Active,
    Paused,
    Archived,
}

impl HabitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HabitStatus::Active => "active",
            HabitStatus::Paused => "paused",
            HabitStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    /// Either the string form (`active`) or TickTick's numeric code.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub status: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_streak: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_streak: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_check_ins: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Habit {
    pub fn status(&self) -> HabitStatus {
        match &self.status {
            Value::String(s) => match s.to_lowercase().as_str() {
                "paused" => HabitStatus::Paused,
                "archived" => HabitStatus::Archived,
                _ => HabitStatus::Active,
            },
            Value::Number(n) if n.as_i64() == Some(1) => HabitStatus::Archived,
            _ => HabitStatus::Active,
        }
    }

    pub fn goal_value(&self) -> f64 {
        self.goal.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitRecord {
    #[serde(default)]
    pub habit_id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default = "default_record_value")]
    pub value: f64,
    #[serde(default)]
    pub status: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_record_value() -> f64 {
    1.0
}

#[derive(Debug, Clone)]
pub struct NewHabit {
    pub name: String,
    pub goal: f64,
    pub goal_type: String,
    pub unit: Option<String>,
    pub frequency: String,
    pub repeat_days: Vec<u8>,
    pub reminder_time: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

impl Default for NewHabit {
    fn default() -> Self {
        Self {
            name: String::new(),
            goal: 1.0,
            goal_type: "boolean".to_string(),
            unit: None,
            frequency: "daily".to_string(),
            repeat_days: Vec::new(),
            reminder_time: None,
            color: None,
            icon: None,
        }
    }
}

impl NewHabit {
    pub fn to_payload(&self) -> Result<Value> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TickTickError::Validation("habit name is required".to_string()));
        }
        if self.goal <= 0.0 {
            return Err(TickTickError::Validation("goal must be positive".to_string()));
        }
        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(name));
        payload.insert("goal".to_string(), json!(self.goal));
        payload.insert("goalType".to_string(), json!(self.goal_type));
        payload.insert("frequency".to_string(), json!(self.frequency));
        if let Some(unit) = &self.unit {
            payload.insert("unit".to_string(), json!(unit));
        }
        if !self.repeat_days.is_empty() {
            payload.insert("repeatDays".to_string(), json!(self.repeat_days));
        }
        if let Some(time) = &self.reminder_time {
            payload.insert("reminderTime".to_string(), json!(time));
        }
        if let Some(color) = &self.color {
            payload.insert("color".to_string(), json!(color));
        }
        if let Some(icon) = &self.icon {
            payload.insert("icon".to_string(), json!(icon));
        }
        Ok(Value::Object(payload))
    }
}

#[derive(Debug, Clone, Default)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub goal: Option<f64>,
    pub unit: Option<String>,
    pub frequency: Option<String>,
    pub reminder_time: Option<String>,
    pub color: Option<String>,
    pub status: Option<HabitStatus>,
}

impl HabitPatch {
    pub fn to_payload(&self, habit_id: &str) -> Value {
        let mut payload = Map::new();
        payload.insert("id".to_string(), json!(habit_id));
        if let Some(name) = &self.name {
            payload.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(goal) = self.goal {
            payload.insert("goal".to_string(), json!(goal));
        }
        if let Some(unit) = &self.unit {
            payload.insert("unit".to_string(), json!(unit));
        }
        if let Some(frequency) = &self.frequency {
            payload.insert("frequency".to_string(), json!(frequency));
        }
        if let Some(time) = &self.reminder_time {
            payload.insert("reminderTime".to_string(), json!(time));
        }
        if let Some(color) = &self.color {
            payload.insert("color".to_string(), json!(color));
        }
        if let Some(status) = self.status {
            payload.insert("status".to_string(), json!(status.as_str()));
        }
        Value::Object(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_habit_status_parsing() {
        let mut habit = Habit {
            id: "h".to_string(),
            ..Default::default()
        };
        assert_eq!(habit.status(), HabitStatus::Active);
        habit.status = json!("paused");
        assert_eq!(habit.status(), HabitStatus::Paused);
        habit.status = json!(1);
        assert_eq!(habit.status(), HabitStatus::Archived);
    }

    #[test]
    fn test_new_habit_payload() {
        let payload = NewHabit {
            name: "Water".to_string(),
            goal: 8.0,
            goal_type: "count".to_string(),
            unit: Some("glasses".to_string()),
            ..Default::default()
        }
        .to_payload()
        .unwrap();
        assert_eq!(payload["goal"], 8.0);
        assert_eq!(payload["goalType"], "count");
        assert_eq!(payload["frequency"], "daily");
        assert_eq!(payload["unit"], "glasses");
    }

    #[test]
    fn test_new_habit_validation() {
        assert!(NewHabit::default().to_payload().is_err());
        let bad_goal = NewHabit {
            name: "x".to_string(),
            goal: 0.0,
            ..Default::default()
        };
        assert!(bad_goal.to_payload().is_err());
    }

    #[test]
    fn test_habit_patch_status() {
        let payload = HabitPatch {
            status: Some(HabitStatus::Archived),
            ..Default::default()
        }
        .to_payload("h1");
        assert_eq!(payload["id"], "h1");
        assert_eq!(payload["status"], "archived");
        assert!(payload.get("name").is_none());
    }

    #[test]
    fn test_record_defaults() {
        let record: HabitRecord =
            serde_json::from_value(json!({"habitId": "h1", "date": "2026-01-01"})).unwrap();
        assert_eq!(record.value, 1.0);
    }
}
