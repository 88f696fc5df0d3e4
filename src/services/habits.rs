//! Habits and check-ins (v2 only).

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Days, Local, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value, json};

use super::{list_of, require_v2};
use crate::api::{ApiVersion, Endpoints, TickTickClient};
use crate::domain::{Habit, HabitPatch, HabitRecord, HabitStatus, NewHabit};
use crate::error::{Result, TickTickError};

const FEATURE: &str = "Habits";

/// Today's progress on one active habit.
#[derive(Debug, Clone, Serialize)]
pub struct HabitProgress {
    pub habit: Habit,
    pub completed: bool,
    pub current_value: f64,
    pub goal: f64,
    pub remaining: f64,
}

impl HabitProgress {
    /// Done when any single record reaches the goal.
    pub fn from_records(habit: Habit, records: &[HabitRecord]) -> Self {
        let goal = habit.goal_value();
        let current_value: f64 = records.iter().map(|r| r.value).sum();
        Self {
            completed: records.iter().any(|r| r.value >= goal),
            remaining: (goal - current_value).max(0.0),
            current_value,
            goal,
            habit,
        }
    }
}

/// Window used for a habit's completion rate.
pub const STATS_DAYS: u64 = 30;

/// Streaks as TickTick reports them, plus a completion rate over the last
/// [`STATS_DAYS`] days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitStats {
    pub habit_id: String,
    pub name: String,
    pub current_streak: i64,
    pub best_streak: i64,
    pub total_check_ins: i64,
    /// Percent of days in the window that reached the goal
    pub completion_rate: f64,
    pub days: u64,
}

impl HabitStats {
    pub fn from_records(habit: &Habit, records: &[HabitRecord], days: u64) -> Self {
        let goal = habit.goal_value();
        // Dates arrive as `2026-03-04` or `20260304`
        let done: BTreeSet<String> = records
            .iter()
            .filter(|r| r.value >= goal)
            .map(|r| r.date.chars().filter(char::is_ascii_digit).collect())
            .collect();
        let completion_rate = if days == 0 {
            0.0
        } else {
            (done.len() as f64 / days as f64 * 100.0).min(100.0)
        };
        Self {
            habit_id: habit.id.clone(),
            name: habit.name.clone(),
            current_streak: habit.current_streak.unwrap_or(0),
            best_streak: habit.best_streak.unwrap_or(0),
            total_check_ins: habit.total_check_ins.unwrap_or(0),
            completion_rate,
            days,
        }
    }
}

fn day_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone)]
pub struct HabitService {
    client: Arc<TickTickClient>,
}

impl HabitService {
    pub fn new(client: Arc<TickTickClient>) -> Self {
        Self { client }
    }

    pub async fn list(&self, status: Option<HabitStatus>) -> Result<Vec<Habit>> {
        require_v2(&self.client, FEATURE)?;
        let habits: Vec<Habit> = list_of(self.client.get(ApiVersion::V2, Endpoints::habits()).await?)?;
        Ok(habits
            .into_iter()
            .filter(|h| status.is_none_or(|s| h.status() == s))
            .collect())
    }

    pub async fn get(&self, habit_id: &str) -> Result<Habit> {
        require_v2(&self.client, FEATURE)?;
        let value = self.client.get(ApiVersion::V2, &Endpoints::habit_by_id(habit_id)).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create(&self, new_habit: &NewHabit) -> Result<Habit> {
        require_v2(&self.client, FEATURE)?;
        let payload = new_habit.to_payload()?;
        let value = self.client.post(ApiVersion::V2, Endpoints::habit(), &payload).await?;
        let habit: Habit = serde_json::from_value(value)?;
        log::info!("Created habit {} ({})", habit.name, habit.id);
        Ok(habit)
    }

    pub async fn update(&self, habit_id: &str, patch: &HabitPatch) -> Result<Habit> {
        require_v2(&self.client, FEATURE)?;
        if let Some(goal) = patch.goal
            && goal <= 0.0
        {
            return Err(TickTickError::Validation("goal must be positive".to_string()));
        }
        let value = self
            .client
            .post(ApiVersion::V2, &Endpoints::habit_by_id(habit_id), &patch.to_payload(habit_id))
            .await?;
        match serde_json::from_value::<Habit>(value) {
            Ok(habit) if !habit.id.is_empty() => Ok(habit),
            _ => self.get(habit_id).await,
        }
    }

    /// Pause, resume or archive.
    pub async fn set_status(&self, habit_id: &str, status: HabitStatus) -> Result<Habit> {
        let patch = HabitPatch {
            status: Some(status),
            ..Default::default()
        };
        self.update(habit_id, &patch).await
    }

    pub async fn delete(&self, habit_id: &str) -> Result<()> {
        require_v2(&self.client, FEATURE)?;
        self.client
            .delete(ApiVersion::V2, &Endpoints::habit_by_id(habit_id))
            .await?;
        Ok(())
    }

    /// Record a check-in; `date` defaults to today.
    pub async fn checkin(
        &self,
        habit_id: &str,
        date: Option<NaiveDate>,
        value: f64,
        note: Option<&str>,
    ) -> Result<HabitRecord> {
        require_v2(&self.client, FEATURE)?;
        if value < 0.0 {
            return Err(TickTickError::Validation("value cannot be negative".to_string()));
        }
        let date = day_string(date.unwrap_or_else(|| Local::now().date_naive()));
        let mut payload = Map::new();
        payload.insert("habitId".to_string(), json!(habit_id));
        payload.insert("value".to_string(), json!(value));
        payload.insert("date".to_string(), json!(date));
        if let Some(note) = note {
            payload.insert("note".to_string(), json!(note));
        }
        let response = self
            .client
            .post(ApiVersion::V2, &Endpoints::habit_checkin(habit_id), &Value::Object(payload))
            .await?;
        let record = serde_json::from_value::<HabitRecord>(response)
            .ok()
            .filter(|r| !r.habit_id.is_empty())
            .unwrap_or_else(|| HabitRecord {
                habit_id: habit_id.to_string(),
                date,
                value,
                note: note.map(str::to_string),
                ..Default::default()
            });
        Ok(record)
    }

    /// Reset the check-in for `date` to zero.
    pub async fn undo_checkin(&self, habit_id: &str, date: NaiveDate) -> Result<()> {
        require_v2(&self.client, FEATURE)?;
        let payload = json!({ "habitId": habit_id, "date": day_string(date), "value": 0 });
        self.client
            .post(ApiVersion::V2, &Endpoints::habit_checkin(habit_id), &payload)
            .await?;
        Ok(())
    }

    pub async fn records(
        &self,
        habit_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<HabitRecord>> {
        require_v2(&self.client, FEATURE)?;
        let mut query = Vec::new();
        if let Some(from) = from {
            query.push(("from", day_string(from)));
        }
        if let Some(to) = to {
            query.push(("to", day_string(to)));
        }
        list_of(
            self.client
                .get_query(ApiVersion::V2, &Endpoints::habit_records(habit_id), &query)
                .await?,
        )
    }

    pub async fn stats(&self, habit_id: &str) -> Result<HabitStats> {
        let habit = self.get(habit_id).await?;
        let today = Local::now().date_naive();
        let from = today.checked_sub_days(Days::new(STATS_DAYS - 1)).unwrap_or(today);
        let records = self.records(habit_id, Some(from), Some(today)).await?;
        Ok(HabitStats::from_records(&habit, &records, STATS_DAYS))
    }

    /// Progress on every active habit for today.
    pub async fn today_status(&self) -> Result<Vec<HabitProgress>> {
        let today = Local::now().date_naive();
        let mut progress = Vec::new();
        for habit in self.list(Some(HabitStatus::Active)).await? {
            let records = self.records(&habit.id, Some(today), Some(today)).await?;
            progress.push(HabitProgress::from_records(habit, &records));
        }
        Ok(progress)
    }
}
