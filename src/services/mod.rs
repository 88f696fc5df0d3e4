//! Thin wrappers over the TickTick REST API
//!
//! Each service owns a handle to the shared client and turns remote JSON
//! into domain types. The task service also keeps the location cache current
//! (write-through) and resolves task locations through it.

pub mod calendar;
pub mod focus;
pub mod habits;
pub mod projects;
pub mod smart;
pub mod statistics;
pub mod tags;
pub mod tasks;
pub mod user;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::TickTickClient;
use crate::cache::SharedCache;
use crate::error::{Result, TickTickError};

pub use calendar::CalendarService;
pub use focus::{FocusService, FocusStats, TodayFocus};
pub use habits::{HabitProgress, HabitService, HabitStats};
pub use projects::ProjectService;
pub use smart::{DayGroup, DaySchedule, ProductivitySummary, SmartService};
pub use statistics::{DailySummary, Overview, ProductivityScore, StatisticsService, TaskAnalytics, WeeklyReport};
pub use tags::TagService;
pub use tasks::{TaskFilter, TaskService};
pub use user::{UserProfile, UserService};

/// Every service, wired to one client and one cache.
#[derive(Clone)]
pub struct Services {
    pub client: Arc<TickTickClient>,
    pub cache: SharedCache,
    pub tasks: TaskService,
    pub projects: ProjectService,
    pub tags: TagService,
    pub habits: HabitService,
    pub focus: FocusService,
    pub calendar: CalendarService,
    pub smart: SmartService,
    pub statistics: StatisticsService,
    pub user: UserService,
}

impl Services {
    pub fn new(client: Arc<TickTickClient>, cache: SharedCache, concurrency: usize, prefer_v2: bool) -> Self {
        if let (Some(inbox_id), Ok(mut guard)) = (client.inbox_id(), cache.try_write()) {
            guard.set_inbox_id(inbox_id);
        }
        let tasks = TaskService::new(client.clone(), cache.clone(), concurrency, prefer_v2);
        let habits = HabitService::new(client.clone());
        let focus = FocusService::new(client.clone());
        Self {
            projects: ProjectService::new(client.clone()),
            tags: TagService::new(client.clone()),
            statistics: StatisticsService::new(client.clone(), tasks.clone(), habits.clone(), focus.clone()),
            habits,
            focus,
            calendar: CalendarService::new(client.clone()),
            smart: SmartService::new(tasks.clone()),
            user: UserService::new(client.clone()),
            tasks,
            client,
            cache,
        }
    }
}

/// Fail with `V2Required` unless a v2 session is present.
pub(crate) fn require_v2(client: &TickTickClient, feature: &str) -> Result<()> {
    if client.has_v2() {
        Ok(())
    } else {
        Err(TickTickError::V2Required(feature.to_string()))
    }
}

/// Decode a JSON array; anything else (including `{"success": true}`) is empty.
pub(crate) fn list_of<T: DeserializeOwned>(value: Value) -> Result<Vec<T>> {
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        _ => Ok(Vec::new()),
    }
}

/// First object in a batch response section such as `add` or `update`.
pub(crate) fn first_in<T: DeserializeOwned>(value: &Value, section: &str) -> Option<T> {
    value
        .get(section)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| serde_json::from_value(item.clone()).ok())
}

/// Surface per-id failures reported in a v2 batch response.
pub(crate) fn check_batch_errors(value: &Value) -> Result<()> {
    match value.get("id2error").and_then(Value::as_object) {
        Some(errors) if !errors.is_empty() => {
            let details: Vec<String> = errors.iter().map(|(id, err)| format!("{}: {}", id, err)).collect();
            Err(TickTickError::Api {
                status: 200,
                message: format!("Batch request failed for {}", details.join(", ")),
            })
        }
        _ => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;
    use serde_json::json;

    #[test]
    fn test_list_of_non_array_is_empty() {
        let tasks: Vec<Task> = list_of(json!({"success": true})).unwrap();
        assert!(tasks.is_empty());
        let tasks: Vec<Task> = list_of(json!([{"id": "a"}])).unwrap();
        assert_eq!(tasks[0].id, "a");
    }

    #[test]
    fn test_first_in_section() {
        let value = json!({"add": [{"id": "x", "title": "T"}]});
        let task: Option<Task> = first_in(&value, "add");
        assert_eq!(task.unwrap().title, "T");
        assert!(first_in::<Task>(&value, "update").is_none());
    }

    #[test]
    fn test_batch_errors() {
        assert!(check_batch_errors(&json!({"id2etag": {"a": "1"}, "id2error": {}})).is_ok());
        let err = check_batch_errors(&json!({"id2error": {"a": "NOT_EXISTED"}})).unwrap_err();
        assert!(err.to_string().contains("NOT_EXISTED"));
    }
}
