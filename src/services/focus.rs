//! Focus (pomodoro) records, settings and statistics (v2 only).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;

use super::{list_of, require_v2};
use crate::api::{ApiVersion, Endpoints, TickTickClient};
use crate::domain::{FocusRecord, NewFocusRecord, PomoSettings};
use crate::error::{Result, TickTickError};

const FEATURE: &str = "Focus";

/// Aggregates over a set of focus records. Durations are in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FocusStats {
    pub total_seconds: i64,
    pub sessions: usize,
    /// Sessions of the pomodoro type
    pub pomo_sessions: usize,
    pub average_seconds: i64,
    /// Keyed by task title when known, else task id, else `(no task)`
    pub by_task: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
}

impl FocusStats {
    pub fn from_records(records: &[FocusRecord]) -> Self {
        let mut stats = FocusStats::default();
        for record in records {
            let seconds = record.duration.max(0);
            stats.total_seconds += seconds;
            stats.sessions += 1;
            let task_key = record
                .task_title
                .clone()
                .or_else(|| record.task_id.clone())
                .unwrap_or_else(|| "(no task)".to_string());
            *stats.by_task.entry(task_key).or_default() += seconds;
            let kind = record.focus_type.clone().unwrap_or_else(|| "pomo".to_string());
            if kind == "pomo" {
                stats.pomo_sessions += 1;
            }
            *stats.by_type.entry(kind).or_default() += seconds;
        }
        if stats.sessions > 0 {
            stats.average_seconds = stats.total_seconds / stats.sessions as i64;
        }
        stats
    }
}

/// Today's focus against the daily pomodoro target.
#[derive(Debug, Clone, Serialize)]
pub struct TodayFocus {
    pub stats: FocusStats,
    pub daily_target: Option<i64>,
    pub remaining: Option<i64>,
}

fn day_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Overlay the set fields of `changes` on `current`. Every set value must
/// be positive and at least one must be set.
pub fn merge_settings(current: PomoSettings, changes: &PomoSettings) -> Result<PomoSettings> {
    let fields = [
        ("pomo_duration", changes.pomo_duration),
        ("short_break", changes.short_break),
        ("long_break", changes.long_break),
        ("long_break_interval", changes.long_break_interval),
        ("daily_pomo_target", changes.daily_pomo_target),
    ];
    if fields.iter().all(|(_, v)| v.is_none()) {
        return Err(TickTickError::Validation("No focus settings to update".to_string()));
    }
    if let Some((name, _)) = fields.iter().find(|(_, v)| v.is_some_and(|v| v <= 0)) {
        return Err(TickTickError::Validation(format!("{} must be positive", name)));
    }
    Ok(PomoSettings {
        pomo_duration: changes.pomo_duration.or(current.pomo_duration),
        short_break: changes.short_break.or(current.short_break),
        long_break: changes.long_break.or(current.long_break),
        long_break_interval: changes.long_break_interval.or(current.long_break_interval),
        daily_pomo_target: changes.daily_pomo_target.or(current.daily_pomo_target),
        extra: current.extra,
    })
}

#[derive(Debug, Clone)]
pub struct FocusService {
    client: Arc<TickTickClient>,
}

impl FocusService {
    pub fn new(client: Arc<TickTickClient>) -> Self {
        Self { client }
    }

    pub async fn records(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        task_id: Option<&str>,
    ) -> Result<Vec<FocusRecord>> {
        require_v2(&self.client, FEATURE)?;
        let mut query = Vec::new();
        if let Some(from) = from {
            query.push(("from", day_string(from)));
        }
        if let Some(to) = to {
            query.push(("to", day_string(to)));
        }
        let records: Vec<FocusRecord> = list_of(
            self.client
                .get_query(ApiVersion::V2, Endpoints::focus_records(), &query)
                .await?,
        )?;
        Ok(records
            .into_iter()
            .filter(|r| task_id.is_none_or(|t| r.task_id.as_deref() == Some(t)))
            .collect())
    }

    pub async fn save_record(&self, record: &NewFocusRecord) -> Result<FocusRecord> {
        require_v2(&self.client, FEATURE)?;
        let payload = record.to_payload()?;
        let value = self.client.post(ApiVersion::V2, Endpoints::focus_save(), &payload).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete_record(&self, record_id: &str) -> Result<()> {
        require_v2(&self.client, FEATURE)?;
        self.client
            .delete(ApiVersion::V2, &Endpoints::focus_record(record_id))
            .await?;
        Ok(())
    }

    pub async fn settings(&self) -> Result<PomoSettings> {
        require_v2(&self.client, FEATURE)?;
        let value = self.client.get(ApiVersion::V2, Endpoints::pomo_settings()).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Read-modify-write so unset fields keep their current values.
    pub async fn update_settings(&self, changes: &PomoSettings) -> Result<PomoSettings> {
        require_v2(&self.client, FEATURE)?;
        let merged = merge_settings(self.settings().await?, changes)?;
        let response = self
            .client
            .post(ApiVersion::V2, Endpoints::pomo_settings(), &serde_json::to_value(&merged)?)
            .await?;
        let saved: PomoSettings = serde_json::from_value(response).unwrap_or_default();
        Ok(if saved.pomo_duration.is_some() { saved } else { merged })
    }

    pub async fn stats(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<FocusStats> {
        Ok(FocusStats::from_records(&self.records(from, to, None).await?))
    }

    pub async fn today(&self) -> Result<TodayFocus> {
        let today = Local::now().date_naive();
        let stats = self.stats(Some(today), Some(today)).await?;
        let daily_target = match self.settings().await {
            Ok(settings) => settings.daily_pomo_target,
            Err(e) => {
                log::warn!("Could not load pomodoro settings: {}", e);
                None
            }
        };
        Ok(TodayFocus {
            remaining: daily_target.map(|target| (target - stats.pomo_sessions as i64).max(0)),
            daily_target,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use mockito::Matcher;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(duration: i64, task: Option<&str>, kind: Option<&str>) -> FocusRecord {
        serde_json::from_value(json!({
            "id": format!("r{}", duration),
            "duration": duration,
            "taskTitle": task,
            "focusType": kind
        }))
        .unwrap()
    }

    #[test]
    fn test_stats_from_records() {
        let stats = FocusStats::from_records(&[
            record(1500, Some("Write"), Some("pomo")),
            record(1500, Some("Write"), Some("pomo")),
            record(600, None, Some("stopwatch")),
        ]);
        assert_eq!(stats.total_seconds, 3600);
        assert_eq!(stats.sessions, 3);
        assert_eq!(stats.pomo_sessions, 2);
        assert_eq!(stats.average_seconds, 1200);
        assert_eq!(stats.by_task["Write"], 3000);
        assert_eq!(stats.by_task["(no task)"], 600);
        assert_eq!(stats.by_type["stopwatch"], 600);
    }

    #[test]
    fn test_stats_empty() {
        let stats = FocusStats::from_records(&[]);
        assert_eq!(stats, FocusStats::default());
    }

    #[test]
    fn test_merge_settings() {
        let current = PomoSettings {
            pomo_duration: Some(25),
            short_break: Some(5),
            ..Default::default()
        };
        let changes = PomoSettings {
            pomo_duration: Some(50),
            ..Default::default()
        };
        let merged = merge_settings(current.clone(), &changes).unwrap();
        assert_eq!(merged.pomo_duration, Some(50));
        assert_eq!(merged.short_break, Some(5));

        assert!(merge_settings(current.clone(), &PomoSettings::default()).is_err());
        let negative = PomoSettings {
            long_break: Some(0),
            ..Default::default()
        };
        let err = merge_settings(current, &negative).unwrap_err();
        assert!(err.to_string().contains("long_break"));
    }

    #[tokio::test]
    async fn test_update_settings_keeps_unset_fields() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _current = server
            .mock("GET", "/api/v2/pomodoro/settings")
            .with_status(200)
            .with_body(r#"{"pomoDuration":25,"shortBreak":5,"autoPomo":true}"#)
            .create_async()
            .await;
        let update = server
            .mock("POST", "/api/v2/pomodoro/settings")
            .match_body(Matcher::Json(json!({
                "pomoDuration": 25,
                "shortBreak": 10,
                "autoPomo": true
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let svc = FocusService::new(test_support::client(&dir, &server.url(), false, true));
        let changes = PomoSettings {
            short_break: Some(10),
            ..Default::default()
        };
        let saved = svc.update_settings(&changes).await.unwrap();
        update.assert_async().await;
        assert_eq!(saved.short_break, Some(10));
        assert_eq!(saved.pomo_duration, Some(25));
    }

    #[tokio::test]
    async fn test_records_filter_by_task() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _mock = server
            .mock("GET", "/api/v2/focus/records")
            .with_status(200)
            .with_body(r#"[{"id":"a","duration":60,"taskId":"t1"},{"id":"b","duration":60,"taskId":"t2"}]"#)
            .create_async()
            .await;

        let svc = FocusService::new(test_support::client(&dir, &server.url(), false, true));
        let records = svc.records(None, None, Some("t2")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "b");
    }
}
