//! Calendar events from subscribed calendars (v2 only).

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};

use super::{list_of, require_v2};
use crate::api::{ApiVersion, Endpoints, TickTickClient};
use crate::domain::{Calendar, CalendarEvent};
use crate::error::{Result, TickTickError};

const FEATURE: &str = "Calendar";

#[derive(Debug, Clone)]
pub struct CalendarService {
    client: Arc<TickTickClient>,
}

impl CalendarService {
    pub fn new(client: Arc<TickTickClient>) -> Self {
        Self { client }
    }

    /// Events between `start` and `end` inclusive, ordered by start time.
    pub async fn events(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<CalendarEvent>> {
        require_v2(&self.client, FEATURE)?;
        if end < start {
            return Err(TickTickError::Validation(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        let query = [
            ("startDate", start.format("%Y-%m-%d").to_string()),
            ("endDate", end.format("%Y-%m-%d").to_string()),
        ];
        let mut events: Vec<CalendarEvent> = list_of(
            self.client
                .get_query(ApiVersion::V2, Endpoints::calendar_events(), &query)
                .await?,
        )?;
        events.sort_by_key(|e| e.starts_at());
        Ok(events)
    }

    pub async fn today(&self) -> Result<Vec<CalendarEvent>> {
        let today = Utc::now().date_naive();
        self.events(today, today).await
    }

    /// Today and the following seven days.
    pub async fn week(&self) -> Result<Vec<CalendarEvent>> {
        let today = Utc::now().date_naive();
        let end = today.checked_add_days(Days::new(7)).unwrap_or(today);
        self.events(today, end).await
    }

    pub async fn calendars(&self) -> Result<Vec<Calendar>> {
        require_v2(&self.client, FEATURE)?;
        list_of(self.client.get(ApiVersion::V2, Endpoints::calendars()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use mockito::Matcher;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_events_query_and_order() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let mock = server
            .mock("GET", "/api/v2/calendar/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("startDate".into(), "2026-05-01".into()),
                Matcher::UrlEncoded("endDate".into(), "2026-05-02".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"[{"id":"b","title":"Late","startDate":"2026-05-01T15:00:00.000+0000"},
                    {"id":"a","title":"Early","startDate":"2026-05-01T08:00:00.000+0000"}]"#,
            )
            .create_async()
            .await;

        let svc = CalendarService::new(test_support::client(&dir, &server.url(), false, true));
        let start = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();
        let events = svc.events(start, end).await.unwrap();
        mock.assert_async().await;
        assert_eq!(events[0].title, "Early");
    }

    #[tokio::test]
    async fn test_events_rejects_inverted_range() {
        let server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let svc = CalendarService::new(test_support::client(&dir, &server.url(), false, true));
        let start = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        assert!(matches!(
            svc.events(start, end).await.unwrap_err(),
            TickTickError::Validation(_)
        ));
    }
}
