//! TickTick REST endpoint catalog.
//!
//! Base URLs come from [`ApiConfig`] so tests can point the client at a
//! local mock server. Paths are relative to the v1 (official OAuth) or v2
//! (session) base.

use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;

/// Which TickTick API a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// Official OAuth2 API (`/open/v1`)
    V1,
    /// Session-authenticated web API (`/api/v2`)
    V2,
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiVersion::V1 => write!(f, "v1"),
            ApiVersion::V2 => write!(f, "v2"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    v1_base: String,
    v2_base: String,
    authorize_url: String,
    token_url: String,
}

impl Endpoints {
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            v1_base: config.v1_base_url.trim_end_matches('/').to_string(),
            v2_base: config.v2_base_url.trim_end_matches('/').to_string(),
            authorize_url: config.oauth_authorize_url.clone(),
            token_url: config.oauth_token_url.clone(),
        }
    }

    /// Absolute URL for a path on the given API.
    pub fn url(&self, version: ApiVersion, path: &str) -> String {
        let base = match version {
            ApiVersion::V1 => &self.v1_base,
            ApiVersion::V2 => &self.v2_base,
        };
        format!("{}{}", base, path)
    }

    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    // v1

    pub fn projects() -> &'static str {
        "/project"
    }

    pub fn project(project_id: &str) -> String {
        format!("/project/{}", project_id)
    }

    pub fn project_data(project_id: &str) -> String {
        format!("/project/{}/data", project_id)
    }

    pub fn task() -> &'static str {
        "/task"
    }

    pub fn task_by_id(task_id: &str) -> String {
        format!("/task/{}", task_id)
    }

    pub fn project_task(project_id: &str, task_id: &str) -> String {
        format!("/project/{}/task/{}", project_id, task_id)
    }

    pub fn complete_task(project_id: &str, task_id: &str) -> String {
        format!("/project/{}/task/{}/complete", project_id, task_id)
    }

    // shared by v1 and v2

    pub fn batch_task() -> &'static str {
        "/batch/task"
    }

    // v2

    pub fn signin() -> &'static str {
        "/user/signin"
    }

    pub fn user_settings() -> &'static str {
        "/user/preferences/settings"
    }

    pub fn batch_check(checkpoint: u64) -> String {
        format!("/batch/check/{}", checkpoint)
    }

    pub fn batch_task_parent() -> &'static str {
        "/batch/taskParent"
    }

    pub fn batch_task_project() -> &'static str {
        "/batch/taskProject"
    }

    pub fn all_completed() -> &'static str {
        "/project/all/completed"
    }

    pub fn project_completed(project_id: &str) -> String {
        format!("/project/{}/completed", project_id)
    }

    pub fn batch_project() -> &'static str {
        "/batch/project"
    }

    pub fn batch_project_group() -> &'static str {
        "/batch/projectGroup"
    }

    pub fn batch_tag() -> &'static str {
        "/batch/tag"
    }

    pub fn tag_rename() -> &'static str {
        "/tag/rename"
    }

    pub fn tag_merge() -> &'static str {
        "/tag/merge"
    }

    pub fn tag() -> &'static str {
        "/tag"
    }

    pub fn habits() -> &'static str {
        "/habits"
    }

    pub fn habit() -> &'static str {
        "/habit"
    }

    pub fn habit_by_id(habit_id: &str) -> String {
        format!("/habit/{}", habit_id)
    }

    pub fn habit_checkin(habit_id: &str) -> String {
        format!("/habit/{}/checkin", habit_id)
    }

    pub fn habit_records(habit_id: &str) -> String {
        format!("/habit/{}/records", habit_id)
    }

    pub fn focus_records() -> &'static str {
        "/focus/records"
    }

    pub fn focus_save() -> &'static str {
        "/focus/save"
    }

    pub fn focus_record(record_id: &str) -> String {
        format!("/focus/{}", record_id)
    }

    pub fn pomo_settings() -> &'static str {
        "/pomodoro/settings"
    }

    pub fn calendar_events() -> &'static str {
        "/calendar/events"
    }

    pub fn calendars() -> &'static str {
        "/calendars"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let endpoints = Endpoints::from_config(&ApiConfig::default());
        assert_eq!(
            endpoints.url(ApiVersion::V1, &Endpoints::project_data("p1")),
            "https://api.ticktick.com/open/v1/project/p1/data"
        );
        assert_eq!(
            endpoints.url(ApiVersion::V2, Endpoints::batch_task_project()),
            "https://api.ticktick.com/api/v2/batch/taskProject"
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = ApiConfig {
            v1_base_url: "http://127.0.0.1:1234/open/v1/".to_string(),
            ..Default::default()
        };
        let endpoints = Endpoints::from_config(&config);
        assert_eq!(
            endpoints.url(ApiVersion::V1, Endpoints::task()),
            "http://127.0.0.1:1234/open/v1/task"
        );
    }

    #[test]
    fn test_task_paths() {
        assert_eq!(Endpoints::project_task("p", "t"), "/project/p/task/t");
        assert_eq!(
            Endpoints::complete_task("p", "t"),
            "/project/p/task/t/complete"
        );
        assert_eq!(Endpoints::batch_check(0), "/batch/check/0");
        assert_eq!(Endpoints::habit_checkin("h1"), "/habit/h1/checkin");
    }

    #[test]
    fn test_api_version_display() {
        assert_eq!(ApiVersion::V1.to_string(), "v1");
        assert_eq!(ApiVersion::V2.to_string(), "v2");
    }
}
