//! Cache refresh: enumerate projects, fetch their tasks, reconcile.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use super::SharedCache;
use super::store::{RefreshReport, TaskCache};
use crate::domain::Task;
use crate::error::Result;

/// Where a refresh reads remote state from.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Ids of every project (inbox included) whose tasks should be cached.
    async fn list_project_ids(&self) -> Result<Vec<String>>;

    /// Open tasks in one project.
    async fn fetch_project_tasks(&self, project_id: &str) -> Result<Vec<Task>>;

    /// Real inbox id, when the source knows it.
    fn inbox_id(&self) -> Option<String> {
        None
    }
}

/// Everything fetched in one pass, before reconciliation.
#[derive(Debug)]
pub struct FetchOutcome {
    pub tasks: Vec<Task>,
    pub failed_projects: Vec<String>,
    pub projects_scanned: usize,
    pub inbox_id: Option<String>,
    /// Taken before listing; cache writes after this are newer than the fetch
    pub started_at: DateTime<Utc>,
}

/// Fetch all projects with at most `concurrency` requests in flight.
///
/// A failure to list projects is returned as an error. Failures for single
/// projects are logged and reported in `failed_projects`.
pub async fn fetch_all(source: &dyn TaskSource, concurrency: usize) -> Result<FetchOutcome> {
    let started_at = Utc::now();
    let project_ids = source.list_project_ids().await?;
    let projects_scanned = project_ids.len();

    let results: Vec<(String, Result<Vec<Task>>)> = stream::iter(project_ids)
        .map(|project_id| async move {
            let result = source.fetch_project_tasks(&project_id).await;
            (project_id, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = FetchOutcome {
        tasks: Vec::new(),
        failed_projects: Vec::new(),
        projects_scanned,
        inbox_id: source.inbox_id(),
        started_at,
    };
    for (project_id, result) in results {
        match result {
            Ok(tasks) => outcome.tasks.extend(tasks),
            Err(e) => {
                log::warn!("Failed to fetch tasks for project {}: {}", project_id, e);
                outcome.failed_projects.push(project_id);
            }
        }
    }
    outcome.failed_projects.sort();
    Ok(outcome)
}

impl TaskCache {
    /// Rebuild the cache from `source`. Nothing changes if projects cannot be listed.
    pub async fn refresh(&mut self, source: &dyn TaskSource, concurrency: usize) -> Result<RefreshReport> {
        let outcome = fetch_all(source, concurrency).await?;
        self.apply_fetch(outcome)
    }

    pub(crate) fn apply_fetch(&mut self, outcome: FetchOutcome) -> Result<RefreshReport> {
        let FetchOutcome {
            tasks,
            failed_projects,
            projects_scanned,
            inbox_id,
            started_at,
        } = outcome;
        if let Some(inbox_id) = inbox_id {
            self.set_inbox_id(inbox_id);
        }
        let mut report = self.reconcile(tasks, &failed_projects, started_at)?;
        report.projects_scanned = projects_scanned;
        Ok(report)
    }
}

/// Refresh a shared cache, holding the write lock only while reconciling.
pub async fn refresh_shared(
    cache: &SharedCache,
    source: &dyn TaskSource,
    concurrency: usize,
) -> Result<RefreshReport> {
    let outcome = fetch_all(source, concurrency).await?;
    cache.write().await.apply_fetch(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TickTickError;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct FakeSource {
        projects: Option<Vec<String>>,
        tasks: HashMap<String, Vec<Task>>,
    }

    #[async_trait]
    impl TaskSource for FakeSource {
        async fn list_project_ids(&self) -> Result<Vec<String>> {
            self.projects
                .clone()
                .ok_or_else(|| TickTickError::Network("offline".to_string()))
        }

        async fn fetch_project_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
            self.tasks
                .get(project_id)
                .cloned()
                .ok_or_else(|| TickTickError::Server {
                    status: 500,
                    message: "boom".to_string(),
                })
        }
    }

    fn task(id: &str, project: &str) -> Task {
        Task {
            id: id.to_string(),
            project_id: project.to_string(),
            title: format!("Task {}", id),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_all_records_failures() {
        let source = FakeSource {
            projects: Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
            tasks: HashMap::from([
                ("a".to_string(), vec![task("1", "a")]),
                ("c".to_string(), vec![task("2", "c"), task("3", "c")]),
            ]),
        };
        let outcome = fetch_all(&source, 2).await.unwrap();
        assert_eq!(outcome.projects_scanned, 3);
        assert_eq!(outcome.tasks.len(), 3);
        assert_eq!(outcome.failed_projects, vec!["b"]);
    }

    #[tokio::test]
    async fn test_refresh_listing_failure_leaves_cache_untouched() {
        let dir = TempDir::new().unwrap();
        let mut cache = TaskCache::open(dir.path().join("cache.json"));
        cache.register("old", "a", "Old", 0, vec![], None).unwrap();

        let source = FakeSource {
            projects: None,
            tasks: HashMap::new(),
        };
        assert!(cache.refresh(&source, 4).await.is_err());
        assert!(cache.get("old").is_some());
        assert!(cache.last_refresh().is_none());
    }

    #[tokio::test]
    async fn test_refresh_shared() {
        let dir = TempDir::new().unwrap();
        let shared = super::super::shared(TaskCache::open(dir.path().join("cache.json")));
        let source = FakeSource {
            projects: Some(vec!["a".to_string()]),
            tasks: HashMap::from([("a".to_string(), vec![task("1", "a")])]),
        };

        let report = refresh_shared(&shared, &source, 1).await.unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.projects_scanned, 1);
        assert_eq!(shared.read().await.project_of("1"), Some("a"));
    }

    /// Registers a task in the shared cache while its fetch is in flight.
    struct WriteDuringFetch {
        cache: SharedCache,
    }

    #[async_trait]
    impl TaskSource for WriteDuringFetch {
        async fn list_project_ids(&self) -> Result<Vec<String>> {
            Ok(vec!["a".to_string()])
        }

        async fn fetch_project_tasks(&self, _project_id: &str) -> Result<Vec<Task>> {
            self.cache
                .write()
                .await
                .register("late", "b", "Created mid-refresh", 0, vec![], None)?;
            Ok(vec![task("1", "a")])
        }

        fn inbox_id(&self) -> Option<String> {
            Some("inbox12345".to_string())
        }
    }

    #[tokio::test]
    async fn test_refresh_keeps_entry_written_during_fetch() {
        let dir = TempDir::new().unwrap();
        let shared = super::super::shared(TaskCache::open(dir.path().join("cache.json")));
        shared
            .write()
            .await
            .register("gone", "a", "Deleted remotely", 0, vec![], None)
            .unwrap();
        let source = WriteDuringFetch { cache: shared.clone() };

        let report = refresh_shared(&shared, &source, 1).await.unwrap();
        assert_eq!(report.removed, 1);
        let cache = shared.read().await;
        assert_eq!(cache.project_of("late"), Some("b"));
        assert_eq!(cache.project_of("1"), Some("a"));
        assert!(cache.get("gone").is_none());
        assert_eq!(cache.inbox_id(), Some("inbox12345"));
    }
}
