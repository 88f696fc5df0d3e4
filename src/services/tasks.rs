//! Task operations, write-through to the location cache.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::{check_batch_errors, list_of, require_v2};
use crate::api::{ApiVersion, Endpoints, TickTickClient};
use crate::cache::{self, SharedCache, TaskSource, entry::INBOX};
use crate::domain::{NewTask, Priority, Project, ProjectData, Task, TaskPatch, TaskStatus};
use crate::error::{Result, TickTickError};

/// Completed-task queries are capped at this many results.
pub const COMPLETED_LIMIT: usize = 100;

/// Client-side filter over fetched tasks. Every set condition must hold.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub priority: Option<Priority>,
    /// Any of these tags (case-insensitive)
    pub tags: Vec<String>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_after: Option<DateTime<Utc>>,
    /// Substring of title or content
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.priority.is_none()
            && self.tags.is_empty()
            && self.due_before.is_none()
            && self.due_after.is_none()
            && self.search.is_none()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(priority) = self.priority
            && task.priority_level() != priority
        {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| task.has_tag(t)) {
            return false;
        }
        if let Some(before) = self.due_before
            && !task.due_at().is_some_and(|d| d <= before)
        {
            return false;
        }
        if let Some(after) = self.due_after
            && !task.due_at().is_some_and(|d| d >= after)
        {
            return false;
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_content = task
                .content
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&needle));
            if !in_title && !in_content {
                return false;
            }
        }
        true
    }
}

#[derive(Clone)]
pub struct TaskService {
    client: Arc<TickTickClient>,
    cache: SharedCache,
    concurrency: usize,
    prefer_v2: bool,
}

impl TaskService {
    pub fn new(client: Arc<TickTickClient>, cache: SharedCache, concurrency: usize, prefer_v2: bool) -> Self {
        Self {
            client,
            cache,
            concurrency: concurrency.max(1),
            prefer_v2,
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    async fn remember(&self, task: &Task) {
        if task.is_completed() {
            self.forget(&task.id).await;
            return;
        }
        let mut cache = self.cache.write().await;
        if let Some(inbox_id) = self.client.inbox_id() {
            cache.set_inbox_id(inbox_id);
        }
        if let Err(e) = cache.register_task(task) {
            log::warn!("Failed to cache task {}: {}", task.id, e);
        }
    }

    async fn forget(&self, task_id: &str) {
        if let Err(e) = self.cache.write().await.unregister(task_id) {
            log::warn!("Failed to drop task {} from cache: {}", task_id, e);
        }
    }

    /// Open tasks across the account, or in one project.
    ///
    /// Listing the whole account doubles as a cache refresh.
    pub async fn list(&self, project_id: Option<&str>, include_completed: bool) -> Result<Vec<Task>> {
        let tasks = match project_id.filter(|p| !p.is_empty()) {
            Some(project_id) => self.project_tasks(project_id).await?,
            None => {
                let outcome = cache::fetch_all(self, self.concurrency).await?;
                let tasks = outcome.tasks.clone();
                if let Err(e) = self.cache.write().await.apply_fetch(outcome) {
                    log::warn!("Failed to update cache from task listing: {}", e);
                }
                tasks
            }
        };
        Ok(tasks
            .into_iter()
            .filter(|t| include_completed || !t.is_completed())
            .collect())
    }

    /// Open tasks carrying `tag`; a leading `#` is ignored.
    pub async fn tagged(&self, tag: &str) -> Result<Vec<Task>> {
        let tag = tag.trim().trim_start_matches('#');
        if tag.is_empty() {
            return Err(TickTickError::Validation("tag is required".to_string()));
        }
        let tasks = self.list(None, false).await?;
        Ok(tasks.into_iter().filter(|t| t.has_tag(tag)).collect())
    }

    pub async fn project_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        let value = self
            .client
            .get(ApiVersion::V1, &Endpoints::project_data(project_id))
            .await?;
        let data: ProjectData = serde_json::from_value(value)?;
        Ok(data
            .tasks
            .into_iter()
            .map(|mut task| {
                if task.project_id.is_empty() {
                    task.project_id = project_id.to_string();
                }
                task
            })
            .collect())
    }

    pub async fn get(&self, task_id: &str, project_id: &str) -> Result<Task> {
        let value = self
            .client
            .get(ApiVersion::V1, &Endpoints::project_task(project_id, task_id))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create(&self, new_task: &NewTask) -> Result<Task> {
        let payload = new_task.to_payload()?;
        let value = self.client.post(ApiVersion::V1, Endpoints::task(), &payload).await?;
        let task: Task = serde_json::from_value(value)?;
        log::info!("Created task {} in project {}", task.id, task.project_id);
        self.remember(&task).await;
        Ok(task)
    }

    /// Read-modify-write update so fields the patch does not name survive.
    pub async fn update(&self, task_id: &str, project_id: &str, patch: &TaskPatch) -> Result<Task> {
        if patch.is_empty() {
            return Err(TickTickError::Validation("no fields to update".to_string()));
        }
        let existing = self.get(task_id, project_id).await?;
        let payload = patch.apply_to(&existing)?;
        let value = self
            .client
            .post(ApiVersion::V1, &Endpoints::task_by_id(task_id), &payload)
            .await?;
        let task: Task = serde_json::from_value(value)?;
        self.remember(&task).await;
        Ok(task)
    }

    pub async fn complete(&self, task_id: &str, project_id: &str) -> Result<()> {
        self.client
            .post(ApiVersion::V1, &Endpoints::complete_task(project_id, task_id), &json!({}))
            .await?;
        self.forget(task_id).await;
        Ok(())
    }

    pub async fn uncomplete(&self, task_id: &str, project_id: &str) -> Result<Task> {
        let existing = self.get(task_id, project_id).await?;
        let mut payload = serde_json::to_value(&existing)?;
        payload["status"] = json!(TaskStatus::OPEN);
        payload["completedTime"] = Value::Null;
        let value = self
            .client
            .post(ApiVersion::V1, &Endpoints::task_by_id(task_id), &payload)
            .await?;
        let mut task: Task = serde_json::from_value(value)?;
        task.status = TaskStatus::OPEN;
        self.remember(&task).await;
        Ok(task)
    }

    /// Delete through the v2 batch endpoint when possible, else v1.
    pub async fn delete(&self, task_id: &str, project_id: &str) -> Result<()> {
        if self.prefer_v2 && self.client.has_v2() {
            match self.batch_delete_v2(&[(task_id.to_string(), project_id.to_string())]).await {
                Ok(()) => {
                    self.forget(task_id).await;
                    return Ok(());
                }
                Err(e) => log::warn!("v2 delete of {} failed, falling back to v1: {}", task_id, e),
            }
        }
        self.client
            .delete(ApiVersion::V1, &Endpoints::project_task(project_id, task_id))
            .await?;
        self.forget(task_id).await;
        Ok(())
    }

    async fn batch_delete_v2(&self, tasks: &[(String, String)]) -> Result<()> {
        let items: Vec<Value> = tasks
            .iter()
            .map(|(task_id, project_id)| json!({ "taskId": task_id, "projectId": project_id }))
            .collect();
        let response = self
            .client
            .post(ApiVersion::V2, Endpoints::batch_task(), &json!({ "delete": items }))
            .await?;
        check_batch_errors(&response)
    }

    /// Move a task between projects.
    ///
    /// Without a v2 session the task is recreated in the target project and
    /// then deleted from the source, so the returned task has a new id.
    pub async fn move_task(&self, task_id: &str, from_project: &str, to_project: &str) -> Result<Task> {
        if from_project == to_project {
            return Err(TickTickError::Validation(
                "source and target project are the same".to_string(),
            ));
        }

        if self.client.has_v2() {
            let payload = json!([{
                "fromProjectId": from_project,
                "taskId": task_id,
                "toProjectId": to_project,
            }]);
            let response = self
                .client
                .post(ApiVersion::V2, Endpoints::batch_task_project(), &payload)
                .await?;
            check_batch_errors(&response)?;
            let task = self.get(task_id, to_project).await?;
            self.remember(&task).await;
            return Ok(task);
        }

        let original = self.get(task_id, from_project).await?;
        let copy = NewTask {
            title: original.title.clone(),
            project_id: Some(to_project.to_string()),
            content: original.content.clone(),
            desc: original.desc.clone(),
            start_date: original.start_date.clone(),
            due_date: original.due_date.clone(),
            is_all_day: original.is_all_day,
            time_zone: original.time_zone.clone(),
            priority: Some(original.priority_level()),
            tags: original.tags.clone(),
            items: original.items.iter().map(|i| i.title.clone()).collect(),
            reminders: Vec::new(),
            repeat_flag: original.repeat_flag.clone(),
        };
        let moved = self.create(&copy).await?;
        self.client
            .delete(ApiVersion::V1, &Endpoints::project_task(from_project, task_id))
            .await?;
        self.forget(task_id).await;
        log::info!("Moved task {} to {} as {}", task_id, to_project, moved.id);
        Ok(moved)
    }

    /// Create a task and attach it under `parent_id` (v2).
    pub async fn create_subtask(&self, parent_id: &str, project_id: &str, new_task: &NewTask) -> Result<Task> {
        require_v2(&self.client, "Subtasks")?;
        let mut new_task = new_task.clone();
        new_task.project_id = Some(project_id.to_string());
        let child = self.create(&new_task).await?;

        let payload = json!([{
            "parentId": parent_id,
            "projectId": project_id,
            "taskId": child.id,
        }]);
        let response = self
            .client
            .post(ApiVersion::V2, Endpoints::batch_task_parent(), &payload)
            .await?;
        check_batch_errors(&response)?;

        let task = self.get(&child.id, project_id).await?;
        self.remember(&task).await;
        Ok(task)
    }

    /// Completed tasks in a date range (v2).
    pub async fn completed(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        project_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Task>> {
        require_v2(&self.client, "Completed tasks")?;
        let mut query = vec![("limit", limit.clamp(1, COMPLETED_LIMIT).to_string())];
        if let Some(from) = from {
            query.push(("from", from.to_string()));
        }
        if let Some(to) = to {
            query.push(("to", to.to_string()));
        }
        let path = match project_id.filter(|p| !p.is_empty()) {
            Some(project_id) => Endpoints::project_completed(project_id),
            None => Endpoints::all_completed().to_string(),
        };
        list_of(self.client.get_query(ApiVersion::V2, &path, &query).await?)
    }

    pub async fn batch_create(&self, new_tasks: &[NewTask]) -> Result<Vec<Task>> {
        if new_tasks.is_empty() {
            return Ok(Vec::new());
        }
        let payloads = new_tasks
            .iter()
            .map(NewTask::to_payload)
            .collect::<Result<Vec<_>>>()?;
        let response = self
            .client
            .post(ApiVersion::V1, Endpoints::batch_task(), &json!({ "add": payloads }))
            .await?;
        let created: Vec<Task> = match response.get("add") {
            Some(added) => list_of(added.clone())?,
            None => Vec::new(),
        };
        for task in &created {
            self.remember(task).await;
        }
        log::info!("Batch created {} tasks", created.len());
        Ok(created)
    }

    /// Delete `(task_id, project_id)` pairs; returns how many were deleted.
    pub async fn batch_delete(&self, tasks: &[(String, String)]) -> Result<usize> {
        if tasks.is_empty() {
            return Ok(0);
        }
        if self.client.has_v2() {
            self.batch_delete_v2(tasks).await?;
            for (task_id, _) in tasks {
                self.forget(task_id).await;
            }
        } else {
            for (task_id, project_id) in tasks {
                self.client
                    .delete(ApiVersion::V1, &Endpoints::project_task(project_id, task_id))
                    .await?;
                self.forget(task_id).await;
            }
        }
        Ok(tasks.len())
    }

    /// Find the project that holds `task_id`.
    ///
    /// Cache hits answer immediately. On a miss every project is scanned and
    /// the task is registered when found.
    pub async fn locate(&self, task_id: &str) -> Result<String> {
        match self.cached_project(task_id).await {
            Some(project_id) => Ok(project_id),
            None => self.scan_for(task_id).await,
        }
    }

    async fn cached_project(&self, task_id: &str) -> Option<String> {
        let cache = self.cache.read().await;
        let project_id = cache.project_of(task_id)?;
        if project_id.is_empty() {
            return Some(self.client.inbox_id().unwrap_or_else(|| INBOX.to_string()));
        }
        Some(project_id.to_string())
    }

    async fn scan_for(&self, task_id: &str) -> Result<String> {
        log::debug!("Scanning projects for task {}", task_id);
        for project_id in self.list_project_ids().await? {
            let tasks = match self.project_tasks(&project_id).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    log::warn!("Skipping project {} while locating {}: {}", project_id, task_id, e);
                    continue;
                }
            };
            if let Some(task) = tasks.into_iter().find(|t| t.id == task_id) {
                self.remember(&task).await;
                return Ok(task.project_id);
            }
        }
        Err(TickTickError::NotFound(format!(
            "Task {} not found in any project",
            task_id
        )))
    }

    /// Run `op` with the project that holds `task_id`.
    ///
    /// An explicit `project_id` is used as is. A location taken from the cache
    /// may be stale: if `op` answers `NotFound` there, the entry is dropped,
    /// the projects are rescanned once and `op` runs again.
    pub async fn with_located<T, F, Fut>(&self, task_id: &str, project_id: Option<&str>, op: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(project_id) = project_id.map(str::trim).filter(|p| !p.is_empty()) {
            return op(project_id.to_string()).await;
        }
        let Some(cached) = self.cached_project(task_id).await else {
            let project_id = self.scan_for(task_id).await?;
            return op(project_id).await;
        };
        match op(cached.clone()).await {
            Err(TickTickError::NotFound(message)) => {
                log::info!(
                    "Task {} is no longer in cached project {} ({}), rescanning",
                    task_id,
                    cached,
                    message
                );
                self.forget(task_id).await;
                let project_id = self.scan_for(task_id).await?;
                op(project_id).await
            }
            other => other,
        }
    }

    /// Use the given project id, or locate the task when it is absent.
    pub async fn resolve_project(&self, task_id: &str, project_id: Option<&str>) -> Result<String> {
        match project_id.map(str::trim).filter(|p| !p.is_empty()) {
            Some(project_id) => Ok(project_id.to_string()),
            None => self.locate(task_id).await,
        }
    }

    pub fn filter(tasks: Vec<Task>, filter: &TaskFilter) -> Vec<Task> {
        tasks.into_iter().filter(|t| filter.matches(t)).collect()
    }
}

#[async_trait]
impl TaskSource for TaskService {
    /// Active projects plus the inbox.
    async fn list_project_ids(&self) -> Result<Vec<String>> {
        let value = self.client.get(ApiVersion::V1, Endpoints::projects()).await?;
        let projects: Vec<Project> = list_of(value)?;
        let mut ids = vec![self.client.inbox_id().unwrap_or_else(|| INBOX.to_string())];
        ids.extend(projects.into_iter().filter(|p| !p.is_archived()).map(|p| p.id));
        Ok(ids)
    }

    async fn fetch_project_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        self.project_tasks(project_id).await
    }

    fn inbox_id(&self) -> Option<String> {
        self.client.inbox_id()
    }
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService")
            .field("concurrency", &self.concurrency)
            .field("prefer_v2", &self.prefer_v2)
            .finish_non_exhaustive()
    }
}
