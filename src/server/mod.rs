//! MCP ServerHandler implementation for TickTick.
//!
//! Every tool is prefixed `ticktick_` and returns a string: markdown by
//! default, JSON when `response_format` is `json`. Failures never reach the
//! protocol layer; they are rendered as `**Error**: ...` or an error object.
//!
//! **Auth**: `auth_status`, `configure_oauth`, `authorize_oauth`, `login`, `logout`
//!
//! **Tasks**: list, get, create, update, complete, uncomplete, delete, move,
//! subtasks, completed history, batch create and delete. Tools that take a
//! task id accept an optional `project_id` and locate the task otherwise.
//!
//! **Projects, folders, tags, habits, focus, calendar, user**: thin wrappers
//! over the matching services. Most of these need a v2 session.
//!
//! **Smart views**: today, tomorrow, overdue, next 7 days, search,
//! unscheduled, high priority, productivity summary, day schedule.
//!
//! **Statistics**: overview, daily summary, weekly report, productivity
//! score and task analytics.
//!
//! **Cache**: register, unregister, get, locate, search, by project, by tag,
//! list, query, clear, export, import, stats, refresh. Read tools refresh a
//! stale cache first when `cache.auto_refresh` is set.

pub mod helpers;
pub mod params;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler, tool, tool_handler, tool_router};
use serde_json::{Value, json};

use crate::api::TickTickClient;
use crate::cache::{self, CacheQuery, TaskCache};
use crate::config::{CacheConfig, Config};
use crate::domain::{HabitStatus, NewFocusRecord, NewHabit, NewTag, NewTask, Tag, normalize_date_input};
use crate::error::{Result as TickTickResult, TickTickError};
use crate::format::{ResponseFormat, markdown, to_json};
use crate::services::{Services, TaskFilter, TaskService};

use helpers::{confirm, non_empty, parse_day, parse_instant, parse_optional_day, respond};
use params::*;

const DEFAULT_COMPLETED_LIMIT: usize = 50;

/// TickTick MCP server: every service behind one tool router.
#[derive(Clone)]
pub struct TickTickMcpServer {
    tool_router: ToolRouter<Self>,
    services: Services,
    cache_ttl: Duration,
    auto_refresh: bool,
}

impl TickTickMcpServer {
    pub fn new(services: Services, cache: &CacheConfig) -> Self {
        Self {
            tool_router: Self::tool_router(),
            services,
            cache_ttl: Duration::from_secs(cache.ttl_secs),
            auto_refresh: cache.auto_refresh,
        }
    }

    /// Wire the client, cache and services from configuration.
    pub fn from_config(config: &Config) -> TickTickResult<Self> {
        let client = Arc::new(TickTickClient::from_config(config)?);
        let cache = cache::shared(TaskCache::open(&config.cache.path));
        let services = Services::new(
            client,
            cache,
            config.api.max_concurrent_requests,
            config.api.prefer_v2,
        );
        Ok(Self::new(services, &config.cache))
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    async fn project_for(&self, task_id: &str, project_id: &Option<String>) -> TickTickResult<String> {
        self.services
            .tasks
            .resolve_project(task_id, non_empty(project_id))
            .await
    }

    /// Refresh before a cache read when enabled, stale and authenticated.
    async fn ensure_fresh(&self) {
        if !self.auto_refresh || !self.services.client.is_authenticated() {
            return;
        }
        if !self.services.cache.read().await.is_stale(self.cache_ttl) {
            return;
        }
        log::info!("Cache is stale, refreshing before read");
        let tasks = &self.services.tasks;
        if let Err(e) = cache::refresh_shared(&self.services.cache, tasks, tasks.concurrency()).await {
            log::warn!("Automatic cache refresh failed: {}", e);
        }
    }

    fn task_filter(p: &ListTasksParams) -> TickTickResult<TaskFilter> {
        Ok(TaskFilter {
            priority: p.priority,
            tags: p.tags.clone().unwrap_or_default(),
            due_before: parse_instant("due_before", p.due_before.as_deref())?,
            due_after: parse_instant("due_after", p.due_after.as_deref())?,
            search: non_empty(&p.search).map(str::to_string),
        })
    }

    fn build_cache_query(p: &CacheQueryParams) -> TickTickResult<CacheQuery> {
        Ok(CacheQuery {
            project_id: non_empty(&p.project_id).map(str::to_string),
            tag: non_empty(&p.tag).map(str::to_string),
            priority: p.priority,
            min_priority: p.min_priority,
            text: non_empty(&p.text).map(str::to_string),
            due_before: parse_instant("due_before", p.due_before.as_deref())?,
            due_after: parse_instant("due_after", p.due_after.as_deref())?,
            has_due_date: p.has_due_date,
            limit: p.limit,
        })
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for TickTickMcpServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = "TickTick task manager. Authenticate first: ticktick_login (v2 session, \
             needed for tags, habits, focus, calendar and folders) and/or \
             ticktick_configure_oauth + ticktick_authorize_oauth (official v1 API). \
             ticktick_auth_status shows what is available.\n\
             Task tools accept an optional project_id; when omitted the task is located through \
             the local cache, falling back to a scan of every project.\n\
             Smart views (ticktick_get_today, ticktick_get_overdue, ticktick_get_next_7_days, \
             ticktick_search_tasks, ticktick_productivity_summary, ticktick_schedule_day) and \
             statistics (ticktick_get_overview, ticktick_get_productivity_score, \
             ticktick_get_task_analytics) work across all projects.\n\
             The cache tools (ticktick_cache_*) answer lookups without API calls; \
             ticktick_cache_refresh rebuilds the cache from the server.\n\
             Every tool accepts response_format: 'markdown' (default) or 'json'."
            .to_string();

        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "ticktick-mcp".to_string(),
                title: Some("TickTick MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some(
                    "MCP server for TickTick tasks, projects, tags, habits, focus and calendar, \
                     with a local task location cache"
                        .to_string(),
                ),
                icons: None,
                website_url: None,
            },
            instructions: Some(instructions),
        }
    }
}

#[tool_router(router = tool_router)]
impl TickTickMcpServer {
    // ── Auth ──

    #[tool(
        name = "ticktick_auth_status",
        description = "Show which TickTick APIs are authenticated (v1 OAuth, v2 session) and how to sign in."
    )]
    pub async fn auth_status(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let status = self.services.client.auth_status();
        p.response_format.render(&status, markdown::auth_status)
    }

    #[tool(
        name = "ticktick_configure_oauth",
        description = "Store OAuth app credentials and return the URL the user must open to authorize access."
    )]
    pub async fn configure_oauth(&self, Parameters(p): Parameters<ConfigureOAuthParams>) -> String {
        let result = self.services.client.configure_oauth(
            &p.client_id,
            &p.client_secret,
            non_empty(&p.redirect_uri),
        );
        respond(ResponseFormat::Markdown, result, |url| {
            format!(
                "## Authorize TickTick\n\n1. Open: {}\n2. Approve access\n3. Copy the `code` parameter from the redirect URL\n4. Call `ticktick_authorize_oauth` with that code",
                url
            )
        })
    }

    #[tool(
        name = "ticktick_authorize_oauth",
        description = "Exchange an OAuth authorization code for an access token and save it."
    )]
    pub async fn authorize_oauth(&self, Parameters(p): Parameters<AuthorizeOAuthParams>) -> String {
        let result = self.services.client.exchange_code(&p.code).await.map(|token| {
            json!({
                "authorized": true,
                "token_type": token.token_type,
                "expires_in_seconds": token.seconds_until_expiry(),
            })
        });
        respond(ResponseFormat::Markdown, result, |_| {
            "OAuth authorization complete. The v1 API is ready.".to_string()
        })
    }

    #[tool(
        name = "ticktick_login",
        description = "Sign in with TickTick username and password to enable the v2 API (tags, habits, focus, calendar, folders)."
    )]
    pub async fn login(&self, Parameters(p): Parameters<LoginParams>) -> String {
        let result = self
            .services
            .client
            .login(&p.username, &p.password)
            .await
            .map(|session| json!({ "logged_in": true, "user_id": session.user_id, "inbox_id": session.inbox_id }));
        respond(ResponseFormat::Markdown, result, |v| {
            format!(
                "Logged in. Inbox: `{}`",
                v["inbox_id"].as_str().unwrap_or("unknown")
            )
        })
    }

    #[tool(name = "ticktick_logout", description = "Forget all stored TickTick credentials.")]
    pub async fn logout(&self, Parameters(p): Parameters<FormatParams>) -> String {
        confirm(p.response_format, self.services.client.logout(), "Logged out")
    }

    // ── Tasks ──

    #[tool(
        name = "ticktick_list_tasks",
        description = "List open tasks in one project or across all projects, optionally filtered by priority, tags, due dates or text. Listing all projects also refreshes the cache."
    )]
    pub async fn list_tasks(&self, Parameters(p): Parameters<ListTasksParams>) -> String {
        let fmt = p.response_format;
        let filter = match Self::task_filter(&p) {
            Ok(filter) => filter,
            Err(e) => return fmt.error(&e),
        };
        let result = self
            .services
            .tasks
            .list(non_empty(&p.project_id), p.include_completed)
            .await
            .map(|tasks| TaskService::filter(tasks, &filter));
        respond(fmt, result, |t| markdown::tasks(t, "Tasks"))
    }

    #[tool(name = "ticktick_get_task", description = "Get one task with all its details.")]
    pub async fn get_task(&self, Parameters(p): Parameters<TaskRefParams>) -> String {
        let tasks = &self.services.tasks;
        let task_id = p.task_id.as_str();
        let result = tasks
            .with_located(task_id, non_empty(&p.project_id), move |project| async move {
                tasks.get(task_id, &project).await
            })
            .await;
        respond(p.response_format, result, markdown::task)
    }

    #[tool(
        name = "ticktick_create_task",
        description = "Create a task. Dates accept YYYY-MM-DD or ISO 8601; priority is none, low, medium or high."
    )]
    pub async fn create_task(&self, Parameters(p): Parameters<CreateTaskParams>) -> String {
        let new_task = p.task.into_new_task();
        let result = self.services.tasks.create(&new_task).await;
        respond(p.response_format, result, markdown::task)
    }

    #[tool(
        name = "ticktick_update_task",
        description = "Update fields of a task. Only the given fields change; everything else is preserved."
    )]
    pub async fn update_task(&self, Parameters(p): Parameters<UpdateTaskParams>) -> String {
        let patch = &p.patch();
        let tasks = &self.services.tasks;
        let task_id = p.task_id.as_str();
        let result = tasks
            .with_located(task_id, non_empty(&p.project_id), move |project| async move {
                tasks.update(task_id, &project, patch).await
            })
            .await;
        respond(p.response_format, result, markdown::task)
    }

    #[tool(name = "ticktick_complete_task", description = "Mark a task complete.")]
    pub async fn complete_task(&self, Parameters(p): Parameters<TaskRefParams>) -> String {
        let tasks = &self.services.tasks;
        let task_id = p.task_id.as_str();
        let result = tasks
            .with_located(task_id, non_empty(&p.project_id), move |project| async move {
                tasks.complete(task_id, &project).await
            })
            .await;
        confirm(p.response_format, result, &format!("Task `{}` completed", p.task_id))
    }

    #[tool(name = "ticktick_uncomplete_task", description = "Reopen a completed task.")]
    pub async fn uncomplete_task(&self, Parameters(p): Parameters<TaskRefParams>) -> String {
        let tasks = &self.services.tasks;
        let task_id = p.task_id.as_str();
        let result = tasks
            .with_located(task_id, non_empty(&p.project_id), move |project| async move {
                tasks.uncomplete(task_id, &project).await
            })
            .await;
        respond(p.response_format, result, markdown::task)
    }

    #[tool(name = "ticktick_delete_task", description = "Delete a task permanently.")]
    pub async fn delete_task(&self, Parameters(p): Parameters<TaskRefParams>) -> String {
        let tasks = &self.services.tasks;
        let task_id = p.task_id.as_str();
        let result = tasks
            .with_located(task_id, non_empty(&p.project_id), move |project| async move {
                tasks.delete(task_id, &project).await
            })
            .await;
        confirm(p.response_format, result, &format!("Task `{}` deleted", p.task_id))
    }

    #[tool(
        name = "ticktick_move_task",
        description = "Move a task to another project. Without a v2 session the task is recreated and gets a new id."
    )]
    pub async fn move_task(&self, Parameters(p): Parameters<MoveTaskParams>) -> String {
        let tasks = &self.services.tasks;
        let task_id = p.task_id.as_str();
        let to = p.to_project_id.trim();
        let result = tasks
            .with_located(task_id, non_empty(&p.from_project_id), move |from| async move {
                tasks.move_task(task_id, &from, to).await
            })
            .await;
        respond(p.response_format, result, markdown::task)
    }

    #[tool(
        name = "ticktick_create_subtask",
        description = "Create a task nested under a parent task (requires v2 session)."
    )]
    pub async fn create_subtask(&self, Parameters(p): Parameters<CreateSubtaskParams>) -> String {
        let new_task = NewTask {
            content: p.content.clone(),
            priority: p.priority,
            due_date: p.due_date.clone(),
            ..NewTask::new(p.title.clone())
        };
        let result = async {
            let project = self.project_for(&p.parent_task_id, &p.project_id).await?;
            self.services
                .tasks
                .create_subtask(&p.parent_task_id, &project, &new_task)
                .await
        }
        .await;
        respond(p.response_format, result, markdown::task)
    }

    #[tool(
        name = "ticktick_get_completed_tasks",
        description = "List completed tasks in a date range, newest first (requires v2 session, at most 100)."
    )]
    pub async fn get_completed_tasks(&self, Parameters(p): Parameters<CompletedTasksParams>) -> String {
        let result = self
            .services
            .tasks
            .completed(
                non_empty(&p.from_date),
                non_empty(&p.to_date),
                non_empty(&p.project_id),
                p.limit.unwrap_or(DEFAULT_COMPLETED_LIMIT),
            )
            .await;
        respond(p.response_format, result, |t| markdown::tasks(t, "Completed Tasks"))
    }

    #[tool(name = "ticktick_batch_create_tasks", description = "Create several tasks in one request.")]
    pub async fn batch_create_tasks(&self, Parameters(p): Parameters<BatchCreateTasksParams>) -> String {
        let new_tasks: Vec<NewTask> = p.tasks.into_iter().map(TaskInput::into_new_task).collect();
        let result = self.services.tasks.batch_create(&new_tasks).await;
        respond(p.response_format, result, |t| markdown::tasks(t, "Created Tasks"))
    }

    #[tool(name = "ticktick_batch_delete_tasks", description = "Delete several tasks at once.")]
    pub async fn batch_delete_tasks(&self, Parameters(p): Parameters<BatchDeleteTasksParams>) -> String {
        let result = async {
            let mut pairs = Vec::with_capacity(p.tasks.len());
            for task in &p.tasks {
                let project = self.project_for(&task.task_id, &task.project_id).await?;
                pairs.push((task.task_id.clone(), project));
            }
            self.services.tasks.batch_delete(&pairs).await
        }
        .await
        .map(|deleted| json!({ "deleted": deleted }));
        respond(p.response_format, result, |v| format!("Deleted {} task(s)", v["deleted"]))
    }

    // ── Projects ──

    #[tool(name = "ticktick_list_projects", description = "List projects, optionally including archived ones.")]
    pub async fn list_projects(&self, Parameters(p): Parameters<ListProjectsParams>) -> String {
        let result = self.services.projects.list(p.include_archived).await;
        respond(p.response_format, result, |list| markdown::projects(list))
    }

    #[tool(name = "ticktick_get_project", description = "Get one project.")]
    pub async fn get_project(&self, Parameters(p): Parameters<ProjectIdParams>) -> String {
        let result = self.services.projects.get(&p.project_id).await;
        respond(p.response_format, result, markdown::project)
    }

    #[tool(name = "ticktick_get_project_tasks", description = "List the open tasks in a project.")]
    pub async fn get_project_tasks(&self, Parameters(p): Parameters<ProjectIdParams>) -> String {
        let result = self.services.tasks.list(Some(&p.project_id), false).await;
        respond(p.response_format, result, |t| markdown::tasks(t, "Project Tasks"))
    }

    #[tool(name = "ticktick_create_project", description = "Create a project.")]
    pub async fn create_project(&self, Parameters(p): Parameters<CreateProjectParams>) -> String {
        let result = self.services.projects.create(&p.new_project()).await;
        respond(p.response_format, result, markdown::project)
    }

    #[tool(
        name = "ticktick_update_project",
        description = "Rename, recolor or move a project (requires v2 session)."
    )]
    pub async fn update_project(&self, Parameters(p): Parameters<UpdateProjectParams>) -> String {
        let result = self.services.projects.update(&p.project_id, &p.patch()).await;
        respond(p.response_format, result, markdown::project)
    }

    #[tool(name = "ticktick_delete_project", description = "Delete a project and its tasks.")]
    pub async fn delete_project(&self, Parameters(p): Parameters<ProjectIdParams>) -> String {
        let result = self.services.projects.delete(&p.project_id).await;
        confirm(p.response_format, result, &format!("Project `{}` deleted", p.project_id))
    }

    #[tool(name = "ticktick_archive_project", description = "Archive a project (requires v2 session).")]
    pub async fn archive_project(&self, Parameters(p): Parameters<ProjectIdParams>) -> String {
        let result = self.services.projects.set_archived(&p.project_id, true).await;
        confirm(p.response_format, result, &format!("Project `{}` archived", p.project_id))
    }

    #[tool(name = "ticktick_unarchive_project", description = "Restore an archived project (requires v2 session).")]
    pub async fn unarchive_project(&self, Parameters(p): Parameters<ProjectIdParams>) -> String {
        let result = self.services.projects.set_archived(&p.project_id, false).await;
        confirm(p.response_format, result, &format!("Project `{}` restored", p.project_id))
    }

    #[tool(name = "ticktick_list_folders", description = "List project folders (requires v2 session).")]
    pub async fn list_folders(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.projects.folders().await;
        respond(p.response_format, result, |f| markdown::folders(f))
    }

    #[tool(name = "ticktick_create_folder", description = "Create a project folder (requires v2 session).")]
    pub async fn create_folder(&self, Parameters(p): Parameters<CreateFolderParams>) -> String {
        let result = self.services.projects.create_folder(&p.name).await;
        respond(p.response_format, result, |f| {
            format!("Created folder **{}** `{}`", f.name, f.id)
        })
    }

    #[tool(
        name = "ticktick_update_folder",
        description = "Rename or reorder a project folder (requires v2 session)."
    )]
    pub async fn update_folder(&self, Parameters(p): Parameters<UpdateFolderParams>) -> String {
        let result = self
            .services
            .projects
            .update_folder(&p.folder_id, p.name.as_deref(), p.sort_order)
            .await;
        respond(p.response_format, result, markdown::folder)
    }

    #[tool(
        name = "ticktick_delete_folder",
        description = "Delete a project folder; its projects move to the top level (requires v2 session)."
    )]
    pub async fn delete_folder(&self, Parameters(p): Parameters<FolderIdParams>) -> String {
        let result = self.services.projects.delete_folder(&p.folder_id).await;
        confirm(p.response_format, result, &format!("Folder `{}` deleted", p.folder_id))
    }

    // ── Tags ──

    #[tool(name = "ticktick_list_tags", description = "List tags, nested by parent (requires v2 session).")]
    pub async fn list_tags(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.tags.list().await;
        respond(p.response_format, result, |t| markdown::tags(t))
    }

    #[tool(name = "ticktick_create_tag", description = "Create a tag (requires v2 session).")]
    pub async fn create_tag(&self, Parameters(p): Parameters<CreateTagParams>) -> String {
        let new_tag = NewTag {
            name: p.name.clone(),
            color: p.color.clone(),
            parent: non_empty(&p.parent).map(str::to_string),
        };
        let result = self.services.tags.create(&new_tag).await;
        respond(p.response_format, result, single_tag)
    }

    #[tool(
        name = "ticktick_update_tag",
        description = "Change a tag's label, color, parent or order (requires v2 session)."
    )]
    pub async fn update_tag(&self, Parameters(p): Parameters<UpdateTagParams>) -> String {
        let result = self.services.tags.update(&p.name, &p.patch()).await;
        respond(p.response_format, result, single_tag)
    }

    #[tool(
        name = "ticktick_rename_tag",
        description = "Rename a tag on every task that uses it (requires v2 session)."
    )]
    pub async fn rename_tag(&self, Parameters(p): Parameters<RenameTagParams>) -> String {
        let result = self.services.tags.rename(&p.name, &p.new_name).await;
        respond(p.response_format, result, single_tag)
    }

    #[tool(
        name = "ticktick_merge_tags",
        description = "Merge source tags into a target tag, retagging their tasks (requires v2 session)."
    )]
    pub async fn merge_tags(&self, Parameters(p): Parameters<MergeTagsParams>) -> String {
        let result = self.services.tags.merge(&p.source_tags, &p.target_tag).await;
        respond(p.response_format, result, single_tag)
    }

    #[tool(
        name = "ticktick_get_tag_tasks",
        description = "Open tasks carrying a tag, across every project."
    )]
    pub async fn get_tag_tasks(&self, Parameters(p): Parameters<TagTasksParams>) -> String {
        let result = self.services.tasks.tagged(&p.tag).await;
        let title = format!("Tag: #{}", p.tag.trim().trim_start_matches('#'));
        respond(p.response_format, result, |t| markdown::tasks(t, &title))
    }

    #[tool(name = "ticktick_delete_tag", description = "Delete a tag (requires v2 session).")]
    pub async fn delete_tag(&self, Parameters(p): Parameters<TagNameParams>) -> String {
        let result = self.services.tags.delete(&p.name).await;
        confirm(p.response_format, result, &format!("Tag `{}` deleted", p.name))
    }

    // ── Habits ──

    #[tool(name = "ticktick_list_habits", description = "List habits, optionally by status (requires v2 session).")]
    pub async fn list_habits(&self, Parameters(p): Parameters<ListHabitsParams>) -> String {
        let result = self.services.habits.list(p.status).await;
        respond(p.response_format, result, |h| markdown::habits(h))
    }

    #[tool(name = "ticktick_get_habit", description = "Get one habit with its streaks (requires v2 session).")]
    pub async fn get_habit(&self, Parameters(p): Parameters<HabitIdParams>) -> String {
        let result = self.services.habits.get(&p.habit_id).await;
        respond(p.response_format, result, markdown::habit)
    }

    #[tool(name = "ticktick_create_habit", description = "Create a habit (requires v2 session).")]
    pub async fn create_habit(&self, Parameters(p): Parameters<CreateHabitParams>) -> String {
        let defaults = NewHabit::default();
        let new_habit = NewHabit {
            name: p.name.clone(),
            goal: p.goal.unwrap_or(defaults.goal),
            goal_type: p.goal_type.clone().unwrap_or(defaults.goal_type),
            unit: p.unit.clone(),
            frequency: p.frequency.clone().unwrap_or(defaults.frequency),
            repeat_days: p.repeat_days.clone().unwrap_or_default(),
            reminder_time: p.reminder_time.clone(),
            color: p.color.clone(),
            icon: p.icon.clone(),
        };
        let result = self.services.habits.create(&new_habit).await;
        respond(p.response_format, result, markdown::habit)
    }

    #[tool(name = "ticktick_update_habit", description = "Update a habit's settings (requires v2 session).")]
    pub async fn update_habit(&self, Parameters(p): Parameters<UpdateHabitParams>) -> String {
        let result = self.services.habits.update(&p.habit_id, &p.patch()).await;
        respond(p.response_format, result, markdown::habit)
    }

    #[tool(name = "ticktick_pause_habit", description = "Pause a habit (requires v2 session).")]
    pub async fn pause_habit(&self, Parameters(p): Parameters<HabitIdParams>) -> String {
        let result = self.services.habits.set_status(&p.habit_id, HabitStatus::Paused).await;
        respond(p.response_format, result, markdown::habit)
    }

    #[tool(name = "ticktick_resume_habit", description = "Resume a paused habit (requires v2 session).")]
    pub async fn resume_habit(&self, Parameters(p): Parameters<HabitIdParams>) -> String {
        let result = self.services.habits.set_status(&p.habit_id, HabitStatus::Active).await;
        respond(p.response_format, result, markdown::habit)
    }

    #[tool(name = "ticktick_archive_habit", description = "Archive a habit (requires v2 session).")]
    pub async fn archive_habit(&self, Parameters(p): Parameters<HabitIdParams>) -> String {
        let result = self.services.habits.set_status(&p.habit_id, HabitStatus::Archived).await;
        respond(p.response_format, result, markdown::habit)
    }

    #[tool(name = "ticktick_delete_habit", description = "Delete a habit and its history (requires v2 session).")]
    pub async fn delete_habit(&self, Parameters(p): Parameters<HabitIdParams>) -> String {
        let result = self.services.habits.delete(&p.habit_id).await;
        confirm(p.response_format, result, &format!("Habit `{}` deleted", p.habit_id))
    }

    #[tool(
        name = "ticktick_checkin_habit",
        description = "Record progress on a habit for a day, today by default (requires v2 session)."
    )]
    pub async fn checkin_habit(&self, Parameters(p): Parameters<CheckinParams>) -> String {
        let result = async {
            let date = parse_optional_day("date", p.date.as_deref())?;
            self.services
                .habits
                .checkin(&p.habit_id, date, p.value.unwrap_or(1.0), non_empty(&p.note))
                .await
        }
        .await;
        respond(p.response_format, result, |r| {
            format!("Checked in `{}` on {} with {}", r.habit_id, r.date, r.value)
        })
    }

    #[tool(
        name = "ticktick_undo_checkin",
        description = "Reset a habit's check-in for a day, today by default (requires v2 session)."
    )]
    pub async fn undo_checkin(&self, Parameters(p): Parameters<UndoCheckinParams>) -> String {
        let result = async {
            let date = parse_optional_day("date", p.date.as_deref())?.unwrap_or_else(|| Local::now().date_naive());
            self.services.habits.undo_checkin(&p.habit_id, date).await
        }
        .await;
        confirm(p.response_format, result, &format!("Check-in for `{}` undone", p.habit_id))
    }

    #[tool(name = "ticktick_get_habit_records", description = "List a habit's check-ins (requires v2 session).")]
    pub async fn get_habit_records(&self, Parameters(p): Parameters<HabitRecordsParams>) -> String {
        let result = async {
            let from = parse_optional_day("from_date", p.from_date.as_deref())?;
            let to = parse_optional_day("to_date", p.to_date.as_deref())?;
            self.services.habits.records(&p.habit_id, from, to).await
        }
        .await;
        respond(p.response_format, result, |r| markdown::habit_records(r))
    }

    #[tool(
        name = "ticktick_get_today_habits",
        description = "Today's progress on every active habit (requires v2 session)."
    )]
    pub async fn get_today_habits(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.habits.today_status().await;
        respond(p.response_format, result, |h| markdown::habit_progress(h))
    }

    #[tool(
        name = "ticktick_get_habit_stats",
        description = "Streaks, total check-ins and 30-day completion rate of a habit (requires v2 session)."
    )]
    pub async fn get_habit_stats(&self, Parameters(p): Parameters<HabitIdParams>) -> String {
        let result = self.services.habits.stats(&p.habit_id).await;
        respond(p.response_format, result, markdown::habit_stats)
    }

    // ── Focus ──

    #[tool(
        name = "ticktick_get_focus_records",
        description = "List focus (pomodoro) sessions in a date range (requires v2 session)."
    )]
    pub async fn get_focus_records(&self, Parameters(p): Parameters<FocusRecordsParams>) -> String {
        let result = async {
            let from = parse_optional_day("from_date", p.from_date.as_deref())?;
            let to = parse_optional_day("to_date", p.to_date.as_deref())?;
            self.services
                .focus
                .records(from, to, non_empty(&p.task_id))
                .await
        }
        .await;
        respond(p.response_format, result, |r| markdown::focus_records(r))
    }

    #[tool(
        name = "ticktick_save_focus_record",
        description = "Record a finished focus session (requires v2 session)."
    )]
    pub async fn save_focus_record(&self, Parameters(p): Parameters<SaveFocusRecordParams>) -> String {
        let result = async {
            let duration_secs = p.duration_minutes.saturating_mul(60);
            let start_time = parse_instant("start_time", p.start_time.as_deref())?
                .unwrap_or_else(|| Utc::now() - chrono::Duration::seconds(duration_secs.max(0)));
            let record = NewFocusRecord {
                duration_secs,
                focus_type: non_empty(&p.focus_type).unwrap_or("pomo").to_string(),
                start_time,
                task_id: non_empty(&p.task_id).map(str::to_string),
                project_id: non_empty(&p.project_id).map(str::to_string),
                note: non_empty(&p.note).map(str::to_string),
            };
            self.services.focus.save_record(&record).await
        }
        .await;
        respond(p.response_format, result, |r| {
            markdown::focus_records(std::slice::from_ref(r))
        })
    }

    #[tool(name = "ticktick_delete_focus_record", description = "Delete a focus session (requires v2 session).")]
    pub async fn delete_focus_record(&self, Parameters(p): Parameters<FocusRecordIdParams>) -> String {
        let result = self.services.focus.delete_record(&p.record_id).await;
        confirm(p.response_format, result, &format!("Focus record `{}` deleted", p.record_id))
    }

    #[tool(name = "ticktick_get_pomo_settings", description = "Show pomodoro durations and the daily target (requires v2 session).")]
    pub async fn get_pomo_settings(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.focus.settings().await;
        respond(p.response_format, result, markdown::pomo_settings)
    }

    #[tool(
        name = "ticktick_update_focus_settings",
        description = "Change pomodoro durations or the daily target; unset fields keep their values (requires v2 session)."
    )]
    pub async fn update_focus_settings(&self, Parameters(p): Parameters<UpdateFocusSettingsParams>) -> String {
        let result = self.services.focus.update_settings(&p.changes()).await;
        respond(p.response_format, result, markdown::pomo_settings)
    }

    #[tool(
        name = "ticktick_get_focus_stats",
        description = "Total focus time, sessions and breakdown by task and type for a date range (requires v2 session)."
    )]
    pub async fn get_focus_stats(&self, Parameters(p): Parameters<DateRangeParams>) -> String {
        let result = async {
            let from = parse_optional_day("from_date", p.from_date.as_deref())?;
            let to = parse_optional_day("to_date", p.to_date.as_deref())?;
            self.services.focus.stats(from, to).await
        }
        .await;
        respond(p.response_format, result, |s| markdown::focus_stats(s, "Focus Statistics"))
    }

    #[tool(
        name = "ticktick_get_today_focus",
        description = "Today's focus time against the daily pomodoro target (requires v2 session)."
    )]
    pub async fn get_today_focus(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.focus.today().await;
        respond(p.response_format, result, markdown::today_focus)
    }

    // ── Calendar ──

    #[tool(
        name = "ticktick_calendar_events",
        description = "Events from subscribed calendars between two days (requires v2 session)."
    )]
    pub async fn calendar_events(&self, Parameters(p): Parameters<CalendarEventsParams>) -> String {
        let result = async {
            let start = parse_day("start_date", &p.start_date)?;
            let end = parse_optional_day("end_date", p.end_date.as_deref())?.unwrap_or(start);
            self.services.calendar.events(start, end).await
        }
        .await;
        respond(p.response_format, result, |e| markdown::calendar_events(e, "Calendar"))
    }

    #[tool(name = "ticktick_calendar_today", description = "Today's calendar events (requires v2 session).")]
    pub async fn calendar_today(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.calendar.today().await;
        respond(p.response_format, result, |e| markdown::calendar_events(e, "Today"))
    }

    #[tool(
        name = "ticktick_calendar_week",
        description = "Calendar events from today through the next seven days (requires v2 session)."
    )]
    pub async fn calendar_week(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.calendar.week().await;
        respond(p.response_format, result, |e| markdown::calendar_events(e, "This Week"))
    }

    #[tool(name = "ticktick_list_calendars", description = "List subscribed calendars (requires v2 session).")]
    pub async fn list_calendars(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.calendar.calendars().await;
        respond(p.response_format, result, |c| markdown::calendars(c))
    }

    // ── Smart views ──

    #[tool(name = "ticktick_get_today", description = "Open tasks due today, highest priority first.")]
    pub async fn get_today(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.smart.today_tasks().await;
        respond(p.response_format, result, |t| markdown::tasks(t, "Today"))
    }

    #[tool(name = "ticktick_get_tomorrow", description = "Open tasks due tomorrow.")]
    pub async fn get_tomorrow(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.smart.tomorrow_tasks().await;
        respond(p.response_format, result, |t| markdown::tasks(t, "Tomorrow"))
    }

    #[tool(name = "ticktick_get_overdue", description = "Open tasks due before today, oldest first.")]
    pub async fn get_overdue(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.smart.overdue().await;
        respond(p.response_format, result, |t| markdown::tasks(t, "Overdue"))
    }

    #[tool(name = "ticktick_get_next_7_days", description = "Open tasks for the coming days, grouped by date.")]
    pub async fn get_next_7_days(&self, Parameters(p): Parameters<NextDaysParams>) -> String {
        let result = self.services.smart.next_days(p.days.unwrap_or(7)).await;
        respond(p.response_format, result, |g| markdown::day_groups(g, "Upcoming"))
    }

    #[tool(
        name = "ticktick_search_tasks",
        description = "Search task titles, content and tags, ranked by relevance and priority."
    )]
    pub async fn search_tasks(&self, Parameters(p): Parameters<SearchTasksParams>) -> String {
        let result = self
            .services
            .smart
            .search(&p.query, non_empty(&p.project_id), p.include_completed)
            .await;
        let title = format!("Search: {}", p.query.trim());
        respond(p.response_format, result, |t| markdown::tasks(t, &title))
    }

    #[tool(name = "ticktick_get_unscheduled", description = "Open tasks with no start or due date.")]
    pub async fn get_unscheduled(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.smart.unscheduled().await;
        respond(p.response_format, result, |t| markdown::tasks(t, "Unscheduled"))
    }

    #[tool(name = "ticktick_get_high_priority", description = "Open high-priority tasks.")]
    pub async fn get_high_priority(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.smart.high_priority().await;
        respond(p.response_format, result, |t| markdown::tasks(t, "High Priority"))
    }

    #[tool(
        name = "ticktick_productivity_summary",
        description = "Counts of open tasks by priority and due bucket, with suggestions."
    )]
    pub async fn productivity_summary(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.smart.productivity_summary().await;
        respond(p.response_format, result, markdown::productivity_summary)
    }

    #[tool(
        name = "ticktick_schedule_day",
        description = "Plan a day's tasks plus the oldest overdue ones into morning, afternoon and evening blocks."
    )]
    pub async fn schedule_day(&self, Parameters(p): Parameters<DayParams>) -> String {
        let result = async {
            let date = parse_optional_day("date", p.date.as_deref())?;
            self.services.smart.schedule_day(date).await
        }
        .await;
        respond(p.response_format, result, markdown::day_schedule)
    }

    // ── Statistics ──

    #[tool(
        name = "ticktick_get_overview",
        description = "Today at a glance: open, due and overdue tasks, plus habits and focus with a v2 session."
    )]
    pub async fn get_overview(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.statistics.overview().await;
        respond(p.response_format, result, markdown::overview)
    }

    #[tool(
        name = "ticktick_get_daily_summary",
        description = "Tasks completed and focus sessions on one day (requires v2 session)."
    )]
    pub async fn get_daily_summary(&self, Parameters(p): Parameters<DayParams>) -> String {
        let result = async {
            let date = parse_optional_day("date", p.date.as_deref())?;
            self.services.statistics.daily_summary(date).await
        }
        .await;
        respond(p.response_format, result, markdown::daily_summary)
    }

    #[tool(
        name = "ticktick_get_weekly_report",
        description = "Completions, focus minutes and pomodoros per day for a Monday-to-Sunday week (requires v2 session)."
    )]
    pub async fn get_weekly_report(&self, Parameters(p): Parameters<WeeklyReportParams>) -> String {
        let result = self.services.statistics.weekly_report(p.weeks_back).await;
        respond(p.response_format, result, markdown::weekly_report)
    }

    #[tool(
        name = "ticktick_get_productivity_score",
        description = "Score today's work from 0 to 100 with a letter grade and recommendations."
    )]
    pub async fn get_productivity_score(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.statistics.productivity_score().await;
        respond(p.response_format, result, markdown::productivity_score)
    }

    #[tool(
        name = "ticktick_get_task_analytics",
        description = "Open tasks by priority and due date, with the most used tags."
    )]
    pub async fn get_task_analytics(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.statistics.task_analytics().await;
        respond(p.response_format, result, markdown::task_analytics)
    }

    // ── User ──

    #[tool(name = "ticktick_get_profile", description = "Account summary (requires v2 session).")]
    pub async fn get_profile(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.user.profile().await;
        respond(p.response_format, result, markdown::profile)
    }

    #[tool(name = "ticktick_get_inbox_id", description = "The inbox project id.")]
    pub async fn get_inbox_id(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self
            .services
            .user
            .inbox_id()
            .await
            .map(|inbox| json!({ "inbox_id": inbox }));
        respond(p.response_format, result, |v| {
            format!("Inbox ID: `{}`", v["inbox_id"].as_str().unwrap_or_default())
        })
    }

    #[tool(name = "ticktick_get_settings", description = "Raw account preferences (requires v2 session).")]
    pub async fn get_settings(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.user.settings().await;
        respond(p.response_format, result, |v: &Value| {
            format!("## Settings\n\n```json\n{}\n```", to_json(v))
        })
    }

    #[tool(
        name = "ticktick_update_settings",
        description = "Change account preferences; keys not given are left as they are (requires v2 session)."
    )]
    pub async fn update_settings(&self, Parameters(p): Parameters<UpdateSettingsParams>) -> String {
        let result = self.services.user.update_settings(&p.settings).await;
        respond(p.response_format, result, |v: &Value| {
            format!("## Settings Updated\n\n```json\n{}\n```", to_json(v))
        })
    }

    #[tool(name = "ticktick_get_timezone", description = "The account's time zone (requires v2 session).")]
    pub async fn get_timezone(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self.services.user.timezone().await.map(|tz| json!({ "time_zone": tz }));
        respond(p.response_format, result, |v| match v["time_zone"].as_str() {
            Some(tz) => format!("**Time zone**: {}", tz),
            None => "No time zone set on the account.".to_string(),
        })
    }

    // ── Cache ──

    #[tool(
        name = "ticktick_cache_register",
        description = "Record where a task lives so later lookups need no API call."
    )]
    pub async fn cache_register(&self, Parameters(p): Parameters<CacheRegisterParams>) -> String {
        let result = async {
            let due_date = non_empty(&p.due_date)
                .map(|d| normalize_date_input("due_date", d))
                .transpose()?;
            self.services.cache.write().await.register(
                &p.task_id,
                &p.project_id,
                &p.title,
                p.priority.unwrap_or_default().value(),
                p.tags.clone().unwrap_or_default(),
                due_date,
            )
        }
        .await;
        respond(p.response_format, result, |e| {
            format!("Registered:\n{}", markdown::cache_entry(e))
        })
    }

    #[tool(name = "ticktick_cache_unregister", description = "Remove a task from the cache.")]
    pub async fn cache_unregister(&self, Parameters(p): Parameters<CacheTaskIdParams>) -> String {
        let result = self
            .services
            .cache
            .write()
            .await
            .unregister(&p.task_id)
            .map(|removed| json!({ "task_id": p.task_id, "removed": removed }));
        respond(p.response_format, result, |v| {
            if v["removed"] == json!(true) {
                format!("Removed `{}` from the cache", p.task_id)
            } else {
                format!("`{}` was not cached", p.task_id)
            }
        })
    }

    #[tool(name = "ticktick_cache_get", description = "Look up a cached task by id.")]
    pub async fn cache_get(&self, Parameters(p): Parameters<CacheTaskIdParams>) -> String {
        self.ensure_fresh().await;
        let result = self
            .services
            .cache
            .read()
            .await
            .get(&p.task_id)
            .cloned()
            .ok_or_else(|| TickTickError::NotFound(format!("Task {} is not cached", p.task_id)));
        respond(p.response_format, result, markdown::cache_entry)
    }

    #[tool(
        name = "ticktick_cache_locate",
        description = "Find which project holds a task, scanning projects on a cache miss."
    )]
    pub async fn cache_locate(&self, Parameters(p): Parameters<CacheTaskIdParams>) -> String {
        let result = self
            .services
            .tasks
            .locate(&p.task_id)
            .await
            .map(|project_id| json!({ "task_id": p.task_id, "project_id": project_id }));
        respond(p.response_format, result, |v| {
            format!(
                "Task `{}` is in project `{}`",
                p.task_id,
                v["project_id"].as_str().unwrap_or_default()
            )
        })
    }

    #[tool(name = "ticktick_cache_search", description = "Search cached task titles.")]
    pub async fn cache_search(&self, Parameters(p): Parameters<CacheSearchParams>) -> String {
        self.ensure_fresh().await;
        let mut entries = self.services.cache.read().await.search(&p.query);
        if let Some(limit) = p.limit {
            entries.truncate(limit);
        }
        p.response_format
            .render(&entries, |e| markdown::cache_entries(e, &format!("Cache search: {}", p.query)))
    }

    #[tool(name = "ticktick_cache_by_project", description = "Cached tasks in one project ('inbox' for the inbox).")]
    pub async fn cache_by_project(&self, Parameters(p): Parameters<CacheProjectParams>) -> String {
        self.ensure_fresh().await;
        let entries = self.services.cache.read().await.by_project(&p.project_id);
        p.response_format
            .render(&entries, |e| markdown::cache_entries(e, &format!("Project {}", p.project_id)))
    }

    #[tool(name = "ticktick_cache_by_tag", description = "Cached tasks carrying a tag.")]
    pub async fn cache_by_tag(&self, Parameters(p): Parameters<CacheTagParams>) -> String {
        self.ensure_fresh().await;
        let entries = self.services.cache.read().await.by_tag(&p.tag);
        p.response_format
            .render(&entries, |e| markdown::cache_entries(e, &format!("Tag {}", p.tag)))
    }

    #[tool(name = "ticktick_cache_list", description = "Every cached task.")]
    pub async fn cache_list(&self, Parameters(p): Parameters<FormatParams>) -> String {
        self.ensure_fresh().await;
        let entries = self.services.cache.read().await.list();
        p.response_format
            .render(&entries, |e| markdown::cache_entries(e, "Cached Tasks"))
    }

    #[tool(
        name = "ticktick_cache_query",
        description = "Filter cached tasks by project, tag, priority, title text and due date."
    )]
    pub async fn cache_query(&self, Parameters(p): Parameters<CacheQueryParams>) -> String {
        let query = match Self::build_cache_query(&p) {
            Ok(query) => query,
            Err(e) => return p.response_format.error(&e),
        };
        self.ensure_fresh().await;
        let entries = self.services.cache.read().await.query(&query);
        p.response_format
            .render(&entries, |e| markdown::cache_entries(e, "Query Results"))
    }

    #[tool(name = "ticktick_cache_clear", description = "Remove every cached entry.")]
    pub async fn cache_clear(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let result = self
            .services
            .cache
            .write()
            .await
            .clear()
            .map(|cleared| json!({ "cleared": cleared }));
        respond(p.response_format, result, |v| format!("Cleared {} cached entries", v["cleared"]))
    }

    #[tool(
        name = "ticktick_cache_export",
        description = "Export the cache as CSV (task_id,project_id,title,priority,tags,due_date)."
    )]
    pub async fn cache_export(&self, Parameters(p): Parameters<FormatParams>) -> String {
        self.ensure_fresh().await;
        let result = self
            .services
            .cache
            .read()
            .await
            .export_csv()
            .map(|csv| json!({ "csv": csv }));
        respond(p.response_format, result, |v| {
            format!("```csv\n{}```", v["csv"].as_str().unwrap_or_default())
        })
    }

    #[tool(
        name = "ticktick_cache_import",
        description = "Import cache entries from CSV. Nothing is imported if any row is invalid."
    )]
    pub async fn cache_import(&self, Parameters(p): Parameters<CacheImportParams>) -> String {
        let result = self
            .services
            .cache
            .write()
            .await
            .import_csv(&p.csv_data)
            .map(|imported| json!({ "imported": imported }));
        respond(p.response_format, result, |v| format!("Imported {} entries", v["imported"]))
    }

    #[tool(name = "ticktick_cache_stats", description = "Cache size, age and breakdown by project, priority and tag.")]
    pub async fn cache_stats(&self, Parameters(p): Parameters<FormatParams>) -> String {
        self.ensure_fresh().await;
        let stats = self.services.cache.read().await.stats();
        p.response_format.render(&stats, markdown::cache_stats)
    }

    #[tool(
        name = "ticktick_cache_refresh",
        description = "Rebuild the cache from every project. Entries from projects that fail to load are kept."
    )]
    pub async fn cache_refresh(&self, Parameters(p): Parameters<FormatParams>) -> String {
        let tasks = &self.services.tasks;
        let result = cache::refresh_shared(&self.services.cache, tasks, tasks.concurrency()).await;
        respond(p.response_format, result, markdown::refresh_report)
    }
}

fn single_tag(tag: &Tag) -> String {
    markdown::tags(std::slice::from_ref(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use tempfile::TempDir;

    fn server(dir: &TempDir, url: &str, v1: bool, v2: bool, auto_refresh: bool) -> TickTickMcpServer {
        let client = test_support::client(dir, url, v1, v2);
        let services = Services::new(client, test_support::cache(dir), 2, true);
        let cache = CacheConfig {
            auto_refresh,
            ..Default::default()
        };
        TickTickMcpServer::new(services, &cache)
    }

    fn json_of(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_cache_register_then_get() {
        let mock = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let server = server(&dir, &mock.url(), false, false, false);

        let out = server
            .cache_register(Parameters(CacheRegisterParams {
                task_id: "t1".to_string(),
                project_id: "p1".to_string(),
                title: "Write report".to_string(),
                priority: Some(crate::domain::Priority::High),
                tags: Some(vec!["work".to_string()]),
                due_date: Some("2026-05-01".to_string()),
                response_format: ResponseFormat::Markdown,
            }))
            .await;
        assert!(out.starts_with("Registered:"));

        let out = server
            .cache_get(Parameters(CacheTaskIdParams {
                task_id: "t1".to_string(),
                response_format: ResponseFormat::Json,
            }))
            .await;
        let entry = json_of(&out);
        assert_eq!(entry["project_id"], "p1");
        assert_eq!(entry["priority"], 5);
        assert_eq!(entry["due_date"], "2026-05-01T00:00:00.000+0000");
    }

    #[tokio::test]
    async fn test_cache_get_miss_is_error() {
        let mock = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let server = server(&dir, &mock.url(), false, false, false);

        let out = server
            .cache_get(Parameters(CacheTaskIdParams {
                task_id: "missing".to_string(),
                response_format: ResponseFormat::Json,
            }))
            .await;
        assert_eq!(json_of(&out)["error"], "not_found");
    }

    #[tokio::test]
    async fn test_v2_tool_without_session() {
        let mock = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let server = server(&dir, &mock.url(), true, false, false);

        let out = server
            .list_habits(Parameters(ListHabitsParams {
                status: None,
                response_format: ResponseFormat::Markdown,
            }))
            .await;
        assert_eq!(out, "**Error**: Habits requires v2 API authentication (use ticktick_login)");
    }

    #[tokio::test]
    async fn test_cache_read_skips_refresh_when_unauthenticated() {
        let mut mock = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let projects = mock
            .mock("GET", "/open/v1/project")
            .expect(0)
            .create_async()
            .await;
        let server = server(&dir, &mock.url(), false, false, true);

        let out = server.cache_list(Parameters(FormatParams::default())).await;
        assert!(out.contains("No entries found."));
        projects.assert_async().await;
    }

    #[tokio::test]
    async fn test_cache_read_refreshes_when_stale() {
        let mut mock = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _projects = mock
            .mock("GET", "/open/v1/project")
            .with_status(200)
            .with_body(r#"[{"id":"p1","name":"Work"}]"#)
            .create_async()
            .await;
        let _inbox = mock
            .mock("GET", "/open/v1/project/inbox/data")
            .with_status(200)
            .with_body(r#"{"tasks":[]}"#)
            .create_async()
            .await;
        let _p1 = mock
            .mock("GET", "/open/v1/project/p1/data")
            .with_status(200)
            .with_body(r#"{"tasks":[{"id":"t1","projectId":"p1","title":"Plan"}]}"#)
            .create_async()
            .await;
        let server = server(&dir, &mock.url(), true, false, true);

        let out = server
            .cache_list(Parameters(FormatParams {
                response_format: ResponseFormat::Json,
            }))
            .await;
        let entries = json_of(&out);
        assert_eq!(entries.as_array().unwrap().len(), 1);
        assert_eq!(entries[0]["task_id"], "t1");
    }

    #[tokio::test]
    async fn test_get_task_locates_project() {
        let mut mock = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let get = mock
            .mock("GET", "/open/v1/project/p1/task/t1")
            .with_status(200)
            .with_body(r#"{"id":"t1","projectId":"p1","title":"Plan","priority":3}"#)
            .create_async()
            .await;
        let server = server(&dir, &mock.url(), true, false, false);
        server
            .services()
            .cache
            .write()
            .await
            .register("t1", "p1", "Plan", 3, vec![], None)
            .unwrap();

        let out = server
            .get_task(Parameters(TaskRefParams {
                task_id: "t1".to_string(),
                project_id: None,
                response_format: ResponseFormat::Markdown,
            }))
            .await;
        get.assert_async().await;
        assert!(out.contains("### [ ] Plan"));
        assert!(out.contains("- **Priority**: Medium"));
    }

    #[tokio::test]
    async fn test_invalid_filter_date() {
        let mock = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let server = server(&dir, &mock.url(), true, false, false);

        let out = server
            .cache_query(Parameters(CacheQueryParams {
                project_id: None,
                tag: None,
                priority: None,
                min_priority: None,
                text: None,
                due_before: Some("someday".to_string()),
                due_after: None,
                has_due_date: None,
                limit: None,
                response_format: ResponseFormat::Markdown,
            }))
            .await;
        assert!(out.starts_with("**Error**: Validation error"));
    }

    fn query_params(project_id: &str) -> CacheQueryParams {
        CacheQueryParams {
            project_id: Some(project_id.to_string()),
            tag: None,
            priority: None,
            min_priority: None,
            text: None,
            due_before: None,
            due_after: None,
            has_due_date: None,
            limit: None,
            response_format: ResponseFormat::Json,
        }
    }

    #[tokio::test]
    async fn test_cache_query_inbox_alias_matches_session_inbox() {
        let mock = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let server = server(&dir, &mock.url(), false, true, false);
        {
            let mut cache = server.services().cache.write().await;
            cache.register("i1", "inbox-1", "Inbox item", 0, vec![], None).unwrap();
            cache.register("w1", "p1", "Work item", 0, vec![], None).unwrap();
        }

        let entries = json_of(&server.cache_query(Parameters(query_params("inbox"))).await);
        let ids: Vec<&str> = entries
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["task_id"].as_str())
            .collect();
        assert_eq!(ids, vec!["i1"]);

        let entries = json_of(&server.cache_query(Parameters(query_params("inbox-1"))).await);
        assert_eq!(entries.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_complete_task_rescans_when_cached_project_is_stale() {
        let mut mock = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let stale = mock
            .mock("POST", "/open/v1/project/old/task/t1/complete")
            .with_status(404)
            .with_body(r#"{"errorMessage":"task not found"}"#)
            .expect(1)
            .create_async()
            .await;
        let _projects = mock
            .mock("GET", "/open/v1/project")
            .with_status(200)
            .with_body(r#"[{"id":"p1","name":"Work"}]"#)
            .create_async()
            .await;
        let _inbox = mock
            .mock("GET", "/open/v1/project/inbox/data")
            .with_status(200)
            .with_body(r#"{"tasks":[]}"#)
            .create_async()
            .await;
        let _p1 = mock
            .mock("GET", "/open/v1/project/p1/data")
            .with_status(200)
            .with_body(r#"{"tasks":[{"id":"t1","projectId":"p1","title":"Plan"}]}"#)
            .create_async()
            .await;
        let fresh = mock
            .mock("POST", "/open/v1/project/p1/task/t1/complete")
            .with_status(200)
            .create_async()
            .await;
        let server = server(&dir, &mock.url(), true, false, false);
        server
            .services()
            .cache
            .write()
            .await
            .register("t1", "old", "Plan", 0, vec![], None)
            .unwrap();

        let out = server
            .complete_task(Parameters(TaskRefParams {
                task_id: "t1".to_string(),
                project_id: None,
                response_format: ResponseFormat::Markdown,
            }))
            .await;
        stale.assert_async().await;
        fresh.assert_async().await;
        assert_eq!(out, "Task `t1` completed");
        assert!(server.services().cache.read().await.project_of("t1").is_none());
    }

    #[tokio::test]
    async fn test_productivity_score_tool_without_session() {
        let mut mock = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _projects = mock
            .mock("GET", "/open/v1/project")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let _inbox = mock
            .mock("GET", "/open/v1/project/inbox/data")
            .with_status(200)
            .with_body(r#"{"tasks":[]}"#)
            .create_async()
            .await;
        let server = server(&dir, &mock.url(), true, false, false);

        let out = server.get_productivity_score(Parameters(FormatParams::default())).await;
        assert!(out.starts_with("## Productivity Score: 0/100 (F)"));

        let out = server
            .get_weekly_report(Parameters(WeeklyReportParams {
                weeks_back: 0,
                response_format: ResponseFormat::Markdown,
            }))
            .await;
        assert!(out.starts_with("**Error**: Statistics requires v2 API authentication"));
    }
}
