//! Parameter structs for every MCP tool.
//!
//! All derive `Deserialize + JsonSchema` for tool registration. Tools that
//! render output accept `response_format` (`markdown` by default).

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::{
    HabitPatch, HabitStatus, NewProject, NewTask, PomoSettings, Priority, ProjectPatch, TagPatch, TaskPatch,
};
use crate::format::ResponseFormat;

// ── shared ──

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct FormatParams {
    #[serde(default)]
    #[schemars(description = "Output format: 'markdown' (default) or 'json'")]
    pub response_format: ResponseFormat,
}

// ── auth ──

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConfigureOAuthParams {
    #[schemars(description = "OAuth client id from the TickTick developer portal")]
    pub client_id: String,
    #[schemars(description = "OAuth client secret")]
    pub client_secret: String,
    #[schemars(description = "Redirect URI registered for the app (default http://127.0.0.1:8080/callback)")]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AuthorizeOAuthParams {
    #[schemars(description = "Authorization code from the redirect URL's 'code' parameter")]
    pub code: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LoginParams {
    #[schemars(description = "TickTick account email or username")]
    pub username: String,
    #[schemars(description = "TickTick account password")]
    pub password: String,
}

// ── tasks ──

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTasksParams {
    #[schemars(description = "Only tasks in this project; omit for every project")]
    pub project_id: Option<String>,
    #[serde(default)]
    #[schemars(description = "Include completed tasks")]
    pub include_completed: bool,
    #[schemars(description = "Only tasks with this priority")]
    pub priority: Option<Priority>,
    #[schemars(description = "Only tasks carrying any of these tags")]
    pub tags: Option<Vec<String>>,
    #[schemars(description = "Only tasks due on or before this date (YYYY-MM-DD or ISO 8601)")]
    pub due_before: Option<String>,
    #[schemars(description = "Only tasks due on or after this date (YYYY-MM-DD or ISO 8601)")]
    pub due_after: Option<String>,
    #[schemars(description = "Only tasks whose title or content contains this text")]
    pub search: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TaskRefParams {
    #[schemars(description = "Task id")]
    pub task_id: String,
    #[schemars(description = "Project holding the task; looked up when omitted")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// Fields of a new task, shared by single and batch creation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TaskInput {
    #[schemars(description = "Task title")]
    pub title: String,
    #[schemars(description = "Target project; defaults to the inbox")]
    pub project_id: Option<String>,
    #[schemars(description = "Task notes (markdown)")]
    pub content: Option<String>,
    #[schemars(description = "Checklist description")]
    pub desc: Option<String>,
    #[schemars(description = "Start date (YYYY-MM-DD or ISO 8601)")]
    pub start_date: Option<String>,
    #[schemars(description = "Due date (YYYY-MM-DD or ISO 8601)")]
    pub due_date: Option<String>,
    #[schemars(description = "Whether the dates are all-day")]
    pub is_all_day: Option<bool>,
    #[schemars(description = "IANA time zone, e.g. 'America/New_York'")]
    pub time_zone: Option<String>,
    #[schemars(description = "Priority: none, low, medium or high")]
    pub priority: Option<Priority>,
    #[schemars(description = "Tags to attach")]
    pub tags: Option<Vec<String>>,
    #[schemars(description = "Checklist item titles")]
    pub items: Option<Vec<String>>,
    #[schemars(description = "Reminder triggers, e.g. 'TRIGGER:-PT30M'")]
    pub reminders: Option<Vec<String>>,
    #[schemars(description = "Recurrence rule, e.g. 'RRULE:FREQ=DAILY;INTERVAL=1'")]
    pub repeat_flag: Option<String>,
}

impl TaskInput {
    pub fn into_new_task(self) -> NewTask {
        NewTask {
            title: self.title,
            project_id: self.project_id,
            content: self.content,
            desc: self.desc,
            start_date: self.start_date,
            due_date: self.due_date,
            is_all_day: self.is_all_day,
            time_zone: self.time_zone,
            priority: self.priority,
            tags: self.tags.unwrap_or_default(),
            items: self.items.unwrap_or_default(),
            reminders: self.reminders.unwrap_or_default(),
            repeat_flag: self.repeat_flag,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTaskParams {
    #[serde(flatten)]
    pub task: TaskInput,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTaskParams {
    #[schemars(description = "Task id")]
    pub task_id: String,
    #[schemars(description = "Project holding the task; looked up when omitted")]
    pub project_id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    #[schemars(description = "Start date (YYYY-MM-DD or ISO 8601)")]
    pub start_date: Option<String>,
    #[schemars(description = "Due date (YYYY-MM-DD or ISO 8601)")]
    pub due_date: Option<String>,
    pub is_all_day: Option<bool>,
    pub time_zone: Option<String>,
    #[schemars(description = "Priority: none, low, medium or high")]
    pub priority: Option<Priority>,
    #[schemars(description = "Replacement tag list")]
    pub tags: Option<Vec<String>>,
    pub repeat_flag: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl UpdateTaskParams {
    pub fn patch(&self) -> TaskPatch {
        TaskPatch {
            title: self.title.clone(),
            content: self.content.clone(),
            start_date: self.start_date.clone(),
            due_date: self.due_date.clone(),
            is_all_day: self.is_all_day,
            time_zone: self.time_zone.clone(),
            priority: self.priority,
            tags: self.tags.clone(),
            repeat_flag: self.repeat_flag.clone(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveTaskParams {
    #[schemars(description = "Task id")]
    pub task_id: String,
    #[schemars(description = "Destination project id")]
    pub to_project_id: String,
    #[schemars(description = "Current project; looked up when omitted")]
    pub from_project_id: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateSubtaskParams {
    #[schemars(description = "Parent task id")]
    pub parent_task_id: String,
    #[schemars(description = "Project holding the parent; looked up when omitted")]
    pub project_id: Option<String>,
    #[schemars(description = "Subtask title")]
    pub title: String,
    pub content: Option<String>,
    #[schemars(description = "Priority: none, low, medium or high")]
    pub priority: Option<Priority>,
    #[schemars(description = "Due date (YYYY-MM-DD or ISO 8601)")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompletedTasksParams {
    #[schemars(description = "Start of range (YYYY-MM-DD)")]
    pub from_date: Option<String>,
    #[schemars(description = "End of range (YYYY-MM-DD)")]
    pub to_date: Option<String>,
    #[schemars(description = "Only this project")]
    pub project_id: Option<String>,
    #[schemars(description = "Maximum results, 1-100 (default 50)")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BatchCreateTasksParams {
    #[schemars(description = "Tasks to create")]
    pub tasks: Vec<TaskInput>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TaskLocation {
    pub task_id: String,
    #[schemars(description = "Looked up when omitted")]
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BatchDeleteTasksParams {
    #[schemars(description = "Tasks to delete")]
    pub tasks: Vec<TaskLocation>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

// ── projects ──

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListProjectsParams {
    #[serde(default)]
    #[schemars(description = "Include archived projects")]
    pub include_archived: bool,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProjectIdParams {
    #[schemars(description = "Project id")]
    pub project_id: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateProjectParams {
    #[schemars(description = "Project name")]
    pub name: String,
    #[schemars(description = "Hex color, e.g. '#F18181'")]
    pub color: Option<String>,
    #[schemars(description = "View mode: list, kanban or timeline")]
    pub view_mode: Option<String>,
    #[schemars(description = "Kind: TASK or NOTE")]
    pub kind: Option<String>,
    #[schemars(description = "Folder to place the project in")]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl CreateProjectParams {
    pub fn new_project(&self) -> NewProject {
        NewProject {
            name: self.name.clone(),
            color: self.color.clone(),
            view_mode: self.view_mode.clone(),
            kind: self.kind.clone(),
            group_id: self.folder_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateProjectParams {
    #[schemars(description = "Project id")]
    pub project_id: String,
    pub name: Option<String>,
    pub color: Option<String>,
    pub view_mode: Option<String>,
    #[schemars(description = "Folder id; empty string removes the project from its folder")]
    pub folder_id: Option<String>,
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl UpdateProjectParams {
    pub fn patch(&self) -> ProjectPatch {
        ProjectPatch {
            name: self.name.clone(),
            color: self.color.clone(),
            view_mode: self.view_mode.clone(),
            group_id: self.folder_id.clone(),
            sort_order: self.sort_order,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateFolderParams {
    #[schemars(description = "Folder name")]
    pub name: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FolderIdParams {
    #[schemars(description = "Folder id")]
    pub folder_id: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateFolderParams {
    #[schemars(description = "Folder id")]
    pub folder_id: String,
    #[schemars(description = "New folder name")]
    pub name: Option<String>,
    #[schemars(description = "New sort position")]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

// ── tags ──

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTagParams {
    #[schemars(description = "Tag name")]
    pub name: String,
    pub color: Option<String>,
    #[schemars(description = "Parent tag name for nesting")]
    pub parent: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTagParams {
    #[schemars(description = "Current tag name")]
    pub name: String,
    #[schemars(description = "Display label")]
    pub label: Option<String>,
    pub color: Option<String>,
    #[schemars(description = "Parent tag name; empty string moves the tag to the top level")]
    pub parent: Option<String>,
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl UpdateTagParams {
    pub fn patch(&self) -> TagPatch {
        TagPatch {
            label: self.label.clone(),
            color: self.color.clone(),
            parent: self.parent.clone(),
            sort_order: self.sort_order,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RenameTagParams {
    #[schemars(description = "Current tag name")]
    pub name: String,
    #[schemars(description = "New tag name")]
    pub new_name: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MergeTagsParams {
    #[schemars(description = "Tags to merge away")]
    pub source_tags: Vec<String>,
    #[schemars(description = "Tag that receives their tasks (created if missing)")]
    pub target_tag: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TagNameParams {
    #[schemars(description = "Tag name")]
    pub name: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TagTasksParams {
    #[schemars(description = "Tag name, with or without '#'")]
    pub tag: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

// ── user ──

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateSettingsParams {
    #[schemars(description = "Setting keys and values to change, e.g. {\"timeZone\": \"Europe/Berlin\"}")]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

// ── habits ──

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListHabitsParams {
    #[schemars(description = "Only habits with this status: active, paused or archived")]
    pub status: Option<HabitStatus>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HabitIdParams {
    #[schemars(description = "Habit id")]
    pub habit_id: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateHabitParams {
    #[schemars(description = "Habit name")]
    pub name: String,
    #[schemars(description = "Daily goal (default 1)")]
    pub goal: Option<f64>,
    #[schemars(description = "Goal type: boolean or real")]
    pub goal_type: Option<String>,
    #[schemars(description = "Unit for numeric goals, e.g. 'glasses'")]
    pub unit: Option<String>,
    #[schemars(description = "Frequency: daily, weekly or an RRULE")]
    pub frequency: Option<String>,
    #[schemars(description = "Weekdays for weekly habits, 0 = Sunday")]
    pub repeat_days: Option<Vec<u8>>,
    #[schemars(description = "Reminder time, HH:MM")]
    pub reminder_time: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateHabitParams {
    #[schemars(description = "Habit id")]
    pub habit_id: String,
    pub name: Option<String>,
    pub goal: Option<f64>,
    pub unit: Option<String>,
    pub frequency: Option<String>,
    pub reminder_time: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl UpdateHabitParams {
    pub fn patch(&self) -> HabitPatch {
        HabitPatch {
            name: self.name.clone(),
            goal: self.goal,
            unit: self.unit.clone(),
            frequency: self.frequency.clone(),
            reminder_time: self.reminder_time.clone(),
            color: self.color.clone(),
            status: None,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckinParams {
    #[schemars(description = "Habit id")]
    pub habit_id: String,
    #[schemars(description = "Day to check in (YYYY-MM-DD, default today)")]
    pub date: Option<String>,
    #[schemars(description = "Amount achieved (default 1)")]
    pub value: Option<f64>,
    pub note: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UndoCheckinParams {
    #[schemars(description = "Habit id")]
    pub habit_id: String,
    #[schemars(description = "Day to reset (YYYY-MM-DD, default today)")]
    pub date: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HabitRecordsParams {
    #[schemars(description = "Habit id")]
    pub habit_id: String,
    #[schemars(description = "Start of range (YYYY-MM-DD)")]
    pub from_date: Option<String>,
    #[schemars(description = "End of range (YYYY-MM-DD)")]
    pub to_date: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

// ── focus ──

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FocusRecordsParams {
    #[schemars(description = "Start of range (YYYY-MM-DD)")]
    pub from_date: Option<String>,
    #[schemars(description = "End of range (YYYY-MM-DD)")]
    pub to_date: Option<String>,
    #[schemars(description = "Only sessions spent on this task")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveFocusRecordParams {
    #[schemars(description = "Session length in minutes")]
    pub duration_minutes: i64,
    #[schemars(description = "When the session started (ISO 8601, default: duration ago)")]
    pub start_time: Option<String>,
    #[schemars(description = "pomo (default) or stopwatch")]
    pub focus_type: Option<String>,
    pub task_id: Option<String>,
    pub project_id: Option<String>,
    pub note: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FocusRecordIdParams {
    #[schemars(description = "Focus record id")]
    pub record_id: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateFocusSettingsParams {
    #[schemars(description = "Pomodoro length in minutes")]
    pub pomo_duration: Option<i64>,
    #[schemars(description = "Short break in minutes")]
    pub short_break: Option<i64>,
    #[schemars(description = "Long break in minutes")]
    pub long_break: Option<i64>,
    #[schemars(description = "Pomodoros before a long break")]
    pub long_break_interval: Option<i64>,
    #[schemars(description = "Daily pomodoro target")]
    pub daily_pomo_target: Option<i64>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl UpdateFocusSettingsParams {
    pub fn changes(&self) -> PomoSettings {
        PomoSettings {
            pomo_duration: self.pomo_duration,
            short_break: self.short_break,
            long_break: self.long_break,
            long_break_interval: self.long_break_interval,
            daily_pomo_target: self.daily_pomo_target,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DateRangeParams {
    #[schemars(description = "Start of range (YYYY-MM-DD)")]
    pub from_date: Option<String>,
    #[schemars(description = "End of range (YYYY-MM-DD)")]
    pub to_date: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

// ── calendar ──

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CalendarEventsParams {
    #[schemars(description = "First day (YYYY-MM-DD)")]
    pub start_date: String,
    #[schemars(description = "Last day (YYYY-MM-DD, default same as start)")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

// ── smart views and statistics ──

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DayParams {
    #[schemars(description = "Day (YYYY-MM-DD, default today)")]
    pub date: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WeeklyReportParams {
    #[schemars(description = "Weeks back from the current one (0 = this week)")]
    #[serde(default)]
    pub weeks_back: u32,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NextDaysParams {
    #[schemars(description = "Number of days including today (default 7)")]
    pub days: Option<u64>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchTasksParams {
    #[schemars(description = "Text to look for in titles, content and tags")]
    pub query: String,
    #[schemars(description = "Only this project")]
    pub project_id: Option<String>,
    #[serde(default)]
    #[schemars(description = "Include completed tasks")]
    pub include_completed: bool,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

// ── cache ──

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CacheRegisterParams {
    #[schemars(description = "Task id")]
    pub task_id: String,
    #[schemars(description = "Project id; empty string for the inbox")]
    pub project_id: String,
    #[schemars(description = "Task title")]
    pub title: String,
    #[schemars(description = "Priority: none, low, medium or high")]
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    #[schemars(description = "Due date (YYYY-MM-DD or ISO 8601)")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CacheTaskIdParams {
    #[schemars(description = "Task id")]
    pub task_id: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CacheSearchParams {
    #[schemars(description = "Case-insensitive text to find in cached titles")]
    pub query: String,
    #[schemars(description = "Maximum results")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CacheProjectParams {
    #[schemars(description = "Project id, or 'inbox'")]
    pub project_id: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CacheTagParams {
    #[schemars(description = "Tag name")]
    pub tag: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CacheQueryParams {
    pub project_id: Option<String>,
    pub tag: Option<String>,
    #[schemars(description = "Exact priority")]
    pub priority: Option<Priority>,
    #[schemars(description = "Minimum priority")]
    pub min_priority: Option<Priority>,
    #[schemars(description = "Text in the title")]
    pub text: Option<String>,
    #[schemars(description = "Due on or before (YYYY-MM-DD or ISO 8601)")]
    pub due_before: Option<String>,
    #[schemars(description = "Due on or after (YYYY-MM-DD or ISO 8601)")]
    pub due_after: Option<String>,
    #[schemars(description = "true: only entries with a due date; false: only without")]
    pub has_due_date: Option<bool>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CacheImportParams {
    #[schemars(description = "CSV with header task_id,project_id,title,priority,tags,due_date")]
    pub csv_data: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
}
