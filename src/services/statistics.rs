//! Productivity statistics across tasks, habits and focus.
//!
//! Scoring and bucketing are pure functions over already fetched data; the
//! service only gathers inputs. Due dates are bucketed by UTC day like the
//! smart views, while completions and focus sessions use the local date.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Datelike, Days, Local, NaiveDate, Utc};
use serde::Serialize;

use super::focus::{FocusService, FocusStats};
use super::habits::{HabitProgress, HabitService};
use super::require_v2;
use super::tasks::{COMPLETED_LIMIT, TaskService};
use crate::api::TickTickClient;
use crate::cache::TagCount;
use crate::domain::{FocusRecord, Priority, Task};
use crate::error::Result;

const FEATURE: &str = "Statistics";
const TOP_TAGS: usize = 10;
const PART_MAX: i64 = 30;
const PENALTY_MAX: i64 = 10;
/// Below this a score part earns a recommendation
const WEAK_PART: i64 = 15;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskCounts {
    pub total_pending: usize,
    pub due_today: usize,
    pub overdue: usize,
    pub high_priority: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HabitCounts {
    pub total_active: usize,
    pub completed_today: usize,
    /// Percent of active habits done today
    pub completion_rate: f64,
}

/// Dashboard numbers for today.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub date: NaiveDate,
    pub tasks: TaskCounts,
    /// Absent without a v2 session
    pub habits: Option<HabitCounts>,
    pub focus: Option<FocusStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedItem {
    pub id: String,
    pub title: String,
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusSession {
    pub duration_minutes: i64,
    pub focus_type: String,
    pub task: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub tasks_completed: Vec<CompletedItem>,
    pub focus_sessions: Vec<FocusSession>,
    pub total_focus_minutes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayActivity {
    pub date: NaiveDate,
    pub tasks_completed: usize,
    pub focus_minutes: i64,
    pub pomodoros: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklyTotals {
    pub tasks_completed: usize,
    pub focus_minutes: i64,
    pub pomodoros: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub days: Vec<DayActivity>,
    pub totals: WeeklyTotals,
}

/// Points per area; the penalty is zero or negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub task_completion: i64,
    pub habit_consistency: i64,
    pub focus_time: i64,
    pub overdue_penalty: i64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        self.task_completion + self.habit_consistency + self.focus_time + self.overdue_penalty
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductivityScore {
    /// 0 to 100
    pub score: i64,
    pub grade: &'static str,
    pub breakdown: ScoreBreakdown,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DueBuckets {
    pub overdue: usize,
    pub today: usize,
    /// Due within the next seven days, today excluded
    pub this_week: usize,
    pub later: usize,
    pub no_date: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskAnalytics {
    pub total_pending: usize,
    pub priority_distribution: BTreeMap<String, usize>,
    pub due_date_analysis: DueBuckets,
    pub top_tags: Vec<TagCount>,
}

pub fn task_counts(tasks: &[Task], today: NaiveDate) -> TaskCounts {
    let open: Vec<&Task> = tasks.iter().filter(|t| !t.is_completed()).collect();
    TaskCounts {
        total_pending: open.len(),
        due_today: open.iter().filter(|t| t.due_day() == Some(today)).count(),
        overdue: open.iter().filter(|t| t.due_day().is_some_and(|d| d < today)).count(),
        high_priority: open.iter().filter(|t| t.priority_level() == Priority::High).count(),
    }
}

pub fn habit_counts(progress: &[HabitProgress]) -> HabitCounts {
    let completed_today = progress.iter().filter(|p| p.completed).count();
    let completion_rate = if progress.is_empty() {
        0.0
    } else {
        completed_today as f64 / progress.len() as f64 * 100.0
    };
    HabitCounts {
        total_active: progress.len(),
        completed_today,
        completion_rate,
    }
}

pub fn grade(score: i64) -> &'static str {
    match score {
        80.. => "A",
        60..=79 => "B",
        40..=59 => "C",
        20..=39 => "D",
        _ => "F",
    }
}

/// Score today's work: up to 30 points each for completed tasks, habits and
/// pomodoros, minus up to 10 for overdue tasks.
pub fn score(completed_today: usize, habits: &HabitCounts, pomodoros: usize, overdue: usize) -> ProductivityScore {
    let habit_consistency = if habits.total_active == 0 {
        0
    } else {
        (habits.completed_today as i64 * PART_MAX) / habits.total_active as i64
    };
    let breakdown = ScoreBreakdown {
        task_completion: (completed_today as i64 * 5).min(PART_MAX),
        habit_consistency,
        focus_time: (pomodoros as i64 * 4).min(PART_MAX),
        overdue_penalty: -(overdue as i64 * 2).min(PENALTY_MAX),
    };

    let mut recommendations = Vec::new();
    if breakdown.task_completion < WEAK_PART {
        recommendations.push("Complete more tasks today; break large tasks into smaller ones".to_string());
    }
    if breakdown.habit_consistency < WEAK_PART {
        recommendations.push("Keep your habit streaks going; check in on today's habits".to_string());
    }
    if breakdown.focus_time < WEAK_PART {
        recommendations.push("Use pomodoro sessions to add focused work time".to_string());
    }
    if breakdown.overdue_penalty < -5 {
        recommendations.push("Several tasks are overdue; reschedule or finish them".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("Great job, keep it up".to_string());
    }

    let total = breakdown.total().clamp(0, 100);
    ProductivityScore {
        score: total,
        grade: grade(total),
        breakdown,
        recommendations,
    }
}

pub fn analyze(tasks: &[Task], today: NaiveDate) -> TaskAnalytics {
    let open: Vec<&Task> = tasks.iter().filter(|t| !t.is_completed()).collect();
    let week_end = today.checked_add_days(Days::new(7)).unwrap_or(today);

    let mut analytics = TaskAnalytics {
        total_pending: open.len(),
        ..Default::default()
    };
    for priority in [Priority::High, Priority::Medium, Priority::Low, Priority::None] {
        analytics.priority_distribution.insert(priority.label().to_lowercase(), 0);
    }

    let mut tags: HashMap<&str, usize> = HashMap::new();
    for task in &open {
        *analytics
            .priority_distribution
            .entry(task.priority_level().label().to_lowercase())
            .or_default() += 1;
        let buckets = &mut analytics.due_date_analysis;
        match task.due_day() {
            None => buckets.no_date += 1,
            Some(day) if day < today => buckets.overdue += 1,
            Some(day) if day == today => buckets.today += 1,
            Some(day) if day <= week_end => buckets.this_week += 1,
            Some(_) => buckets.later += 1,
        }
        for tag in &task.tags {
            *tags.entry(tag.as_str()).or_default() += 1;
        }
    }

    let mut top_tags: Vec<TagCount> = tags
        .into_iter()
        .map(|(tag, count)| TagCount {
            tag: tag.to_string(),
            count,
        })
        .collect();
    top_tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    top_tags.truncate(TOP_TAGS);
    analytics.top_tags = top_tags;
    analytics
}

/// Monday of the week `weeks_back` weeks before the one holding `today`.
pub fn week_start(today: NaiveDate, weeks_back: u32) -> NaiveDate {
    let back = today.weekday().num_days_from_monday() as u64 + 7 * weeks_back as u64;
    today.checked_sub_days(Days::new(back)).unwrap_or(today)
}

fn pomodoros(records: &[FocusRecord]) -> usize {
    records
        .iter()
        .filter(|r| r.focus_type.as_deref().unwrap_or("pomo") == "pomo")
        .count()
}

fn focus_minutes(records: &[FocusRecord]) -> i64 {
    records.iter().map(|r| r.duration.max(0)).sum::<i64>() / 60
}

pub fn daily_summary(date: NaiveDate, completed: &[Task], records: &[FocusRecord]) -> DailySummary {
    DailySummary {
        date,
        tasks_completed: completed
            .iter()
            .map(|t| CompletedItem {
                id: t.id.clone(),
                title: t.title.clone(),
                project_id: t.project_id.clone(),
            })
            .collect(),
        focus_sessions: records
            .iter()
            .map(|r| FocusSession {
                duration_minutes: r.duration.max(0) / 60,
                focus_type: r.focus_type.clone().unwrap_or_else(|| "pomo".to_string()),
                task: r.task_title.clone(),
            })
            .collect(),
        total_focus_minutes: focus_minutes(records),
    }
}

pub fn day_activity(date: NaiveDate, completed: &[Task], records: &[FocusRecord]) -> DayActivity {
    DayActivity {
        date,
        tasks_completed: completed.len(),
        focus_minutes: focus_minutes(records),
        pomodoros: pomodoros(records),
    }
}

pub fn weekly_totals(days: &[DayActivity]) -> WeeklyTotals {
    days.iter().fold(WeeklyTotals::default(), |mut totals, day| {
        totals.tasks_completed += day.tasks_completed;
        totals.focus_minutes += day.focus_minutes;
        totals.pomodoros += day.pomodoros;
        totals
    })
}

fn day_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone)]
pub struct StatisticsService {
    client: Arc<TickTickClient>,
    tasks: TaskService,
    habits: HabitService,
    focus: FocusService,
}

impl StatisticsService {
    pub fn new(client: Arc<TickTickClient>, tasks: TaskService, habits: HabitService, focus: FocusService) -> Self {
        Self {
            client,
            tasks,
            habits,
            focus,
        }
    }

    async fn open_tasks(&self) -> Result<Vec<Task>> {
        self.tasks.list(None, false).await
    }

    async fn completed_on(&self, date: NaiveDate) -> Result<Vec<Task>> {
        let day = day_string(date);
        self.tasks
            .completed(Some(&day), Some(&day), None, COMPLETED_LIMIT)
            .await
    }

    /// Habit progress for today, or `None` without a session or on failure.
    async fn habit_progress(&self) -> Option<Vec<HabitProgress>> {
        if !self.client.has_v2() {
            return None;
        }
        self.habits
            .today_status()
            .await
            .inspect_err(|e| log::warn!("Could not load habit status: {}", e))
            .ok()
    }

    async fn focus_today(&self) -> Option<FocusStats> {
        if !self.client.has_v2() {
            return None;
        }
        self.focus
            .today()
            .await
            .map(|today| today.stats)
            .inspect_err(|e| log::warn!("Could not load today's focus: {}", e))
            .ok()
    }

    pub async fn overview(&self) -> Result<Overview> {
        let tasks = self.open_tasks().await?;
        Ok(Overview {
            date: Local::now().date_naive(),
            tasks: task_counts(&tasks, Utc::now().date_naive()),
            habits: self.habit_progress().await.map(|p| habit_counts(&p)),
            focus: self.focus_today().await,
        })
    }

    /// Completions and focus sessions of one day (v2).
    pub async fn daily_summary(&self, date: Option<NaiveDate>) -> Result<DailySummary> {
        require_v2(&self.client, FEATURE)?;
        let date = date.unwrap_or_else(|| Local::now().date_naive());
        let completed = self.completed_on(date).await?;
        let records = self.focus.records(Some(date), Some(date), None).await?;
        Ok(daily_summary(date, &completed, &records))
    }

    /// Day-by-day activity for a Monday-to-Sunday week (v2).
    pub async fn weekly_report(&self, weeks_back: u32) -> Result<WeeklyReport> {
        require_v2(&self.client, FEATURE)?;
        let start = week_start(Local::now().date_naive(), weeks_back);
        let mut days = Vec::with_capacity(7);
        for offset in 0..7 {
            let Some(date) = start.checked_add_days(Days::new(offset)) else {
                break;
            };
            let completed = self.completed_on(date).await?;
            let records = self.focus.records(Some(date), Some(date), None).await?;
            days.push(day_activity(date, &completed, &records));
        }
        Ok(WeeklyReport {
            week_start: start,
            week_end: start.checked_add_days(Days::new(6)).unwrap_or(start),
            totals: weekly_totals(&days),
            days,
        })
    }

    /// Today's score. Without a session only the overdue penalty applies.
    pub async fn productivity_score(&self) -> Result<ProductivityScore> {
        let tasks = self.open_tasks().await?;
        let overdue = task_counts(&tasks, Utc::now().date_naive()).overdue;
        if !self.client.has_v2() {
            return Ok(score(0, &HabitCounts::default(), 0, overdue));
        }

        let completed_today = match self.completed_on(Local::now().date_naive()).await {
            Ok(done) => done.len(),
            Err(e) => {
                log::warn!("Could not load completed tasks: {}", e);
                0
            }
        };
        let habits = self
            .habit_progress()
            .await
            .map(|p| habit_counts(&p))
            .unwrap_or_default();
        let pomodoros = self.focus_today().await.map_or(0, |f| f.pomo_sessions);
        Ok(score(completed_today, &habits, pomodoros, overdue))
    }

    pub async fn task_analytics(&self) -> Result<TaskAnalytics> {
        Ok(analyze(&self.open_tasks().await?, Utc::now().date_naive()))
    }
}
