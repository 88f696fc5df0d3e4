//! Derived views over open tasks: due today, overdue, search, summaries.
//!
//! The view functions are pure over a task slice and a reference day so they
//! can be tested without a clock. Days are UTC calendar days.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;

use super::tasks::TaskService;
use crate::domain::{Priority, Task};
use crate::error::{Result, TickTickError};

const TITLE_SCORE: i64 = 10;
const CONTENT_SCORE: i64 = 5;
const TAG_SCORE: i64 = 3;

/// Tasks due on one day.
#[derive(Debug, Clone, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub tasks: Vec<Task>,
}

/// Counts over the open task list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductivitySummary {
    pub total: usize,
    pub by_priority: BTreeMap<String, usize>,
    pub overdue: usize,
    pub due_today: usize,
    pub due_this_week: usize,
    pub unscheduled: usize,
    /// Days since the oldest overdue task was due
    pub oldest_overdue_days: Option<i64>,
    pub recommendations: Vec<String>,
}

/// Overdue tasks carried into a day plan
const CARRIED_OVERDUE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledTask {
    pub id: String,
    pub title: String,
    pub priority: i64,
    pub project_id: String,
    pub is_overdue: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBlock {
    pub name: &'static str,
    pub hours: &'static str,
    pub focus: &'static str,
    pub tasks: Vec<ScheduledTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub blocks: Vec<TimeBlock>,
    pub total_tasks: usize,
    pub overdue_tasks: usize,
    pub high_priority: usize,
}

fn by_priority_desc(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.due_at().cmp(&b.due_at())));
}

pub fn due_on(tasks: &[Task], day: NaiveDate) -> Vec<Task> {
    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.is_completed() && t.due_day() == Some(day))
        .cloned()
        .collect();
    by_priority_desc(&mut out);
    out
}

/// Open tasks due before the start of `today`, oldest first.
pub fn overdue(tasks: &[Task], today: NaiveDate) -> Vec<Task> {
    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.is_completed() && t.due_day().is_some_and(|d| d < today))
        .cloned()
        .collect();
    out.sort_by_key(|t| t.due_day());
    out
}

/// One group per day from `today` for `days` days; empty days are omitted.
pub fn next_days(tasks: &[Task], today: NaiveDate, days: u64) -> Vec<DayGroup> {
    (0..days)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|date| {
            let tasks = due_on(tasks, date);
            (!tasks.is_empty()).then_some(DayGroup { date, tasks })
        })
        .collect()
}

pub fn unscheduled(tasks: &[Task]) -> Vec<Task> {
    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.is_completed() && t.due_day().is_none())
        .cloned()
        .collect();
    by_priority_desc(&mut out);
    out
}

pub fn high_priority(tasks: &[Task]) -> Vec<Task> {
    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.is_completed() && t.priority_level() == Priority::High)
        .cloned()
        .collect();
    out.sort_by_key(|t| t.due_at().is_none());
    out
}

/// Relevance of `task` to a lowercase query, or `None` when nothing matches.
pub fn relevance(task: &Task, query: &str) -> Option<i64> {
    let mut score = 0;
    if task.title.to_lowercase().contains(query) {
        score += TITLE_SCORE;
    }
    if task.content.as_deref().is_some_and(|c| c.to_lowercase().contains(query)) {
        score += CONTENT_SCORE;
    }
    if task.tags.iter().any(|t| t.to_lowercase().contains(query)) {
        score += TAG_SCORE;
    }
    (score > 0).then_some(score + task.priority)
}

/// Matching tasks, most relevant first.
pub fn search(tasks: &[Task], query: &str) -> Vec<Task> {
    let query = query.trim().to_lowercase();
    let mut scored: Vec<(i64, &Task)> = tasks
        .iter()
        .filter_map(|t| relevance(t, &query).map(|score| (score, t)))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.title.cmp(&b.1.title)));
    scored.into_iter().map(|(_, t)| t.clone()).collect()
}

pub fn summarize(tasks: &[Task], today: NaiveDate) -> ProductivitySummary {
    let open: Vec<&Task> = tasks.iter().filter(|t| !t.is_completed()).collect();
    let week_end = today.checked_add_days(Days::new(7)).unwrap_or(today);

    let mut summary = ProductivitySummary {
        total: open.len(),
        ..Default::default()
    };
    for priority in [Priority::High, Priority::Medium, Priority::Low, Priority::None] {
        summary.by_priority.insert(priority.label().to_string(), 0);
    }
    for task in &open {
        *summary
            .by_priority
            .entry(task.priority_level().label().to_string())
            .or_default() += 1;
        match task.due_day() {
            None => summary.unscheduled += 1,
            Some(day) if day < today => {
                summary.overdue += 1;
                let age = (today - day).num_days();
                summary.oldest_overdue_days = Some(summary.oldest_overdue_days.map_or(age, |d| d.max(age)));
            }
            Some(day) if day == today => {
                summary.due_today += 1;
                summary.due_this_week += 1;
            }
            Some(day) if day < week_end => summary.due_this_week += 1,
            Some(_) => {}
        }
    }

    if summary.overdue > 0 {
        summary
            .recommendations
            .push(format!("Reschedule or finish {} overdue task(s)", summary.overdue));
    }
    let high = summary.by_priority.get(Priority::High.label()).copied().unwrap_or(0);
    if high > 5 {
        summary
            .recommendations
            .push(format!("{} tasks are high priority; consider demoting some", high));
    }
    if summary.total > 0 && summary.unscheduled * 2 > summary.total {
        summary
            .recommendations
            .push("Most open tasks have no due date; schedule the important ones".to_string());
    }
    summary
}

/// Spread the day's tasks over morning, afternoon and evening blocks.
///
/// High-priority and overdue work goes to the morning; the rest alternates
/// between afternoon and evening in priority order.
pub fn schedule(tasks: &[Task], date: NaiveDate, today: NaiveDate) -> DaySchedule {
    let mut planned: Vec<(Task, bool)> = overdue(tasks, today)
        .into_iter()
        .take(CARRIED_OVERDUE)
        .map(|t| (t, true))
        .collect();
    for task in due_on(tasks, date) {
        if !planned.iter().any(|(t, _)| t.id == task.id) {
            planned.push((task, false));
        }
    }
    planned.sort_by(|a, b| b.0.priority.cmp(&a.0.priority));

    let mut blocks = [
        ("Morning", "09:00-12:00", "High priority and deep work"),
        ("Afternoon", "13:00-17:00", "Meetings and collaborative work"),
        ("Evening", "17:00-19:00", "Wrap-up and planning"),
    ]
    .map(|(name, hours, focus)| TimeBlock {
        name,
        hours,
        focus,
        tasks: Vec::new(),
    });

    let mut rest = 0;
    for (task, is_overdue) in &planned {
        let slot = if task.priority_level() == Priority::High || *is_overdue {
            0
        } else {
            rest += 1;
            if rest % 2 == 1 { 1 } else { 2 }
        };
        blocks[slot].tasks.push(ScheduledTask {
            id: task.id.clone(),
            title: task.title.clone(),
            priority: task.priority,
            project_id: task.project_id.clone(),
            is_overdue: *is_overdue,
        });
    }

    DaySchedule {
        date,
        total_tasks: planned.len(),
        overdue_tasks: planned.iter().filter(|(_, o)| *o).count(),
        high_priority: planned
            .iter()
            .filter(|(t, _)| t.priority_level() == Priority::High)
            .count(),
        blocks: blocks.into_iter().collect(),
    }
}

#[derive(Debug, Clone)]
pub struct SmartService {
    tasks: TaskService,
}

impl SmartService {
    pub fn new(tasks: TaskService) -> Self {
        Self { tasks }
    }

    async fn open_tasks(&self) -> Result<Vec<Task>> {
        self.tasks.list(None, false).await
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub async fn today_tasks(&self) -> Result<Vec<Task>> {
        Ok(due_on(&self.open_tasks().await?, Self::today()))
    }

    pub async fn tomorrow_tasks(&self) -> Result<Vec<Task>> {
        let tomorrow = Self::today().checked_add_days(Days::new(1)).unwrap_or_else(Self::today);
        Ok(due_on(&self.open_tasks().await?, tomorrow))
    }

    pub async fn overdue(&self) -> Result<Vec<Task>> {
        Ok(overdue(&self.open_tasks().await?, Self::today()))
    }

    pub async fn next_days(&self, days: u64) -> Result<Vec<DayGroup>> {
        Ok(next_days(&self.open_tasks().await?, Self::today(), days.max(1)))
    }

    pub async fn search(
        &self,
        query: &str,
        project_id: Option<&str>,
        include_completed: bool,
    ) -> Result<Vec<Task>> {
        if query.trim().is_empty() {
            return Err(TickTickError::Validation("search query is required".to_string()));
        }
        let tasks = self.tasks.list(project_id, include_completed).await?;
        Ok(search(&tasks, query))
    }

    pub async fn unscheduled(&self) -> Result<Vec<Task>> {
        Ok(unscheduled(&self.open_tasks().await?))
    }

    pub async fn high_priority(&self) -> Result<Vec<Task>> {
        Ok(high_priority(&self.open_tasks().await?))
    }

    pub async fn productivity_summary(&self) -> Result<ProductivitySummary> {
        Ok(summarize(&self.open_tasks().await?, Self::today()))
    }

    /// Plan `date` (default today) into time blocks.
    pub async fn schedule_day(&self, date: Option<NaiveDate>) -> Result<DaySchedule> {
        let today = Self::today();
        Ok(schedule(&self.open_tasks().await?, date.unwrap_or(today), today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(id: &str, title: &str, priority: i64, due: Option<&str>) -> Task {
        serde_json::from_value(json!({
            "id": id,
            "projectId": "p1",
            "title": title,
            "priority": priority,
            "dueDate": due,
        }))
        .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Vec<Task> {
        vec![
            task("a", "Pay rent", 5, Some("2026-03-10T09:00:00.000+0000")),
            task("b", "Water plants", 0, Some("2026-03-10T18:00:00.000+0000")),
            task("c", "File taxes", 3, Some("2026-03-01T09:00:00.000+0000")),
            task("d", "Call mom", 1, Some("2026-03-12T09:00:00.000+0000")),
            task("e", "Read book", 0, None),
        ]
    }

    #[test]
    fn test_schedule_blocks() {
        // a: high, due today; b: none, due today; c: overdue medium; d: low, not today
        let plan = schedule(&sample(), day(2026, 3, 10), day(2026, 3, 10));
        assert_eq!(plan.total_tasks, 3);
        assert_eq!(plan.overdue_tasks, 1);
        assert_eq!(plan.high_priority, 1);

        let ids = |i: usize| plan.blocks[i].tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids(0), vec!["a", "c"]);
        assert_eq!(ids(1), vec!["b"]);
        assert!(ids(2).is_empty());
        assert!(plan.blocks[0].tasks[1].is_overdue);
    }

    #[test]
    fn test_schedule_alternates_and_dedupes() {
        let tasks = vec![
            task("x", "One", 3, Some("2026-03-12T09:00:00.000+0000")),
            task("y", "Two", 1, Some("2026-03-12T10:00:00.000+0000")),
            task("z", "Three", 0, Some("2026-03-12T11:00:00.000+0000")),
            task("o", "Late", 0, Some("2026-03-09T11:00:00.000+0000")),
        ];
        let plan = schedule(&tasks, day(2026, 3, 12), day(2026, 3, 10));
        assert_eq!(plan.blocks[0].tasks.len(), 1);
        assert_eq!(plan.blocks[1].tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["x", "z"]);
        assert_eq!(plan.blocks[2].tasks[0].id, "y");

        // The same overdue task is not planned twice when it is the target day
        let plan = schedule(&tasks, day(2026, 3, 9), day(2026, 3, 10));
        assert_eq!(plan.total_tasks, 1);
    }

    #[test]
    fn test_due_on_sorted_by_priority() {
        let tasks = due_on(&sample(), day(2026, 3, 10));
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_overdue_before_start_of_today() {
        let tasks = overdue(&sample(), day(2026, 3, 10));
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "c");
    }

    #[test]
    fn test_overdue_skips_completed() {
        let mut tasks = sample();
        tasks[2].status = 2;
        assert!(overdue(&tasks, day(2026, 3, 10)).is_empty());
    }

    #[test]
    fn test_next_days_groups_non_empty_days() {
        let groups = next_days(&sample(), day(2026, 3, 10), 7);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date, day(2026, 3, 10));
        assert_eq!(groups[0].tasks.len(), 2);
        assert_eq!(groups[1].date, day(2026, 3, 12));
    }

    #[test]
    fn test_unscheduled_and_high_priority() {
        let tasks = sample();
        assert_eq!(unscheduled(&tasks)[0].id, "e");
        let high = high_priority(&tasks);
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].id, "a");
    }

    #[test]
    fn test_search_scores_title_over_content() {
        let mut tasks = vec![
            task("x", "Groceries", 0, None),
            task("y", "Weekend", 0, None),
        ];
        tasks[1].content = Some("buy groceries".to_string());
        let found = search(&tasks, "GROCERIES");
        let ids: Vec<&str> = found.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn test_relevance_adds_priority_and_tags() {
        let mut t = task("x", "Report", 3, None);
        t.tags = vec!["report".to_string()];
        assert_eq!(relevance(&t, "report"), Some(TITLE_SCORE + TAG_SCORE + 3));
        assert_eq!(relevance(&t, "budget"), None);
    }

    #[test]
    fn test_summary_buckets() {
        let summary = summarize(&sample(), day(2026, 3, 10));
        assert_eq!(summary.total, 5);
        assert_eq!(summary.overdue, 1);
        assert_eq!(summary.due_today, 2);
        assert_eq!(summary.due_this_week, 3);
        assert_eq!(summary.unscheduled, 1);
        assert_eq!(summary.oldest_overdue_days, Some(9));
        assert_eq!(summary.by_priority["High"], 1);
        assert_eq!(summary.by_priority["None"], 2);
        assert!(!summary.recommendations.is_empty());
    }
}
