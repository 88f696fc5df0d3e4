//! Markdown renderers for tool output.

use std::collections::BTreeMap;

use crate::api::AuthStatus;
use crate::cache::{CacheEntry, CacheStats, RefreshReport};
use crate::domain::{Calendar, CalendarEvent, Folder, FocusRecord, Habit, HabitRecord, PomoSettings, Priority, Project, Tag, Task};
use crate::services::{
    DailySummary, DayGroup, DaySchedule, FocusStats, HabitProgress, HabitStats, Overview, ProductivityScore,
    ProductivitySummary, TaskAnalytics, TodayFocus, UserProfile, WeeklyReport,
};

fn priority_label(value: i64) -> &'static str {
    Priority::from_value(value).label()
}

fn day(date: &str) -> &str {
    date.get(..10).unwrap_or(date)
}

fn duration(seconds: i64) -> String {
    let minutes = seconds / 60;
    if minutes >= 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{}m", minutes)
    }
}

pub fn task(task: &Task) -> String {
    let done = task.is_completed();
    let mut lines = vec![
        format!("### {} {}", if done { "[x]" } else { "[ ]" }, task.title),
        format!("- **ID**: `{}`", task.id),
        format!("- **Status**: {}", if done { "Complete" } else { "Incomplete" }),
        format!("- **Priority**: {}", priority_label(task.priority)),
    ];
    if !task.project_id.is_empty() {
        lines.push(format!("- **Project ID**: `{}`", task.project_id));
    }
    if let Some(content) = task.content.as_deref().filter(|c| !c.is_empty()) {
        lines.push(format!("- **Description**: {}", content));
    }
    if let Some(start) = &task.start_date {
        lines.push(format!("- **Start Date**: {}", start));
    }
    if let Some(due) = &task.due_date {
        lines.push(format!("- **Due Date**: {}", due));
    }
    if let Some(parent) = &task.parent_id {
        lines.push(format!("- **Parent**: `{}`", parent));
    }
    if !task.tags.is_empty() {
        let tags: Vec<String> = task.tags.iter().map(|t| format!("`{}`", t)).collect();
        lines.push(format!("- **Tags**: {}", tags.join(", ")));
    }
    if !task.items.is_empty() {
        lines.push("- **Checklist**:".to_string());
        for item in &task.items {
            let mark = if item.status > 0 { "[x]" } else { "[ ]" };
            lines.push(format!("  - {} {}", mark, item.title));
        }
    }
    lines.join("\n")
}

/// Tasks grouped by project, highest priority first within each group.
pub fn tasks(tasks: &[Task], title: &str) -> String {
    if tasks.is_empty() {
        return format!("## {}\n\nNo tasks found.", title);
    }
    let mut by_project: BTreeMap<&str, Vec<&Task>> = BTreeMap::new();
    for t in tasks {
        let key = if t.project_id.is_empty() { "inbox" } else { t.project_id.as_str() };
        by_project.entry(key).or_default().push(t);
    }

    let mut lines = vec![format!("## {} ({} total)", title, tasks.len())];
    for (project_id, mut group) in by_project {
        group.sort_by(|a, b| b.priority.cmp(&a.priority));
        lines.push(String::new());
        lines.push(format!("### Project: `{}`", project_id));
        for t in group {
            lines.push(String::new());
            lines.push(task(t));
        }
    }
    lines.join("\n")
}

pub fn day_groups(groups: &[DayGroup], title: &str) -> String {
    if groups.is_empty() {
        return format!("## {}\n\nNothing scheduled.", title);
    }
    let mut lines = vec![format!("## {}", title)];
    for group in groups {
        lines.push(String::new());
        lines.push(format!("### {} ({})", group.date.format("%A, %Y-%m-%d"), group.tasks.len()));
        for t in &group.tasks {
            lines.push(format!(
                "- **{}** [{}] `{}`",
                t.title,
                priority_label(t.priority),
                t.id
            ));
        }
    }
    lines.join("\n")
}

pub fn productivity_summary(summary: &ProductivitySummary) -> String {
    let mut lines = vec![
        "## Productivity Summary".to_string(),
        String::new(),
        format!("- **Open tasks**: {}", summary.total),
        format!("- **Overdue**: {}", summary.overdue),
        format!("- **Due today**: {}", summary.due_today),
        format!("- **Due this week**: {}", summary.due_this_week),
        format!("- **Unscheduled**: {}", summary.unscheduled),
    ];
    if let Some(days) = summary.oldest_overdue_days {
        lines.push(format!("- **Oldest overdue**: {} day(s)", days));
    }
    lines.push(String::new());
    lines.push("### By Priority".to_string());
    for priority in [Priority::High, Priority::Medium, Priority::Low, Priority::None] {
        let count = summary.by_priority.get(priority.label()).copied().unwrap_or(0);
        lines.push(format!("- {}: {}", priority.label(), count));
    }
    if !summary.recommendations.is_empty() {
        lines.push(String::new());
        lines.push("### Recommendations".to_string());
        lines.extend(summary.recommendations.iter().map(|r| format!("- {}", r)));
    }
    lines.join("\n")
}

pub fn overview(overview: &Overview) -> String {
    let t = &overview.tasks;
    let mut lines = vec![
        format!("## Overview for {}", overview.date),
        String::new(),
        "### Tasks".to_string(),
        format!("- **Open**: {}", t.total_pending),
        format!("- **Due today**: {}", t.due_today),
        format!("- **Overdue**: {}", t.overdue),
        format!("- **High priority**: {}", t.high_priority),
    ];
    if let Some(h) = &overview.habits {
        lines.push(String::new());
        lines.push("### Habits".to_string());
        lines.push(format!(
            "- **Done today**: {}/{} ({:.0}%)",
            h.completed_today, h.total_active, h.completion_rate
        ));
    }
    if let Some(f) = &overview.focus {
        lines.push(String::new());
        lines.push("### Focus".to_string());
        lines.push(format!("- **Today**: {} in {} pomodoro(s)", duration(f.total_seconds), f.pomo_sessions));
    }
    lines.join("\n")
}

pub fn daily_summary(summary: &DailySummary) -> String {
    let mut lines = vec![
        format!("## Daily Summary for {}", summary.date),
        String::new(),
        format!("### Completed ({})", summary.tasks_completed.len()),
    ];
    if summary.tasks_completed.is_empty() {
        lines.push("No tasks completed.".to_string());
    }
    lines.extend(
        summary
            .tasks_completed
            .iter()
            .map(|t| format!("- [x] {} `{}`", t.title, t.id)),
    );
    lines.push(String::new());
    lines.push(format!("### Focus ({}m)", summary.total_focus_minutes));
    if summary.focus_sessions.is_empty() {
        lines.push("No focus sessions.".to_string());
    }
    for session in &summary.focus_sessions {
        let task = session.task.as_deref().map(|t| format!(" on {}", t)).unwrap_or_default();
        lines.push(format!("- {}m {}{}", session.duration_minutes, session.focus_type, task));
    }
    lines.join("\n")
}

pub fn weekly_report(report: &WeeklyReport) -> String {
    let mut lines = vec![
        format!("## Week of {} to {}", report.week_start, report.week_end),
        String::new(),
        "| Day | Completed | Focus | Pomodoros |".to_string(),
        "|---|---|---|---|".to_string(),
    ];
    for d in &report.days {
        lines.push(format!(
            "| {} {} | {} | {}m | {} |",
            d.date.format("%a"),
            d.date,
            d.tasks_completed,
            d.focus_minutes,
            d.pomodoros
        ));
    }
    let totals = &report.totals;
    lines.push(String::new());
    lines.push(format!(
        "**Totals**: {} completed, {}m focus, {} pomodoros",
        totals.tasks_completed, totals.focus_minutes, totals.pomodoros
    ));
    lines.join("\n")
}

pub fn productivity_score(score: &ProductivityScore) -> String {
    let b = &score.breakdown;
    let mut lines = vec![
        format!("## Productivity Score: {}/100 ({})", score.score, score.grade),
        String::new(),
        format!("- **Tasks completed**: {}/30", b.task_completion),
        format!("- **Habit consistency**: {}/30", b.habit_consistency),
        format!("- **Focus time**: {}/30", b.focus_time),
        format!("- **Overdue penalty**: {}", b.overdue_penalty),
        String::new(),
        "### Recommendations".to_string(),
    ];
    lines.extend(score.recommendations.iter().map(|r| format!("- {}", r)));
    lines.join("\n")
}

pub fn task_analytics(analytics: &TaskAnalytics) -> String {
    let due = &analytics.due_date_analysis;
    let mut lines = vec![
        format!("## Task Analytics ({} open)", analytics.total_pending),
        String::new(),
        "### By Priority".to_string(),
    ];
    for priority in [Priority::High, Priority::Medium, Priority::Low, Priority::None] {
        let key = priority.label().to_lowercase();
        let count = analytics.priority_distribution.get(&key).copied().unwrap_or(0);
        lines.push(format!("- {}: {}", priority.label(), count));
    }
    lines.extend([
        String::new(),
        "### By Due Date".to_string(),
        format!("- Overdue: {}", due.overdue),
        format!("- Today: {}", due.today),
        format!("- Next 7 days: {}", due.this_week),
        format!("- Later: {}", due.later),
        format!("- No date: {}", due.no_date),
    ]);
    if !analytics.top_tags.is_empty() {
        lines.push(String::new());
        lines.push("### Top Tags".to_string());
        lines.extend(analytics.top_tags.iter().map(|t| format!("- #{}: {}", t.tag, t.count)));
    }
    lines.join("\n")
}

pub fn day_schedule(plan: &DaySchedule) -> String {
    let mut lines = vec![
        format!("## Schedule for {}", plan.date),
        String::new(),
        format!(
            "{} task(s), {} overdue, {} high priority",
            plan.total_tasks, plan.overdue_tasks, plan.high_priority
        ),
    ];
    for block in &plan.blocks {
        lines.push(String::new());
        lines.push(format!("### {} ({})", block.name, block.hours));
        lines.push(format!("_{}_", block.focus));
        if block.tasks.is_empty() {
            lines.push("- (free)".to_string());
        }
        for t in &block.tasks {
            let late = if t.is_overdue { " **overdue**" } else { "" };
            lines.push(format!("- [{}] {} `{}`{}", priority_label(t.priority), t.title, t.id, late));
        }
    }
    lines.join("\n")
}

pub fn project(project: &Project) -> String {
    let mut lines = vec![
        format!("### {}", project.name),
        format!("- **ID**: `{}`", project.id),
    ];
    if let Some(color) = &project.color {
        lines.push(format!("- **Color**: {}", color));
    }
    if let Some(view) = &project.view_mode {
        lines.push(format!("- **View**: {}", view));
    }
    if let Some(group) = &project.group_id {
        lines.push(format!("- **Folder**: `{}`", group));
    }
    if project.is_archived() {
        lines.push("- **Archived**: yes".to_string());
    }
    lines.join("\n")
}

pub fn projects(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "## Projects\n\nNo projects found.".to_string();
    }
    let mut lines = vec![format!("## Projects ({} total)", projects.len())];
    for p in projects {
        lines.push(String::new());
        lines.push(project(p));
    }
    lines.join("\n")
}

pub fn folders(folders: &[Folder]) -> String {
    if folders.is_empty() {
        return "## Folders\n\nNo folders found.".to_string();
    }
    let mut lines = vec![format!("## Folders ({} total)", folders.len()), String::new()];
    lines.extend(folders.iter().map(|f| format!("- **{}** `{}`", f.name, f.id)));
    lines.join("\n")
}

pub fn folder(folder: &Folder) -> String {
    let mut lines = vec![format!("### {}", folder.name), format!("- **ID**: `{}`", folder.id)];
    if let Some(order) = folder.sort_order {
        lines.push(format!("- **Sort order**: {}", order));
    }
    lines.join("\n")
}

fn tag_line(tag: &Tag, indent: &str) -> String {
    let mut line = format!("{}- **{}**", indent, tag.display_name());
    if let Some(color) = &tag.color {
        line.push_str(&format!(" ({})", color));
    }
    line
}

/// Tags with children nested under their parent.
pub fn tags(tags: &[Tag]) -> String {
    if tags.is_empty() {
        return "## Tags\n\nNo tags found.".to_string();
    }
    let is_root = |t: &Tag| {
        t.parent
            .as_deref()
            .is_none_or(|p| p.is_empty() || !tags.iter().any(|other| other.name == p))
    };
    let mut lines = vec![format!("## Tags ({} total)", tags.len()), String::new()];
    for root in tags.iter().filter(|t| is_root(t)) {
        lines.push(tag_line(root, ""));
        for child in tags.iter().filter(|t| t.parent.as_deref() == Some(root.name.as_str())) {
            lines.push(tag_line(child, "  "));
        }
    }
    lines.join("\n")
}

pub fn habit(habit: &Habit) -> String {
    let mut lines = vec![
        format!("### {}", habit.name),
        format!("- **ID**: `{}`", habit.id),
        format!("- **Status**: {}", habit.status().as_str()),
        format!(
            "- **Goal**: {} {}",
            habit.goal_value(),
            habit.unit.as_deref().unwrap_or("")
        )
        .trim_end()
        .to_string(),
    ];
    if let Some(freq) = &habit.frequency {
        lines.push(format!("- **Frequency**: `{}`", freq));
    }
    if let Some(streak) = habit.current_streak {
        lines.push(format!("- **Current streak**: {}", streak));
    }
    if let Some(best) = habit.best_streak {
        lines.push(format!("- **Best streak**: {}", best));
    }
    if let Some(total) = habit.total_check_ins {
        lines.push(format!("- **Check-ins**: {}", total));
    }
    lines.join("\n")
}

pub fn habits(habits: &[Habit]) -> String {
    if habits.is_empty() {
        return "## Habits\n\nNo habits found.".to_string();
    }
    let mut lines = vec![format!("## Habits ({} total)", habits.len())];
    for h in habits {
        lines.push(String::new());
        lines.push(habit(h));
    }
    lines.join("\n")
}

pub fn habit_records(records: &[HabitRecord]) -> String {
    if records.is_empty() {
        return "## Check-ins\n\nNo check-ins found.".to_string();
    }
    let mut lines = vec![format!("## Check-ins ({} total)", records.len()), String::new()];
    for r in records {
        let mut line = format!("- {}: {}", day(&r.date), r.value);
        if let Some(note) = r.note.as_deref().filter(|n| !n.is_empty()) {
            line.push_str(&format!(" ({})", note));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn habit_progress(progress: &[HabitProgress]) -> String {
    if progress.is_empty() {
        return "## Today's Habits\n\nNo active habits.".to_string();
    }
    let done = progress.iter().filter(|p| p.completed).count();
    let mut lines = vec![
        format!("## Today's Habits ({}/{} done)", done, progress.len()),
        String::new(),
    ];
    for p in progress {
        let mark = if p.completed { "[x]" } else { "[ ]" };
        lines.push(format!(
            "- {} **{}** {}/{} `{}`",
            mark, p.habit.name, p.current_value, p.goal, p.habit.id
        ));
    }
    lines.join("\n")
}

pub fn habit_stats(stats: &HabitStats) -> String {
    [
        format!("## {} Statistics", stats.name),
        String::new(),
        format!("- **Current streak**: {} day(s)", stats.current_streak),
        format!("- **Best streak**: {} day(s)", stats.best_streak),
        format!("- **Total check-ins**: {}", stats.total_check_ins),
        format!("- **Completion rate**: {:.1}% over {} days", stats.completion_rate, stats.days),
    ]
    .join("\n")
}

pub fn focus_records(records: &[FocusRecord]) -> String {
    if records.is_empty() {
        return "## Focus Records\n\nNo focus records found.".to_string();
    }
    let mut lines = vec![format!("## Focus Records ({} total)", records.len()), String::new()];
    for r in records {
        let when = r
            .started_at()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        let what = r.task_title.as_deref().or(r.task_id.as_deref()).unwrap_or("(no task)");
        lines.push(format!(
            "- {} {} on {} [{}] `{}`",
            when,
            duration(r.duration),
            what,
            r.focus_type.as_deref().unwrap_or("pomo"),
            r.id
        ));
    }
    lines.join("\n")
}

pub fn focus_stats(stats: &FocusStats, title: &str) -> String {
    let mut lines = vec![
        format!("## {}", title),
        String::new(),
        format!("- **Total focus**: {}", duration(stats.total_seconds)),
        format!("- **Sessions**: {} ({} pomodoro)", stats.sessions, stats.pomo_sessions),
        format!("- **Average session**: {}", duration(stats.average_seconds)),
    ];
    if !stats.by_task.is_empty() {
        let mut by_task: Vec<(&String, &i64)> = stats.by_task.iter().collect();
        by_task.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        lines.push(String::new());
        lines.push("### By Task".to_string());
        lines.extend(by_task.into_iter().map(|(k, v)| format!("- {}: {}", k, duration(*v))));
    }
    if !stats.by_type.is_empty() {
        lines.push(String::new());
        lines.push("### By Type".to_string());
        lines.extend(stats.by_type.iter().map(|(k, v)| format!("- {}: {}", k, duration(*v))));
    }
    lines.join("\n")
}

pub fn today_focus(today: &TodayFocus) -> String {
    let mut out = focus_stats(&today.stats, "Today's Focus");
    if let Some(target) = today.daily_target {
        out.push_str(&format!(
            "\n\n**Daily target**: {} pomodoros, {} to go",
            target,
            today.remaining.unwrap_or(0)
        ));
    }
    out
}

pub fn pomo_settings(settings: &PomoSettings) -> String {
    let minutes = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |m| format!("{}m", m));
    [
        "## Pomodoro Settings".to_string(),
        String::new(),
        format!("- **Pomodoro**: {}", minutes(settings.pomo_duration)),
        format!("- **Short break**: {}", minutes(settings.short_break)),
        format!("- **Long break**: {}", minutes(settings.long_break)),
        format!(
            "- **Long break every**: {}",
            settings.long_break_interval.map_or_else(|| "-".to_string(), |n| n.to_string())
        ),
        format!(
            "- **Daily target**: {}",
            settings.daily_pomo_target.map_or_else(|| "-".to_string(), |n| n.to_string())
        ),
    ]
    .join("\n")
}

pub fn calendar_events(events: &[CalendarEvent], title: &str) -> String {
    if events.is_empty() {
        return format!("## {}\n\nNo events.", title);
    }
    let mut lines = vec![format!("## {} ({} events)", title, events.len()), String::new()];
    for e in events {
        let when = if e.is_all_day.unwrap_or(false) {
            e.start_date.as_deref().map_or("all day".to_string(), |s| format!("{} all day", day(s)))
        } else {
            e.starts_at()
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "unscheduled".to_string())
        };
        let mut line = format!("- {} **{}**", when, e.title);
        if let Some(location) = e.location.as_deref().filter(|l| !l.is_empty()) {
            line.push_str(&format!(" @ {}", location));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn calendars(calendars: &[Calendar]) -> String {
    if calendars.is_empty() {
        return "## Calendars\n\nNo calendars subscribed.".to_string();
    }
    let mut lines = vec![format!("## Calendars ({} total)", calendars.len()), String::new()];
    lines.extend(calendars.iter().map(|c| format!("- **{}** `{}`", c.name, c.id)));
    lines.join("\n")
}

pub fn profile(profile: &UserProfile) -> String {
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    [
        "## Profile".to_string(),
        String::new(),
        format!("- **User ID**: `{}`", show(&profile.user_id)),
        format!("- **Inbox ID**: `{}`", show(&profile.inbox_id)),
        format!("- **Time zone**: {}", show(&profile.time_zone)),
        format!("- **Projects**: {}", profile.project_count),
        format!("- **Tags**: {}", profile.tag_count),
    ]
    .join("\n")
}

pub fn auth_status(status: &AuthStatus) -> String {
    let mut lines = vec![
        "## Authentication Status".to_string(),
        String::new(),
        format!(
            "- **Authenticated**: {}",
            if status.is_authenticated { "yes" } else { "no" }
        ),
        format!(
            "- **OAuth app configured**: {}",
            if status.oauth_configured { "yes" } else { "no" }
        ),
    ];
    match &status.oauth {
        Some(oauth) => {
            let expiry = oauth
                .expires_in_seconds
                .map_or_else(|| "no expiry".to_string(), |s| format!("expires in {}s", s));
            lines.push(format!("- **v1 (OAuth)**: {} token, {}", oauth.token_type, expiry));
        }
        None => lines.push("- **v1 (OAuth)**: not authorized".to_string()),
    }
    match &status.session {
        Some(session) => lines.push(format!(
            "- **v2 (session)**: logged in since {}",
            session.created_at.format("%Y-%m-%d %H:%M UTC")
        )),
        None => lines.push("- **v2 (session)**: not logged in".to_string()),
    }
    if let Some(inbox) = &status.inbox_id {
        lines.push(format!("- **Inbox ID**: `{}`", inbox));
    }
    if !status.is_authenticated {
        lines.push(String::new());
        lines.push(
            "Use `ticktick_login` for the v2 API, or `ticktick_configure_oauth` then `ticktick_authorize_oauth` for v1."
                .to_string(),
        );
    }
    lines.join("\n")
}

pub fn cache_entry(entry: &CacheEntry) -> String {
    let mut lines = vec![
        format!("- **{}** [{}]", entry.title, priority_label(entry.priority)),
        format!("  - Task ID: `{}`", entry.task_id),
        format!("  - Project ID: `{}`", entry.project_key()),
    ];
    if let Some(due) = &entry.due_date {
        lines.push(format!("  - Due: {}", day(due)));
    }
    if !entry.tags.is_empty() {
        lines.push(format!("  - Tags: {}", entry.tags.join(", ")));
    }
    lines.join("\n")
}

pub fn cache_entries(entries: &[CacheEntry], title: &str) -> String {
    if entries.is_empty() {
        return format!("## {}\n\nNo entries found.", title);
    }
    let mut lines = vec![format!("## {} ({} entries)", title, entries.len()), String::new()];
    lines.extend(entries.iter().map(cache_entry));
    lines.join("\n")
}

pub fn cache_stats(stats: &CacheStats) -> String {
    let mut lines = vec![
        "## Cache Statistics".to_string(),
        String::new(),
        format!("- **Total cached tasks**: {}", stats.total_entries),
        format!(
            "- **Last refresh**: {}",
            stats
                .last_refresh
                .map_or_else(|| "Never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        ),
        format!("- **Cache file**: `{}`", stats.cache_path),
    ];
    if !stats.by_project.is_empty() {
        lines.push(String::new());
        lines.push("### By Project".to_string());
        lines.extend(
            stats
                .by_project
                .iter()
                .map(|(project, count)| format!("- `{}`: {} tasks", project, count)),
        );
    }
    lines.push(String::new());
    lines.push("### By Priority".to_string());
    for priority in [Priority::High, Priority::Medium, Priority::Low, Priority::None] {
        let count = stats.by_priority.get(&priority.value()).copied().unwrap_or(0);
        lines.push(format!("- {} ({}): {}", priority.label(), priority.value(), count));
    }
    if !stats.top_tags.is_empty() {
        lines.push(String::new());
        lines.push("### Top Tags".to_string());
        lines.extend(
            stats
                .top_tags
                .iter()
                .map(|t| format!("- `{}`: {} tasks", t.tag, t.count)),
        );
    }
    lines.join("\n")
}

pub fn refresh_report(report: &RefreshReport) -> String {
    let mut lines = vec![
        "## Cache Refreshed".to_string(),
        String::new(),
        format!("- **Projects scanned**: {}", report.projects_scanned),
        format!("- **Added**: {}", report.added),
        format!("- **Updated**: {}", report.updated),
        format!("- **Removed**: {}", report.removed),
        format!("- **Unchanged**: {}", report.unchanged),
        format!("- **Total cached**: {}", report.total),
    ];
    if !report.failed_projects.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "Could not fetch {} project(s); their entries were kept: {}",
            report.failed_projects.len(),
            report.failed_projects.join(", ")
        ));
    }
    lines.join("\n")
}
