//! Filter over cached entries.

use chrono::{DateTime, Utc};

use super::entry::{CacheEntry, is_inbox};
use crate::domain::{Priority, parse_ticktick_date};

/// Conditions on cached entries. Every set condition must hold.
#[derive(Debug, Clone, Default)]
pub struct CacheQuery {
    pub project_id: Option<String>,
    /// Case-insensitive exact tag match
    pub tag: Option<String>,
    pub priority: Option<Priority>,
    pub min_priority: Option<Priority>,
    /// Case-insensitive substring of the title
    pub text: Option<String>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_after: Option<DateTime<Utc>>,
    pub has_due_date: Option<bool>,
    pub limit: Option<usize>,
}

impl CacheQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn min_priority(mut self, priority: Priority) -> Self {
        self.min_priority = Some(priority);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if an entry satisfies every condition.
    pub fn matches(&self, entry: &CacheEntry) -> bool {
        self.matches_in(entry, None)
    }

    /// Like [`matches`](Self::matches), also treating `inbox_id` as the inbox.
    pub fn matches_in(&self, entry: &CacheEntry, inbox_id: Option<&str>) -> bool {
        if let Some(project) = &self.project_id {
            let hit = if is_inbox(project, inbox_id) {
                entry.in_inbox(inbox_id)
            } else {
                entry.project_id == *project
            };
            if !hit {
                return false;
            }
        }
        if let Some(tag) = &self.tag
            && !entry.has_tag(tag)
        {
            return false;
        }
        if let Some(priority) = self.priority
            && entry.priority_level() != priority
        {
            return false;
        }
        if let Some(min) = self.min_priority
            && entry.priority_level() < min
        {
            return false;
        }
        if let Some(text) = &self.text
            && !entry.title.to_lowercase().contains(&text.to_lowercase())
        {
            return false;
        }

        let due = entry.due_date.as_deref().and_then(parse_ticktick_date);
        if let Some(has_due) = self.has_due_date
            && due.is_some() != has_due
        {
            return false;
        }
        if let Some(before) = self.due_before {
            match due {
                Some(d) if d < before => {}
                _ => return false,
            }
        }
        if let Some(after) = self.due_after {
            match due {
                Some(d) if d >= after => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(project: &str, title: &str, priority: i64, tags: &[&str], due: Option<&str>) -> CacheEntry {
        CacheEntry::new(
            format!("id-{}", title),
            project,
            title,
            priority,
            tags.iter().map(|t| t.to_string()).collect(),
            due.map(str::to_string),
        )
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(CacheQuery::new().matches(&entry("p", "x", 0, &[], None)));
    }

    #[test]
    fn test_project_and_inbox() {
        let inbox = entry("", "a", 0, &[], None);
        let work = entry("work", "b", 0, &[], None);
        assert!(CacheQuery::new().project("inbox").matches(&inbox));
        assert!(!CacheQuery::new().project("inbox").matches(&work));
        assert!(CacheQuery::new().project("work").matches(&work));
    }

    #[test]
    fn test_inbox_matches_real_inbox_id() {
        let real = entry("inbox12345", "a", 0, &[], None);
        let blank = entry("", "b", 0, &[], None);
        assert!(CacheQuery::new().project("inbox").matches(&real));
        assert!(CacheQuery::new().project("inbox12345").matches(&blank));
        assert!(CacheQuery::new().project("inbox12345").matches(&real));

        let session = entry("acct-inbox", "c", 0, &[], None);
        assert!(!CacheQuery::new().project("inbox").matches(&session));
        assert!(CacheQuery::new().project("inbox").matches_in(&session, Some("acct-inbox")));
    }

    #[test]
    fn test_tag_case_insensitive() {
        let e = entry("p", "x", 0, &["Urgent"], None);
        assert!(CacheQuery::new().tag("urgent").matches(&e));
        assert!(!CacheQuery::new().tag("urg").matches(&e));
    }

    #[test]
    fn test_priority_filters() {
        let medium = entry("p", "x", 3, &[], None);
        assert!(CacheQuery::new().min_priority(Priority::Low).matches(&medium));
        assert!(!CacheQuery::new().min_priority(Priority::High).matches(&medium));
        let exact = CacheQuery {
            priority: Some(Priority::Medium),
            ..Default::default()
        };
        assert!(exact.matches(&medium));
    }

    #[test]
    fn test_text_substring() {
        let e = entry("p", "Quarterly Report", 0, &[], None);
        assert!(CacheQuery::new().text("report").matches(&e));
        assert!(!CacheQuery::new().text("invoice").matches(&e));
    }

    #[test]
    fn test_due_window() {
        let e = entry("p", "x", 0, &[], Some("2026-01-10T00:00:00.000+0000"));
        let undated = entry("p", "y", 0, &[], None);
        let q = CacheQuery {
            due_after: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            due_before: Some(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(q.matches(&e));
        assert!(!q.matches(&undated));

        let no_due = CacheQuery {
            has_due_date: Some(false),
            ..Default::default()
        };
        assert!(no_due.matches(&undated));
        assert!(!no_due.matches(&e));
    }
}
