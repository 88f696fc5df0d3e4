//! A single cached task location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Priority, Task, clean_tags};

/// Alias the v1 API accepts in place of the real inbox id.
pub const INBOX: &str = "inbox";

/// True for any spelling of the inbox: the empty id, the `inbox` alias, a
/// real `inbox<digits>` id, or the inbox id the session reported.
pub fn is_inbox(project_id: &str, known: Option<&str>) -> bool {
    let id = project_id.trim();
    id.is_empty()
        || id.get(..INBOX.len()).is_some_and(|p| p.eq_ignore_ascii_case(INBOX))
        || known.is_some_and(|k| !k.is_empty() && k == id)
}

/// Grouping key for a project id; every inbox spelling collapses to `inbox`.
pub fn project_key<'a>(project_id: &'a str, inbox_id: Option<&str>) -> &'a str {
    if is_inbox(project_id, inbox_id) { INBOX } else { project_id }
}

/// What the cache remembers about one task: where it lives plus enough
/// metadata to search and filter without calling the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub task_id: String,
    /// Empty string means the inbox
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        task_id: impl Into<String>,
        project_id: impl Into<String>,
        title: impl Into<String>,
        priority: i64,
        tags: Vec<String>,
        due_date: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            project_id: project_id.into(),
            title: title.into(),
            priority,
            tags: clean_tags(&tags),
            due_date: due_date.filter(|d| !d.trim().is_empty()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self::new(
            task.id.clone(),
            task.project_id.clone(),
            task.title.clone(),
            task.priority,
            task.tags.clone(),
            task.due_date.clone(),
        )
    }

    pub fn priority_level(&self) -> Priority {
        Priority::from_value(self.priority)
    }

    /// Project key used for grouping; any inbox id reads as `inbox`.
    pub fn project_key(&self) -> &str {
        project_key(&self.project_id, None)
    }

    pub fn in_inbox(&self, inbox_id: Option<&str>) -> bool {
        is_inbox(&self.project_id, inbox_id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// True when the tracked fields match, ignoring timestamps.
    pub fn same_content(&self, other: &CacheEntry) -> bool {
        self.task_id == other.task_id
            && self.project_id == other.project_id
            && self.title == other.title
            && self.priority == other.priority
            && self.tags == other.tags
            && self.due_date == other.due_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_task() {
        let task = Task {
            id: "t1".to_string(),
            project_id: "p1".to_string(),
            title: "Write report".to_string(),
            priority: 3,
            tags: vec!["work".to_string(), " ".to_string()],
            due_date: Some("2026-01-01T00:00:00.000+0000".to_string()),
            ..Default::default()
        };
        let entry = CacheEntry::from_task(&task);
        assert_eq!(entry.task_id, "t1");
        assert_eq!(entry.priority_level(), Priority::Medium);
        assert_eq!(entry.tags, vec!["work"]);
        assert_eq!(entry.created_at, entry.updated_at);
    }

    #[test]
    fn test_project_key_inbox() {
        let entry = CacheEntry::new("t", "", "x", 0, vec![], None);
        assert_eq!(entry.project_key(), "inbox");
        let real = CacheEntry::new("t", "inbox12345", "x", 0, vec![], None);
        assert_eq!(real.project_key(), "inbox");
        assert!(real.in_inbox(None));
        let work = CacheEntry::new("t", "p1", "x", 0, vec![], None);
        assert_eq!(work.project_key(), "p1");
    }

    #[test]
    fn test_is_inbox_spellings() {
        assert!(is_inbox("", None));
        assert!(is_inbox("inbox", None));
        assert!(is_inbox("Inbox", None));
        assert!(is_inbox("inbox12345", None));
        assert!(!is_inbox("5f1a2b3c4d5e6f7a8b9c0d1e", None));
        assert!(is_inbox("custom-id", Some("custom-id")));
        assert!(!is_inbox("p1", Some("")));
        assert_eq!(project_key("inbox-9", Some("inbox-9")), INBOX);
    }

    #[test]
    fn test_blank_due_date_dropped() {
        let entry = CacheEntry::new("t", "p", "x", 0, vec![], Some("  ".to_string()));
        assert!(entry.due_date.is_none());
    }

    #[test]
    fn test_same_content_ignores_timestamps() {
        let a = CacheEntry::new("t", "p", "x", 1, vec!["a".to_string()], None);
        let mut b = a.clone();
        b.updated_at = a.updated_at + chrono::Duration::seconds(60);
        assert!(a.same_content(&b));
        b.title = "y".to_string();
        assert!(!a.same_content(&b));
    }

    #[test]
    fn test_deserialize_without_timestamps() {
        let entry: CacheEntry = serde_json::from_str(
            r#"{"task_id":"t","project_id":"p","title":"x"}"#,
        )
        .unwrap();
        assert_eq!(entry.priority, 0);
        assert!(entry.tags.is_empty());
    }
}
