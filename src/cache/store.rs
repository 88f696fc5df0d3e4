//! JSON-file backed task cache with in-memory index.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{CacheEntry, project_key};
use super::query::CacheQuery;
use crate::atomic::write_atomic;
use crate::domain::{Priority, Task};
use crate::error::{Result, TickTickError};

/// On-disk format version.
pub const CACHE_FORMAT_VERSION: &str = "1.0";

const TOP_TAGS: usize = 10;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    last_refresh: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inbox_id: Option<String>,
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub projects_scanned: usize,
    pub failed_projects: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub last_refresh: Option<DateTime<Utc>>,
    pub cache_path: String,
    pub by_project: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<i64, usize>,
    pub top_tags: Vec<TagCount>,
}

/// Local map from task id to its project and summary fields.
#[derive(Debug)]
pub struct TaskCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    last_refresh: Option<DateTime<Utc>>,
    /// Real inbox id of the account, once known
    inbox_id: Option<String>,
}

impl TaskCache {
    /// Load the cache at `path`. A missing file yields an empty cache; an
    /// unreadable one is logged and replaced on the next save.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut cache = Self {
            path,
            entries: BTreeMap::new(),
            last_refresh: None,
            inbox_id: None,
        };

        if !cache.path.exists() {
            return cache;
        }

        let loaded = fs::read_to_string(&cache.path)
            .map_err(TickTickError::from)
            .and_then(|content| Ok(serde_json::from_str::<CacheFile>(&content)?));

        match loaded {
            Ok(file) => {
                if let Some(version) = file.version.as_deref()
                    && version != CACHE_FORMAT_VERSION
                {
                    log::warn!("Cache file version {} differs from {}", version, CACHE_FORMAT_VERSION);
                }
                cache.entries = file.entries;
                cache.last_refresh = file.last_refresh;
                cache.inbox_id = file.inbox_id;
                log::info!("Loaded {} cached tasks from {}", cache.entries.len(), cache.path.display());
            }
            Err(e) => {
                log::error!("Failed to load cache {}: {}", cache.path.display(), e);
            }
        }
        cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    pub fn inbox_id(&self) -> Option<&str> {
        self.inbox_id.as_deref()
    }

    /// Remember the account's inbox id; persisted with the next save.
    pub fn set_inbox_id(&mut self, inbox_id: impl Into<String>) {
        let inbox_id = inbox_id.into();
        if !inbox_id.trim().is_empty() {
            self.inbox_id = Some(inbox_id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) -> Result<()> {
        let file = CacheFile {
            version: Some(CACHE_FORMAT_VERSION.to_string()),
            last_refresh: self.last_refresh,
            inbox_id: self.inbox_id.clone(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        write_atomic(&self.path, &json, false).map_err(|e| {
            TickTickError::Cache(format!("Failed to save {}: {}", self.path.display(), e))
        })?;
        log::debug!("Saved {} tasks to cache", self.entries.len());
        Ok(())
    }

    fn upsert(&mut self, mut entry: CacheEntry) -> CacheEntry {
        if let Some(existing) = self.entries.get(&entry.task_id) {
            entry.created_at = existing.created_at;
            entry.updated_at = Utc::now();
        }
        self.entries.insert(entry.task_id.clone(), entry.clone());
        entry
    }

    /// Insert or replace the location of a task.
    pub fn register(
        &mut self,
        task_id: &str,
        project_id: &str,
        title: &str,
        priority: i64,
        tags: Vec<String>,
        due_date: Option<String>,
    ) -> Result<CacheEntry> {
        if task_id.trim().is_empty() {
            return Err(TickTickError::Validation("task_id is required".to_string()));
        }
        let entry = self.upsert(CacheEntry::new(
            task_id.trim(),
            project_id.trim(),
            title,
            priority,
            tags,
            due_date,
        ));
        self.save()?;
        Ok(entry)
    }

    pub fn register_task(&mut self, task: &Task) -> Result<CacheEntry> {
        let entry = self.upsert(CacheEntry::from_task(task));
        self.save()?;
        Ok(entry)
    }

    /// Remove a task; returns whether it was present.
    pub fn unregister(&mut self, task_id: &str) -> Result<bool> {
        let removed = self.entries.remove(task_id).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn get(&self, task_id: &str) -> Option<&CacheEntry> {
        self.entries.get(task_id)
    }

    pub fn project_of(&self, task_id: &str) -> Option<&str> {
        self.entries.get(task_id).map(|e| e.project_id.as_str())
    }

    /// Entries whose title contains `text`, case-insensitively.
    pub fn search(&self, text: &str) -> Vec<CacheEntry> {
        self.query(&CacheQuery::new().text(text))
    }

    pub fn by_project(&self, project_id: &str) -> Vec<CacheEntry> {
        self.query(&CacheQuery::new().project(project_id))
    }

    pub fn by_tag(&self, tag: &str) -> Vec<CacheEntry> {
        self.query(&CacheQuery::new().tag(tag))
    }

    pub fn list(&self) -> Vec<CacheEntry> {
        self.query(&CacheQuery::new())
    }

    /// Matching entries, highest priority first, then by title.
    pub fn query(&self, query: &CacheQuery) -> Vec<CacheEntry> {
        let mut matched: Vec<CacheEntry> = self
            .entries
            .values()
            .filter(|e| query.matches_in(e, self.inbox_id.as_deref()))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        matched
    }

    /// Drop every entry; returns how many were removed.
    pub fn clear(&mut self) -> Result<usize> {
        let count = self.entries.len();
        self.entries.clear();
        self.save()?;
        Ok(count)
    }

    /// Make the cache mirror a fresh fetch of open tasks.
    ///
    /// Completed tasks are skipped. Entries missing from `fetched` are removed
    /// unless they belong to a project listed in `failed_projects`, whose
    /// contents are unknown for this pass. Entries written after `started_at`
    /// are newer than the fetch and are neither overwritten nor removed.
    pub fn reconcile(
        &mut self,
        fetched: Vec<Task>,
        failed_projects: &[String],
        started_at: DateTime<Utc>,
    ) -> Result<RefreshReport> {
        let mut report = RefreshReport {
            failed_projects: failed_projects.to_vec(),
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();

        for task in fetched {
            if task.is_completed() || task.id.is_empty() {
                continue;
            }
            if !seen.insert(task.id.clone()) {
                continue;
            }
            let mut fresh = CacheEntry::from_task(&task);
            match self.entries.get_mut(&task.id) {
                Some(existing) if existing.same_content(&fresh) => report.unchanged += 1,
                Some(existing) if existing.updated_at > started_at => {
                    log::debug!("Keeping {} written during the refresh", task.id);
                    report.unchanged += 1;
                }
                Some(existing) => {
                    fresh.created_at = existing.created_at;
                    *existing = fresh;
                    report.updated += 1;
                }
                None => {
                    self.entries.insert(task.id.clone(), fresh);
                    report.added += 1;
                }
            }
        }

        let inbox_id = self.inbox_id.as_deref();
        let failed: HashSet<&str> = failed_projects
            .iter()
            .map(|p| project_key(p, inbox_id))
            .collect();
        let mut removed = 0;
        self.entries.retain(|task_id, entry| {
            let keep = seen.contains(task_id)
                || failed.contains(project_key(&entry.project_id, inbox_id))
                || entry.updated_at > started_at;
            if !keep {
                removed += 1;
            }
            keep
        });
        report.removed = removed;
        report.total = self.entries.len();

        self.last_refresh = Some(Utc::now());
        self.save()?;

        log::info!(
            "Cache reconciled: {} added, {} updated, {} removed, {} unchanged",
            report.added,
            report.updated,
            report.removed,
            report.unchanged
        );
        Ok(report)
    }

    /// Never refreshed, or last refreshed longer than `ttl` ago.
    pub fn is_stale(&self, ttl: Duration) -> bool {
        match self.last_refresh {
            None => true,
            Some(at) => {
                let age = Utc::now().signed_duration_since(at);
                age.to_std().map(|age| age > ttl).unwrap_or(false)
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let mut by_project: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_priority: BTreeMap<i64, usize> =
            Priority::ALL.iter().map(|p| (p.value(), 0)).collect();
        let mut tags: HashMap<String, usize> = HashMap::new();

        for entry in self.entries.values() {
            let key = project_key(&entry.project_id, self.inbox_id.as_deref());
            *by_project.entry(key.to_string()).or_default() += 1;
            *by_priority.entry(entry.priority).or_default() += 1;
            for tag in &entry.tags {
                *tags.entry(tag.clone()).or_default() += 1;
            }
        }

        let mut top_tags: Vec<TagCount> = tags
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect();
        top_tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        top_tags.truncate(TOP_TAGS);

        CacheStats {
            total_entries: self.entries.len(),
            last_refresh: self.last_refresh,
            cache_path: self.path.display().to_string(),
            by_project,
            by_priority,
            top_tags,
        }
    }

    /// Insert many entries with a single save.
    pub(super) fn upsert_many(&mut self, entries: Vec<CacheEntry>) -> Result<usize> {
        let count = entries.len();
        for entry in entries {
            self.upsert(entry);
        }
        self.save()?;
        Ok(count)
    }
}
