//! CSV export and import of cache entries.
//!
//! Columns: `task_id,project_id,title,priority,tags,due_date`, tags joined
//! with `;`.

use serde::{Deserialize, Serialize};

use super::entry::CacheEntry;
use super::store::TaskCache;
use crate::error::{Result, TickTickError};

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(default)]
    task_id: String,
    #[serde(default)]
    project_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
}

impl TaskCache {
    pub fn export_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for entry in self.list() {
            writer.serialize(CsvRow {
                task_id: entry.task_id,
                project_id: entry.project_id,
                title: entry.title,
                priority: Some(entry.priority.to_string()),
                tags: Some(entry.tags.join(";")),
                due_date: Some(entry.due_date.unwrap_or_default()),
            })?;
        }
        // Header only when empty, so the output is always importable
        if self.is_empty() {
            writer.write_record(["task_id", "project_id", "title", "priority", "tags", "due_date"])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| TickTickError::Cache(format!("Failed to finish CSV: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| TickTickError::Cache(e.to_string()))
    }

    /// Register every row; returns the number imported.
    ///
    /// An empty `project_id` means the inbox. The whole input is validated
    /// before anything is written.
    pub fn import_csv(&mut self, data: &str) -> Result<usize> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(data.as_bytes());

        let headers = reader.headers()?.clone();
        for required in ["task_id", "project_id"] {
            if !headers.iter().any(|h| h == required) {
                return Err(TickTickError::Validation(format!(
                    "line 1: missing required column '{}'",
                    required
                )));
            }
        }

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            // Start line of the record, so quoted newlines do not shift it
            let line = record.position().map_or(0, |p| p.line());
            let row: CsvRow = record.deserialize(Some(&headers))?;
            if row.task_id.is_empty() {
                return Err(TickTickError::Validation(format!(
                    "line {}: task_id is required",
                    line
                )));
            }
            let priority = match row.priority.as_deref().map(str::trim) {
                None | Some("") => 0,
                Some(raw) => raw.parse::<i64>().map_err(|_| {
                    TickTickError::Validation(format!("line {}: invalid priority '{}'", line, raw))
                })?,
            };
            let tags = row
                .tags
                .as_deref()
                .unwrap_or_default()
                .split(';')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();

            entries.push(CacheEntry::new(
                row.task_id,
                row.project_id,
                row.title,
                priority,
                tags,
                row.due_date,
            ));
        }

        let count = self.upsert_many(entries)?;
        log::info!("Imported {} cache entries from CSV", count);
        Ok(count)
    }
}
