//! TickTick entity models
//!
//! Remote objects are passed through largely unchanged. Each model declares
//! the fields this crate reads and keeps everything else in a flattened
//! `extra` map, so read-modify-write updates never drop remote data.
//!
//! - Task / ChecklistItem / Priority: tasks and their wire-level helpers
//! - Project / Folder / ProjectData: lists and project groups
//! - Tag, Habit / HabitRecord, FocusRecord / PomoSettings
//! - CalendarEvent / Calendar

pub mod calendar;
pub mod focus;
pub mod habit;
pub mod project;
pub mod tag;
pub mod task;

pub use calendar::{Calendar, CalendarEvent};
pub use focus::{FocusRecord, NewFocusRecord, PomoSettings};
pub use habit::{Habit, HabitPatch, HabitRecord, HabitStatus, NewHabit};
pub use project::{Folder, NewProject, Project, ProjectData, ProjectPatch};
pub use tag::{NewTag, Tag, TagPatch};
pub use task::{
    ChecklistItem, NewTask, Priority, Task, TaskPatch, TaskStatus, clean_tags,
    format_ticktick_date, normalize_date_input, parse_ticktick_date,
};
