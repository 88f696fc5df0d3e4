//! ticktick-mcp - an MCP server for the TickTick task manager
//!
//! Exposes TickTick tasks, projects, tags, habits, focus records and
//! calendar events as MCP tools. A local task cache maps task ids to their
//! projects so single-task operations do not need a scan of every project.

pub mod api;
pub mod atomic;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod format;
pub mod server;
pub mod services;

pub use error::{Result, TickTickError};
