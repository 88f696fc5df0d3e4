//! Local task location cache
//!
//! The v1 API cannot list tasks across projects, and most task endpoints need
//! the owning project id. The cache answers "which project is task X in" and
//! "which tasks match this filter" without walking every project, and is
//! kept current by write-through from the task service plus explicit or
//! TTL-driven refreshes.

pub mod csv;
pub mod entry;
pub mod query;
pub mod store;
pub mod sync;

use std::sync::Arc;

use tokio::sync::RwLock;

pub use entry::CacheEntry;
pub use query::CacheQuery;
pub use store::{CacheStats, RefreshReport, TagCount, TaskCache};
pub use sync::{FetchOutcome, TaskSource, fetch_all, refresh_shared};

/// Cache handle shared between the server and the services.
pub type SharedCache = Arc<RwLock<TaskCache>>;

pub fn shared(cache: TaskCache) -> SharedCache {
    Arc::new(RwLock::new(cache))
}
