mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::VideoId;

/// Combined seen/notified snapshot for one channel, as returned by
/// `ChannelStore::list` for inspection (`--list`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreListing {
    pub seen: HashSet<VideoId>,
    pub notified: HashMap<VideoId, i64>,
}

/// Per-channel persistence of previously-observed and previously-notified
/// video IDs. Implementations must make `add_seen`/`add_notified` idempotent
/// unions/upserts.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn load_seen(&self) -> Result<HashSet<VideoId>>;
    async fn load_notified(&self) -> Result<HashMap<VideoId, i64>>;
    async fn add_seen(&self, ids: &HashSet<VideoId>) -> Result<()>;
    async fn add_notified(&self, entries: &HashMap<VideoId, i64>) -> Result<()>;
    /// Full seen/notified snapshot, for inspection (`--list`).
    async fn list(&self) -> Result<StoreListing>;
}
