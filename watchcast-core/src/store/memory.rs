use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ChannelStore, StoreListing};
use crate::error::Result;
use crate::model::VideoId;

/// In-memory seen/notified store backing manual mode, where nothing is
/// persisted across process restarts.
#[derive(Default)]
pub struct MemoryStore {
    seen: Mutex<HashSet<VideoId>>,
    notified: Mutex<HashMap<VideoId, i64>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn load_seen(&self) -> Result<HashSet<VideoId>> {
        Ok(self.seen.lock().await.clone())
    }

    async fn load_notified(&self) -> Result<HashMap<VideoId, i64>> {
        Ok(self.notified.lock().await.clone())
    }

    async fn add_seen(&self, ids: &HashSet<VideoId>) -> Result<()> {
        self.seen.lock().await.extend(ids.iter().cloned());
        Ok(())
    }

    async fn add_notified(&self, entries: &HashMap<VideoId, i64>) -> Result<()> {
        self.notified.lock().await.extend(entries.clone());
        Ok(())
    }

    async fn list(&self) -> Result<StoreListing> {
        Ok(StoreListing {
            seen: self.seen.lock().await.clone(),
            notified: self.notified.lock().await.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seen_monotonically_grows() {
        let store = MemoryStore::new();
        let first: HashSet<VideoId> = ["a"].iter().map(|s| s.to_string()).collect();
        store.add_seen(&first).await.unwrap();
        let second: HashSet<VideoId> = ["b"].iter().map(|s| s.to_string()).collect();
        store.add_seen(&second).await.unwrap();
        let loaded = store.load_seen().await.unwrap();
        assert!(loaded.is_superset(&first));
        assert!(loaded.is_superset(&second));
    }

    #[tokio::test]
    async fn list_reflects_seen_and_notified() {
        let store = MemoryStore::new();
        let ids: HashSet<VideoId> = ["a"].iter().map(|s| s.to_string()).collect();
        store.add_seen(&ids).await.unwrap();
        let mut notified = HashMap::new();
        notified.insert("a".to_string(), 7);
        store.add_notified(&notified).await.unwrap();

        let listing = store.list().await.unwrap();
        assert_eq!(listing.seen, ids);
        assert_eq!(listing.notified.get("a"), Some(&7));
    }
}
