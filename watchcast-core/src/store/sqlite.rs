use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use super::{ChannelStore, StoreListing};
use crate::error::Result;
use crate::model::VideoId;

/// Seen/notified store backed by a per-channel SQLite database opened with
/// WAL journaling so a crash between tick phases cannot tear a write in half.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS old_video_ids (
                video_id TEXT PRIMARY KEY
            )
            ",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS notified_video_ids (
                video_id TEXT PRIMARY KEY,
                timestamp INTEGER NOT NULL
            )
            ",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ChannelStore for SqliteStore {
    async fn load_seen(&self) -> Result<HashSet<VideoId>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT video_id FROM old_video_ids")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn load_notified(&self) -> Result<HashMap<VideoId, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT video_id, timestamp FROM notified_video_ids")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn add_seen(&self, ids: &HashSet<VideoId>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("INSERT OR IGNORE INTO old_video_ids (video_id) VALUES (?)")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn add_notified(&self, entries: &HashMap<VideoId, i64>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (id, ts) in entries {
            sqlx::query(
                r"
                INSERT INTO notified_video_ids (video_id, timestamp) VALUES (?, ?)
                ON CONFLICT(video_id) DO UPDATE SET timestamp = excluded.timestamp
                ",
            )
            .bind(id)
            .bind(ts)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> Result<StoreListing> {
        Ok(StoreListing {
            seen: self.load_seen().await?,
            notified: self.load_notified().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("channel_1.sqlite3"))
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn round_trips_seen_set() {
        let (store, _dir) = temp_store().await;
        let ids: HashSet<VideoId> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        store.add_seen(&ids).await.unwrap();
        let loaded = store.load_seen().await.unwrap();
        assert_eq!(loaded, ids);
    }

    #[tokio::test]
    async fn add_seen_is_idempotent() {
        let (store, _dir) = temp_store().await;
        let ids: HashSet<VideoId> = ["a"].iter().map(|s| s.to_string()).collect();
        store.add_seen(&ids).await.unwrap();
        store.add_seen(&ids).await.unwrap();
        assert_eq!(store.load_seen().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_notified_upserts_timestamp() {
        let (store, _dir) = temp_store().await;
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), 100);
        store.add_notified(&entries).await.unwrap();
        entries.insert("a".to_string(), 200);
        store.add_notified(&entries).await.unwrap();
        let loaded = store.load_notified().await.unwrap();
        assert_eq!(loaded.get("a"), Some(&200));
    }

    #[tokio::test]
    async fn fresh_channel_loads_empty() {
        let (store, _dir) = temp_store().await;
        assert!(store.load_seen().await.unwrap().is_empty());
        assert!(store.load_notified().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_reflects_seen_and_notified() {
        let (store, _dir) = temp_store().await;
        let ids: HashSet<VideoId> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        store.add_seen(&ids).await.unwrap();
        let mut notified = HashMap::new();
        notified.insert("a".to_string(), 42);
        store.add_notified(&notified).await.unwrap();

        let listing = store.list().await.unwrap();
        assert_eq!(listing.seen, ids);
        assert_eq!(listing.notified.get("a"), Some(&42));
    }
}
