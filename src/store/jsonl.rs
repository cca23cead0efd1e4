//! Append-only JSONL storage backend
//!
//! One `<collection>.jsonl` file per collection. Every `put` appends a
//! `{"key": ..., "value": ...}` line; nothing is ever rewritten in place.
//! [`JsonlBackend::open`] replays the files into an in-memory index (later
//! lines win), which serves all reads, so a crash mid-append loses at most
//! the torn final line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::store::StorageBackend;
use crate::Result;

/// On-disk line format. Values are embedded as parsed JSON rather than byte
/// arrays so the log stays greppable.
#[derive(Debug, Serialize, Deserialize)]
struct LogLine {
    key: String,
    value: serde_json::Value,
}

/// Durable storage backend writing one append-only JSONL file per
/// collection.
///
/// Values must be valid JSON documents (the engine's record encoding
/// guarantees this); a non-JSON value is rejected with a serialization
/// error before anything touches disk.
#[derive(Debug)]
pub struct JsonlBackend {
    dir: PathBuf,
    index: DashMap<String, DashMap<String, Vec<u8>>>,
    append_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl JsonlBackend {
    /// Open a backend rooted at `dir`, creating the directory if needed and
    /// replaying any existing `*.jsonl` files into the in-memory index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the directory cannot be
    /// created or an existing log file cannot be read. Undecodable lines are
    /// skipped with a warning rather than failing the open.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let backend = Self {
            dir,
            index: DashMap::new(),
            append_locks: DashMap::new(),
        };
        backend.replay().await?;
        Ok(backend)
    }

    /// Get the directory holding the log files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn replay(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(collection) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let collection = collection.to_string();
            let content = fs::read_to_string(&path).await?;
            let records = self.index.entry(collection.clone()).or_default();
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LogLine>(line) {
                    Ok(log_line) => {
                        let bytes = serde_json::to_vec(&log_line.value)?;
                        records.insert(log_line.key, bytes);
                    }
                    Err(e) => {
                        warn!("Skipping undecodable line in {collection}.jsonl: {e}");
                    }
                }
            }
        }
        Ok(())
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.jsonl"))
    }

    fn append_lock(&self, collection: &str) -> Arc<Mutex<()>> {
        let entry = self.append_locks.entry(collection.to_string()).or_default();
        Arc::clone(entry.value())
    }
}

impl StorageBackend for JsonlBackend {
    async fn put(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<()> {
        let parsed: serde_json::Value = serde_json::from_slice(&value)?;
        let mut line = serde_json::to_string(&LogLine {
            key: key.to_string(),
            value: parsed,
        })?;
        line.push('\n');

        // One appender per collection at a time keeps lines whole.
        let lock = self.append_lock(collection);
        {
            let _guard = lock.lock().await;
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.collection_path(collection))
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
        }

        self.index
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .index
            .get(collection)
            .and_then(|c| c.get(key).map(|v| v.value().clone())))
    }

    async fn scan_all(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self.index.get(collection).map_or_else(Vec::new, |c| {
            c.iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ASSIGNMENTS, EVENTS, EXPERIMENTS};

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlBackend::open(dir.path()).await.unwrap();
        let record = br#"{"name":"test"}"#.to_vec();
        store.put(EXPERIMENTS, "exp-1", record).await.unwrap();
        let value = store.get(EXPERIMENTS, "exp-1").await.unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&value).unwrap();
        assert_eq!(parsed["name"], "test");
    }

    #[tokio::test]
    async fn test_reopen_replays_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonlBackend::open(dir.path()).await.unwrap();
            store
                .put(EXPERIMENTS, "exp-1", br#"{"v":1}"#.to_vec())
                .await
                .unwrap();
            store
                .put(ASSIGNMENTS, "alice:exp-1", br#"{"variant":"control"}"#.to_vec())
                .await
                .unwrap();
        }

        let reopened = JsonlBackend::open(dir.path()).await.unwrap();
        assert!(reopened.get(EXPERIMENTS, "exp-1").await.unwrap().is_some());
        assert!(reopened
            .get(ASSIGNMENTS, "alice:exp-1")
            .await
            .unwrap()
            .is_some());
        assert!(reopened.get(EVENTS, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonlBackend::open(dir.path()).await.unwrap();
            store
                .put(EXPERIMENTS, "exp-1", br#"{"v":1}"#.to_vec())
                .await
                .unwrap();
            store
                .put(EXPERIMENTS, "exp-1", br#"{"v":2}"#.to_vec())
                .await
                .unwrap();
        }

        let reopened = JsonlBackend::open(dir.path()).await.unwrap();
        let value = reopened.get(EXPERIMENTS, "exp-1").await.unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&value).unwrap();
        assert_eq!(parsed["v"], 2);

        // Both appends are still in the log.
        let content = std::fs::read_to_string(dir.path().join("experiments.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_rejects_non_json_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlBackend::open(dir.path()).await.unwrap();
        let result = store.put(EXPERIMENTS, "bad", vec![0xFF, 0xFE]).await;
        assert!(result.is_err());
        assert!(store.get(EXPERIMENTS, "bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replay_skips_torn_line() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonlBackend::open(dir.path()).await.unwrap();
            store
                .put(EVENTS, "e-1", br#"{"ok":true}"#.to_vec())
                .await
                .unwrap();
        }
        // Simulate a crash mid-append.
        let path = dir.path().join("events.jsonl");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"key\":\"e-2\",\"val");
        std::fs::write(&path, content).unwrap();

        let reopened = JsonlBackend::open(dir.path()).await.unwrap();
        assert!(reopened.get(EVENTS, "e-1").await.unwrap().is_some());
        assert!(reopened.get(EVENTS, "e-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_lines_whole() {
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonlBackend::open(dir.path()).await.unwrap());
        let mut handles = Vec::new();
        for writer in 0..4 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    let record = format!(r#"{{"writer":{writer},"i":{i}}}"#).into_bytes();
                    store
                        .put(EVENTS, &format!("w{writer}-e{i}"), record)
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = std::fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 100);
        for line in content.lines() {
            serde_json::from_str::<LogLine>(line).unwrap();
        }
    }
}
