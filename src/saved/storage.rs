//! Key-value persistence for per-user state across restarts.
//!
//! Values are opaque strings; callers own the encoding. The file store keeps
//! one file per key and replaces it atomically, so a crash mid-write leaves the
//! previous value intact.

use anyhow::Context;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    /// Retrieve a value by key, or `None` if not present.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Insert or replace a value.
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// One file per key under a root directory.
pub struct FileKvStore {
    root: PathBuf,
}

impl FileKvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys carry emails; percent-encoding keeps them filesystem-safe.
        self.root.join(format!("{}.json", urlencoding::encode(key)))
    }
}

#[async_trait::async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating {}", self.root.display()))?;

        let path = self.path_for(key);
        let tmp = path.with_extension(format!("json.{}.tmp", ulid::Ulid::new()));
        fs::write(&tmp, value)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("replacing {}", path.display()));
        }
        Ok(())
    }
}

/// Process-local store, used by tests and when no directory is configured.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("atlas-kv-{}", ulid::Ulid::new()))
    }

    #[tokio::test]
    async fn file_store_round_trips_and_overwrites() {
        let root = temp_root();
        let store = FileKvStore::new(&root);

        assert_eq!(store.get("savedCountries_a@b.test").await.unwrap(), None);
        store.set("savedCountries_a@b.test", "[1]").await.unwrap();
        store.set("savedCountries_a@b.test", "[2]").await.unwrap();
        assert_eq!(
            store.get("savedCountries_a@b.test").await.unwrap().as_deref(),
            Some("[2]")
        );

        // No temp files left behind.
        let mut entries = fs::read_dir(&root).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["savedCountries_a%40b.test.json"]);

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let root = temp_root();
        let store = FileKvStore::new(&root);
        store.set("../escape", "x").await.unwrap();
        assert!(root.join("..%2Fescape.json").exists());
        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryKvStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }
}
