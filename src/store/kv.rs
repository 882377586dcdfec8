//! Durable key-value slots backing the fallback store.
//!
//! A slot is a named string value. `FileKvStore` keeps one file per slot in a
//! directory; `MemoryKvStore` keeps them in a map and is lost on drop.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::DatabaseError;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a slot. `Ok(None)` if it was never written.
    async fn get(&self, key: &str) -> Result<Option<String>, DatabaseError>;

    /// Overwrite a slot. Resolves once the value is durable.
    async fn set(&self, key: &str, value: &str) -> Result<(), DatabaseError>;
}

/// One `<key>.json` file per slot under `base_path`.
pub struct FileKvStore {
    base_path: PathBuf,
}

impl FileKvStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolve a slot key to its file. Keys like `@messenger_users` lose the
    /// leading `@`; anything outside `[A-Za-z0-9_-]` becomes `_`.
    fn resolve_path(&self, key: &str) -> PathBuf {
        let file: String = key
            .trim_start_matches('@')
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_path.join(format!("{file}.json"))
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let path = self.resolve_path(key);
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DatabaseError::Io(format!("read {}: {e}", path.display()))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let path = self.resolve_path(key);
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            DatabaseError::Io(format!("create {}: {e}", self.base_path.display()))
        })?;

        // Write-then-rename so a crash never leaves a half-written slot.
        let tmp = path.with_extension("json.tmp");
        let io_err = |e: std::io::Error| DatabaseError::Io(format!("write {}: {e}", path.display()));
        let mut file = fs::File::create(&tmp).await.map_err(io_err)?;
        file.write_all(value.as_bytes()).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        drop(file);
        fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }
}

/// Slots held in memory only.
#[derive(Default)]
pub struct MemoryKvStore {
    slots: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self.slots.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.slots
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
