use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Replaces the whole value stored under `key`.
    async fn put(&self, key: &str, value: String) -> anyhow::Result<()>;
}

pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// One `<key>.json` file per key inside a data directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(is_valid_key(key), "invalid store key `{}`", key);
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn put(&self, key: &str, value: String) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create {}", self.dir.display()))?;

        // rename is atomic on the same filesystem, so readers see old or new, never half
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        if let Err(e) = replace_file(&tmp, &path, value.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        if let Err(e) = sync_dir(&self.dir).await {
            debug!(error = %e, dir = %self.dir.display(), "directory fsync failed");
        }
        Ok(())
    }
}

/// Writes and fsyncs `tmp`, then renames it over `path`.
async fn replace_file(tmp: &Path, path: &Path, body: &[u8]) -> anyhow::Result<()> {
    let mut f = tokio::fs::File::create(tmp)
        .await
        .with_context(|| format!("create {}", tmp.display()))?;
    f.write_all(body)
        .await
        .with_context(|| format!("write {}", tmp.display()))?;
    f.sync_all()
        .await
        .with_context(|| format!("fsync {}", tmp.display()))?;
    drop(f);
    tokio::fs::rename(tmp, path)
        .await
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Makes the rename itself durable. Directories cannot be opened for fsync on windows.
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    if cfg!(unix) {
        tokio::fs::File::open(dir).await?.sync_all().await?;
    }
    Ok(())
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> anyhow::Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
