// src/stats/store.rs
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Persisted catalog (`Catalog` JSON).
pub const STYLE_DATA_KEY: &str = "styleData";
/// Milliseconds since the Unix epoch of the last successful fetch.
pub const LAST_FETCHED_KEY: &str = "lastFetched";
/// Annotator on/off flag; absent means enabled.
pub const ENABLED_KEY: &str = "enabled";

/// Persistent key-value store shared by the stats cache, the annotator and
/// the status endpoint.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write all entries as one unit; readers never observe a partial write.
    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()>;

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.set_many(vec![(key.to_string(), value)]).await
    }
}

/// Process-local store, used by tests and the CLI when no path is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let g = self.inner.lock().expect("memory store mutex poisoned");
        Ok(g.get(key).cloned())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        let mut g = self.inner.lock().expect("memory store mutex poisoned");
        for (k, v) in entries {
            g.insert(k, v);
        }
        Ok(())
    }
}

/// JSON object on disk. Writes go through a temp file + rename.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unparsable store file is moved before it is replaced.
    pub fn corrupt_path(&self) -> PathBuf {
        self.path.with_extension("json.corrupt")
    }

    /// Raw file contents; `None` when the file does not exist yet.
    async fn read_raw(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading store {}", self.path.display())),
        }
    }

    fn parse_map(&self, raw: &str) -> Result<Map<String, Value>> {
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(raw).with_context(|| format!("parsing store {}", self.path.display()))
    }

    async fn read_map(&self) -> Result<Map<String, Value>> {
        match self.read_raw().await? {
            Some(raw) => self.parse_map(&raw),
            None => Ok(Map::new()),
        }
    }

    /// Current map for a write. An unparsable file is moved aside and
    /// replaced, so a torn write cannot block every later write.
    async fn map_for_write(&self) -> Result<Map<String, Value>> {
        let Some(raw) = self.read_raw().await? else {
            return Ok(Map::new());
        };
        match self.parse_map(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                let aside = self.corrupt_path();
                warn!(
                    target: "stats",
                    error = ?e,
                    moved_to = %aside.display(),
                    "store file is corrupt; starting from an empty store"
                );
                if let Err(e) = tokio::fs::rename(&self.path, &aside).await {
                    warn!(target: "stats", error = ?e, "could not move corrupt store aside");
                }
                Ok(Map::new())
            }
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let map = self.read_map().await?;
        Ok(map.get(key).cloned())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.map_for_write().await?;
        for (k, v) in entries {
            map.insert(k, v);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(&map).context("serializing store")?;
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}
