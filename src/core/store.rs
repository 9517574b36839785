use crate::core::models::{Item, ResultsSnapshot};
use crate::core::settings::Settings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const OPTIONS_KEY: &str = "options";
pub const STUDIES_KEY: &str = "studies";
pub const CHECKED_KEY: &str = "checked";

/// Small JSON record store. `get(None)` returns the whole record; `set`
/// merges the given top-level keys into it.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: Option<&str>) -> Result<Value>;
    async fn set(&self, partial: Map<String, Value>) -> Result<()>;
}

pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read store: {}", self.path.display()))
            }
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content)
            .with_context(|| format!("Failed to parse store: {}", self.path.display()))?
        {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("Store {} does not hold a JSON object", self.path.display()),
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: Option<&str>) -> Result<Value> {
        let mut all = self.read_all().await?;
        Ok(match key {
            Some(key) => all.remove(key).unwrap_or(Value::Null),
            None => Value::Object(all),
        })
    }

    async fn set(&self, partial: Map<String, Value>) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut all = self.read_all().await?;
        all.extend(partial);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(&Value::Object(all))?;
        tokio::fs::write(&tmp, content)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// Typed view over the key-value store: user options and the last results.
#[derive(Clone)]
pub struct ConfigStore {
    store: Arc<dyn KeyValueStore>,
}

impl ConfigStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Writes default options when they are absent or incomplete, and always
    /// resets the results snapshot to an empty placeholder.
    pub async fn initialize(&self) -> Result<()> {
        let all = self.store.get(None).await?;
        let options = all.get(OPTIONS_KEY).cloned().unwrap_or(Value::Null);

        let mut partial = Map::new();
        if !Settings::is_complete(&options) {
            tracing::info!("Options missing or incomplete, writing defaults");
            partial.insert(
                OPTIONS_KEY.to_string(),
                serde_json::to_value(Settings::default())?,
            );
        }
        partial.insert(STUDIES_KEY.to_string(), json!({}));

        self.store.set(partial).await
    }

    /// Current options, re-read on every call.
    pub async fn settings(&self) -> Settings {
        match self.store.get(Some(OPTIONS_KEY)).await {
            Ok(record) => Settings::from_record(&record),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read options, using defaults");
                Settings::default()
            }
        }
    }

    pub async fn write_snapshot(&self, items: &[Item]) -> Result<()> {
        let mut partial = Map::new();
        partial.insert(STUDIES_KEY.to_string(), serde_json::to_value(items)?);
        partial.insert(
            CHECKED_KEY.to_string(),
            Value::String(Local::now().format("%H:%M:%S GMT%z").to_string()),
        );
        self.store.set(partial).await
    }

    /// Last persisted results. The startup placeholder reads as empty.
    pub async fn snapshot(&self) -> Result<ResultsSnapshot> {
        let all = self.store.get(None).await?;

        let studies = match all.get(STUDIES_KEY) {
            Some(studies @ Value::Array(_)) => serde_json::from_value(studies.clone())
                .context("Stored studies are not in the expected shape")?,
            _ => Vec::new(),
        };
        let checked = all
            .get(CHECKED_KEY)
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(ResultsSnapshot { studies, checked })
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: std::sync::Mutex<Map<String, Value>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with(record: Value) -> Self {
        let map = match record {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            inner: std::sync::Mutex::new(map),
        }
    }

    pub fn raw(&self, key: &str) -> Value {
        self.inner
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn put(&self, key: &str, value: Value) {
        self.inner.lock().unwrap().insert(key.to_string(), value);
    }
}

#[cfg(test)]
#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: Option<&str>) -> Result<Value> {
        let inner = self.inner.lock().unwrap();
        Ok(match key {
            Some(key) => inner.get(key).cloned().unwrap_or(Value::Null),
            None => Value::Object(inner.clone()),
        })
    }

    async fn set(&self, partial: Map<String, Value>) -> Result<()> {
        self.inner.lock().unwrap().extend(partial);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::make_item;
    use crate::core::settings::AlertMode;

    #[tokio::test]
    async fn test_initialize_writes_defaults_on_first_run() {
        let store = Arc::new(MemoryStore::default());
        let config = ConfigStore::new(store.clone());

        config.initialize().await.unwrap();

        assert_eq!(store.raw(OPTIONS_KEY), json!({"alert": "voice", "interval": 60}));
        assert_eq!(store.raw(STUDIES_KEY), json!({}));
    }

    #[tokio::test]
    async fn test_initialize_keeps_complete_options() {
        let store = Arc::new(MemoryStore::with(json!({
            "options": {"alert": "none", "interval": 300},
            "studies": [{"stale": true}]
        })));
        let config = ConfigStore::new(store.clone());

        config.initialize().await.unwrap();

        assert_eq!(store.raw(OPTIONS_KEY), json!({"alert": "none", "interval": 300}));
        assert_eq!(store.raw(STUDIES_KEY), json!({}));
    }

    #[tokio::test]
    async fn test_initialize_repairs_incomplete_options() {
        let store = Arc::new(MemoryStore::with(json!({"options": {"interval": 300}})));
        let config = ConfigStore::new(store.clone());

        config.initialize().await.unwrap();

        assert_eq!(store.raw(OPTIONS_KEY), json!({"alert": "voice", "interval": 60}));
    }

    #[tokio::test]
    async fn test_settings_reflect_changes_between_reads() {
        let store = Arc::new(MemoryStore::default());
        let config = ConfigStore::new(store.clone());
        config.initialize().await.unwrap();
        assert_eq!(config.settings().await.interval, 60);

        store.put(OPTIONS_KEY, json!({"alert": "sound-1", "interval": 120}));

        let settings = config.settings().await;
        assert_eq!(settings.interval, 120);
        assert_eq!(settings.alert, AlertMode::Sound(1));
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let store = Arc::new(MemoryStore::default());
        let config = ConfigStore::new(store.clone());
        config.initialize().await.unwrap();

        assert!(config.snapshot().await.unwrap().studies.is_empty());

        config
            .write_snapshot(&[make_item("a"), make_item("b")])
            .await
            .unwrap();

        let snapshot = config.snapshot().await.unwrap();
        assert_eq!(snapshot.studies.len(), 2);
        assert_eq!(snapshot.studies[1].id, "b");
        assert!(snapshot.checked.is_some());
    }

    #[tokio::test]
    async fn test_json_file_store_merges_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("storage.json"));

        assert_eq!(store.get(None).await.unwrap(), json!({}));
        assert_eq!(store.get(Some("options")).await.unwrap(), Value::Null);

        let mut first = Map::new();
        first.insert("options".to_string(), json!({"alert": "none", "interval": 90}));
        first.insert("studies".to_string(), json!({}));
        store.set(first).await.unwrap();

        let mut second = Map::new();
        second.insert("studies".to_string(), json!([]));
        store.set(second).await.unwrap();

        assert_eq!(
            store.get(None).await.unwrap(),
            json!({"options": {"alert": "none", "interval": 90}, "studies": []})
        );
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let store = JsonFileStore::new(path);
        assert!(store.get(None).await.is_err());
    }
}
