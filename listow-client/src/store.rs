//! Persistent key/value store for client state.
//!
//! Everything lives in one JSON object on disk. Each write replaces the file atomically by
//! writing a sibling temp file and renaming it over the original.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{error::Result, models::ListId};

pub const AUTH_TOKEN: &str = "auth_token";
pub const USER_DATA: &str = "user_data";
pub const CACHED_LISTS: &str = "cached_lists";
pub const OFFLINE_ACTION_QUEUE: &str = "offline_action_queue";
/// Temporary ids already replaced by server ids
pub const ID_REMAPS: &str = "id_remaps";

/// Cache key for one list's items.
pub fn cached_items_key(list_id: ListId) -> String {
    format!("cached_items_{list_id}")
}

pub struct LocalStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl LocalStore {
    /// Open the store at `path`, starting empty if the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Map::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened local store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    pub async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut changed = false;
        for key in keys {
            changed |= entries.remove(*key).is_some();
        }
        if changed {
            self.persist(&entries).await?;
        }
        Ok(())
    }

    /// Read-modify-write one key under the store lock. A missing key starts from `T::default()`.
    pub async fn update<T, R, F>(&self, key: &str, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> R,
    {
        let mut entries = self.entries.lock().await;
        let mut value: T = match entries.get(key) {
            Some(v) => serde_json::from_value(v.clone())?,
            None => T::default(),
        };
        let result = f(&mut value);
        entries.insert(key.to_string(), serde_json::to_value(&value)?);
        self.persist(&entries).await?;
        Ok(result)
    }

    /// Like [`update`](Self::update), but leaves a missing key missing and returns `None`.
    pub async fn update_existing<T, R, F>(&self, key: &str, f: F) -> Result<Option<R>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> R,
    {
        let mut entries = self.entries.lock().await;
        let Some(current) = entries.get(key) else {
            return Ok(None);
        };
        let mut value: T = serde_json::from_value(current.clone())?;
        let result = f(&mut value);
        entries.insert(key.to_string(), serde_json::to_value(&value)?);
        self.persist(&entries).await?;
        Ok(Some(result))
    }

    /// Remove a key and return what it held.
    pub async fn take<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut entries = self.entries.lock().await;
        let Some(value) = entries.remove(key) else {
            return Ok(None);
        };
        self.persist(&entries).await?;
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn persist(&self, entries: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, serde_json::to_vec(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
