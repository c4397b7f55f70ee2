//! Best-effort local backup of the last attempted add-to-cart request.
//!
//! At most one record exists at a time, stored under [`BACKUP_KEY`]. The
//! record is a recovery hint only: it is never replayed automatically, and
//! every storage failure degrades to "no backup".

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wtf_core::AddItem;

/// Storage key for the single pending backup.
pub const BACKUP_KEY: &str = "wtf_cart_backup";

/// Default record lifetime.
pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub timestamp: DateTime<Utc>,
    pub payload: AddItem,
    pub expires_at: DateTime<Utc>,
}

impl BackupRecord {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable")]
    Unavailable,

    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("storage quota exceeded ({len} bytes > {limit} bytes)")]
    QuotaExceeded { len: usize, limit: usize },

    #[error("failed to encode backup record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String key/value storage, the local-storage analogue.
pub trait BackupStore: Send + Sync {
    /// Returns `Ok(None)` if `key` is absent.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns a [`StorageError`] if the value cannot be stored.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be modified.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
    disabled: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes whose value is longer than `limit` bytes.
    #[must_use]
    pub fn with_quota(limit: usize) -> Self {
        Self {
            quota: Some(limit),
            ..Self::default()
        }
    }

    /// A store that fails every call, like disabled browser storage.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        if self.disabled {
            return Err(StorageError::Unavailable);
        }
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl BackupStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries()?;
        if let Some(limit) = self.quota {
            if value.len() > limit {
                return Err(StorageError::QuotaExceeded {
                    len: value.len(),
                    limit,
                });
            }
        }
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// One `{key}.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl BackupStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        let path = self.path(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

/// TTL-bounded single-record cache over a [`BackupStore`].
///
/// Never returns errors: failures are logged and treated as "no backup".
#[derive(Debug)]
pub struct BackupCache<S> {
    store: S,
    ttl: Duration,
}

impl<S: BackupStore> BackupCache<S> {
    /// Cache with the default 24h TTL.
    pub fn new(store: S) -> Self {
        Self::with_ttl(store, Duration::hours(DEFAULT_TTL_HOURS))
    }

    pub fn with_ttl(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records `payload` as the pending submission, replacing any prior record.
    pub fn put(&self, payload: &AddItem) {
        self.put_at(payload, Utc::now());
    }

    pub fn put_at(&self, payload: &AddItem, now: DateTime<Utc>) {
        let record = BackupRecord {
            timestamp: now,
            payload: payload.clone(),
            expires_at: now + self.ttl,
        };
        let result = serde_json::to_string(&record)
            .map_err(StorageError::from)
            .and_then(|json| self.store.write(BACKUP_KEY, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "cart backup write failed, continuing without backup");
        }
    }

    /// Returns the pending record, or `None` if absent, unreadable, or
    /// expired. Expired and corrupt records are evicted.
    #[must_use]
    pub fn get(&self) -> Option<BackupRecord> {
        self.get_at(Utc::now())
    }

    #[must_use]
    pub fn get_at(&self, now: DateTime<Utc>) -> Option<BackupRecord> {
        let raw = match self.store.read(BACKUP_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "cart backup read failed");
                return None;
            }
        };

        let record = match serde_json::from_str::<BackupRecord>(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "discarding corrupt cart backup");
                self.clear();
                return None;
            }
        };

        if record.is_expired_at(now) {
            tracing::debug!(expires_at = %record.expires_at, "cart backup expired");
            self.clear();
            return None;
        }
        Some(record)
    }

    /// Removes the pending record.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(BACKUP_KEY) {
            tracing::warn!(error = %e, "cart backup clear failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn payload() -> AddItem {
        AddItem::new("4001", 2).with_property("Size", "Large")
    }

    #[test]
    fn record_survives_until_ttl() {
        let cache = BackupCache::new(MemoryStore::new());
        cache.put_at(&payload(), t0());

        let ttl = Duration::hours(24);
        let record = cache.get_at(t0() + ttl - Duration::seconds(1)).unwrap();
        assert_eq!(record.payload, payload());
        assert_eq!(record.expires_at, t0() + ttl);
    }

    #[test]
    fn record_expires_after_ttl_and_is_evicted() {
        let cache = BackupCache::new(MemoryStore::new());
        cache.put_at(&payload(), t0());

        let late = t0() + Duration::hours(24) + Duration::seconds(1);
        assert!(cache.get_at(late).is_none());
        assert!(cache.store().read(BACKUP_KEY).unwrap().is_none());
        assert!(cache.get_at(t0()).is_none());
    }

    #[test]
    fn put_overwrites_prior_record() {
        let cache = BackupCache::new(MemoryStore::new());
        cache.put_at(&payload(), t0());
        cache.put_at(&AddItem::new("5005", 1), t0());
        assert_eq!(cache.get_at(t0()).unwrap().payload.variant_id.as_str(), "5005");
    }

    #[test]
    fn clear_removes_record() {
        let cache = BackupCache::new(MemoryStore::new());
        cache.put_at(&payload(), t0());
        cache.clear();
        assert!(cache.get_at(t0()).is_none());
        cache.clear();
    }

    #[test]
    fn storage_failures_are_swallowed() {
        let cache = BackupCache::new(MemoryStore::disabled());
        cache.put_at(&payload(), t0());
        assert!(cache.get_at(t0()).is_none());
        cache.clear();

        let tiny = BackupCache::new(MemoryStore::with_quota(8));
        tiny.put_at(&payload(), t0());
        assert!(tiny.get_at(t0()).is_none());
    }

    #[test]
    fn corrupt_record_is_evicted() {
        let store = MemoryStore::new();
        store.write(BACKUP_KEY, "{not json").unwrap();
        let cache = BackupCache::new(store);
        assert!(cache.get_at(t0()).is_none());
        assert!(cache.store().read(BACKUP_KEY).unwrap().is_none());
    }

    #[test]
    fn custom_ttl_is_applied() {
        let cache = BackupCache::with_ttl(MemoryStore::new(), Duration::minutes(5));
        cache.put_at(&payload(), t0());
        assert!(cache.get_at(t0() + Duration::minutes(5)).is_some());
        assert!(cache.get_at(t0() + Duration::minutes(6)).is_none());
    }

    #[test]
    fn record_uses_camel_case_keys() {
        let record = BackupRecord {
            timestamp: t0(),
            payload: payload(),
            expires_at: t0() + Duration::hours(24),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("expiresAt").is_some());
        assert_eq!(value["payload"]["quantity"], 2);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        assert!(store.read(BACKUP_KEY).unwrap().is_none());

        store.write(BACKUP_KEY, "{\"a\":1}").unwrap();
        assert_eq!(store.read(BACKUP_KEY).unwrap().as_deref(), Some("{\"a\":1}"));
        assert!(dir.path().join("nested/wtf_cart_backup.json").exists());

        store.remove(BACKUP_KEY).unwrap();
        store.remove(BACKUP_KEY).unwrap();
        assert!(store.read(BACKUP_KEY).unwrap().is_none());
    }

    #[test]
    fn file_backed_cache_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        BackupCache::new(FileStore::new(dir.path())).put_at(&payload(), t0());
        let reopened = BackupCache::new(FileStore::new(dir.path()));
        assert_eq!(reopened.get_at(t0()).unwrap().payload, payload());
    }
}
