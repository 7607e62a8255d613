//! TTL cache for discovery results, keyed by quantized geo-queries.
//!
//! Storage sits behind [`CacheBackend`]: [`FileBackend`] keeps a JSON file
//! that survives restarts (`~/.tairis/cache.json`, the default for both the
//! CLI and the server); [`MemoryBackend`] is used when `cache_path` is unset
//! and in tests.
//!
//! Every backend performs read-check-expiry-evict under a single lock, so a
//! concurrent write to the same key can never be undone by a stale eviction.
//! Writes also sweep out every expired record, so stored data stays bounded
//! by the keys written within one TTL.
//! Write failures surface as [`CacheError`] from the backend and are logged
//! and dropped by [`FacilityCache`].

use crate::config::Settings;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const CACHE_PREFIX: &str = "tairis_cache_";
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cannot serialize cache value: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Cannot write cache file {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// A stored value with its absolute expiry (Unix epoch milliseconds).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CacheRecord {
    pub value: Value,
    pub expiry: i64,
}

impl CacheRecord {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expiry
    }
}

/// Key-value storage with expiry-aware reads.
pub trait CacheBackend: Send + Sync {
    /// Return the value if present and not expired; evict it if expired.
    fn get(&self, key: &str, now_ms: i64) -> Option<Value>;
    /// Store or overwrite a record, dropping records already expired at `now_ms`.
    fn set(&self, key: &str, record: CacheRecord, now_ms: i64) -> Result<(), CacheError>;
    fn delete(&self, key: &str) -> Result<(), CacheError>;
    fn clear(&self) -> Result<(), CacheError>;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ─── In-memory backend ──────────────────────────────────────────

#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, CacheRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired or not (for testing).
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &str, now_ms: i64) -> Option<Value> {
        let mut entries = lock(&self.entries);
        if entries.get(key)?.is_expired(now_ms) {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|r| r.value.clone())
    }

    fn set(&self, key: &str, record: CacheRecord, now_ms: i64) -> Result<(), CacheError> {
        let mut entries = lock(&self.entries);
        entries.retain(|_, r| !r.is_expired(now_ms));
        entries.insert(key.to_string(), record);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        lock(&self.entries).clear();
        Ok(())
    }
}

// ─── File backend ───────────────────────────────────────────────

/// JSON file holding `{key: {value, expiry}}`, rewritten on every change.
pub struct FileBackend {
    path: PathBuf,
    entries: Mutex<HashMap<String, CacheRecord>>,
}

impl FileBackend {
    /// Open (or lazily create) the cache file at `path`.
    pub fn load_from(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn read_file(path: &Path) -> Option<HashMap<String, CacheRecord>> {
        let data = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache file");
                None
            }
        }
    }

    fn persist(&self, entries: &HashMap<String, CacheRecord>) -> Result<(), CacheError> {
        let write_err = |e: std::io::Error| CacheError::Write {
            path: self.path.clone(),
            message: e.to_string(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json).map_err(write_err)
    }
}

impl CacheBackend for FileBackend {
    fn get(&self, key: &str, now_ms: i64) -> Option<Value> {
        let mut entries = lock(&self.entries);
        if entries.get(key)?.is_expired(now_ms) {
            entries.remove(key);
            if let Err(e) = self.persist(&entries) {
                warn!(error = %e, "failed to persist cache eviction");
            }
            return None;
        }
        entries.get(key).map(|r| r.value.clone())
    }

    fn set(&self, key: &str, record: CacheRecord, now_ms: i64) -> Result<(), CacheError> {
        let mut entries = lock(&self.entries);
        entries.retain(|_, r| !r.is_expired(now_ms));
        entries.insert(key.to_string(), record);
        self.persist(&entries)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut entries = lock(&self.entries);
        entries.clear();
        self.persist(&entries)
    }
}

// ─── Facade ─────────────────────────────────────────────────────

/// Typed cache facade used by the discovery orchestrator.
#[derive(Clone)]
pub struct FacilityCache {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
}

impl FacilityCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            default_ttl: DEFAULT_TTL,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// File-backed when `cache_path` is set, in-memory otherwise.
    pub fn from_settings(settings: &Settings) -> Self {
        let cache = match &settings.cache_path {
            Some(path) => Self::new(Arc::new(FileBackend::load_from(path.clone()))),
            None => Self::in_memory(),
        };
        cache.with_default_ttl(settings.cache_ttl())
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Key for a query; coordinates are rounded to 3 decimals (~111 m).
    pub fn generate_key(lat: f64, lon: f64, radius_m: u32, category: &str) -> String {
        format!(
            "{}{}_{}_{}_{}",
            CACHE_PREFIX,
            category,
            quantize(lat),
            quantize(lon),
            radius_m
        )
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, now_ms())
    }

    pub fn get_at<T: DeserializeOwned>(&self, key: &str, now_ms: i64) -> Option<T> {
        let value = self.backend.get(key, now_ms)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(key, error = %e, "cached value has unexpected shape");
                None
            }
        }
    }

    /// Store with the default TTL.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        self.set_at(key, value, ttl, now_ms());
    }

    /// Store relative to an explicit clock reading. Never fails the caller.
    pub fn set_at<T: Serialize>(&self, key: &str, value: &T, ttl: Duration, now_ms: i64) {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let result = serde_json::to_value(value)
            .map_err(CacheError::from)
            .and_then(|value| {
                self.backend.set(
                    key,
                    CacheRecord {
                        value,
                        expiry: now_ms.saturating_add(ttl_ms),
                    },
                    now_ms,
                )
            });
        if let Err(e) = result {
            warn!(key, error = %e, "cache write failed");
        }
    }

    pub fn delete(&self, key: &str) {
        if let Err(e) = self.backend.delete(key) {
            warn!(key, error = %e, "cache delete failed");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.backend.clear() {
            warn!(error = %e, "cache clear failed");
        }
    }
}

fn quantize(v: f64) -> String {
    // + 0.0 folds -0.0 into 0.0
    format!("{:.3}", (v * 1000.0).round() / 1000.0 + 0.0)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FailingBackend;

    impl CacheBackend for FailingBackend {
        fn get(&self, _key: &str, _now_ms: i64) -> Option<Value> {
            None
        }
        fn set(&self, _key: &str, _record: CacheRecord, _now_ms: i64) -> Result<(), CacheError> {
            Err(CacheError::Write {
                path: PathBuf::from("/quota"),
                message: "quota exceeded".into(),
            })
        }
        fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Ok(())
        }
        fn clear(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    #[test]
    fn test_key_quantization() {
        assert_eq!(
            FacilityCache::generate_key(40.7128, -74.0060, 5000, "medical"),
            FacilityCache::generate_key(40.71281, -74.00601, 5000, "medical"),
        );
        assert_eq!(
            FacilityCache::generate_key(40.7128, -74.0060, 5000, "medical"),
            "tairis_cache_medical_40.713_-74.006_5000"
        );
    }

    #[test]
    fn test_key_varies_with_radius_and_category() {
        let base = FacilityCache::generate_key(40.7128, -74.0060, 5000, "medical");
        assert_ne!(base, FacilityCache::generate_key(40.7128, -74.0060, 2000, "medical"));
        assert_ne!(base, FacilityCache::generate_key(40.7128, -74.0060, 5000, "pharmacy"));
        assert_ne!(base, FacilityCache::generate_key(40.7148, -74.0060, 5000, "medical"));
    }

    #[test]
    fn test_key_negative_zero() {
        assert_eq!(
            FacilityCache::generate_key(-0.0001, 0.0001, 100, "medical"),
            FacilityCache::generate_key(0.0001, -0.0001, 100, "medical"),
        );
    }

    #[test]
    fn test_get_before_and_after_expiry() {
        let cache = FacilityCache::in_memory();
        let t0 = 1_700_000_000_000;
        cache.set_at("k", &vec!["a", "b"], Duration::from_secs(300), t0);

        let before: Option<Vec<String>> = cache.get_at("k", t0 + 299_999);
        assert_eq!(before, Some(vec!["a".to_string(), "b".to_string()]));

        let after: Option<Vec<String>> = cache.get_at("k", t0 + 300_001);
        assert_eq!(after, None);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = FacilityCache::new(backend.clone());
        cache.set_at("k", &1u32, Duration::from_millis(10), 0);
        assert_eq!(backend.len(), 1);
        assert_eq!(cache.get_at::<u32>("k", 11), None);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let cache = FacilityCache::in_memory();
        cache.set_at("k", &1u32, Duration::from_secs(1), 0);
        cache.set_at("k", &2u32, Duration::from_secs(1), 0);
        assert_eq!(cache.get_at::<u32>("k", 500), Some(2));
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let cache = FacilityCache::new(Arc::new(FailingBackend));
        cache.set("k", &vec![1, 2, 3]);
        assert_eq!(cache.get::<Vec<u32>>("k"), None);
    }

    #[test]
    fn test_shape_mismatch_is_a_miss() {
        let cache = FacilityCache::in_memory();
        cache.set_at("k", &"text", Duration::from_secs(1), 0);
        assert_eq!(cache.get_at::<Vec<u32>>("k", 0), None);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = FacilityCache::in_memory();
        cache.set_at("a", &1u32, Duration::from_secs(60), 0);
        cache.set_at("b", &2u32, Duration::from_secs(60), 0);
        cache.delete("a");
        assert_eq!(cache.get_at::<u32>("a", 1), None);
        assert_eq!(cache.get_at::<u32>("b", 1), Some(2));
        cache.clear();
        assert_eq!(cache.get_at::<u32>("b", 1), None);
    }

    #[test]
    fn test_file_backend_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        {
            let cache = FacilityCache::new(Arc::new(FileBackend::load_from(path.clone())));
            cache.set("k", &vec![1u32, 2]);
        }

        let cache = FacilityCache::new(Arc::new(FileBackend::load_from(path)));
        assert_eq!(cache.get::<Vec<u32>>("k"), Some(vec![1, 2]));
    }

    #[test]
    fn test_file_backend_record_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let backend = FileBackend::load_from(path.clone());
        backend
            .set("k", CacheRecord { value: serde_json::json!([1]), expiry: 42 }, 0)
            .unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["k"]["expiry"], 42);
        assert_eq!(raw["k"]["value"], serde_json::json!([1]));
    }

    #[test]
    fn test_file_backend_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();
        let backend = FileBackend::load_from(path);
        assert_eq!(backend.get("anything", 0), None);
    }

    #[test]
    fn test_concurrent_writers_share_backend() {
        let cache = FacilityCache::in_memory();
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    cache.set_at(&format!("k{}", i), &i, Duration::from_secs(60), 0);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for i in 0..8u32 {
            assert_eq!(cache.get_at::<u32>(&format!("k{}", i), 1), Some(i));
        }
    }

    #[test]
    fn test_write_sweeps_expired_records() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = FacilityCache::new(backend.clone());
        for i in 0..50 {
            cache.set_at(&format!("old{}", i), &i, Duration::from_secs(300), 0);
        }
        cache.set_at("live", &1u32, Duration::from_secs(600), 100_000);
        assert_eq!(backend.len(), 51);

        cache.set_at("fresh", &2u32, Duration::from_secs(300), 300_001);
        assert_eq!(backend.len(), 2);
        assert_eq!(cache.get_at::<u32>("live", 300_001), Some(1));
        assert_eq!(cache.get_at::<u32>("fresh", 300_001), Some(2));
    }

    #[test]
    fn test_file_backend_sweeps_expired_records_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = FacilityCache::new(Arc::new(FileBackend::load_from(path.clone())));
        for i in 0..50 {
            cache.set_at(&format!("old{}", i), &i, Duration::from_secs(300), 0);
        }
        cache.set_at("fresh", &1u32, Duration::from_secs(300), 300_001);

        let raw: HashMap<String, CacheRecord> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 1);
        assert!(raw.contains_key("fresh"));
    }

    #[test]
    fn test_same_key_write_survives_concurrent_expired_read() {
        let now = 1_000;
        let dir = TempDir::new().unwrap();
        for backend in [
            Arc::new(MemoryBackend::new()) as Arc<dyn CacheBackend>,
            Arc::new(FileBackend::load_from(dir.path().join("cache.json"))),
        ] {
            let cache = FacilityCache::new(backend);
            for round in 0..50u32 {
                cache.set_at("k", &0u32, Duration::from_millis(1), 0);

                let reader = {
                    let cache = cache.clone();
                    std::thread::spawn(move || cache.get_at::<u32>("k", now))
                };
                let writer = {
                    let cache = cache.clone();
                    std::thread::spawn(move || {
                        cache.set_at("k", &(round + 1), Duration::from_secs(60), now)
                    })
                };
                let seen = reader.join().unwrap();
                writer.join().unwrap();

                assert!(seen.is_none() || seen == Some(round + 1));
                assert_eq!(cache.get_at::<u32>("k", now), Some(round + 1));
            }
        }
    }
}
