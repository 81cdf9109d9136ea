//! Best-effort persisted cache with rotating backups.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::store::{KeyValueStore, StoreError};

/// Number of backups kept per key.
pub const DEFAULT_MAX_BACKUPS: usize = 5;
/// Assumed quota when the store does not enforce one (5 MiB).
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Share of all backups dropped when a write hits the quota.
const CLEANUP_FRACTION: f64 = 0.3;
/// Usage percentage at which the cache reports a warning.
const WARNING_PERCENT: f64 = 80.0;
const HEALTH_PROBE_KEY: &str = "__troupe_health_probe__";
const BACKUP_MARKER: &str = "_backup_";
const LAST_SAVED_SUFFIX: &str = "_lastSaved";

/// Tunables for a [`LocalCache`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheOptions {
    pub max_backups: usize,
    pub quota_bytes: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_backups: DEFAULT_MAX_BACKUPS,
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

/// Approximate storage consumption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub quota_bytes: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Error,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Error => write!(f, "error"),
        }
    }
}

/// Result of [`LocalCache::health_check`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub usage: Option<StorageUsage>,
    pub message: String,
}

/// Persisted cache for JSON-serializable values.
///
/// Clones share the same underlying store. Concurrent writers to one key are
/// not coordinated; the last write wins.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
    options: CacheOptions,
    last_stamp: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_options(store, CacheOptions::default())
    }

    pub fn with_options(store: Arc<dyn KeyValueStore>, options: CacheOptions) -> Self {
        Self {
            store,
            options,
            last_stamp: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    /// Serializes `value` and writes it with a fresh backup and timestamp.
    ///
    /// Returns `false` if nothing was persisted. A quota failure triggers
    /// [`cleanup_old_backups`](Self::cleanup_old_backups) so the next save has
    /// room; the failed write itself is not retried.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Failed to serialize cache value for '{}': {}", key, e);
                return false;
            }
        };

        let stamp = format_stamp(self.next_stamp());
        match self.write_entry(key, &serialized, &stamp) {
            Ok(()) => {
                self.prune_backups(key);
                true
            }
            Err(StoreError::QuotaExceeded { .. }) => {
                tracing::warn!("Storage quota exceeded saving '{}', cleaning up backups", key);
                let removed = self.cleanup_old_backups();
                tracing::info!("Removed {} old backup(s)", removed);
                false
            }
            Err(e) => {
                tracing::error!("Failed to save '{}': {}", key, e);
                false
            }
        }
    }

    fn write_entry(&self, key: &str, serialized: &str, stamp: &str) -> Result<(), StoreError> {
        self.store.set(key, serialized)?;
        self.store.set(&backup_key(key, stamp), serialized)?;
        self.store.set(&last_saved_key(key), stamp)?;
        Ok(())
    }

    /// Loads the value under `key`.
    ///
    /// A missing or unreadable primary entry is recovered from the newest
    /// backup that parses, which then becomes the primary entry again.
    /// Falls back to `default` when nothing usable exists.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.store.get(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => return value,
                Err(e) => {
                    tracing::warn!("Cached '{}' is unreadable ({}), trying backups", key, e);
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to read '{}': {}", key, e);
                return default;
            }
        }

        self.restore_from_backup(key).unwrap_or(default)
    }

    fn restore_from_backup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        for (_, backup) in self.backup_entries(key) {
            let raw = match self.store.get(&backup) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Failed to read backup '{}': {}", backup, e);
                    continue;
                }
            };

            match serde_json::from_str(&raw) {
                Ok(value) => {
                    if let Err(e) = self.store.set(key, &raw) {
                        tracing::warn!("Failed to restore '{}' from backup: {}", key, e);
                    } else {
                        tracing::info!("Restored '{}' from backup '{}'", key, backup);
                    }
                    return Some(value);
                }
                Err(e) => {
                    tracing::debug!("Skipping unreadable backup '{}': {}", backup, e);
                }
            }
        }
        None
    }

    pub fn has_data(&self, key: &str) -> bool {
        matches!(self.store.get(key), Ok(Some(_)))
    }

    /// Removes the value, its timestamp, and all of its backups.
    pub fn remove(&self, key: &str) -> bool {
        let mut targets = vec![key.to_string(), last_saved_key(key)];
        targets.extend(self.backup_entries(key).into_iter().map(|(_, k)| k));

        let mut ok = true;
        for target in targets {
            if let Err(e) = self.store.remove(&target) {
                tracing::warn!("Failed to remove '{}': {}", target, e);
                ok = false;
            }
        }
        ok
    }

    pub fn last_saved_time(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.store.get(&last_saved_key(key)).ok()??;
        parse_stamp(&raw)
    }

    /// Keys holding a primary value, without timestamp or backup entries.
    pub fn data_keys(&self) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| {
                    k != HEALTH_PROBE_KEY
                        && !k.ends_with(LAST_SAVED_SUFFIX)
                        && split_backup_key(k).is_none()
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to list cache keys: {}", e);
                Vec::new()
            }
        }
    }

    /// Backup keys for `key`, newest first.
    pub fn backup_keys(&self, key: &str) -> Vec<String> {
        self.backup_entries(key).into_iter().map(|(_, k)| k).collect()
    }

    pub fn storage_usage(&self) -> StorageUsage {
        let used_bytes = self.store.usage().unwrap_or_else(|e| {
            tracing::warn!("Failed to measure storage usage: {}", e);
            0
        });
        let quota_bytes = self
            .store
            .quota_bytes()
            .unwrap_or(self.options.quota_bytes)
            .max(1);

        StorageUsage {
            used_bytes,
            quota_bytes,
            percent: used_bytes as f64 / quota_bytes as f64 * 100.0,
        }
    }

    /// Probes the store with a throwaway write and reports its condition.
    pub fn health_check(&self) -> HealthReport {
        let probe = self
            .store
            .set(HEALTH_PROBE_KEY, "ok")
            .and_then(|_| self.store.get(HEALTH_PROBE_KEY))
            .and_then(|value| {
                self.store.remove(HEALTH_PROBE_KEY)?;
                Ok(value)
            });

        match probe {
            Ok(Some(_)) => {}
            Ok(None) => {
                return HealthReport {
                    status: HealthStatus::Error,
                    usage: None,
                    message: "Storage probe was not readable after writing".to_string(),
                }
            }
            Err(e) => {
                tracing::error!("Storage health probe failed: {}", e);
                return HealthReport {
                    status: HealthStatus::Error,
                    usage: None,
                    message: format!("Local storage is unavailable: {}", e),
                };
            }
        }

        let usage = self.storage_usage();
        if usage.percent >= WARNING_PERCENT {
            HealthReport {
                status: HealthStatus::Warning,
                usage: Some(usage),
                message: format!("Local storage is {:.0}% full", usage.percent),
            }
        } else {
            HealthReport {
                status: HealthStatus::Healthy,
                usage: Some(usage),
                message: "Local storage is healthy".to_string(),
            }
        }
    }

    /// Deletes the oldest 30% (rounded up) of backups across every key.
    ///
    /// Returns the number of backups removed.
    pub fn cleanup_old_backups(&self) -> usize {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Failed to list keys for cleanup: {}", e);
                return 0;
            }
        };

        let mut backups: Vec<(DateTime<Utc>, String)> = keys
            .into_iter()
            .filter_map(|k| {
                let (_, stamp) = split_backup_key(&k)?;
                Some((stamp, k))
            })
            .collect();
        backups.sort();

        let count = (backups.len() as f64 * CLEANUP_FRACTION).ceil() as usize;
        let mut removed = 0;
        for (_, key) in backups.into_iter().take(count) {
            match self.store.remove(&key) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove backup '{}': {}", key, e),
            }
        }
        removed
    }

    fn prune_backups(&self, key: &str) {
        for (_, stale) in self
            .backup_entries(key)
            .into_iter()
            .skip(self.options.max_backups)
        {
            if let Err(e) = self.store.remove(&stale) {
                tracing::warn!("Failed to prune backup '{}': {}", stale, e);
            }
        }
    }

    /// Backups of `key` sorted newest first.
    fn backup_entries(&self, key: &str) -> Vec<(DateTime<Utc>, String)> {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Failed to list backups for '{}': {}", key, e);
                return Vec::new();
            }
        };

        let mut entries: Vec<(DateTime<Utc>, String)> = keys
            .into_iter()
            .filter_map(|k| match split_backup_key(&k) {
                Some((base, stamp)) if base == key => Some((stamp, k)),
                _ => None,
            })
            .collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
    }

    /// Strictly increasing save timestamps, so rapid saves never share a key.
    fn next_stamp(&self) -> DateTime<Utc> {
        let mut last = self.last_stamp.lock().unwrap_or_else(PoisonError::into_inner);
        let mut now = Utc::now();
        if let Some(previous) = *last {
            if now <= previous {
                now = previous + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

fn backup_key(key: &str, stamp: &str) -> String {
    format!("{}{}{}", key, BACKUP_MARKER, stamp)
}

/// Splits `<key>_backup_<stamp>` into the key and its stamp.
///
/// Keys whose suffix is not a timestamp are not backups.
fn split_backup_key(raw: &str) -> Option<(&str, DateTime<Utc>)> {
    let idx = raw.rfind(BACKUP_MARKER)?;
    let stamp = parse_stamp(&raw[idx + BACKUP_MARKER.len()..])?;
    Some((&raw[..idx], stamp))
}

fn last_saved_key(key: &str) -> String {
    format!("{}{}", key, LAST_SAVED_SUFFIX)
}

fn format_stamp(stamp: DateTime<Utc>) -> String {
    stamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_stamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileStore, MemoryStore};
    use serde::Deserialize;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct StaffRecord {
        id: String,
        name: String,
    }

    fn memory_cache() -> (LocalCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = LocalCache::new(store.clone());
        (cache, store)
    }

    fn backup_count(store: &MemoryStore) -> usize {
        store
            .keys()
            .unwrap()
            .iter()
            .filter(|k| split_backup_key(k).is_some())
            .count()
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (cache, _store) = memory_cache();
        let staff = vec![StaffRecord {
            id: "1".to_string(),
            name: "A".to_string(),
        }];

        assert!(cache.save("staff", &staff));
        let loaded: Vec<StaffRecord> = cache.load("staff", Vec::new());
        assert_eq!(loaded, staff);
    }

    #[test]
    fn test_data_keys_skip_bookkeeping_entries() {
        let (cache, _store) = memory_cache();
        cache.save("staff", &json!([]));
        cache.save("staff", &json!([1]));
        cache.save("schedule", &json!([]));

        assert_eq!(cache.data_keys(), vec!["schedule", "staff"]);
    }

    #[test]
    fn test_load_missing_returns_default() {
        let (cache, _store) = memory_cache();
        let loaded: Vec<StaffRecord> = cache.load("staff", Vec::new());
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_save_writes_timestamp_and_backup() {
        let (cache, store) = memory_cache();
        let before = Utc::now();

        cache.save("scenarios", &json!([]));

        let saved = cache.last_saved_time("scenarios").unwrap();
        assert!(saved >= before - Duration::seconds(1));
        assert_eq!(cache.backup_keys("scenarios").len(), 1);
        assert!(store.get("scenarios_lastSaved").unwrap().is_some());
    }

    #[test]
    fn test_cleared_primary_is_restored_from_backup() {
        let (cache, store) = memory_cache();
        cache.save("staff", &json!({"id": "1", "name": "A"}));

        store.remove("staff").unwrap();
        assert!(!cache.has_data("staff"));

        let loaded = cache.load("staff", json!(null));
        assert_eq!(loaded, json!({"id": "1", "name": "A"}));

        // Restored entry is primary again
        assert!(cache.has_data("staff"));
        assert_eq!(
            store.get("staff").unwrap(),
            Some(r#"{"id":"1","name":"A"}"#.to_string())
        );
    }

    #[test]
    fn test_restore_uses_newest_valid_backup() {
        let (cache, store) = memory_cache();
        cache.save("staff", &json!(["first"]));
        cache.save("staff", &json!(["second"]));
        cache.save("staff", &json!(["third"]));

        // Damage the newest backup and clear the primary
        let newest = cache.backup_keys("staff")[0].clone();
        store.set(&newest, "{not json").unwrap();
        store.remove("staff").unwrap();

        let loaded = cache.load("staff", json!([]));
        assert_eq!(loaded, json!(["second"]));
    }

    #[test]
    fn test_corrupt_primary_falls_back_to_backup() {
        let (cache, store) = memory_cache();
        cache.save("stores", &json!([{"id": "s1"}]));
        store.set("stores", "garbage").unwrap();

        let loaded = cache.load("stores", json!([]));
        assert_eq!(loaded, json!([{"id": "s1"}]));
    }

    #[test]
    fn test_all_backups_corrupt_returns_default() {
        let (cache, store) = memory_cache();
        cache.save("staff", &json!([1]));
        for key in cache.backup_keys("staff") {
            store.set(&key, "][").unwrap();
        }
        store.remove("staff").unwrap();

        let loaded = cache.load("staff", json!("fallback"));
        assert_eq!(loaded, json!("fallback"));
    }

    #[test]
    fn test_backup_retention_keeps_newest() {
        let (cache, _store) = memory_cache();
        let n = DEFAULT_MAX_BACKUPS;

        let mut all_backups = Vec::new();
        for i in 0..=n {
            cache.save("schedule", &json!([i]));
            all_backups.push(cache.backup_keys("schedule")[0].clone());
        }

        let remaining = cache.backup_keys("schedule");
        assert_eq!(remaining.len(), n);

        // Oldest dropped, newest N kept (newest first)
        let mut expected: Vec<String> = all_backups[1..].to_vec();
        expected.reverse();
        assert_eq!(remaining, expected);
    }

    #[test]
    fn test_custom_retention() {
        let store = Arc::new(MemoryStore::new());
        let cache = LocalCache::with_options(
            store,
            CacheOptions {
                max_backups: 2,
                ..CacheOptions::default()
            },
        );

        for i in 0..4 {
            cache.save("k", &i);
        }
        assert_eq!(cache.backup_keys("k").len(), 2);
        assert_eq!(cache.load("k", -1), 3);
    }

    #[test]
    fn test_remove_deletes_backups_and_timestamp() {
        let (cache, store) = memory_cache();
        cache.save("staff", &json!([1]));
        cache.save("staff", &json!([2]));
        cache.save("stores", &json!([3]));

        assert!(cache.remove("staff"));

        assert!(!cache.has_data("staff"));
        assert!(cache.last_saved_time("staff").is_none());
        assert!(cache.backup_keys("staff").is_empty());
        // Other keys are untouched
        assert!(cache.has_data("stores"));
        assert_eq!(backup_count(&store), 1);
    }

    #[test]
    fn test_keys_containing_backup_marker_are_primary_values() {
        let (cache, store) = memory_cache();
        cache.save("daily_backup_notes", &json!([1]));
        cache.save("daily_backup_notes", &json!([2]));
        cache.save("a", &json!(["a"]));
        cache.save("a_backup_b", &json!(["b"]));

        assert_eq!(cache.backup_keys("a").len(), 1);
        assert_eq!(cache.backup_keys("a_backup_b").len(), 1);
        assert_eq!(cache.backup_keys("daily_backup_notes").len(), 2);
        assert_eq!(
            cache.data_keys(),
            vec!["a", "a_backup_b", "daily_backup_notes"]
        );

        assert!(cache.remove("a"));
        assert!(cache.has_data("a_backup_b"));
        assert_eq!(cache.backup_keys("a_backup_b").len(), 1);

        // Three backups left; the oldest one goes
        assert_eq!(backup_count(&store), 3);
        assert_eq!(cache.cleanup_old_backups(), 1);
        assert!(cache.has_data("daily_backup_notes"));
        assert!(cache.has_data("a_backup_b"));
        assert_eq!(cache.backup_keys("daily_backup_notes").len(), 1);
        assert_eq!(cache.backup_keys("a_backup_b").len(), 1);
    }

    #[test]
    fn test_quota_exceeded_save_cleans_up_backups() {
        let store = Arc::new(MemoryStore::with_quota(2_000));
        let cache = LocalCache::new(store.clone());

        for i in 0..3 {
            assert!(cache.save("scenarios", &json!([{"id": i}])));
        }
        for i in 0..3 {
            assert!(cache.save("staff", &json!([{"id": i}])));
        }
        assert_eq!(backup_count(&store), 6);

        // Too large to ever fit: must not panic or error
        let saved = cache.save("big", &"x".repeat(3_000));
        assert!(!saved);
        assert!(!cache.has_data("big"));

        // ceil(6 * 0.3) = 2 oldest backups gone, both from the first key
        assert_eq!(backup_count(&store), 4);
        assert_eq!(cache.backup_keys("scenarios").len(), 1);
        assert_eq!(cache.backup_keys("staff").len(), 3);
    }

    #[test]
    fn test_cleanup_with_no_backups() {
        let (cache, _store) = memory_cache();
        assert_eq!(cache.cleanup_old_backups(), 0);
    }

    #[test]
    fn test_unavailable_store_degrades_silently() {
        let (cache, store) = memory_cache();
        cache.save("staff", &json!(["kept"]));
        store.set_unavailable(true);

        assert!(!cache.save("staff", &json!(["lost"])));
        assert_eq!(cache.load("staff", json!("default")), json!("default"));
        assert!(!cache.has_data("staff"));
        assert!(cache.last_saved_time("staff").is_none());
        assert_eq!(cache.storage_usage().used_bytes, 0);
    }

    #[test]
    fn test_health_check_states() {
        let (cache, store) = memory_cache();
        let report = cache.health_check();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(!cache.has_data(HEALTH_PROBE_KEY));

        store.set_unavailable(true);
        let report = cache.health_check();
        assert_eq!(report.status, HealthStatus::Error);
        assert!(report.usage.is_none());
    }

    #[test]
    fn test_health_check_warns_when_nearly_full() {
        let store = Arc::new(MemoryStore::with_quota(1_000));
        let cache = LocalCache::new(store.clone());
        store.set("filler", &"x".repeat(800)).unwrap();

        let report = cache.health_check();
        assert_eq!(report.status, HealthStatus::Warning);
        let usage = report.usage.unwrap();
        assert_eq!(usage.quota_bytes, 1_000);
        assert!(usage.percent >= 80.0);
    }

    #[test]
    fn test_storage_usage_uses_assumed_quota() {
        let (cache, store) = memory_cache();
        store.set("k", "v").unwrap();

        let usage = cache.storage_usage();
        assert_eq!(usage.used_bytes, 2);
        assert_eq!(usage.quota_bytes, DEFAULT_QUOTA_BYTES);
    }

    #[test]
    fn test_file_backed_cache_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().to_path_buf();

        {
            let cache = LocalCache::new(Arc::new(FileStore::new(path.clone())));
            cache.save("stores", &json!([{"id": "s1", "name": "Shibuya"}]));
        }

        let cache = LocalCache::new(Arc::new(FileStore::new(path)));
        let loaded = cache.load("stores", json!([]));
        assert_eq!(loaded, json!([{"id": "s1", "name": "Shibuya"}]));
        assert_eq!(cache.backup_keys("stores").len(), 1);
    }
}
