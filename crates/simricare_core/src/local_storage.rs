//! crates/simricare_core/src/local_storage.rs
//!
//! Startup policy for browser-persisted data: expired entries are purged and
//! keys the document store owns are never served from a stale local copy.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::offline_queue::OFFLINE_QUEUE_KEY;
use crate::ports::{KeyValueStore, PortResult};

/// The envelope every locally cached value is written in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub value: Value,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Keys removed by `initialize_local_storage`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub expired: Vec<String>,
    pub unreadable: Vec<String>,
    pub db_owned: Vec<String>,
}

impl InitReport {
    pub fn removed(&self) -> usize {
        self.expired.len() + self.unreadable.len() + self.db_owned.len()
    }
}

#[derive(Debug, Clone)]
pub struct LocalStoragePolicy {
    key_prefixes: Vec<String>,
    db_priority_keys: HashSet<String>,
}

impl Default for LocalStoragePolicy {
    fn default() -> Self {
        Self::new(["simricare:"])
    }
}

impl LocalStoragePolicy {
    /// Only keys starting with one of `key_prefixes` are managed.
    pub fn new<I, S>(key_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key_prefixes: key_prefixes.into_iter().map(Into::into).collect(),
            db_priority_keys: HashSet::new(),
        }
    }

    /// Marks a key whose authoritative copy lives in the document store.
    pub fn db_first(mut self, key: impl Into<String>) -> Self {
        self.db_priority_keys.insert(key.into());
        self
    }

    fn is_managed(&self, key: &str) -> bool {
        key != OFFLINE_QUEUE_KEY && self.key_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    pub fn is_db_first(&self, key: &str) -> bool {
        self.db_priority_keys.contains(key)
    }

    /// Runs once at startup. The offline queue is never touched.
    pub fn initialize_local_storage(
        &self,
        store: &dyn KeyValueStore,
        now: DateTime<Utc>,
    ) -> PortResult<InitReport> {
        let mut report = InitReport::default();

        for key in store.keys()? {
            if !self.is_managed(&key) {
                continue;
            }

            if self.is_db_first(&key) {
                store.remove(&key)?;
                report.db_owned.push(key);
                continue;
            }

            let Some(raw) = store.get(&key)? else {
                continue;
            };
            match serde_json::from_str::<StoredEntry>(&raw) {
                Ok(entry) if entry.is_expired(now) => {
                    store.remove(&key)?;
                    report.expired.push(key);
                }
                Ok(_) => {}
                Err(_) => {
                    store.remove(&key)?;
                    report.unreadable.push(key);
                }
            }
        }

        if report.removed() > 0 {
            info!(
                expired = report.expired.len(),
                unreadable = report.unreadable.len(),
                db_owned = report.db_owned.len(),
                "Local storage cleaned up"
            );
        }
        Ok(report)
    }

    /// Caches `value` under `key`. DB-first keys are not cached.
    pub fn write(
        &self,
        store: &dyn KeyValueStore,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> PortResult<()> {
        if self.is_db_first(key) {
            debug!(key, "not caching database-owned key");
            return Ok(());
        }
        let entry = StoredEntry {
            value,
            saved_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
        };
        store.set(key, &serde_json::to_string(&entry)?)
    }

    /// Reads a live cached value; expired entries are removed on the way.
    pub fn read(
        &self,
        store: &dyn KeyValueStore,
        key: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Value>> {
        if self.is_db_first(key) {
            return Ok(None);
        }
        let Some(raw) = store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<StoredEntry>(&raw) {
            Ok(entry) if !entry.is_expired(now) => Ok(Some(entry.value)),
            _ => {
                store.remove(key)?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline_queue::tests::FakeStorage;
    use serde_json::json;

    fn policy() -> LocalStoragePolicy {
        LocalStoragePolicy::default().db_first("simricare:profile")
    }

    #[test]
    fn initialize_purges_expired_unreadable_and_db_owned_keys() {
        let store = FakeStorage::default();
        let policy = policy();
        let now = Utc::now();

        policy
            .write(&store, "simricare:draft", json!("memo"), Some(Duration::hours(1)), now)
            .unwrap();
        policy
            .write(&store, "simricare:theme", json!("dark"), None, now)
            .unwrap();
        store.set("simricare:legacy", "plain text").unwrap();
        store.set("simricare:profile", "{}").unwrap();
        store.set("other-app", "{}").unwrap();
        store.set(OFFLINE_QUEUE_KEY, "[]").unwrap();

        let report = policy
            .initialize_local_storage(&store, now + Duration::hours(2))
            .unwrap();

        assert_eq!(report.expired, vec!["simricare:draft"]);
        assert_eq!(report.unreadable, vec!["simricare:legacy"]);
        assert_eq!(report.db_owned, vec!["simricare:profile"]);

        let mut left = store.keys().unwrap();
        left.sort();
        assert_eq!(left, vec!["offlineQueue", "other-app", "simricare:theme"]);
    }

    #[test]
    fn read_honours_expiry_and_db_priority() {
        let store = FakeStorage::default();
        let policy = policy();
        let now = Utc::now();

        policy
            .write(&store, "simricare:draft", json!({"text": "hi"}), Some(Duration::minutes(10)), now)
            .unwrap();
        assert_eq!(
            policy.read(&store, "simricare:draft", now).unwrap(),
            Some(json!({"text": "hi"}))
        );
        assert_eq!(
            policy
                .read(&store, "simricare:draft", now + Duration::minutes(10))
                .unwrap(),
            None
        );
        assert_eq!(store.get("simricare:draft").unwrap(), None);

        policy
            .write(&store, "simricare:profile", json!({"name": "x"}), None, now)
            .unwrap();
        assert_eq!(store.get("simricare:profile").unwrap(), None);
    }

    #[test]
    fn initialize_on_empty_storage_removes_nothing() {
        let report = policy()
            .initialize_local_storage(&FakeStorage::default(), Utc::now())
            .unwrap();
        assert_eq!(report.removed(), 0);
    }
}
