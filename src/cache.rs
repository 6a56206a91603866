// src/cache.rs

use std::{
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;

use crate::error::AppError;

/// Cache keys shared between the readers and the handlers that invalidate them.
pub mod keys {
    pub const SUBJECTS: &str = "subjects";
    pub const CHAPTERS: &str = "chapters";
    pub const QUIZZES: &str = "quizzes";
    pub const SUMMARY: &str = "summary:";

    pub fn subject_summary(user_id: i64) -> String {
        format!("{}{}:subjects", SUMMARY, user_id)
    }

    pub fn monthly_summary(user_id: i64) -> String {
        format!("{}{}:monthly", SUMMARY, user_id)
    }

    pub fn user_summaries(user_id: i64) -> String {
        format!("{}{}:", SUMMARY, user_id)
    }
}

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

#[derive(Default)]
struct Store {
    entries: HashMap<String, Entry>,
    /// Bumped by every invalidation. A load that started under an older
    /// generation may have read stale rows and is not stored.
    generation: u64,
}

/// In-process key/value cache with a single fixed expiry.
///
/// Values are stored as JSON so one cache can serve every response type.
#[derive(Clone)]
pub struct Cache {
    store: Arc<RwLock<Store>>,
    ttl: Duration,
}

impl Cache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
            ttl,
        }
    }

    /// Returns the live value under `key`, or runs `load` and stores its result.
    ///
    /// Loader errors are returned as-is and nothing is stored. Neither is a
    /// result whose load overlapped an invalidation.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, load: F) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let generation = {
            let store = self.store.read().await;
            if let Some(entry) = store.entries.get(key) {
                if entry.expires_at > Instant::now() {
                    tracing::debug!(key, "cache hit");
                    return Ok(serde_json::from_value(entry.value.clone())?);
                }
            }
            store.generation
        };

        tracing::debug!(key, "cache miss");
        let value = load().await?;
        let json = serde_json::to_value(&value)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        let mut store = self.store.write().await;
        if store.generation == generation {
            store.entries.insert(
                key.to_string(),
                Entry {
                    value: json,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        } else {
            tracing::debug!(key, "cache invalidated during load, not storing");
        }

        Ok(value)
    }

    pub async fn invalidate(&self, key: &str) {
        let mut store = self.store.write().await;
        store.generation += 1;
        store.entries.remove(key);
    }

    /// Drops every entry whose key starts with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut store = self.store.write().await;
        store.generation += 1;
        store.entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Drops all catalogue listings after a structural write (cascading deletes
    /// can remove chapters, quizzes and scores together).
    pub async fn invalidate_catalogue(&self) {
        let mut store = self.store.write().await;
        store.generation += 1;
        store.entries.retain(|key, _| {
            key != keys::SUBJECTS && key != keys::CHAPTERS && key != keys::QUIZZES
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = Cache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Vec<String> = cache
                .get_or_set("subjects", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["Maths".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(value, vec!["Maths".to_string()]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_reloaded() {
        let cache = Cache::new(Duration::from_millis(0));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: i64 = cache
                .get_or_set("k", || async {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) as i64)
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let cache = Cache::new(Duration::from_secs(60));

        let first: Result<i64, _> = cache
            .get_or_set("k", || async { Err(AppError::BadRequest("boom".into())) })
            .await;
        assert!(first.is_err());

        let second: i64 = cache.get_or_set("k", || async { Ok(5) }).await.unwrap();
        assert_eq!(second, 5);
    }

    #[tokio::test]
    async fn prefix_invalidation_only_hits_matching_keys() {
        let cache = Cache::new(Duration::from_secs(60));
        let _: i64 = cache
            .get_or_set(&keys::subject_summary(1), || async { Ok(1) })
            .await
            .unwrap();
        let _: i64 = cache
            .get_or_set(&keys::subject_summary(2), || async { Ok(2) })
            .await
            .unwrap();

        cache.invalidate_prefix(&keys::user_summaries(1)).await;

        let reloaded: i64 = cache
            .get_or_set(&keys::subject_summary(1), || async { Ok(10) })
            .await
            .unwrap();
        let kept: i64 = cache
            .get_or_set(&keys::subject_summary(2), || async { Ok(20) })
            .await
            .unwrap();
        assert_eq!(reloaded, 10);
        assert_eq!(kept, 2);
    }

    #[tokio::test]
    async fn load_racing_an_invalidation_is_not_stored() {
        let cache = Cache::new(Duration::from_secs(60));

        let stale: i64 = cache
            .get_or_set(keys::SUBJECTS, || async {
                // A write lands while the loader is still running.
                cache.invalidate(keys::SUBJECTS).await;
                Ok(1)
            })
            .await
            .unwrap();
        assert_eq!(stale, 1);

        let fresh: i64 = cache
            .get_or_set(keys::SUBJECTS, || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(fresh, 2);
    }
}
