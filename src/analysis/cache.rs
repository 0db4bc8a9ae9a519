//! Best-effort cache in front of the analysis collaborator
//!
//! Entries are keyed by station and report instants, never by report text, so
//! a re-issued but otherwise identical observation hits the cache. Every
//! backend failure is logged and treated as a miss; the cache can slow down a
//! request but never fail it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheHandle;
use crate::models::{AnalysisResult, ForecastReport, WeatherObservation};
use crate::time;

/// Default entry lifetime; below the 15 minute observation cadence plus upstream lag.
pub const DEFAULT_TTL: Duration = Duration::from_secs(900);

const KEY_PREFIX: &str = "analysis";
const NONE: &str = "none";

pub struct AnalysisCache {
    handle: Arc<CacheHandle>,
    ttl: Duration,
}

/// Cache key for an observation/forecast pair
#[must_use]
pub fn key(observation: Option<&WeatherObservation>, forecast: Option<&ForecastReport>) -> String {
    let observation_part = observation.map_or_else(
        || NONE.to_string(),
        |obs| identify(&obs.icao_id, time::identity(obs.obs_time.as_ref())),
    );
    let forecast_part = forecast.map_or_else(
        || NONE.to_string(),
        |taf| identify(&taf.icao_id, time::identity(taf.issue_time.as_ref())),
    );
    format!("{KEY_PREFIX}:{observation_part}|{forecast_part}")
}

fn identify(station: &str, instant: Option<String>) -> String {
    format!(
        "{}@{}",
        station.trim().to_ascii_uppercase(),
        instant.as_deref().unwrap_or(NONE)
    )
}

impl AnalysisCache {
    #[must_use]
    pub fn new(handle: Arc<CacheHandle>, ttl: Duration) -> Self {
        Self { handle, ttl }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Arc::new(CacheHandle::disabled()), DEFAULT_TTL)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get(&self, key: &str) -> Option<AnalysisResult> {
        let store = self.handle.store().await?;
        let raw = match store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Analysis cache read failed: {e:#}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!("Discarding undecodable analysis cache entry: {e}");
                None
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self, value))]
    pub async fn put(&self, key: &str, value: &AnalysisResult) {
        let Some(store) = self.handle.store().await else {
            return;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize analysis for cache: {e}");
                return;
            }
        };
        if let Err(e) = store.put(key, raw, self.ttl).await {
            tracing::warn!("Analysis cache write failed: {e:#}");
        }
    }

    /// Cached analysis for the pair, or the result of `compute`, which is then stored.
    ///
    /// Errors from `compute` are returned unchanged and nothing is cached.
    /// Concurrent misses on one key may each run `compute`.
    pub async fn fetch_or_compute<F, Fut, E>(
        &self,
        observation: Option<&WeatherObservation>,
        forecast: Option<&ForecastReport>,
        compute: F,
    ) -> Result<AnalysisResult, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AnalysisResult, E>>,
    {
        let key = key(observation, forecast);
        if let Some(cached) = self.get(&key).await {
            tracing::debug!(%key, "Analysis served from cache");
            return Ok(cached);
        }

        let result = compute().await?;
        self.put(&key, &result).await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::time::RawTime;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemoryStore {
        entries: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl CacheStore for MemoryStore {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn put(&self, key: &str, value: String, _ttl: Duration) -> anyhow::Result<()> {
            self.entries.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow!("connection refused"))
        }

        async fn put(&self, _key: &str, _value: String, _ttl: Duration) -> anyhow::Result<()> {
            Err(anyhow!("connection refused"))
        }

        async fn remove(&self, _key: &str) -> anyhow::Result<()> {
            Err(anyhow!("connection refused"))
        }
    }

    fn observation(raw: &str, obs_time: RawTime) -> WeatherObservation {
        serde_json::from_value(serde_json::json!({
            "icaoId": "UAAA",
            "rawOb": raw,
        }))
        .map(|mut obs: WeatherObservation| {
            obs.obs_time = Some(obs_time);
            obs
        })
        .unwrap()
    }

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            summary: "Clear, light wind.".into(),
            conditions_rating: "Good".into(),
            hazards: vec![],
            forecast_summary: "No significant change.".into(),
            airport_name: "Almaty".into(),
            local_time: "14.11 03:13".into(),
        }
    }

    fn cache_with(store: Arc<dyn CacheStore>) -> AnalysisCache {
        AnalysisCache::new(Arc::new(CacheHandle::with_store(store)), DEFAULT_TTL)
    }

    #[test]
    fn test_key_ignores_raw_text() {
        let a = observation("METAR UAAA 142213Z 00000MPS CAVOK", RawTime::Number(1_700_000_000.0));
        let b = observation("METAR UAAA 142213Z 00000MPS CAVOK=", RawTime::Number(1_700_000_000.0));
        assert_eq!(key(Some(&a), None), key(Some(&b), None));
    }

    #[test]
    fn test_key_changes_with_observation_time() {
        let a = observation("same", RawTime::Number(1_700_000_000.0));
        let b = observation("same", RawTime::Number(1_700_001_800.0));
        assert_ne!(key(Some(&a), None), key(Some(&b), None));
    }

    #[test]
    fn test_key_shape() {
        let obs = observation("x", RawTime::Number(1_700_000_000.0));
        assert_eq!(key(Some(&obs), None), "analysis:UAAA@1700000000000|none");
        assert_eq!(key(None, None), "analysis:none|none");
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = cache_with(Arc::new(MemoryStore::default()));
        let obs = observation("x", RawTime::Number(1_700_000_000.0));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = cache
                .fetch_or_compute(Some(&obs), None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(analysis())
                })
                .await
                .unwrap();
            assert_eq!(result, analysis());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_compute_errors_are_not_cached() {
        let cache = cache_with(Arc::new(MemoryStore::default()));
        let obs = observation("x", RawTime::Number(1_700_000_000.0));

        let failed = cache
            .fetch_or_compute(Some(&obs), None, || async { Err(anyhow!("timeout")) })
            .await;
        assert!(failed.is_err());
        assert!(cache.get(&key(Some(&obs), None)).await.is_none());
    }

    #[tokio::test]
    async fn test_broken_backend_falls_through_to_compute() {
        let cache = cache_with(Arc::new(BrokenStore));
        let obs = observation("x", RawTime::Number(1_700_000_000.0));

        let result = cache
            .fetch_or_compute(Some(&obs), None, || async {
                Ok::<_, anyhow::Error>(analysis())
            })
            .await;
        assert_eq!(result.unwrap(), analysis());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::default());
        store
            .put("analysis:none|none", "not json".into(), DEFAULT_TTL)
            .await
            .unwrap();
        let cache = cache_with(store);
        assert!(cache.get("analysis:none|none").await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache_always_computes() {
        let cache = AnalysisCache::disabled();
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            cache
                .fetch_or_compute(None, None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(analysis())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
