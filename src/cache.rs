use anyhow::{Result, anyhow};
use async_trait::async_trait;
use fjall::Keyspace;
use serde::Deserialize;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::OnceCell;
use tokio::task;

use crate::error::AeroWeatherError;

/// Key/value store with per-entry expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

// `expires_at` leads so a sweep can read it without knowing `T`
#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    expires_at: u64, // Unix timestamp (seconds)
    value: T,
}

/// On-disk cache backed by a fjall keyspace
pub struct PersistentCache {
    _db: fjall::Database,
    store: Keyspace,
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> anyhow::Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Delete every entry that has expired by `now`. Unreadable entries go too.
fn sweep_store(store: &Keyspace, now: u64) -> Result<usize> {
    let mut stale = Vec::new();
    for item in store.iter() {
        let (key, bytes) = item.into_inner()?;
        let expired = postcard::take_from_bytes::<u64>(&bytes)
            .map_or(true, |(expires_at, _)| now >= expires_at);
        if expired {
            stale.push(key);
        }
    }
    let removed = stale.len();
    for key in stale {
        store.remove(key)?;
    }
    Ok(removed)
}

impl PersistentCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = fjall::Database::builder(path).open().map_err(|e| {
            AeroWeatherError::cache(format!("Failed to open cache at {}: {e}", path.display()))
        })?;
        let items = db.keyspace("analysis", fjall::KeyspaceCreateOptions::default)?;
        let removed = sweep_store(&items, unix_now()?)?;
        if removed > 0 {
            tracing::debug!(removed, "Dropped expired cache entries");
        }
        Ok(PersistentCache {
            _db: db,
            store: items,
        })
    }

    /// Stores a serializable value with a time-to-live (TTL), then drops
    /// whatever else has expired so stale keys never accumulate.
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, value))]
    pub async fn put_value<T: Serialize + Send + Debug + 'static>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        let expires_at = SystemTime::now()
            .checked_add(ttl)
            .ok_or(anyhow!("TTL overflow"))?
            .duration_since(UNIX_EPOCH)?
            .as_secs();
        let entry = StoredEntry { expires_at, value };
        let bytes = postcard::to_stdvec(&entry)?;

        let now = unix_now()?;
        let removed = task::spawn_blocking(move || -> Result<usize> {
            store.insert(key, bytes)?;
            sweep_store(&store, now)
        })
        .await??;
        if removed > 0 {
            tracing::debug!(removed, "Dropped expired cache entries");
        }
        Ok(())
    }

    /// Retrieves a value if it exists and has not expired.
    /// Returns `None` for cache misses or expired entries.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub async fn get_value<T: DeserializeOwned + Send + 'static>(
        &self,
        key: &str,
    ) -> Result<Option<T>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes: Option<Vec<u8>> =
            task::spawn_blocking(move || get_from_store(store, key_bytes)).await??;

        let Some(bytes) = maybe_bytes else {
            tracing::debug!("Key not found");
            return Ok(None);
        };

        let entry: StoredEntry<T> = postcard::from_bytes(&bytes)?;
        let now = unix_now()?;

        if now < entry.expires_at {
            tracing::debug!("Key found and still fresh");
            Ok(Some(entry.value))
        } else {
            tracing::debug!("Key found but expired");
            self.remove_value(key).await?;
            Ok(None)
        }
    }

    pub async fn remove_value(&self, key: &str) -> Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store.clone();
        task::spawn_blocking(move || store.remove(key)).await??;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for PersistentCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_value::<String>(key).await
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.put_value(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.remove_value(key).await
    }
}

/// Lazily opened, optional cache store.
///
/// The store is opened on first use, exactly once. A missing location or a
/// failure to open leaves the handle permanently disabled; callers then see
/// `None` and carry on without caching.
pub struct CacheHandle {
    location: Option<PathBuf>,
    store: OnceCell<Option<Arc<dyn CacheStore>>>,
}

impl CacheHandle {
    #[must_use]
    pub fn new(location: Option<PathBuf>) -> Self {
        Self {
            location,
            store: OnceCell::new(),
        }
    }

    /// Handle with caching switched off
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Handle around an already constructed store
    #[must_use]
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self {
            location: None,
            store: OnceCell::new_with(Some(Some(store))),
        }
    }

    pub async fn store(&self) -> Option<Arc<dyn CacheStore>> {
        self.store
            .get_or_init(|| async {
                let location = self.location.clone()?;
                let opened =
                    task::spawn_blocking(move || PersistentCache::open(&location)).await;
                match opened {
                    Ok(Ok(cache)) => {
                        tracing::info!("Analysis cache opened");
                        Some(Arc::new(cache) as Arc<dyn CacheStore>)
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("Failed to open analysis cache, caching disabled: {e:#}");
                        None
                    }
                    Err(e) => {
                        tracing::warn!("Analysis cache open task failed, caching disabled: {e}");
                        None
                    }
                }
            })
            .await
            .clone()
    }
}
