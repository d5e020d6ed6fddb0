use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::PlinthError;

/// Storage backend for the pipeline runner's stage results. Implementations
/// must be safe for concurrent get/set.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the value for `key`, or `None` on a miss (including expiry).
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PlinthError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), PlinthError>;

    /// Releases backend resources. Further calls may fail.
    async fn close(&self) -> Result<(), PlinthError>;
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    expires_at_ms: u128,
    payload: Vec<u8>,
}

/// Disk cache on cacache. Entries wrap the payload with an absolute expiry
/// so the TTL is enforced regardless of backend timestamps.
#[derive(Debug)]
pub struct DiskCache {
    path: PathBuf,
}

impl DiskCache {
    pub fn new(path: impl AsRef<Path>) -> Self {
        DiskCache {
            path: PathBuf::from(path.as_ref()),
        }
    }
}

#[async_trait]
impl Cache for DiskCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PlinthError> {
        let raw = match cacache::read(&self.path, key).await {
            Ok(raw) => raw,
            Err(cacache::Error::EntryNotFound(..)) => return Ok(None),
            Err(source) => {
                return Err(PlinthError::Cache {
                    op: "read",
                    key: key.into(),
                    source,
                })
            }
        };
        let envelope: Envelope = bincode::deserialize(&raw)
            .map_err(|_| PlinthError::CacheCodec(key.to_string()))?;
        if envelope.expires_at_ms < now_ms() {
            return Ok(None);
        }
        Ok(Some(envelope.payload))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), PlinthError> {
        let envelope = Envelope {
            expires_at_ms: now_ms() + ttl.as_millis(),
            payload: value.to_vec(),
        };
        let raw = bincode::serialize(&envelope)
            .map_err(|_| PlinthError::CacheCodec(key.to_string()))?;
        cacache::write(&self.path, key, raw)
            .await
            .map_err(|source| PlinthError::Cache {
                op: "write",
                key: key.into(),
                source,
            })?;
        Ok(())
    }

    async fn close(&self) -> Result<(), PlinthError> {
        Ok(())
    }
}

/// In-memory cache, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (u128, Vec<u8>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PlinthError> {
        let entries = self.entries.lock().expect("cache lock");
        Ok(entries
            .get(key)
            .filter(|(expires_at, _)| *expires_at >= now_ms())
            .map(|(_, payload)| payload.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), PlinthError> {
        let mut entries = self.entries.lock().expect("cache lock");
        entries.insert(key.to_string(), (now_ms() + ttl.as_millis(), value.to_vec()));
        Ok(())
    }

    async fn close(&self) -> Result<(), PlinthError> {
        self.entries.lock().expect("cache lock").clear();
        Ok(())
    }
}

/// Disables caching: never hits, drops writes.
#[derive(Debug, Default)]
pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, PlinthError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), PlinthError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), PlinthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[async_std::test]
    async fn memory_cache_round_trips_and_expires() {
        let cache = MemoryCache::new();
        cache
            .set("k", b"value", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"value".to_vec()));

        cache.set("gone", b"x", Duration::ZERO).await.unwrap();
        async_std::task::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("gone").await.unwrap(), None);
    }

    #[async_std::test]
    async fn disk_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache
            .set("k", b"payload", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"payload".to_vec()));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[async_std::test]
    async fn null_cache_never_hits() {
        let cache = NullCache;
        cache.set("k", b"v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
