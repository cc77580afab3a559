use crate::CacheStore;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Caching disabled: every lookup misses and every write is discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl CacheStore for NoCache {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_never_hits() {
        let cache = NoCache;
        cache.put("key", b"value", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("key").await.unwrap(), None);
    }
}
