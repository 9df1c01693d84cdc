//! Read-cache invalidation. Fire-and-forget: a failed invalidation is
//! logged, never surfaced to the transfer that triggered it.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

const ACCOUNT_KEY_PREFIX: &str = "account:";

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, account_number: &str);
}

/// Drops the cached account entry in Redis.
pub struct RedisCacheInvalidator {
    client: redis::Client,
}

impl RedisCacheInvalidator {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CacheInvalidator for RedisCacheInvalidator {
    async fn invalidate(&self, account_number: &str) {
        let key = format!("{}{}", ACCOUNT_KEY_PREFIX, account_number);

        let result: redis::RedisResult<()> = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            redis::cmd("DEL").arg(&key).query_async(&mut conn).await
        }
        .await;

        match result {
            Ok(()) => debug!("Invalidated cache for account {}", account_number),
            Err(e) => warn!("Cache invalidation failed for {}: {}", account_number, e),
        }
    }
}

/// Used when no REDIS_URL is configured.
pub struct NoopCacheInvalidator;

#[async_trait]
impl CacheInvalidator for NoopCacheInvalidator {
    async fn invalidate(&self, _account_number: &str) {}
}

pub fn build_invalidator(redis_url: Option<&str>) -> anyhow::Result<Arc<dyn CacheInvalidator>> {
    match redis_url {
        Some(url) => Ok(Arc::new(RedisCacheInvalidator::new(url)?)),
        None => Ok(Arc::new(NoopCacheInvalidator)),
    }
}
