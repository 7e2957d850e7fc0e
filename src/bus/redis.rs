//! Redis pub/sub transport for invalidation notices.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, error, warn};

use crate::cache::MultiLevelCache;
use crate::error::CacheError;
use crate::notice::{CacheNotice, NoticeBus};

/// Channel used when none is configured.
pub const DEFAULT_NOTICE_CHANNEL: &str = "mlcache:notice";

/// Notice bus carrying JSON-encoded notices over a Redis pub/sub channel.
///
/// Redis pub/sub is at-most-once with no ordering guarantee between
/// publishers; that is acceptable here because dispatch is idempotent and
/// the protocol is best-effort by contract.
pub struct RedisNoticeBus {
    client: redis::Client,
    publish_conn: ConnectionManager,
    channel: String,
}

impl RedisNoticeBus {
    /// Connect the bus. An empty channel name falls back to
    /// [`DEFAULT_NOTICE_CHANNEL`].
    pub async fn new(
        client: redis::Client,
        channel: impl Into<String>,
    ) -> Result<Self, CacheError> {
        let publish_conn = ConnectionManager::new(client.clone())
            .await
            .map_err(CacheError::backend)?;
        let channel = channel.into();
        let channel = if channel.is_empty() {
            DEFAULT_NOTICE_CHANNEL.to_owned()
        } else {
            channel
        };
        Ok(RedisNoticeBus {
            client,
            publish_conn,
            channel,
        })
    }

    /// The pub/sub channel this bus uses.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// One subscribe-and-drain pass; returns when the stream ends so the
    /// caller can reconnect.
    async fn run_subscription(&self, cache: &Arc<MultiLevelCache>) -> Result<(), CacheError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(CacheError::backend)?;
        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(CacheError::backend)?;
        debug!(channel = %self.channel, "subscribed to notice channel");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "failed to read notice payload, skipping");
                    continue;
                }
            };

            let notice = match CacheNotice::decode(&payload) {
                Ok(notice) => notice,
                Err(err) => {
                    warn!(error = %err, payload, "failed to decode notice, skipping");
                    continue;
                }
            };

            if let Err(err) = cache.dispatch(&notice).await {
                warn!(error = %err, key = %notice.key, cmd = notice.cmd, "notice dispatch failed");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl NoticeBus for RedisNoticeBus {
    async fn publish(&self, notice: &CacheNotice) -> Result<(), CacheError> {
        let payload = notice.encode()?;
        let mut conn = self.publish_conn.clone();
        let _: () = conn
            .publish(&self.channel, payload)
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }

    async fn subscribe(&self, cache: Arc<MultiLevelCache>) {
        loop {
            if let Err(err) = self.run_subscription(&cache).await {
                error!(channel = %self.channel, error = %err, "notice subscription lost, reconnecting");
            } else {
                warn!(channel = %self.channel, "notice stream ended, resubscribing");
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}
