//! The multi-level cache orchestrator.
//!
//! Composes an optional local L1 tier, an optional shared L2 tier and an
//! optional authoritative L3 source behind one read-through `get`, promotes
//! values upward on miss, and applies invalidation notices downward from the
//! source toward the fastest tier.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{CacheConfig, DEFAULT_BACKFILL_QUEUE_SIZE};
use crate::error::CacheError;
use crate::notice::{CacheNotice, NoticeBus, NoticeCommand};
use crate::singleflight::KeyedMutex;
use crate::tier::{AuthoritativeSource, Tier};

/// Builder for [`MultiLevelCache`].
///
/// Every level is optional, but at least one of L1/L2/L3 must be attached.
///
/// # Example
/// ```ignore
/// let cache = MultiLevelCache::builder()
///     .l1(Arc::new(MokaTier::new(MokaTierConfig::default())))
///     .l2(Arc::new(redis_tier))
///     .l3(Arc::new(db_source))
///     .bus(Arc::new(notice_bus))
///     .build()?;
/// ```
#[derive(Default)]
pub struct MultiLevelCacheBuilder {
    l1: Option<Arc<dyn Tier>>,
    l2: Option<Arc<dyn Tier>>,
    l3: Option<Arc<dyn AuthoritativeSource>>,
    bus: Option<Arc<dyn NoticeBus>>,
    config: Option<CacheConfig>,
}

impl MultiLevelCacheBuilder {
    /// Attach the process-local L1 tier.
    pub fn l1(mut self, tier: Arc<dyn Tier>) -> Self {
        self.l1 = Some(tier);
        self
    }

    /// Attach the shared L2 tier.
    pub fn l2(mut self, tier: Arc<dyn Tier>) -> Self {
        self.l2 = Some(tier);
        self
    }

    /// Attach the authoritative source.
    pub fn l3(mut self, source: Arc<dyn AuthoritativeSource>) -> Self {
        self.l3 = Some(source);
        self
    }

    /// Attach the notice bus used for cross-process invalidation.
    pub fn bus(mut self, bus: Arc<dyn NoticeBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Override the default [`CacheConfig`].
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Validate the configuration, spawn the background tasks and return the
    /// cache handle.
    pub fn build(self) -> Result<Arc<MultiLevelCache>, CacheError> {
        if self.l1.is_none() && self.l2.is_none() && self.l3.is_none() {
            return Err(CacheError::Config(
                "no cache level configured: attach at least one of l1, l2, l3".to_owned(),
            ));
        }

        let config = self.config.unwrap_or_default();

        // The backfill queue only exists when there is a source to refill from.
        let (backfill_tx, backfill_rx) = if self.l3.is_some() {
            let size = if config.backfill_queue_size == 0 {
                DEFAULT_BACKFILL_QUEUE_SIZE
            } else {
                config.backfill_queue_size
            };
            let (tx, rx) = mpsc::channel(size);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let cache = Arc::new(MultiLevelCache {
            l1: self.l1,
            l2: self.l2,
            l3: self.l3,
            bus: self.bus,
            config,
            l1_refill: KeyedMutex::new(),
            l2_refill: KeyedMutex::new(),
            backfill_tx,
            shutdown_tx,
            tasks: StdMutex::new(Vec::new()),
        });

        let mut tasks = Vec::new();

        if let Some(rx) = backfill_rx {
            let worker = Arc::clone(&cache);
            let shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(worker.run_backfill(rx, shutdown)));
        }

        if let Some(bus) = cache.bus.clone() {
            let subscriber = Arc::clone(&cache);
            let mut shutdown = shutdown_rx;
            tasks.push(tokio::spawn(async move {
                tokio::select! {
                    _ = bus.subscribe(subscriber) => {
                        warn!("notice subscriber finished unexpectedly");
                    }
                    _ = shutdown.changed() => {}
                }
            }));
        }

        *cache.tasks.lock().expect("task list poisoned") = tasks;
        Ok(cache)
    }
}

/// Multi-level read-through cache.
///
/// Constructed once per process via [`MultiLevelCache::builder`]; the tier
/// handles are fixed for its lifetime. The backfill worker and the notice
/// subscriber are spawned at construction and run until [`shutdown`] is
/// called.
///
/// [`shutdown`]: MultiLevelCache::shutdown
pub struct MultiLevelCache {
    l1: Option<Arc<dyn Tier>>,
    l2: Option<Arc<dyn Tier>>,
    l3: Option<Arc<dyn AuthoritativeSource>>,
    bus: Option<Arc<dyn NoticeBus>>,
    config: CacheConfig,
    /// Single-flight locks for L1 repopulation, one per in-flight key.
    l1_refill: KeyedMutex,
    /// Single-flight locks for L2 repopulation.
    l2_refill: KeyedMutex,
    backfill_tx: Option<mpsc::Sender<String>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for MultiLevelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiLevelCache")
            .field("l1", &self.l1.as_ref().map(|t| t.name()))
            .field("l2", &self.l2.as_ref().map(|t| t.name()))
            .field("l3", &self.l3.as_ref().map(|s| s.name()))
            .field("bus", &self.bus.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MultiLevelCache {
    /// Start building a cache.
    pub fn builder() -> MultiLevelCacheBuilder {
        MultiLevelCacheBuilder::default()
    }

    /// Look up a key, reading through the configured levels.
    ///
    /// Entry point is the fastest configured level; slower levels are only
    /// consulted on a miss, and a resolved value is written back into the
    /// faster levels with `ttl_override_seconds` on the way up.
    ///
    /// `sync_reload` controls what happens when L2 misses and an
    /// authoritative source is attached:
    /// - `false`: the key is enqueued for asynchronous backfill and the call
    ///   returns `Ok(None)` immediately. When the queue is saturated the
    ///   enqueue blocks until the worker drains space; callers choosing
    ///   asynchronous reload accept that backpressure under sustained
    ///   source slowness.
    /// - `true`: the source is fetched inline under the L2 single-flight
    ///   lock and the value is stored into L2 before being returned.
    ///
    /// `Ok(None)` means the key is genuinely absent everywhere consulted.
    /// Any backend error aborts the call and is returned verbatim.
    pub async fn get(
        &self,
        key: &str,
        sync_reload: bool,
        ttl_override_seconds: i64,
    ) -> Result<Option<String>, CacheError> {
        if let Some(l1) = &self.l1 {
            return self
                .get_via_l1(l1.as_ref(), key, sync_reload, ttl_override_seconds)
                .await;
        }
        if self.l2.is_some() {
            return self.get_via_l2(key, sync_reload, ttl_override_seconds).await;
        }
        if let Some(l3) = &self.l3 {
            return l3.get(key).await;
        }
        Ok(None)
    }

    /// L1-entry read path: lock-free on a hit, single-flight per key on a
    /// miss with a double-check re-read before falling through.
    async fn get_via_l1(
        &self,
        l1: &dyn Tier,
        key: &str,
        sync_reload: bool,
        ttl_override_seconds: i64,
    ) -> Result<Option<String>, CacheError> {
        if let Some(value) = l1.get(key).await? {
            debug!(key, tier = l1.name(), "cache hit L1");
            return Ok(Some(value));
        }
        debug!(key, "cache miss L1");

        if self.l2.is_some() {
            let _refill = self.l1_refill.acquire(key).await;

            // A concurrent caller may have filled L1 while we waited.
            if let Some(value) = l1.get(key).await? {
                return Ok(Some(value));
            }

            let resolved = self.get_via_l2(key, sync_reload, ttl_override_seconds).await?;
            if let Some(value) = &resolved {
                l1.set(key, value, ttl_override_seconds).await?;
            }
            return Ok(resolved);
        }

        // No L2: fall back to the source directly.
        if let Some(l3) = &self.l3 {
            let _refill = self.l1_refill.acquire(key).await;

            if let Some(value) = l1.get(key).await? {
                return Ok(Some(value));
            }

            let fetched = l3.get(key).await?;
            if let Some(value) = &fetched {
                l1.set(key, value, ttl_override_seconds).await?;
            }
            return Ok(fetched);
        }

        Ok(None)
    }

    /// L2 read path, used as the entry point when no L1 is configured or as
    /// the fallback beneath it.
    async fn get_via_l2(
        &self,
        key: &str,
        sync_reload: bool,
        reload_ttl_seconds: i64,
    ) -> Result<Option<String>, CacheError> {
        let Some(l2) = &self.l2 else {
            return Ok(None);
        };

        if let Some(value) = l2.get(key).await? {
            debug!(key, tier = l2.name(), "cache hit L2");
            return Ok(Some(value));
        }
        debug!(key, "cache miss L2");

        let Some(l3) = &self.l3 else {
            return Ok(None);
        };

        if !sync_reload {
            if let Some(tx) = &self.backfill_tx {
                if tx.send(key.to_owned()).await.is_err() {
                    warn!(key, "backfill queue closed, dropping reload request");
                }
            }
            return Ok(None);
        }

        let _refill = self.l2_refill.acquire(key).await;

        // Another caller may have repopulated L2 while we waited.
        if let Some(value) = l2.get(key).await? {
            return Ok(Some(value));
        }

        let fetched = l3.get(key).await?;
        if let Some(value) = &fetched {
            l2.set(key, value, reload_ttl_seconds).await?;
        }
        Ok(fetched)
    }

    /// Backfill worker: sole consumer of the backfill queue. Blocks on the
    /// channel, so an empty queue costs nothing.
    async fn run_backfill(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let key = tokio::select! {
                _ = shutdown.changed() => break,
                received = rx.recv() => match received {
                    Some(key) => key,
                    None => break,
                },
            };
            self.backfill(&key).await;
        }
        debug!("backfill worker stopped");
    }

    /// Refill L2 and L1 for one key from the authoritative source.
    ///
    /// Failures are logged and the key is dropped, never requeued; the next
    /// foreground miss re-enqueues it.
    async fn backfill(&self, key: &str) {
        let Some(l3) = &self.l3 else {
            return;
        };

        let value = match l3.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!(key, "backfill: key absent in source");
                return;
            }
            Err(err) => {
                warn!(key, error = %err, "backfill: source fetch failed");
                return;
            }
        };

        if let Some(l2) = &self.l2 {
            if let Err(err) = l2.set(key, &value, self.config.l2_ttl_seconds).await {
                warn!(key, tier = l2.name(), error = %err, "backfill: L2 write failed");
            }
        }
        if let Some(l1) = &self.l1 {
            if let Err(err) = l1.set(key, &value, self.config.l1_ttl_seconds).await {
                warn!(key, tier = l1.name(), error = %err, "backfill: L1 write failed");
            }
        }
    }

    /// Apply an invalidation notice to this process's levels.
    ///
    /// Writes and deletes run source-first (L3, then L2, then L1) so a crash
    /// mid-propagation never leaves a fast tier ahead of the system of
    /// record. Each sequence stops at the first error; slower levels may
    /// then be newer than faster ones until the next notice or natural
    /// expiry. All operations are idempotent, so redelivery is harmless.
    pub async fn dispatch(&self, notice: &CacheNotice) -> Result<(), CacheError> {
        match NoticeCommand::try_from(notice.cmd)? {
            NoticeCommand::AddAll | NoticeCommand::UpdateAll => {
                self.propagate_set(&notice.key, &notice.value, notice.expire_seconds)
                    .await
            }
            NoticeCommand::DeleteAll => self.propagate_delete(&notice.key).await,
            NoticeCommand::ClearAll => self.propagate_clear().await,
            NoticeCommand::AddLocal => {
                self.set_local(&notice.key, &notice.value, notice.expire_seconds)
                    .await
            }
            NoticeCommand::DeleteLocal => self.delete_local(&notice.key).await,
        }
    }

    async fn propagate_set(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: i64,
    ) -> Result<(), CacheError> {
        if let Some(l3) = &self.l3 {
            l3.set(key, value, ttl_seconds).await?;
        }
        if let Some(l2) = &self.l2 {
            l2.set(key, value, ttl_seconds).await?;
        }
        if let Some(l1) = &self.l1 {
            l1.set(key, value, ttl_seconds).await?;
        }
        Ok(())
    }

    async fn propagate_delete(&self, key: &str) -> Result<(), CacheError> {
        if let Some(l3) = &self.l3 {
            l3.delete(key).await?;
        }
        if let Some(l2) = &self.l2 {
            l2.delete(key).await?;
        }
        if let Some(l1) = &self.l1 {
            l1.delete(key).await?;
        }
        Ok(())
    }

    async fn propagate_clear(&self) -> Result<(), CacheError> {
        if let Some(l3) = &self.l3 {
            l3.clear_all().await?;
        }
        if let Some(l2) = &self.l2 {
            l2.clear_all().await?;
        }
        if let Some(l1) = &self.l1 {
            l1.clear_all().await?;
        }
        Ok(())
    }

    /// Write into the local L1 tier only. No-op when L1 is absent.
    pub async fn set_local(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: i64,
    ) -> Result<(), CacheError> {
        match &self.l1 {
            Some(l1) => l1.set(key, value, ttl_seconds).await,
            None => Ok(()),
        }
    }

    /// Delete from the local L1 tier only. No-op when L1 is absent.
    pub async fn delete_local(&self, key: &str) -> Result<(), CacheError> {
        match &self.l1 {
            Some(l1) => l1.delete(key).await,
            None => Ok(()),
        }
    }

    /// Write into the shared L2 tier and then L1. Used by processes that
    /// want to warm both their own and the shared tier without touching the
    /// source.
    pub async fn set_shared_and_local(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: i64,
    ) -> Result<(), CacheError> {
        if let Some(l2) = &self.l2 {
            l2.set(key, value, ttl_seconds).await?;
        }
        self.set_local(key, value, ttl_seconds).await
    }

    /// Delete from the shared L2 tier and then L1.
    pub async fn delete_shared_and_local(&self, key: &str) -> Result<(), CacheError> {
        if let Some(l2) = &self.l2 {
            l2.delete(key).await?;
        }
        self.delete_local(key).await
    }

    /// Announce a cache-affecting change to peer processes through the
    /// attached notice bus.
    pub async fn publish_notice(&self, notice: &CacheNotice) -> Result<(), CacheError> {
        match &self.bus {
            Some(bus) => bus.publish(notice).await,
            None => Err(CacheError::Config(
                "no notice bus attached".to_owned(),
            )),
        }
    }

    /// Stop the backfill worker and the notice subscriber and wait for both
    /// to finish. Safe to call more than once.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().expect("task list poisoned");
            tasks.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}
