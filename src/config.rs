//! Cache configuration

/// How many keys the backfill queue may hold before enqueueing callers block.
pub const DEFAULT_BACKFILL_QUEUE_SIZE: usize = 1024;

/// Configuration for the multi-level cache.
///
/// The TTLs here are the defaults the backfill worker uses when it
/// repopulates a level from the authoritative source; a foreground `get`
/// passes its own TTL override instead.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default time-to-live in seconds for L1 entries written by the
    /// backfill worker. Zero or negative means no expiry.
    pub l1_ttl_seconds: i64,
    /// Default time-to-live in seconds for L2 entries written by the
    /// backfill worker. Zero or negative means no expiry.
    pub l2_ttl_seconds: i64,
    /// Capacity of the bounded backfill queue. Zero falls back to
    /// [`DEFAULT_BACKFILL_QUEUE_SIZE`].
    pub backfill_queue_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_ttl_seconds: 300,  // 5 minutes
            l2_ttl_seconds: 900,  // 15 minutes
            backfill_queue_size: DEFAULT_BACKFILL_QUEUE_SIZE,
        }
    }
}
