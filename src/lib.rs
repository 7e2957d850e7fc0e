//! mlcache - Multi-level read-through cache library
//!
//! This library orchestrates up to three levels behind one lookup API:
//! - L1: process-local tier (fastest)
//! - L2: shared tier such as Redis (medium speed, shared across instances)
//! - L3: the authoritative source of truth (slowest)
//!
//! The cache supports:
//! - Automatic fallback between levels with read-through promotion
//! - Per-key single-flight repopulation (no thundering herd)
//! - Asynchronous backfill from the source through a bounded queue
//! - Cross-process consistency via invalidation notices over a pluggable bus
//! - Pluggable tier, source and bus implementations
//!
//! # Example
//!
//! ```ignore
//! use mlcache::{CacheConfig, MultiLevelCache, MemoryTier, MemoryTierConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mlcache::CacheError> {
//!     let cache = MultiLevelCache::builder()
//!         .l1(Arc::new(MemoryTier::new(MemoryTierConfig::default())))
//!         .config(CacheConfig::default())
//!         .build()?;
//!
//!     let value = cache.get("user:1", true, 60).await?;
//!     println!("{value:?}");
//!
//!     cache.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod bus;
mod cache;
mod config;
mod error;
mod notice;
mod singleflight;
mod tier;
pub mod tiers;

// Re-export public API
pub use bus::redis::{DEFAULT_NOTICE_CHANNEL, RedisNoticeBus};
pub use cache::{MultiLevelCache, MultiLevelCacheBuilder};
pub use config::{CacheConfig, DEFAULT_BACKFILL_QUEUE_SIZE};
pub use error::CacheError;
pub use notice::{CacheNotice, NOTICE_SCHEMA_VERSION, NoticeBus, NoticeCommand};
pub use tier::{AuthoritativeSource, Tier};
pub use tiers::memory::{MemoryTier, MemoryTierConfig};
pub use tiers::moka::{MokaTier, MokaTierConfig};
pub use tiers::redis::{RedisTier, RedisTierConfig};

// Re-export async_trait for implementors of the capability contracts
pub use async_trait::async_trait;
