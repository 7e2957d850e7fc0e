//! Invalidation-notice protocol: the message schema carried between
//! processes, the command taxonomy, and the notice-bus contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::MultiLevelCache;
use crate::error::CacheError;

/// Wire schema version written into every published notice.
pub const NOTICE_SCHEMA_VERSION: u8 = 1;

fn default_version() -> u8 {
    NOTICE_SCHEMA_VERSION
}

/// What a notice asks peer processes to do with a key.
///
/// Discriminants 1-6 are assigned; 7 is reserved and currently rejected by
/// dispatch like any other unrecognized byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NoticeCommand {
    /// Write the entry into every configured level, source first.
    AddAll = 1,
    /// Alias of [`NoticeCommand::AddAll`].
    UpdateAll = 2,
    /// Delete the key from every configured level, source first.
    DeleteAll = 3,
    /// Clear every configured level, source first.
    ClearAll = 4,
    /// Write the entry into the local L1 tier only.
    AddLocal = 5,
    /// Delete the key from the local L1 tier only.
    DeleteLocal = 6,
}

impl TryFrom<u8> for NoticeCommand {
    type Error = CacheError;

    fn try_from(cmd: u8) -> Result<Self, CacheError> {
        match cmd {
            1 => Ok(NoticeCommand::AddAll),
            2 => Ok(NoticeCommand::UpdateAll),
            3 => Ok(NoticeCommand::DeleteAll),
            4 => Ok(NoticeCommand::ClearAll),
            5 => Ok(NoticeCommand::AddLocal),
            6 => Ok(NoticeCommand::DeleteLocal),
            other => Err(CacheError::UnknownCommand(other)),
        }
    }
}

impl From<NoticeCommand> for u8 {
    fn from(cmd: NoticeCommand) -> u8 {
        cmd as u8
    }
}

/// A cache-affecting change announced across process boundaries.
///
/// Serialized as JSON for transport. The raw command byte is kept as-is so
/// any notice round-trips losslessly; interpretation happens in
/// [`MultiLevelCache::dispatch`]. The `v` field defaults to 1 on decode so
/// payloads from peers that predate versioning still parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheNotice {
    /// Schema version of this notice.
    #[serde(rename = "v", default = "default_version")]
    pub version: u8,
    /// Command byte, see [`NoticeCommand`].
    pub cmd: u8,
    /// The affected key.
    pub key: String,
    /// The value to store, for the add/update commands.
    pub value: String,
    /// Expiry for stored values in seconds; zero or negative means no expiry.
    pub expire_seconds: i64,
}

impl CacheNotice {
    /// Build a notice for the given command.
    pub fn new(
        cmd: NoticeCommand,
        key: impl Into<String>,
        value: impl Into<String>,
        expire_seconds: i64,
    ) -> Self {
        Self {
            version: NOTICE_SCHEMA_VERSION,
            cmd: cmd.into(),
            key: key.into(),
            value: value.into(),
            expire_seconds,
        }
    }

    /// Notice announcing a deletion across all levels.
    pub fn delete_all(key: impl Into<String>) -> Self {
        Self::new(NoticeCommand::DeleteAll, key, "", 0)
    }

    /// Notice asking peers to clear every level.
    pub fn clear_all() -> Self {
        Self::new(NoticeCommand::ClearAll, "", "", 0)
    }

    /// Encode for transport.
    pub fn encode(&self) -> Result<String, CacheError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a transported payload.
    pub fn decode(payload: &str) -> Result<Self, CacheError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Transport contract for carrying notices between processes.
///
/// Delivery semantics (ordering, at-least-once vs at-most-once) belong
/// entirely to the implementation; the orchestrator does not deduplicate.
/// That is safe because every dispatch operation is idempotent.
#[async_trait]
pub trait NoticeBus: Send + Sync {
    /// Publish a notice to peer processes.
    async fn publish(&self, notice: &CacheNotice) -> Result<(), CacheError>;

    /// Receive notices until cancelled, applying each via
    /// [`MultiLevelCache::dispatch`].
    ///
    /// Decode failures must be logged and skipped, never fatal to the loop.
    async fn subscribe(&self, cache: Arc<MultiLevelCache>);
}
