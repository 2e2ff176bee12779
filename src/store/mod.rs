// Storage abstraction for session maps and sweeper state
// The durable engine behind these traits is an external concern; the
// in-memory backends are the reference implementation and test double

pub mod memory;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::session::types::SessionRecord;

/// An account's full session map, keyed by session token
pub type SessionMap = HashMap<String, SessionRecord>;

/// One account's sessions as returned by a global scan page
#[derive(Debug, Clone)]
pub struct AccountSessions {
    pub account_id: String,
    pub sessions: SessionMap,
}

/// Durable per-account session storage.
///
/// The mutation primitive is deliberately coarse: callers read the whole
/// map, decide, and write the whole map back. Two concurrent writers for
/// the same account race last-writer-wins; the limiter and sweeper accept
/// that as bounded and self-correcting. An implementation over a store with
/// atomic per-key operations is free to tighten this.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// All current sessions for one account; empty map if none
    async fn get_sessions(&self, account_id: &str) -> Result<SessionMap, StoreError>;

    /// Replace the account's session map wholesale.
    ///
    /// An empty map removes the account from the scan population.
    async fn set_sessions(&self, account_id: &str, sessions: SessionMap) -> Result<(), StoreError>;

    /// One page of the global account population, in a stable order.
    ///
    /// Returns the page and the cursor positioned after it. A page shorter
    /// than `limit` means the end of the population was reached.
    async fn scan_all(
        &self,
        cursor: u64,
        limit: usize,
    ) -> Result<(Vec<AccountSessions>, u64), StoreError>;
}

/// Small key-value store for sweeper bookkeeping.
///
/// Keys are well-known names, values are short strings (timestamps,
/// offsets). Kept separate from the per-account session data.
#[async_trait]
pub trait SweepStateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Storage errors
#[derive(Debug, Clone)]
pub enum StoreError {
    Unavailable(String),
    InvalidData(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
            StoreError::InvalidData(msg) => write!(f, "Invalid stored data: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}
