// In-memory storage backends

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{AccountSessions, SessionMap, SessionStore, StoreError, SweepStateStore};

/// In-memory session store
///
/// Accounts are kept in a BTreeMap so the global scan pages through them in
/// a stable lexicographic order, which the sweeper's ring cursor relies on.
pub struct MemorySessionStore {
    accounts: Arc<RwLock<BTreeMap<String, SessionMap>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of accounts currently holding at least one session
    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_sessions(&self, account_id: &str) -> Result<SessionMap, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(account_id).cloned().unwrap_or_default())
    }

    async fn set_sessions(&self, account_id: &str, sessions: SessionMap) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        if sessions.is_empty() {
            accounts.remove(account_id);
        } else {
            accounts.insert(account_id.to_string(), sessions);
        }
        Ok(())
    }

    async fn scan_all(
        &self,
        cursor: u64,
        limit: usize,
    ) -> Result<(Vec<AccountSessions>, u64), StoreError> {
        let accounts = self.accounts.read().await;
        let page: Vec<AccountSessions> = accounts
            .iter()
            .skip(cursor as usize)
            .take(limit)
            .map(|(account_id, sessions)| AccountSessions {
                account_id: account_id.clone(),
                sessions: sessions.clone(),
            })
            .collect();
        let next_cursor = cursor + page.len() as u64;
        Ok((page, next_cursor))
    }
}

/// In-memory sweeper state store
pub struct MemorySweepStateStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySweepStateStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemorySweepStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SweepStateStore for MemorySweepStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}
